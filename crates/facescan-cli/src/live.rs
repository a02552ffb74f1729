//! Webcam loop: grab one frame, detect, hand it to the sink, repeat.

use crate::display::{FrameSink, SinkAction};
use anyhow::{Context, Result};
use facescan_core::FacePipeline;
use facescan_hw::{CameraError, Frame, FrameStream};

/// Yields decoded frames one at a time.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Frame, CameraError>;
}

impl FrameSource for FrameStream<'_> {
    fn next_frame(&mut self) -> Result<Frame, CameraError> {
        FrameStream::next_frame(self)
    }
}

/// Run until the sink quits, `interrupted` fires, `max_frames` is reached, or a
/// read fails. The source is dropped before returning on every path.
///
/// Returns the number of frames fully processed.
pub fn run_loop<S: FrameSource>(
    mut source: S,
    pipeline: &mut FacePipeline,
    sink: &mut dyn FrameSink,
    max_frames: Option<u64>,
    interrupted: impl Fn() -> bool,
) -> Result<u64> {
    let mut frames = 0u64;
    loop {
        let frame = source.next_frame().context("failed to grab frame")?;
        let result = pipeline.process(&frame.image)?;
        frames += 1;

        tracing::debug!(
            seq = frame.sequence,
            faces = result.faces.len(),
            latency_us = frame.timestamp.elapsed().as_micros() as u64,
            "frame"
        );
        if sink.show(&result.annotated, result.faces.len())? == SinkAction::Quit {
            break;
        }
        if interrupted() || max_frames.is_some_and(|max| frames >= max) {
            break;
        }
    }
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use facescan_core::{
        CascadeDetector, CascadeSource, Classifier, DetectorError, FaceDetectionConfig, Rect,
        ScanParams,
    };
    use image::{GrayImage, RgbImage};
    use std::cell::Cell;
    use std::rc::Rc;
    use std::time::Instant;

    struct FixedFaces(Vec<Rect>);

    struct FixedDetector(Vec<Rect>);

    impl CascadeDetector for FixedDetector {
        fn detect_regions(
            &mut self,
            _image: &GrayImage,
            _params: &ScanParams,
        ) -> Result<Vec<Rect>, DetectorError> {
            Ok(self.0.clone())
        }
    }

    impl CascadeSource for FixedFaces {
        fn open(&self, _: &Classifier) -> Result<Box<dyn CascadeDetector>, DetectorError> {
            Ok(Box::new(FixedDetector(self.0.clone())))
        }
    }

    /// Serves `frames` blank frames, then fails like an unplugged camera.
    struct ScriptedCamera {
        frames: u32,
        reads: Rc<Cell<u32>>,
        released: Rc<Cell<bool>>,
    }

    impl ScriptedCamera {
        fn new(frames: u32) -> Self {
            Self {
                frames,
                reads: Rc::default(),
                released: Rc::default(),
            }
        }
    }

    impl FrameSource for ScriptedCamera {
        fn next_frame(&mut self) -> Result<Frame, CameraError> {
            let sequence = self.reads.get();
            self.reads.set(sequence + 1);
            if sequence >= self.frames {
                return Err(CameraError::CaptureFailed("device disconnected".into()));
            }
            Ok(Frame {
                image: RgbImage::new(32, 24),
                timestamp: Instant::now(),
                sequence,
            })
        }
    }

    impl Drop for ScriptedCamera {
        fn drop(&mut self) {
            self.released.set(true);
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        faces: Vec<usize>,
        quit_after: Option<usize>,
    }

    impl FrameSink for RecordingSink {
        fn show(&mut self, frame: &RgbImage, faces: usize) -> Result<SinkAction> {
            assert_eq!(frame.dimensions(), (32, 24));
            self.faces.push(faces);
            if self.quit_after == Some(self.faces.len()) {
                return Ok(SinkAction::Quit);
            }
            Ok(SinkAction::Continue)
        }
    }

    fn pipeline(faces: Vec<Rect>) -> FacePipeline {
        FacePipeline::new(&FixedFaces(faces), FaceDetectionConfig::live()).unwrap()
    }

    #[test]
    fn test_max_frames_bounds_the_loop() {
        let camera = ScriptedCamera::new(10);
        let reads = camera.reads.clone();
        let mut sink = RecordingSink::default();

        let frames = run_loop(camera, &mut pipeline(vec![]), &mut sink, Some(3), || false).unwrap();

        assert_eq!(frames, 3);
        assert_eq!(reads.get(), 3);
        assert_eq!(sink.faces, vec![0, 0, 0]);
    }

    #[test]
    fn test_sink_quit_stops_after_that_frame() {
        let camera = ScriptedCamera::new(10);
        let reads = camera.reads.clone();
        let mut sink = RecordingSink {
            quit_after: Some(2),
            ..Default::default()
        };

        let frames = run_loop(camera, &mut pipeline(vec![]), &mut sink, None, || false).unwrap();

        assert_eq!(frames, 2);
        assert_eq!(reads.get(), 2);
    }

    #[test]
    fn test_interrupt_checked_once_per_frame() {
        let camera = ScriptedCamera::new(10);
        let checks = Cell::new(0);
        let mut sink = RecordingSink::default();

        let frames = run_loop(camera, &mut pipeline(vec![]), &mut sink, None, || {
            checks.set(checks.get() + 1);
            checks.get() == 4
        })
        .unwrap();

        assert_eq!(frames, 4);
        assert_eq!(checks.get(), 4);
    }

    #[test]
    fn test_failed_read_ends_loop_and_releases_camera() {
        let camera = ScriptedCamera::new(2);
        let released = camera.released.clone();
        let mut sink = RecordingSink::default();

        let err = run_loop(camera, &mut pipeline(vec![]), &mut sink, None, || false).unwrap_err();

        assert!(err.to_string().contains("failed to grab frame"));
        assert!(matches!(
            err.downcast_ref::<CameraError>(),
            Some(CameraError::CaptureFailed(_))
        ));
        assert_eq!(sink.faces.len(), 2);
        assert!(released.get());
    }

    #[test]
    fn test_each_frame_is_detected_before_display() {
        let camera = ScriptedCamera::new(10);
        let mut sink = RecordingSink::default();
        let faces = vec![Rect::new(2, 2, 10, 10), Rect::new(18, 4, 8, 8)];

        run_loop(camera, &mut pipeline(faces), &mut sink, Some(2), || false).unwrap();

        assert_eq!(sink.faces, vec![2, 2]);
    }
}
