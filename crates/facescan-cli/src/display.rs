//! Where annotated frames go: a window (OpenCV builds), a snapshot file, or the log.

use anyhow::{Context, Result};
use facescan_core::io::save_image;
use image::RgbImage;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkAction {
    Continue,
    Quit,
}

/// Consumer of annotated live frames.
pub trait FrameSink {
    fn show(&mut self, frame: &RgbImage, faces: usize) -> Result<SinkAction>;
}

/// Overwrites one image file with the latest frame.
pub struct SnapshotSink {
    path: PathBuf,
}

impl SnapshotSink {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl FrameSink for SnapshotSink {
    fn show(&mut self, frame: &RgbImage, faces: usize) -> Result<SinkAction> {
        save_image(frame, &self.path).with_context(|| format!("writing {}", self.path.display()))?;
        tracing::debug!(faces, path = %self.path.display(), "snapshot written");
        Ok(SinkAction::Continue)
    }
}

/// Logs the face count only.
pub struct LogSink;

impl FrameSink for LogSink {
    fn show(&mut self, _frame: &RgbImage, faces: usize) -> Result<SinkAction> {
        tracing::info!(faces, "frame processed");
        Ok(SinkAction::Continue)
    }
}

/// Pick the sink for the live loop.
pub fn live_sink(output: Option<PathBuf>) -> Result<Box<dyn FrameSink>> {
    if let Some(path) = output {
        return Ok(Box::new(SnapshotSink::new(path)));
    }
    #[cfg(feature = "opencv")]
    {
        Ok(Box::new(window::WindowSink::open("Webcam Face Detection")?))
    }
    #[cfg(not(feature = "opencv"))]
    {
        tracing::warn!("built without a display backend; pass --output to save frames");
        Ok(Box::new(LogSink))
    }
}

/// Show a single annotated image until a key is pressed.
pub fn show_image(title: &str, image: &RgbImage) -> Result<()> {
    #[cfg(feature = "opencv")]
    {
        window::show_blocking(title, image)
    }
    #[cfg(not(feature = "opencv"))]
    {
        let _ = image;
        tracing::warn!(title, "--show needs the `opencv` feature; image saved only");
        Ok(())
    }
}

#[cfg(feature = "opencv")]
mod window {
    use super::{FrameSink, SinkAction};
    use anyhow::Result;
    use image::RgbImage;
    use opencv::core::{Mat, VecN};
    use opencv::highgui;
    use opencv::prelude::*;

    const QUIT_KEY: i32 = 'q' as i32;

    pub struct WindowSink {
        name: String,
    }

    impl WindowSink {
        pub fn open(name: &str) -> Result<Self> {
            highgui::named_window(name, highgui::WINDOW_AUTOSIZE)?;
            Ok(Self {
                name: name.to_string(),
            })
        }
    }

    impl FrameSink for WindowSink {
        fn show(&mut self, frame: &RgbImage, _faces: usize) -> Result<SinkAction> {
            highgui::imshow(&self.name, &to_bgr_mat(frame)?)?;
            if highgui::wait_key(1)? & 0xFF == QUIT_KEY {
                return Ok(SinkAction::Quit);
            }
            Ok(SinkAction::Continue)
        }
    }

    impl Drop for WindowSink {
        fn drop(&mut self) {
            let _ = highgui::destroy_all_windows();
        }
    }

    pub fn show_blocking(title: &str, image: &RgbImage) -> Result<()> {
        highgui::imshow(title, &to_bgr_mat(image)?)?;
        highgui::wait_key(0)?;
        highgui::destroy_all_windows()?;
        Ok(())
    }

    fn to_bgr_mat(image: &RgbImage) -> Result<Mat> {
        let pixels: Vec<VecN<u8, 3>> = image.pixels().map(|p| VecN([p[2], p[1], p[0]])).collect();
        let (rows, cols) = (image.height() as i32, image.width() as i32);
        let mat = Mat::new_rows_cols_with_data(rows, cols, &pixels)?;
        Ok(mat.try_clone()?)
    }
}
