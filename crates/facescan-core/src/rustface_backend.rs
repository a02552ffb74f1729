use crate::detector::{resolve_model_path, CascadeDetector, CascadeSource, DetectorError};
use crate::types::{Classifier, Rect, ScanParams};
use image::GrayImage;
use std::path::PathBuf;

// Smallest window the SeetaFace engine accepts.
const SEETA_MIN_FACE_SIZE: u32 = 20;
const SEETA_SCORE_THRESHOLD: f64 = 2.0;
const SEETA_WINDOW_STEP: u32 = 4;

/// Cascade source backed by the `rustface` crate (SeetaFace funnel cascade).
///
/// Only SeetaFace `.bin` models load here; Haar XML cascades need the
/// `opencv` backend.
pub struct RustfaceCascades {
    model_dir: PathBuf,
}

impl RustfaceCascades {
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
        }
    }
}

impl CascadeSource for RustfaceCascades {
    fn open(&self, classifier: &Classifier) -> Result<Box<dyn CascadeDetector>, DetectorError> {
        let file_name = classifier.file_name();
        if file_name.extension().and_then(|e| e.to_str()) != Some("bin") {
            return Err(DetectorError::Unsupported {
                classifier: classifier.to_string(),
                backend: "rustface",
            });
        }

        let path = resolve_model_path(&self.model_dir, classifier)?;
        let file = std::fs::File::open(&path).map_err(|e| DetectorError::ClassifierLoad {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        let model = rustface::read_model(std::io::BufReader::new(file)).map_err(|e| {
            DetectorError::ClassifierLoad {
                path: path.clone(),
                reason: e.to_string(),
            }
        })?;

        tracing::debug!(path = %path.display(), "loaded SeetaFace model");
        Ok(Box::new(RustfaceCascade {
            detector: rustface::create_detector_with_model(model),
        }))
    }
}

struct RustfaceCascade {
    detector: Box<dyn rustface::Detector>,
}

impl CascadeDetector for RustfaceCascade {
    fn detect_regions(
        &mut self,
        image: &GrayImage,
        params: &ScanParams,
    ) -> Result<Vec<Rect>, DetectorError> {
        let (width, height) = image.dimensions();
        let min_face = params.min_size.0.min(params.min_size.1).max(SEETA_MIN_FACE_SIZE);
        if width < min_face || height < min_face {
            return Ok(Vec::new());
        }

        // The engine shrinks the image by this factor per pyramid level;
        // `min_neighbors` has no counterpart here.
        self.detector.set_min_face_size(min_face);
        self.detector.set_pyramid_scale_factor(pyramid_factor(params.scale_factor));
        self.detector.set_score_thresh(SEETA_SCORE_THRESHOLD);
        self.detector.set_slide_window_step(SEETA_WINDOW_STEP, SEETA_WINDOW_STEP);

        let faces = self
            .detector
            .detect(&rustface::ImageData::new(image.as_raw(), width, height));

        Ok(faces
            .iter()
            .filter_map(|face| {
                let bbox = face.bbox();
                Rect::try_new(bbox.x(), bbox.y(), bbox.width() as i32, bbox.height() as i32)
            })
            .filter(|r| r.width as u32 >= params.min_size.0 && r.height as u32 >= params.min_size.1)
            .collect())
    }
}

fn pyramid_factor(scale_factor: f64) -> f32 {
    if scale_factor <= 1.0 {
        return 0.8;
    }
    ((1.0 / scale_factor) as f32).clamp(0.1, 0.99)
}
