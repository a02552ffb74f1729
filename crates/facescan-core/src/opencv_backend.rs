//! Haar cascade backend via OpenCV's `CascadeClassifier`.

use crate::detector::{resolve_model_path, CascadeDetector, CascadeSource, DetectorError};
use crate::types::{Classifier, Rect, ScanParams};
use image::GrayImage;
use opencv::core::{Mat, Size, Vector};
use opencv::objdetect::{self, CascadeClassifier};
use opencv::prelude::*;
use std::path::PathBuf;

/// Cascade source that loads Haar XML models from a directory.
pub struct OpenCvCascades {
    model_dir: PathBuf,
}

impl OpenCvCascades {
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
        }
    }
}

impl CascadeSource for OpenCvCascades {
    fn open(&self, classifier: &Classifier) -> Result<Box<dyn CascadeDetector>, DetectorError> {
        if matches!(classifier, Classifier::SeetaFrontal) {
            return Err(DetectorError::Unsupported {
                classifier: classifier.to_string(),
                backend: "opencv",
            });
        }

        let path = resolve_model_path(&self.model_dir, classifier)?;
        let load_err = |reason: String| DetectorError::ClassifierLoad {
            path: path.clone(),
            reason,
        };

        let cascade = CascadeClassifier::new(&path.to_string_lossy())
            .map_err(|e| load_err(e.to_string()))?;
        if cascade.empty().map_err(|e| load_err(e.to_string()))? {
            return Err(load_err("cascade is empty".to_string()));
        }

        tracing::debug!(path = %path.display(), "loaded Haar cascade");
        Ok(Box::new(OpenCvCascade { cascade }))
    }
}

struct OpenCvCascade {
    cascade: CascadeClassifier,
}

impl CascadeDetector for OpenCvCascade {
    fn detect_regions(
        &mut self,
        image: &GrayImage,
        params: &ScanParams,
    ) -> Result<Vec<Rect>, DetectorError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Ok(Vec::new());
        }

        let failed = |e: opencv::Error| DetectorError::DetectionFailed(e.to_string());
        let pixels = image.as_raw().as_slice();
        let mat =
            Mat::new_rows_cols_with_data(height as i32, width as i32, pixels).map_err(failed)?;

        let mut objects = Vector::<opencv::core::Rect>::new();
        self.cascade
            .detect_multi_scale(
                &*mat,
                &mut objects,
                params.scale_factor,
                params.min_neighbors as i32,
                objdetect::CASCADE_SCALE_IMAGE,
                Size::new(params.min_size.0 as i32, params.min_size.1 as i32),
                Size::default(),
            )
            .map_err(failed)?;

        Ok(objects
            .iter()
            .filter_map(|r| Rect::try_new(r.x, r.y, r.width, r.height))
            .collect())
    }
}
