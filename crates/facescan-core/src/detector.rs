//! Cascade detector seam and the multi-detector that fans out over several models.
//!
//! The actual sliding-window scan lives behind [`CascadeDetector`]; a
//! [`CascadeSource`] turns a [`Classifier`] identity into a loaded detector.
//! Everything downstream only ever sees rectangles.

use crate::types::{Classifier, DetectorConfig, Rect, ScanParams};
use image::GrayImage;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("classifier file not found: {0}")]
    ClassifierNotFound(PathBuf),
    #[error("could not load classifier {path}: {reason}")]
    ClassifierLoad { path: PathBuf, reason: String },
    #[error("classifier {classifier} is not supported by the {backend} backend")]
    Unsupported {
        classifier: String,
        backend: &'static str,
    },
    #[error("detection failed: {0}")]
    DetectionFailed(String),
}

/// A loaded cascade model that can scan grayscale images.
pub trait CascadeDetector {
    /// Run a multi-scale scan and return candidate rectangles in image coordinates.
    fn detect_regions(
        &mut self,
        image: &GrayImage,
        params: &ScanParams,
    ) -> Result<Vec<Rect>, DetectorError>;
}

/// Resolves classifier identities into loaded detectors.
pub trait CascadeSource {
    fn open(&self, classifier: &Classifier) -> Result<Box<dyn CascadeDetector>, DetectorError>;
}

impl<S: CascadeSource + ?Sized> CascadeSource for &S {
    fn open(&self, classifier: &Classifier) -> Result<Box<dyn CascadeDetector>, DetectorError> {
        (**self).open(classifier)
    }
}

/// Resolve a classifier to an existing file under `model_dir`.
///
/// Absolute `Classifier::File` paths are used as-is.
pub fn resolve_model_path(
    model_dir: &Path,
    classifier: &Classifier,
) -> Result<PathBuf, DetectorError> {
    let path = model_dir.join(classifier.file_name());
    if !path.is_file() {
        return Err(DetectorError::ClassifierNotFound(path));
    }
    Ok(path)
}

/// Several independently configured detectors, loaded up front.
pub struct MultiDetector {
    passes: Vec<(DetectorConfig, Box<dyn CascadeDetector>)>,
}

impl MultiDetector {
    /// Load every classifier named in `configs`.
    ///
    /// Fails on the first classifier that cannot be resolved; nothing is
    /// scanned until all of them are available.
    pub fn open<S: CascadeSource + ?Sized>(
        source: &S,
        configs: &[DetectorConfig],
    ) -> Result<Self, DetectorError> {
        let mut passes = Vec::with_capacity(configs.len());
        for config in configs {
            let detector = source.open(&config.classifier)?;
            tracing::info!(classifier = %config.classifier, "cascade loaded");
            passes.push((config.clone(), detector));
        }
        Ok(Self { passes })
    }

    /// Number of configured passes.
    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Run every pass over `image`, concatenating results in configuration order.
    pub fn detect(&mut self, image: &GrayImage) -> Result<Vec<Rect>, DetectorError> {
        let mut rects = Vec::new();
        for (config, detector) in &mut self.passes {
            let hits = detector.detect_regions(image, &config.params)?;
            tracing::debug!(
                classifier = %config.classifier,
                hits = hits.len(),
                scale_factor = config.params.scale_factor,
                min_neighbors = config.params.min_neighbors,
                "cascade pass"
            );
            rects.extend(hits);
        }
        Ok(rects)
    }
}

/// Load all classifiers in `configs` and run them once over `image`.
pub fn detect_all<S: CascadeSource + ?Sized>(
    source: &S,
    image: &GrayImage,
    configs: &[DetectorConfig],
) -> Result<Vec<Rect>, DetectorError> {
    MultiDetector::open(source, configs)?.detect(image)
}

#[cfg(test)]
pub(crate) mod testing {
    //! Deterministic stand-ins for real cascade backends.

    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    /// Returns a fixed rectangle list and records every image it is shown.
    pub struct StubDetector {
        pub hits: Vec<Rect>,
        pub seen: Rc<RefCell<Vec<GrayImage>>>,
    }

    impl CascadeDetector for StubDetector {
        fn detect_regions(
            &mut self,
            image: &GrayImage,
            _params: &ScanParams,
        ) -> Result<Vec<Rect>, DetectorError> {
            self.seen.borrow_mut().push(image.clone());
            Ok(self.hits.clone())
        }
    }

    /// Serves [`StubDetector`]s keyed by classifier; unknown classifiers are "missing".
    #[derive(Default)]
    pub struct StubSource {
        pub hits: HashMap<Classifier, Vec<Rect>>,
        pub seen: Rc<RefCell<Vec<GrayImage>>>,
    }

    impl StubSource {
        pub fn with(mut self, classifier: Classifier, hits: Vec<Rect>) -> Self {
            self.hits.insert(classifier, hits);
            self
        }
    }

    impl CascadeSource for StubSource {
        fn open(&self, classifier: &Classifier) -> Result<Box<dyn CascadeDetector>, DetectorError> {
            let hits = self
                .hits
                .get(classifier)
                .cloned()
                .ok_or_else(|| DetectorError::ClassifierNotFound(classifier.file_name()))?;
            Ok(Box::new(StubDetector {
                hits,
                seen: Rc::clone(&self.seen),
            }))
        }
    }
}
