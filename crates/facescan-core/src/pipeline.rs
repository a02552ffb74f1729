//! End-to-end face and smile pipelines.
//!
//! preprocess → multi-detector → merge → annotate, with every setting carried
//! in a freshly built config value.

use crate::annotate::{annotate, annotate_region, GREEN, RED};
use crate::detector::{CascadeSource, DetectorError, MultiDetector};
use crate::merge::{group, GroupingParams};
use crate::preprocess::{clahe, to_grayscale, ClaheParams};
use crate::subregion::{detect_within_subregions, RegionHits};
use crate::types::{Classifier, DetectorConfig, Rect, ScanParams};
use image::{Rgb, RgbImage};

/// Settings for face detection on a single image or frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceDetectionConfig {
    /// Detector passes, run in order.
    pub cascades: Vec<DetectorConfig>,
    /// Contrast equalization before detection; `None` uses plain grayscale.
    pub clahe: Option<ClaheParams>,
    /// Rectangle grouping; `None` reports raw detections.
    pub grouping: Option<GroupingParams>,
    pub box_color: Rgb<u8>,
    pub thickness: u32,
}

impl Default for FaceDetectionConfig {
    /// Three frontal-face cascades, CLAHE and grouping.
    fn default() -> Self {
        let params = ScanParams::new(1.05, 4, (30, 30));
        Self {
            cascades: vec![
                DetectorConfig::new(Classifier::FrontalFaceDefault, params),
                DetectorConfig::new(Classifier::FrontalFaceAlt2, params),
                DetectorConfig::new(Classifier::FrontalFaceAltTree, params),
            ],
            clahe: Some(ClaheParams::default()),
            grouping: Some(GroupingParams::default()),
            box_color: GREEN,
            thickness: 2,
        }
    }
}

impl FaceDetectionConfig {
    /// Single cascade on plain grayscale, no grouping; suited to webcam frames.
    pub fn live() -> Self {
        Self {
            cascades: vec![DetectorConfig::new(
                Classifier::FrontalFaceDefault,
                ScanParams::new(1.1, 5, (30, 30)),
            )],
            clahe: None,
            grouping: None,
            ..Self::default()
        }
    }

    /// Replace the scan parameters of every pass.
    pub fn with_scan_params(mut self, params: ScanParams) -> Self {
        for cascade in &mut self.cascades {
            cascade.params = params;
        }
        self
    }
}

/// Faces found in one image, plus the annotated copy.
#[derive(Debug, Clone)]
pub struct FaceDetection {
    pub faces: Vec<Rect>,
    pub annotated: RgbImage,
}

/// Loaded face pipeline, reusable across frames.
pub struct FacePipeline {
    detector: MultiDetector,
    config: FaceDetectionConfig,
}

impl FacePipeline {
    pub fn new<S: CascadeSource + ?Sized>(
        source: &S,
        config: FaceDetectionConfig,
    ) -> Result<Self, DetectorError> {
        let detector = MultiDetector::open(source, &config.cascades)?;
        Ok(Self { detector, config })
    }

    pub fn process(&mut self, image: &RgbImage) -> Result<FaceDetection, DetectorError> {
        let gray = to_grayscale(image);
        let gray = match &self.config.clahe {
            Some(params) => clahe(&gray, params),
            None => gray,
        };

        let raw = self.detector.detect(&gray)?;
        let faces: Vec<Rect> = match &self.config.grouping {
            Some(params) => group(&raw, params).into_iter().map(|g| g.rect).collect(),
            None => raw.clone(),
        };
        tracing::debug!(raw = raw.len(), faces = faces.len(), "face pass complete");

        let annotated = annotate(image, &faces, self.config.box_color, self.config.thickness);
        Ok(FaceDetection { faces, annotated })
    }
}

/// Detect faces in one image.
pub fn detect_faces<S: CascadeSource + ?Sized>(
    source: &S,
    image: &RgbImage,
    config: &FaceDetectionConfig,
) -> Result<FaceDetection, DetectorError> {
    FacePipeline::new(source, config.clone())?.process(image)
}

/// Settings for face-then-smile detection.
#[derive(Debug, Clone, PartialEq)]
pub struct SmileDetectionConfig {
    pub face: DetectorConfig,
    pub smile: DetectorConfig,
    /// Fraction of the face height skipped from the top before searching.
    pub vertical_offset_fraction: f64,
    pub box_color: Rgb<u8>,
    pub thickness: u32,
}

impl Default for SmileDetectionConfig {
    fn default() -> Self {
        Self {
            face: DetectorConfig::new(
                Classifier::FrontalFaceDefault,
                ScanParams::new(1.1, 5, (30, 30)),
            ),
            smile: DetectorConfig::new(Classifier::Smile, ScanParams::new(1.3, 10, (15, 15))),
            vertical_offset_fraction: 0.5,
            box_color: RED,
            thickness: 2,
        }
    }
}

/// Faces, smiles per face, and the annotated copy.
#[derive(Debug, Clone)]
pub struct SmileDetection {
    pub faces: Vec<Rect>,
    pub smiles: Vec<RegionHits>,
    pub annotated: RgbImage,
}

impl SmileDetection {
    pub fn total_smiles(&self) -> usize {
        self.smiles.iter().map(|r| r.hits.len()).sum()
    }
}

/// Detect faces, then smiles in the lower part of each face.
///
/// Only smiles are drawn.
pub fn detect_smiles<S: CascadeSource + ?Sized>(
    source: &S,
    image: &RgbImage,
    config: &SmileDetectionConfig,
) -> Result<SmileDetection, DetectorError> {
    let mut face_detector = MultiDetector::open(source, std::slice::from_ref(&config.face))?;
    let gray = to_grayscale(image);

    let faces = face_detector.detect(&gray)?;
    let smiles = detect_within_subregions(
        source,
        &gray,
        &faces,
        &config.smile,
        config.vertical_offset_fraction,
    )?;

    let mut annotated = image.clone();
    for hits in &smiles {
        if let Some(region) = &hits.region {
            annotated = annotate_region(
                &annotated,
                region,
                &hits.hits,
                config.box_color,
                config.thickness,
            );
        }
    }

    let detection = SmileDetection {
        faces,
        smiles,
        annotated,
    };
    tracing::debug!(
        faces = detection.faces.len(),
        smiles = detection.total_smiles(),
        "smile pass complete"
    );
    Ok(detection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::testing::StubSource;
    use image::GrayImage;

    /// Uniform gray 100x100 with a bright 20x20 square at (40, 40).
    fn square_scene() -> RgbImage {
        RgbImage::from_fn(100, 100, |x, y| {
            if (40..60).contains(&x) && (40..60).contains(&y) {
                Rgb([240, 240, 240])
            } else {
                Rgb([128, 128, 128])
            }
        })
    }

    fn two_cascades() -> FaceDetectionConfig {
        let params = ScanParams::new(1.1, 3, (10, 10));
        FaceDetectionConfig {
            cascades: vec![
                DetectorConfig::new(Classifier::FrontalFaceDefault, params),
                DetectorConfig::new(Classifier::FrontalFaceAlt2, params),
            ],
            clahe: Some(ClaheParams::default()),
            grouping: Some(GroupingParams {
                group_threshold: 1,
                eps: 0.2,
                suppress_nested: false,
            }),
            ..FaceDetectionConfig::default()
        }
    }

    #[test]
    fn test_two_cascades_agreeing_merge_to_one_face() {
        let square = Rect::new(40, 40, 20, 20);
        let source = StubSource::default()
            .with(Classifier::FrontalFaceDefault, vec![square])
            .with(Classifier::FrontalFaceAlt2, vec![square]);

        let image = square_scene();
        let result = detect_faces(&source, &image, &two_cascades()).unwrap();

        assert_eq!(result.faces.len(), 1);
        let face = result.faces[0];
        assert!((face.x - 40).abs() <= 1 && (face.y - 40).abs() <= 1);
        assert!((face.width - 20).abs() <= 1 && (face.height - 20).abs() <= 1);

        assert_eq!(result.annotated.dimensions(), image.dimensions());
        assert_eq!(*result.annotated.get_pixel(40, 40), GREEN);
        assert_eq!(*image.get_pixel(40, 40), Rgb([240, 240, 240]));
    }

    #[test]
    fn test_detectors_receive_equalized_grayscale() {
        let square = Rect::new(40, 40, 20, 20);
        let source = StubSource::default()
            .with(Classifier::FrontalFaceDefault, vec![square])
            .with(Classifier::FrontalFaceAlt2, vec![square]);

        let image = square_scene();
        let config = two_cascades();
        detect_faces(&source, &image, &config).unwrap();

        let expected: GrayImage = clahe(&to_grayscale(&image), &ClaheParams::default());
        let seen = source.seen.borrow();
        assert_eq!(seen.len(), 2);
        assert!(seen.iter().all(|img| *img == expected));
    }

    #[test]
    fn test_single_cascade_hit_is_dropped_by_grouping() {
        let source = StubSource::default()
            .with(Classifier::FrontalFaceDefault, vec![Rect::new(40, 40, 20, 20)])
            .with(Classifier::FrontalFaceAlt2, vec![Rect::new(0, 0, 20, 20)]);

        let result = detect_faces(&source, &square_scene(), &two_cascades()).unwrap();
        assert!(result.faces.is_empty());
    }

    #[test]
    fn test_live_config_reports_raw_hits() {
        let hits = vec![Rect::new(10, 10, 30, 30), Rect::new(11, 10, 30, 30)];
        let source = StubSource::default().with(Classifier::FrontalFaceDefault, hits.clone());

        let mut pipeline = FacePipeline::new(&source, FaceDetectionConfig::live()).unwrap();
        for _ in 0..2 {
            let result = pipeline.process(&square_scene()).unwrap();
            assert_eq!(result.faces, hits);
        }
        // No CLAHE: detectors see the plain grayscale frame.
        assert_eq!(source.seen.borrow()[0], to_grayscale(&square_scene()));
    }

    #[test]
    fn test_missing_cascade_aborts_face_detection() {
        let source = StubSource::default().with(Classifier::FrontalFaceDefault, vec![]);
        let config = FaceDetectionConfig::default();
        let err = detect_faces(&source, &square_scene(), &config).unwrap_err();
        assert!(matches!(err, DetectorError::ClassifierNotFound(_)));
    }

    #[test]
    fn test_default_configs_are_independent_values() {
        let mut a = FaceDetectionConfig::default();
        a.cascades.clear();
        a.clahe = None;
        let b = FaceDetectionConfig::default();
        assert_eq!(b.cascades.len(), 3);
        assert!(b.clahe.is_some());
    }

    #[test]
    fn test_with_scan_params_overrides_all_passes() {
        let params = ScanParams::new(1.2, 7, (40, 40));
        let config = FaceDetectionConfig::default().with_scan_params(params);
        assert!(config.cascades.iter().all(|c| c.params == params));
    }

    #[test]
    fn test_smiles_drawn_in_lower_face() {
        let source = StubSource::default()
            .with(
                Classifier::FrontalFaceDefault,
                vec![Rect::new(10, 10, 50, 50), Rect::new(70, 10, 20, 20)],
            )
            .with(Classifier::Smile, vec![Rect::new(5, 5, 10, 6)]);

        let image = RgbImage::from_pixel(100, 100, Rgb([90, 90, 90]));
        let result = detect_smiles(&source, &image, &SmileDetectionConfig::default()).unwrap();

        assert_eq!(result.faces.len(), 2);
        assert_eq!(result.total_smiles(), 2);
        assert_eq!(result.smiles[0].region, Some(Rect::new(10, 35, 50, 25)));
        assert_eq!(result.smiles[0].to_image_coords(), vec![Rect::new(15, 40, 10, 6)]);

        // Smile border drawn at the translated position, face border not drawn.
        assert_eq!(*result.annotated.get_pixel(15, 40), RED);
        assert_eq!(*result.annotated.get_pixel(30, 10), Rgb([90, 90, 90]));
        assert_eq!(result.annotated.dimensions(), (100, 100));
    }

    #[test]
    fn test_no_faces_no_smiles() {
        let source = StubSource::default()
            .with(Classifier::FrontalFaceDefault, vec![])
            .with(Classifier::Smile, vec![Rect::new(1, 1, 5, 5)]);
        let image = RgbImage::new(40, 40);
        let result = detect_smiles(&source, &image, &SmileDetectionConfig::default()).unwrap();
        assert!(result.faces.is_empty());
        assert_eq!(result.total_smiles(), 0);
        assert_eq!(result.annotated, image);
    }
}
