//! facescan-core: cascade face and smile detection pipeline.
//!
//! Grayscale + CLAHE preprocessing, a pluggable cascade detector seam,
//! rectangle grouping, region-restricted secondary detection and
//! annotation. The cascade scan itself is delegated to a backend:
//! `rustface` (always available) or OpenCV (`opencv` feature).

pub mod annotate;
pub mod detector;
pub mod io;
pub mod merge;
pub mod pipeline;
pub mod preprocess;
pub mod rustface_backend;
pub mod subregion;
pub mod types;

#[cfg(feature = "opencv")]
pub mod opencv_backend;

pub use detector::{detect_all, CascadeDetector, CascadeSource, DetectorError, MultiDetector};
pub use merge::{group_rectangles, GroupingParams, RectGroup};
pub use pipeline::{
    detect_faces, detect_smiles, FaceDetection, FaceDetectionConfig, FacePipeline, SmileDetection,
    SmileDetectionConfig,
};
pub use preprocess::{preprocess, ClaheParams};
pub use rustface_backend::RustfaceCascades;
pub use subregion::{detect_within_subregions, RegionHits};
pub use types::{Classifier, DetectorConfig, Rect, ScanParams};

#[cfg(feature = "opencv")]
pub use opencv_backend::OpenCvCascades;

/// Default directory searched for cascade model files.
pub fn default_model_dir() -> std::path::PathBuf {
    std::path::PathBuf::from("/usr/share/opencv4/haarcascades")
}
