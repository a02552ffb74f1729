use anyhow::{bail, Result};
use clap::ValueEnum;
use facescan_core::{CascadeSource, Classifier, RustfaceCascades};
use std::path::{Path, PathBuf};

/// Which library performs the cascade scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// Pure-Rust SeetaFace cascade (frontal faces only).
    Rustface,
    /// OpenCV Haar cascades (needs the `opencv` build feature).
    Opencv,
}

impl Backend {
    fn parse(value: &str) -> Option<Self> {
        <Self as ValueEnum>::from_str(value, true).ok()
    }

    /// Backend used when nothing is configured.
    pub fn preferred() -> Self {
        if cfg!(feature = "opencv") {
            Backend::Opencv
        } else {
            Backend::Rustface
        }
    }

    /// Frontal-face classifier this backend can load.
    pub fn face_classifier(&self) -> Classifier {
        match self {
            Backend::Rustface => Classifier::SeetaFrontal,
            Backend::Opencv => Classifier::FrontalFaceDefault,
        }
    }

    /// Instantiate the cascade source rooted at `model_dir`.
    pub fn source(&self, model_dir: &Path) -> Result<Box<dyn CascadeSource>> {
        match self {
            Backend::Rustface => Ok(Box::new(RustfaceCascades::new(model_dir))),
            #[cfg(feature = "opencv")]
            Backend::Opencv => Ok(Box::new(facescan_core::OpenCvCascades::new(model_dir))),
            #[cfg(not(feature = "opencv"))]
            Backend::Opencv => bail!("facescan was built without the `opencv` feature"),
        }
    }
}

/// Runtime configuration, loaded from environment variables.
pub struct Config {
    /// Directory containing cascade model files.
    pub model_dir: PathBuf,
    pub backend: Backend,
    /// V4L2 camera index (`/dev/video{N}`).
    pub camera_index: u32,
    /// Requested capture size; the driver may pick another.
    pub frame_width: u32,
    pub frame_height: u32,
}

impl Config {
    /// Load configuration from `FACESCAN_*` environment variables with defaults.
    pub fn from_env() -> Result<Self> {
        let model_dir = std::env::var("FACESCAN_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| facescan_core::default_model_dir());

        let backend = match std::env::var("FACESCAN_BACKEND") {
            Ok(value) => match Backend::parse(&value) {
                Some(backend) => backend,
                None => bail!(
                    "FACESCAN_BACKEND: unknown backend {value:?} (expected rustface or opencv)"
                ),
            },
            Err(_) => Backend::preferred(),
        };

        Ok(Self {
            model_dir,
            backend,
            camera_index: env_u32("FACESCAN_CAMERA_INDEX", 0),
            frame_width: env_u32("FACESCAN_FRAME_WIDTH", 640),
            frame_height: env_u32("FACESCAN_FRAME_HEIGHT", 480),
        })
    }
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_parse() {
        assert_eq!(Backend::parse("rustface"), Some(Backend::Rustface));
        assert_eq!(Backend::parse("OpenCV"), Some(Backend::Opencv));
        assert_eq!(Backend::parse("dlib"), None);
    }

    #[test]
    fn test_face_classifier_matches_backend() {
        assert_eq!(Backend::Rustface.face_classifier(), Classifier::SeetaFrontal);
        assert_eq!(Backend::Opencv.face_classifier(), Classifier::FrontalFaceDefault);
    }

    #[cfg(not(feature = "opencv"))]
    #[test]
    fn test_opencv_backend_unavailable_without_feature() {
        assert!(Backend::Opencv.source(Path::new("/tmp")).is_err());
        assert_eq!(Backend::preferred(), Backend::Rustface);
    }
}
