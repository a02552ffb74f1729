//! Image file input and output.

use image::RgbImage;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InputError {
    #[error("image not found: {0}")]
    NotFound(PathBuf),
    #[error("could not decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("could not write {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Load an image file as 8-bit RGB. Format is inferred from the contents.
pub fn load_image(path: &Path) -> Result<RgbImage, InputError> {
    if !path.is_file() {
        return Err(InputError::NotFound(path.to_path_buf()));
    }
    let image = image::ImageReader::open(path)
        .map_err(|e| InputError::Decode {
            path: path.to_path_buf(),
            source: e.into(),
        })?
        .with_guessed_format()
        .map_err(|e| InputError::Decode {
            path: path.to_path_buf(),
            source: e.into(),
        })?
        .decode()
        .map_err(|source| InputError::Decode {
            path: path.to_path_buf(),
            source,
        })?;

    tracing::debug!(
        path = %path.display(),
        width = image.width(),
        height = image.height(),
        "image loaded"
    );
    Ok(image.to_rgb8())
}

/// Write an RGB image; the format follows the file extension.
pub fn save_image(image: &RgbImage, path: &Path) -> Result<(), InputError> {
    image.save(path).map_err(|source| InputError::Encode {
        path: path.to_path_buf(),
        source,
    })
}

/// `photo.jpg` → `photo_annotated.png` next to the input.
pub fn annotated_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    input.with_file_name(format!("{stem}_annotated.png"))
}
