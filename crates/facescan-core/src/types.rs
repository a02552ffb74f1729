use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Axis-aligned rectangle in integer pixel coordinates.
///
/// `width` and `height` are always positive for rectangles produced by this
/// crate; use [`Rect::try_new`] when converting foreign geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// Build a rectangle, rejecting empty or negative extents.
    pub fn try_new(x: i32, y: i32, width: i32, height: i32) -> Option<Self> {
        (width > 0 && height > 0).then_some(Self { x, y, width, height })
    }

    /// Exclusive right edge.
    pub fn right(&self) -> i64 {
        self.x as i64 + self.width as i64
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> i64 {
        self.y as i64 + self.height as i64
    }

    /// Intersect with a `width` × `height` image. `None` if nothing remains.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<Rect> {
        let x0 = (self.x as i64).clamp(0, width as i64);
        let y0 = (self.y as i64).clamp(0, height as i64);
        let x1 = self.right().clamp(0, width as i64);
        let y1 = self.bottom().clamp(0, height as i64);
        Rect::try_new(x0 as i32, y0 as i32, (x1 - x0) as i32, (y1 - y0) as i32)
    }

    /// Shift by `(dx, dy)`, e.g. from sub-image to full-image coordinates.
    pub fn offset(&self, dx: i32, dy: i32) -> Rect {
        Rect {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
            ..*self
        }
    }
}

/// Parameters for one multi-scale cascade scan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanParams {
    /// Geometric step between successive scan scales (> 1.0).
    pub scale_factor: f64,
    /// Raw hits needed before the scan reports a candidate.
    pub min_neighbors: u32,
    /// Candidates smaller than `(width, height)` are discarded.
    pub min_size: (u32, u32),
}

impl ScanParams {
    pub const fn new(scale_factor: f64, min_neighbors: u32, min_size: (u32, u32)) -> Self {
        Self {
            scale_factor,
            min_neighbors,
            min_size,
        }
    }
}

/// Identity of a pre-trained cascade model.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Classifier {
    FrontalFaceDefault,
    FrontalFaceAlt2,
    FrontalFaceAltTree,
    Smile,
    /// SeetaFace frontal funnel cascade, served by the rustface backend.
    SeetaFrontal,
    /// Explicit model file; relative paths are resolved against the model directory.
    File(PathBuf),
}

impl Classifier {
    /// File name of the model inside a model directory.
    pub fn file_name(&self) -> PathBuf {
        match self {
            Classifier::FrontalFaceDefault => "haarcascade_frontalface_default.xml".into(),
            Classifier::FrontalFaceAlt2 => "haarcascade_frontalface_alt2.xml".into(),
            Classifier::FrontalFaceAltTree => "haarcascade_frontalface_alt_tree.xml".into(),
            Classifier::Smile => "haarcascade_smile.xml".into(),
            Classifier::SeetaFrontal => "seeta_fd_frontal_v1.0.bin".into(),
            Classifier::File(path) => path.clone(),
        }
    }

    /// Parse a short name (`default`, `alt2`, `alt-tree`, `smile`, `seeta`)
    /// or fall back to treating the string as a file path.
    pub fn parse(name: &str) -> Self {
        match name {
            "default" | "frontalface_default" => Classifier::FrontalFaceDefault,
            "alt2" | "frontalface_alt2" => Classifier::FrontalFaceAlt2,
            "alt-tree" | "alt_tree" | "frontalface_alt_tree" => Classifier::FrontalFaceAltTree,
            "smile" => Classifier::Smile,
            "seeta" | "seeta_frontal" => Classifier::SeetaFrontal,
            other => Classifier::File(PathBuf::from(other)),
        }
    }
}

impl std::fmt::Display for Classifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.file_name().display())
    }
}

/// One detector pass: which model, and how to scan with it.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    pub classifier: Classifier,
    pub params: ScanParams,
}

impl DetectorConfig {
    pub fn new(classifier: Classifier, params: ScanParams) -> Self {
        Self { classifier, params }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_new_rejects_empty() {
        assert!(Rect::try_new(0, 0, 0, 5).is_none());
        assert!(Rect::try_new(0, 0, 5, -1).is_none());
        assert_eq!(Rect::try_new(1, 2, 3, 4), Some(Rect::new(1, 2, 3, 4)));
    }

    #[test]
    fn test_clamp_to_partial_overlap() {
        let r = Rect::new(-10, 90, 30, 30);
        assert_eq!(r.clamp_to(100, 100), Some(Rect::new(0, 90, 20, 10)));
    }

    #[test]
    fn test_clamp_to_outside() {
        assert!(Rect::new(150, 0, 10, 10).clamp_to(100, 100).is_none());
        assert!(Rect::new(-20, -20, 10, 10).clamp_to(100, 100).is_none());
    }

    #[test]
    fn test_offset() {
        assert_eq!(Rect::new(1, 2, 3, 4).offset(10, 35), Rect::new(11, 37, 3, 4));
    }

    #[test]
    fn test_classifier_parse() {
        assert_eq!(Classifier::parse("alt2"), Classifier::FrontalFaceAlt2);
        assert_eq!(Classifier::parse("smile"), Classifier::Smile);
        assert_eq!(
            Classifier::parse("models/custom.xml"),
            Classifier::File(PathBuf::from("models/custom.xml"))
        );
        assert_eq!(
            Classifier::FrontalFaceDefault.file_name(),
            PathBuf::from("haarcascade_frontalface_default.xml")
        );
    }

    #[test]
    fn test_rect_serializes_as_object() {
        let json = serde_json::to_string(&Rect::new(1, 2, 3, 4)).unwrap();
        assert_eq!(json, r#"{"x":1,"y":2,"width":3,"height":4}"#);
    }
}
