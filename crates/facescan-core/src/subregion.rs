//! Secondary detection restricted to part of each primary hit (e.g. smiles in the lower face).

use crate::detector::{CascadeSource, DetectorError, MultiDetector};
use crate::preprocess::equalize_hist;
use crate::types::{DetectorConfig, Rect};
use image::GrayImage;
use serde::{Deserialize, Serialize};

/// Inner detections for one outer rectangle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionHits {
    /// Index into the outer rectangle list.
    pub outer_index: usize,
    /// Searched area in full-image coordinates; `None` if it fell outside the image.
    pub region: Option<Rect>,
    /// Hits relative to the region's top-left corner.
    pub hits: Vec<Rect>,
}

impl RegionHits {
    /// Hits translated back into full-image coordinates.
    pub fn to_image_coords(&self) -> Vec<Rect> {
        match self.region {
            Some(region) => self.hits.iter().map(|r| r.offset(region.x, region.y)).collect(),
            None => Vec::new(),
        }
    }
}

/// The band `[y + floor(h * fraction), y + h)` × `[x, x + w)` of `outer`,
/// clamped to a `width` × `height` image.
pub fn lower_region(
    outer: &Rect,
    vertical_offset_fraction: f64,
    width: u32,
    height: u32,
) -> Option<Rect> {
    let fraction = vertical_offset_fraction.clamp(0.0, 1.0);
    let skip = (outer.height as f64 * fraction).floor() as i32;
    let top = outer.y.saturating_add(skip);
    let band = Rect::try_new(outer.x, top, outer.width, outer.height - skip)?;
    band.clamp_to(width, height)
}

/// Run `inner` over the lower part of every outer rectangle.
///
/// Each band is copied out, globally histogram-equalized, and scanned on its
/// own; one entry is returned per outer rectangle, in order.
pub fn detect_within_subregions<S: CascadeSource + ?Sized>(
    source: &S,
    image: &GrayImage,
    outer: &[Rect],
    inner: &DetectorConfig,
    vertical_offset_fraction: f64,
) -> Result<Vec<RegionHits>, DetectorError> {
    let mut detector = MultiDetector::open(source, std::slice::from_ref(inner))?;
    let (width, height) = image.dimensions();

    let mut results = Vec::with_capacity(outer.len());
    for (outer_index, rect) in outer.iter().enumerate() {
        let Some(region) = lower_region(rect, vertical_offset_fraction, width, height) else {
            tracing::debug!(outer_index, ?rect, "sub-region outside image");
            results.push(RegionHits {
                outer_index,
                region: None,
                hits: Vec::new(),
            });
            continue;
        };

        let crop = image::imageops::crop_imm(
            image,
            region.x as u32,
            region.y as u32,
            region.width as u32,
            region.height as u32,
        )
        .to_image();
        let hits = detector.detect(&equalize_hist(&crop))?;

        tracing::debug!(outer_index, ?region, hits = hits.len(), "sub-region scanned");
        results.push(RegionHits {
            outer_index,
            region: Some(region),
            hits,
        });
    }

    Ok(results)
}
