//! Image preprocessing: color to grayscale, CLAHE and global histogram equalization.

use image::{GrayImage, RgbImage};

// BT.601 luma weights, as used by the common color-to-gray transform.
const LUMA_R: f32 = 0.299;
const LUMA_G: f32 = 0.587;
const LUMA_B: f32 = 0.114;

const BINS: usize = 256;

/// Contrast-limited adaptive histogram equalization settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClaheParams {
    /// Clip height as a multiple of the average bin count per tile.
    /// Zero or negative disables clipping.
    pub clip_limit: f32,
    /// Tile grid as `(columns, rows)`.
    pub grid: (u32, u32),
}

impl Default for ClaheParams {
    fn default() -> Self {
        Self {
            clip_limit: 2.0,
            grid: (8, 8),
        }
    }
}

/// Grayscale conversion followed by CLAHE.
pub fn preprocess(image: &RgbImage, params: &ClaheParams) -> GrayImage {
    clahe(&to_grayscale(image), params)
}

/// Convert an RGB image to 8-bit grayscale with fixed luminance weights.
pub fn to_grayscale(image: &RgbImage) -> GrayImage {
    let (width, height) = image.dimensions();
    let mut gray = GrayImage::new(width, height);
    for (src, dst) in image.pixels().zip(gray.pixels_mut()) {
        let [r, g, b] = src.0;
        let luma = LUMA_R * r as f32 + LUMA_G * g as f32 + LUMA_B * b as f32;
        dst.0 = [luma.round().clamp(0.0, 255.0) as u8];
    }
    gray
}

/// Apply Contrast-Limited Adaptive Histogram Equalization.
///
/// Divides the image into a grid of tiles, computes a clipped histogram
/// per tile, builds a lookup table from each tile's CDF, and blends the
/// four nearest tile tables bilinearly so tile borders do not show.
///
/// Tiles are `ceil(dim / tiles)` pixels wide; the trailing tile in each
/// direction is truncated, and the grid shrinks when the image has fewer
/// pixels than requested tiles.
pub fn clahe(gray: &GrayImage, params: &ClaheParams) -> GrayImage {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return gray.clone();
    }

    let w = width as usize;
    let h = height as usize;
    let tile_w = w.div_ceil(params.grid.0.max(1) as usize);
    let tile_h = h.div_ceil(params.grid.1.max(1) as usize);
    let tx = w.div_ceil(tile_w);
    let ty = h.div_ceil(tile_h);

    let src = gray.as_raw();

    let mut luts: Vec<[u8; BINS]> = Vec::with_capacity(tx * ty);
    for row in 0..ty {
        for col in 0..tx {
            let x0 = col * tile_w;
            let y0 = row * tile_h;
            let x1 = (x0 + tile_w).min(w);
            let y1 = (y0 + tile_h).min(h);

            let mut hist = [0u32; BINS];
            for y in y0..y1 {
                for &p in &src[y * w + x0..y * w + x1] {
                    hist[p as usize] += 1;
                }
            }

            let tile_pixels = ((x1 - x0) * (y1 - y0)) as u32;
            if params.clip_limit > 0.0 {
                let clip = ((params.clip_limit * tile_pixels as f32 / BINS as f32) as u32).max(1);
                clip_histogram(&mut hist, clip);
            }
            luts.push(cdf_lut(&hist, tile_pixels));
        }
    }

    let mut out = GrayImage::new(width, height);
    let dst: &mut [u8] = &mut out;

    for y in 0..h {
        let fy = ((y as f32 + 0.5) / tile_h as f32 - 0.5).clamp(0.0, (ty - 1) as f32);
        let r0 = fy as usize;
        let r1 = (r0 + 1).min(ty - 1);
        let dy = fy - r0 as f32;

        for x in 0..w {
            let fx = ((x as f32 + 0.5) / tile_w as f32 - 0.5).clamp(0.0, (tx - 1) as f32);
            let c0 = fx as usize;
            let c1 = (c0 + 1).min(tx - 1);
            let dx = fx - c0 as f32;

            let pixel = src[y * w + x] as usize;
            let tl = luts[r0 * tx + c0][pixel] as f32;
            let tr = luts[r0 * tx + c1][pixel] as f32;
            let bl = luts[r1 * tx + c0][pixel] as f32;
            let br = luts[r1 * tx + c1][pixel] as f32;

            let top = tl * (1.0 - dx) + tr * dx;
            let bot = bl * (1.0 - dx) + br * dx;
            let val = top * (1.0 - dy) + bot * dy;

            dst[y * w + x] = val.round().clamp(0.0, 255.0) as u8;
        }
    }

    out
}

/// Global histogram equalization over the whole image.
///
/// A constant image is returned unchanged.
pub fn equalize_hist(gray: &GrayImage) -> GrayImage {
    let src = gray.as_raw();
    let mut hist = [0u32; BINS];
    for &p in src {
        hist[p as usize] += 1;
    }

    let Some(first) = hist.iter().position(|&c| c > 0) else {
        return gray.clone();
    };
    let total = src.len() as u32;
    if hist[first] == total {
        return gray.clone();
    }

    let scale = 255.0 / (total - hist[first]) as f32;
    let mut lut = [0u8; BINS];
    let mut sum = 0u32;
    for i in first + 1..BINS {
        sum += hist[i];
        lut[i] = (sum as f32 * scale).round().clamp(0.0, 255.0) as u8;
    }

    let (width, height) = gray.dimensions();
    let data = src.iter().map(|&p| lut[p as usize]).collect();
    // Same dimensions as the source, so the buffer always fits.
    GrayImage::from_raw(width, height, data).unwrap_or_else(|| gray.clone())
}

/// Clip every bin at `clip` and spread the excess evenly over all bins,
/// handing the remainder out one count per bin from the darkest up.
fn clip_histogram(hist: &mut [u32; BINS], clip: u32) {
    let mut excess = 0u32;
    for bin in hist.iter_mut() {
        if *bin > clip {
            excess += *bin - clip;
            *bin = clip;
        }
    }
    let redist = excess / BINS as u32;
    let leftover = (excess % BINS as u32) as usize;
    for (i, bin) in hist.iter_mut().enumerate() {
        *bin += redist;
        if i < leftover {
            *bin += 1;
        }
    }
}

fn cdf_lut(hist: &[u32; BINS], pixels: u32) -> [u8; BINS] {
    let mut lut = [0u8; BINS];
    if pixels == 0 {
        return lut;
    }
    let scale = 255.0 / pixels as f32;
    let mut sum = 0u32;
    for (i, &count) in hist.iter().enumerate() {
        sum += count;
        lut[i] = (sum as f32 * scale).round().clamp(0.0, 255.0) as u8;
    }
    lut
}
