//! Rectangle overlays on owned image copies.

use crate::types::Rect;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect as PixelRect;

pub const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
pub const RED: Rgb<u8> = Rgb([255, 0, 0]);

/// Copy `image` and draw an unfilled border for every rectangle.
///
/// Geometry outside the image is clipped.
pub fn annotate(image: &RgbImage, rects: &[Rect], color: Rgb<u8>, thickness: u32) -> RgbImage {
    let mut out = image.clone();
    for rect in rects {
        draw_rect_mut(&mut out, rect, color, thickness);
    }
    out
}

/// Draw rectangles given in `region`-local coordinates.
///
/// The region is copied into its own buffer, drawn on, and written back into
/// a copy of `image`, so drawing never aliases the pixels being read.
pub fn annotate_region(
    image: &RgbImage,
    region: &Rect,
    local_rects: &[Rect],
    color: Rgb<u8>,
    thickness: u32,
) -> RgbImage {
    let mut out = image.clone();
    let (width, height) = image.dimensions();
    let Some(region) = region.clamp_to(width, height) else {
        return out;
    };

    let mut patch = image::imageops::crop_imm(
        image,
        region.x as u32,
        region.y as u32,
        region.width as u32,
        region.height as u32,
    )
    .to_image();
    for rect in local_rects {
        draw_rect_mut(&mut patch, rect, color, thickness);
    }
    image::imageops::replace(&mut out, &patch, region.x as i64, region.y as i64);
    out
}

/// Draw an unfilled border in place as `thickness` concentric outlines.
///
/// The band straddles the edges `x`, `x + width`, `y` and `y + height`:
/// `thickness / 2` outlines lie outside them, the rest on or inside.
pub fn draw_rect_mut(image: &mut RgbImage, rect: &Rect, color: Rgb<u8>, thickness: u32) {
    let (width, height) = (image.width() as i64, image.height() as i64);
    let before = thickness as i64 / 2;

    for offset in -before..thickness as i64 - before {
        let (left, top) = (rect.x as i64 + offset, rect.y as i64 + offset);
        let (right, bottom) = (rect.right() - offset, rect.bottom() - offset);
        if right < left || bottom < top {
            break;
        }
        if right < 0 || bottom < 0 || left >= width || top >= height {
            continue;
        }

        // Edges past the image sit one pixel outside it, where nothing is drawn.
        let (left, top) = (left.max(-1), top.max(-1));
        let (right, bottom) = (right.min(width), bottom.min(height));
        let outline = PixelRect::at(left as i32, top as i32)
            .of_size((right - left + 1) as u32, (bottom - top + 1) as u32);
        draw_hollow_rect_mut(image, outline, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

    fn count(image: &RgbImage, color: Rgb<u8>) -> usize {
        image.pixels().filter(|&&p| p == color).count()
    }

    #[test]
    fn test_annotate_does_not_mutate_input() {
        let image = RgbImage::from_pixel(20, 20, BLACK);
        let out = annotate(&image, &[Rect::new(2, 2, 10, 10)], GREEN, 2);
        assert_eq!(count(&image, GREEN), 0);
        assert!(count(&out, GREEN) > 0);
        assert_eq!(out.dimensions(), image.dimensions());
    }

    #[test]
    fn test_thin_border_outline() {
        let image = RgbImage::from_pixel(20, 20, BLACK);
        let out = annotate(&image, &[Rect::new(5, 5, 4, 3)], GREEN, 1);

        // Edges at x=5, x=9, y=5, y=8 (inclusive corners).
        assert_eq!(*out.get_pixel(5, 5), GREEN);
        assert_eq!(*out.get_pixel(9, 8), GREEN);
        assert_eq!(*out.get_pixel(7, 5), GREEN);
        assert_eq!(*out.get_pixel(5, 7), GREEN);
        // Interior untouched.
        assert_eq!(*out.get_pixel(7, 6), BLACK);
        assert_eq!(*out.get_pixel(6, 7), BLACK);
        // Perimeter of a 5x4 box.
        assert_eq!(count(&out, GREEN), 2 * 5 + 2 * 2);
    }

    #[test]
    fn test_out_of_bounds_rects_are_clipped() {
        let image = RgbImage::from_pixel(30, 20, BLACK);
        let rects = [
            Rect::new(-10, -10, 25, 25),
            Rect::new(25, 15, 100, 100),
            Rect::new(1000, 1000, 5, 5),
            Rect::new(-50, -50, 5, 5),
            Rect::new(i32::MAX - 1, i32::MIN + 1, i32::MAX, i32::MAX),
        ];
        let out = annotate(&image, &rects, RED, 3);
        assert_eq!(out.dimensions(), (30, 20));
        assert!(count(&out, RED) > 0);
    }

    #[test]
    fn test_thick_border_straddles_edges() {
        let image = RgbImage::from_pixel(20, 20, BLACK);
        let out = annotate(&image, &[Rect::new(5, 5, 6, 6)], GREEN, 2);

        // One outline just outside the edges, one on them.
        assert_eq!(*out.get_pixel(4, 4), GREEN);
        assert_eq!(*out.get_pixel(12, 12), GREEN);
        assert_eq!(*out.get_pixel(5, 8), GREEN);
        assert_eq!(*out.get_pixel(11, 8), GREEN);
        assert_eq!(*out.get_pixel(3, 3), BLACK);
        assert_eq!(*out.get_pixel(6, 6), BLACK);
        // 9x9 and 7x7 outlines.
        assert_eq!(count(&out, GREEN), 4 * 8 + 4 * 6);
    }

    #[test]
    fn test_edge_past_image_is_not_pulled_onto_border() {
        let image = RgbImage::from_pixel(20, 20, BLACK);
        let out = annotate(&image, &[Rect::new(15, 5, 10, 4)], GREEN, 1);

        assert_eq!(*out.get_pixel(15, 7), GREEN);
        assert_eq!(*out.get_pixel(19, 5), GREEN);
        assert_eq!(*out.get_pixel(19, 9), GREEN);
        // The right edge at x=25 is off-image; column 19 only carries top and bottom.
        assert_eq!(*out.get_pixel(19, 7), BLACK);
    }

    #[test]
    fn test_collapsed_outlines_stop_drawing() {
        let image = RgbImage::from_pixel(10, 10, BLACK);
        let out = annotate(&image, &[Rect::new(4, 4, 1, 1)], GREEN, 6);
        assert_eq!(out.dimensions(), (10, 10));
        assert_eq!(*out.get_pixel(1, 1), GREEN);
    }

    #[test]
    fn test_zero_thickness_draws_nothing() {
        let image = RgbImage::from_pixel(10, 10, BLACK);
        let out = annotate(&image, &[Rect::new(1, 1, 5, 5)], GREEN, 0);
        assert_eq!(out, image);
    }

    #[test]
    fn test_annotate_region_offsets_and_clips_to_region() {
        let image = RgbImage::from_pixel(40, 40, BLACK);
        let region = Rect::new(10, 20, 10, 10);
        // Local rect spills past the region; drawing stays inside it.
        let out = annotate_region(&image, &region, &[Rect::new(2, 2, 20, 20)], RED, 1);

        assert_eq!(*out.get_pixel(12, 22), RED);
        assert_eq!(*out.get_pixel(15, 22), RED);
        for (x, y, p) in out.enumerate_pixels() {
            if *p == RED {
                let inside = (10..20).contains(&x) && (20..30).contains(&y);
                assert!(inside, "({x},{y}) outside region");
            }
        }
        assert_eq!(count(&image, RED), 0);
    }

    #[test]
    fn test_annotate_region_outside_image() {
        let image = RgbImage::from_pixel(10, 10, BLACK);
        let out = annotate_region(
            &image,
            &Rect::new(50, 50, 5, 5),
            &[Rect::new(0, 0, 2, 2)],
            RED,
            1,
        );
        assert_eq!(out, image);
    }
}
