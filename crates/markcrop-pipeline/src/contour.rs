//! Contour tracing: external boundaries of marker regions in a binary mask.
//!
//! Uses Suzuki-Abe border following via
//! [`imageproc::contours::find_contours`], keeping only outer borders
//! that are not nested inside another region. A mark drawn inside
//! another mark is therefore never a separate target.
//!
//! Contours come back in discovery order: the raster scan visits rows
//! top to bottom and columns left to right, and a contour is emitted
//! when its first pixel is reached.

use image::GrayImage;
use imageproc::contours::{BorderType, Contour};

use crate::types::PixelPoint;

/// Trace the external contours of every foreground region in `mask`.
///
/// Returns an empty list if the mask has no foreground pixels.
#[must_use]
pub fn external_contours(mask: &GrayImage) -> Vec<Vec<PixelPoint>> {
    let contours: Vec<Contour<u32>> = imageproc::contours::find_contours(mask);

    contours
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(|c| {
            c.points
                .into_iter()
                .map(|p| PixelPoint::new(p.x, p.y))
                .collect()
        })
        .collect()
}

/// Area enclosed by a closed contour, by the shoelace formula.
///
/// The contour is treated as a polygon through the pixel positions, so a
/// single pixel or a one-pixel-wide line encloses zero area.
#[must_use]
pub fn contour_area(contour: &[PixelPoint]) -> f64 {
    if contour.len() < 3 {
        return 0.0;
    }
    let twice: f64 = contour
        .iter()
        .zip(contour.iter().cycle().skip(1))
        .map(|(a, b)| {
            let (ax, ay) = (f64::from(a.x), f64::from(a.y));
            let (bx, by) = (f64::from(b.x), f64::from(b.y));
            ax.mul_add(by, -(bx * ay))
        })
        .sum();
    twice.abs() / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_from(size: u32, on: impl Fn(u32, u32) -> bool) -> GrayImage {
        GrayImage::from_fn(size, size, |x, y| image::Luma([if on(x, y) { 255 } else { 0 }]))
    }

    /// Square outline from `lo` to `hi` inclusive, `thickness` pixels wide.
    fn ring(lo: u32, hi: u32, thickness: u32) -> impl Fn(u32, u32) -> bool {
        move |x, y| {
            let inside = (lo..=hi).contains(&x) && (lo..=hi).contains(&y);
            let hollow = (lo + thickness..=hi - thickness).contains(&x)
                && (lo + thickness..=hi - thickness).contains(&y);
            inside && !hollow
        }
    }

    #[test]
    fn empty_mask_has_no_contours() {
        assert!(external_contours(&GrayImage::new(10, 10)).is_empty());
    }

    #[test]
    fn filled_square_has_one_contour() {
        let mask = mask_from(20, |x, y| (5..15).contains(&x) && (5..15).contains(&y));
        let contours = external_contours(&mask);
        assert_eq!(contours.len(), 1);
        let area = contour_area(&contours[0]);
        assert!((area - 81.0).abs() < 1e-9, "area was {area}");
    }

    #[test]
    fn ring_hole_is_not_reported() {
        let mask = mask_from(40, ring(5, 30, 3));
        let contours = external_contours(&mask);
        assert_eq!(contours.len(), 1, "hole border must be excluded");
        // The outer border encloses the hollow interior too.
        let area = contour_area(&contours[0]);
        assert!((area - 625.0).abs() < 1e-9, "area was {area}");
    }

    #[test]
    fn nested_mark_is_not_a_separate_region() {
        let outer = ring(2, 40, 3);
        let inner = |x: u32, y: u32| (15..25).contains(&x) && (15..25).contains(&y);
        let mask = mask_from(45, |x, y| outer(x, y) || inner(x, y));
        assert_eq!(external_contours(&mask).len(), 1);
    }

    #[test]
    fn contours_come_in_raster_discovery_order() {
        // The upper-right square is reached first by the raster scan.
        let mask = mask_from(40, |x, y| {
            ((25..35).contains(&x) && (2..10).contains(&y))
                || ((2..10).contains(&x) && (20..30).contains(&y))
        });
        let contours = external_contours(&mask);
        assert_eq!(contours.len(), 2);
        assert!(contours[0].iter().all(|p| p.y < 10));
        assert!(contours[1].iter().all(|p| p.y >= 20));
    }

    #[test]
    fn degenerate_contours_have_zero_area() {
        assert!(contour_area(&[]).abs() < f64::EPSILON);
        assert!(contour_area(&[PixelPoint::new(3, 3)]).abs() < f64::EPSILON);
        let line = [PixelPoint::new(0, 0), PixelPoint::new(5, 0), PixelPoint::new(9, 0)];
        assert!(contour_area(&line).abs() < f64::EPSILON);
    }

    #[test]
    fn shoelace_is_orientation_independent() {
        let cw = [
            PixelPoint::new(0, 0),
            PixelPoint::new(4, 0),
            PixelPoint::new(4, 3),
            PixelPoint::new(0, 3),
        ];
        let mut ccw = cw;
        ccw.reverse();
        assert!((contour_area(&cw) - 12.0).abs() < f64::EPSILON);
        assert!((contour_area(&ccw) - 12.0).abs() < f64::EPSILON);
    }
}
