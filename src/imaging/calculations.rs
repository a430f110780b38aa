//! Pure crop-geometry functions.
//!
//! All functions here are pure and testable without any I/O or images.
//!
//! The crop box is derived in four steps:
//!
//! 1. **Size from zoom.** The dimension that bounds the target ratio (height
//!    for images wider than the target, width otherwise) is scaled by
//!    `1 / zoom`; the other dimension follows from the ratio. Larger zoom
//!    means a tighter crop.
//! 2. **Fit.** If the box is larger than the image in either dimension it is
//!    shrunk, keeping the ratio, to the largest box that fits. Zoom values
//!    at or below 1 therefore all produce the full-frame crop.
//! 3. **Center.** The box is centered on the focus point.
//! 4. **Translate.** A box hanging over an edge is slid back inside. Its size
//!    never changes, so framing near an edge sacrifices exact centering.

use super::backend::ImagingError;
use super::params::{CropRectangle, CropRequest};

/// Compute the crop rectangle for an image of `width` × `height` pixels.
///
/// The dimensions must be those of the orientation-corrected buffer.
///
/// # Examples
/// ```
/// use focuscrop::imaging::{CropOrientation, CropRequest, compute_crop_rectangle};
///
/// // 1000x2000 image, portrait crop anchored at the top-left corner
/// let request = CropRequest::new(0.0, 0.0, 1.0, CropOrientation::Portrait).unwrap();
/// let rect = compute_crop_rectangle(1000, 2000, &request).unwrap();
/// assert_eq!((rect.left, rect.top, rect.right, rect.bottom), (0, 0, 1000, 1500));
/// ```
pub fn compute_crop_rectangle(
    width: u32,
    height: u32,
    request: &CropRequest,
) -> Result<CropRectangle, ImagingError> {
    if width == 0 || height == 0 {
        return Err(ImagingError::Geometry(format!(
            "cannot crop an empty {width}x{height} image"
        )));
    }

    let ratio = request.orientation().target_ratio();
    let (crop_w, crop_h) = crop_size(width, height, ratio, request.zoom_factor());

    let left = translate_into(anchor(width, request.focus_x()), crop_w, width);
    let top = translate_into(anchor(height, request.focus_y()), crop_h, height);

    let rect = CropRectangle {
        left,
        top,
        right: left + crop_w,
        bottom: top + crop_h,
    };

    if !rect.fits_within(width, height) || !within_ratio_tolerance(crop_w, crop_h, ratio) {
        return Err(ImagingError::Geometry(format!(
            "computed crop {rect} violates bounds or ratio for {width}x{height}"
        )));
    }

    Ok(rect)
}

/// Integer crop size for the given target ratio and zoom factor.
///
/// Both returned values are at least 1 and never exceed the image.
pub fn crop_size(width: u32, height: u32, ratio: f64, zoom_factor: f64) -> (u32, u32) {
    let (w, h) = (width as f64, height as f64);

    let (mut crop_w, mut crop_h) = if w / h >= ratio {
        // Wider than the target: height bounds the box
        let crop_h = h * zoom_factor;
        (crop_h * ratio, crop_h)
    } else {
        // Taller than the target: width bounds the box
        let crop_w = w * zoom_factor;
        (crop_w, crop_w / ratio)
    };

    if crop_w > w {
        crop_w = w;
        crop_h = crop_w / ratio;
    }
    if crop_h > h {
        crop_h = h;
        crop_w = crop_h * ratio;
    }

    (
        (crop_w.round() as u32).clamp(1, width),
        (crop_h.round() as u32).clamp(1, height),
    )
}

/// Pixel coordinate of the focus point along one axis.
fn anchor(extent: u32, focus: f64) -> u32 {
    ((extent as f64 * focus).floor() as u32).min(extent)
}

/// Start coordinate of a `len`-long span centered on `center`, slid back
/// inside `[0, bound]` when it overhangs either end.
fn translate_into(center: u32, len: u32, bound: u32) -> u32 {
    let mut start = center as i64 - (len / 2) as i64;
    let end = start + len as i64;
    if end > bound as i64 {
        start -= end - bound as i64;
    }
    if start < 0 {
        start = 0;
    }
    start as u32
}

/// True when `width` × `height` matches `ratio` within one pixel of rounding
/// on either dimension.
pub fn within_ratio_tolerance(width: u32, height: u32, ratio: f64) -> bool {
    let (w, h) = (width as f64, height as f64);
    (w - h * ratio).abs() <= 1.0 || (h - w / ratio).abs() <= 1.0
}

/// Aspect ratio rounded to three decimals, as shown in image reports.
pub fn rounded_aspect_ratio(width: u32, height: u32) -> f64 {
    if height == 0 {
        return 0.0;
    }
    (width as f64 / height as f64 * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::params::CropOrientation;

    fn request(fx: f64, fy: f64, zoom: f64, orientation: CropOrientation) -> CropRequest {
        CropRequest::new(fx, fy, zoom, orientation).unwrap()
    }

    fn corners(rect: CropRectangle) -> (u32, u32, u32, u32) {
        (rect.left, rect.top, rect.right, rect.bottom)
    }

    // =========================================================================
    // crop_size tests
    // =========================================================================

    #[test]
    fn size_landscape_target_on_4_3_image_is_width_bound() {
        // 4000x3000 is narrower than 3:2, so the full width is used
        assert_eq!(crop_size(4000, 3000, 1.5, 1.0), (4000, 2667));
    }

    #[test]
    fn size_portrait_target_on_landscape_image_is_height_bound() {
        // 3000x2000 wider than 2:3 → full height, width = 2000 * 2/3
        assert_eq!(crop_size(3000, 2000, 2.0 / 3.0, 1.0), (1333, 2000));
    }

    #[test]
    fn size_zoom_two_halves_each_dimension() {
        assert_eq!(crop_size(3000, 2000, 1.5, 0.5), (1500, 1000));
    }

    #[test]
    fn size_zoom_below_one_is_full_frame_at_ratio() {
        // zoom 0.5 asks for a box twice the image; it is fitted back down
        assert_eq!(crop_size(4000, 3000, 1.5, 2.0), (4000, 2667));
        assert_eq!(crop_size(1000, 2000, 2.0 / 3.0, 2.0), (1000, 1500));
    }

    #[test]
    fn size_is_never_zero() {
        assert_eq!(crop_size(10, 10, 1.5, 1e-9), (1, 1));
    }

    // =========================================================================
    // compute_crop_rectangle tests
    // =========================================================================

    #[test]
    fn centered_landscape_crop_on_4000x3000() {
        let rect = compute_crop_rectangle(
            4000,
            3000,
            &request(0.5, 0.5, 1.0, CropOrientation::Landscape),
        )
        .unwrap();
        assert_eq!(corners(rect), (0, 167, 4000, 2834));
    }

    #[test]
    fn centered_landscape_crop_at_zoom_four_thirds() {
        let rect = compute_crop_rectangle(
            4000,
            3000,
            &request(0.5, 0.5, 4.0 / 3.0, CropOrientation::Landscape),
        )
        .unwrap();
        assert_eq!(corners(rect), (500, 500, 3500, 2500));
        assert_eq!((rect.width(), rect.height()), (3000, 2000));
    }

    #[test]
    fn top_left_focus_starts_at_origin() {
        let rect = compute_crop_rectangle(
            1000,
            2000,
            &request(0.0, 0.0, 1.0, CropOrientation::Portrait),
        )
        .unwrap();
        assert_eq!(corners(rect), (0, 0, 1000, 1500));
    }

    #[test]
    fn bottom_right_focus_is_pushed_against_edges() {
        let rect = compute_crop_rectangle(
            3000,
            2000,
            &request(1.0, 1.0, 2.0, CropOrientation::Landscape),
        )
        .unwrap();
        assert_eq!(corners(rect), (1500, 1000, 3000, 2000));
    }

    #[test]
    fn edge_focus_keeps_requested_size() {
        let centered = compute_crop_rectangle(
            3000,
            2000,
            &request(0.5, 0.5, 2.0, CropOrientation::Portrait),
        )
        .unwrap();
        let edge = compute_crop_rectangle(
            3000,
            2000,
            &request(0.02, 0.5, 2.0, CropOrientation::Portrait),
        )
        .unwrap();
        assert_eq!(centered.width(), edge.width());
        assert_eq!(centered.height(), edge.height());
        assert_eq!(edge.left, 0);
    }

    #[test]
    fn zoom_zero_degenerates_to_full_frame() {
        let rect = compute_crop_rectangle(
            3000,
            2000,
            &request(0.5, 0.5, 0.0, CropOrientation::Landscape),
        )
        .unwrap();
        assert_eq!(corners(rect), (0, 0, 3000, 2000));
    }

    #[test]
    fn empty_image_is_geometry_error() {
        let err = compute_crop_rectangle(0, 100, &CropRequest::centered(CropOrientation::Portrait))
            .unwrap_err();
        assert!(matches!(err, ImagingError::Geometry(_)));
    }

    #[test]
    fn tiny_image_still_yields_non_empty_box() {
        let rect =
            compute_crop_rectangle(1, 1, &CropRequest::centered(CropOrientation::Landscape))
                .unwrap();
        assert_eq!(corners(rect), (0, 0, 1, 1));
    }

    // =========================================================================
    // helpers
    // =========================================================================

    #[test]
    fn translate_slides_span_back_inside() {
        assert_eq!(translate_into(100, 50, 1000), 75);
        assert_eq!(translate_into(990, 50, 1000), 950);
        assert_eq!(translate_into(5, 50, 1000), 0);
    }

    #[test]
    fn ratio_tolerance_accepts_rounding() {
        assert!(within_ratio_tolerance(4000, 2667, 1.5));
        assert!(within_ratio_tolerance(1333, 2000, 2.0 / 3.0));
        assert!(!within_ratio_tolerance(4000, 3000, 1.5));
    }

    #[test]
    fn aspect_ratio_rounds_to_three_decimals() {
        assert_eq!(rounded_aspect_ratio(4000, 3000), 1.333);
        assert_eq!(rounded_aspect_ratio(2000, 3000), 0.667);
        assert_eq!(rounded_aspect_ratio(10, 0), 0.0);
    }
}
