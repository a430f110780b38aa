//! Parameter types for crop operations.
//!
//! These structs describe *what* to do, not *how* to do it. They sit between
//! the high-level [`operations`](super::operations) module (which decides the
//! crop and the output plan) and the [`backend`](super::backend) (which does
//! the decoding and encoding). Everything here is request-scoped and cheap to
//! copy.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100, default 95). Clamped on construction.
//! - [`CropOrientation`]: Portrait (2:3) or landscape (3:2) framing.
//! - [`CropRequest`]: Focus point, zoom and framing, validated on construction.
//! - [`CropRectangle`]: Integer pixel box produced by the geometry engine.

use super::backend::ImagingError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lower bound applied to zoom before inverting it.
pub const ZOOM_EPSILON: f64 = 1e-6;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quality(pub u8);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(95)
    }
}

/// Target framing of the crop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CropOrientation {
    /// 2:3, taller than wide.
    #[default]
    Portrait,
    /// 3:2, wider than tall.
    Landscape,
}

impl CropOrientation {
    /// Width divided by height of the target box.
    pub fn target_ratio(self) -> f64 {
        match self {
            Self::Portrait => 2.0 / 3.0,
            Self::Landscape => 3.0 / 2.0,
        }
    }

    /// Suffix used in processed filenames (`2x3` / `3x2`).
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Portrait => "2x3",
            Self::Landscape => "3x2",
        }
    }
}

impl fmt::Display for CropOrientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Portrait => f.write_str("portrait"),
            Self::Landscape => f.write_str("landscape"),
        }
    }
}

impl FromStr for CropOrientation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "portrait" => Ok(Self::Portrait),
            "landscape" => Ok(Self::Landscape),
            other => Err(format!(
                "unknown orientation '{other}' (expected portrait or landscape)"
            )),
        }
    }
}

/// Caller-supplied crop parameters.
///
/// Focus coordinates are normalized to the (already orientation-corrected)
/// image: `(0, 0)` is the top-left corner, `(1, 1)` the bottom-right.
/// Zoom above 1 tightens the framing; zoom at or below 1 yields the largest
/// box of the target ratio that fits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropRequest {
    focus_x: f64,
    focus_y: f64,
    zoom: f64,
    orientation: CropOrientation,
}

impl CropRequest {
    pub fn new(
        focus_x: f64,
        focus_y: f64,
        zoom: f64,
        orientation: CropOrientation,
    ) -> Result<Self, ImagingError> {
        for (name, value) in [("focus_x", focus_x), ("focus_y", focus_y)] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(ImagingError::Geometry(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if !zoom.is_finite() || zoom < 0.0 {
            return Err(ImagingError::Geometry(format!(
                "zoom must be a non-negative number, got {zoom}"
            )));
        }
        Ok(Self {
            focus_x,
            focus_y,
            zoom,
            orientation,
        })
    }

    /// Centered, zoom 1.
    pub fn centered(orientation: CropOrientation) -> Self {
        Self {
            focus_x: 0.5,
            focus_y: 0.5,
            zoom: 1.0,
            orientation,
        }
    }

    pub fn focus_x(&self) -> f64 {
        self.focus_x
    }

    pub fn focus_y(&self) -> f64 {
        self.focus_y
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn orientation(&self) -> CropOrientation {
        self.orientation
    }

    /// Multiplier applied to the bounding dimension: `1 / max(zoom, ε)`.
    pub fn zoom_factor(&self) -> f64 {
        1.0 / self.zoom.max(ZOOM_EPSILON)
    }
}

/// Crop box in pixel coordinates; `right` and `bottom` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRectangle {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl CropRectangle {
    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }

    /// True when the box is non-empty and lies within `width` × `height`.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.left < self.right
            && self.top < self.bottom
            && self.right <= width
            && self.bottom <= height
    }
}

impl fmt::Display for CropRectangle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {})-({}, {}) [{}x{}]",
            self.left,
            self.top,
            self.right,
            self.bottom,
            self.width(),
            self.height()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_clamps_to_valid_range() {
        assert_eq!(Quality::new(0).value(), 1);
        assert_eq!(Quality::new(50).value(), 50);
        assert_eq!(Quality::new(150).value(), 100);
    }

    #[test]
    fn quality_default_is_95() {
        assert_eq!(Quality::default().value(), 95);
    }

    #[test]
    fn orientation_ratios() {
        assert!((CropOrientation::Portrait.target_ratio() - 2.0 / 3.0).abs() < 1e-12);
        assert!((CropOrientation::Landscape.target_ratio() - 1.5).abs() < 1e-12);
        assert_eq!(CropOrientation::Portrait.suffix(), "2x3");
        assert_eq!(CropOrientation::Landscape.suffix(), "3x2");
    }

    #[test]
    fn orientation_parses_case_insensitively() {
        assert_eq!(
            "Landscape".parse::<CropOrientation>().unwrap(),
            CropOrientation::Landscape
        );
        assert!("square".parse::<CropOrientation>().is_err());
    }

    #[test]
    fn request_rejects_focus_out_of_range() {
        assert!(CropRequest::new(1.5, 0.5, 1.0, CropOrientation::Portrait).is_err());
        assert!(CropRequest::new(0.5, -0.1, 1.0, CropOrientation::Portrait).is_err());
        assert!(CropRequest::new(f64::NAN, 0.5, 1.0, CropOrientation::Portrait).is_err());
    }

    #[test]
    fn request_rejects_bad_zoom() {
        assert!(CropRequest::new(0.5, 0.5, f64::INFINITY, CropOrientation::Portrait).is_err());
        assert!(CropRequest::new(0.5, 0.5, -1.0, CropOrientation::Portrait).is_err());
    }

    #[test]
    fn zoom_factor_guards_zero() {
        let req = CropRequest::new(0.5, 0.5, 0.0, CropOrientation::Portrait).unwrap();
        assert!(req.zoom_factor().is_finite());
        let req = CropRequest::new(0.5, 0.5, 2.0, CropOrientation::Portrait).unwrap();
        assert_eq!(req.zoom_factor(), 0.5);
    }

    #[test]
    fn rectangle_dimensions() {
        let rect = CropRectangle {
            left: 500,
            top: 500,
            right: 3500,
            bottom: 2500,
        };
        assert_eq!(rect.width(), 3000);
        assert_eq!(rect.height(), 2000);
        assert!(rect.fits_within(4000, 3000));
        assert!(!rect.fits_within(3000, 3000));
    }
}
