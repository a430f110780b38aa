//! EXIF orientation normalization.
//!
//! Cameras store pixels in sensor order and record how to display them in
//! the EXIF orientation tag (values 1–8). Cropping must happen on the
//! upright image, so the buffer is physically transformed first and the tag
//! is then treated as consumed (reset to 1 everywhere downstream).
//!
//! | code | steps (angles counter-clockwise) | `image` calls |
//! |---|---|---|
//! | 1 | identity | none |
//! | 2 | flip horizontal | `fliph` |
//! | 3 | rotate 180° | `rotate180` |
//! | 4 | flip vertical | `flipv` |
//! | 5 | flip horizontal, rotate 90° | `fliph`, `rotate270` |
//! | 6 | rotate 270° | `rotate90` |
//! | 7 | flip horizontal, rotate 270° | `fliph`, `rotate90` |
//! | 8 | rotate 90° | `rotate270` |
//!
//! `image`'s `rotateN` methods turn clockwise, hence the swapped names.

use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// EXIF orientation tag value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
pub enum Orientation {
    #[default]
    Normal,
    FlipHorizontal,
    Rotate180,
    FlipVertical,
    Transpose,
    Rotate90Cw,
    Transverse,
    Rotate270Cw,
}

/// A single pixel-buffer transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    FlipHorizontal,
    FlipVertical,
    /// Counter-clockwise rotation by the given number of degrees.
    RotateCcw(u16),
}

impl Orientation {
    /// Parse an EXIF orientation value; anything outside 1–8 is `None`.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(Self::Normal),
            2 => Some(Self::FlipHorizontal),
            3 => Some(Self::Rotate180),
            4 => Some(Self::FlipVertical),
            5 => Some(Self::Transpose),
            6 => Some(Self::Rotate90Cw),
            7 => Some(Self::Transverse),
            8 => Some(Self::Rotate270Cw),
            _ => None,
        }
    }

    /// Lenient parse: missing or invalid values mean "normal".
    pub fn from_code_or_normal(code: Option<u32>) -> Self {
        code.and_then(Self::from_code).unwrap_or_default()
    }

    pub fn code(self) -> u16 {
        match self {
            Self::Normal => 1,
            Self::FlipHorizontal => 2,
            Self::Rotate180 => 3,
            Self::FlipVertical => 4,
            Self::Transpose => 5,
            Self::Rotate90Cw => 6,
            Self::Transverse => 7,
            Self::Rotate270Cw => 8,
        }
    }

    /// Transform sequence that makes the stored pixels upright.
    pub fn steps(self) -> &'static [Step] {
        match self {
            Self::Normal => &[],
            Self::FlipHorizontal => &[Step::FlipHorizontal],
            Self::Rotate180 => &[Step::RotateCcw(180)],
            Self::FlipVertical => &[Step::FlipVertical],
            Self::Transpose => &[Step::FlipHorizontal, Step::RotateCcw(90)],
            Self::Rotate90Cw => &[Step::RotateCcw(270)],
            Self::Transverse => &[Step::FlipHorizontal, Step::RotateCcw(270)],
            Self::Rotate270Cw => &[Step::RotateCcw(90)],
        }
    }

    /// Whether normalizing swaps width and height.
    pub fn swaps_dimensions(self) -> bool {
        matches!(
            self,
            Self::Transpose | Self::Rotate90Cw | Self::Transverse | Self::Rotate270Cw
        )
    }

    /// Dimensions after normalization.
    pub fn upright_dimensions(self, width: u32, height: u32) -> (u32, u32) {
        if self.swaps_dimensions() {
            (height, width)
        } else {
            (width, height)
        }
    }

    /// Map from the `image` crate's decoder-reported orientation.
    pub fn from_image(orientation: image::metadata::Orientation) -> Self {
        use image::metadata::Orientation as Img;
        match orientation {
            Img::NoTransforms => Self::Normal,
            Img::FlipHorizontal => Self::FlipHorizontal,
            Img::Rotate180 => Self::Rotate180,
            Img::FlipVertical => Self::FlipVertical,
            Img::Rotate90FlipH => Self::Transpose,
            Img::Rotate90 => Self::Rotate90Cw,
            Img::Rotate270FlipH => Self::Transverse,
            Img::Rotate270 => Self::Rotate270Cw,
        }
    }
}

impl From<Orientation> for u16 {
    fn from(value: Orientation) -> Self {
        value.code()
    }
}

impl TryFrom<u16> for Orientation {
    type Error = String;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::from_code(value as u32).ok_or_else(|| format!("invalid orientation {value}"))
    }
}

/// Apply one step to an image.
fn apply_step(img: DynamicImage, step: Step) -> DynamicImage {
    match step {
        Step::FlipHorizontal => img.fliph(),
        Step::FlipVertical => img.flipv(),
        Step::RotateCcw(90) => img.rotate270(),
        Step::RotateCcw(180) => img.rotate180(),
        Step::RotateCcw(270) => img.rotate90(),
        Step::RotateCcw(_) => img,
    }
}

/// Physically transform `img` so that it displays upright.
pub fn normalize(img: DynamicImage, orientation: Orientation) -> DynamicImage {
    orientation
        .steps()
        .iter()
        .fold(img, |img, &step| apply_step(img, step))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgb, RgbImage};

    /// 3x2 image where every pixel is unique: value = 10*y + x.
    fn marker_image() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(3, 2, |x, y| {
            Rgb([(10 * y + x) as u8, 0, 0])
        }))
    }

    fn px(img: &DynamicImage, x: u32, y: u32) -> u8 {
        img.get_pixel(x, y).0[0]
    }

    #[test]
    fn codes_round_trip() {
        for code in 1..=8 {
            assert_eq!(Orientation::from_code(code).unwrap().code() as u32, code);
        }
        assert_eq!(Orientation::from_code(0), None);
        assert_eq!(Orientation::from_code(9), None);
    }

    #[test]
    fn missing_or_invalid_defaults_to_normal() {
        assert_eq!(Orientation::from_code_or_normal(None), Orientation::Normal);
        assert_eq!(Orientation::from_code_or_normal(Some(42)), Orientation::Normal);
        assert_eq!(
            Orientation::from_code_or_normal(Some(6)),
            Orientation::Rotate90Cw
        );
    }

    #[test]
    fn flip_precedes_rotate_in_transform_table() {
        assert_eq!(
            Orientation::Transpose.steps(),
            &[Step::FlipHorizontal, Step::RotateCcw(90)]
        );
        assert_eq!(
            Orientation::Transverse.steps(),
            &[Step::FlipHorizontal, Step::RotateCcw(270)]
        );
        assert_eq!(Orientation::Rotate90Cw.steps(), &[Step::RotateCcw(270)]);
        assert_eq!(Orientation::Rotate270Cw.steps(), &[Step::RotateCcw(90)]);
    }

    #[test]
    fn identity_leaves_pixels_untouched() {
        let img = normalize(marker_image(), Orientation::Normal);
        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(px(&img, 2, 1), 12);
    }

    #[test]
    fn rotate_codes_swap_dimensions() {
        for code in [5, 6, 7, 8] {
            let o = Orientation::from_code(code).unwrap();
            let img = normalize(marker_image(), o);
            assert_eq!(img.dimensions(), (2, 3), "code {code}");
            assert_eq!(o.upright_dimensions(3, 2), (2, 3));
        }
        for code in [1, 2, 3, 4] {
            let o = Orientation::from_code(code).unwrap();
            let img = normalize(marker_image(), o);
            assert_eq!(img.dimensions(), (3, 2), "code {code}");
        }
    }

    #[test]
    fn code_2_mirrors_horizontally() {
        let img = normalize(marker_image(), Orientation::FlipHorizontal);
        assert_eq!(px(&img, 0, 0), 2);
        assert_eq!(px(&img, 2, 1), 10);
    }

    #[test]
    fn code_3_rotates_half_turn() {
        let img = normalize(marker_image(), Orientation::Rotate180);
        assert_eq!(px(&img, 0, 0), 12);
        assert_eq!(px(&img, 2, 1), 0);
    }

    #[test]
    fn code_4_mirrors_vertically() {
        let img = normalize(marker_image(), Orientation::FlipVertical);
        assert_eq!(px(&img, 0, 0), 10);
    }

    #[test]
    fn code_5_transposes() {
        // Transpose maps stored (x, y) to upright (y, x)
        let img = normalize(marker_image(), Orientation::Transpose);
        for y in 0..2 {
            for x in 0..3 {
                assert_eq!(px(&img, y, x), (10 * y + x) as u8);
            }
        }
    }

    #[test]
    fn code_6_turns_clockwise() {
        // Stored top-left ends up top-right after a clockwise quarter turn
        let img = normalize(marker_image(), Orientation::Rotate90Cw);
        assert_eq!(px(&img, 1, 0), 0);
        assert_eq!(px(&img, 0, 0), 10);
    }

    #[test]
    fn code_7_transverses() {
        // Transverse maps stored (x, y) to upright (h-1-y, w-1-x)
        let img = normalize(marker_image(), Orientation::Transverse);
        for y in 0..2u32 {
            for x in 0..3u32 {
                assert_eq!(px(&img, 1 - y, 2 - x), (10 * y + x) as u8);
            }
        }
    }

    #[test]
    fn code_8_turns_counter_clockwise() {
        // Stored top-left ends up bottom-left
        let img = normalize(marker_image(), Orientation::Rotate270Cw);
        assert_eq!(px(&img, 0, 2), 0);
        assert_eq!(px(&img, 0, 0), 2);
    }

    #[test]
    fn maps_image_crate_orientation() {
        assert_eq!(
            Orientation::from_image(image::metadata::Orientation::Rotate90),
            Orientation::Rotate90Cw
        );
        assert_eq!(
            Orientation::from_image(image::metadata::Orientation::Rotate90FlipH),
            Orientation::Transpose
        );
    }
}
