//! Source container detection and pixel color modes.
//!
//! The container is identified from magic bytes, never from the file
//! extension: uploads are routinely misnamed (`.jpg` files that are really
//! HEIC, `.tif` exports that are PNG). The color mode is taken from the
//! decoder and drives both the encoding policy (bit-depth preservation) and
//! the labels shown in image reports.

use super::backend::ImagingError;
use image::{ColorType, ImageFormat};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;
use std::path::Path;

/// Container formats accepted as crop sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SourceFormat {
    Tiff,
    Png,
    Jpeg,
    Heic,
    WebP,
}

/// ISO-BMFF brands that identify HEIF/HEIC still images.
const HEIF_BRANDS: &[&[u8; 4]] = &[
    b"heic", b"heix", b"hevc", b"hevx", b"heim", b"heis", b"mif1", b"msf1", b"heif",
];

impl SourceFormat {
    /// Identify a container from its leading bytes.
    pub fn sniff(header: &[u8]) -> Option<Self> {
        if header.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }
        if header.starts_with(b"\x89PNG\r\n\x1a\n") {
            return Some(Self::Png);
        }
        if header.starts_with(b"II*\0") || header.starts_with(b"MM\0*") {
            return Some(Self::Tiff);
        }
        if header.len() >= 12 && &header[0..4] == b"RIFF" && &header[8..12] == b"WEBP" {
            return Some(Self::WebP);
        }
        if header.len() >= 12 && &header[4..8] == b"ftyp" {
            let major = &header[8..12];
            if HEIF_BRANDS.iter().any(|brand| major == brand.as_slice()) {
                return Some(Self::Heic);
            }
            // Compatible brands follow the minor version
            let compatible = header.get(16..).unwrap_or(&[]);
            if compatible
                .chunks_exact(4)
                .any(|c| HEIF_BRANDS.iter().any(|brand| c == brand.as_slice()))
            {
                return Some(Self::Heic);
            }
        }
        None
    }

    /// Read the first bytes of `path` and identify its container.
    pub fn detect(path: &Path) -> Result<Self, ImagingError> {
        let mut header = [0u8; 32];
        let mut file = std::fs::File::open(path)?;
        let mut filled = 0;
        while filled < header.len() {
            match file.read(&mut header[filled..])? {
                0 => break,
                n => filled += n,
            }
        }
        Self::sniff(&header[..filled]).ok_or_else(|| {
            ImagingError::Decode(format!(
                "{} is not a recognized image container",
                path.display()
            ))
        })
    }

    /// The `image` crate format used to decode this container, if any.
    pub fn image_format(self) -> Option<ImageFormat> {
        match self {
            Self::Tiff => Some(ImageFormat::Tiff),
            Self::Png => Some(ImageFormat::Png),
            Self::Jpeg => Some(ImageFormat::Jpeg),
            Self::WebP => Some(ImageFormat::WebP),
            Self::Heic => None,
        }
    }

    /// Upper-case display name used in reports.
    pub fn name(self) -> &'static str {
        match self {
            Self::Tiff => "TIFF",
            Self::Png => "PNG",
            Self::Jpeg => "JPEG",
            Self::Heic => "HEIF",
            Self::WebP => "WEBP",
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Pixel layout of a decoded image.
///
/// Names follow the conventional mode strings (`L`, `RGB`, `I;16`, ...) so
/// reports read the same as those of other photo tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorMode {
    L8,
    La8,
    Rgb8,
    Rgba8,
    L16,
    La16,
    Rgb16,
    Rgba16,
    Rgb32F,
    Rgba32F,
}

impl ColorMode {
    pub fn from_color_type(color: ColorType) -> Option<Self> {
        match color {
            ColorType::L8 => Some(Self::L8),
            ColorType::La8 => Some(Self::La8),
            ColorType::Rgb8 => Some(Self::Rgb8),
            ColorType::Rgba8 => Some(Self::Rgba8),
            ColorType::L16 => Some(Self::L16),
            ColorType::La16 => Some(Self::La16),
            ColorType::Rgb16 => Some(Self::Rgb16),
            ColorType::Rgba16 => Some(Self::Rgba16),
            ColorType::Rgb32F => Some(Self::Rgb32F),
            ColorType::Rgba32F => Some(Self::Rgba32F),
            _ => None,
        }
    }

    /// Conventional mode string.
    pub fn mode(self) -> &'static str {
        match self {
            Self::L8 => "L",
            Self::La8 => "LA",
            Self::Rgb8 => "RGB",
            Self::Rgba8 => "RGBA",
            Self::L16 => "I;16",
            Self::La16 => "LA;16",
            Self::Rgb16 => "RGB;16",
            Self::Rgba16 => "RGBA;16",
            Self::Rgb32F => "RGB;32F",
            Self::Rgba32F => "RGBA;32F",
        }
    }

    /// Bits per channel.
    pub fn bit_depth(self) -> u8 {
        match self {
            Self::L8 | Self::La8 | Self::Rgb8 | Self::Rgba8 => 8,
            Self::L16 | Self::La16 | Self::Rgb16 | Self::Rgba16 => 16,
            Self::Rgb32F | Self::Rgba32F => 32,
        }
    }

    /// Human-readable color type, e.g. "Grayscale 16-bit".
    pub fn label(self) -> &'static str {
        match self {
            Self::L8 => "Grayscale 8-bit",
            Self::La8 => "Grayscale+Alpha 8-bit",
            Self::Rgb8 => "RGB 8-bit",
            Self::Rgba8 => "RGBA 8-bit",
            Self::L16 => "Grayscale 16-bit",
            Self::La16 => "Grayscale+Alpha 16-bit",
            Self::Rgb16 => "RGB 16-bit",
            Self::Rgba16 => "RGBA 16-bit",
            Self::Rgb32F => "RGB 32-bit float",
            Self::Rgba32F => "RGBA 32-bit float",
        }
    }

    /// More than 8 bits per channel.
    pub fn is_high_depth(self) -> bool {
        self.bit_depth() > 8
    }
}

impl fmt::Display for ColorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mode())
    }
}
