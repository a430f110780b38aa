//! Output format and encoder selection.
//!
//! Given the source container and pixel depth, decide what the cropped image
//! is written as. The rule is "keep fidelity when the container can carry
//! it": high-depth TIFF stays TIFF, PNG stays PNG, WebP stays WebP (lossless),
//! and everything else lands as a high-quality progressive JPEG.
//!
//! | source | depth | output | encoder params |
//! |---|---|---|---|
//! | TIFF | > 8 bit | TIFF `.tif` | LZW or Deflate |
//! | TIFF | 8 bit | JPEG `.jpg` | quality, progressive |
//! | PNG | any | PNG `.png` | compression level |
//! | JPEG | any | JPEG `.jpg` | quality, progressive |
//! | HEIC | any | JPEG `.jpg` | quality, progressive |
//! | WebP | any | WebP `.webp` | lossless |
//!
//! Planning is pure: no pixels, no I/O. The only metadata work done here is
//! rewriting the EXIF orientation, which is a byte patch.

use super::backend::MetadataBundle;
use super::exif;
use super::format::{ColorMode, SourceFormat};
use super::params::Quality;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Container the cropped image is written as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Tiff,
    Png,
    Jpeg,
    WebP,
}

impl OutputFormat {
    /// Canonical extension written when the caller's hint is rewritten.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Tiff => "tif",
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::WebP => "webp",
        }
    }

    /// Whether `ext` is an accepted spelling for this format.
    pub fn accepts_extension(self, ext: &str) -> bool {
        let ext = ext.to_ascii_lowercase();
        match self {
            Self::Tiff => ext == "tif" || ext == "tiff",
            Self::Png => ext == "png",
            Self::Jpeg => ext == "jpg" || ext == "jpeg",
            Self::WebP => ext == "webp",
        }
    }

    /// ICC profiles are reattached to every output container.
    pub fn carries_icc(self) -> bool {
        true
    }

    /// TIFF outputs drop EXIF; the pixel data is already upright.
    pub fn carries_exif(self) -> bool {
        !matches!(self, Self::Tiff)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Tiff => "TIFF",
            Self::Png => "PNG",
            Self::Jpeg => "JPEG",
            Self::WebP => "WEBP",
        })
    }
}

/// PNG deflate effort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PngCompression {
    #[default]
    Fast,
    Default,
    Best,
}

/// Lossless TIFF compression scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TiffCompression {
    #[default]
    Lzw,
    Deflate,
}

/// Per-format encoder knobs, drawn from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingSettings {
    pub jpeg_quality: Quality,
    pub jpeg_progressive: bool,
    pub png_compression: PngCompression,
    pub tiff_compression: TiffCompression,
}

impl Default for EncodingSettings {
    fn default() -> Self {
        Self {
            jpeg_quality: Quality::default(),
            jpeg_progressive: true,
            png_compression: PngCompression::default(),
            tiff_compression: TiffCompression::default(),
        }
    }
}

/// Encoder parameters for the chosen output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderParams {
    Tiff { compression: TiffCompression },
    Png { compression: PngCompression },
    Jpeg { quality: Quality, progressive: bool },
    WebP { lossless: bool },
}

impl EncoderParams {
    pub fn output_format(&self) -> OutputFormat {
        match self {
            Self::Tiff { .. } => OutputFormat::Tiff,
            Self::Png { .. } => OutputFormat::Png,
            Self::Jpeg { .. } => OutputFormat::Jpeg,
            Self::WebP { .. } => OutputFormat::WebP,
        }
    }
}

/// Everything the backend needs to write a cropped image.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodingPlan {
    pub output_format: OutputFormat,
    /// Caller's hint with the extension rewritten if it named another format.
    pub output_path: PathBuf,
    pub params: EncoderParams,
    /// Source ICC profile, reattached verbatim.
    pub icc_profile: Option<Vec<u8>>,
    /// Source EXIF with orientation forced to 1.
    pub exif: Option<Vec<u8>>,
}

/// Pick encoder parameters for a source format and pixel depth.
pub fn select_params(
    source: SourceFormat,
    color_mode: ColorMode,
    settings: &EncodingSettings,
) -> EncoderParams {
    let jpeg = EncoderParams::Jpeg {
        quality: settings.jpeg_quality,
        progressive: settings.jpeg_progressive,
    };
    match source {
        SourceFormat::Tiff if color_mode.is_high_depth() => EncoderParams::Tiff {
            compression: settings.tiff_compression,
        },
        SourceFormat::Tiff => jpeg,
        SourceFormat::Png => EncoderParams::Png {
            compression: settings.png_compression,
        },
        SourceFormat::Jpeg | SourceFormat::Heic => jpeg,
        SourceFormat::WebP => EncoderParams::WebP { lossless: true },
    }
}

/// Keep `hint` if its extension already names `format`, else swap it for
/// the canonical one.
pub fn output_path_for(hint: &Path, format: OutputFormat) -> PathBuf {
    let keeps = hint
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| format.accepts_extension(e));
    if keeps {
        hint.to_path_buf()
    } else {
        hint.with_extension(format.extension())
    }
}

/// Build the full plan for writing a crop of the image described by
/// `metadata` towards `output_hint`.
pub fn plan_encoding(
    metadata: &MetadataBundle,
    output_hint: &Path,
    settings: &EncodingSettings,
) -> EncodingPlan {
    let params = select_params(metadata.format, metadata.color_mode, settings);
    let output_format = params.output_format();

    let icc_profile = metadata
        .icc_profile
        .clone()
        .filter(|_| output_format.carries_icc());

    let exif = match metadata.exif.as_deref() {
        Some(blob) if output_format.carries_exif() => match exif::reset_orientation(blob) {
            Ok(patched) => Some(patched),
            Err(e) => {
                tracing::warn!(error = %e, "Dropping EXIF from output");
                None
            }
        },
        _ => None,
    };

    EncodingPlan {
        output_format,
        output_path: output_path_for(output_hint, output_format),
        params,
        icc_profile,
        exif,
    }
}
