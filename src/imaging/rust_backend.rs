//! Production image backend built on the `image` crate ecosystem.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Container detection | magic-byte sniff ([`SourceFormat::detect`]) |
//! | Decode (JPEG, PNG, WebP, TIFF first page) | `image::ImageReader::into_decoder` |
//! | TIFF page selection + later pages | `tiff::decoder::Decoder` |
//! | Decode (HEIC) | `libheif-rs`, `heif` feature only |
//! | ICC / EXIF extraction | `ImageDecoder::icc_profile` / `exif_metadata`, TIFF tag 34675 |
//! | Orientation | `kamadak-exif`, falling back to `ImageDecoder::orientation` |
//! | Encode | [`encode`](super::encode) |
//!
//! Which containers may be opened at all is decided by the
//! [`CodecRegistry`] the backend was built with.

use super::backend::{ImageAsset, ImageBackend, ImagingError, MetadataBundle};
use super::codecs::{self, CodecRegistry};
use super::encode;
use super::exif;
use super::format::{ColorMode, SourceFormat};
use super::orientation::Orientation;
use super::policy::EncodingPlan;
use image::{DynamicImage, ImageBuffer, ImageDecoder, ImageReader};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tiff::decoder::{Decoder as TiffDecoder, DecodingResult};
use tiff::tags::Tag;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend {
    registry: &'static CodecRegistry,
}

impl RustBackend {
    /// Backend over the process-wide registry.
    pub fn new() -> Self {
        Self::with_registry(codecs::init())
    }

    pub fn with_registry(registry: &'static CodecRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &'static CodecRegistry {
        self.registry
    }

    /// Sniff `path` and make sure a decoder for it is registered.
    fn supported_format(&self, path: &Path) -> Result<SourceFormat, ImagingError> {
        let format = SourceFormat::detect(path)?;
        if !self.registry.supports(format) {
            return Err(ImagingError::Decode(format!(
                "{format} decoding is not available in this build ({})",
                path.display()
            )));
        }
        Ok(format)
    }

    fn load(
        &self,
        path: &Path,
        with_pixels: bool,
    ) -> Result<(MetadataBundle, Option<DynamicImage>), ImagingError> {
        let format = self.supported_format(path)?;
        let (metadata, pixels) = match format {
            SourceFormat::Tiff => load_tiff(path, with_pixels)?,
            SourceFormat::Heic => load_heif(path, with_pixels)?,
            _ => load_with_image_crate(path, format, with_pixels)?,
        };
        tracing::debug!(
            path = %path.display(),
            format = %metadata.format,
            width = metadata.width,
            height = metadata.height,
            mode = %metadata.color_mode,
            orientation = metadata.orientation.code(),
            frame = metadata.frame_index,
            frames = metadata.frame_count,
            "Read image"
        );
        Ok((metadata, pixels))
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_err(path: &Path, e: impl std::fmt::Display) -> ImagingError {
    ImagingError::Decode(format!("Failed to decode {}: {e}", path.display()))
}

fn unsupported_layout(path: &Path, layout: impl std::fmt::Debug) -> ImagingError {
    ImagingError::Decode(format!(
        "Unsupported pixel layout {layout:?} in {}",
        path.display()
    ))
}

/// Orientation from an EXIF block, or `fallback` when the block is unreadable.
fn resolve_orientation(
    exif_blob: Option<&[u8]>,
    fallback: impl FnOnce() -> Orientation,
) -> Orientation {
    match exif_blob.map(exif::read_orientation) {
        None => Orientation::Normal,
        Some(Ok(code)) => Orientation::from_code_or_normal(code),
        Some(Err(e)) => {
            tracing::warn!(error = %e, "Falling back to decoder orientation");
            fallback()
        }
    }
}

// ============================================================================
// image crate path (JPEG, PNG, WebP, first TIFF page)
// ============================================================================

fn load_with_image_crate(
    path: &Path,
    format: SourceFormat,
    with_pixels: bool,
) -> Result<(MetadataBundle, Option<DynamicImage>), ImagingError> {
    let image_format = format
        .image_format()
        .ok_or_else(|| decode_err(path, format!("no decoder for {format}")))?;
    let mut reader = ImageReader::with_format(BufReader::new(File::open(path)?), image_format);
    reader.no_limits();
    let mut decoder = reader.into_decoder().map_err(|e| decode_err(path, e))?;

    let (width, height) = decoder.dimensions();
    let color_type = decoder.color_type();
    let color_mode =
        ColorMode::from_color_type(color_type).ok_or_else(|| unsupported_layout(path, color_type))?;

    let icc_profile = match decoder.icc_profile() {
        Ok(profile) => profile.filter(|p| !p.is_empty()),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable ICC profile");
            None
        }
    };
    let exif_blob = match decoder.exif_metadata() {
        Ok(blob) => blob.map(|b| exif::strip_exif_header(&b).to_vec()),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable EXIF block");
            None
        }
    };
    let orientation = resolve_orientation(exif_blob.as_deref(), || {
        decoder
            .orientation()
            .map(Orientation::from_image)
            .unwrap_or_default()
    });

    let pixels = if with_pixels {
        Some(DynamicImage::from_decoder(decoder).map_err(|e| decode_err(path, e))?)
    } else {
        None
    };

    Ok((
        MetadataBundle {
            format,
            width,
            height,
            color_mode,
            icc_profile,
            orientation,
            exif: exif_blob,
            frame_index: 0,
            frame_count: 1,
        },
        pixels,
    ))
}

// ============================================================================
// TIFF path
// ============================================================================

/// Index of the page with the largest pixel area; ties keep the earliest.
pub fn largest_frame(frames: &[(u32, u32)]) -> usize {
    frames
        .iter()
        .enumerate()
        .fold((0, 0u64), |(best, best_area), (i, &(w, h))| {
            let area = w as u64 * h as u64;
            if area > best_area { (i, area) } else { (best, best_area) }
        })
        .0
}

fn open_tiff(path: &Path) -> Result<TiffDecoder<BufReader<File>>, ImagingError> {
    TiffDecoder::new(BufReader::new(File::open(path)?)).map_err(|e| decode_err(path, e))
}

fn tiff_page_sizes(path: &Path) -> Result<Vec<(u32, u32)>, ImagingError> {
    let mut decoder = open_tiff(path)?;
    let mut sizes = vec![decoder.dimensions().map_err(|e| decode_err(path, e))?];
    while decoder.more_images() {
        decoder.next_image().map_err(|e| decode_err(path, e))?;
        sizes.push(decoder.dimensions().map_err(|e| decode_err(path, e))?);
    }
    Ok(sizes)
}

fn tiff_color_mode(color: tiff::ColorType) -> Option<ColorMode> {
    use tiff::ColorType as T;
    match color {
        T::Gray(8) => Some(ColorMode::L8),
        T::Gray(16) => Some(ColorMode::L16),
        T::GrayA(8) => Some(ColorMode::La8),
        T::GrayA(16) => Some(ColorMode::La16),
        T::RGB(8) => Some(ColorMode::Rgb8),
        T::RGB(16) => Some(ColorMode::Rgb16),
        T::RGBA(8) => Some(ColorMode::Rgba8),
        T::RGBA(16) => Some(ColorMode::Rgba16),
        T::RGB(32) => Some(ColorMode::Rgb32F),
        T::RGBA(32) => Some(ColorMode::Rgba32F),
        _ => None,
    }
}

fn tiff_pixels(
    path: &Path,
    decoder: &mut TiffDecoder<BufReader<File>>,
    width: u32,
    height: u32,
    color: tiff::ColorType,
) -> Result<DynamicImage, ImagingError> {
    use tiff::ColorType as T;
    let data = decoder.read_image().map_err(|e| decode_err(path, e))?;
    let image = match (color, data) {
        (T::Gray(8), DecodingResult::U8(buf)) => {
            ImageBuffer::from_raw(width, height, buf).map(DynamicImage::ImageLuma8)
        }
        (T::Gray(16), DecodingResult::U16(buf)) => {
            ImageBuffer::from_raw(width, height, buf).map(DynamicImage::ImageLuma16)
        }
        (T::GrayA(8), DecodingResult::U8(buf)) => {
            ImageBuffer::from_raw(width, height, buf).map(DynamicImage::ImageLumaA8)
        }
        (T::GrayA(16), DecodingResult::U16(buf)) => {
            ImageBuffer::from_raw(width, height, buf).map(DynamicImage::ImageLumaA16)
        }
        (T::RGB(8), DecodingResult::U8(buf)) => {
            ImageBuffer::from_raw(width, height, buf).map(DynamicImage::ImageRgb8)
        }
        (T::RGB(16), DecodingResult::U16(buf)) => {
            ImageBuffer::from_raw(width, height, buf).map(DynamicImage::ImageRgb16)
        }
        (T::RGBA(8), DecodingResult::U8(buf)) => {
            ImageBuffer::from_raw(width, height, buf).map(DynamicImage::ImageRgba8)
        }
        (T::RGBA(16), DecodingResult::U16(buf)) => {
            ImageBuffer::from_raw(width, height, buf).map(DynamicImage::ImageRgba16)
        }
        (T::RGB(32), DecodingResult::F32(buf)) => {
            ImageBuffer::from_raw(width, height, buf).map(DynamicImage::ImageRgb32F)
        }
        (T::RGBA(32), DecodingResult::F32(buf)) => {
            ImageBuffer::from_raw(width, height, buf).map(DynamicImage::ImageRgba32F)
        }
        (other, _) => return Err(unsupported_layout(path, other)),
    };
    image.ok_or_else(|| decode_err(path, "page buffer does not match its dimensions"))
}

fn load_tiff(
    path: &Path,
    with_pixels: bool,
) -> Result<(MetadataBundle, Option<DynamicImage>), ImagingError> {
    let sizes = tiff_page_sizes(path)?;
    let index = largest_frame(&sizes);
    if sizes.len() > 1 {
        tracing::debug!(path = %path.display(), pages = sizes.len(), selected = index, "Selected largest TIFF page");
    }

    let mut decoder = open_tiff(path)?;
    for _ in 0..index {
        decoder.next_image().map_err(|e| decode_err(path, e))?;
    }

    let icc_profile = match decoder.find_tag(Tag::IccProfile) {
        Ok(value) => value.and_then(|v| v.into_u8_vec().ok()),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable ICC profile");
            None
        }
    };
    let orientation = match decoder.find_tag_unsigned::<u32>(Tag::Orientation) {
        Ok(code) => Orientation::from_code_or_normal(code),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable orientation tag");
            Orientation::Normal
        }
    };

    // The image crate handles the widest range of first-page layouts
    // (palette, CMYK, YCbCr); later pages go through the tiff decoder.
    let (mut metadata, pixels) = if index == 0 {
        load_with_image_crate(path, SourceFormat::Tiff, with_pixels)?
    } else {
        let (width, height) = sizes[index];
        let color = decoder.colortype().map_err(|e| decode_err(path, e))?;
        let color_mode = tiff_color_mode(color).ok_or_else(|| unsupported_layout(path, color))?;
        let pixels = if with_pixels {
            Some(tiff_pixels(path, &mut decoder, width, height, color)?)
        } else {
            None
        };
        let metadata = MetadataBundle {
            format: SourceFormat::Tiff,
            width,
            height,
            color_mode,
            icc_profile: None,
            orientation: Orientation::Normal,
            exif: None,
            frame_index: index,
            frame_count: 1,
        };
        (metadata, pixels)
    };

    metadata.icc_profile = metadata.icc_profile.or(icc_profile);
    metadata.orientation = orientation;
    metadata.frame_index = index;
    metadata.frame_count = sizes.len();
    Ok((metadata, pixels))
}

// ============================================================================
// HEIF path
// ============================================================================

#[cfg(feature = "heif")]
fn load_heif(
    path: &Path,
    with_pixels: bool,
) -> Result<(MetadataBundle, Option<DynamicImage>), ImagingError> {
    super::heif::load(path, with_pixels)
}

#[cfg(not(feature = "heif"))]
fn load_heif(
    path: &Path,
    _with_pixels: bool,
) -> Result<(MetadataBundle, Option<DynamicImage>), ImagingError> {
    Err(ImagingError::Decode(format!(
        "HEIF support was not compiled in; rebuild with the `heif` feature to open {}",
        path.display()
    )))
}

impl ImageBackend for RustBackend {
    fn read_metadata(&self, path: &Path) -> Result<MetadataBundle, ImagingError> {
        Ok(self.load(path, false)?.0)
    }

    fn decode(&self, path: &Path) -> Result<ImageAsset, ImagingError> {
        let (mut metadata, pixels) = self.load(path, true)?;
        let image = pixels.ok_or_else(|| decode_err(path, "decoder produced no pixels"))?;
        // Report what was actually decoded
        if let Some(mode) = ColorMode::from_color_type(image.color()) {
            metadata.color_mode = mode;
        }
        metadata.width = image.width();
        metadata.height = image.height();
        Ok(ImageAsset { image, metadata })
    }

    fn write(&self, image: &DynamicImage, plan: &EncodingPlan) -> Result<(), ImagingError> {
        encode::write(image, plan)
    }
}
