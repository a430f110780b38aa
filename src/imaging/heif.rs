//! HEIC/HEIF decoding through libheif.
//!
//! Only compiled with the `heif` feature. libheif applies the container's
//! rotation and mirror transforms while decoding, so bundles from this
//! module always report [`Orientation::Normal`]; the EXIF block is still
//! carried (with its orientation reset later by the encoding policy).

use super::backend::{ImagingError, MetadataBundle};
use super::format::{ColorMode, SourceFormat};
use super::orientation::Orientation;
use image::{DynamicImage, RgbImage, RgbaImage};
use libheif_rs::{ColorSpace, HeifContext, ImageHandle, LibHeif, RgbChroma};
use std::path::Path;

fn decode_err(path: &Path, e: impl std::fmt::Display) -> ImagingError {
    ImagingError::Decode(format!("Failed to decode HEIF {}: {e}", path.display()))
}

/// HEIF EXIF items start with a 4-byte big-endian offset to the TIFF header.
fn strip_item_prefix(item: &[u8]) -> Option<Vec<u8>> {
    let offset = u32::from_be_bytes(item.get(0..4)?.try_into().ok()?) as usize;
    item.get(4 + offset..).map(<[u8]>::to_vec)
}

fn read_exif(handle: &ImageHandle) -> Option<Vec<u8>> {
    let id = *handle.metadata_block_ids(b"Exif").first()?;
    match handle.metadata(id) {
        Ok(item) => strip_item_prefix(&item),
        Err(e) => {
            tracing::warn!(error = %e, "Unreadable HEIF EXIF item");
            None
        }
    }
}

/// Read the primary image's metadata, and its pixels when `with_pixels`.
pub fn load(
    path: &Path,
    with_pixels: bool,
) -> Result<(MetadataBundle, Option<DynamicImage>), ImagingError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| decode_err(path, "path is not valid UTF-8"))?;
    let context = HeifContext::read_from_file(path_str).map_err(|e| decode_err(path, e))?;
    let handle = context
        .primary_image_handle()
        .map_err(|e| decode_err(path, e))?;

    let has_alpha = handle.has_alpha_channel();
    let color_mode = if has_alpha {
        ColorMode::Rgba8
    } else {
        ColorMode::Rgb8
    };
    let icc_profile = handle.color_profile_raw().map(|p| p.data);
    let exif = read_exif(&handle);

    let pixels = if with_pixels {
        let chroma = if has_alpha {
            RgbChroma::Rgba
        } else {
            RgbChroma::Rgb
        };
        let decoded = LibHeif::new()
            .decode(&handle, ColorSpace::Rgb(chroma), None)
            .map_err(|e| decode_err(path, e))?;
        let (width, height) = (decoded.width(), decoded.height());
        let planes = decoded.planes();
        let plane = planes
            .interleaved
            .ok_or_else(|| decode_err(path, "no interleaved plane"))?;

        // Rows may be padded past width * channels
        let channels = if has_alpha { 4 } else { 3 };
        let row_len = width as usize * channels;
        let mut packed = Vec::with_capacity(row_len * height as usize);
        for row in plane.data.chunks(plane.stride).take(height as usize) {
            packed.extend_from_slice(&row[..row_len]);
        }

        let image = if has_alpha {
            RgbaImage::from_raw(width, height, packed).map(DynamicImage::ImageRgba8)
        } else {
            RgbImage::from_raw(width, height, packed).map(DynamicImage::ImageRgb8)
        };
        Some(image.ok_or_else(|| decode_err(path, "pixel buffer size mismatch"))?)
    } else {
        None
    };

    let (width, height) = pixels
        .as_ref()
        .map(|img| (img.width(), img.height()))
        .unwrap_or((handle.width(), handle.height()));

    Ok((
        MetadataBundle {
            format: SourceFormat::Heic,
            width,
            height,
            color_mode,
            icc_profile,
            orientation: Orientation::Normal,
            exif,
            frame_index: 0,
            frame_count: 1,
        },
        pixels,
    ))
}
