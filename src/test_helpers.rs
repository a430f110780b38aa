//! Shared test utilities for the focuscrop test suite.
//!
//! Fixtures are synthesized on the fly with the same encoders the crate
//! ships, so tests never depend on binary files checked into the repo.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = tempfile::TempDir::new().unwrap();
//! let path = tmp.path().join("phone.jpg");
//! write_jpeg_with_orientation(&path, 60, 40, 6);
//! ```

use crate::imaging::exif;
use crate::imaging::exif::tests::exif_block;
use image::{DynamicImage, ImageBuffer, Luma, Rgb, RgbImage};
use img_parts::png::Png;
use img_parts::{Bytes, ImageICC};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tiff::encoder::{TiffEncoder, colortype};

// =========================================================================
// Pixel buffers
// =========================================================================

/// RGB image where each pixel encodes its own position.
pub fn gradient_rgb(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    }))
}

// =========================================================================
// Fixture files
// =========================================================================

/// Save a gradient image; the container follows the extension.
pub fn write_rgb(path: &Path, width: u32, height: u32) {
    gradient_rgb(width, height).save(path).unwrap();
}

/// Baseline JPEG carrying an EXIF APP1 with the given orientation.
pub fn write_jpeg_with_orientation(path: &Path, width: u32, height: u32, orientation: u16) {
    let pixels = gradient_rgb(width, height).to_rgb8().into_raw();
    let mut out = Vec::new();
    let mut encoder = jpeg_encoder::Encoder::new(&mut out, 90);
    encoder
        .add_app_segment(1, &exif::app1_payload(&exif_block(false, orientation)))
        .unwrap();
    encoder
        .encode(
            &pixels,
            width as u16,
            height as u16,
            jpeg_encoder::ColorType::Rgb,
        )
        .unwrap();
    std::fs::write(path, out).unwrap();
}

/// PNG with an embedded ICC profile.
pub fn write_png_with_icc(path: &Path, width: u32, height: u32, icc: &[u8]) {
    let mut encoded = Vec::new();
    gradient_rgb(width, height)
        .write_to(
            &mut std::io::Cursor::new(&mut encoded),
            image::ImageFormat::Png,
        )
        .unwrap();
    let mut png = Png::from_bytes(Bytes::from(encoded)).unwrap();
    png.set_icc_profile(Some(Bytes::copy_from_slice(icc)));
    let mut out = Vec::new();
    png.encoder().write_to(&mut out).unwrap();
    std::fs::write(path, out).unwrap();
}

/// Single-frame 16-bit grayscale TIFF.
pub fn write_gray16_tiff(path: &Path, width: u32, height: u32) {
    let buf: ImageBuffer<Luma<u16>, Vec<u16>> =
        ImageBuffer::from_fn(width, height, |x, y| Luma([(x * 300 + y * 7) as u16]));
    let file = BufWriter::new(File::create(path).unwrap());
    let mut encoder = TiffEncoder::new(file).unwrap();
    encoder
        .write_image::<colortype::Gray16>(width, height, buf.as_raw())
        .unwrap();
}

/// Multi-page 8-bit RGB TIFF, one page per `(width, height)`.
pub fn write_multipage_tiff(path: &Path, pages: &[(u32, u32)]) {
    let file = BufWriter::new(File::create(path).unwrap());
    let mut encoder = TiffEncoder::new(file).unwrap();
    for &(width, height) in pages {
        let pixels = gradient_rgb(width, height).to_rgb8().into_raw();
        encoder
            .write_image::<colortype::RGB8>(width, height, &pixels)
            .unwrap();
    }
}

/// File that sniffs as HEIC but carries no decodable payload.
pub fn write_heic_stub(path: &Path) {
    std::fs::write(path, b"\0\0\0\x18ftypheic\0\0\0\0mif1heic\0\0\0\0broken").unwrap();
}
