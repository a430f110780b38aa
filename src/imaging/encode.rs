//! Encoders for each output container.
//!
//! | Output | Encoder | Metadata |
//! |---|---|---|
//! | TIFF | `tiff` crate, LZW / Deflate, native bit depth | ICC as tag 34675 |
//! | PNG | `image::codecs::png`, native bit depth | ICC + EXIF spliced by `img-parts` |
//! | JPEG | `jpeg-encoder`, 8-bit luma or RGB, optional progressive | ICC (APP2) + EXIF (APP1) |
//! | WebP | `image::codecs::webp` lossless, 8-bit RGB/RGBA | ICC + EXIF spliced by `img-parts` |
//!
//! Every encoder produces an in-memory buffer; [`write`] then puts it on
//! disk with a single `fs::write`.

use super::backend::ImagingError;
use super::exif;
use super::params::Quality;
use super::policy::{EncoderParams, EncodingPlan, PngCompression, TiffCompression};
use image::DynamicImage;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::codecs::webp::WebPEncoder;
use img_parts::png::Png;
use img_parts::webp::WebP;
use img_parts::{Bytes, ImageEXIF, ImageICC};
use std::borrow::Cow;
use std::io::{Cursor, Seek, Write};
use tiff::encoder::{Compression, DeflateLevel, TiffEncoder, TiffValue, colortype};
use tiff::tags::{Tag, Type};

fn encode_err(what: &str, e: impl std::fmt::Display) -> ImagingError {
    ImagingError::Encode(format!("{what}: {e}"))
}

/// Encode `image` per `plan` and write the result to `plan.output_path`.
pub fn write(image: &DynamicImage, plan: &EncodingPlan) -> Result<(), ImagingError> {
    let bytes = encode(image, plan)?;
    std::fs::write(&plan.output_path, bytes)?;
    Ok(())
}

/// Encode `image` per `plan` into memory.
pub fn encode(image: &DynamicImage, plan: &EncodingPlan) -> Result<Vec<u8>, ImagingError> {
    let icc = plan.icc_profile.as_deref();
    let exif = plan.exif.as_deref();
    match plan.params {
        EncoderParams::Tiff { compression } => encode_tiff(image, compression, icc),
        EncoderParams::Png { compression } => {
            splice_png(encode_png(image, compression)?, icc, exif)
        }
        EncoderParams::Jpeg {
            quality,
            progressive,
        } => encode_jpeg(image, quality, progressive, icc, exif),
        EncoderParams::WebP { .. } => splice_webp(
            encode_webp(image)?,
            image.color().has_alpha(),
            icc,
            exif,
        ),
    }
}

// ============================================================================
// TIFF
// ============================================================================

fn encode_tiff(
    image: &DynamicImage,
    compression: TiffCompression,
    icc: Option<&[u8]>,
) -> Result<Vec<u8>, ImagingError> {
    let compression = match compression {
        TiffCompression::Lzw => Compression::Lzw,
        TiffCompression::Deflate => Compression::Deflate(DeflateLevel::default()),
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut encoder = TiffEncoder::new(&mut cursor)
            .map_err(|e| encode_err("TIFF", e))?
            .with_compression(compression);
        let (w, h) = (image.width(), image.height());
        let enc = &mut encoder;
        match image {
            DynamicImage::ImageLuma8(buf) => {
                write_tiff::<colortype::Gray8, _>(enc, w, h, buf.as_raw(), icc)
            }
            DynamicImage::ImageRgb8(buf) => {
                write_tiff::<colortype::RGB8, _>(enc, w, h, buf.as_raw(), icc)
            }
            DynamicImage::ImageRgba8(buf) => {
                write_tiff::<colortype::RGBA8, _>(enc, w, h, buf.as_raw(), icc)
            }
            DynamicImage::ImageLumaA8(_) => {
                let buf = image.to_rgba8();
                write_tiff::<colortype::RGBA8, _>(enc, w, h, buf.as_raw(), icc)
            }
            DynamicImage::ImageLuma16(buf) => {
                write_tiff::<colortype::Gray16, _>(enc, w, h, buf.as_raw(), icc)
            }
            DynamicImage::ImageRgb16(buf) => {
                write_tiff::<colortype::RGB16, _>(enc, w, h, buf.as_raw(), icc)
            }
            DynamicImage::ImageRgba16(buf) => {
                write_tiff::<colortype::RGBA16, _>(enc, w, h, buf.as_raw(), icc)
            }
            DynamicImage::ImageRgb32F(buf) => {
                write_tiff::<colortype::RGB32Float, _>(enc, w, h, buf.as_raw(), icc)
            }
            DynamicImage::ImageRgba32F(buf) => {
                write_tiff::<colortype::RGBA32Float, _>(enc, w, h, buf.as_raw(), icc)
            }
            _ => {
                // LumaA16 and future variants: widen to RGBA at 16 bits
                let buf = image.to_rgba16();
                write_tiff::<colortype::RGBA16, _>(enc, w, h, buf.as_raw(), icc)
            }
        }?;
    }
    Ok(cursor.into_inner())
}

/// ICC bytes for the `IccProfile` tag, which readers expect as UNDEFINED.
struct IccTagValue<'a>(&'a [u8]);

impl TiffValue for IccTagValue<'_> {
    const BYTE_LEN: u8 = 1;
    const FIELD_TYPE: Type = Type::UNDEFINED;

    fn count(&self) -> usize {
        self.0.len()
    }

    fn data(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self.0)
    }
}

fn write_tiff<C, W>(
    encoder: &mut TiffEncoder<W>,
    width: u32,
    height: u32,
    data: &[C::Inner],
    icc: Option<&[u8]>,
) -> Result<(), ImagingError>
where
    C: colortype::ColorType,
    W: Write + Seek,
    [C::Inner]: TiffValue,
{
    let mut image = encoder
        .new_image::<C>(width, height)
        .map_err(|e| encode_err("TIFF", e))?;
    if let Some(icc) = icc {
        image
            .encoder()
            .write_tag(Tag::IccProfile, IccTagValue(icc))
            .map_err(|e| encode_err("TIFF ICC tag", e))?;
    }
    image.write_data(data).map_err(|e| encode_err("TIFF", e))
}

// ============================================================================
// PNG
// ============================================================================

fn png_compression(compression: PngCompression) -> CompressionType {
    match compression {
        PngCompression::Fast => CompressionType::Fast,
        PngCompression::Default => CompressionType::Default,
        PngCompression::Best => CompressionType::Best,
    }
}

/// PNG carries 8- and 16-bit integer samples; float buffers are narrowed.
fn png_compatible(image: &DynamicImage) -> Cow<'_, DynamicImage> {
    match image {
        DynamicImage::ImageRgb32F(_) => Cow::Owned(DynamicImage::ImageRgb16(image.to_rgb16())),
        DynamicImage::ImageRgba32F(_) => Cow::Owned(DynamicImage::ImageRgba16(image.to_rgba16())),
        _ => Cow::Borrowed(image),
    }
}

fn encode_png(image: &DynamicImage, compression: PngCompression) -> Result<Vec<u8>, ImagingError> {
    let mut out = Vec::new();
    let encoder =
        PngEncoder::new_with_quality(&mut out, png_compression(compression), FilterType::Adaptive);
    png_compatible(image)
        .write_with_encoder(encoder)
        .map_err(|e| encode_err("PNG", e))?;
    Ok(out)
}

fn splice_png(
    encoded: Vec<u8>,
    icc: Option<&[u8]>,
    exif: Option<&[u8]>,
) -> Result<Vec<u8>, ImagingError> {
    if icc.is_none() && exif.is_none() {
        return Ok(encoded);
    }
    let mut png = Png::from_bytes(Bytes::from(encoded)).map_err(|e| encode_err("PNG", e))?;
    if let Some(icc) = icc {
        png.set_icc_profile(Some(Bytes::copy_from_slice(icc)));
    }
    if let Some(blob) = exif {
        png.set_exif(Some(Bytes::copy_from_slice(exif::strip_exif_header(blob))));
    }
    let mut out = Vec::new();
    png.encoder()
        .write_to(&mut out)
        .map_err(|e| encode_err("PNG", e))?;
    Ok(out)
}

// ============================================================================
// JPEG
// ============================================================================

fn encode_jpeg(
    image: &DynamicImage,
    quality: Quality,
    progressive: bool,
    icc: Option<&[u8]>,
    exif: Option<&[u8]>,
) -> Result<Vec<u8>, ImagingError> {
    let (width, height) = match (u16::try_from(image.width()), u16::try_from(image.height())) {
        (Ok(w), Ok(h)) => (w, h),
        _ => {
            return Err(ImagingError::Encode(format!(
                "JPEG cannot hold {}x{} pixels",
                image.width(),
                image.height()
            )));
        }
    };

    let grayscale = matches!(
        image,
        DynamicImage::ImageLuma8(_)
            | DynamicImage::ImageLumaA8(_)
            | DynamicImage::ImageLuma16(_)
            | DynamicImage::ImageLumaA16(_)
    );
    let (pixels, color) = if grayscale {
        (image.to_luma8().into_raw(), jpeg_encoder::ColorType::Luma)
    } else {
        (image.to_rgb8().into_raw(), jpeg_encoder::ColorType::Rgb)
    };

    let mut out = Vec::new();
    let mut encoder = jpeg_encoder::Encoder::new(&mut out, quality.value());
    encoder.set_progressive(progressive);
    if let Some(icc) = icc {
        encoder
            .add_icc_profile(icc)
            .map_err(|e| encode_err("JPEG ICC", e))?;
    }
    if let Some(blob) = exif {
        // APP1 is limited to one 64 KiB segment
        if let Err(e) = encoder.add_app_segment(1, &exif::app1_payload(blob)) {
            tracing::warn!(error = %e, "EXIF block too large for JPEG, omitting");
        }
    }
    encoder
        .encode(&pixels, width, height, color)
        .map_err(|e| encode_err("JPEG", e))?;
    Ok(out)
}

// ============================================================================
// WebP
// ============================================================================

fn encode_webp(image: &DynamicImage) -> Result<Vec<u8>, ImagingError> {
    let mut out = Vec::new();
    let encoder = WebPEncoder::new_lossless(&mut out);
    let eight_bit = if image.color().has_alpha() {
        DynamicImage::ImageRgba8(image.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(image.to_rgb8())
    };
    eight_bit
        .write_with_encoder(encoder)
        .map_err(|e| encode_err("WebP", e))?;
    Ok(out)
}

/// Byte offset of the VP8X feature flags in an extended WebP file.
const VP8X_FLAGS_OFFSET: usize = 20;
const VP8X_ALPHA_FLAG: u8 = 0x10;

fn splice_webp(
    encoded: Vec<u8>,
    has_alpha: bool,
    icc: Option<&[u8]>,
    exif: Option<&[u8]>,
) -> Result<Vec<u8>, ImagingError> {
    if icc.is_none() && exif.is_none() {
        return Ok(encoded);
    }
    let mut webp = WebP::from_bytes(Bytes::from(encoded)).map_err(|e| encode_err("WebP", e))?;
    if let Some(icc) = icc {
        webp.set_icc_profile(Some(Bytes::copy_from_slice(icc)));
    }
    if let Some(blob) = exif {
        webp.set_exif(Some(Bytes::copy_from_slice(exif::strip_exif_header(blob))));
    }
    let mut out = Vec::new();
    webp.encoder()
        .write_to(&mut out)
        .map_err(|e| encode_err("WebP", e))?;
    // img-parts rebuilds VP8X from its chunk list and never sets the alpha
    // flag, so decoders would drop the VP8L alpha channel.
    if has_alpha && out.get(12..16) == Some(b"VP8X".as_slice()) {
        if let Some(flags) = out.get_mut(VP8X_FLAGS_OFFSET) {
            *flags |= VP8X_ALPHA_FLAG;
        }
    }
    Ok(out)
}
