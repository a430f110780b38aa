//! Crop engine: decode, orient, frame, encode.
//!
//! | Step | Module | Crate / function |
//! |---|---|---|
//! | **Detect + read metadata** | [`format`], [`rust_backend`] | magic bytes, `image`, `tiff`, `libheif-rs` |
//! | **Orientation** | [`orientation`], [`exif`] | `kamadak-exif`, `DynamicImage::rotate*`/`flip*` |
//! | **Crop box** | `calculations` | pure arithmetic |
//! | **Encoding policy** | [`policy`] | pure `match` over [`SourceFormat`] |
//! | **Encode + write** | [`encode`] | `tiff`, `image` (PNG, WebP), `jpeg-encoder`, `img-parts` |
//! | **Reports** | [`info`], [`icc`] | ICC `desc` parser |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for crop geometry (unit testable)
//! - **Parameters**: Data structures describing a crop request
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: [`crop`] and [`inspect`], combining the pure steps with a backend

pub mod backend;
mod calculations;
pub mod codecs;
pub mod encode;
pub mod exif;
pub mod format;
#[cfg(feature = "heif")]
mod heif;
pub mod icc;
pub mod info;
pub mod operations;
pub mod orientation;
mod params;
pub mod policy;
pub mod rust_backend;

pub use backend::{ImageAsset, ImageBackend, ImagingError, MetadataBundle, MetadataError};
pub use calculations::{compute_crop_rectangle, crop_size, rounded_aspect_ratio};
pub use codecs::CodecRegistry;
pub use format::{ColorMode, SourceFormat};
pub use info::ImageInfo;
pub use operations::{CropOutcome, InspectReport, crop, inspect, try_crop};
pub use orientation::Orientation;
pub use params::{CropOrientation, CropRectangle, CropRequest, Quality, ZOOM_EPSILON};
pub use policy::{
    EncoderParams, EncodingPlan, EncodingSettings, OutputFormat, PngCompression, TiffCompression,
    plan_encoding,
};
pub use rust_backend::RustBackend;
