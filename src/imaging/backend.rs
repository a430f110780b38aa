//! Image I/O backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the three operations the crop pipeline
//! needs from the outside world: read metadata, decode, and write an encoded
//! result. Everything between decode and write (orientation, geometry,
//! encoding policy) is pure and lives in the other `imaging` modules.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend). Tests substitute a
//! recording mock so the pipeline can be exercised without codecs.

use super::format::{ColorMode, SourceFormat};
use super::orientation::Orientation;
use super::policy::EncodingPlan;
use image::DynamicImage;
use std::path::Path;
use thiserror::Error;

/// Failures that abort a crop or inspect request.
#[derive(Error, Debug)]
pub enum ImagingError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Decode failed: {0}")]
    Decode(String),
    #[error("Invalid crop geometry: {0}")]
    Geometry(String),
    #[error("Encode failed: {0}")]
    Encode(String),
}

/// Unreadable embedded metadata.
///
/// Never aborts a request: callers log it and degrade the affected field.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetadataError {
    #[error("ICC profile unreadable: {0}")]
    Icc(String),
    #[error("EXIF block unreadable: {0}")]
    Exif(String),
}

/// Intrinsic properties of an image file, read without touching pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataBundle {
    pub format: SourceFormat,
    pub width: u32,
    pub height: u32,
    pub color_mode: ColorMode,
    /// Raw ICC profile bytes, passed through untouched.
    pub icc_profile: Option<Vec<u8>>,
    pub orientation: Orientation,
    /// Raw EXIF block (TIFF structure, no `Exif\0\0` prefix).
    pub exif: Option<Vec<u8>>,
    /// Index of the frame the other fields describe.
    pub frame_index: usize,
    pub frame_count: usize,
}

impl MetadataBundle {
    pub fn bit_depth(&self) -> u8 {
        self.color_mode.bit_depth()
    }
}

/// A decoded frame together with the metadata it was read with.
///
/// Owned by the request that decoded it; dropping it releases the buffer.
#[derive(Debug, Clone)]
pub struct ImageAsset {
    pub image: DynamicImage,
    pub metadata: MetadataBundle,
}

/// Trait for image I/O backends.
pub trait ImageBackend: Sync {
    /// Read format, dimensions, color mode, ICC, EXIF and orientation.
    fn read_metadata(&self, path: &Path) -> Result<MetadataBundle, ImagingError>;

    /// Decode the representative frame of `path`, exactly as stored.
    fn decode(&self, path: &Path) -> Result<ImageAsset, ImagingError>;

    /// Encode `image` according to `plan` and write it to `plan.output_path`.
    fn write(&self, image: &DynamicImage, plan: &EncodingPlan) -> Result<(), ImagingError>;
}
