//! High-level image operations.
//!
//! These functions combine the pure steps (orientation, geometry, encoding
//! policy) with backend execution. Neither returns `Err`: failures are
//! folded into the outcome so callers can report them next to successes.

use super::backend::{ImageAsset, ImageBackend, ImagingError};
use super::calculations::compute_crop_rectangle;
use super::info::ImageInfo;
use super::orientation::{self, Orientation};
use super::params::{CropRectangle, CropRequest};
use super::policy::{EncodingSettings, OutputFormat, plan_encoding};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, ImagingError>;

/// Outcome of a single crop request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CropOutcome {
    pub success: bool,
    /// Where the output was written; may differ from the hint in extension.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_format: Option<OutputFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rectangle: Option<CropRectangle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CropOutcome {
    fn succeeded(cropped: CroppedImage) -> Self {
        Self {
            success: true,
            output_path: Some(cropped.output_path),
            output_format: Some(cropped.output_format),
            rectangle: Some(cropped.rectangle),
            error: None,
        }
    }

    fn failed(error: &ImagingError) -> Self {
        Self {
            success: false,
            output_path: None,
            output_format: None,
            rectangle: None,
            error: Some(error.to_string()),
        }
    }
}

/// What [`try_crop`] produced.
#[derive(Debug, Clone, PartialEq)]
pub struct CroppedImage {
    pub output_path: PathBuf,
    pub output_format: OutputFormat,
    pub rectangle: CropRectangle,
}

/// Crop `input` and write the result next to `output_hint`.
///
/// Pipeline: decode, normalize orientation, compute the crop box on the
/// upright buffer, plan the encoding, write.
pub fn try_crop(
    backend: &impl ImageBackend,
    input: &Path,
    output_hint: &Path,
    request: &CropRequest,
    settings: &EncodingSettings,
) -> Result<CroppedImage> {
    let ImageAsset {
        image,
        mut metadata,
    } = backend.decode(input)?;

    let upright = orientation::normalize(image, metadata.orientation);
    metadata.orientation = Orientation::Normal;
    metadata.width = upright.width();
    metadata.height = upright.height();

    let rectangle = compute_crop_rectangle(upright.width(), upright.height(), request)?;
    tracing::debug!(
        input = %input.display(),
        width = metadata.width,
        height = metadata.height,
        rect = %rectangle,
        "Computed crop"
    );
    let cropped = upright.crop_imm(
        rectangle.left,
        rectangle.top,
        rectangle.width(),
        rectangle.height(),
    );
    drop(upright);

    let plan = plan_encoding(&metadata, output_hint, settings);
    tracing::debug!(
        output = %plan.output_path.display(),
        format = %plan.output_format,
        icc = plan.icc_profile.is_some(),
        exif = plan.exif.is_some(),
        "Encoding plan"
    );
    backend.write(&cropped, &plan)?;

    Ok(CroppedImage {
        output_path: plan.output_path,
        output_format: plan.output_format,
        rectangle,
    })
}

/// Crop `input`, folding any failure into the returned outcome.
pub fn crop(
    backend: &impl ImageBackend,
    input: &Path,
    output_hint: &Path,
    request: &CropRequest,
    settings: &EncodingSettings,
) -> CropOutcome {
    match try_crop(backend, input, output_hint, request, settings) {
        Ok(cropped) => {
            tracing::info!(
                input = %input.display(),
                output = %cropped.output_path.display(),
                rect = %cropped.rectangle,
                "Cropped"
            );
            CropOutcome::succeeded(cropped)
        }
        Err(e) => {
            tracing::error!(input = %input.display(), error = %e, "Crop failed");
            CropOutcome::failed(&e)
        }
    }
}

/// Report for [`inspect`]: image details, or the reason they are unavailable.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum InspectReport {
    Info(ImageInfo),
    Error { error: String },
}

impl InspectReport {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

fn try_inspect(backend: &impl ImageBackend, path: &Path) -> Result<ImageInfo> {
    let metadata = backend.read_metadata(path)?;
    let file_size = std::fs::metadata(path)?.len();
    Ok(ImageInfo::from_metadata(path, &metadata, file_size))
}

/// Describe the image at `path`. Never fails; read errors become
/// [`InspectReport::Error`].
pub fn inspect(backend: &impl ImageBackend, path: &Path) -> InspectReport {
    match try_inspect(backend, path) {
        Ok(info) => {
            tracing::info!(path = %path.display(), format = %info.format, "Inspected");
            InspectReport::Info(info)
        }
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Inspect failed");
            InspectReport::Error {
                error: format!("Unable to read image information: {e}"),
            }
        }
    }
}
