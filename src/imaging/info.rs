//! Human-readable image summaries.
//!
//! Built from a [`MetadataBundle`] plus the file size; used for both the
//! source (before cropping) and the written output (after).

use super::backend::MetadataBundle;
use super::calculations::rounded_aspect_ratio;
use super::icc;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Shown when a profile is embedded but its description cannot be read.
pub const PROFILE_UNREADABLE: &str = "Present (unable to read)";
/// Shown when no profile is embedded.
pub const PROFILE_NONE: &str = "None";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub filename: String,
    pub format: String,
    pub mode: String,
    pub width: u32,
    pub height: u32,
    pub aspect_ratio: f64,
    pub file_size: u64,
    pub file_size_human: String,
    pub bit_depth: u8,
    pub color_type: String,
    pub color_profile: String,
    pub orientation: u16,
    pub frames: usize,
}

impl ImageInfo {
    pub fn from_metadata(path: &Path, metadata: &MetadataBundle, file_size: u64) -> Self {
        Self {
            filename: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            format: metadata.format.name().to_string(),
            mode: metadata.color_mode.mode().to_string(),
            width: metadata.width,
            height: metadata.height,
            aspect_ratio: rounded_aspect_ratio(metadata.width, metadata.height),
            file_size,
            file_size_human: human_size(file_size),
            bit_depth: metadata.bit_depth(),
            color_type: metadata.color_mode.label().to_string(),
            color_profile: describe_color_profile(metadata.icc_profile.as_deref()),
            orientation: metadata.orientation.code(),
            frames: metadata.frame_count,
        }
    }
}

/// Description of an embedded ICC profile for display.
pub fn describe_color_profile(profile: Option<&[u8]>) -> String {
    match profile {
        None => PROFILE_NONE.to_string(),
        Some(bytes) => icc::describe_profile(bytes).unwrap_or_else(|e| {
            tracing::debug!(error = %e, "ICC description unavailable");
            PROFILE_UNREADABLE.to_string()
        }),
    }
}

/// Format a byte count at powers of 1024: `512 B`, `1.5 KB`, `3.2 MB`.
pub fn human_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    match bytes {
        b if b < KB => format!("{b} B"),
        b if b < MB => format!("{:.1} KB", b as f64 / KB as f64),
        b if b < GB => format!("{:.1} MB", b as f64 / MB as f64),
        b => format!("{:.1} GB", b as f64 / GB as f64),
    }
}
