//! Configuration module.
//!
//! Handles loading, validating, and merging `focuscrop.toml`. Stock defaults
//! are the base layer; a user file overrides only the keys it names.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [crop]
//! orientation = "portrait"  # portrait (2:3) | landscape (3:2)
//! zoom = 1.0                # > 1 tightens the crop
//! focus = [0.5, 0.5]        # focus point, normalized to the upright image
//!
//! [encoding]
//! jpeg_quality = 95         # 1-100
//! jpeg_progressive = true
//! png_compression = "fast"  # fast | default | best
//! tiff_compression = "lzw"  # lzw | deflate
//!
//! [storage]
//! upload_dir = "uploads"
//! processed_dir = "processed"
//! ttl_secs = 3600           # sweep deletes files older than this
//! max_upload_bytes = 524288000
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{
    CropOrientation, CropRequest, EncodingSettings, ImagingError, PngCompression, Quality,
    TiffCompression,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "focuscrop.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `focuscrop.toml`.
///
/// All fields have defaults. User config files need only specify the values
/// they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FocuscropConfig {
    /// Default crop framing, used when the CLI does not override it.
    pub crop: CropConfig,
    /// Encoder knobs.
    pub encoding: EncodingConfig,
    /// Upload and output directories, size limit, retention.
    pub storage: StorageConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl FocuscropConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.encoding.jpeg_quality) {
            return Err(ConfigError::Validation(
                "encoding.jpeg_quality must be 1-100".into(),
            ));
        }
        if !self.crop.zoom.is_finite() || self.crop.zoom <= 0.0 {
            return Err(ConfigError::Validation(
                "crop.zoom must be a positive number".into(),
            ));
        }
        if self
            .crop
            .focus
            .iter()
            .any(|f| !f.is_finite() || !(0.0..=1.0).contains(f))
        {
            return Err(ConfigError::Validation(
                "crop.focus values must be within [0, 1]".into(),
            ));
        }
        if self.storage.ttl_secs == 0 {
            return Err(ConfigError::Validation(
                "storage.ttl_secs must be non-zero".into(),
            ));
        }
        if self.storage.max_upload_bytes == 0 {
            return Err(ConfigError::Validation(
                "storage.max_upload_bytes must be non-zero".into(),
            ));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Default crop framing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CropConfig {
    pub orientation: CropOrientation,
    pub zoom: f64,
    /// `[x, y]`, each in `[0, 1]`.
    pub focus: [f64; 2],
}

impl Default for CropConfig {
    fn default() -> Self {
        Self {
            orientation: CropOrientation::Portrait,
            zoom: 1.0,
            focus: [0.5, 0.5],
        }
    }
}

impl CropConfig {
    /// Validated request for this framing; CLI flags are merged in first.
    pub fn request(&self) -> Result<CropRequest, ImagingError> {
        CropRequest::new(self.focus[0], self.focus[1], self.zoom, self.orientation)
    }
}

/// Encoder settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EncodingConfig {
    /// JPEG quality (1 = worst, 100 = best).
    pub jpeg_quality: u32,
    pub jpeg_progressive: bool,
    pub png_compression: PngCompression,
    pub tiff_compression: TiffCompression,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        let settings = EncodingSettings::default();
        Self {
            jpeg_quality: settings.jpeg_quality.value() as u32,
            jpeg_progressive: settings.jpeg_progressive,
            png_compression: settings.png_compression,
            tiff_compression: settings.tiff_compression,
        }
    }
}

impl EncodingConfig {
    pub fn settings(&self) -> EncodingSettings {
        EncodingSettings {
            jpeg_quality: Quality::new(self.jpeg_quality),
            jpeg_progressive: self.jpeg_progressive,
            png_compression: self.png_compression,
            tiff_compression: self.tiff_compression,
        }
    }
}

/// Storage layout and retention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub upload_dir: PathBuf,
    pub processed_dir: PathBuf,
    /// Files older than this are removed by `sweep`.
    pub ttl_secs: u64,
    /// Uploads larger than this are rejected.
    pub max_upload_bytes: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
            processed_dir: PathBuf::from("processed"),
            ttl_secs: 3600,
            max_upload_bytes: 500 * 1024 * 1024,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel crop workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged onto.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(FocuscropConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<FocuscropConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: FocuscropConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path`, falling back to stock defaults if it is absent.
pub fn load_config(path: &Path) -> Result<FocuscropConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(path)?;
    if overlay.is_some() {
        tracing::debug!(path = %path.display(), "Loaded config file");
    }
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `focuscrop.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# focuscrop configuration
# =======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Default crop framing (CLI flags override these)
# ---------------------------------------------------------------------------
[crop]
# "portrait" crops to 2:3, "landscape" to 3:2.
orientation = "portrait"

# Zoom factor. 1.0 is the largest box of the target ratio that fits;
# 2.0 halves its size. Values below 1.0 behave like 1.0.
zoom = 1.0

# Focus point as [x, y], normalized to the upright image.
# [0.0, 0.0] is the top-left corner, [1.0, 1.0] the bottom-right.
focus = [0.5, 0.5]

# ---------------------------------------------------------------------------
# Encoding
# ---------------------------------------------------------------------------
# Output format follows the source:
#   TIFF > 8-bit -> TIFF (lossless)    TIFF 8-bit -> JPEG
#   PNG -> PNG     JPEG -> JPEG     HEIC -> JPEG     WebP -> WebP (lossless)
[encoding]
# JPEG quality (1 = worst, 100 = best).
jpeg_quality = 95

# Write progressive JPEGs.
jpeg_progressive = true

# PNG compression effort: "fast", "default" or "best".
png_compression = "fast"

# Lossless TIFF compression: "lzw" or "deflate".
tiff_compression = "lzw"

# ---------------------------------------------------------------------------
# Storage
# ---------------------------------------------------------------------------
[storage]
# Where `ingest` copies uploads.
upload_dir = "uploads"

# Where cropped outputs are written.
processed_dir = "processed"

# `sweep` deletes files in both directories older than this many seconds.
ttl_secs = 3600

# Uploads larger than this are rejected (500 MiB).
max_upload_bytes = 524288000

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel crop workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
