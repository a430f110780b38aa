//! Upload intake and working-directory housekeeping.
//!
//! Uploads are copied into the upload directory under a collision-free
//! name, validated by reading their metadata, and (for HEIC) given a JPEG
//! preview. Crop outputs land in the processed directory named after the
//! upload. Files are removed either explicitly by name ([`cleanup`]) or by
//! age ([`sweep`]).
//!
//! ```text
//! uploads/
//! ├── 3f2a…_IMG_0001.heic
//! └── 3f2a…_IMG_0001_preview.jpg
//! processed/
//! └── 3f2a…_IMG_0001_cropped_2x3.jpg
//! ```

use crate::imaging::{
    CodecRegistry, CropOrientation, EncoderParams, EncodingPlan, ImageBackend, ImageInfo,
    ImagingError, OutputFormat, Quality, SourceFormat, info::human_size, orientation,
};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use walkdir::WalkDir;

/// Hex digits of the content digest used as upload name prefix.
const NAME_PREFIX_LEN: usize = 32;

/// Suffix appended to an upload's stem for its JPEG preview.
pub const PREVIEW_SUFFIX: &str = "_preview.jpg";

/// Quality of HEIC previews.
const PREVIEW_QUALITY: u32 = 95;

/// Extensions a crop output may carry after the encoding policy ran.
const PROCESSED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tif", "tiff", "webp"];

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Upload rejected: {0}")]
    Rejected(String),
    #[error(transparent)]
    Imaging(#[from] ImagingError),
}

/// Limits applied at intake.
#[derive(Debug, Clone, Copy)]
pub struct UploadLimits<'a> {
    /// Decoders available; drives the extension allow-list.
    pub registry: &'a CodecRegistry,
    pub max_bytes: u64,
}

/// An upload that passed validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestedUpload {
    pub filename: String,
    pub path: PathBuf,
    /// Equal to `filename` unless a HEIC preview was created.
    pub preview_filename: String,
    pub image_info: ImageInfo,
}

/// Outcome of [`sweep`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SweepReport {
    pub removed: Vec<PathBuf>,
    pub kept: usize,
    pub failed: usize,
}

fn extension_of(name: &str) -> Option<String> {
    name.rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
}

/// Whether `name` has an extension on the upload allow-list.
pub fn allowed_file(registry: &CodecRegistry, name: &str) -> bool {
    extension_of(name).is_some_and(|ext| registry.upload_extensions().contains(&ext.as_str()))
}

/// Reduce a client-supplied filename to a safe single path component.
///
/// Path separators become spaces, whitespace runs become `_`, anything
/// outside `[A-Za-z0-9_.-]` is dropped and leading/trailing `.`/`_` are
/// trimmed. May return an empty string.
pub fn secure_filename(name: &str) -> String {
    let spaced: String = name
        .chars()
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();
    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");
    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();
    kept.trim_matches(|c| c == '.' || c == '_').to_string()
}

/// Collision-free stored name: a SHA-256 prefix of `seed`, then the
/// sanitized original name.
///
/// If sanitizing strips the name down to nothing usable, `upload.<ext>` is
/// used so the stored file keeps its extension.
pub fn unique_upload_name(original: &str, seed: &[u8]) -> String {
    let digest = format!("{:x}", Sha256::digest(seed));
    let mut safe = secure_filename(original);
    if extension_of(&safe) != extension_of(original) {
        safe = match extension_of(original) {
            Some(ext) => format!("upload.{ext}"),
            None => "upload".to_string(),
        };
    }
    format!("{}_{}", &digest[..NAME_PREFIX_LEN], safe)
}

/// Name of the crop output for an upload: `{stem}_cropped_{2x3|3x2}{.ext}`.
///
/// The extension is the upload's; the encoding policy may still swap it.
pub fn processed_output_name(upload_name: &str, orientation: CropOrientation) -> String {
    let (stem, ext) = split_name(upload_name);
    format!("{stem}_cropped_{}{ext}", orientation.suffix())
}

/// Name of the JPEG preview for an upload.
pub fn preview_name(upload_name: &str) -> String {
    let (stem, _) = split_name(upload_name);
    format!("{stem}{PREVIEW_SUFFIX}")
}

/// Split at the last `.` into stem and dotted extension (possibly empty).
fn split_name(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => name.split_at(idx),
        _ => (name, ""),
    }
}

/// SHA-256 of a file's contents, streamed.
fn hash_file(path: &Path) -> io::Result<Vec<u8>> {
    let mut hasher = Sha256::new();
    let mut file = fs::File::open(path)?;
    io::copy(&mut file, &mut hasher)?;
    Ok(hasher.finalize().to_vec())
}

/// Copy `source` into `upload_dir`, validate it and create a preview.
///
/// The stored copy is deleted again if validation fails. A HEIC upload
/// gets a `_preview.jpg` sibling when it can be decoded; otherwise its
/// preview is the upload itself.
pub fn ingest(
    backend: &impl ImageBackend,
    source: &Path,
    upload_dir: &Path,
    limits: UploadLimits<'_>,
) -> Result<IngestedUpload, StorageError> {
    let original = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| StorageError::Rejected("No file selected".into()))?;

    if !allowed_file(limits.registry, &original) {
        return Err(StorageError::Rejected(
            "Invalid file format. Please upload TIFF, PNG, JPEG, HEIC, or WebP files.".into(),
        ));
    }

    let size = fs::metadata(source)?.len();
    if size > limits.max_bytes {
        return Err(StorageError::Rejected(format!(
            "{} exceeds the {} upload limit",
            human_size(size),
            human_size(limits.max_bytes)
        )));
    }

    let mut seed = hash_file(source)?;
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    seed.extend_from_slice(&nanos.to_le_bytes());
    let filename = unique_upload_name(&original, &seed);

    fs::create_dir_all(upload_dir)?;
    let path = upload_dir.join(&filename);
    fs::copy(source, &path)?;
    tracing::info!(source = %source.display(), stored = %filename, bytes = size, "Upload stored");

    let metadata = match backend.read_metadata(&path) {
        Ok(metadata) => metadata,
        Err(e) => {
            tracing::error!(file = %filename, error = %e, "Upload failed validation");
            fs::remove_file(&path)?;
            return Err(e.into());
        }
    };

    let preview_filename = if metadata.format == SourceFormat::Heic {
        create_preview(backend, &path, upload_dir, &filename)
    } else {
        filename.clone()
    };

    let image_info = ImageInfo::from_metadata(&path, &metadata, size);
    Ok(IngestedUpload {
        filename,
        path,
        preview_filename,
        image_info,
    })
}

/// Decode, orient and write a JPEG preview. Falls back to the upload's own
/// name when any step fails.
fn create_preview(
    backend: &impl ImageBackend,
    path: &Path,
    upload_dir: &Path,
    filename: &str,
) -> String {
    let name = preview_name(filename);
    let result = backend.decode(path).and_then(|asset| {
        let upright = orientation::normalize(asset.image, asset.metadata.orientation);
        let plan = EncodingPlan {
            output_format: OutputFormat::Jpeg,
            output_path: upload_dir.join(&name),
            params: EncoderParams::Jpeg {
                quality: Quality::new(PREVIEW_QUALITY),
                progressive: false,
            },
            icc_profile: asset.metadata.icc_profile,
            exif: None,
        };
        backend.write(&upright, &plan)
    });
    match result {
        Ok(()) => {
            tracing::info!(preview = %name, "Preview created");
            name
        }
        Err(e) => {
            tracing::warn!(file = %filename, error = %e, "No preview for upload");
            filename.to_string()
        }
    }
}

fn remove_if_present(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Remove uploads named in `filenames` together with their previews and
/// every crop output derived from them. Returns the number of files removed.
///
/// Names that are not a single path component are skipped.
pub fn cleanup(
    filenames: &[String],
    upload_dir: &Path,
    processed_dir: &Path,
) -> Result<usize, StorageError> {
    let mut removed = 0;
    for filename in filenames {
        if filename.is_empty() || secure_component(filename).is_none() {
            tracing::warn!(name = %filename, "Skipping unsafe cleanup name");
            continue;
        }
        let (stem, _) = split_name(filename);

        let mut candidates = vec![upload_dir.join(filename), upload_dir.join(preview_name(filename))];
        for orientation in [CropOrientation::Portrait, CropOrientation::Landscape] {
            for ext in PROCESSED_EXTENSIONS {
                candidates.push(processed_dir.join(format!(
                    "{stem}_cropped_{}.{ext}",
                    orientation.suffix()
                )));
            }
        }

        for candidate in candidates {
            if remove_if_present(&candidate)? {
                tracing::debug!(path = %candidate.display(), "Removed");
                removed += 1;
            }
        }
    }
    tracing::info!(removed, "Cleanup finished");
    Ok(removed)
}

fn secure_component(name: &str) -> Option<&str> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(std::path::Component::Normal(_)), None) => Some(name),
        _ => None,
    }
}

/// Delete regular files directly inside `dirs` whose modification time is
/// more than `ttl` before `now`. Missing directories are skipped.
pub fn sweep(dirs: &[&Path], ttl: Duration, now: SystemTime) -> SweepReport {
    let mut report = SweepReport::default();
    for dir in dirs {
        if !dir.is_dir() {
            tracing::debug!(dir = %dir.display(), "Sweep skipped missing directory");
            continue;
        }
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = %e, "Unreadable directory entry");
                    report.failed += 1;
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let modified = entry.metadata().ok().and_then(|m| m.modified().ok());
            let expired = modified
                .and_then(|m| now.duration_since(m).ok())
                .is_some_and(|age| age > ttl);
            if !expired {
                report.kept += 1;
                continue;
            }
            match fs::remove_file(entry.path()) {
                Ok(()) => {
                    tracing::debug!(path = %entry.path().display(), "Expired file removed");
                    report.removed.push(entry.into_path());
                }
                Err(e) => {
                    tracing::warn!(path = %entry.path().display(), error = %e, "Sweep could not remove file");
                    report.failed += 1;
                }
            }
        }
    }
    tracing::info!(
        removed = report.removed.len(),
        kept = report.kept,
        failed = report.failed,
        "Sweep finished"
    );
    report
}
