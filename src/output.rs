//! CLI output formatting for every subcommand.
//!
//! # Display Contract
//!
//! Each entity gets a header line (positional index + file name, or just the
//! file name for single-item commands) followed by indented context lines.
//!
//! ## Crop
//!
//! ```text
//! 001 photo.jpg → photo_cropped_3x2.jpg (JPEG)
//!     Crop: (0, 167)-(4000, 2834) [4000x2667]
//! 002 broken.png
//!     Error: Decode failed: ...
//!
//! Cropped 1 of 2 images
//! ```
//!
//! ## Inspect
//!
//! ```text
//! photo.jpg
//!     Format: JPEG (RGB)
//!     Dimensions: 4000x3000 (1.333)
//!     File size: 2.3 MB
//!     Color: RGB 8-bit, 8 bits per sample
//!     Profile: sRGB IEC61966-2.1
//!     Orientation: 6
//!     Frames: 1
//! ```
//!
//! ## Ingest / Cleanup / Sweep
//!
//! ```text
//! 3f2a…_IMG_0001.heic
//!     Source: IMG_0001.heic
//!     Preview: 3f2a…_IMG_0001_preview.jpg
//!
//! Removed 4 files
//!
//! Swept 3 expired files (12 kept)
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::imaging::{CropOutcome, ImageInfo, InspectReport};
use crate::storage::{IngestedUpload, SweepReport};
use std::path::Path;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{}", line);
    }
}

// ============================================================================
// Crop
// ============================================================================

/// Format one crop outcome. `index` is the input's 1-based position.
pub fn format_crop_outcome(index: usize, input: &Path, outcome: &CropOutcome) -> Vec<String> {
    let mut lines = Vec::new();
    let header = format!("{} {}", format_index(index), file_name(input));
    match (&outcome.output_path, outcome.output_format) {
        (Some(output), Some(format)) if outcome.success => {
            lines.push(format!("{} → {} ({})", header, file_name(output), format));
            if let Some(rect) = &outcome.rectangle {
                lines.push(format!("{}Crop: {}", indent(1), rect));
            }
        }
        _ => {
            lines.push(header);
            let error = outcome.error.as_deref().unwrap_or("unknown error");
            lines.push(format!("{}Error: {}", indent(1), error));
        }
    }
    lines
}

/// Format a whole crop batch followed by a summary line.
pub fn format_crop_batch(results: &[(&Path, CropOutcome)]) -> Vec<String> {
    let mut lines: Vec<String> = results
        .iter()
        .enumerate()
        .flat_map(|(i, (input, outcome))| format_crop_outcome(i + 1, input, outcome))
        .collect();
    let succeeded = results.iter().filter(|(_, o)| o.success).count();
    lines.push(String::new());
    lines.push(format!(
        "Cropped {} of {}",
        succeeded,
        plural(results.len(), "image")
    ));
    lines
}

pub fn print_crop_batch(results: &[(&Path, CropOutcome)]) {
    print_lines(format_crop_batch(results));
}

// ============================================================================
// Inspect
// ============================================================================

/// Format image details as context lines under the file name.
pub fn format_image_info(info: &ImageInfo) -> Vec<String> {
    let pad = indent(1);
    vec![
        info.filename.clone(),
        format!("{pad}Format: {} ({})", info.format, info.mode),
        format!(
            "{pad}Dimensions: {}x{} ({})",
            info.width, info.height, info.aspect_ratio
        ),
        format!("{pad}File size: {}", info.file_size_human),
        format!(
            "{pad}Color: {}, {} bits per sample",
            info.color_type, info.bit_depth
        ),
        format!("{pad}Profile: {}", info.color_profile),
        format!("{pad}Orientation: {}", info.orientation),
        format!("{pad}Frames: {}", info.frames),
    ]
}

pub fn format_inspect_report(path: &Path, report: &InspectReport) -> Vec<String> {
    match report {
        InspectReport::Info(info) => format_image_info(info),
        InspectReport::Error { error } => {
            vec![file_name(path), format!("{}Error: {}", indent(1), error)]
        }
    }
}

pub fn print_inspect_report(path: &Path, report: &InspectReport) {
    print_lines(format_inspect_report(path, report));
}

// ============================================================================
// Storage
// ============================================================================

pub fn format_ingest(source: &Path, upload: &IngestedUpload) -> Vec<String> {
    let mut lines = vec![
        upload.filename.clone(),
        format!("{}Source: {}", indent(1), file_name(source)),
    ];
    if upload.preview_filename != upload.filename {
        lines.push(format!("{}Preview: {}", indent(1), upload.preview_filename));
    }
    lines.extend(format_image_info(&upload.image_info).into_iter().skip(1));
    lines
}

pub fn print_ingest(source: &Path, upload: &IngestedUpload) {
    print_lines(format_ingest(source, upload));
}

pub fn format_cleanup(removed: usize) -> Vec<String> {
    vec![format!("Removed {}", plural(removed, "file"))]
}

pub fn print_cleanup(removed: usize) {
    print_lines(format_cleanup(removed));
}

pub fn format_sweep(report: &SweepReport) -> Vec<String> {
    let mut lines: Vec<String> = report
        .removed
        .iter()
        .map(|path| format!("{}{}", indent(1), path.display()))
        .collect();
    let mut summary = format!(
        "Swept {} ({} kept)",
        plural(report.removed.len(), "expired file"),
        report.kept
    );
    if report.failed > 0 {
        summary.push_str(&format!(", {} failed", report.failed));
    }
    lines.insert(0, summary);
    lines
}

pub fn print_sweep(report: &SweepReport) {
    print_lines(format_sweep(report));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::{CropRectangle, OutputFormat};
    use std::path::PathBuf;

    fn success() -> CropOutcome {
        CropOutcome {
            success: true,
            output_path: Some(PathBuf::from("/out/photo_cropped_3x2.jpg")),
            output_format: Some(OutputFormat::Jpeg),
            rectangle: Some(CropRectangle {
                left: 0,
                top: 167,
                right: 4000,
                bottom: 2834,
            }),
            error: None,
        }
    }

    fn failure() -> CropOutcome {
        CropOutcome {
            success: false,
            output_path: None,
            output_format: None,
            rectangle: None,
            error: Some("Decode failed: truncated".to_string()),
        }
    }

    fn info() -> ImageInfo {
        ImageInfo {
            filename: "photo.jpg".to_string(),
            format: "JPEG".to_string(),
            mode: "RGB".to_string(),
            width: 4000,
            height: 3000,
            aspect_ratio: 1.333,
            file_size: 2_400_000,
            file_size_human: "2.3 MB".to_string(),
            bit_depth: 8,
            color_type: "RGB 8-bit".to_string(),
            color_profile: "None".to_string(),
            orientation: 1,
            frames: 1,
        }
    }

    #[test]
    fn crop_success_lines() {
        let lines = format_crop_outcome(1, Path::new("/up/photo.jpg"), &success());
        assert_eq!(
            lines,
            vec![
                "001 photo.jpg → photo_cropped_3x2.jpg (JPEG)",
                "    Crop: (0, 167)-(4000, 2834) [4000x2667]",
            ]
        );
    }

    #[test]
    fn crop_failure_lines() {
        let lines = format_crop_outcome(12, Path::new("broken.png"), &failure());
        assert_eq!(
            lines,
            vec!["012 broken.png", "    Error: Decode failed: truncated"]
        );
    }

    #[test]
    fn crop_batch_summary_counts_successes() {
        let a = PathBuf::from("a.jpg");
        let b = PathBuf::from("b.png");
        let results = vec![(a.as_path(), success()), (b.as_path(), failure())];
        let lines = format_crop_batch(&results);
        assert_eq!(lines.last().unwrap(), "Cropped 1 of 2 images");
        assert!(lines[2].starts_with("002 b.png"));
    }

    #[test]
    fn image_info_lines() {
        let lines = format_image_info(&info());
        assert_eq!(lines[0], "photo.jpg");
        assert_eq!(lines[1], "    Format: JPEG (RGB)");
        assert_eq!(lines[2], "    Dimensions: 4000x3000 (1.333)");
        assert_eq!(lines[4], "    Color: RGB 8-bit, 8 bits per sample");
        assert_eq!(lines.len(), 8);
    }

    #[test]
    fn inspect_error_lines() {
        let report = InspectReport::Error {
            error: "Unable to read image information: nope".to_string(),
        };
        let lines = format_inspect_report(Path::new("/x/bad.tif"), &report);
        assert_eq!(
            lines,
            vec!["bad.tif", "    Error: Unable to read image information: nope"]
        );
    }

    #[test]
    fn ingest_lines_show_preview_only_when_distinct() {
        let mut upload = IngestedUpload {
            filename: "abc_IMG.heic".to_string(),
            path: PathBuf::from("uploads/abc_IMG.heic"),
            preview_filename: "abc_IMG_preview.jpg".to_string(),
            image_info: info(),
        };
        let lines = format_ingest(Path::new("/home/me/IMG.heic"), &upload);
        assert_eq!(lines[0], "abc_IMG.heic");
        assert_eq!(lines[1], "    Source: IMG.heic");
        assert_eq!(lines[2], "    Preview: abc_IMG_preview.jpg");

        upload.preview_filename = upload.filename.clone();
        let lines = format_ingest(Path::new("IMG.heic"), &upload);
        assert!(!lines.iter().any(|l| l.contains("Preview")));
    }

    #[test]
    fn cleanup_and_sweep_summaries() {
        assert_eq!(format_cleanup(1), vec!["Removed 1 file"]);
        assert_eq!(format_cleanup(0), vec!["Removed 0 files"]);

        let report = SweepReport {
            removed: vec![PathBuf::from("uploads/a.jpg")],
            kept: 2,
            failed: 1,
        };
        assert_eq!(
            format_sweep(&report),
            vec!["Swept 1 expired file (2 kept), 1 failed", "    uploads/a.jpg"]
        );
    }

    #[test]
    fn indent_levels() {
        assert_eq!(indent(0), "");
        assert_eq!(indent(2), "        ");
    }
}
