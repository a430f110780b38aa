use clap::{Parser, Subcommand};
use focuscrop::config::{self, FocuscropConfig};
use focuscrop::imaging::{self, CropOrientation, CropRequest, RustBackend};
use focuscrop::{output, storage};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing_subscriber::EnvFilter;

fn version_string() -> &'static str {
    let on_tag = env!("FOCUSCROP_ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("FOCUSCROP_GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "focuscrop")]
#[command(about = "Focus-point aspect-ratio cropping for photographs")]
#[command(long_about = "\
Focus-point aspect-ratio cropping for photographs

Crops images to 2:3 (portrait) or 3:2 (landscape) around a focus point,
honoring EXIF orientation and keeping bit depth and color profile where
the source format allows.

Output format follows the source:

  TIFF 16-bit  → TIFF (lossless, ICC kept)
  TIFF 8-bit   → JPEG
  PNG          → PNG  (ICC + EXIF kept)
  JPEG, HEIC   → JPEG (ICC + EXIF kept, orientation reset to 1)
  WebP         → WebP (lossless)

Working directories:

  uploads/                         # `ingest` copies uploads here
  │   ├── 3f2a…_IMG_0001.heic
  │   └── 3f2a…_IMG_0001_preview.jpg
  processed/                       # `crop` writes here by default
      └── 3f2a…_IMG_0001_cropped_2x3.jpg

Run 'focuscrop gen-config' to generate a documented focuscrop.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Config file (ignored if missing)
    #[arg(long, default_value = config::DEFAULT_CONFIG_FILE, global = true)]
    config: PathBuf,

    /// Log debug details (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

/// Crop framing flags; unset values fall back to `[crop]` in the config.
#[derive(clap::Args, Clone)]
struct FramingArgs {
    /// Horizontal focus, 0 (left) to 1 (right)
    #[arg(long)]
    focus_x: Option<f64>,

    /// Vertical focus, 0 (top) to 1 (bottom)
    #[arg(long)]
    focus_y: Option<f64>,

    /// Zoom factor; 1 frames the largest box that fits
    #[arg(long)]
    zoom: Option<f64>,

    /// portrait (2:3) or landscape (3:2)
    #[arg(long)]
    orientation: Option<CropOrientation>,
}

#[derive(Subcommand)]
enum Command {
    /// Crop images around a focus point
    Crop {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output directory (default: storage.processed_dir)
        #[arg(long)]
        out_dir: Option<PathBuf>,

        #[command(flatten)]
        framing: FramingArgs,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Report format, dimensions, color and metadata of images
    Inspect {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Copy a file into the upload directory under a unique name
    Ingest {
        file: PathBuf,

        /// Upload directory (default: storage.upload_dir)
        #[arg(long)]
        upload_dir: Option<PathBuf>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove uploads, their previews and crop outputs by upload name
    Cleanup {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Remove files older than the TTL from the working directories
    Sweep {
        /// Override storage.ttl_secs
        #[arg(long)]
        ttl_secs: Option<u64>,
    },
    /// Print a stock focuscrop.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let config = config::load_config(&cli.config)?;
    let backend = RustBackend::with_registry(imaging::codecs::init());

    match cli.command {
        Command::Crop {
            inputs,
            out_dir,
            framing,
            json,
        } => {
            let request = crop_request(&config, &framing)?;
            let out_dir = out_dir.unwrap_or_else(|| config.storage.processed_dir.clone());
            std::fs::create_dir_all(&out_dir)?;
            init_thread_pool(&config.processing);

            let settings = config.encoding.settings();
            let results: Vec<(&Path, imaging::CropOutcome)> = inputs
                .par_iter()
                .map(|input| {
                    let name = input
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    let hint = out_dir.join(storage::processed_output_name(
                        &name,
                        request.orientation(),
                    ));
                    let outcome = imaging::crop(&backend, input, &hint, &request, &settings);
                    (input.as_path(), outcome)
                })
                .collect();

            if json {
                let items: Vec<_> = results
                    .iter()
                    .map(|(input, outcome)| serde_json::json!({ "input": input, "result": outcome }))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&items)?);
            } else {
                output::print_crop_batch(&results);
            }

            let failed = results.iter().filter(|(_, o)| !o.success).count();
            if failed > 0 {
                return Err(format!("{failed} of {} crops failed", results.len()).into());
            }
        }
        Command::Inspect { paths, json } => {
            let reports: Vec<_> = paths
                .iter()
                .map(|path| (path, imaging::inspect(&backend, path)))
                .collect();
            if json {
                let items: Vec<_> = reports.iter().map(|(_, report)| report).collect();
                println!("{}", serde_json::to_string_pretty(&items)?);
            } else {
                for (path, report) in &reports {
                    output::print_inspect_report(path, report);
                }
            }
        }
        Command::Ingest {
            file,
            upload_dir,
            json,
        } => {
            let upload_dir = upload_dir.unwrap_or_else(|| config.storage.upload_dir.clone());
            let limits = storage::UploadLimits {
                registry: backend.registry(),
                max_bytes: config.storage.max_upload_bytes,
            };
            let upload = storage::ingest(&backend, &file, &upload_dir, limits)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&upload)?);
            } else {
                output::print_ingest(&file, &upload);
            }
        }
        Command::Cleanup { names } => {
            let removed = storage::cleanup(
                &names,
                &config.storage.upload_dir,
                &config.storage.processed_dir,
            )?;
            output::print_cleanup(removed);
        }
        Command::Sweep { ttl_secs } => {
            let ttl = Duration::from_secs(ttl_secs.unwrap_or(config.storage.ttl_secs));
            let report = storage::sweep(
                &[
                    config.storage.upload_dir.as_path(),
                    config.storage.processed_dir.as_path(),
                ],
                ttl,
                SystemTime::now(),
            );
            output::print_sweep(&report);
        }
        // Printed before config loading
        Command::GenConfig => {}
    }

    Ok(())
}

/// `RUST_LOG` wins; otherwise `info`, or `debug` with `--verbose`.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Merge CLI framing flags over the `[crop]` config section.
fn crop_request(
    config: &FocuscropConfig,
    framing: &FramingArgs,
) -> Result<CropRequest, imaging::ImagingError> {
    let mut crop = config.crop.clone();
    if let Some(x) = framing.focus_x {
        crop.focus[0] = x;
    }
    if let Some(y) = framing.focus_y {
        crop.focus[1] = y;
    }
    if let Some(zoom) = framing.zoom {
        crop.zoom = zoom;
    }
    if let Some(orientation) = framing.orientation {
        crop.orientation = orientation;
    }
    crop.request()
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; users can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
