//! Boxslice: fixed-size training windows from annotated images.
//!
//! Boxslice slices large annotated images into `window_size × window_size`
//! crops centered, with jitter, on individual bounding boxes and rewrites
//! every retained box in window-local normalized (YOLO) coordinates. The
//! result is a paired set of window rasters and label files ready for an
//! object-detection training pipeline.
//!
//! # Modules
//!
//! - [`annot`]: annotation model and CVAT XML parsing
//! - [`slice`]: the windowing/resampling core
//! - [`source`]: local-directory and HTTP image/annotation acquisition
//! - [`sink`]: Ultralytics-style dataset output
//! - [`error`]: error types for boxslice operations

pub mod annot;
pub mod error;
pub mod sink;
pub mod slice;
pub mod source;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use error::BoxsliceError;

use slice::{
    Jitter, RandomJitter, SliceIssue, SliceIssueCode, SliceOptions, DEFAULT_WINDOW_SIZE,
};

/// The boxslice CLI application.
#[derive(Parser)]
#[command(name = "boxslice")]
#[command(version, author, about)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Slice annotated images into fixed-size training windows.
    Slice(SliceArgs),
}

/// Arguments for the slice subcommand.
#[derive(clap::Args)]
struct SliceArgs {
    /// CVAT XML annotation file (local path or http(s) URL).
    #[arg(long)]
    annotations: String,

    /// Directory or http(s) base URL the source images live under.
    #[arg(long)]
    images: String,

    /// Output dataset directory.
    #[arg(long)]
    output: PathBuf,

    /// Edge length of the square training windows, in pixels.
    #[arg(long, default_value_t = DEFAULT_WINDOW_SIZE)]
    window_size: u32,

    /// Inclusive numeric range of image stems to slice, e.g. '0..159'.
    #[arg(long)]
    range: Option<String>,

    /// Seed for window jitter; omit for per-run entropy.
    #[arg(long)]
    seed: Option<u64>,

    /// Class name written to data.yaml.
    #[arg(long, default_value = "object")]
    class_name: String,

    /// Output format for the run report ('text' or 'json').
    #[arg(long, default_value = "text")]
    report: String,
}

/// Run the boxslice CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), BoxsliceError> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Slice(args)) => run_slice(args),
        None => {
            println!("boxslice {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Fixed-size training windows from annotated images.");
            println!();
            println!("Run 'boxslice --help' for usage information.");
            Ok(())
        }
    }
}

/// Execute the slice subcommand.
fn run_slice(args: SliceArgs) -> Result<(), BoxsliceError> {
    if !matches!(args.report.as_str(), "text" | "json") {
        return Err(BoxsliceError::UnsupportedFormat(format!(
            "'{}' (supported: text, json)",
            args.report
        )));
    }

    let options = SliceOptions {
        window_size: args.window_size,
        training_range: args.range.as_deref().map(parse_range).transpose()?,
    };

    let xml = source::read_annotation_text(&args.annotations)?;
    let annotations = annot::cvat::from_cvat_xml_str(&xml)?;
    let images = source::ImageSource::from_spec(&args.images)?;

    let mut jitter: Box<dyn Jitter> = match args.seed {
        Some(seed) => Box::new(RandomJitter::seeded(seed)),
        None => Box::new(RandomJitter::from_entropy()),
    };

    let (output, mut report) =
        slice::slice_dataset(&annotations, &images, &options, jitter.as_mut())?;

    if annotations.dropped_boxes > 0 {
        report.add(SliceIssue::info(
            SliceIssueCode::InvalidBoxDropped,
            format!(
                "{} malformed box(es) dropped while parsing annotations",
                annotations.dropped_boxes
            ),
        ));
    }

    sink::write_slice_output(&args.output, &output, &args.class_name)?;

    match args.report.as_str() {
        "json" => {
            let rendered = serde_json::to_string_pretty(&report)
                .map_err(|source| BoxsliceError::ReportRender(source.to_string()))?;
            println!("{rendered}");
        }
        _ => {
            println!("Sliced into {}:", args.output.display());
            print!("{report}");
        }
    }

    Ok(())
}

fn parse_range(raw: &str) -> Result<(u64, u64), BoxsliceError> {
    let invalid = || BoxsliceError::InvalidRange(raw.to_string());

    let (lo, hi) = raw.split_once("..").ok_or_else(invalid)?;
    let lo: u64 = lo.trim().parse().map_err(|_| invalid())?;
    let hi: u64 = hi.trim().parse().map_err(|_| invalid())?;
    if lo > hi {
        return Err(invalid());
    }
    Ok((lo, hi))
}
