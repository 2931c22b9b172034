//! nxinfo CLI - Image header extraction from HDF5/NeXus master files.
//!
//! Prints the canonical acquisition header of each input file.
#![allow(
    clippy::uninlined_format_args,
    clippy::cast_possible_truncation,
    clippy::redundant_closure_for_method_calls
)]

use clap::Parser;
use nxinfo_core::{
    render, Axis, ExtractConfig, FileSpec, HeaderReport, ImageHeader, ReportOptions, Warning,
};
use nxinfo_io::Extraction;
use serde::Serialize;
use std::process::ExitCode;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("{0}")]
    NxinfoIo(#[from] nxinfo_io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Exit status after a fatal error.
const FATAL_EXIT: u8 = 2;

/// Print the image header of HDF5/NeXus master files.
#[derive(Parser)]
#[command(name = "nxinfo")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input files; append ",N" to select image N of that file
    #[arg(required = true)]
    files: Vec<String>,

    /// Increase verbosity (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Show the detector ID
    #[arg(long)]
    detid: bool,

    /// Normalise start angles above 360 degrees
    #[arg(long, overrides_with = "nonorm")]
    norm: bool,

    /// Do not normalise angles (default)
    #[arg(long, overrides_with = "norm")]
    nonorm: bool,

    /// Verify the image count and numbering against the linked data files
    #[arg(long)]
    h5check: bool,

    /// Image number used for files given without ",N"
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    image: Option<u32>,

    /// Write one JSON document per file instead of the text report
    #[arg(long)]
    json: bool,
}

/// JSON view of one extracted file.
#[derive(Serialize)]
struct JsonReport<'a> {
    path: String,
    header: &'a ImageHeader,
    image_number: u64,
    image_number_offset: u64,
    images: usize,
    triggers: usize,
    sweeps: usize,
    rotation_axis: Option<Axis>,
    standard_layout: bool,
    oscillating_axes: &'a [Axis],
    warnings: Vec<&'a Warning>,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn print_text(extraction: &Extraction, report: &HeaderReport, verbosity: u8) {
    println!("\n ===== File: {}", extraction.path.display());
    print!("{}", report.text);

    if verbosity > 0 {
        println!(
            " Image number                        = {}/{}",
            extraction.image_number, extraction.effective_images
        );
        if extraction.image_number_offset > 0 {
            println!(
                " Image number offset                 = {}",
                extraction.image_number_offset
            );
        }
        if extraction.triggers.len() > 1 {
            println!(
                " Triggers / sweeps                   = {} / {}",
                extraction.triggers.len(),
                extraction.sweeps
            );
        }
    }

    if verbosity > 1 {
        let geometry = &extraction.geometry;
        for axis in Axis::ALL {
            let vector = geometry.axis(axis);
            if vector.is_available() {
                println!(" {:<35} = {}", format!("{} axis vector", axis.label()), vector);
            }
        }
        for (name, vector) in [
            ("detector distance vector", geometry.detector_distance),
            ("fast pixel direction", geometry.fast_pixel_direction),
            ("slow pixel direction", geometry.slow_pixel_direction),
        ] {
            if vector.is_available() {
                println!(" {:<35} = {}", name, vector);
            }
        }
    }
}

fn print_json(extraction: &Extraction, report: &HeaderReport) -> Result<()> {
    let json = JsonReport {
        path: extraction.path.display().to_string(),
        header: &report.header,
        image_number: extraction.image_number,
        image_number_offset: extraction.image_number_offset,
        images: extraction.effective_images,
        triggers: extraction.declared.triggers,
        sweeps: extraction.sweeps,
        rotation_axis: extraction.rotation_axis,
        standard_layout: extraction.standard_layout,
        oscillating_axes: &report.oscillating_axes,
        warnings: extraction
            .warnings
            .iter()
            .chain(report.warnings.iter())
            .collect(),
    };
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

/// Processes every file; returns the number of decoded files.
fn run(cli: &Cli) -> Result<usize> {
    let extract_config = ExtractConfig::default()
        .with_verbosity(cli.verbose)
        .with_validation(cli.h5check);
    let report_options = ReportOptions::default()
        .with_detector_id(cli.detid)
        .with_normalized_angles(cli.norm && !cli.nonorm)
        .with_verbosity(cli.verbose);

    let mut decoded = 0;
    for arg in &cli.files {
        let spec = match FileSpec::parse(arg) {
            Ok(spec) => spec,
            Err(e) => {
                eprintln!("{arg}: {e}");
                continue;
            }
        };
        let image = spec.image.or(cli.image);
        tracing::debug!(path = %spec.path.display(), image = ?image, "processing file");

        let extraction = match nxinfo_io::extract(&spec.path, image, &extract_config) {
            Ok(extraction) => extraction,
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                eprintln!("{}: {e}", spec.path.display());
                continue;
            }
        };

        let report = render(&extraction.header, &report_options);
        if cli.json {
            print_json(&extraction, &report)?;
        } else {
            print_text(&extraction, &report, cli.verbose);
        }
        decoded += 1;
    }

    Ok(decoded)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(0) => ExitCode::FAILURE,
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("FATAL: {e}");
            ExitCode::from(FATAL_EXIT)
        }
    }
}
