//! markcrop: crop hand-marked questions out of exam photographs.
//!
//! Finds the regions outlined with a colored marker on each input
//! image, writes each region as `cropped_<index>.<ext>` (numbered in
//! input order), and optionally inserts the crops as figures into an
//! existing LaTeX document.
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin markcrop -- [OPTIONS] <IMAGES>...
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use markcrop_export::FigureOptions;
use markcrop_io::{BatchOptions, BatchOutput, CancellationToken, OutputFormat};
use markcrop_pipeline::{ColorBand, PipelineConfig, RegionOrder, SourceStatus};
use tracing_subscriber::EnvFilter;

/// Locate, crop, and clean hand-marked regions on photographed pages.
///
/// Regions are numbered across all images in the order the images are
/// given. Images that cannot be read are reported and skipped.
#[derive(Parser)]
#[command(name = "markcrop", version)]
struct Cli {
    /// Input images (PNG, JPEG, BMP, WebP), in output order.
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Directory for the cropped images (created if missing).
    #[arg(short, long, default_value = "extracted_images")]
    output_dir: PathBuf,

    /// Encoding for the cropped images.
    #[arg(long, value_enum, default_value_t = Format::Jpg)]
    format: Format,

    /// Marker color preset; the hue and saturation/value flags refine it.
    #[arg(long, value_enum, default_value_t = Marker::Green)]
    marker: Marker,

    /// Marker hue range in degrees, as `MIN:MAX` (0-360).
    #[arg(long, value_parser = parse_hue_range)]
    hue_range: Option<(f32, f32)>,

    /// Minimum marker saturation (0-255).
    #[arg(long)]
    sat_min: Option<u8>,

    /// Minimum marker value/brightness (0-255).
    #[arg(long)]
    val_min: Option<u8>,

    /// CLAHE clip limit for lighting normalization (0 disables clipping).
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_CLAHE_CLIP_LIMIT)]
    clahe_clip_limit: f32,

    /// CLAHE tiles per image axis.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_CLAHE_TILE_SIZE, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    clahe_tile_size: u32,

    /// Side of the square structuring element (odd).
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_MORPH_KERNEL_SIZE)]
    morph_kernel_size: u32,

    /// Closing passes (fill gaps in marker strokes).
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_CLOSE_ITERATIONS)]
    close_iterations: u32,

    /// Opening passes (remove specks).
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_OPEN_ITERATIONS)]
    open_iterations: u32,

    /// Minimum enclosed area of a marked region, in square pixels.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_MIN_REGION_AREA)]
    min_region_area: f64,

    /// Pixels trimmed from each side of a region before cropping.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_CROP_PADDING)]
    crop_padding: u32,

    /// Grow the repaint mask inside each crop by this many pixels.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_PAINT_DILATION)]
    paint_dilation: u32,

    /// Number regions top-to-bottom, left-to-right within each image
    /// instead of in discovery order.
    #[arg(long)]
    reading_order: bool,

    /// Full pipeline config as a JSON string.
    ///
    /// When provided, all other pipeline parameter flags are ignored.
    /// The JSON must be a valid `PipelineConfig` serialization; missing
    /// fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,

    /// Process images one at a time instead of in parallel.
    #[arg(long)]
    sequential: bool,

    /// Print the batch result as JSON instead of a human-readable report.
    #[arg(long)]
    json: bool,

    /// LaTeX document to receive one figure per crop.
    #[arg(long, requires = "latex_out")]
    latex: Option<PathBuf>,

    /// Where to write the LaTeX document with figures inserted.
    #[arg(long, requires = "latex")]
    latex_out: Option<PathBuf>,

    /// Width of inserted figures.
    #[arg(long, default_value = FigureOptions::DEFAULT_WIDTH)]
    figure_width: String,

    /// Log more detail (`RUST_LOG` overrides).
    #[arg(short, long)]
    verbose: bool,
}

/// Output encoding selection.
#[derive(Clone, Copy, ValueEnum)]
enum Format {
    /// JPEG, quality 95.
    Jpg,
    /// Lossless PNG.
    Png,
}

/// Marker color preset selection.
#[derive(Clone, Copy, ValueEnum)]
enum Marker {
    /// Green pen or highlighter.
    Green,
    /// Red pen.
    Red,
}

/// Parse `MIN:MAX` hue bounds in degrees.
fn parse_hue_range(s: &str) -> Result<(f32, f32), String> {
    let (min, max) = s
        .split_once(':')
        .ok_or_else(|| format!("expected MIN:MAX, got {s:?}"))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<f32>()
            .map_err(|e| format!("invalid hue {v:?}: {e}"))
    };
    Ok((parse(min)?, parse(max)?))
}

/// Build a [`PipelineConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored. Otherwise, a config is
/// assembled from the individual flags.
fn config_from_cli(cli: &Cli) -> Result<PipelineConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    let mut color_band = match cli.marker {
        Marker::Green => ColorBand::GREEN,
        Marker::Red => ColorBand::RED,
    };
    if let Some((hue_min, hue_max)) = cli.hue_range {
        color_band.hue_min = hue_min;
        color_band.hue_max = hue_max;
    }
    if let Some(sat_min) = cli.sat_min {
        color_band.sat_min = sat_min;
    }
    if let Some(val_min) = cli.val_min {
        color_band.val_min = val_min;
    }

    Ok(PipelineConfig {
        color_band,
        clahe_clip_limit: cli.clahe_clip_limit,
        clahe_tile_size: cli.clahe_tile_size,
        morph_kernel_size: cli.morph_kernel_size,
        close_iterations: cli.close_iterations,
        open_iterations: cli.open_iterations,
        min_region_area: cli.min_region_area,
        crop_padding: cli.crop_padding,
        paint_dilation: cli.paint_dilation,
        region_order: if cli.reading_order {
            RegionOrder::Reading
        } else {
            RegionOrder::Discovery
        },
    })
}

/// Install the `tracing` subscriber on stderr.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let options = BatchOptions {
        config,
        format: match cli.format {
            Format::Jpg => OutputFormat::Jpeg,
            Format::Png => OutputFormat::Png,
        },
        parallel: !cli.sequential,
        cancel: CancellationToken::new(),
    };

    let output = match markcrop_io::run_batch(cli.images.as_slice(), &cli.output_dir, &options) {
        Ok(output) => output,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    if cli.json {
        match serde_json::to_string_pretty(&output) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error serializing batch result: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        print_report(&output);
    }

    if let (Some(latex), Some(latex_out)) = (&cli.latex, &cli.latex_out) {
        let figure_options = FigureOptions {
            width: cli.figure_width.clone(),
            ..FigureOptions::default()
        };
        if let Err(msg) = write_latex(latex, latex_out, &output, &figure_options) {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
        tracing::info!(path = %latex_out.display(), "wrote LaTeX document");
    }

    ExitCode::SUCCESS
}

/// Insert the batch's crops into the document at `input` and write the
/// result to `output_path`.
///
/// Text around the document (e.g. a generated reply) is stripped first
/// when a complete `\documentclass ... \end{document}` is found.
fn write_latex(
    input: &std::path::Path,
    output_path: &std::path::Path,
    output: &BatchOutput,
    options: &FigureOptions,
) -> Result<(), String> {
    let text = std::fs::read_to_string(input)
        .map_err(|e| format!("Error reading {}: {e}", input.display()))?;
    let document = markcrop_export::extract_document(&text).unwrap_or(&text);
    let with_figures = markcrop_export::insert_figures(document, &output.file_names(), options)
        .map_err(|e| format!("Error in {}: {e}", input.display()))?;
    std::fs::write(output_path, with_figures)
        .map_err(|e| format!("Error writing {}: {e}", output_path.display()))
}

/// Print per-source outcomes, stage diagnostics, and the crop list.
fn print_report(output: &BatchOutput) {
    for record in &output.sources {
        let report = &record.report;
        let status = match &report.status {
            SourceStatus::Regions { count } => format!("{count} region(s)"),
            SourceStatus::NoRegions => "no regions".to_owned(),
            SourceStatus::LoadFailed { message } => format!("skipped: {message}"),
            SourceStatus::Cancelled => "cancelled".to_owned(),
        };
        println!("[{}] {}: {status}", report.source, record.path.display());
        if let Some(ref diagnostics) = report.diagnostics {
            println!("{}", diagnostics.report());
        }
        println!();
    }

    println!("Crops ({})\n{}", output.artifacts.len(), "=".repeat(60));
    for artifact in &output.artifacts {
        println!("{:>4}  {}", artifact.index, artifact.path.display());
    }
    for failure in &output.write_failures {
        println!("{:>4}  not written: {}", failure.index, failure.message);
    }
}
