//! toonify: turn a photograph into a cartoon or a line sketch.
//!
//! Decodes the input image, runs the cartoon pipeline, and writes the
//! result in the format implied by the output extension. Optional flags
//! write the final contour mask and the skin flood mask, and print
//! per-stage diagnostics.
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin toonify -- [OPTIONS] <INPUT> -o <OUTPUT>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use image::{DynamicImage, ImageBuffer, Pixel, PixelWithColorType, RgbImage};
use log::{debug, info, warn};
use toonify_pipeline::diagnostics::{Clock, cartoonify_with_diagnostics};
use toonify_pipeline::{CartoonConfig, PipelineError, ThinningKind, rgb_source};

/// Classical photo-to-cartoon renderer.
///
/// Traces hue and luminance contours, thins them to single-pixel lines,
/// and draws them over a smoothed copy of the photograph.
#[derive(Parser)]
#[command(name = "toonify", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    input: PathBuf,

    /// Where to write the rendered image.
    #[arg(short, long)]
    output: PathBuf,

    /// Emit the contour mask alone instead of a colored cartoon.
    #[arg(long)]
    sketch: bool,

    /// Recolor skin regions green.
    #[arg(long)]
    alien: bool,

    /// Use Scharr gradient contours instead of the hue-angle field.
    #[arg(long)]
    evil: bool,

    /// Debug overlay level (0 none, 1 seed markers, 2 flood mask).
    #[arg(
        long,
        default_value_t = 0,
        value_parser = clap::value_parser!(u8).range(0..=i64::from(CartoonConfig::MAX_DEBUG_LEVEL))
    )]
    debug_level: u8,

    /// Edge field threshold in [0, 1]; values outside are clamped.
    #[arg(
        long,
        default_value_t = CartoonConfig::DEFAULT_CONTOUR_THRESHOLD,
        allow_negative_numbers = true
    )]
    contour_threshold: f32,

    /// Thinning strategy.
    #[arg(long, value_enum, default_value_t = Thinning::ZhangSuen)]
    thinning: Thinning,

    /// Fail if thinning has not converged after this many passes.
    #[arg(long, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    max_thinning_passes: Option<u32>,

    /// Full pipeline config as a JSON string.
    ///
    /// When provided, all other pipeline parameter flags are ignored.
    /// The JSON must be a valid `CartoonConfig` serialization.
    #[arg(long)]
    config_json: Option<String>,

    /// Also write the final contour mask to this path.
    #[arg(long)]
    mask_out: Option<PathBuf>,

    /// Also write the skin flood mask (alien mode, debug level 2).
    #[arg(long)]
    flood_mask_out: Option<PathBuf>,

    /// Print the per-stage diagnostics report.
    #[arg(long)]
    diagnostics: bool,

    /// Print diagnostics as JSON instead of the human-readable report.
    #[arg(long)]
    json: bool,
}

/// Thinning strategy selection.
#[derive(Clone, Copy, ValueEnum)]
enum Thinning {
    /// Two sub-iterations with the classic neighbor-product rules.
    ZhangSuen,
    /// Two sub-iterations with the pair-count connectivity rules.
    GuoHall,
}

/// Errors surfaced by the command line.
#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("error parsing --config-json: {0}")]
    Config(#[from] serde_json::Error),

    #[error("error reading {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("error writing {}: {source}", path.display())]
    Encode {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("error serializing diagnostics: {0}")]
    Report(serde_json::Error),

    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("--flood-mask-out needs --alien and --debug-level 2")]
    NoFloodMask,
}

/// Build a [`CartoonConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored.
fn config_from_cli(cli: &Cli) -> Result<CartoonConfig, CliError> {
    if let Some(ref json) = cli.config_json {
        return Ok(serde_json::from_str(json)?);
    }

    Ok(CartoonConfig {
        sketch_mode: cli.sketch,
        alien_mode: cli.alien,
        evil_mode: cli.evil,
        debug_level: cli.debug_level,
        contour_threshold: cli.contour_threshold,
        thinning: match cli.thinning {
            Thinning::ZhangSuen => ThinningKind::ZhangSuen,
            Thinning::GuoHall => ThinningKind::GuoHall,
        },
        max_thinning_passes: cli.max_thinning_passes,
    })
}

/// Pipeline source for a decoded image.
///
/// 8-bit luma and RGB go through [`rgb_source`]; any other layout is
/// flattened to RGB8, dropping alpha.
fn source_image(decoded: &DynamicImage) -> Result<RgbImage, CliError> {
    match rgb_source(decoded) {
        Ok(rgb) => Ok(rgb),
        Err(PipelineError::UnsupportedColor(layout)) => {
            warn!("converting {layout} input to RGB8");
            Ok(decoded.to_rgb8())
        }
        Err(e) => Err(e.into()),
    }
}

fn save<P>(image: &ImageBuffer<P, Vec<u8>>, path: &Path) -> Result<(), CliError>
where
    P: PixelWithColorType + Pixel<Subpixel = u8>,
{
    image.save(path).map_err(|source| CliError::Encode {
        path: path.to_path_buf(),
        source,
    })?;
    info!(
        "wrote {}x{} image to {}",
        image.width(),
        image.height(),
        path.display()
    );
    Ok(())
}

fn run(cli: &Cli) -> Result<(), CliError> {
    let config = config_from_cli(cli)?;
    debug!("config: {config:?}");

    let decoded = image::open(&cli.input).map_err(|source| CliError::Decode {
        path: cli.input.clone(),
        source,
    })?;
    let source = source_image(&decoded)?;
    info!(
        "loaded {} ({}x{})",
        cli.input.display(),
        source.width(),
        source.height()
    );

    let (staged, diagnostics) = cartoonify_with_diagnostics(&source, &config, &StdClock)?;

    save(&staged.output, &cli.output)?;
    if let Some(ref path) = cli.mask_out {
        save(&staged.mask, path)?;
    }
    if let Some(ref path) = cli.flood_mask_out {
        let flood = staged.flood_mask.as_ref().ok_or(CliError::NoFloodMask)?;
        save(flood, path)?;
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&diagnostics).map_err(CliError::Report)?;
        println!("{json}");
    } else if cli.diagnostics {
        println!("{}", diagnostics.report());
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}
