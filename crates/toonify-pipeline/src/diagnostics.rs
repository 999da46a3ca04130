//! Pipeline diagnostics: timing, counts, and other metrics for each stage.
//!
//! Timing goes through the [`Clock`] trait so the library never reads
//! the system time itself; the CLI supplies a clock backed by
//! `std::time::Instant` and tests supply a fake one.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pipeline::{Pipeline, PipelineStage};
use crate::raster;
use crate::types::{CartoonConfig, PipelineError, RgbImage, StagedResult};

/// Source of monotonic timestamps.
pub trait Clock {
    /// Opaque timestamp type.
    type Instant;

    /// The current time.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single pipeline run.
///
/// Stages that the configuration skips have `Option` fields that are
/// `None` when the stage did no work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Edge field or Scharr contours.
    pub edge_detection: StageDiagnostics,
    /// Skeletonization (not in evil mode).
    pub thinning: Option<StageDiagnostics>,
    /// Pepper noise removal (not in evil mode).
    pub noise_removal: Option<StageDiagnostics>,
    /// Mean-shift and bilateral smoothing (not in sketch mode).
    pub stylize: Option<StageDiagnostics>,
    /// Skin recoloring (alien mode only).
    pub skin: Option<StageDiagnostics>,
    /// Final composition.
    pub composite: StageDiagnostics,
    /// Total wall-clock duration of the entire pipeline (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics that vary by pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Edge detection metrics.
    EdgeDetection {
        /// `"hue-angle"` or `"scharr"`.
        method: String,
        /// Threshold after clamping (hue-angle only).
        threshold: Option<f32>,
        /// Ink pixels in the initial mask.
        ink_pixel_count: u64,
        /// Total pixel count for computing ink density.
        total_pixel_count: u64,
    },
    /// Thinning metrics.
    Thinning {
        /// Which thinning strategy was used.
        strategy: String,
        /// Full passes until convergence.
        passes: u32,
        /// Ink pixels removed from the color contours.
        removed_pixel_count: u64,
        /// Ink pixels in the recombined mask.
        ink_pixel_count: u64,
    },
    /// Noise removal metrics.
    NoiseRemoval {
        /// 3×3 blocks filled.
        blocks_filled: usize,
        /// Ink pixels left.
        ink_pixel_count: u64,
    },
    /// Stylize metrics.
    Stylize {
        /// Working width of the smoothed base.
        working_width: u32,
        /// Working height of the smoothed base.
        working_height: u32,
    },
    /// Skin recoloring metrics.
    Skin {
        /// Seeds inside the image.
        seed_count: usize,
        /// Pixels whose green channel was boosted.
        recolored_pixel_count: u64,
    },
    /// Composition metrics.
    Composite {
        /// Whether the output is the bare mask.
        sketch: bool,
        /// Pixels showing the base.
        fill_pixel_count: u64,
        /// Pixels drawn as ink.
        ink_pixel_count: u64,
    },
}

/// High-level summary counts for the entire pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Source image width in pixels.
    pub image_width: u32,
    /// Source image height in pixels.
    pub image_height: u32,
    /// Total pixel count.
    pub pixel_count: u64,
    /// Ink pixels in the final mask.
    pub ink_pixel_count: u64,
}

impl PipelineDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)",
            self.summary.image_width, self.summary.image_height, self.summary.pixel_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        let stages = [
            ("Edge Detection", Some(&self.edge_detection)),
            ("Thinning", self.thinning.as_ref()),
            ("Noise Removal", self.noise_removal.as_ref()),
            ("Stylize", self.stylize.as_ref()),
            ("Skin", self.skin.as_ref()),
            ("Composite", Some(&self.composite)),
        ];
        for (name, diag) in stages {
            let Some(diag) = diag else { continue };
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        #[allow(clippy::cast_precision_loss)]
        let density = if self.summary.pixel_count > 0 {
            self.summary.ink_pixel_count as f64 / self.summary.pixel_count as f64 * 100.0
        } else {
            0.0
        };
        lines.push(format!(
            "Ink pixels: {} ({density:.1}%)",
            self.summary.ink_pixel_count
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::EdgeDetection {
            method,
            threshold,
            ink_pixel_count,
            total_pixel_count,
        } => {
            #[allow(clippy::cast_precision_loss)]
            let density = if *total_pixel_count > 0 {
                *ink_pixel_count as f64 / *total_pixel_count as f64 * 100.0
            } else {
                0.0
            };
            let threshold = threshold.map_or_else(String::new, |t| format!(" threshold={t:.2}"));
            format!("{method}{threshold} ink={ink_pixel_count} ({density:.1}%)")
        }
        StageMetrics::Thinning {
            strategy,
            passes,
            removed_pixel_count,
            ink_pixel_count,
        } => format!(
            "{strategy} {passes} passes, removed={removed_pixel_count} ink={ink_pixel_count}"
        ),
        StageMetrics::NoiseRemoval {
            blocks_filled,
            ink_pixel_count,
        } => format!("filled={blocks_filled} ink={ink_pixel_count}"),
        StageMetrics::Stylize {
            working_width,
            working_height,
        } => format!("{working_width}x{working_height}"),
        StageMetrics::Skin {
            seed_count,
            recolored_pixel_count,
        } => format!("{seed_count} seeds, recolored={recolored_pixel_count}"),
        StageMetrics::Composite {
            sketch,
            fill_pixel_count,
            ink_pixel_count,
        } => format!(
            "{} fill={fill_pixel_count} ink={ink_pixel_count}",
            if *sketch { "sketch" } else { "cartoon" }
        ),
    }
}

/// Run `f`, returning its result and how long it took.
fn timed<C: Clock, T>(clock: &C, f: impl FnOnce() -> T) -> (T, Duration) {
    let start = clock.now();
    let value = f();
    (value, clock.elapsed(&start))
}

fn stage_diagnostics<S: PipelineStage>(stage: &S, duration: Duration) -> Option<StageDiagnostics> {
    stage
        .metrics()
        .map(|metrics| StageDiagnostics { duration, metrics })
}

/// Run the full pipeline, timing every stage.
///
/// # Errors
///
/// Returns any [`PipelineError`] raised by a stage.
pub fn cartoonify_with_diagnostics<C: Clock>(
    source: &RgbImage,
    config: &CartoonConfig,
    clock: &C,
) -> Result<(StagedResult, PipelineDiagnostics), PipelineError> {
    let start = clock.now();
    let pending = Pipeline::new(source.clone(), config.clone());

    let (detected, d) = timed(clock, || pending.detect_edges());
    let detected = detected?;
    let edge_detection = StageDiagnostics {
        duration: d,
        metrics: detected.edge_metrics(),
    };

    let (thinned, d) = timed(clock, || detected.thin());
    let thinned = thinned?;
    let thinning = stage_diagnostics(&thinned, d);

    let (cleaned, d) = timed(clock, || thinned.remove_noise());
    let noise_removal = stage_diagnostics(&cleaned, d);

    let (stylized, d) = timed(clock, || cleaned.stylize());
    let stylize = stage_diagnostics(&stylized, d);

    let (recolored, d) = timed(clock, || stylized.recolor_skin());
    let skin = stage_diagnostics(&recolored, d);

    let (composited, d) = timed(clock, || recolored.composite());
    let composited = composited?;
    let composite = StageDiagnostics {
        duration: d,
        metrics: composited.composite_metrics(),
    };

    let staged = composited.into_result();
    let total_duration = clock.elapsed(&start);
    let pixel_count = staged.dimensions.pixel_count();
    let summary = PipelineSummary {
        image_width: staged.dimensions.width,
        image_height: staged.dimensions.height,
        pixel_count,
        ink_pixel_count: pixel_count - raster::count_foreground(&staged.mask),
    };

    Ok((
        staged,
        PipelineDiagnostics {
            edge_detection,
            thinning,
            noise_removal,
            stylize,
            skin,
            composite,
            total_duration,
            summary,
        },
    ))
}
