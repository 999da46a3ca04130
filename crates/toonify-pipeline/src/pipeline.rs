//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! Unlike [`crate::cartoonify_staged`] which runs the entire pipeline in
//! one call, [`Pipeline`] lets the caller drive execution one step at a
//! time:
//!
//! ```rust
//! # use toonify_pipeline::{CartoonConfig, Pipeline, PipelineError, RgbImage};
//! # fn run(photo: RgbImage) -> Result<(), PipelineError> {
//! let staged = Pipeline::new(photo, CartoonConfig::default())
//!     .detect_edges()?
//!     .thin()?
//!     .remove_noise()
//!     .stylize()
//!     .recolor_skin()
//!     .composite()?
//!     .into_result();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next pipeline state
//! (or `Result` for fallible stages), carrying all previously computed
//! intermediates. Stages that a configuration disables still run as
//! pass-throughs, so the chain is the same for every mode: evil mode
//! skips thinning and noise removal, sketch mode skips stylizing and
//! skin recoloring, and skin recoloring only runs in alien mode.

use log::debug;

use crate::diagnostics::StageMetrics;
use crate::edge::EdgeField;
use crate::raster;
use crate::skin::SkinReport;
use crate::thin::Skeleton;
use crate::types::{
    CartoonConfig, Dimensions, FloatImage, GrayImage, PipelineError, RgbImage, StagedResult,
};

/// Intermediates shared by every stage after edge detection.
struct Trail {
    config: CartoonConfig,
    source: RgbImage,
    dimensions: Dimensions,
    edge_field: Option<FloatImage>,
    color_mask: Option<GrayImage>,
    luminance_mask: Option<GrayImage>,
    edges: GrayImage,
}

impl Trail {
    fn ink_count(&self, mask: &GrayImage) -> u64 {
        self.dimensions.pixel_count() - raster::count_foreground(mask)
    }
}

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
///
/// Call [`detect_edges`](Self::detect_edges) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing — call .detect_edges() to continue"]
pub struct Pending {
    config: CartoonConfig,
    source: RgbImage,
}

impl Pending {
    /// The source image.
    #[must_use]
    pub const fn source(&self) -> &RgbImage {
        &self.source
    }

    /// Validate the input and build the contour mask.
    ///
    /// Runs the hue-angle edge field, or the Scharr gradient path in
    /// evil mode.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if the configuration
    /// fails validation and [`PipelineError::EmptyImage`] for a
    /// zero-sized source.
    pub fn detect_edges(self) -> Result<EdgesDetected, PipelineError> {
        self.config.validate()?;
        raster::ensure_non_empty(self.source.width(), self.source.height())?;
        let dimensions = Dimensions::of(&self.source);

        let (trail, initial_mask, threshold) = if self.config.evil_mode {
            let contours = crate::evil::evil_contours(&self.source)?;
            let trail = Trail {
                config: self.config,
                source: self.source,
                dimensions,
                edge_field: None,
                color_mask: None,
                luminance_mask: None,
                edges: contours.edges,
            };
            (trail, contours.mask, None)
        } else {
            let field = crate::edge::build_edge_field(&self.source, self.config.contour_threshold)?;
            let initial_mask = field.initial_mask()?;
            let edges = field.normalized();
            let EdgeField {
                total,
                color_mask,
                luminance_mask,
                threshold,
            } = field;
            let trail = Trail {
                config: self.config,
                source: self.source,
                dimensions,
                edge_field: Some(total),
                color_mask: Some(color_mask),
                luminance_mask: Some(luminance_mask),
                edges,
            };
            (trail, initial_mask, Some(threshold))
        };

        Ok(EdgesDetected {
            trail,
            initial_mask,
            threshold,
        })
    }
}

// ───────────────────────── Stage 1: EdgesDetected ────────────────────

/// Pipeline state after edge detection.
///
/// Call [`thin`](Self::thin) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing — call .thin() to continue"]
pub struct EdgesDetected {
    trail: Trail,
    initial_mask: GrayImage,
    threshold: Option<f32>,
}

impl EdgesDetected {
    /// The raw edge field (`None` in evil mode).
    #[must_use]
    pub const fn edge_field(&self) -> Option<&FloatImage> {
        self.trail.edge_field.as_ref()
    }

    /// Edge strength as bytes.
    #[must_use]
    pub const fn edges(&self) -> &GrayImage {
        &self.trail.edges
    }

    /// Initial contour mask: color AND luminance, or the evil mask.
    #[must_use]
    pub const fn initial_mask(&self) -> &GrayImage {
        &self.initial_mask
    }

    /// Metrics for this stage.
    #[must_use]
    pub fn edge_metrics(&self) -> StageMetrics {
        StageMetrics::EdgeDetection {
            method: if self.trail.config.evil_mode {
                "scharr".to_owned()
            } else {
                "hue-angle".to_owned()
            },
            threshold: self.threshold,
            ink_pixel_count: self.trail.ink_count(&self.initial_mask),
            total_pixel_count: self.trail.dimensions.pixel_count(),
        }
    }

    /// Thin the color contours and recombine with the luminance mask.
    ///
    /// The color mask is inverted so contours are foreground, thinned
    /// with the configured strategy, inverted back, and only then ANDed
    /// with the luminance mask. In evil mode the mask passes through.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ThinningDidNotConverge`] if the
    /// configured pass ceiling is reached.
    pub fn thin(self) -> Result<Thinned, PipelineError> {
        let thinned = match (&self.trail.color_mask, &self.trail.luminance_mask) {
            (Some(color_mask), Some(luminance_mask)) => {
                let ink = raster::invert(color_mask);
                let skeleton = crate::thin::thin(
                    &ink,
                    &self.trail.config.thinning,
                    self.trail.config.max_thinning_passes,
                )?;
                let mask = raster::and(&raster::invert(&skeleton.mask), luminance_mask)?;
                debug!(
                    "{} thinning: {} passes, {} pixels removed",
                    self.trail.config.thinning, skeleton.passes, skeleton.removed
                );
                Some((mask, skeleton))
            }
            _ => None,
        };

        Ok(match thinned {
            Some((mask, skeleton)) => Thinned {
                trail: self.trail,
                mask,
                skeleton: Some(skeleton),
            },
            None => Thinned {
                trail: self.trail,
                mask: self.initial_mask,
                skeleton: None,
            },
        })
    }
}

// ───────────────────────── Stage 2: Thinned ──────────────────────────

/// Pipeline state after thinning.
///
/// Call [`remove_noise`](Self::remove_noise) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing — call .remove_noise() to continue"]
pub struct Thinned {
    trail: Trail,
    mask: GrayImage,
    skeleton: Option<Skeleton>,
}

impl Thinned {
    /// The thinned contour mask (255 fill, 0 ink).
    #[must_use]
    pub const fn mask(&self) -> &GrayImage {
        &self.mask
    }

    /// Thinning passes performed (`None` in evil mode).
    #[must_use]
    pub fn passes(&self) -> Option<u32> {
        self.skeleton.as_ref().map(|s| s.passes)
    }

    /// Fill isolated ink specks. Skipped in evil mode.
    pub fn remove_noise(self) -> Cleaned {
        let thinned = self.skeleton.is_some().then(|| self.mask.clone());
        let mut mask = self.mask;
        let healed = thinned
            .is_some()
            .then(|| crate::pepper::remove_pepper_noise(&mut mask));
        Cleaned {
            trail: self.trail,
            thinned,
            mask,
            healed,
        }
    }
}

// ───────────────────────── Stage 3: Cleaned ──────────────────────────

/// Pipeline state after noise removal. The mask is final from here on.
///
/// Call [`stylize`](Self::stylize) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing — call .stylize() to continue"]
pub struct Cleaned {
    trail: Trail,
    thinned: Option<GrayImage>,
    mask: GrayImage,
    healed: Option<usize>,
}

impl Cleaned {
    /// The final contour mask.
    #[must_use]
    pub const fn mask(&self) -> &GrayImage {
        &self.mask
    }

    /// Build the half-resolution stylized base. Skipped in sketch mode.
    pub fn stylize(self) -> Stylized {
        let base = (!self.trail.config.sketch_mode).then(|| {
            let small = crate::resample::half_size(&self.trail.source);
            crate::stylize::stylize(&small)
        });
        Stylized {
            trail: self.trail,
            thinned: self.thinned,
            mask: self.mask,
            base,
        }
    }
}

// ───────────────────────── Stage 4: Stylized ─────────────────────────

/// Pipeline state after stylizing.
///
/// Call [`recolor_skin`](Self::recolor_skin) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing — call .recolor_skin() to continue"]
pub struct Stylized {
    trail: Trail,
    thinned: Option<GrayImage>,
    mask: GrayImage,
    base: Option<RgbImage>,
}

impl Stylized {
    /// The half-resolution stylized base (`None` in sketch mode).
    #[must_use]
    pub const fn base(&self) -> Option<&RgbImage> {
        self.base.as_ref()
    }

    /// Tint skin regions of the base green. Only runs in alien mode.
    pub fn recolor_skin(self) -> Recolored {
        let mut base = self.base;
        let skin = match base.as_mut() {
            Some(small) if self.trail.config.alien_mode => Some(crate::skin::recolor_skin(
                small,
                &self.trail.edges,
                self.trail.config.debug_level,
            )),
            _ => None,
        };
        Recolored {
            trail: self.trail,
            thinned: self.thinned,
            mask: self.mask,
            base,
            skin,
        }
    }
}

// ───────────────────────── Stage 5: Recolored ────────────────────────

/// Pipeline state after optional skin recoloring.
///
/// Call [`composite`](Self::composite) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing — call .composite() to continue"]
pub struct Recolored {
    trail: Trail,
    thinned: Option<GrayImage>,
    mask: GrayImage,
    base: Option<RgbImage>,
    skin: Option<SkinReport>,
}

impl Recolored {
    /// The base after recoloring (`None` in sketch mode).
    #[must_use]
    pub const fn base(&self) -> Option<&RgbImage> {
        self.base.as_ref()
    }

    /// The skin detection report (alien mode only).
    #[must_use]
    pub const fn skin(&self) -> Option<&SkinReport> {
        self.skin.as_ref()
    }

    /// Render the output: the mask itself in sketch mode, otherwise the
    /// upscaled base seen through the mask.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::DimensionMismatch`] if the upscaled base
    /// and the mask disagree in size.
    pub fn composite(self) -> Result<Composited, PipelineError> {
        let output = match &self.base {
            Some(small) => {
                let base = crate::resample::resize_to(small, self.trail.dimensions);
                crate::composite::composite(&base, &self.mask)?
            }
            None => crate::composite::sketch(&self.mask),
        };
        Ok(Composited {
            trail: self.trail,
            thinned: self.thinned,
            mask: self.mask,
            base: self.base,
            skin: self.skin,
            output,
        })
    }
}

// ───────────────────────── Stage 6: Composited ───────────────────────

/// Pipeline state after compositing, the final stage.
///
/// Call [`into_result`](Self::into_result) to extract the
/// [`StagedResult`] containing all intermediates.
#[must_use = "call .into_result() to extract the StagedResult"]
pub struct Composited {
    trail: Trail,
    thinned: Option<GrayImage>,
    mask: GrayImage,
    base: Option<RgbImage>,
    skin: Option<SkinReport>,
    output: RgbImage,
}

impl Composited {
    /// The rendered image.
    #[must_use]
    pub const fn output(&self) -> &RgbImage {
        &self.output
    }

    /// Source image dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.trail.dimensions
    }

    /// Metrics for this stage.
    #[must_use]
    pub fn composite_metrics(&self) -> StageMetrics {
        StageMetrics::Composite {
            sketch: self.base.is_none(),
            fill_pixel_count: raster::count_foreground(&self.mask),
            ink_pixel_count: self.trail.ink_count(&self.mask),
        }
    }

    /// Consume the pipeline and return the full [`StagedResult`].
    #[must_use]
    pub fn into_result(self) -> StagedResult {
        let (seeds, flood_mask) = self
            .skin
            .map_or_else(|| (Vec::new(), None), |s| (s.seeds, s.flood_mask));
        StagedResult {
            edge_field: self.trail.edge_field,
            edges: self.trail.edges,
            color_mask: self.trail.color_mask,
            luminance_mask: self.trail.luminance_mask,
            thinned: self.thinned,
            mask: self.mask,
            stylized: self.base,
            seeds,
            flood_mask,
            output: self.output,
            dimensions: self.trail.dimensions,
        }
    }
}

// ───────────────────────── PipelineStage trait ───────────────────────

/// Total number of stages in the pipeline.
pub const STAGE_COUNT: usize = 7;

/// Trait implemented by every pipeline stage.
pub trait PipelineStage: Sized {
    /// Human-readable name of this stage (e.g. `"source"`, `"thinning"`).
    const NAME: &str;

    /// Zero-based index of this stage (`0` for Pending through `6` for
    /// Composited).
    const INDEX: usize;

    /// Stage-specific metrics for diagnostics.
    ///
    /// Returns `None` for [`Pending`] and for stages the configuration
    /// skipped.
    fn metrics(&self) -> Option<StageMetrics>;
}

impl PipelineStage for Pending {
    const NAME: &str = "source";
    const INDEX: usize = 0;

    fn metrics(&self) -> Option<StageMetrics> {
        None
    }
}

impl PipelineStage for EdgesDetected {
    const NAME: &str = "edge_detection";
    const INDEX: usize = 1;

    fn metrics(&self) -> Option<StageMetrics> {
        Some(self.edge_metrics())
    }
}

impl PipelineStage for Thinned {
    const NAME: &str = "thinning";
    const INDEX: usize = 2;

    fn metrics(&self) -> Option<StageMetrics> {
        self.skeleton.as_ref().map(|s| StageMetrics::Thinning {
            strategy: self.trail.config.thinning.to_string(),
            passes: s.passes,
            removed_pixel_count: s.removed,
            ink_pixel_count: self.trail.ink_count(&self.mask),
        })
    }
}

impl PipelineStage for Cleaned {
    const NAME: &str = "noise_removal";
    const INDEX: usize = 3;

    fn metrics(&self) -> Option<StageMetrics> {
        self.healed.map(|blocks_filled| StageMetrics::NoiseRemoval {
            blocks_filled,
            ink_pixel_count: self.trail.ink_count(&self.mask),
        })
    }
}

impl PipelineStage for Stylized {
    const NAME: &str = "stylize";
    const INDEX: usize = 4;

    fn metrics(&self) -> Option<StageMetrics> {
        self.base.as_ref().map(|b| StageMetrics::Stylize {
            working_width: b.width(),
            working_height: b.height(),
        })
    }
}

impl PipelineStage for Recolored {
    const NAME: &str = "skin";
    const INDEX: usize = 5;

    fn metrics(&self) -> Option<StageMetrics> {
        self.skin.as_ref().map(|s| StageMetrics::Skin {
            seed_count: s.seeds.len(),
            recolored_pixel_count: s.recolored,
        })
    }
}

impl PipelineStage for Composited {
    const NAME: &str = "composite";
    const INDEX: usize = 6;

    fn metrics(&self) -> Option<StageMetrics> {
        Some(self.composite_metrics())
    }
}

// ───────────────────── Pipeline entry point ──────────────────────────

/// Incremental cartoon pipeline.
///
/// Created via [`Pipeline::new`], which stores the source image and
/// config without doing any processing. Each stage method consumes the
/// current state and returns the next, making it a compile-time error
/// to skip stages or call them out of order.
pub struct Pipeline;

impl Pipeline {
    /// Create a new pipeline from a source image and config.
    ///
    /// No processing is performed; validation happens in
    /// [`detect_edges`](Pending::detect_edges).
    #[allow(clippy::new_ret_no_self)]
    pub const fn new(source: RgbImage, config: CartoonConfig) -> Pending {
        Pending { config, source }
    }
}
