//! Shared types for the toonify cartoon pipeline.

use serde::{Deserialize, Serialize};

use crate::skin::SeedPoint;
use crate::thin::ThinningKind;

/// Re-export `GrayImage` so downstream crates can reference masks and
/// edge maps without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbImage` so downstream crates can reference color
/// rasters without depending on `image` directly.
pub use image::RgbImage;

/// Single-channel `f32` raster holding signed edge responses.
pub type FloatImage = image::ImageBuffer<image::Luma<f32>, Vec<f32>>;

/// Mask value for fill (non-contour) pixels.
pub const FOREGROUND: u8 = 255;

/// Mask value for ink (contour) pixels.
pub const BACKGROUND: u8 = 0;

/// Pixel dimensions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Dimensions of an existing image buffer.
    #[must_use]
    pub fn of<P: image::Pixel, C: std::ops::Deref<Target = [P::Subpixel]>>(
        image: &image::ImageBuffer<P, C>,
    ) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
        }
    }

    /// Total pixel count.
    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Configuration for one cartoonify run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CartoonConfig {
    /// Return the binary contour mask (replicated to three channels)
    /// instead of a stylized image.
    pub sketch_mode: bool,

    /// Flood-fill skin regions from fixed seed points and tint them green.
    pub alien_mode: bool,

    /// Use the Scharr gradient contour path instead of the hue-angle
    /// edge field, skipping thinning and noise removal.
    pub evil_mode: bool,

    /// 0 = none, 1 = draw seed markers, 2 = also expose the flood mask.
    pub debug_level: u8,

    /// Cutoff applied to the summed edge response. Clamped to `[0, 1]`.
    /// Larger values mark more pixels as fill.
    pub contour_threshold: f32,

    /// Which thinning algorithm skeletonizes the contour ink.
    pub thinning: ThinningKind,

    /// Optional ceiling on full thinning passes. `None` iterates until
    /// convergence.
    pub max_thinning_passes: Option<u32>,
}

impl CartoonConfig {
    /// Default contour threshold.
    pub const DEFAULT_CONTOUR_THRESHOLD: f32 = 0.5;

    /// Highest meaningful debug level.
    pub const MAX_DEBUG_LEVEL: u8 = 2;

    /// Contour threshold clamped into `[0, 1]`.
    #[must_use]
    pub fn clamped_threshold(&self) -> f32 {
        self.contour_threshold.clamp(0.0, 1.0)
    }

    /// Check the configuration invariants.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if the threshold is NaN,
    /// the debug level exceeds [`Self::MAX_DEBUG_LEVEL`], or the thinning
    /// pass ceiling is zero.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.contour_threshold.is_nan() {
            return Err(PipelineError::InvalidConfig(
                "contour_threshold must be a number".to_owned(),
            ));
        }
        if self.debug_level > Self::MAX_DEBUG_LEVEL {
            return Err(PipelineError::InvalidConfig(format!(
                "debug_level must be at most {}, got {}",
                Self::MAX_DEBUG_LEVEL,
                self.debug_level,
            )));
        }
        if self.max_thinning_passes == Some(0) {
            return Err(PipelineError::InvalidConfig(
                "max_thinning_passes must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }
}

impl Default for CartoonConfig {
    fn default() -> Self {
        Self {
            sketch_mode: false,
            alien_mode: false,
            evil_mode: false,
            debug_level: 0,
            contour_threshold: Self::DEFAULT_CONTOUR_THRESHOLD,
            thinning: ThinningKind::default(),
            max_thinning_passes: None,
        }
    }
}

/// Result of running the pipeline with every intermediate preserved.
///
/// Fields that only exist on some paths are `None` when skipped: the
/// evil path has no edge field or thinning output, sketch mode has no
/// stylized base.
#[derive(Debug, Clone)]
pub struct StagedResult {
    /// Summed hue-angle Laplacian response (hue-angle path only).
    pub edge_field: Option<FloatImage>,
    /// Edge strength as bytes: the normalized edge field, or the Scharr
    /// magnitude on the evil path.
    pub edges: GrayImage,
    /// Color contour mask before thinning (hue-angle path only).
    pub color_mask: Option<GrayImage>,
    /// Luminance contour mask (hue-angle path only).
    pub luminance_mask: Option<GrayImage>,
    /// Thinned color mask combined with the luminance mask
    /// (hue-angle path only).
    pub thinned: Option<GrayImage>,
    /// Final binary contour mask: 255 fill, 0 ink.
    pub mask: GrayImage,
    /// Half-resolution stylized base after optional skin recoloring
    /// (`None` in sketch mode).
    pub stylized: Option<RgbImage>,
    /// Skin seed points in half-resolution coordinates (alien mode only).
    pub seeds: Vec<SeedPoint>,
    /// Scaled flood mask (alien mode with debug level 2 only).
    pub flood_mask: Option<GrayImage>,
    /// Final rendered image.
    pub output: RgbImage,
    /// Source image dimensions in pixels.
    pub dimensions: Dimensions,
}

/// Errors that can occur during pipeline processing.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The input image has a zero dimension.
    #[error("input image is empty ({width}x{height})")]
    EmptyImage {
        /// Width of the rejected image.
        width: u32,
        /// Height of the rejected image.
        height: u32,
    },

    /// The input image is neither 8-bit luma nor 8-bit RGB.
    #[error("unsupported color layout: {0}")]
    UnsupportedColor(String),

    /// Pipeline configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),

    /// Thinning hit its pass ceiling while still removing pixels.
    #[error("thinning did not converge within {passes} passes")]
    ThinningDidNotConverge {
        /// Number of passes performed.
        passes: u32,
    },

    /// Two rasters combined pixel-wise differ in size.
    #[error("raster size mismatch: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        /// Dimensions of the reference raster.
        expected: (u32, u32),
        /// Dimensions of the offending raster.
        actual: (u32, u32),
    },
}
