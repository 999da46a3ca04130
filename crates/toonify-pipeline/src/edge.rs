//! Edge field construction from hue-angle and luminance responses.
//!
//! Each color channel is compared against the stronger of the other two
//! with `atan2`, which responds to changes in hue while staying flat
//! across shading. The three per-channel angle images are median
//! filtered and passed through a 5×5 Laplacian; their sum is the edge
//! field. A second, luminance-only response (`ln(gray + 4)`, median,
//! 3×3 Laplacian) catches contours between colors of similar hue.
//!
//! Both responses are binarized with the same threshold: a pixel is fill
//! (255) where the response is strictly below the threshold and ink (0)
//! elsewhere.

use image::Luma;
use log::{debug, warn};

use crate::raster::{self, LAPLACIAN_3X3, LAPLACIAN_5X5};
use crate::types::{FloatImage, GrayImage, PipelineError, RgbImage};

/// Median filter radius applied to each response (5×5 window).
pub const MEDIAN_RADIUS: u32 = 2;

/// Offset added before `atan2` so black pixels have a defined angle.
pub const ANGLE_OFFSET: f32 = 0.5;

/// Offset added before the logarithm so black pixels stay finite.
pub const LOG_OFFSET: f32 = 4.0;

/// Edge responses and the masks derived from them.
#[derive(Debug, Clone)]
pub struct EdgeField {
    /// Summed per-channel Laplacian response.
    pub total: FloatImage,
    /// `total` binarized at the threshold (255 fill, 0 ink).
    pub color_mask: GrayImage,
    /// Luminance response binarized at the threshold.
    pub luminance_mask: GrayImage,
    /// Threshold actually applied, after clamping.
    pub threshold: f32,
}

impl EdgeField {
    /// The initial contour mask: color mask AND luminance mask.
    ///
    /// # Errors
    ///
    /// Never fails for a field produced by [`build_edge_field`]; the
    /// masks always share dimensions.
    pub fn initial_mask(&self) -> Result<GrayImage, PipelineError> {
        raster::and(&self.color_mask, &self.luminance_mask)
    }

    /// The edge field min-max normalized to bytes.
    #[must_use]
    pub fn normalized(&self) -> GrayImage {
        raster::normalize_to_u8(&self.total)
    }
}

/// Per-pixel hue-angle response for the channel at `primary`.
///
/// `atan2(primary + 0.5, max(other1, other2) + 0.5)`, in radians.
#[must_use = "returns the angle image"]
pub fn hue_angle(source: &RgbImage, primary: usize) -> FloatImage {
    FloatImage::from_fn(source.width(), source.height(), |x, y| {
        let px = source.get_pixel(x, y).0;
        let main = f32::from(px[primary % 3]);
        let other = f32::from(px[(primary + 1) % 3].max(px[(primary + 2) % 3]));
        Luma([(main + ANGLE_OFFSET).atan2(other + ANGLE_OFFSET)])
    })
}

/// Summed Laplacian of the median-filtered hue-angle images of all three
/// channels.
#[must_use = "returns the edge field"]
pub fn color_response(source: &RgbImage) -> FloatImage {
    let mut total = FloatImage::new(source.width(), source.height());
    for channel in 0..3 {
        let angle = raster::median_filter(&hue_angle(source, channel), MEDIAN_RADIUS);
        let response = raster::laplacian(&angle, LAPLACIAN_5X5);
        for (acc, r) in total.pixels_mut().zip(response.pixels()) {
            acc.0[0] += r.0[0];
        }
    }
    total
}

/// Laplacian of the median-filtered log luminance.
#[must_use = "returns the luminance response"]
pub fn luminance_response(source: &RgbImage) -> FloatImage {
    let gray = raster::luma_601(source);
    let log_gray = FloatImage::from_fn(gray.width(), gray.height(), |x, y| {
        Luma([(f32::from(gray.get_pixel(x, y).0[0]) + LOG_OFFSET).ln()])
    });
    raster::laplacian(&raster::median_filter(&log_gray, MEDIAN_RADIUS), LAPLACIAN_3X3)
}

/// Clamp a contour threshold into `[0, 1]`, logging when it moves.
#[must_use]
pub fn clamp_threshold(threshold: f32) -> f32 {
    let clamped = threshold.clamp(0.0, 1.0);
    if (clamped - threshold).abs() > f32::EPSILON {
        warn!("contour threshold {threshold} clamped to {clamped}");
    }
    clamped
}

/// Build the edge field and its masks.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyImage`] for a zero-sized source and
/// [`PipelineError::InvalidConfig`] for a NaN threshold.
pub fn build_edge_field(source: &RgbImage, threshold: f32) -> Result<EdgeField, PipelineError> {
    raster::ensure_non_empty(source.width(), source.height())?;
    if threshold.is_nan() {
        return Err(PipelineError::InvalidConfig(
            "contour_threshold must be a number".to_owned(),
        ));
    }
    let threshold = clamp_threshold(threshold);

    let total = color_response(source);
    let color_mask = raster::threshold_below(&total, threshold);
    let luminance_mask = raster::threshold_below(&luminance_response(source), threshold);

    debug!(
        "edge field {}x{}: {} color fill, {} luminance fill at threshold {threshold}",
        source.width(),
        source.height(),
        raster::count_foreground(&color_mask),
        raster::count_foreground(&luminance_mask),
    );

    Ok(EdgeField {
        total,
        color_mask,
        luminance_mask,
        threshold,
    })
}
