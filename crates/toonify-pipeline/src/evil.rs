//! Gradient contours for the "evil" rendering path.
//!
//! A cheaper, harsher alternative to the hue-angle edge field: Scharr
//! derivatives of the median-smoothed grayscale image, summed and
//! thresholded low so that nearly every texture edge becomes ink. No
//! thinning or pepper removal follows, which gives the heavy outlines.

use image::{GrayImage, Luma};
use imageproc::definitions::Image;
use imageproc::filter::median_filter;
use imageproc::gradients::{horizontal_scharr, vertical_scharr};
use log::debug;

use crate::raster;
use crate::types::{BACKGROUND, FOREGROUND, PipelineError, RgbImage};

/// Gradient sum above which a pixel becomes ink.
pub const EDGE_THRESHOLD: u8 = 12;

/// Median radius for both the grayscale pre-filter and the mask
/// post-filter (3×3 window).
pub const MEDIAN_RADIUS: u32 = 1;

/// Output of [`evil_contours`].
#[derive(Debug, Clone)]
pub struct EvilContours {
    /// Saturating sum of the clipped Scharr x and y responses.
    pub edges: GrayImage,
    /// Binary contour mask: 255 fill, 0 ink.
    pub mask: GrayImage,
}

/// Saturate a signed gradient onto bytes, discarding negative responses.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn saturate(gradient: &Image<Luma<i16>>) -> GrayImage {
    GrayImage::from_fn(gradient.width(), gradient.height(), |x, y| {
        Luma([gradient.get_pixel(x, y).0[0].clamp(0, 255) as u8])
    })
}

/// Compute the evil-path edge image and contour mask.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyImage`] for a zero-sized source.
pub fn evil_contours(source: &RgbImage) -> Result<EvilContours, PipelineError> {
    raster::ensure_non_empty(source.width(), source.height())?;

    let gray = median_filter(&raster::luma_601(source), MEDIAN_RADIUS, MEDIAN_RADIUS);
    let gx = saturate(&horizontal_scharr(&gray));
    let gy = saturate(&vertical_scharr(&gray));
    let edges = GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        Luma([gx.get_pixel(x, y).0[0].saturating_add(gy.get_pixel(x, y).0[0])])
    });

    let raw = GrayImage::from_fn(edges.width(), edges.height(), |x, y| {
        if edges.get_pixel(x, y).0[0] > EDGE_THRESHOLD {
            Luma([BACKGROUND])
        } else {
            Luma([FOREGROUND])
        }
    });
    let mask = median_filter(&raw, MEDIAN_RADIUS, MEDIAN_RADIUS);

    debug!(
        "evil contours {}x{}: {} fill pixels",
        mask.width(),
        mask.height(),
        raster::count_foreground(&mask)
    );
    Ok(EvilContours { edges, mask })
}
