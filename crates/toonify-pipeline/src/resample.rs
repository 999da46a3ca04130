//! Working-resolution resampling for the stylized base.
//!
//! Smoothing runs at half resolution: it is the most expensive part of
//! the pipeline, and the flattened colors lose nothing visible when
//! scaled back up under the full-resolution contour mask.

use image::imageops::{self, FilterType};

use crate::types::{Dimensions, RgbImage};

/// Resampling filter for both directions (bilinear).
pub const FILTER: FilterType = FilterType::Triangle;

/// Dimensions halved, with a floor of one pixel per axis.
#[must_use]
pub fn half_dimensions(dims: Dimensions) -> Dimensions {
    Dimensions {
        width: (dims.width / 2).max(1),
        height: (dims.height / 2).max(1),
    }
}

/// Downscale by 2× per axis, never below one pixel.
#[must_use = "returns the downscaled image"]
pub fn half_size(image: &RgbImage) -> RgbImage {
    resize_to(image, half_dimensions(Dimensions::of(image)))
}

/// Resize to exactly `dims`. Returns a copy when the size already matches.
#[must_use = "returns the resized image"]
pub fn resize_to(image: &RgbImage, dims: Dimensions) -> RgbImage {
    if image.dimensions() == (dims.width, dims.height) {
        return image.clone();
    }
    imageops::resize(image, dims.width, dims.height, FILTER)
}
