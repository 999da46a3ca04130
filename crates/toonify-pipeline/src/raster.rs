//! Raster helpers shared by every pipeline stage.
//!
//! The pipeline works on the `image` crate's buffers: [`RgbImage`] for
//! color data, [`GrayImage`] for binary masks and byte edge maps, and
//! [`FloatImage`] for the transient `f32` responses computed during edge
//! detection. This module holds the Laplacian kernels, a float median
//! filter (`imageproc` only has a byte one), Rec. 601 luma, and small
//! mask utilities.
//!
//! All neighbourhood operations replicate the nearest edge pixel when the
//! window reaches past the image border.

use image::Luma;
use imageproc::filter::filter;
use imageproc::kernel::Kernel;

use crate::types::{BACKGROUND, FOREGROUND, FloatImage, GrayImage, PipelineError, RgbImage};

/// Weights of the 3×3 aperture Laplacian (second-derivative Sobel sum).
pub const LAPLACIAN_3X3_WEIGHTS: [f32; 9] = [
    2.0, 0.0, 2.0, //
    0.0, -8.0, 0.0, //
    2.0, 0.0, 2.0,
];

/// Weights of the 5×5 aperture Laplacian: `smooth ⊗ d2 + d2 ⊗ smooth`
/// with `smooth = [1 4 6 4 1]` and `d2 = [1 0 -2 0 1]`.
pub const LAPLACIAN_5X5_WEIGHTS: [f32; 25] = [
    2.0, 4.0, 4.0, 4.0, 2.0, //
    4.0, 0.0, -8.0, 0.0, 4.0, //
    4.0, -8.0, -24.0, -8.0, 4.0, //
    4.0, 0.0, -8.0, 0.0, 4.0, //
    2.0, 4.0, 4.0, 4.0, 2.0,
];

/// 3×3 Laplacian kernel.
pub const LAPLACIAN_3X3: Kernel<'static, f32> = Kernel::new(&LAPLACIAN_3X3_WEIGHTS, 3, 3);

/// 5×5 Laplacian kernel.
pub const LAPLACIAN_5X5: Kernel<'static, f32> = Kernel::new(&LAPLACIAN_5X5_WEIGHTS, 5, 5);

/// Reject zero-sized rasters.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyImage`] if either dimension is zero.
pub const fn ensure_non_empty(width: u32, height: u32) -> Result<(), PipelineError> {
    if width == 0 || height == 0 {
        return Err(PipelineError::EmptyImage { width, height });
    }
    Ok(())
}

/// Read a float sample, replicating the border for out-of-range
/// coordinates.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn sample_clamped(image: &FloatImage, x: i64, y: i64) -> f32 {
    let cx = x.clamp(0, i64::from(image.width()) - 1) as u32;
    let cy = y.clamp(0, i64::from(image.height()) - 1) as u32;
    image.get_pixel(cx, cy).0[0]
}

/// Median filter over a `(2 * radius + 1)`² window.
#[must_use = "returns the filtered image"]
pub fn median_filter(image: &FloatImage, radius: u32) -> FloatImage {
    let r = i64::from(radius);
    let side = (2 * radius + 1) as usize;
    let mut window = Vec::with_capacity(side * side);
    FloatImage::from_fn(image.width(), image.height(), |x, y| {
        window.clear();
        for dy in -r..=r {
            for dx in -r..=r {
                window.push(sample_clamped(image, i64::from(x) + dx, i64::from(y) + dy));
            }
        }
        let mid = window.len() / 2;
        let (_, median, _) = window.select_nth_unstable_by(mid, f32::total_cmp);
        Luma([*median])
    })
}

/// Correlate a float field with a float kernel, replicating the border.
///
/// The Laplacians here are symmetric, so correlation and convolution
/// coincide.
#[must_use = "returns the filtered image"]
pub fn laplacian(image: &FloatImage, kernel: Kernel<'_, f32>) -> FloatImage {
    filter(image, kernel, |v| v)
}

/// Rec. 601 luma (`0.299 R + 0.587 G + 0.114 B`), rounded.
#[must_use = "returns the grayscale image"]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn luma_601(image: &RgbImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b] = image.get_pixel(x, y).0.map(f32::from);
        let luma = 0.114_f32.mul_add(b, 0.299_f32.mul_add(r, 0.587 * g));
        Luma([luma.round().clamp(0.0, 255.0) as u8])
    })
}

/// Binarize a float field: [`FOREGROUND`] where the value is strictly
/// below `threshold`, [`BACKGROUND`] elsewhere.
#[must_use = "returns the binary mask"]
pub fn threshold_below(image: &FloatImage, threshold: f32) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        if image.get_pixel(x, y).0[0] < threshold {
            Luma([FOREGROUND])
        } else {
            Luma([BACKGROUND])
        }
    })
}

/// Min-max normalize a float field onto `0..=255`, truncating to bytes.
///
/// A constant field has no range to stretch and maps to all zeros.
#[must_use = "returns the normalized byte image"]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn normalize_to_u8(image: &FloatImage) -> GrayImage {
    let (min, max) = image
        .pixels()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), p| {
            (lo.min(p.0[0]), hi.max(p.0[0]))
        });
    let range = max - min;
    if !range.is_finite() || range <= f32::EPSILON {
        return GrayImage::new(image.width(), image.height());
    }
    let scale = 255.0 / range;
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let v = (image.get_pixel(x, y).0[0] - min) * scale;
        Luma([v.clamp(0.0, 255.0) as u8])
    })
}

/// Bitwise NOT of a mask.
#[must_use = "returns the inverted mask"]
pub fn invert(mask: &GrayImage) -> GrayImage {
    GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        Luma([!mask.get_pixel(x, y).0[0]])
    })
}

/// Pixel-wise bitwise AND of two equally sized masks.
///
/// # Errors
///
/// Returns [`PipelineError::DimensionMismatch`] if the masks differ in size.
pub fn and(a: &GrayImage, b: &GrayImage) -> Result<GrayImage, PipelineError> {
    if a.dimensions() != b.dimensions() {
        return Err(PipelineError::DimensionMismatch {
            expected: a.dimensions(),
            actual: b.dimensions(),
        });
    }
    Ok(GrayImage::from_fn(a.width(), a.height(), |x, y| {
        Luma([a.get_pixel(x, y).0[0] & b.get_pixel(x, y).0[0]])
    }))
}

/// Replicate a single-channel image across three channels.
#[must_use = "returns the three-channel image"]
pub fn gray_to_rgb(mask: &GrayImage) -> RgbImage {
    RgbImage::from_fn(mask.width(), mask.height(), |x, y| {
        let v = mask.get_pixel(x, y).0[0];
        image::Rgb([v, v, v])
    })
}

/// Number of pixels equal to [`FOREGROUND`].
#[must_use]
pub fn count_foreground(mask: &GrayImage) -> u64 {
    mask.pixels()
        .map(|p| u64::from(u8::from(p.0[0] == FOREGROUND)))
        .sum()
}

/// Whether every pixel is exactly [`BACKGROUND`] or [`FOREGROUND`].
#[must_use]
pub fn is_binary(mask: &GrayImage) -> bool {
    mask.pixels()
        .all(|p| p.0[0] == BACKGROUND || p.0[0] == FOREGROUND)
}
