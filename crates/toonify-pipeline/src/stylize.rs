//! Color flattening for the cartoon base.
//!
//! Two filters run back to back on the half-resolution image:
//!
//! 1. **Mean-shift** region flattening. Each pixel walks its joint
//!    (position, color) mode: repeatedly replace the window centre and
//!    color with the mean over neighbours whose color lies within the
//!    color radius. Pixels in the same region converge to a shared
//!    color, producing the flat patches of a cartoon. A one-level
//!    pyramid seeds the full-resolution walk from the coarse result.
//! 2. **Bilateral** smoothing, which removes the speckle mean-shift
//!    leaves along region boundaries without blurring across them.

use image::{Rgb, Rgb32FImage, imageops};
use imageproc::filter::bilateral::ColorDistance;
use log::debug;

use crate::resample;
use crate::types::RgbImage;

/// Mean-shift spatial window radius in pixels.
pub const MEAN_SHIFT_SPATIAL_RADIUS: u32 = 10;

/// Mean-shift color radius (Euclidean, RGB units).
pub const MEAN_SHIFT_COLOR_RADIUS: f32 = 20.0;

/// Number of coarser pyramid levels used to seed mean-shift.
pub const MEAN_SHIFT_PYRAMID_LEVELS: u32 = 1;

/// Iteration cap per pixel.
pub const MEAN_SHIFT_MAX_ITERATIONS: u32 = 5;

/// Convergence threshold on the combined position and color shift.
pub const MEAN_SHIFT_EPSILON: f32 = 1.0;

/// Bilateral filter diameter. The neighbourhood is the square of radius
/// `diameter / 2`.
pub const BILATERAL_DIAMETER: u32 = 9;

/// Bilateral range sigma (L1 color distance).
pub const BILATERAL_SIGMA_COLOR: f32 = 30.0;

/// Bilateral spatial sigma in pixels.
pub const BILATERAL_SIGMA_SPACE: f32 = 15.0;

/// Mean-shift parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeanShiftParams {
    /// Spatial window radius.
    pub spatial_radius: u32,
    /// Color acceptance radius.
    pub color_radius: f32,
    /// Coarser pyramid levels.
    pub levels: u32,
    /// Iteration cap per pixel.
    pub max_iterations: u32,
    /// Convergence threshold.
    pub epsilon: f32,
}

impl Default for MeanShiftParams {
    fn default() -> Self {
        Self {
            spatial_radius: MEAN_SHIFT_SPATIAL_RADIUS,
            color_radius: MEAN_SHIFT_COLOR_RADIUS,
            levels: MEAN_SHIFT_PYRAMID_LEVELS,
            max_iterations: MEAN_SHIFT_MAX_ITERATIONS,
            epsilon: MEAN_SHIFT_EPSILON,
        }
    }
}

type Color = [f32; 3];

fn color_of(image: &RgbImage, x: u32, y: u32) -> Color {
    image.get_pixel(x, y).0.map(f32::from)
}

fn distance_squared(a: Color, b: Color) -> f32 {
    a.iter().zip(b.iter()).map(|(p, q)| (p - q) * (p - q)).sum()
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_pixel(c: Color) -> Rgb<u8> {
    Rgb(c.map(|v| v.round().clamp(0.0, 255.0) as u8))
}

/// Walk the mode for the pixel at `(x, y)`, starting from color `start`.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
fn shift_pixel(image: &RgbImage, x: u32, y: u32, start: Color, params: &MeanShiftParams) -> Color {
    let (w, h) = (i64::from(image.width()), i64::from(image.height()));
    let r = i64::from(params.spatial_radius);
    let radius_sq = params.color_radius * params.color_radius;
    let (mut cx, mut cy) = (i64::from(x), i64::from(y));
    let mut color = start;

    for _ in 0..params.max_iterations {
        let mut count = 0_u32;
        let (mut sx, mut sy) = (0_i64, 0_i64);
        let mut sum = [0.0_f32; 3];
        for ny in (cy - r).max(0)..=(cy + r).min(h - 1) {
            for nx in (cx - r).max(0)..=(cx + r).min(w - 1) {
                let c = color_of(image, nx as u32, ny as u32);
                if distance_squared(c, color) <= radius_sq {
                    count += 1;
                    sx += nx;
                    sy += ny;
                    for (acc, v) in sum.iter_mut().zip(c) {
                        *acc += v;
                    }
                }
            }
        }
        if count == 0 {
            break;
        }
        let n = count as f32;
        let nx = (sx as f32 / n).round() as i64;
        let ny = (sy as f32 / n).round() as i64;
        let mean = sum.map(|v| v / n);
        let shift = (nx - cx).abs() as f32
            + (ny - cy).abs() as f32
            + mean
                .iter()
                .zip(color.iter())
                .map(|(a, b)| (a - b).abs())
                .sum::<f32>();
        cx = nx;
        cy = ny;
        color = mean;
        if shift <= params.epsilon {
            break;
        }
    }
    color
}

/// Mean-shift filter one pyramid level, optionally seeded from a coarser
/// result at half resolution.
fn mean_shift_level(
    image: &RgbImage,
    coarse: Option<&RgbImage>,
    params: &MeanShiftParams,
) -> RgbImage {
    let radius_sq = params.color_radius * params.color_radius;
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let own = color_of(image, x, y);
        let start = coarse.map_or(own, |c| {
            let seed = color_of(c, (x / 2).min(c.width() - 1), (y / 2).min(c.height() - 1));
            // A seed from another region would find no neighbours.
            if distance_squared(seed, own) <= radius_sq {
                seed
            } else {
                own
            }
        });
        to_pixel(shift_pixel(image, x, y, start, params))
    })
}

/// Mean-shift region flattening with a coarse-to-fine pyramid.
#[must_use = "returns the filtered image"]
pub fn mean_shift_filter(image: &RgbImage, params: &MeanShiftParams) -> RgbImage {
    if image.width() == 0 || image.height() == 0 {
        return image.clone();
    }
    let mut pyramid = vec![image.clone()];
    for _ in 0..params.levels {
        let Some(last) = pyramid.last() else { break };
        if last.width() < 2 && last.height() < 2 {
            break;
        }
        let next = imageops::resize(
            last,
            (last.width() / 2).max(1),
            (last.height() / 2).max(1),
            resample::FILTER,
        );
        pyramid.push(next);
    }

    let mut result: Option<RgbImage> = None;
    for level in pyramid.iter().rev() {
        result = Some(mean_shift_level(level, result.as_ref(), params));
    }
    result.unwrap_or_else(|| image.clone())
}

/// Gaussian weight on the L1 distance between two colors.
struct L1ColorDistance {
    sigma_squared: f32,
}

impl L1ColorDistance {
    fn new(sigma: f32) -> Self {
        Self {
            sigma_squared: sigma * sigma,
        }
    }
}

impl ColorDistance<Rgb<f32>> for L1ColorDistance {
    fn color_distance(&self, a: &Rgb<f32>, b: &Rgb<f32>) -> f32 {
        let l1: f32 = a.0.iter().zip(b.0.iter()).map(|(p, q)| (p - q).abs()).sum();
        (-0.5 * l1 * l1 / self.sigma_squared).exp()
    }
}

/// Edge-preserving bilateral smoothing.
///
/// Weights combine a Gaussian on spatial distance with a Gaussian on the
/// L1 color distance over the square window of radius `diameter / 2`,
/// with replicated borders. The filter runs on float samples and rounds
/// once at the end.
#[must_use = "returns the filtered image"]
pub fn bilateral_filter(
    image: &RgbImage,
    diameter: u32,
    sigma_color: f32,
    sigma_space: f32,
) -> RgbImage {
    if image.width() == 0 || image.height() == 0 {
        return image.clone();
    }
    let radius = u8::try_from(diameter / 2).unwrap_or(u8::MAX);
    let samples = Rgb32FImage::from_fn(image.width(), image.height(), |x, y| {
        Rgb(color_of(image, x, y))
    });
    let smoothed = imageproc::filter::bilateral_filter(
        &samples,
        radius,
        sigma_space,
        L1ColorDistance::new(sigma_color),
    );
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        to_pixel(smoothed.get_pixel(x, y).0)
    })
}

/// Full stylization: mean-shift followed by one bilateral pass, with the
/// standard parameters.
#[must_use = "returns the stylized image"]
pub fn stylize(image: &RgbImage) -> RgbImage {
    let flattened = mean_shift_filter(image, &MeanShiftParams::default());
    let smoothed = bilateral_filter(
        &flattened,
        BILATERAL_DIAMETER,
        BILATERAL_SIGMA_COLOR,
        BILATERAL_SIGMA_SPACE,
    );
    debug!("stylized {}x{} base", smoothed.width(), smoothed.height());
    smoothed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel_range(image: &RgbImage) -> u8 {
        let values: Vec<u8> = image.pixels().map(|p| p.0[0]).collect();
        values.iter().max().copied().unwrap_or(0) - values.iter().min().copied().unwrap_or(0)
    }

    fn checkerboard(w: u32, h: u32, a: u8, b: u8) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| {
            let v = if (x + y) % 2 == 0 { a } else { b };
            Rgb([v, v, v])
        })
    }

    fn split(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, _| {
            if x < w / 2 {
                Rgb([10, 20, 30])
            } else {
                Rgb([240, 220, 200])
            }
        })
    }

    #[test]
    fn uniform_image_is_a_fixed_point() {
        let img = RgbImage::from_pixel(12, 9, Rgb([90, 160, 40]));
        assert_eq!(mean_shift_filter(&img, &MeanShiftParams::default()), img);
        assert_eq!(bilateral_filter(&img, 9, 30.0, 15.0), img);
        assert_eq!(stylize(&img), img);
    }

    #[test]
    fn mean_shift_flattens_low_contrast_texture() {
        let img = checkerboard(16, 16, 100, 110);
        let out = mean_shift_filter(&img, &MeanShiftParams::default());
        assert!(
            channel_range(&out) < channel_range(&img),
            "expected flatter output, range {}",
            channel_range(&out)
        );
    }

    #[test]
    fn mean_shift_preserves_strong_boundaries() {
        let img = split(24, 8);
        let out = mean_shift_filter(&img, &MeanShiftParams::default());
        assert_eq!(out.get_pixel(1, 4).0, [10, 20, 30]);
        assert_eq!(out.get_pixel(22, 4).0, [240, 220, 200]);
    }

    #[test]
    fn bilateral_keeps_strong_edges() {
        let img = split(20, 6);
        let out = bilateral_filter(&img, 9, 30.0, 15.0);
        // Colors across the edge are far outside sigma_color.
        let left = out.get_pixel(9, 3).0;
        let right = out.get_pixel(10, 3).0;
        assert!(left[0] < 20, "left side bled: {left:?}");
        assert!(right[0] > 230, "right side bled: {right:?}");
    }

    #[test]
    fn bilateral_smooths_small_noise() {
        let img = checkerboard(12, 12, 120, 130);
        let out = bilateral_filter(&img, 9, 30.0, 15.0);
        assert!(channel_range(&out) <= 6, "range {}", channel_range(&out));
    }

    #[test]
    fn stylize_keeps_dimensions() {
        let img = split(7, 5);
        assert_eq!(stylize(&img).dimensions(), (7, 5));
        let tiny = RgbImage::from_pixel(1, 1, Rgb([3, 4, 5]));
        assert_eq!(stylize(&tiny), tiny);
    }
}
