//! Final composition: stylized base seen through the contour mask.
//!
//! Fill pixels (255) take the stylized color and ink pixels (0) are
//! written black. Sketch mode skips the base entirely and returns the
//! mask itself as a three-channel image.

use image::Rgb;
use log::debug;

use crate::raster;
use crate::types::{FOREGROUND, GrayImage, PipelineError, RgbImage};

/// Copy `base` where `mask` is fill, black elsewhere.
///
/// # Errors
///
/// Returns [`PipelineError::DimensionMismatch`] if `base` and `mask`
/// differ in size.
pub fn composite(base: &RgbImage, mask: &GrayImage) -> Result<RgbImage, PipelineError> {
    if base.dimensions() != mask.dimensions() {
        return Err(PipelineError::DimensionMismatch {
            expected: mask.dimensions(),
            actual: base.dimensions(),
        });
    }
    let out = RgbImage::from_fn(mask.width(), mask.height(), |x, y| {
        if mask.get_pixel(x, y).0[0] == FOREGROUND {
            *base.get_pixel(x, y)
        } else {
            Rgb([0, 0, 0])
        }
    });
    debug!(
        "composited {}x{} with {} fill pixels",
        out.width(),
        out.height(),
        raster::count_foreground(mask)
    );
    Ok(out)
}

/// Sketch output: the mask replicated to three channels.
#[must_use = "returns the sketch image"]
pub fn sketch(mask: &GrayImage) -> RgbImage {
    raster::gray_to_rgb(mask)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::Luma;

    use super::*;

    fn half_mask(w: u32, h: u32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, _| Luma([if x < w / 2 { 255 } else { 0 }]))
    }

    #[test]
    fn fill_copies_base_and_ink_is_black() {
        let base = RgbImage::from_pixel(6, 3, Rgb([12, 34, 56]));
        let out = composite(&base, &half_mask(6, 3)).unwrap();
        assert_eq!(out.get_pixel(0, 1).0, [12, 34, 56]);
        assert_eq!(out.get_pixel(5, 1).0, [0, 0, 0]);
    }

    #[test]
    fn all_fill_mask_returns_base() {
        let base = RgbImage::from_fn(4, 4, |x, y| Rgb([x as u8 * 10, y as u8 * 10, 7]));
        let mask = GrayImage::from_pixel(4, 4, Luma([255]));
        assert_eq!(composite(&base, &mask).unwrap(), base);
    }

    #[test]
    fn size_mismatch_is_an_error() {
        let base = RgbImage::new(4, 4);
        let mask = GrayImage::new(4, 5);
        assert!(matches!(
            composite(&base, &mask),
            Err(PipelineError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn sketch_replicates_mask() {
        let out = sketch(&half_mask(8, 2));
        assert_eq!(out.dimensions(), (8, 2));
        for p in out.pixels() {
            assert!(p.0 == [255, 255, 255] || p.0 == [0, 0, 0]);
        }
        assert_eq!(out.get_pixel(0, 0).0, [255, 255, 255]);
        assert_eq!(out.get_pixel(7, 0).0, [0, 0, 0]);
    }
}
