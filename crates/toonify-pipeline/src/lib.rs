//! toonify-pipeline: Pure cartoon rendering pipeline (sans-IO).
//!
//! Turns a photograph into a cartoon or sketch through:
//! edge field -> threshold -> skeletonize -> pepper noise removal ->
//! mean-shift/bilateral stylize -> optional skin recolor -> composite.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! images and returns structured data. Decoding, encoding, and the
//! command line live in the `toonify` binary.

pub mod composite;
pub mod diagnostics;
pub mod edge;
pub mod evil;
pub mod pepper;
pub mod pipeline;
pub mod raster;
pub mod resample;
pub mod skin;
pub mod stylize;
pub mod thin;
pub mod types;

use image::DynamicImage;

pub use diagnostics::{Clock, PipelineDiagnostics, cartoonify_with_diagnostics};
pub use pipeline::{Pipeline, PipelineStage};
pub use skin::SeedPoint;
pub use thin::{GuoHall, Thinner, ThinningKind, ZhangSuen};
pub use types::{
    CartoonConfig, Dimensions, FloatImage, GrayImage, PipelineError, RgbImage, StagedResult,
};

/// Run the full pipeline and return only the composited image.
///
/// # Pipeline steps
///
/// 1. Hue-angle edge field and threshold (Scharr contours in evil mode)
/// 2. Skeletonize the color contours and recombine with luminance contours
/// 3. Fill isolated ink specks
/// 4. Half-size mean-shift and bilateral smoothing
/// 5. Optional skin recoloring (alien mode)
/// 6. Composite the stylized base through the mask (or emit the mask in
///    sketch mode)
///
/// # Errors
///
/// Returns [`PipelineError::EmptyImage`] if the source has no pixels,
/// [`PipelineError::InvalidConfig`] for an unusable configuration, and
/// [`PipelineError::ThinningDidNotConverge`] if a pass ceiling is hit.
pub fn cartoonify(source: &RgbImage, config: &CartoonConfig) -> Result<RgbImage, PipelineError> {
    cartoonify_staged(source, config).map(|staged| staged.output)
}

/// Run the full pipeline and keep every intermediate.
///
/// # Errors
///
/// Same as [`cartoonify`].
pub fn cartoonify_staged(
    source: &RgbImage,
    config: &CartoonConfig,
) -> Result<StagedResult, PipelineError> {
    Ok(Pipeline::new(source.clone(), config.clone())
        .detect_edges()?
        .thin()?
        .remove_noise()
        .stylize()
        .recolor_skin()
        .composite()?
        .into_result())
}

/// Convert a decoded image to the pipeline's RGB source.
///
/// Grayscale sources are expanded to three identical channels. Sources
/// with alpha or more than 8 bits per channel are rejected.
///
/// # Errors
///
/// Returns [`PipelineError::UnsupportedColor`] for layouts other than
/// 8-bit luma or 8-bit RGB.
pub fn rgb_source(source: &DynamicImage) -> Result<RgbImage, PipelineError> {
    match source {
        DynamicImage::ImageRgb8(rgb) => Ok(rgb.clone()),
        DynamicImage::ImageLuma8(gray) => Ok(raster::gray_to_rgb(gray)),
        other => Err(PipelineError::UnsupportedColor(format!(
            "{:?}",
            other.color()
        ))),
    }
}

/// Run the pipeline on a decoded 8-bit luma or RGB image.
///
/// # Errors
///
/// Everything [`rgb_source`] and [`cartoonify_staged`] return.
pub fn cartoonify_dynamic(
    source: &DynamicImage,
    config: &CartoonConfig,
) -> Result<StagedResult, PipelineError> {
    cartoonify_staged(&rgb_source(source)?, config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::{Luma, Rgb, RgbaImage};

    use super::*;

    /// Left half blue, right half white.
    fn split(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, _| {
            if x < width / 2 {
                Rgb([20, 40, 220])
            } else {
                Rgb([250, 250, 250])
            }
        })
    }

    #[test]
    fn cartoonify_keeps_dimensions() {
        let out = cartoonify(&split(30, 20), &CartoonConfig::default()).unwrap();
        assert_eq!(out.dimensions(), (30, 20));
    }

    #[test]
    fn cartoonify_empty_input() {
        let result = cartoonify(&RgbImage::new(0, 0), &CartoonConfig::default());
        assert!(matches!(result, Err(PipelineError::EmptyImage { .. })));
    }

    #[test]
    fn cartoonify_invalid_config() {
        let config = CartoonConfig {
            debug_level: 9,
            ..CartoonConfig::default()
        };
        let result = cartoonify(&split(8, 8), &config);
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn staged_output_matches_cartoonify() {
        let config = CartoonConfig::default();
        let staged = cartoonify_staged(&split(24, 16), &config).unwrap();
        let direct = cartoonify(&split(24, 16), &config).unwrap();
        assert_eq!(staged.output, direct);
        assert_eq!(
            staged.dimensions,
            Dimensions {
                width: 24,
                height: 16
            }
        );
        assert!(staged.edge_field.is_some());
        assert!(staged.stylized.is_some());
    }

    #[test]
    fn split_image_draws_a_boundary() {
        let staged = cartoonify_staged(&split(32, 16), &CartoonConfig::default()).unwrap();
        let ink = staged.mask.pixels().filter(|p| p.0[0] == 0).count();
        assert!(ink > 0, "expected ink along the color boundary");
    }

    #[test]
    fn dynamic_luma_is_accepted() {
        let gray = image::GrayImage::from_fn(12, 12, |x, _| Luma([if x < 6 { 0 } else { 255 }]));
        let staged =
            cartoonify_dynamic(&DynamicImage::ImageLuma8(gray), &CartoonConfig::default()).unwrap();
        assert_eq!(staged.output.dimensions(), (12, 12));
    }

    #[test]
    fn luma_source_is_expanded() {
        let gray = image::GrayImage::from_pixel(3, 2, Luma([77]));
        let rgb = rgb_source(&DynamicImage::ImageLuma8(gray)).unwrap();
        assert!(rgb.pixels().all(|p| p.0 == [77, 77, 77]));
    }

    #[test]
    fn dynamic_rgba_is_rejected() {
        let rgba = RgbaImage::new(4, 4);
        let result = cartoonify_dynamic(&DynamicImage::ImageRgba8(rgba), &CartoonConfig::default());
        assert!(matches!(result, Err(PipelineError::UnsupportedColor(_))));
    }
}
