//! Integration test: run synthetic scenes through the full pipeline and
//! check the shape of every intermediate.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::region_labelling::{Connectivity, connected_components};
use toonify_pipeline::edge::build_edge_field;
use toonify_pipeline::pepper::remove_pepper_noise;
use toonify_pipeline::thin::thin;
use toonify_pipeline::{CartoonConfig, ThinningKind, cartoonify_staged, raster};

const SIZE: u32 = 64;

/// Red disc of radius 20 centred on a white 64×64 canvas.
fn red_disc() -> RgbImage {
    RgbImage::from_fn(SIZE, SIZE, |x, y| {
        let dx = f64::from(x) - 31.5;
        let dy = f64::from(y) - 31.5;
        if dx * dx + dy * dy <= 400.0 {
            Rgb([255, 0, 0])
        } else {
            Rgb([255, 255, 255])
        }
    })
}

/// Horizontal red/green ramp with a blue stripe pattern down the rows.
fn gradient() -> RgbImage {
    RgbImage::from_fn(32, 32, |x, y| {
        let x = u8::try_from(x).unwrap();
        let y = u8::try_from(y).unwrap();
        Rgb([x * 8, 255 - x * 8, y.wrapping_mul(8)])
    })
}

fn ink(mask: &GrayImage, x: u32, y: u32) -> bool {
    mask.get_pixel(x, y).0[0] == 0
}

fn ink_count(mask: &GrayImage) -> u64 {
    u64::from(mask.width()) * u64::from(mask.height()) - raster::count_foreground(mask)
}

/// Number of 8-connected components of 255 pixels.
fn components(mask: &GrayImage) -> u32 {
    connected_components(mask, Connectivity::Eight, Luma([0_u8]))
        .pixels()
        .map(|p| p.0[0])
        .max()
        .unwrap_or(0)
}

#[test]
fn disc_produces_a_closed_thin_contour() {
    let staged = cartoonify_staged(&red_disc(), &CartoonConfig::default()).unwrap();
    let color_mask = staged.color_mask.as_ref().expect("color mask in default mode");

    let contours = raster::invert(color_mask);
    assert_eq!(components(&contours), 1, "raw contour should be one ring");

    let skeleton = thin(&contours, &ThinningKind::ZhangSuen, None).unwrap();
    assert_eq!(components(&skeleton.mask), 1, "thinning must not break the ring");
    assert!(skeleton.removed > 0);

    for y in 0..SIZE - 1 {
        for x in 0..SIZE - 1 {
            let block = [(x, y), (x + 1, y), (x, y + 1), (x + 1, y + 1)]
                .iter()
                .all(|&(bx, by)| skeleton.mask.get_pixel(bx, by).0[0] == 255);
            assert!(!block, "2x2 ink block left at ({x}, {y})");
        }
    }

    // The ring separates the disc interior from the canvas corner.
    let regions = connected_components(
        &raster::invert(&skeleton.mask),
        Connectivity::Four,
        Luma([0_u8]),
    );
    let inside = regions.get_pixel(32, 32).0[0];
    let outside = regions.get_pixel(2, 2).0[0];
    assert!(inside != 0 && outside != 0);
    assert_ne!(inside, outside, "contour leaks between inside and outside");

    // Ink sits on the disc boundary, not in its centre or the far corner.
    assert!(!ink(&staged.mask, 32, 32));
    assert!(!ink(&staged.mask, 2, 2));
    assert!(ink_count(&staged.mask) > 0);
}

#[test]
fn disc_contour_needs_no_pepper_healing() {
    let staged = cartoonify_staged(&red_disc(), &CartoonConfig::default()).unwrap();
    let thinned = staged.thinned.expect("thinned mask in default mode");
    assert_eq!(thinned, staged.mask);
}

#[test]
fn uniform_image_has_no_ink_and_keeps_its_color() {
    let source = RgbImage::from_pixel(32, 32, Rgb([90, 160, 40]));
    let staged = cartoonify_staged(&source, &CartoonConfig::default()).unwrap();
    assert_eq!(ink_count(&staged.mask), 0);
    assert!(staged.output.pixels().all(|p| p.0 == [90, 160, 40]));
}

#[test]
fn sketch_output_is_binary_and_gray() {
    let config = CartoonConfig {
        sketch_mode: true,
        ..CartoonConfig::default()
    };
    let staged = cartoonify_staged(&red_disc(), &config).unwrap();
    assert_eq!(staged.output.dimensions(), (SIZE, SIZE));
    assert!(staged.stylized.is_none());
    for (p, m) in staged.output.pixels().zip(staged.mask.pixels()) {
        let v = m.0[0];
        assert!(v == 0 || v == 255);
        assert_eq!(p.0, [v, v, v]);
    }
}

#[test]
fn raising_the_threshold_never_adds_ink() {
    let source = gradient();
    let mut previous_fill = 0;
    for threshold in [0.0, 0.1, 0.25, 0.5, 0.75, 1.0] {
        let field = build_edge_field(&source, threshold).unwrap();
        let fill = raster::count_foreground(&field.initial_mask().unwrap());
        assert!(
            fill >= previous_fill,
            "fill dropped from {previous_fill} to {fill} at threshold {threshold}"
        );
        previous_fill = fill;
    }
}

#[test]
fn final_ink_is_a_subset_of_initial_ink() {
    let staged = cartoonify_staged(&gradient(), &CartoonConfig::default()).unwrap();
    let initial = raster::and(
        staged.color_mask.as_ref().unwrap(),
        staged.luminance_mask.as_ref().unwrap(),
    )
    .unwrap();
    for (fin, init) in staged.mask.pixels().zip(initial.pixels()) {
        if fin.0[0] == 0 {
            assert_eq!(init.0[0], 0);
        }
    }
    assert!(raster::is_binary(&staged.mask));
}

#[test]
fn thinning_strategies_are_idempotent_on_the_disc() {
    let field = build_edge_field(&red_disc(), 0.5).unwrap();
    let contours = raster::invert(&field.color_mask);
    for kind in [ThinningKind::ZhangSuen, ThinningKind::GuoHall] {
        let once = thin(&contours, &kind, None).unwrap();
        let twice = thin(&once.mask, &kind, None).unwrap();
        assert_eq!(once.mask, twice.mask, "{kind} is not idempotent");
        assert_eq!(twice.removed, 0);
    }
}

#[test]
fn pepper_removal_reaches_a_fixed_point() {
    let staged = cartoonify_staged(&gradient(), &CartoonConfig::default()).unwrap();
    let mut mask = staged.mask.clone();
    assert_eq!(remove_pepper_noise(&mut mask), 0);
    assert_eq!(mask, staged.mask);
}

#[test]
fn evil_mode_skips_thinning() {
    let config = CartoonConfig {
        evil_mode: true,
        ..CartoonConfig::default()
    };
    let staged = cartoonify_staged(&red_disc(), &config).unwrap();
    assert!(staged.edge_field.is_none());
    assert!(staged.thinned.is_none());
    assert!(raster::is_binary(&staged.mask));
    assert!(ink_count(&staged.mask) > 0);
    assert_eq!(staged.output.dimensions(), (SIZE, SIZE));
}

#[test]
fn alien_mode_reports_seeds() {
    let config = CartoonConfig {
        alien_mode: true,
        debug_level: 2,
        ..CartoonConfig::default()
    };
    let staged = cartoonify_staged(&red_disc(), &config).unwrap();
    assert_eq!(staged.seeds.len(), 6);
    // Skin runs on the half-resolution base.
    let flood = staged.flood_mask.expect("flood mask at debug level 2");
    assert_eq!(flood.dimensions(), (SIZE / 2, SIZE / 2));
}

#[test]
fn guo_hall_runs_end_to_end() {
    let config = CartoonConfig {
        thinning: ThinningKind::GuoHall,
        ..CartoonConfig::default()
    };
    let staged = cartoonify_staged(&red_disc(), &config).unwrap();
    assert!(ink_count(&staged.mask) > 0);
    assert!(!ink(&staged.mask, 32, 32));
}
