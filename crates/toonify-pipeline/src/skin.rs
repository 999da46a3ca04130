//! Skin detection and recoloring for alien mode.
//!
//! Faces in portrait shots sit near the image centre, so six fixed seed
//! points (forehead row and cheek row) are flood-filled in YCrCb space,
//! where skin tones cluster tightly in the chroma channels regardless of
//! lighting. Strong edges act as walls so fills stay inside the face.
//! Every filled pixel gets its green channel boosted.

use std::collections::VecDeque;

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, Rgb};
use imageproc::distance_transform::Norm;
use imageproc::drawing::draw_hollow_circle_mut;
use imageproc::morphology::{dilate, erode};
use log::debug;

use crate::types::RgbImage;

/// Edge strength above which a pixel blocks the flood fill.
pub const EDGE_CUTOFF: u8 = 80;

/// Amount added to the green channel of skin pixels.
pub const GREEN_BOOST: u8 = 70;

/// Radius of the debug seed markers.
pub const SEED_MARKER_RADIUS: i32 = 5;

/// Color of the debug seed markers.
pub const SEED_MARKER_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// Scale applied to the flood mask when it is exposed for debugging.
pub const FLOOD_MASK_SCALE: u8 = 120;

/// Mask marker for pixels reached by a fill.
const FILLED: u8 = 1;

/// Per-channel (Y, Cr, Cb) deviation allowed from a seed's color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToleranceWindow {
    /// Maximum amount below the seed value, per channel.
    pub lower: [u8; 3],
    /// Maximum amount above the seed value, per channel.
    pub upper: [u8; 3],
}

impl ToleranceWindow {
    /// Whether `candidate` lies inside the window around `seed`.
    #[must_use]
    pub fn accepts(&self, seed: [u8; 3], candidate: [u8; 3]) -> bool {
        (0..3).all(|c| {
            let s = i16::from(seed[c]);
            let v = i16::from(candidate[c]);
            s - i16::from(self.lower[c]) <= v && v <= s + i16::from(self.upper[c])
        })
    }
}

/// Skin tolerance: loose on luma, tight on chroma.
pub const SKIN_TOLERANCE: ToleranceWindow = ToleranceWindow {
    lower: [60, 25, 20],
    upper: [80, 15, 15],
};

/// A flood-fill starting point in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedPoint {
    /// Column.
    pub x: u32,
    /// Row.
    pub y: u32,
}

/// The six canonical seed points for an image of the given size.
///
/// Three on a forehead row above centre, three on a cheek row just
/// below it.
#[must_use]
pub const fn skin_seeds(width: u32, height: u32) -> [SeedPoint; 6] {
    let cx = width / 2;
    let upper = height / 2 - height / 6;
    let lower = height / 2 + height / 16;
    [
        SeedPoint { x: cx, y: upper },
        SeedPoint {
            x: cx - width / 11,
            y: upper,
        },
        SeedPoint {
            x: cx + width / 11,
            y: upper,
        },
        SeedPoint { x: cx, y: lower },
        SeedPoint {
            x: cx - width / 9,
            y: lower,
        },
        SeedPoint {
            x: cx + width / 9,
            y: lower,
        },
    ]
}

/// Convert RGB to YCrCb, stored in the three channels in that order.
#[must_use = "returns the converted image"]
pub fn rgb_to_ycrcb(image: &RgbImage) -> RgbImage {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let to_u8 = |v: f32| v.round().clamp(0.0, 255.0) as u8;
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b] = image.get_pixel(x, y).0.map(f32::from);
        let luma = 0.114_f32.mul_add(b, 0.299_f32.mul_add(r, 0.587 * g));
        let cr = (r - luma).mul_add(0.713, 128.0);
        let cb = (b - luma).mul_add(0.564, 128.0);
        Rgb([to_u8(luma), to_u8(cr), to_u8(cb)])
    })
}

/// Binary wall mask at `width`×`height` from an edge strength image.
///
/// Resized bilinearly, thresholded at [`EDGE_CUTOFF`], then closed with
/// one 3×3 dilation followed by one 3×3 erosion.
#[must_use = "returns the wall mask"]
pub fn edge_walls(edges: &GrayImage, width: u32, height: u32) -> GrayImage {
    let resized = if edges.dimensions() == (width, height) {
        edges.clone()
    } else {
        imageops::resize(edges, width, height, FilterType::Triangle)
    };
    let walls = GrayImage::from_fn(width, height, |x, y| {
        Luma([if resized.get_pixel(x, y).0[0] > EDGE_CUTOFF { 255 } else { 0 }])
    });
    erode(&dilate(&walls, Norm::LInf, 1), Norm::LInf, 1)
}

/// Flood mask with a one-pixel frame around the image.
struct PaddedMask {
    stride: usize,
    data: Vec<u8>,
}

impl PaddedMask {
    fn new(walls: &GrayImage) -> Self {
        let (w, h) = walls.dimensions();
        let stride = w as usize + 2;
        let mut data = vec![0; stride * (h as usize + 2)];
        for (x, y, p) in walls.enumerate_pixels() {
            data[(y as usize + 1) * stride + x as usize + 1] = p.0[0];
        }
        Self { stride, data }
    }

    const fn index(&self, x: u32, y: u32) -> usize {
        (y as usize + 1) * self.stride + x as usize + 1
    }

    fn get(&self, x: u32, y: u32) -> u8 {
        self.data[self.index(x, y)]
    }

    fn set(&mut self, x: u32, y: u32, v: u8) {
        let i = self.index(x, y);
        self.data[i] = v;
    }
}

/// 4-connected fixed-range fill from `seed`. Returns pixels filled.
fn flood_fill(
    ycc: &RgbImage,
    mask: &mut PaddedMask,
    seed: SeedPoint,
    window: &ToleranceWindow,
) -> u64 {
    if mask.get(seed.x, seed.y) != 0 {
        return 0;
    }
    let reference = ycc.get_pixel(seed.x, seed.y).0;
    let (w, h) = ycc.dimensions();
    let mut filled = 0;
    let mut queue = VecDeque::from([(seed.x, seed.y)]);
    mask.set(seed.x, seed.y, FILLED);
    while let Some((x, y)) = queue.pop_front() {
        filled += 1;
        let neighbors = [
            (x.checked_sub(1), Some(y)),
            ((x + 1 < w).then_some(x + 1), Some(y)),
            (Some(x), y.checked_sub(1)),
            (Some(x), (y + 1 < h).then_some(y + 1)),
        ];
        for (nx, ny) in neighbors {
            let (Some(nx), Some(ny)) = (nx, ny) else {
                continue;
            };
            if mask.get(nx, ny) == 0 && window.accepts(reference, ycc.get_pixel(nx, ny).0) {
                mask.set(nx, ny, FILLED);
                queue.push_back((nx, ny));
            }
        }
    }
    filled
}

/// Outcome of [`recolor_skin`].
#[derive(Debug, Clone)]
pub struct SkinReport {
    /// Seeds that were inside the image.
    pub seeds: Vec<SeedPoint>,
    /// Pixels whose green channel was boosted.
    pub recolored: u64,
    /// Scaled flood mask (debug level 2 only): walls 255, skin 120.
    pub flood_mask: Option<GrayImage>,
}

/// Detect skin from the canonical seeds and boost its green channel in
/// place.
///
/// `edges` may be any size; it is resampled to the image size. With
/// `debug_level >= 1` a red ring marks each seed, and with
/// `debug_level >= 2` the flood mask is returned in the report.
pub fn recolor_skin(image: &mut RgbImage, edges: &GrayImage, debug_level: u8) -> SkinReport {
    let (w, h) = image.dimensions();
    let walls = edge_walls(edges, w, h);
    let ycc = rgb_to_ycrcb(image);
    let mut mask = PaddedMask::new(&walls);

    let mut seeds = Vec::with_capacity(6);
    for seed in skin_seeds(w, h) {
        if seed.x >= w || seed.y >= h {
            continue;
        }
        let filled = flood_fill(&ycc, &mut mask, seed, &SKIN_TOLERANCE);
        debug!("skin seed ({}, {}) filled {filled} pixels", seed.x, seed.y);
        if debug_level >= 1 {
            #[allow(clippy::cast_possible_wrap)]
            draw_hollow_circle_mut(
                image,
                (seed.x as i32, seed.y as i32),
                SEED_MARKER_RADIUS,
                SEED_MARKER_COLOR,
            );
        }
        seeds.push(seed);
    }

    let mut recolored = 0;
    for (x, y, pixel) in image.enumerate_pixels_mut() {
        let net = mask.get(x, y).saturating_sub(walls.get_pixel(x, y).0[0]);
        if net > 0 {
            pixel.0[1] = pixel.0[1].saturating_add(GREEN_BOOST);
            recolored += 1;
        }
    }
    debug!("recolored {recolored} skin pixels");

    let flood_mask = (debug_level >= 2).then(|| {
        GrayImage::from_fn(w, h, |x, y| {
            Luma([mask.get(x, y).saturating_mul(FLOOD_MASK_SCALE)])
        })
    });

    SkinReport {
        seeds,
        recolored,
        flood_mask,
    }
}
