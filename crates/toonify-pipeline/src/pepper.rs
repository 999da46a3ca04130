//! Isolated ink removal ("pepper" noise).
//!
//! After thinning, short ink fragments that sit alone in a fill region
//! show up as dark specks in the composite. A speck is any ink pixel
//! whose surrounding 5×5 ring is entirely fill; the whole 3×3 core
//! around it is then filled.

use image::{GrayImage, Luma};
use log::debug;

use crate::types::FOREGROUND;

fn is_fill(mask: &GrayImage, x: u32, y: u32) -> bool {
    mask.get_pixel(x, y).0[0] == FOREGROUND
}

/// Whether the 16-pixel ring at Chebyshev distance 2 around `(x, y)` is
/// all fill. The caller guarantees a 2-pixel margin.
fn ring_is_fill(mask: &GrayImage, x: u32, y: u32) -> bool {
    (x - 2..=x + 2).all(|rx| is_fill(mask, rx, y - 2) && is_fill(mask, rx, y + 2))
        && (y - 1..=y + 1).all(|ry| is_fill(mask, x - 2, ry) && is_fill(mask, x + 2, ry))
}

/// Fill isolated ink specks in place.
///
/// Scans every ink pixel with a 2-pixel margin from the border. When its
/// 5×5 ring is all fill, the 3×3 block centred on it is set to fill and
/// the scan skips ahead three columns. Masks smaller than 5×5 are left
/// unchanged.
///
/// Returns the number of blocks filled.
pub fn remove_pepper_noise(mask: &mut GrayImage) -> usize {
    let (width, height) = mask.dimensions();
    if width < 5 || height < 5 {
        return 0;
    }
    let mut healed = 0;
    for y in 2..height - 2 {
        let mut x = 2;
        while x < width - 2 {
            if !is_fill(mask, x, y) && ring_is_fill(mask, x, y) {
                for by in y - 1..=y + 1 {
                    for bx in x - 1..=x + 1 {
                        mask.put_pixel(bx, by, Luma([FOREGROUND]));
                    }
                }
                healed += 1;
                x += 3;
            } else {
                x += 1;
            }
        }
    }
    debug!("pepper filter filled {healed} isolated blocks");
    healed
}
