//! Skeletonization: reduce binary contour ink to one-pixel-wide lines.
//!
//! This module defines the [`Thinner`] trait for pluggable thinning
//! algorithms and the [`ThinningKind`] enum for selecting which algorithm
//! to use at runtime.
//!
//! # Strategy pattern
//!
//! Both algorithms share the same iteration driver ([`thin`]): a pass is
//! two sub-iterations, each of which classifies every interior pixel from
//! a read-only snapshot of the grid, records removable pixels in a marker
//! buffer, and only then clears them. A strategy is nothing more than the
//! per-neighbourhood removal rule, so implementations stay pure and can be
//! tested on hand-built neighbourhoods.
//!
//! Input polarity: 255 is ink (foreground), anything else is background.

use std::fmt;

use image::{GrayImage, Luma};
use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::types::PipelineError;

/// Which half of a thinning pass is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubIteration {
    /// Removes south-east boundary and north-west corner pixels.
    First,
    /// Removes north-west boundary and south-east corner pixels.
    Second,
}

/// The eight neighbours of a pixel, `p2..=p9` clockwise from north.
///
/// Each entry is `true` for ink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Neighborhood([bool; 8]);

impl Neighborhood {
    /// Build from `[p2, p3, p4, p5, p6, p7, p8, p9]`.
    #[must_use]
    pub const fn new(p: [bool; 8]) -> Self {
        Self(p)
    }

    /// Read the neighbourhood of interior pixel `(x, y)` from a 0/1 grid.
    fn read(grid: &[u8], width: usize, x: usize, y: usize) -> Self {
        let n = (y - 1) * width + x;
        let c = y * width + x;
        let s = (y + 1) * width + x;
        Self([
            grid[n] != 0,
            grid[n + 1] != 0,
            grid[c + 1] != 0,
            grid[s + 1] != 0,
            grid[s] != 0,
            grid[s - 1] != 0,
            grid[c - 1] != 0,
            grid[n - 1] != 0,
        ])
    }

    /// Neighbour `p{index}` for `index` in `2..=9`.
    const fn p(self, index: usize) -> bool {
        self.0[index - 2]
    }

    /// Number of ink neighbours.
    #[must_use]
    pub fn ink_count(self) -> u32 {
        self.0.iter().map(|&b| u32::from(b)).sum()
    }

    /// Number of background-to-ink transitions walking
    /// `p2, p3, ..., p9, p2`.
    #[must_use]
    pub fn transitions(self) -> u32 {
        (0..8)
            .map(|i| u32::from(!self.0[i] && self.0[(i + 1) % 8]))
            .sum()
    }
}

/// Trait for thinning strategies.
///
/// Implementors only decide whether a single ink pixel may be removed;
/// the shared driver handles snapshots, markers, and convergence.
pub trait Thinner {
    /// Whether an ink pixel with neighbourhood `n` is removable during
    /// sub-iteration `step`.
    fn is_removable(&self, n: Neighborhood, step: SubIteration) -> bool;
}

/// Zhang–Suen parallel thinning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ZhangSuen;

impl Thinner for ZhangSuen {
    fn is_removable(&self, n: Neighborhood, step: SubIteration) -> bool {
        let b = n.ink_count();
        if !(2..=6).contains(&b) || n.transitions() != 1 {
            return false;
        }
        let (p2, p4, p6, p8) = (n.p(2), n.p(4), n.p(6), n.p(8));
        match step {
            SubIteration::First => !(p2 && p4 && p6) && !(p4 && p6 && p8),
            SubIteration::Second => !(p2 && p4 && p8) && !(p2 && p6 && p8),
        }
    }
}

/// Guo–Hall parallel thinning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GuoHall;

impl Thinner for GuoHall {
    fn is_removable(&self, n: Neighborhood, step: SubIteration) -> bool {
        let [p2, p3, p4, p5, p6, p7, p8, p9] = n.0;
        let c = u32::from(!p2 && (p3 || p4))
            + u32::from(!p4 && (p5 || p6))
            + u32::from(!p6 && (p7 || p8))
            + u32::from(!p8 && (p9 || p2));
        let n1 = u32::from(p9 || p2)
            + u32::from(p3 || p4)
            + u32::from(p5 || p6)
            + u32::from(p7 || p8);
        let n2 = u32::from(p2 || p3)
            + u32::from(p4 || p5)
            + u32::from(p6 || p7)
            + u32::from(p8 || p9);
        let m = match step {
            SubIteration::First => (p6 || p7 || !p9) && p8,
            SubIteration::Second => (p2 || p3 || !p5) && p4,
        };
        c == 1 && (2..=3).contains(&n1.min(n2)) && !m
    }
}

/// Selects which thinning algorithm to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ThinningKind {
    /// Zhang–Suen: the classic two-step rule on transition and neighbour
    /// counts.
    #[default]
    ZhangSuen,

    /// Guo–Hall: keeps diagonal connections slightly better and
    /// produces thinner results on staircase edges.
    GuoHall,
}

impl Thinner for ThinningKind {
    fn is_removable(&self, n: Neighborhood, step: SubIteration) -> bool {
        match *self {
            Self::ZhangSuen => ZhangSuen.is_removable(n, step),
            Self::GuoHall => GuoHall.is_removable(n, step),
        }
    }
}

impl fmt::Display for ThinningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZhangSuen => write!(f, "zhang-suen"),
            Self::GuoHall => write!(f, "guo-hall"),
        }
    }
}

/// Output of [`thin`].
#[derive(Debug, Clone)]
pub struct Skeleton {
    /// Thinned mask: 255 ink, 0 background.
    pub mask: GrayImage,
    /// Full passes run, including the final pass that removed nothing.
    pub passes: u32,
    /// Total ink pixels removed.
    pub removed: u64,
}

/// Thin the ink (255) pixels of `mask` until a full pass removes nothing.
///
/// Pixels on the one-pixel image border are never removed. With
/// `max_passes` set, reaching the ceiling while the last pass still
/// removed pixels is an error; an unconstrained run always terminates
/// because every non-final pass removes at least one pixel.
///
/// # Errors
///
/// Returns [`PipelineError::ThinningDidNotConverge`] if the pass ceiling
/// is reached before convergence.
pub fn thin<T: Thinner + ?Sized>(
    mask: &GrayImage,
    thinner: &T,
    max_passes: Option<u32>,
) -> Result<Skeleton, PipelineError> {
    let (w, h) = mask.dimensions();
    let width = w as usize;
    let height = h as usize;
    let mut grid: Vec<u8> = mask.as_raw().iter().map(|&v| u8::from(v == 255)).collect();
    let mut marker = vec![0_u8; grid.len()];

    let mut passes = 0_u32;
    let mut removed = 0_u64;
    if width >= 3 && height >= 3 {
        loop {
            if max_passes.is_some_and(|limit| passes >= limit) {
                return Err(PipelineError::ThinningDidNotConverge { passes });
            }
            passes += 1;
            let mut cleared = 0;
            for step in [SubIteration::First, SubIteration::Second] {
                cleared += sub_iteration(&mut grid, &mut marker, width, height, thinner, step);
            }
            trace!("thinning pass {passes}: removed {cleared} pixels");
            if cleared == 0 {
                break;
            }
            removed += cleared;
        }
    }
    debug!("thinning converged after {passes} passes, removed {removed} pixels");

    let out = GrayImage::from_fn(w, h, |x, y| {
        Luma([if grid[y as usize * width + x as usize] != 0 { 255 } else { 0 }])
    });
    Ok(Skeleton {
        mask: out,
        passes,
        removed,
    })
}

/// Mark removable pixels from the current grid, then clear them.
///
/// Returns the number of pixels cleared.
fn sub_iteration<T: Thinner + ?Sized>(
    grid: &mut [u8],
    marker: &mut [u8],
    width: usize,
    height: usize,
    thinner: &T,
    step: SubIteration,
) -> u64 {
    marker.fill(0);
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let i = y * width + x;
            if grid[i] != 0
                && thinner.is_removable(Neighborhood::read(grid, width, x, y), step)
            {
                marker[i] = 1;
            }
        }
    }
    let mut cleared = 0;
    for (cell, &mark) in grid.iter_mut().zip(marker.iter()) {
        if mark != 0 {
            *cell = 0;
            cleared += 1;
        }
    }
    cleared
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use imageproc::region_labelling::{Connectivity, connected_components};

    use super::*;

    fn rectangle(width: u32, height: u32, margin: u32) -> GrayImage {
        GrayImage::from_fn(width + 2 * margin, height + 2 * margin, |x, y| {
            let inside =
                (margin..margin + width).contains(&x) && (margin..margin + height).contains(&y);
            Luma([if inside { 255 } else { 0 }])
        })
    }

    fn ink(mask: &GrayImage) -> usize {
        mask.pixels().filter(|p| p.0[0] == 255).count()
    }

    fn component_count(mask: &GrayImage) -> u32 {
        let labels = connected_components(mask, Connectivity::Eight, Luma([0u8]));
        labels.pixels().map(|p| p.0[0]).max().unwrap_or(0)
    }

    #[test]
    fn default_is_zhang_suen() {
        assert_eq!(ThinningKind::default(), ThinningKind::ZhangSuen);
        assert_eq!(ThinningKind::ZhangSuen.to_string(), "zhang-suen");
        assert_eq!(ThinningKind::GuoHall.to_string(), "guo-hall");
    }

    #[test]
    fn neighbourhood_counts() {
        // p2 and p4 set: two ink neighbours, two separate runs.
        let n = Neighborhood::new([true, false, true, false, false, false, false, false]);
        assert_eq!(n.ink_count(), 2);
        assert_eq!(n.transitions(), 2);
        // p2, p3, p4 contiguous: one run.
        let n = Neighborhood::new([true, true, true, false, false, false, false, false]);
        assert_eq!(n.transitions(), 1);
        // Full ring has no background to transition from.
        let n = Neighborhood::new([true; 8]);
        assert_eq!(n.transitions(), 0);
    }

    #[test]
    fn zhang_suen_removes_south_east_edge_in_first_step() {
        // Pixel on the east boundary of a blob: ink to the west side.
        // p2 p3 p4 p5 p6 p7 p8 p9
        let n = Neighborhood::new([true, false, false, false, true, true, true, true]);
        assert!(ZhangSuen.is_removable(n, SubIteration::First));
    }

    #[test]
    fn zhang_suen_keeps_line_endpoints_and_interior() {
        // Endpoint: a single neighbour.
        let end = Neighborhood::new([true, false, false, false, false, false, false, false]);
        assert!(!ZhangSuen.is_removable(end, SubIteration::First));
        assert!(!ZhangSuen.is_removable(end, SubIteration::Second));
        // Interior: surrounded on all sides.
        let interior = Neighborhood::new([true; 8]);
        assert!(!ZhangSuen.is_removable(interior, SubIteration::First));
        // Bridge pixel on a vertical line: two runs.
        let bridge = Neighborhood::new([true, false, false, false, true, false, false, false]);
        assert!(!ZhangSuen.is_removable(bridge, SubIteration::First));
    }

    #[test]
    fn guo_hall_keeps_bridges_and_endpoints() {
        let bridge = Neighborhood::new([true, false, false, false, true, false, false, false]);
        assert!(!GuoHall.is_removable(bridge, SubIteration::First));
        assert!(!GuoHall.is_removable(bridge, SubIteration::Second));
        let end = Neighborhood::new([true, false, false, false, false, false, false, false]);
        assert!(!GuoHall.is_removable(end, SubIteration::First));
    }

    #[test]
    fn guo_hall_removes_corner_of_blob() {
        // North-west corner of a filled square: ink to the east, south-east and south.
        let n = Neighborhood::new([false, false, true, true, true, false, false, false]);
        let first = GuoHall.is_removable(n, SubIteration::First);
        let second = GuoHall.is_removable(n, SubIteration::Second);
        assert!(first || second, "corner pixel should go in one of the sub-iterations");
    }

    #[test]
    fn kind_dispatches_to_strategy() {
        let n = Neighborhood::new([true, false, false, false, true, true, true, true]);
        for step in [SubIteration::First, SubIteration::Second] {
            assert_eq!(
                ThinningKind::ZhangSuen.is_removable(n, step),
                ZhangSuen.is_removable(n, step)
            );
            assert_eq!(
                ThinningKind::GuoHall.is_removable(n, step),
                GuoHall.is_removable(n, step)
            );
        }
    }

    #[test]
    fn rectangles_thin_to_single_component() {
        for kind in [ThinningKind::ZhangSuen, ThinningKind::GuoHall] {
            for (w, h) in [(10, 6), (12, 12), (20, 9), (7, 15), (30, 30)] {
                let mask = rectangle(w, h, 3);
                let skeleton = thin(&mask, &kind, None).unwrap();
                assert!(
                    ink(&skeleton.mask) < ink(&mask),
                    "{kind} {w}x{h}: thinning should remove pixels"
                );
                assert!(ink(&skeleton.mask) > 0, "{kind} {w}x{h}: skeleton vanished");
                assert_eq!(
                    component_count(&skeleton.mask),
                    1,
                    "{kind} {w}x{h}: skeleton should stay connected"
                );
                assert_eq!(
                    skeleton.removed,
                    (ink(&mask) - ink(&skeleton.mask)) as u64,
                    "{kind} {w}x{h}: removed count mismatch"
                );
            }
        }
    }

    #[test]
    fn thinning_is_idempotent() {
        for kind in [ThinningKind::ZhangSuen, ThinningKind::GuoHall] {
            let once = thin(&rectangle(20, 9, 3), &kind, None).unwrap();
            let twice = thin(&once.mask, &kind, None).unwrap();
            assert_eq!(once.mask, twice.mask, "{kind}: second run changed the mask");
            assert_eq!(twice.passes, 1);
            assert_eq!(twice.removed, 0);
        }
    }

    #[test]
    fn output_is_binary() {
        let mut mask = rectangle(12, 12, 3);
        // Non-255 values are background.
        mask.put_pixel(0, 0, Luma([17]));
        let skeleton = thin(&mask, &ZhangSuen, None).unwrap();
        assert!(skeleton.mask.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
        assert_eq!(skeleton.mask.get_pixel(0, 0).0[0], 0);
    }

    #[test]
    fn border_pixels_are_never_removed() {
        let mask = GrayImage::from_pixel(8, 8, Luma([255]));
        let skeleton = thin(&mask, &ZhangSuen, None).unwrap();
        for x in 0..8 {
            assert_eq!(skeleton.mask.get_pixel(x, 0).0[0], 255);
            assert_eq!(skeleton.mask.get_pixel(x, 7).0[0], 255);
        }
        for y in 0..8 {
            assert_eq!(skeleton.mask.get_pixel(0, y).0[0], 255);
            assert_eq!(skeleton.mask.get_pixel(7, y).0[0], 255);
        }
    }

    #[test]
    fn tiny_images_are_untouched() {
        let mask = GrayImage::from_pixel(2, 5, Luma([255]));
        let skeleton = thin(&mask, &GuoHall, None).unwrap();
        assert_eq!(skeleton.mask, mask);
        assert_eq!(skeleton.passes, 0);
    }

    #[test]
    fn empty_mask_converges_in_one_pass() {
        let mask = GrayImage::new(10, 10);
        let skeleton = thin(&mask, &ZhangSuen, None).unwrap();
        assert_eq!(skeleton.passes, 1);
        assert_eq!(ink(&skeleton.mask), 0);
    }

    #[test]
    fn pass_ceiling_reports_non_convergence() {
        let mask = rectangle(30, 30, 3);
        let err = thin(&mask, &ZhangSuen, Some(1)).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::ThinningDidNotConverge { passes: 1 }
        ));
    }

    #[test]
    fn generous_pass_ceiling_matches_unbounded_run() {
        let mask = rectangle(10, 6, 3);
        let bounded = thin(&mask, &ZhangSuen, Some(100)).unwrap();
        let unbounded = thin(&mask, &ZhangSuen, None).unwrap();
        assert_eq!(bounded.mask, unbounded.mask);
    }
}
