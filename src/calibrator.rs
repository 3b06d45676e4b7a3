//! The calibrator tree: an imaginary balanced binary tree over segments,
//! used only to pick a rebalance window (§5.6). Never materialised — the
//! "nodes" are computed on the fly from segment cardinalities.

use crate::config::DensityThresholds;

/// Outcome of walking the calibrator tree from a leaf segment upward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPlan {
    /// Rebalance (spread) the window `[start, start + len)` at the given
    /// calibrator height.
    Spread { start: usize, len: usize, height: u32 },
    /// The root of the calibrator tree was reached without finding a
    /// window within its density bounds; the storage must resize.
    Resize {
        /// `true` to double `N` (insert pressure), `false` to halve it.
        grow: bool,
    },
}

/// Selects density thresholds and walks the calibrator tree.
pub struct CalibratorTree {
    user_thresholds: DensityThresholds,
    primary_thresholds: DensityThresholds,
    primary_threshold_extents: usize,
}

impl CalibratorTree {
    /// Construct from the two threshold tables and the segment-count cutoff
    /// at which the facade switches from user to primary thresholds.
    pub fn new(
        user_thresholds: DensityThresholds,
        primary_thresholds: DensityThresholds,
        primary_threshold_extents: usize,
    ) -> Self {
        Self {
            user_thresholds,
            primary_thresholds,
            primary_threshold_extents,
        }
    }

    /// The active threshold table for a storage of `n_segments` segments.
    pub fn thresholds_for(&self, n_segments: usize) -> &DensityThresholds {
        if n_segments > self.primary_threshold_extents {
            &self.primary_thresholds
        } else {
            &self.user_thresholds
        }
    }

    /// Height of the whole storage's calibrator tree: `H = log2(N) + 1`.
    pub fn height_max(n_segments: usize) -> u32 {
        debug_assert!(n_segments.is_power_of_two());
        n_segments.trailing_zeros() + 1
    }

    /// The aligned window `[start, start + 2^(h-1))` that contains `leaf`
    /// at calibrator height `h` (1-indexed).
    pub fn window_at(leaf: usize, h: u32) -> (usize, usize) {
        let len = 1usize << (h - 1);
        ((leaf / len) * len, len)
    }

    /// Walk upward from `leaf`'s window at height 1, widening until a
    /// window satisfies the active density bounds for `for_insert`, or the
    /// root is reached (in which case a resize is requested).
    ///
    /// `cardinality_of` returns the live entry count of a single segment;
    /// `segment_capacity` is `C`.
    pub fn find_window(
        &self,
        leaf: usize,
        n_segments: usize,
        segment_capacity: usize,
        for_insert: bool,
        mut cardinality_of: impl FnMut(usize) -> usize,
    ) -> WindowPlan {
        let h_max = Self::height_max(n_segments);
        let thresholds = self.thresholds_for(n_segments);
        let mut h = 1u32;
        loop {
            let (start, len) = Self::window_at(leaf, h);
            let card: usize = (start..start + len).map(&mut cardinality_of).sum();
            let window_capacity = len * segment_capacity;
            let density = card as f64 / window_capacity as f64;
            let rho = thresholds.rho(h, h_max);
            let tau = thresholds.tau(h, h_max);
            let within_bounds = if for_insert { density <= tau } else { density >= rho };

            if within_bounds {
                return WindowPlan::Spread { start, len, height: h };
            }
            if h >= h_max {
                return WindowPlan::Resize { grow: for_insert };
            }
            h += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> CalibratorTree {
        CalibratorTree::new(
            DensityThresholds::user_default(),
            DensityThresholds::primary_default(),
            64,
        )
    }

    #[test]
    fn window_at_aligns_to_power_of_two_boundaries() {
        assert_eq!(CalibratorTree::window_at(5, 1), (5, 1));
        assert_eq!(CalibratorTree::window_at(5, 2), (4, 2));
        assert_eq!(CalibratorTree::window_at(5, 3), (4, 4));
    }

    #[test]
    fn low_density_single_segment_is_immediately_a_valid_window() {
        let tree = tree();
        // 8 segments, capacity 8, leaf segment half full: density 0.5 is
        // within [rho_1, tau_1] = [0.08, 0.92] at h=1.
        let plan = tree.find_window(3, 8, 8, true, |_| 4);
        assert_eq!(plan, WindowPlan::Spread { start: 3, len: 1, height: 1 });
    }

    #[test]
    fn full_storage_requests_resize_on_insert() {
        let tree = tree();
        // Every segment full: density 1.0 everywhere, never <= tau, so we
        // ascend to the root and then request a resize.
        let plan = tree.find_window(0, 8, 8, true, |_| 8);
        assert_eq!(plan, WindowPlan::Resize { grow: true });
    }

    #[test]
    fn empty_storage_requests_resize_on_remove() {
        let tree = tree();
        let plan = tree.find_window(0, 8, 8, false, |_| 0);
        assert_eq!(plan, WindowPlan::Resize { grow: false });
    }
}
