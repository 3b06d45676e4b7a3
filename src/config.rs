//! Construction-time configuration surface.
//!
//! Follows the shape of the teacher codebase's `core::config` module: a
//! plain `Serialize + Deserialize` struct with a validated `Default`. Unlike
//! that module this crate does not load configuration from a file or the
//! environment — that responsibility belongs to the external CLI
//! collaborator described in the design document's scope section — but the
//! struct is shaped so such a loader could deserialize one directly.

use serde::{Deserialize, Serialize};

use crate::error::{PmaError, PmaResult};

/// Lower/upper density bounds at the smallest (`h = 1`) and largest
/// (`h = H`) calibrator-tree heights, linearly interpolated in between.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DensityThresholds {
    /// Lower density bound at a single segment (`h = 1`).
    pub rho_min: f64,
    /// Lower density bound at the root window (`h = H`).
    pub rho_max: f64,
    /// Upper density bound at the root window (`h = H`).
    pub tau_max: f64,
    /// Upper density bound at a single segment (`h = 1`).
    pub tau_min: f64,
}

impl DensityThresholds {
    /// The reference "user" thresholds from the design document, used while
    /// the storage is small.
    pub fn user_default() -> Self {
        Self {
            rho_min: 0.08,
            rho_max: 0.30,
            tau_max: 0.70,
            tau_min: 0.92,
        }
    }

    /// The reference "primary" thresholds, narrower and more reactive, used
    /// once the storage exceeds `PmaConfig::primary_threshold_extents`.
    pub fn primary_default() -> Self {
        Self {
            rho_min: 0.50,
            rho_max: 0.50,
            tau_max: 0.75,
            tau_min: 0.75,
        }
    }

    /// Density lower bound at calibrator height `h` (1-indexed), linearly
    /// interpolated between `rho_min` (at `h = 1`) and `rho_max` (at
    /// `h = height_max`).
    pub fn rho(&self, h: u32, height_max: u32) -> f64 {
        interpolate(self.rho_min, self.rho_max, h, height_max)
    }

    /// Density upper bound at calibrator height `h` (1-indexed), linearly
    /// interpolated between `tau_min` (at `h = 1`) and `tau_max` (at
    /// `h = height_max`).
    pub fn tau(&self, h: u32, height_max: u32) -> f64 {
        interpolate(self.tau_min, self.tau_max, h, height_max)
    }

    /// Validate the invariants in §3/§7: `ρ_1 ≤ ρ_H < τ_H ≤ τ_1` and
    /// `2ρ_h ≤ τ_h` at both ends.
    pub fn validate(&self) -> PmaResult<()> {
        if !(self.rho_min <= self.rho_max
            && self.rho_max < self.tau_max
            && self.tau_max <= self.tau_min)
        {
            return Err(PmaError::InvalidThresholds(format!(
                "expected rho_min <= rho_max < tau_max <= tau_min, got {:?}",
                self
            )));
        }
        if 2.0 * self.rho_min > self.tau_min || 2.0 * self.rho_max > self.tau_max {
            return Err(PmaError::InvalidThresholds(format!(
                "expected 2*rho_h <= tau_h at both ends, got {:?}",
                self
            )));
        }
        Ok(())
    }
}

fn interpolate(at_h1: f64, at_hmax: f64, h: u32, height_max: u32) -> f64 {
    if height_max <= 1 {
        return at_h1;
    }
    let t = (h.saturating_sub(1)) as f64 / (height_max - 1) as f64;
    at_h1 + (at_hmax - at_h1) * t.min(1.0)
}

/// Detector knobs (§3 "Detector entry", §5.7 Weights).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Number of timestamp slots per segment ring buffer (`M`).
    pub ring_size: usize,
    /// Saturation bound for `seg_count` (`MAX_SEG`).
    pub max_seg_counter: i32,
    /// Saturation bound for `fwd_count`/`bwd_count` (`MAX_SEQ`).
    pub max_seq_counter: i32,
    /// Rank fraction `θ` used by Weights to find the staleness cutoff.
    pub rank_threshold: f64,
    /// Minimum `|seg_count|` to consider a segment hammered.
    pub segment_threshold: i32,
    /// Minimum run length to narrow a hammered region to a sequence.
    pub sequence_threshold: i32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            ring_size: 8,
            max_seg_counter: 10,
            max_seq_counter: 8,
            rank_threshold: 0.99,
            segment_threshold: 6,
            sequence_threshold: 6,
        }
    }
}

/// Construction-time tunables for a [`crate::Pma`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PmaConfig {
    /// Capacity `C` of each segment. Raised to the next power of two and
    /// clamped to `[8, 65535]` by [`PmaConfig::validate`].
    pub segment_capacity: usize,
    /// Fanout `B` of the static index. Must be at least 3.
    pub node_fanout: usize,
    /// Whether resizes use the rewiring spread instead of the in-place one.
    pub use_rewiring: bool,
    /// Density thresholds used while the storage has at most
    /// `primary_threshold_extents` segments.
    pub user_thresholds: DensityThresholds,
    /// Density thresholds used once the storage exceeds
    /// `primary_threshold_extents` segments.
    pub primary_thresholds: DensityThresholds,
    /// Segment-count cutoff at which the facade switches from
    /// `user_thresholds` to `primary_thresholds`.
    pub primary_threshold_extents: usize,
    /// Detector knobs.
    pub detector: DetectorConfig,
}

impl Default for PmaConfig {
    fn default() -> Self {
        Self {
            segment_capacity: 64,
            node_fanout: 64,
            use_rewiring: false,
            user_thresholds: DensityThresholds::user_default(),
            primary_thresholds: DensityThresholds::primary_default(),
            primary_threshold_extents: 64,
            detector: DetectorConfig::default(),
        }
    }
}

impl PmaConfig {
    /// Normalize and validate this configuration, returning the segment
    /// capacity actually used (rounded up to a power of two and clamped).
    pub fn validate(&self) -> PmaResult<usize> {
        let capacity = self.segment_capacity.next_power_of_two();
        if !(8..=65535).contains(&capacity) {
            return Err(PmaError::InvalidSegmentCapacity(self.segment_capacity));
        }
        if self.node_fanout < 3 {
            return Err(PmaError::InvalidNodeFanout(self.node_fanout));
        }
        self.user_thresholds.validate()?;
        self.primary_thresholds.validate()?;
        Ok(capacity)
    }
}
