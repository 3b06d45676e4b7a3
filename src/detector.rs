//! Hotspot detector: per-segment ring buffer and saturating counters that
//! track recent insert/remove pressure and directional sequences (§3
//! "Detector entry", §5.5).
//!
//! Adapted from the teacher's `EpochStats` concept — "cheaply track an
//! aggregate as operations happen" — but instanced per [`crate::Pma`]
//! rather than a process-global `static`; a global singleton here would
//! make two `Pma`s in the same process corrupt each other's hotspot state,
//! and the design document explicitly scopes detection to a single
//! storage.

use crate::config::DetectorConfig;

/// Kind of operation recorded against a segment, used to update the
/// directional run counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Insert,
    Remove,
}

/// One segment's hotspot bookkeeping: a circular buffer of the last `M`
/// operation timestamps plus three saturating counters.
#[derive(Debug, Clone)]
struct SegmentStats {
    ring: Vec<u64>,
    ring_head: usize,
    ring_len: usize,
    /// Saturating net insert/remove pressure: `+1` per insert, `-1` per
    /// remove, clamped to `[-MAX_SEG, MAX_SEG]`.
    seg_count: i32,
    /// Saturating count of consecutive operations whose key moved forward
    /// (ascending) relative to the previous one in this segment.
    fwd_count: i32,
    /// Saturating count of consecutive operations that moved backward.
    bwd_count: i32,
    /// Key whose successor, if matched again, continues the forward run.
    fwd_key: Option<i64>,
    /// Key whose predecessor, if matched again, continues the backward run.
    bwd_key: Option<i64>,
}

impl SegmentStats {
    fn new(ring_size: usize) -> Self {
        Self {
            ring: vec![0; ring_size],
            ring_head: 0,
            ring_len: 0,
            seg_count: 0,
            fwd_count: 0,
            bwd_count: 0,
            fwd_key: None,
            bwd_key: None,
        }
    }

    fn push_timestamp(&mut self, t: u64) {
        let n = self.ring.len();
        self.ring[self.ring_head] = t;
        self.ring_head = (self.ring_head + 1) % n;
        self.ring_len = (self.ring_len + 1).min(n);
    }

    /// Timestamps currently held, oldest first.
    fn timestamps(&self) -> Vec<u64> {
        let n = self.ring.len();
        let start = (self.ring_head + n - self.ring_len) % n;
        (0..self.ring_len).map(|i| self.ring[(start + i) % n]).collect()
    }
}

fn clamp(v: i32, bound: i32) -> i32 {
    v.clamp(-bound, bound)
}

/// Owns one [`SegmentStats`] per current segment, resized in step with
/// [`crate::storage::Storage`].
pub struct Detector {
    config: DetectorConfig,
    stats: Vec<SegmentStats>,
    clock: u64,
}

impl Detector {
    pub fn new(config: DetectorConfig, n_segments: usize) -> Self {
        Self {
            stats: (0..n_segments).map(|_| SegmentStats::new(config.ring_size)).collect(),
            config,
            clock: 0,
        }
    }

    pub fn segment_count(&self) -> usize {
        self.stats.len()
    }

    /// Record an operation on segment `seg` with the given `predecessor`/
    /// `successor` keys (the live neighbours of the touched key within the
    /// segment, `None` at either end), advancing the detector's logical
    /// clock (§4.5).
    pub fn record(&mut self, seg: usize, event: Event, predecessor: Option<i64>, successor: Option<i64>) {
        self.clock += 1;
        let cfg = &self.config;
        let s = &mut self.stats[seg];
        s.push_timestamp(self.clock);

        if s.bwd_key.is_some() && successor == s.bwd_key {
            s.bwd_count = clamp(s.bwd_count + 1, cfg.max_seq_counter);
        } else if s.fwd_key.is_some() && predecessor == s.fwd_key {
            s.fwd_count = clamp(s.fwd_count + 1, cfg.max_seq_counter);
        } else {
            s.fwd_count = 0;
            s.bwd_count = 0;
            s.fwd_key = predecessor;
            s.bwd_key = successor;
        }

        let delta = match event {
            Event::Insert => 1,
            Event::Remove => -1,
        };
        s.seg_count = clamp(s.seg_count + delta, cfg.max_seg_counter);
    }

    /// Net insert/remove pressure recorded against segment `seg`.
    pub fn seg_count(&self, seg: usize) -> i32 {
        self.stats[seg].seg_count
    }

    /// Length of the current ascending run in segment `seg`.
    pub fn fwd_count(&self, seg: usize) -> i32 {
        self.stats[seg].fwd_count
    }

    /// Length of the current descending run in segment `seg`.
    pub fn bwd_count(&self, seg: usize) -> i32 {
        self.stats[seg].bwd_count
    }

    /// Key whose successor continues segment `seg`'s forward run, if any.
    pub fn fwd_key(&self, seg: usize) -> Option<i64> {
        self.stats[seg].fwd_key
    }

    /// Key whose predecessor continues segment `seg`'s backward run, if any.
    pub fn bwd_key(&self, seg: usize) -> Option<i64> {
        self.stats[seg].bwd_key
    }

    /// Timestamps recorded against segment `seg`, oldest first, used by
    /// [`crate::weights::Weights`] to rank segments by recency.
    pub fn timestamps(&self, seg: usize) -> Vec<u64> {
        self.stats[seg].timestamps()
    }

    /// Reset a segment's bookkeeping to the empty state, called after it
    /// has been folded into a rebalance window and its entries moved
    /// elsewhere.
    pub fn clear(&mut self, seg: usize) {
        self.stats[seg] = SegmentStats::new(self.config.ring_size);
    }

    /// Move the detector state of `from` onto `to` verbatim, used when a
    /// spread relocates a segment's physical slot without otherwise
    /// touching its entries (§5.5 "move semantics" — hotspot history
    /// travels with the data it describes).
    pub fn move_entries(&mut self, from: usize, to: usize) {
        if from == to {
            return;
        }
        self.stats[to] = self.stats[from].clone();
        self.stats[from] = SegmentStats::new(self.config.ring_size);
    }

    /// Grow or shrink the number of tracked segments, discarding history
    /// (a resize already invalidates segment identity, so there is nothing
    /// meaningful to carry forward).
    pub fn resize(&mut self, new_n_segments: usize) {
        self.stats = (0..new_n_segments).map(|_| SegmentStats::new(self.config.ring_size)).collect();
    }

    /// Whether segment `seg`'s net pressure has crossed the configured
    /// hammered threshold, in either direction.
    pub fn is_hammered(&self, seg: usize) -> bool {
        self.stats[seg].seg_count.abs() >= self.config.segment_threshold
    }
}
