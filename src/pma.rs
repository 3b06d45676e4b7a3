//! The adaptive packed memory array facade (§7 External Interfaces).
//!
//! [`Pma`] owns every other component and drives the control flow from §2:
//! a single-segment insert/remove that fits stays local; one that doesn't
//! asks the [`CalibratorTree`] for a window, turns the window's detector
//! history into [`Interval`]s, plans new per-segment cardinalities with
//! [`crate::partitions`], and redistributes with [`crate::spread`]. If the
//! calibrator tree runs out of room entirely, the storage resizes and the
//! same operation is retried once against the new layout.

use crate::calibrator::{CalibratorTree, WindowPlan};
use crate::config::PmaConfig;
use crate::detector::{Detector, Event};
use crate::error::{PmaError, PmaResult};
use crate::index::StaticIndex;
use crate::logging::{pma_debug, pma_info, pma_trace};
use crate::partitions;
use crate::pool::MemoryPool;
use crate::rewire::RewiredMemory;
use crate::spread;
use crate::storage::Storage;
use crate::weights;

/// Which kind of rebalance, if any, the most recent mutating call
/// triggered. Exposed for tracing and tests; not load-bearing for
/// correctness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebalanceState {
    /// The mutation fit in its segment with no rebalance.
    None,
    /// A window `[start, start + len)` at calibrator height `height` was
    /// redistributed.
    Spread { start: usize, len: usize, height: u32 },
    /// The whole storage was resized; `grow` is `true` for a doubling.
    Resize { grow: bool },
}

/// Result of [`Pma::sum`]: the running total and count of entries visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SumResult {
    pub count: usize,
    pub sum: i64,
}

/// An adaptive packed memory array over `i64` keys.
pub struct Pma {
    config: PmaConfig,
    segment_capacity: usize,
    storage: Storage,
    index: StaticIndex,
    detector: Detector,
    calibrator: CalibratorTree,
    pool: MemoryPool,
    rewired: Option<RewiredMemory>,
    last_rebalance: RebalanceState,
}

const MAX_RESIZE_RETRIES: usize = 64;

impl Pma {
    /// Construct a PMA with the given configuration, validating it first.
    pub fn with_config(config: PmaConfig) -> PmaResult<Self> {
        let segment_capacity = config.validate()?;
        let n_segments = 1usize;
        let pool_capacity = segment_capacity * 4 * std::mem::size_of::<i64>();
        let rewired = if config.use_rewiring {
            Some(RewiredMemory::new(segment_capacity * 2))
        } else {
            None
        };
        pma_info!(
            "constructing Pma: segment_capacity={} node_fanout={} use_rewiring={}",
            segment_capacity,
            config.node_fanout,
            config.use_rewiring
        );
        Ok(Self {
            calibrator: CalibratorTree::new(
                config.user_thresholds,
                config.primary_thresholds,
                config.primary_threshold_extents,
            ),
            detector: Detector::new(config.detector, n_segments),
            index: StaticIndex::new(config.node_fanout),
            pool: MemoryPool::new(pool_capacity),
            storage: Storage::new(n_segments, segment_capacity),
            rewired,
            segment_capacity,
            last_rebalance: RebalanceState::None,
            config,
        })
    }

    /// Construct a PMA with default configuration.
    pub fn new() -> Self {
        Self::with_config(PmaConfig::default()).expect("default configuration always validates")
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Current number of segments.
    pub fn segment_count(&self) -> usize {
        self.storage.n_segments()
    }

    /// Total bytes held by the backing arrays, scratch pool region, and any
    /// rewiring extents currently staged.
    pub fn memory_footprint(&self) -> usize {
        let storage_bytes = self.storage.total_capacity() * 2 * std::mem::size_of::<i64>();
        let pool_bytes = self.pool.region_capacity();
        let rewired_bytes = self
            .rewired
            .as_ref()
            .map(|r| r.extent_count() * r.extent_size() * std::mem::size_of::<i64>())
            .unwrap_or(0);
        storage_bytes + pool_bytes + rewired_bytes
    }

    /// The most recent rebalance, if any, triggered by `insert` or `remove`.
    pub fn last_rebalance(&self) -> RebalanceState {
        self.last_rebalance
    }

    /// Look up `key`, returning its value if present.
    pub fn find(&self, key: i64) -> Option<i64> {
        if key < 0 || self.storage.is_empty() {
            return None;
        }
        let seg = self.index.find(key);
        self.storage.find_in_segment(seg, key)
    }

    /// Insert `key`/`value`, or overwrite the value if `key` is already
    /// present.
    pub fn insert(&mut self, key: i64, value: i64) -> PmaResult<()> {
        if key < 0 {
            return Err(PmaError::NegativeKey(key));
        }
        self.last_rebalance = RebalanceState::None;

        for _ in 0..MAX_RESIZE_RETRIES {
            let seg = self.index.find(key);
            if self.storage.find_in_segment(seg, key).is_some() {
                self.overwrite(seg, key, value);
                return Ok(());
            }
            if !self.storage.segment_is_full(seg) {
                self.storage.insert_into_segment(seg, key, value)?;
                self.touch_pivot(seg);
                let (predecessor, successor) = self.neighbors_in_segment(seg, key);
                self.detector.record(seg, Event::Insert, predecessor, successor);
                return Ok(());
            }

            match self.plan_rebalance(seg, true)? {
                RebalanceOutcome::Retry => continue,
                RebalanceOutcome::Done => {
                    let seg = self.index.find(key);
                    self.storage.insert_into_segment(seg, key, value)?;
                    self.touch_pivot(seg);
                    let (predecessor, successor) = self.neighbors_in_segment(seg, key);
                    self.detector.record(seg, Event::Insert, predecessor, successor);
                    return Ok(());
                }
            }
        }
        Err(PmaError::CorruptState("insert did not converge after resize retries".into()))
    }

    /// Remove `key`, returning its value if it was present.
    pub fn remove(&mut self, key: i64) -> PmaResult<Option<i64>> {
        if key < 0 || self.storage.is_empty() {
            return Ok(None);
        }
        self.last_rebalance = RebalanceState::None;
        let seg = self.index.find(key);
        let Some(value) = self.storage.remove_from_segment(seg, key) else {
            return Ok(None);
        };
        self.touch_pivot(seg);
        let (predecessor, successor) = self.neighbors_of_gap(seg, key);
        self.detector.record(seg, Event::Remove, predecessor, successor);

        // A segment that just went quiet doesn't need a reactive rebalance;
        // only act once density drops below the calibrator's floor.
        let density = self.storage.segment_cardinality(seg) as f64 / self.segment_capacity as f64;
        let h_max = CalibratorTree::height_max(self.storage.n_segments());
        let rho1 = self.calibrator.thresholds_for(self.storage.n_segments()).rho(1, h_max);
        if density < rho1 && self.storage.n_segments() > 1 {
            self.plan_rebalance(seg, false)?;
        }
        Ok(Some(value))
    }

    /// Keys and values with `lo <= key <= hi`, in ascending order.
    pub fn range(&self, lo: i64, hi: i64) -> Vec<(i64, i64)> {
        if hi < lo || self.storage.is_empty() {
            return Vec::new();
        }
        let start_seg = self.index.find(lo.max(0));
        let mut out = Vec::new();
        for seg in start_seg..self.storage.n_segments() {
            let keys = self.storage.segment_keys(seg);
            let values = self.storage.segment_values(seg);
            if keys.first().is_some_and(|&k| k > hi) {
                break;
            }
            for (&k, &v) in keys.iter().zip(values) {
                if k >= lo && k <= hi {
                    out.push((k, v));
                } else if k > hi {
                    break;
                }
            }
        }
        out
    }

    /// Count and sum of values for keys in `lo..=hi`.
    pub fn sum(&self, lo: i64, hi: i64) -> SumResult {
        let entries = self.range(lo, hi);
        SumResult {
            count: entries.len(),
            sum: entries.iter().map(|&(_, v)| v).sum(),
        }
    }

    fn overwrite(&mut self, seg: usize, key: i64, value: i64) {
        // `find_in_segment` already confirmed presence; go through the
        // remove/insert pair rather than poking the backing array directly
        // so the detector sees an accurate event stream.
        self.storage.remove_from_segment(seg, key);
        let (predecessor, successor) = self.neighbors_of_gap(seg, key);
        self.detector.record(seg, Event::Remove, predecessor, successor);
        self.storage.insert_into_segment(seg, key, value).expect("segment had room a moment ago");
        let (predecessor, successor) = self.neighbors_in_segment(seg, key);
        self.detector.record(seg, Event::Insert, predecessor, successor);
    }

    /// Live neighbours of `key`, which is already present in segment `seg`
    /// (§4.5's `predecessor`/`successor` arguments to `Detector::record`).
    fn neighbors_in_segment(&self, seg: usize, key: i64) -> (Option<i64>, Option<i64>) {
        let keys = self.storage.segment_keys(seg);
        let idx = keys.binary_search(&key).expect("key was just inserted");
        let predecessor = if idx > 0 { Some(keys[idx - 1]) } else { None };
        let successor = keys.get(idx + 1).copied();
        (predecessor, successor)
    }

    /// Neighbours bracketing the gap left by removing `key` from segment
    /// `seg` (already removed by the time this is called).
    fn neighbors_of_gap(&self, seg: usize, key: i64) -> (Option<i64>, Option<i64>) {
        let keys = self.storage.segment_keys(seg);
        let idx = match keys.binary_search(&key) {
            Ok(idx) | Err(idx) => idx,
        };
        let predecessor = if idx > 0 { Some(keys[idx - 1]) } else { None };
        let successor = keys.get(idx).copied();
        (predecessor, successor)
    }

    fn touch_pivot(&mut self, seg: usize) {
        if let Some(min_key) = self.storage.segment_min_key(seg) {
            self.index.set_pivot(seg, min_key);
        }
    }

    /// Ask the calibrator tree for a window covering `seg` and either
    /// spread it or resize the whole storage. Returns `Retry` when the
    /// caller should re-derive `seg` and try its single-segment operation
    /// again (after a resize), or `Done` when the window spread already
    /// guarantees room.
    fn plan_rebalance(&mut self, seg: usize, for_insert: bool) -> PmaResult<RebalanceOutcome> {
        let n_segments = self.storage.n_segments();
        let capacity = self.segment_capacity;
        let storage = &self.storage;
        let plan = self
            .calibrator
            .find_window(seg, n_segments, capacity, for_insert, |s| storage.segment_cardinality(s));

        match plan {
            WindowPlan::Spread { start, len, height } => {
                self.last_rebalance = RebalanceState::Spread { start, len, height };
                pma_trace!("rebalance: spread window start={} len={} height={}", start, len, height);
                let total: usize = (start..start + len).map(|s| self.storage.segment_cardinality(s)).sum();
                let intervals = weights::classify(&self.detector, &self.config.detector, start, len);
                let h_max = CalibratorTree::height_max(n_segments);
                let thresholds = *self.calibrator.thresholds_for(n_segments);
                let min_per_segment = (thresholds.rho(height, h_max) * capacity as f64).floor() as usize;
                let max_per_segment = (thresholds.tau(height, h_max) * capacity as f64).ceil() as usize;
                let window_plan = if intervals.is_empty() {
                    partitions::uniform(total, len)
                } else {
                    partitions::adaptive(start, len, total, &intervals, min_per_segment, max_per_segment)
                };
                spread::spread_window(
                    &mut self.storage,
                    &mut self.index,
                    &mut self.detector,
                    &self.pool,
                    start,
                    len,
                    &window_plan,
                )?;
                self.pool.reset();
                Ok(RebalanceOutcome::Done)
            }
            WindowPlan::Resize { grow } => {
                self.last_rebalance = RebalanceState::Resize { grow };
                let new_n = if grow { n_segments * 2 } else { (n_segments / 2).max(1) };
                pma_info!("rebalance: resize n_segments {} -> {}", n_segments, new_n);
                if let Some(rewired) = self.rewired.as_mut() {
                    self.storage = spread::resize_with_rewiring(&self.storage, rewired, new_n)?;
                } else {
                    self.storage.resize_segments(new_n);
                }
                self.detector.resize(new_n);
                let min_key = self.storage.segment_min_key(0).unwrap_or(0);
                let storage = &self.storage;
                self.index.rebuild(new_n, min_key, |seg| storage.segment_min_key(seg).unwrap_or(min_key));
                pma_debug!("resize complete: n_segments={}", new_n);
                Ok(RebalanceOutcome::Retry)
            }
        }
    }
}

impl Default for Pma {
    fn default() -> Self {
        Self::new()
    }
}

enum RebalanceOutcome {
    Retry,
    Done,
}
