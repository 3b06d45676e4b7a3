//! Segmented backing storage: the physical array of key/value pairs and
//! the parity packing that keeps adjacent segments scan-contiguous (§3
//! "Segment", §5.1).
//!
//! Keys and values live in two flat `Vec<i64>` arrays of `n_segments *
//! segment_capacity` slots each, sliced into fixed-size segments. Only
//! non-negative keys are ever inserted by a caller (§6 Non-goals); an empty
//! slot is marked with [`EMPTY`], a negative sentinel, so "is this slot
//! live" is a single comparison rather than a parallel bitmap.
//!
//! A segment's live entries are always contiguous within the segment and
//! sorted ascending, but which *end* of the segment they hug depends on
//! parity: even segments pack right (gap on the left), odd segments pack
//! left (gap on the right). Two adjacent segments therefore always meet
//! gap-to-gap or entry-to-entry, never gap-to-entry, which is what lets a
//! range scan treat a whole calibrator window as one contiguous run of live
//! entries once it is known to be gapless (see [`crate::spread`]).

use crate::error::{PmaError, PmaResult};

/// Sentinel marking an empty slot. Negative keys are a non-goal for callers
/// (§6), so any negative value is unambiguously "not a real entry".
pub const EMPTY: i64 = i64::MIN;

/// The segmented key/value backing array.
pub struct Storage {
    segment_capacity: usize,
    keys: Vec<i64>,
    values: Vec<i64>,
    cardinalities: Vec<usize>,
}

impl Storage {
    /// Allocate storage for `n_segments` segments of `segment_capacity`
    /// slots each, all empty.
    pub fn new(n_segments: usize, segment_capacity: usize) -> Self {
        let total = n_segments * segment_capacity;
        Self {
            segment_capacity,
            keys: vec![EMPTY; total],
            values: vec![0; total],
            cardinalities: vec![0; n_segments],
        }
    }

    pub fn segment_capacity(&self) -> usize {
        self.segment_capacity
    }

    pub fn n_segments(&self) -> usize {
        self.cardinalities.len()
    }

    pub fn total_capacity(&self) -> usize {
        self.keys.len()
    }

    /// Total number of live entries across every segment.
    pub fn len(&self) -> usize {
        self.cardinalities.iter().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn segment_cardinality(&self, seg: usize) -> usize {
        self.cardinalities[seg]
    }

    pub fn segment_is_full(&self, seg: usize) -> bool {
        self.cardinalities[seg] == self.segment_capacity
    }

    /// Flat-array bounds `[start, end)` of segment `seg`, including its gap.
    pub fn segment_bounds(&self, seg: usize) -> (usize, usize) {
        let start = seg * self.segment_capacity;
        (start, start + self.segment_capacity)
    }

    /// Flat-array bounds of the *live* (gapless) sub-range of segment `seg`,
    /// honouring its parity packing direction.
    pub fn occupied_range(&self, seg: usize) -> (usize, usize) {
        let (start, end) = self.segment_bounds(seg);
        let card = self.cardinalities[seg];
        if seg % 2 == 0 {
            (end - card, end) // even: right-aligned
        } else {
            (start, start + card) // odd: left-aligned
        }
    }

    /// Sorted live keys of segment `seg`.
    pub fn segment_keys(&self, seg: usize) -> &[i64] {
        let (lo, hi) = self.occupied_range(seg);
        &self.keys[lo..hi]
    }

    /// Values parallel to [`Storage::segment_keys`].
    pub fn segment_values(&self, seg: usize) -> &[i64] {
        let (lo, hi) = self.occupied_range(seg);
        &self.values[lo..hi]
    }

    /// Smallest live key in segment `seg`, or `None` if it is empty.
    pub fn segment_min_key(&self, seg: usize) -> Option<i64> {
        self.segment_keys(seg).first().copied()
    }

    /// Largest live key in segment `seg`, or `None` if it is empty.
    pub fn segment_max_key(&self, seg: usize) -> Option<i64> {
        self.segment_keys(seg).last().copied()
    }

    /// Binary search `key` within segment `seg`'s live entries, returning
    /// `Ok(value)` if found.
    pub fn find_in_segment(&self, seg: usize, key: i64) -> Option<i64> {
        let keys = self.segment_keys(seg);
        keys.binary_search(&key)
            .ok()
            .map(|i| self.segment_values(seg)[i])
    }

    /// Insert `key`/`value` into segment `seg`, which must not be full and
    /// must not already contain `key`. Maintains sort order and parity
    /// packing. Returns an error only if the segment is already full —
    /// callers are expected to have checked capacity via the calibrator
    /// before calling this.
    pub fn insert_into_segment(&mut self, seg: usize, key: i64, value: i64) -> PmaResult<()> {
        if self.segment_is_full(seg) {
            return Err(PmaError::CorruptState(format!(
                "insert_into_segment called on full segment {seg}"
            )));
        }
        let (lo, hi) = self.occupied_range(seg);
        let p = lo + self.keys[lo..hi].partition_point(|&k| k < key);
        if seg % 2 == 0 {
            // Right-aligned: grow into [lo - 1, hi). Shift [lo, p) left by one.
            self.keys.copy_within(lo..p, lo - 1);
            self.values.copy_within(lo..p, lo - 1);
            self.keys[p - 1] = key;
            self.values[p - 1] = value;
        } else {
            // Left-aligned: grow into [lo, hi + 1). Shift [p, hi) right by one.
            self.keys.copy_within(p..hi, p + 1);
            self.values.copy_within(p..hi, p + 1);
            self.keys[p] = key;
            self.values[p] = value;
        }
        self.cardinalities[seg] += 1;
        Ok(())
    }

    /// Remove `key` from segment `seg` if present, returning its value.
    pub fn remove_from_segment(&mut self, seg: usize, key: i64) -> Option<i64> {
        let (lo, hi) = self.occupied_range(seg);
        let p = lo + self.keys[lo..hi].binary_search(&key).ok()?;
        let value = self.values[p];
        if seg % 2 == 0 {
            // Right-aligned: shrink to [lo + 1, hi). Shift [lo, p) right by one.
            self.keys.copy_within(lo..p, lo + 1);
            self.values.copy_within(lo..p, lo + 1);
            self.keys[lo] = EMPTY;
        } else {
            // Left-aligned: shrink to [lo, hi - 1). Shift [p + 1, hi) left by one.
            self.keys.copy_within(p + 1..hi, p);
            self.values.copy_within(p + 1..hi, p);
            self.keys[hi - 1] = EMPTY;
        }
        self.cardinalities[seg] -= 1;
        Some(value)
    }

    /// Directly set the cardinality of a segment, for use by
    /// [`crate::spread::Spread`] after it has rewritten the flat arrays of
    /// a window out from under per-segment bookkeeping.
    pub fn set_segment_cardinality(&mut self, seg: usize, card: usize) {
        debug_assert!(card <= self.segment_capacity);
        self.cardinalities[seg] = card;
    }

    /// Raw key slice of the whole backing array, for bulk window rewrites.
    pub fn raw_keys(&self) -> &[i64] {
        &self.keys
    }

    pub fn raw_keys_mut(&mut self) -> &mut [i64] {
        &mut self.keys
    }

    pub fn raw_values_mut(&mut self) -> &mut [i64] {
        &mut self.values
    }

    /// Grow or shrink the number of segments, copying every live entry
    /// forward into a fresh left-packed layout (segment 0 upward) before
    /// handing off to a fresh parity packing on the next rebalance. Used
    /// only for the resize path (§5.6 `Resize`), never for an ordinary
    /// rebalance.
    pub fn resize_segments(&mut self, new_n_segments: usize) {
        let mut entries: Vec<(i64, i64)> = Vec::with_capacity(self.len());
        for seg in 0..self.n_segments() {
            let keys = self.segment_keys(seg).to_vec();
            let values = self.segment_values(seg).to_vec();
            entries.extend(keys.into_iter().zip(values));
        }
        let total = new_n_segments * self.segment_capacity;
        self.keys = vec![EMPTY; total];
        self.values = vec![0; total];
        self.cardinalities = vec![0; new_n_segments];

        let n = entries.len();
        let per_segment = if new_n_segments == 0 { 0 } else { n / new_n_segments };
        let remainder = if new_n_segments == 0 { 0 } else { n % new_n_segments };
        let mut cursor = 0usize;
        for seg in 0..new_n_segments {
            let take = per_segment + usize::from(seg < remainder);
            let (start, _) = self.segment_bounds(seg);
            for (i, (k, v)) in entries[cursor..cursor + take].iter().enumerate() {
                self.keys[start + i] = *k;
                self.values[start + i] = *v;
            }
            self.cardinalities[seg] = take;
            cursor += take;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_find_round_trip() {
        let mut s = Storage::new(4, 8);
        s.insert_into_segment(0, 10, 100).unwrap();
        s.insert_into_segment(0, 5, 50).unwrap();
        s.insert_into_segment(0, 7, 70).unwrap();
        assert_eq!(s.segment_keys(0), &[5, 7, 10]);
        assert_eq!(s.find_in_segment(0, 7), Some(70));
        assert_eq!(s.find_in_segment(0, 999), None);
    }

    #[test]
    fn even_segment_packs_right_odd_packs_left() {
        let mut s = Storage::new(2, 4);
        s.insert_into_segment(0, 1, 1).unwrap();
        let (lo, hi) = s.occupied_range(0);
        assert_eq!((lo, hi), (3, 4)); // right-aligned within [0,4)

        s.insert_into_segment(1, 1, 1).unwrap();
        let (lo, hi) = s.occupied_range(1);
        assert_eq!((lo, hi), (4, 5)); // left-aligned within [4,8)
    }

    #[test]
    fn remove_closes_gap_and_preserves_order() {
        let mut s = Storage::new(1, 8);
        for k in [3, 1, 4, 15, 9] {
            s.insert_into_segment(0, k, k * 10).unwrap();
        }
        let removed = s.remove_from_segment(0, 4);
        assert_eq!(removed, Some(40));
        assert!(s.segment_keys(0).windows(2).all(|w| w[0] < w[1]));
        assert_eq!(s.segment_cardinality(0), 4);
    }

    #[test]
    fn resize_segments_redistributes_evenly() {
        let mut s = Storage::new(2, 8);
        for k in 0..10 {
            let seg = (k % 2) as usize;
            s.insert_into_segment(seg, k, k).unwrap();
        }
        assert_eq!(s.len(), 10);
        s.resize_segments(4);
        assert_eq!(s.n_segments(), 4);
        assert_eq!(s.len(), 10);
        let mut all: Vec<i64> = (0..4).flat_map(|seg| s.segment_keys(seg).to_vec()).collect();
        all.sort();
        assert_eq!(all, (0..10).collect::<Vec<_>>());
    }
}
