//! Dynamic-fanout static search index over segment pivots (§4.3).
//!
//! Ported from `examples/original_source/pma/generic/static_index.{hpp,cpp}`:
//! a single flat array of `B - 1`-key nodes in DFS order, uniform height
//! everywhere except along the rightmost root-to-leaf path, which may
//! recurse into a strictly shallower subtree. That path's shape is recorded
//! top-down in `rightmost[h - 1]` (one entry per level) rather than padding
//! the tree out to a complete one, so a lopsided segment count costs one
//! small ragged branch instead of doubling the whole structure.
//!
//! Node `i`'s `j`-th stored key (`j` in `0..B-1`) is the minimum key of its
//! `(j + 1)`-th child — the classic B-tree separator convention, not a
//! per-child maximum — so descent always advances past every separator
//! `<= key` (strictly `<` for `find_first`, and right-to-left for
//! `find_last`).

use std::ops::Range;

/// Shape of the (possibly short) rightmost subtree rooted one level below
/// a given height: how many of that level's `B - 1` separator slots are
/// actually in use along the rightmost path, and the height of whatever
/// hangs off the last of them.
#[derive(Debug, Clone, Copy, Default)]
struct RightmostSubtreeInfo {
    /// Number of full (non-rightmost) children of the rightmost node at
    /// this level, i.e. the node's used separator count.
    root_sz: usize,
    /// Height of the rightmost node's own rightmost child.
    right_height: u32,
}

/// An implicit, array-backed B-ary tree over `N - 1` segment separators.
pub struct StaticIndex {
    node_size: usize,
    /// Height of the tree above the leaf separators; `0` when there is at
    /// most one segment (nothing to route between).
    height: u32,
    /// Number of segments this index currently covers (`N`).
    capacity: usize,
    /// Flat DFS-ordered array of `node_size - 1` wide nodes, `node_size^height - 1` slots.
    keys: Vec<i64>,
    /// Segment 0 has no entry in the tree; its pivot lives here.
    key_minimum: i64,
    /// `rightmost[h - 1]` describes the rightmost node at height `h`, for
    /// every `h` in `1..=height`.
    rightmost: Vec<RightmostSubtreeInfo>,
}

impl StaticIndex {
    /// Build an empty index with node fanout `B` (`B - 1` keys per node).
    pub fn new(fanout: usize) -> Self {
        debug_assert!(fanout >= 3);
        let mut idx = Self {
            node_size: fanout,
            height: 0,
            capacity: 1,
            keys: Vec::new(),
            key_minimum: i64::MAX,
            rightmost: Vec::new(),
        };
        idx.resize_tree(1);
        idx
    }

    /// Node fanout `B`.
    pub fn fanout(&self) -> usize {
        self.node_size
    }

    /// Number of segments this index currently covers (`N`).
    pub fn segment_count(&self) -> usize {
        self.capacity
    }

    /// Height of the tree above the leaf separators.
    pub fn height(&self) -> usize {
        self.height as usize
    }

    /// `ceil(log_B(n))`, `0` when `n <= 1` (nothing to route between).
    fn compute_height(n_segments: usize, node_size: usize) -> u32 {
        if n_segments <= 1 {
            return 0;
        }
        let n = n_segments as f64;
        let b = node_size as f64;
        (n.log2() / b.log2()).ceil() as u32
    }

    /// Recompute `rightmost[h - 1]` for every level top-down, the way
    /// `rebuild` walks down the rightmost root-to-leaf path in the ground
    /// truth: at each height, how many full children the rightmost node
    /// has, and how tall (and how populated) whatever remains is once
    /// those full children are accounted for.
    fn build_rightmost(node_size: usize, height: u32, n_segments: usize) -> Vec<RightmostSubtreeInfo> {
        let mut table = vec![RightmostSubtreeInfo::default(); height as usize];
        let mut h = height;
        let mut n = n_segments;
        while h > 0 {
            let subtree_sz = node_size.pow(h - 1);
            let root_sz = (n - 1) / subtree_sz;
            let mut rightmost_subtree_sz = (n - 1) % subtree_sz;
            let mut rightmost_height = 0u32;
            if rightmost_subtree_sz > 0 {
                rightmost_subtree_sz += 1;
                rightmost_height = Self::compute_height(rightmost_subtree_sz, node_size);
            }
            table[(h - 1) as usize] = RightmostSubtreeInfo { root_sz, right_height: rightmost_height };
            n = rightmost_subtree_sz;
            h = rightmost_height;
        }
        table
    }

    /// Resize the tree's physical shape for `n_segments`, reallocating the
    /// key array only when the height actually changes (the array's shape
    /// depends on height and fanout alone, not directly on `n_segments`).
    fn resize_tree(&mut self, n_segments: usize) {
        debug_assert!(n_segments >= 1);
        let height = Self::compute_height(n_segments, self.node_size);
        if height != self.height {
            let tree_sz = if height > 0 { self.node_size.pow(height) - 1 } else { 0 };
            self.keys = vec![0; tree_sz];
            self.height = height;
        }
        self.capacity = n_segments;
        self.rightmost = Self::build_rightmost(self.node_size, height, n_segments);
    }

    /// Rebuild the index from scratch for `n_segments`, then set every
    /// segment's pivot via `pivot_of(i)` for `i` in `1..n_segments`.
    /// Segment 0's pivot is `min_key`, stored outside the tree.
    pub fn rebuild(&mut self, n_segments: usize, min_key: i64, mut pivot_of: impl FnMut(usize) -> i64) {
        self.resize_tree(n_segments);
        self.key_minimum = min_key;
        for seg in 1..n_segments {
            let key = pivot_of(seg);
            self.set_pivot(seg, key);
        }
    }

    /// Offset into `self.keys` holding segment `id`'s pivot (`id >= 1`),
    /// found by the same descent arithmetic `find` uses, but driven by the
    /// segment id rather than a key comparison.
    fn slot_index(&self, segment_id: usize) -> usize {
        let mut base = 0usize;
        let mut offset = segment_id;
        let mut height = self.height;
        let mut rightmost = true;
        let mut subtree_sz = if height > 0 { self.node_size.pow(height - 1) } else { 1 };
        while height > 0 {
            let subtree_id = offset / subtree_sz;
            let modulo = offset % subtree_sz;
            if modulo == 0 {
                return base + subtree_id - 1;
            }
            base += (self.node_size - 1) + subtree_id * (subtree_sz - 1);
            offset -= subtree_id * subtree_sz;
            rightmost = rightmost && subtree_id >= self.rightmost[(height - 1) as usize].root_sz;
            if rightmost {
                height = self.rightmost[(height - 1) as usize].right_height;
                subtree_sz = if height > 0 { self.node_size.pow(height - 1) } else { 1 };
            } else {
                height -= 1;
                subtree_sz /= self.node_size;
            }
        }
        base + offset
    }

    /// Overwrite the pivot of segment `id`. `id == 0` updates `min_key`
    /// instead, since segment 0 has no slot in the tree.
    pub fn set_pivot(&mut self, id: usize, key: i64) {
        if id == 0 {
            self.key_minimum = key;
            return;
        }
        debug_assert!(id < self.capacity, "set_pivot out of range");
        let slot = self.slot_index(id);
        self.keys[slot] = key;
    }

    /// Pivot of segment `id`.
    pub fn pivot(&self, id: usize) -> i64 {
        if id == 0 {
            self.key_minimum
        } else {
            self.keys[self.slot_index(id)]
        }
    }

    /// Shared rightmost-subtree descent: starting at the root, repeatedly
    /// ask `choose` which child of the current node's `root_sz` (or full
    /// `node_size - 1`, off the rightmost path) separators to take, then
    /// step down to that child exactly the way `slot_index` does, tracking
    /// `base`/`offset` instead of a raw pointer.
    fn descend(&self, mut choose: impl FnMut(&[i64], usize) -> usize) -> usize {
        let mut base = 0usize;
        let mut offset = 0usize;
        let mut height = self.height;
        let mut rightmost = true;
        let mut subtree_sz = if height > 0 { self.node_size.pow(height - 1) } else { 1 };
        while height > 0 {
            let root_sz =
                if rightmost { self.rightmost[(height - 1) as usize].root_sz } else { self.node_size - 1 };
            let node: Range<usize> = base..base + root_sz;
            let subtree_id = choose(&self.keys[node], root_sz);
            base += (self.node_size - 1) + subtree_id * (subtree_sz - 1);
            offset += subtree_id * subtree_sz;
            rightmost = rightmost && subtree_id >= self.rightmost[(height - 1) as usize].root_sz;
            if rightmost {
                height = self.rightmost[(height - 1) as usize].right_height;
                subtree_sz = if height > 0 { self.node_size.pow(height - 1) } else { 1 };
            } else {
                height -= 1;
                subtree_sz /= self.node_size;
            }
        }
        offset
    }

    /// Unique segment that would contain `key` (non-duplicating lookup
    /// semantics): the last segment whose pivot is `<= key`, or `0` if
    /// `key <= min_key` or the index is empty.
    pub fn find(&self, key: i64) -> usize {
        if key <= self.key_minimum {
            return 0;
        }
        self.descend(|node, root_sz| {
            let mut subtree_id = 0;
            while subtree_id < root_sz && node[subtree_id] <= key {
                subtree_id += 1;
            }
            subtree_id
        })
    }

    /// Leftmost segment that may contain `key` under duplicates: the first
    /// segment whose pivot is `>= key`.
    pub fn find_first(&self, key: i64) -> usize {
        if key < self.key_minimum {
            return 0;
        }
        self.descend(|node, root_sz| {
            let mut subtree_id = 0;
            while subtree_id < root_sz && node[subtree_id] < key {
                subtree_id += 1;
            }
            subtree_id
        })
    }

    /// Rightmost segment that may contain `key` under duplicates: the last
    /// segment whose pivot is `<= key`, scanning from the right.
    pub fn find_last(&self, key: i64) -> usize {
        if key < self.key_minimum {
            return 0;
        }
        self.descend(|node, root_sz| {
            let mut subtree_id = root_sz;
            while subtree_id > 0 && key < node[subtree_id - 1] {
                subtree_id -= 1;
            }
            subtree_id
        })
    }

    /// Number of separator slots physically backing the tree, for
    /// diagnostics and tests.
    pub fn separator_count(&self) -> usize {
        self.keys.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(pivots: &[i64], fanout: usize) -> StaticIndex {
        let mut idx = StaticIndex::new(fanout);
        idx.rebuild(pivots.len(), pivots[0], |i| pivots[i]);
        idx
    }

    /// Index of the last element of `slice` that is `<= key`, or `None` if
    /// every element is `> key` (or the slice is empty).
    fn linear_find_last_le(slice: &[i64], key: i64) -> Option<usize> {
        let mut result = None;
        for (i, &k) in slice.iter().enumerate() {
            if k <= key {
                result = Some(i);
            } else {
                break;
            }
        }
        result
    }

    #[test]
    fn empty_index_finds_segment_zero() {
        let idx = StaticIndex::new(4);
        assert_eq!(idx.find(42), 0);
    }

    #[test]
    fn single_segment_finds_segment_zero() {
        let idx = build(&[10], 4);
        assert_eq!(idx.find(-100), 0);
        assert_eq!(idx.find(10), 0);
        assert_eq!(idx.find(1000), 0);
    }

    #[test]
    fn small_fanout_matches_linear_scan() {
        let pivots: Vec<i64> = (0..50).map(|i| i * 10).collect();
        let idx = build(&pivots, 3);
        for key in -5..510 {
            let expected = linear_find_last_le(&pivots, key).unwrap_or(0);
            assert_eq!(idx.find(key), expected, "key={key}");
        }
    }

    #[test]
    fn wide_fanout_matches_linear_scan() {
        let pivots: Vec<i64> = (0..1000).map(|i| i * 3).collect();
        let idx = build(&pivots, 64);
        for key in (-10..3010).step_by(7) {
            let expected = linear_find_last_le(&pivots, key).unwrap_or(0);
            assert_eq!(idx.find(key), expected, "key={key}");
        }
    }

    #[test]
    fn set_pivot_updates_future_lookups() {
        let pivots: Vec<i64> = (0..40).map(|i| i * 10).collect();
        let mut idx = build(&pivots, 5);
        idx.set_pivot(10, 999);
        assert_eq!(idx.pivot(10), 999);
        assert_eq!(idx.find(999), 10);
        assert_eq!(idx.find(100), 9); // old pivot(10)=100 no longer routes there
    }

    #[test]
    fn uneven_segment_counts_build_a_ragged_rightmost_subtree() {
        // Segment counts that are not an exact power of the fanout stress
        // the "rightmost partial subtree" path.
        for n in [2usize, 3, 7, 13, 65, 130, 257] {
            let pivots: Vec<i64> = (0..n as i64).map(|i| i * 2).collect();
            let idx = build(&pivots, 4);
            for key in 0..(n as i64 * 2 + 2) {
                let expected = linear_find_last_le(&pivots, key).unwrap_or(0);
                assert_eq!(idx.find(key), expected, "n={n} key={key}");
            }
        }
    }

    #[test]
    fn find_first_and_find_last_bracket_duplicate_runs() {
        // n=4, fanout=4 fits in a single fully-populated root node, so the
        // routing keys are exactly the separators [10, 20, 30] and the
        // result can be traced by hand.
        let idx = build(&[0, 10, 20, 30], 4);

        // A key strictly between two separators: unambiguous, all three
        // queries agree.
        assert_eq!(idx.find(15), 1);
        assert_eq!(idx.find_first(15), 1);
        assert_eq!(idx.find_last(15), 1);

        // A key exactly equal to a separator: duplicates of it could span
        // the segment boundary, so find_first looks one segment earlier
        // than find/find_last.
        assert_eq!(idx.find(10), 1);
        assert_eq!(idx.find_first(10), 0);
        assert_eq!(idx.find_last(10), 1);
    }

    #[test]
    fn height_grows_logarithmically_with_fanout() {
        let idx = build(&(0..1000).map(|i| i * 2).collect::<Vec<_>>(), 10);
        // ceil(log_10(1000)) == 3
        assert_eq!(idx.height(), 3);
    }
}
