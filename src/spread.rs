//! Redistributes a rebalance window's live entries to match a
//! [`crate::partitions`] plan (§5.1, §5.2, §5.6).
//!
//! Two strategies share one contract — "every entry in the window ends up
//! in the segment its plan slot calls for, in sorted order, with the
//! correct parity packing" — differing only in how the scratch space is
//! obtained:
//!
//! - [`spread_window`] is the default: copy the window's live entries out
//!   into a [`crate::pool::MemoryPool`] scratch buffer, then write them
//!   back into `storage`'s own backing array. Used for every ordinary
//!   rebalance, since the window stays inside a fixed-size storage.
//! - [`resize_with_rewiring`] only runs at the two points where the number
//!   of segments itself changes (`WindowPlan::Resize`): it stages the
//!   larger or smaller backing array extent-by-extent, right to left, in
//!   [`RewiredMemory`], so the old and new arrays never coexist at full
//!   size at once — unlike the scratch-copy path, which briefly needs a
//!   full second copy of the window.

use crate::detector::Detector;
use crate::error::PmaResult;
use crate::index::StaticIndex;
use crate::pool::MemoryPool;
use crate::rewire::RewiredMemory;
use crate::storage::Storage;

/// Redistribute the live entries of `[window_start, window_start +
/// window_len)` so that segment `window_start + i` ends up with
/// `plan[i]` of them, preserving sort order and each segment's parity
/// packing. Also resets the detector history of every segment in the
/// window, since their physical contents just changed wholesale.
pub fn spread_window(
    storage: &mut Storage,
    index: &mut StaticIndex,
    detector: &mut Detector,
    pool: &MemoryPool,
    window_start: usize,
    window_len: usize,
    plan: &[usize],
) -> PmaResult<()> {
    debug_assert_eq!(plan.len(), window_len);
    let total: usize = plan.iter().sum();

    let mut key_buf = pool.allocate(total * std::mem::size_of::<i64>(), std::mem::align_of::<i64>())?;
    let mut val_buf = pool.allocate(total * std::mem::size_of::<i64>(), std::mem::align_of::<i64>())?;
    // SAFETY: both buffers were allocated with i64's alignment and a
    // length that is an exact multiple of size_of::<i64>().
    let keys: &mut [i64] = unsafe { key_buf.as_mut_slice_of(total) };
    let values: &mut [i64] = unsafe { val_buf.as_mut_slice_of(total) };

    let mut cursor = 0;
    for i in 0..window_len {
        let seg = window_start + i;
        let sk = storage.segment_keys(seg);
        let sv = storage.segment_values(seg);
        keys[cursor..cursor + sk.len()].copy_from_slice(sk);
        values[cursor..cursor + sv.len()].copy_from_slice(sv);
        cursor += sk.len();
    }
    debug_assert_eq!(cursor, total);

    let mut cursor = 0;
    for i in 0..window_len {
        let seg = window_start + i;
        let count = plan[i];
        let (start, end) = storage.segment_bounds(seg);
        let dest_lo = if seg % 2 == 0 { end - count } else { start };
        storage.raw_keys_mut()[start..end].fill(crate::storage::EMPTY);
        storage.raw_keys_mut()[dest_lo..dest_lo + count].copy_from_slice(&keys[cursor..cursor + count]);
        storage.raw_values_mut()[dest_lo..dest_lo + count].copy_from_slice(&values[cursor..cursor + count]);
        storage.set_segment_cardinality(seg, count);
        cursor += count;

        let min_key = storage.segment_min_key(seg).unwrap_or(index.pivot(seg));
        index.set_pivot(seg, min_key);
        detector.clear(seg);
    }
    Ok(())
}

/// Rebuild `storage` with `new_n_segments` segments, staging the new
/// backing array extent-by-extent in `rewired` instead of allocating one
/// large scratch copy. Each extent packs `segment_capacity` key/value
/// pairs as interleaved `i64`s (`key` at `2*j`, `value` at `2*j+1`).
pub fn resize_with_rewiring(storage: &Storage, rewired: &mut RewiredMemory, new_n_segments: usize) -> PmaResult<Storage> {
    let segment_capacity = storage.segment_capacity();
    let mut entries: Vec<(i64, i64)> = Vec::with_capacity(storage.len());
    for seg in 0..storage.n_segments() {
        entries.extend(storage.segment_keys(seg).iter().copied().zip(storage.segment_values(seg).iter().copied()));
    }
    let total = entries.len();
    let counts = crate::partitions::uniform(total, new_n_segments.max(1));

    rewired.truncate(0);
    let mut extent_of = vec![0usize; new_n_segments];
    let mut cursor = total;
    // Right to left: the rightmost segment's share is staged first.
    for seg in (0..new_n_segments).rev() {
        let count = counts[seg];
        let start = cursor - count;
        let slot = rewired.acquire_buffer()?;
        extent_of[seg] = slot;
        let extent = rewired.extent_mut(slot);
        let buf = extent.as_mut_slice();
        for (j, (k, v)) in entries[start..cursor].iter().enumerate() {
            buf[2 * j] = *k;
            buf[2 * j + 1] = *v;
        }
        cursor = start;
    }
    debug_assert_eq!(cursor, 0);

    let mut new_storage = Storage::new(new_n_segments, segment_capacity);
    for seg in 0..new_n_segments {
        let extent = rewired.extent(extent_of[seg]);
        let buf = extent.as_slice();
        let count = counts[seg];
        for j in 0..count {
            new_storage.insert_into_segment(seg, buf[2 * j], buf[2 * j + 1])?;
        }
    }
    Ok(new_storage)
}
