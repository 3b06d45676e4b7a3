//! Projects detector state onto a rebalance window into compact interval
//! summaries, classifying which parts of the window are being "hammered"
//! by a burst of same-direction traffic (§5.5 Weights, §3 "Detector
//! entry").
//!
//! A segment only counts as hammered once its signed pressure clears a
//! rank-based cutoff: rather than a single fixed threshold, the cutoff is
//! the `θ`-quantile (`DetectorConfig::rank_threshold`, default `0.99`) of
//! `|seg_count|` across the window, found with a quickselect so the window
//! doesn't need a full sort. Adjacent segments with the same sign above the
//! cutoff are merged into one [`Interval`]; adjacent segments with
//! *opposite* signs that are both hammered are cancelled out of the result
//! entirely, on the spot, rather than being zeroed and swept in a later
//! pass — a window that is being hammered forward on one half and backward
//! on the other is not a directional hotspot, it's noise, and letting a
//! stale cancelled run survive into the recursive split of
//! [`crate::partitions`] would bias the split toward a direction that
//! isn't really there.

use crate::config::DetectorConfig;
use crate::detector::Detector;

/// A maximal run of same-signed hammered segments within a window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    /// Segment index (absolute, not window-relative) where the run starts.
    pub start: usize,
    /// Number of segments in the run.
    pub length: usize,
    /// Sum of signed per-segment pressure across the run; positive means
    /// insert-heavy, negative means remove-heavy.
    pub weight: f64,
}

impl Interval {
    pub fn end(&self) -> usize {
        self.start + self.length
    }

    pub fn is_insert_heavy(&self) -> bool {
        self.weight > 0.0
    }
}

/// Select the `k`-th smallest element of `values` (0-indexed), partially
/// reordering `values` in the process. Standard Hoare-partition
/// quickselect; worst case O(n^2) but expected O(n), and windows here are
/// bounded by the calibrator tree height so `n` is always small.
fn quickselect_kth(values: &mut [f64], k: usize) -> f64 {
    if values.len() <= 1 {
        return values[0];
    }
    let pivot = values[values.len() / 2];
    let (mut lo, mut hi) = (0usize, values.len() - 1);
    loop {
        while values[lo] < pivot {
            lo += 1;
        }
        while values[hi] > pivot {
            hi -= 1;
        }
        if lo >= hi {
            break;
        }
        values.swap(lo, hi);
        lo += 1;
        if hi == 0 {
            break;
        }
        hi -= 1;
    }
    let split = lo.max(1).min(values.len() - 1);
    if k < split {
        quickselect_kth(&mut values[..split], k)
    } else {
        quickselect_kth(&mut values[split..], k - split)
    }
}

/// Classify a window `[window_start, window_start + window_len)` of
/// segments, returning the surviving hammered intervals.
pub fn classify(
    detector: &Detector,
    config: &DetectorConfig,
    window_start: usize,
    window_len: usize,
) -> Vec<Interval> {
    if window_len == 0 {
        return Vec::new();
    }
    let scores: Vec<f64> = (0..window_len)
        .map(|i| detector.seg_count(window_start + i) as f64)
        .collect();

    let mut abs_scores: Vec<f64> = scores.iter().map(|s| s.abs()).collect();
    let rank = ((config.rank_threshold * window_len as f64).floor() as usize).min(window_len - 1);
    let cutoff = quickselect_kth(&mut abs_scores, rank).max(config.segment_threshold as f64);

    let mut result: Vec<Interval> = Vec::new();
    for (i, &score) in scores.iter().enumerate() {
        if score.abs() < cutoff {
            continue;
        }
        let seg = window_start + i;
        let insert_heavy = score > 0.0;
        match result.last_mut() {
            Some(run) if run.end() == seg && run.is_insert_heavy() == insert_heavy => {
                run.length += 1;
                run.weight += score;
            }
            Some(run) if run.end() == seg => {
                // Adjacent run of the opposite sign: cancel both immediately
                // instead of leaving a stale zero-weight interval behind.
                result.pop();
            }
            _ => {
                result.push(Interval { start: seg, length: 1, weight: score });
            }
        }
    }
    narrow_sequential_runs(result, detector, config, window_start, window_len)
}

/// Step 3 of §4.7 Weights: a segment whose forward or backward sequence
/// counter has reached `sequence_threshold` is mid a tight, boundary-local
/// run (e.g. a sequential fill converging on one fixed neighbour), not a
/// broad hammered region. Shrink any surviving interval that contains such
/// a segment down to the two positions either side of it, rather than
/// letting the full merged run (built purely from `seg_count`) claim
/// capacity across segments the sequential run never actually touches.
fn narrow_sequential_runs(
    intervals: Vec<Interval>,
    detector: &Detector,
    config: &DetectorConfig,
    window_start: usize,
    window_len: usize,
) -> Vec<Interval> {
    let window_end = window_start + window_len;
    intervals
        .into_iter()
        .map(|run| {
            if run.length <= 2 {
                return run;
            }
            let sequential_seg = (run.start..run.end()).find(|&seg| {
                detector.fwd_count(seg) >= config.sequence_threshold
                    || detector.bwd_count(seg) >= config.sequence_threshold
            });
            match sequential_seg {
                None => run,
                Some(seg) => {
                    // `bwd_count` fires while the run's successor stays
                    // fixed (an ascending fill closing in on the segment to
                    // its right); `fwd_count` fires while the predecessor
                    // stays fixed (a descending fill closing in on the
                    // segment to its left). Keep the pair of positions on
                    // that side, clipped to the window and the run.
                    let fwd_hot = detector.fwd_count(seg) >= config.sequence_threshold;
                    let (start, length) = if fwd_hot && seg > window_start {
                        (seg - 1, 2)
                    } else if seg + 1 < window_end {
                        (seg, 2)
                    } else if seg > window_start {
                        (seg - 1, 2)
                    } else {
                        (seg, 1)
                    };
                    Interval { start, length, weight: run.weight }
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::Event;

    fn hammer(detector: &mut Detector, seg: usize, times: i32, event: Event) {
        for _ in 0..times {
            detector.record(seg, event, None, None);
        }
    }

    #[test]
    fn quickselect_matches_sorted_order() {
        let mut v = vec![5.0, 1.0, 4.0, 2.0, 3.0];
        let k2 = quickselect_kth(&mut v.clone(), 2);
        assert_eq!(k2, 3.0);
        let k0 = quickselect_kth(&mut v, 0);
        assert_eq!(k0, 1.0);
    }

    #[test]
    fn single_hot_segment_forms_one_interval() {
        let cfg = DetectorConfig::default();
        let mut d = Detector::new(cfg, 8);
        hammer(&mut d, 3, 10, Event::Insert);
        let intervals = classify(&d, &cfg, 0, 8);
        assert_eq!(intervals.len(), 1);
        assert_eq!(intervals[0].start, 3);
        assert_eq!(intervals[0].length, 1);
        assert!(intervals[0].is_insert_heavy());
    }

    #[test]
    fn adjacent_same_sign_segments_merge() {
        let cfg = DetectorConfig::default();
        let mut d = Detector::new(cfg, 8);
        hammer(&mut d, 2, 10, Event::Insert);
        hammer(&mut d, 3, 10, Event::Insert);
        let intervals = classify(&d, &cfg, 0, 8);
        assert_eq!(intervals.len(), 1);
        assert_eq!(intervals[0], Interval { start: 2, length: 2, weight: 20.0 });
    }

    #[test]
    fn adjacent_opposite_sign_segments_cancel() {
        let cfg = DetectorConfig::default();
        let mut d = Detector::new(cfg, 8);
        hammer(&mut d, 2, 10, Event::Insert);
        hammer(&mut d, 3, 10, Event::Remove);
        let intervals = classify(&d, &cfg, 0, 8);
        assert!(intervals.is_empty());
    }

    #[test]
    fn quiet_window_yields_no_intervals() {
        let cfg = DetectorConfig::default();
        let d = Detector::new(cfg, 8);
        assert!(classify(&d, &cfg, 0, 8).is_empty());
    }

    #[test]
    fn strong_sequential_run_narrows_a_wider_merged_interval() {
        let cfg = DetectorConfig::default();
        let mut d = Detector::new(cfg, 8);
        // Three adjacent insert-heavy segments would normally merge into a
        // single width-3 interval...
        hammer(&mut d, 2, 10, Event::Insert);
        hammer(&mut d, 3, 10, Event::Insert);
        hammer(&mut d, 4, 10, Event::Insert);

        // ...but segment 3 is also converging on a fixed successor (an
        // ascending fill approaching segment 4), which should narrow the
        // run down to just the two positions either side of that boundary.
        d.record(3, Event::Insert, Some(1), Some(99));
        for _ in 0..cfg.sequence_threshold {
            d.record(3, Event::Insert, Some(2), Some(99));
        }
        assert!(d.bwd_count(3) >= cfg.sequence_threshold);

        let intervals = classify(&d, &cfg, 0, 8);
        assert_eq!(intervals.len(), 1);
        assert_eq!(intervals[0].start, 3);
        assert_eq!(intervals[0].length, 2);
    }
}
