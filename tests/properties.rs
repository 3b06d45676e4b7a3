//! Property-based tests over the public facade (§9 Testable Properties).
//!
//! Mirrors the teacher pack's use of `proptest` for randomised structural
//! tests rather than example-by-example unit tests: each property holds
//! for every sequence of operations, not just a hand-picked one.

use proptest::prelude::*;

use apma::{Pma, PmaConfig};

fn small_pma() -> Pma {
    Pma::with_config(PmaConfig { segment_capacity: 8, ..PmaConfig::default() }).unwrap()
}

proptest! {
    /// Invariant 1: every key inserted and not subsequently removed is
    /// findable, and its value is the most recently inserted one.
    #[test]
    fn find_reflects_the_last_write(keys in prop::collection::vec(0i64..500, 1..300)) {
        let mut pma = small_pma();
        let mut model = std::collections::HashMap::new();
        for (i, &k) in keys.iter().enumerate() {
            let v = i as i64;
            pma.insert(k, v).unwrap();
            model.insert(k, v);
        }
        for (&k, &v) in &model {
            prop_assert_eq!(pma.find(k), Some(v));
        }
    }

    /// Invariant 2: `len()` always matches the number of distinct keys
    /// inserted minus those removed.
    #[test]
    fn len_matches_model_cardinality(
        ops in prop::collection::vec((0i64..200, any::<bool>()), 1..400)
    ) {
        let mut pma = small_pma();
        let mut model = std::collections::HashSet::new();
        for (k, is_insert) in ops {
            if is_insert {
                pma.insert(k, k).unwrap();
                model.insert(k);
            } else {
                pma.remove(k).unwrap();
                model.remove(&k);
            }
        }
        prop_assert_eq!(pma.len(), model.len());
    }

    /// Invariant 3: a removed key is no longer findable, and removing it
    /// again is a harmless no-op.
    #[test]
    fn removed_keys_are_gone(keys in prop::collection::vec(0i64..300, 1..200)) {
        let mut pma = small_pma();
        for &k in &keys {
            pma.insert(k, k).unwrap();
        }
        for &k in &keys {
            let removed = pma.remove(k).unwrap();
            prop_assert_eq!(removed, Some(k));
            prop_assert_eq!(pma.find(k), None);
            prop_assert_eq!(pma.remove(k).unwrap(), None);
        }
        prop_assert_eq!(pma.len(), 0);
    }

    /// Invariant 4: `range` always returns entries in strictly ascending
    /// key order, every one of them inside the requested bounds.
    #[test]
    fn range_is_sorted_and_bounded(
        keys in prop::collection::vec(0i64..1000, 1..300),
        lo in 0i64..1000,
        width in 0i64..200,
    ) {
        let mut pma = small_pma();
        for &k in &keys {
            pma.insert(k, k).unwrap();
        }
        let hi = lo + width;
        let entries = pma.range(lo, hi);
        prop_assert!(entries.windows(2).all(|w| w[0].0 < w[1].0));
        prop_assert!(entries.iter().all(|&(k, _)| k >= lo && k <= hi));
    }

    /// Invariant 5: `sum` agrees with summing `range` by hand.
    #[test]
    fn sum_matches_range_total(
        keys in prop::collection::vec(0i64..500, 1..250),
        lo in 0i64..500,
        width in 0i64..200,
    ) {
        let mut pma = small_pma();
        for &k in &keys {
            pma.insert(k, k * 2).unwrap();
        }
        let hi = lo + width;
        let expected: i64 = pma.range(lo, hi).iter().map(|&(_, v)| v).sum();
        let result = pma.sum(lo, hi);
        prop_assert_eq!(result.sum, expected);
        prop_assert_eq!(result.count, pma.range(lo, hi).len());
    }

    /// Invariant 6: negative keys are always rejected and never become
    /// observable as entries.
    #[test]
    fn negative_keys_never_enter_the_structure(key in i64::MIN..0) {
        let mut pma = small_pma();
        prop_assert!(pma.insert(key, 0).is_err());
        prop_assert_eq!(pma.len(), 0);
    }
}
