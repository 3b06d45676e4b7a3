//! Adaptive Packed Memory Array: a cache-conscious sorted index over
//! `i64` key/value pairs.
//!
//! The array is split into fixed-capacity segments kept individually
//! sorted and collectively gap-packed (§3); a dynamic-fanout
//! [`index::StaticIndex`] maps a key to its segment in `O(log_B N)`; a
//! per-segment [`detector::Detector`] tracks recent insert/remove pressure
//! so that a rebalance can widen toward wherever the traffic actually is
//! instead of always falling back to a uniform spread. See `DESIGN.md` for
//! how each piece traces back to its reference implementation.
//!
//! ```
//! use apma::Pma;
//!
//! let mut pma = Pma::new();
//! pma.insert(10, 100).unwrap();
//! pma.insert(5, 50).unwrap();
//! assert_eq!(pma.find(5), Some(50));
//! assert_eq!(pma.range(0, 10), vec![(5, 50), (10, 100)]);
//! ```

mod calibrator;
mod config;
mod detector;
mod error;
mod index;
mod logging;
mod partitions;
mod pma;
mod pool;
mod rewire;
mod spread;
mod storage;
mod weights;

pub use config::{DensityThresholds, DetectorConfig, PmaConfig};
pub use error::{PmaError, PmaResult};
pub use pma::{Pma, RebalanceState, SumResult};
