//! Error types for the APMA core.
//!
//! Mirrors the error taxonomy of §7/§8 of the design document: invalid
//! construction parameters are the only variants a caller is expected to
//! handle; resource exhaustion during a rebalance is propagated rather than
//! panicking; contract violations are reserved for `debug_assert!`-guarded
//! invariant checks and never constructed in release builds.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type PmaResult<T> = std::result::Result<T, PmaError>;

/// Errors produced by the APMA core.
#[derive(Error, Debug)]
pub enum PmaError {
    /// `segment_capacity` fell outside `[8, 65535]` after rounding to a
    /// power of two.
    #[error("segment capacity {0} is out of the allowed range [8, 65535]")]
    InvalidSegmentCapacity(usize),

    /// `node_fanout` was smaller than 3.
    #[error("node fanout {0} must be at least 3")]
    InvalidNodeFanout(usize),

    /// The density thresholds did not satisfy
    /// `ρ_1 ≤ ρ_H < τ_H ≤ τ_1` and `2ρ_h ≤ τ_h`.
    #[error("invalid density thresholds: {0}")]
    InvalidThresholds(String),

    /// A scratch allocation needed to carry out a rebalance could not be
    /// satisfied. The PMA is left in the state it was in before the call.
    #[error("failed to allocate {requested} bytes of rebalance scratch space")]
    RebalanceAllocation {
        /// Number of bytes requested.
        requested: usize,
    },

    /// A rewiring extent could not be mapped.
    #[error("failed to acquire a rewiring extent of {size} bytes: {reason}")]
    RewireAllocation {
        /// Size of the extent, in bytes.
        size: usize,
        /// Underlying OS error or other description.
        reason: String,
    },

    /// An internal invariant was violated. Only ever constructed from
    /// `debug_assert!`-guarded paths; release builds trust the invariant
    /// instead of checking it.
    #[error("internal contract violation: {0}")]
    CorruptState(String),

    /// A caller tried to insert a negative key. Negative values are
    /// reserved as the empty-slot sentinel (§6 Non-goals) and can never be
    /// real entries.
    #[error("key {0} is negative; negative keys are reserved as the empty-slot sentinel")]
    NegativeKey(i64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_non_empty() {
        let err = PmaError::InvalidNodeFanout(2);
        assert!(!err.to_string().is_empty());
    }
}
