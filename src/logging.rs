//! Thin logging macros wrapping `tracing`.
//!
//! The teacher codebase's logging module branches on `target_arch = "wasm32"`
//! to fall back to the browser console; this crate never targets the
//! browser, so the macros here are a straight pass-through to `tracing`.
//! Kept as macros (rather than calling `tracing::info!` etc. directly) so
//! call sites read uniformly and so the wasm branch could be reintroduced
//! without touching call sites, matching the shape of the pattern this was
//! adapted from.

/// Emit a `trace`-level event: rebalance state machine steps, window scans.
macro_rules! pma_trace {
    ($($arg:tt)*) => {
        tracing::trace!($($arg)*)
    };
}

/// Emit a `debug`-level event: resize decisions, fallback from rewiring.
macro_rules! pma_debug {
    ($($arg:tt)*) => {
        tracing::debug!($($arg)*)
    };
}

/// Emit an `info`-level event: construction, resizes.
macro_rules! pma_info {
    ($($arg:tt)*) => {
        tracing::info!($($arg)*)
    };
}

/// Emit a `warn`-level event: recovered allocation failures.
macro_rules! pma_warn {
    ($($arg:tt)*) => {
        tracing::warn!($($arg)*)
    };
}

pub(crate) use pma_debug;
pub(crate) use pma_info;
pub(crate) use pma_trace;
pub(crate) use pma_warn;
