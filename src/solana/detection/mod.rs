//! src/solana/detection/mod.rs
//!
//! The three detection kernels. Each is a pure function over a `PoolStore`
//! snapshot, mirroring the reference bot's `arbitrage::calc_arb` shape —
//! no shared mutable state, so callers can run them on a blocking worker
//! task without synchronization.

pub mod cross_chain;
pub mod intra;
pub mod triangular;

use crate::model::opportunity::Opportunity;

/// Result of a single detection pass.
#[derive(Debug, Clone, Default)]
pub struct DetectionResult {
    pub opportunities: Vec<Opportunity>,
    pub stale_pools_skipped: usize,
    /// Only populated by the triangular kernel.
    pub paths_explored: Option<usize>,
}
