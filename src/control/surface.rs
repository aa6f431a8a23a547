//! src/control/surface.rs
//!
//! Read-only status surface for an external collaborator (an HTTP health
//! endpoint, a CLI `status` command) to poll without taking any lock the
//! hot paths hold. `ArcSwap` gives lock-free reads of the latest snapshot;
//! `refresh` is the only writer and is expected to run on the same cadence
//! as the cleanup scheduler.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::reliability::circuit_breaker::CircuitBreakerStatus;
use crate::router::OpportunityRouter;
use crate::solana::engine::SolanaArbitrageEngine;
use crate::telemetry::metrics::Metrics;

#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub taken_at_ms: i64,
    pub router_size: usize,
    pub total_opportunities: u64,
    pub total_executions: u64,
    pub consecutive_expired: u64,
    pub pool_store_size: usize,
    pub average_detection_latency_ms: f64,
    pub detection_circuit: CircuitBreakerStatus,
}

pub struct ControlSurface {
    router: Arc<OpportunityRouter>,
    engine: Arc<SolanaArbitrageEngine>,
    metrics: Arc<Metrics>,
    snapshot: ArcSwap<StatusSnapshot>,
}

impl ControlSurface {
    pub fn new(router: Arc<OpportunityRouter>, engine: Arc<SolanaArbitrageEngine>, metrics: Arc<Metrics>, now_ms: i64) -> Self {
        let initial = build_snapshot(&router, &engine, now_ms);
        Self { router, engine, metrics, snapshot: ArcSwap::from_pointee(initial) }
    }

    /// Lock-free read of the most recently published snapshot. Never blocks
    /// on the router's or engine's internal mutexes.
    pub fn snapshot(&self) -> Arc<StatusSnapshot> {
        self.snapshot.load_full()
    }

    pub fn refresh(&self, now_ms: i64) {
        let next = build_snapshot(&self.router, &self.engine, now_ms);
        self.snapshot.store(Arc::new(next));
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}

fn build_snapshot(router: &OpportunityRouter, engine: &SolanaArbitrageEngine, now_ms: i64) -> StatusSnapshot {
    StatusSnapshot {
        taken_at_ms: now_ms,
        router_size: router.size(),
        total_opportunities: router.total_opportunities(),
        total_executions: router.total_executions(),
        consecutive_expired: router.consecutive_expired(),
        pool_store_size: engine.pool_store().size(),
        average_detection_latency_ms: engine.average_detection_latency_ms(),
        detection_circuit: engine.circuit_breaker_status(now_ms),
    }
}
