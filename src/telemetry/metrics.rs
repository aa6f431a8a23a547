//! src/telemetry/metrics.rs
//!
//! Process-lifetime counters, mirroring the shape of an atomics-based
//! metrics struct: plain `Arc<AtomicU64>` fields plus `inc_*` helpers that
//! encapsulate the memory ordering. No exporter lives here — the HTTP
//! control surface that would expose these is an external collaborator;
//! this struct is the thing it would read from.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug)]
pub struct Metrics {
    pub opportunities_ingested: AtomicU64,
    pub opportunities_duplicate: AtomicU64,
    pub opportunities_rejected: AtomicU64,
    pub opportunities_expired_on_arrival: AtomicU64,
    pub opportunities_dropped: AtomicU64,
    pub executions_forwarded: AtomicU64,
    pub dlq_writes: AtomicU64,
    pub dlq_fallback_writes: AtomicU64,
    pub dlq_fallback_failures: AtomicU64,
    pub pools_loaded: AtomicU64,
    pub pool_store_evictions: AtomicU64,
    pub detection_runs: AtomicU64,
    pub detection_errors: AtomicU64,
    pub publisher_sent: AtomicU64,
    pub publisher_disabled_events: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new_raw()
    }
}

impl Metrics {
    fn new_raw() -> Self {
        Self {
            opportunities_ingested: AtomicU64::new(0),
            opportunities_duplicate: AtomicU64::new(0),
            opportunities_rejected: AtomicU64::new(0),
            opportunities_expired_on_arrival: AtomicU64::new(0),
            opportunities_dropped: AtomicU64::new(0),
            executions_forwarded: AtomicU64::new(0),
            dlq_writes: AtomicU64::new(0),
            dlq_fallback_writes: AtomicU64::new(0),
            dlq_fallback_failures: AtomicU64::new(0),
            pools_loaded: AtomicU64::new(0),
            pool_store_evictions: AtomicU64::new(0),
            detection_runs: AtomicU64::new(0),
            detection_errors: AtomicU64::new(0),
            publisher_sent: AtomicU64::new(0),
            publisher_disabled_events: AtomicU64::new(0),
        }
    }

    pub fn new() -> Arc<Self> {
        Arc::new(Self::new_raw())
    }

    fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_ingested(&self) {
        Self::inc(&self.opportunities_ingested);
    }
    pub fn inc_duplicate(&self) {
        Self::inc(&self.opportunities_duplicate);
    }
    pub fn inc_rejected(&self) {
        Self::inc(&self.opportunities_rejected);
    }
    pub fn inc_expired_on_arrival(&self) {
        Self::inc(&self.opportunities_expired_on_arrival);
    }
    pub fn inc_dropped(&self) {
        Self::inc(&self.opportunities_dropped);
    }
    pub fn inc_executions_forwarded(&self) {
        Self::inc(&self.executions_forwarded);
    }
    pub fn inc_dlq_writes(&self) {
        Self::inc(&self.dlq_writes);
    }
    pub fn inc_dlq_fallback_writes(&self) {
        Self::inc(&self.dlq_fallback_writes);
    }
    pub fn inc_dlq_fallback_failures(&self) {
        Self::inc(&self.dlq_fallback_failures);
    }
    pub fn add_pools_loaded(&self, count: u64) {
        self.pools_loaded.fetch_add(count, Ordering::Relaxed);
    }
    pub fn inc_pool_store_evictions(&self) {
        Self::inc(&self.pool_store_evictions);
    }
    pub fn inc_detection_runs(&self) {
        Self::inc(&self.detection_runs);
    }
    pub fn inc_detection_errors(&self) {
        Self::inc(&self.detection_errors);
    }
    pub fn inc_publisher_sent(&self) {
        Self::inc(&self.publisher_sent);
    }
    pub fn inc_publisher_disabled_events(&self) {
        Self::inc(&self.publisher_disabled_events);
    }
}
