//! src/router/router.rs
//!
//! `OpportunityRouter`: the hardest subsystem. Dedup, validation, storage,
//! expiry bookkeeping, and the forward-with-retry path. Grounded on the
//! reference bot's `execution::executor::TransactionExecutor::run` event
//! loop shape (internal queue + retries + a `Metrics` handle) and on the
//! Redis `StreamClient` idiom used by the cross-chain ingress tracker.

use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::time::{sleep, Duration};

use crate::config::RouterConfig;
use crate::model::opportunity::{Opportunity, OpportunityStatus};
use crate::model::wire::{decode_incoming, normalize_record_chain, to_stream_fields};
use crate::reliability::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::router::dlq_fallback::DlqFallback;
use crate::streaming::{StreamClient, XaddOptions};
use crate::telemetry::metrics::Metrics;
use crate::telemetry::trace_context::TraceContext;

pub const CONSECUTIVE_EXPIRED_WARN_THRESHOLD: u64 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertSeverity {
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertType {
    ExecutionCircuitOpen,
    ExecutionForwardFailed,
}

#[derive(Debug, Clone)]
pub struct Alert {
    pub kind: AlertType,
    pub severity: AlertSeverity,
    pub opportunity_id: String,
}

#[derive(Debug, Serialize)]
struct DlqEntry<'a> {
    #[serde(rename = "opportunityId")]
    opportunity_id: &'a str,
    #[serde(rename = "originalData")]
    original_data: Value,
    error: &'a str,
    #[serde(rename = "errorStack", skip_serializing_if = "Option::is_none")]
    error_stack: Option<&'a str>,
    #[serde(rename = "failedAt")]
    failed_at: i64,
    service: &'a str,
    #[serde(rename = "instanceId")]
    instance_id: &'a str,
    #[serde(rename = "targetStream")]
    target_stream: &'a str,
}

pub struct OpportunityRouter {
    config: RouterConfig,
    stream_client: Option<Arc<dyn StreamClient>>,
    breaker: CircuitBreaker,
    opportunities: Mutex<HashMap<String, Opportunity>>,
    metrics: Arc<Metrics>,
    consecutive_expired: AtomicU64,
    total_opportunities: AtomicU64,
    total_executions: AtomicU64,
    shutting_down: Arc<AtomicBool>,
    created_at_ms: i64,
    dlq_fallback: DlqFallback,
    alerts: broadcast::Sender<Alert>,
}

impl OpportunityRouter {
    pub fn new(config: RouterConfig, stream_client: Option<Arc<dyn StreamClient>>, metrics: Arc<Metrics>, created_at_ms: i64, dlq_fallback_dir: impl Into<std::path::PathBuf>) -> Self {
        let (alerts, _) = broadcast::channel(64);
        Self {
            config,
            stream_client,
            breaker: CircuitBreaker::new(CircuitBreakerConfig { failure_threshold: 5, cooldown: Duration::from_secs(30) }),
            opportunities: Mutex::new(HashMap::new()),
            metrics,
            consecutive_expired: AtomicU64::new(0),
            total_opportunities: AtomicU64::new(0),
            total_executions: AtomicU64::new(0),
            shutting_down: Arc::new(AtomicBool::new(false)),
            created_at_ms,
            dlq_fallback: DlqFallback::new(dlq_fallback_dir),
            alerts,
        }
    }

    pub fn subscribe_alerts(&self) -> broadcast::Receiver<Alert> {
        self.alerts.subscribe()
    }

    pub fn total_opportunities(&self) -> u64 {
        self.total_opportunities.load(Ordering::Relaxed)
    }

    pub fn total_executions(&self) -> u64 {
        self.total_executions.load(Ordering::Relaxed)
    }

    pub fn consecutive_expired(&self) -> u64 {
        self.consecutive_expired.load(Ordering::Relaxed)
    }

    pub fn reset_consecutive_expired(&self) {
        self.consecutive_expired.store(0, Ordering::Relaxed);
    }

    pub fn get(&self, id: &str) -> Option<Opportunity> {
        self.opportunities.lock().unwrap().get(id).cloned()
    }

    pub fn size(&self) -> usize {
        self.opportunities.lock().unwrap().len()
    }

    /// Step-numbered per the specification's `processOpportunity` contract.
    pub async fn process_opportunity(&self, data: &Value, is_leader: bool, trace: Option<&TraceContext>, now_ms: i64) -> bool {
        // 1 & 2: require a non-empty id; resolve timestamp.
        let incoming = match decode_incoming(data, now_ms) {
            Some(op) => op,
            None => {
                tracing::debug!("rejected opportunity: missing or empty id");
                return false;
            }
        };

        // 3: dedupe within the duplicate window.
        {
            let opportunities = self.opportunities.lock().unwrap();
            if let Some(existing) = opportunities.get(&incoming.id) {
                if (existing.timestamp - incoming.timestamp).abs() < self.config.duplicate_window_ms {
                    self.metrics.inc_duplicate();
                    tracing::debug!(id = %incoming.id, "rejected duplicate opportunity");
                    return false;
                }
            }
        }

        // 4: profit bounds.
        if let Some(p) = incoming.profit_percentage {
            if p < self.config.min_profit_percentage {
                self.metrics.inc_rejected();
                tracing::warn!(id = %incoming.id, profit = p, "rejected: profit below minimum");
                return false;
            }
            if p > self.config.max_profit_percentage {
                self.metrics.inc_rejected();
                tracing::warn!(id = %incoming.id, profit = p, "rejected: profit above maximum");
                return false;
            }
        }

        // 5: chain whitelist; missing chain accepted.
        let mut incoming = incoming;
        match normalize_record_chain(incoming.chain.as_deref()) {
            Ok(normalized) => incoming.chain = normalized,
            Err(()) => {
                self.metrics.inc_rejected();
                tracing::warn!(id = %incoming.id, chain = ?incoming.chain, "rejected: unknown chain");
                return false;
            }
        }

        // 6: store.
        {
            let mut opportunities = self.opportunities.lock().unwrap();
            opportunities.insert(incoming.id.clone(), incoming.clone());
        }
        self.total_opportunities.fetch_add(1, Ordering::Relaxed);
        self.metrics.inc_ingested();

        // 7: expiry pre-forward gate.
        if incoming.is_expired_at(now_ms) {
            self.metrics.inc_expired_on_arrival();
            let count = self.consecutive_expired.fetch_add(1, Ordering::Relaxed) + 1;
            if count == CONSECUTIVE_EXPIRED_WARN_THRESHOLD || (count > CONSECUTIVE_EXPIRED_WARN_THRESHOLD && count % 100 == 0) {
                tracing::warn!(count, "consecutive expired opportunities crossed warn threshold");
            }
            return true;
        }

        // 8: recovery.
        if self.consecutive_expired.load(Ordering::Relaxed) > 0 {
            tracing::info!(id = %incoming.id, "fresh opportunity after expired streak, resetting counter");
            self.reset_consecutive_expired();
        }

        // 9: forward gate.
        let status = incoming.effective_status();
        if is_leader && status == OpportunityStatus::Pending {
            self.forward_to_execution_engine(&incoming, trace, now_ms).await;
        } else {
            let reason = if !is_leader { "not_leader" } else { "status_not_pending" };
            tracing::debug!(id = %incoming.id, reason, "not forwarding");
        }

        true
    }

    async fn forward_to_execution_engine(&self, op: &Opportunity, trace: Option<&TraceContext>, now_ms: i64) {
        let stream_client = match &self.stream_client {
            Some(client) => client.clone(),
            None => {
                tracing::warn!(id = %op.id, "no stream client configured, cannot forward");
                return;
            }
        };

        if now_ms - self.created_at_ms < self.config.startup_grace_period_ms {
            tracing::debug!(id = %op.id, "deferring forward during startup grace period");
            return;
        }

        if self.breaker.is_open(now_ms) {
            self.metrics.inc_dropped();
            self.write_to_dlq(op, "Circuit breaker open", None, now_ms).await;
            return;
        }

        let mut op = op.clone();
        op.stamp_coordinator_at(now_ms);
        let fields = to_stream_fields(&op, &self.config.instance_id, now_ms, trace);

        for attempt in 0..self.config.max_retries {
            if self.shutting_down.load(Ordering::Acquire) {
                self.metrics.inc_dropped();
                return;
            }

            let result = stream_client
                .xadd(
                    &self.config.execution_requests_stream,
                    "*",
                    &fields,
                    XaddOptions { max_len: Some(self.config.execution_stream_max_len), approximate: true },
                )
                .await;

            match result {
                Ok(_) => {
                    self.breaker.record_success();
                    self.total_executions.fetch_add(1, Ordering::Relaxed);
                    self.metrics.inc_executions_forwarded();
                    return;
                }
                Err(err) => {
                    let just_opened = self.breaker.record_failure(now_ms);
                    if just_opened {
                        let _ = self.alerts.send(Alert { kind: AlertType::ExecutionCircuitOpen, severity: AlertSeverity::High, opportunity_id: op.id.clone() });
                        tracing::error!(id = %op.id, error = %err, "execution circuit breaker opened");
                        break;
                    }
                    if self.breaker.is_open(now_ms) {
                        break;
                    }
                    sleep(Duration::from_millis(self.config.retry_base_delay_ms * 2u64.pow(attempt))).await;
                }
            }
        }

        self.metrics.inc_dropped();
        tracing::error!(id = %op.id, "forward retries exhausted");
        self.write_to_dlq(&op, "forward retries exhausted", None, now_ms).await;
        if !self.breaker.is_open(now_ms) {
            let _ = self.alerts.send(Alert { kind: AlertType::ExecutionForwardFailed, severity: AlertSeverity::High, opportunity_id: op.id.clone() });
        }
    }

    async fn write_to_dlq(&self, op: &Opportunity, error: &str, error_stack: Option<&str>, now_ms: i64) {
        let original_data = serde_json::to_value(op).unwrap_or(Value::Null);
        let entry = DlqEntry {
            opportunity_id: &op.id,
            original_data,
            error,
            error_stack,
            failed_at: now_ms,
            service: "opportunity-router",
            instance_id: &self.config.instance_id,
            target_stream: &self.config.execution_requests_stream,
        };

        if let Some(client) = &self.stream_client {
            let json = serde_json::to_string(&entry).unwrap_or_default();
            let mut fields = HashMap::new();
            fields.insert("entry".to_string(), json);
            let result = client
                .xadd(&self.config.forwarding_dlq_stream, "*", &fields, XaddOptions { max_len: None, approximate: true })
                .await;
            if result.is_ok() {
                self.metrics.inc_dlq_writes();
                return;
            }
            tracing::error!(id = %op.id, "dlq stream write failed, falling back to local file");
        }

        let line = serde_json::to_string(&entry).unwrap_or_default();
        match self.dlq_fallback.append(&line, now_ms).await {
            Ok(()) => self.metrics.inc_dlq_fallback_writes(),
            Err(err) => {
                self.metrics.inc_dlq_fallback_failures();
                tracing::error!(id = %op.id, error = %err, "dlq fallback file append failed, giving up");
            }
        }
    }

    /// Three phases: mark expired, delete, then bounded-k eviction of the
    /// oldest entries if still over `maxOpportunities`. Returns the total
    /// number removed.
    pub fn cleanup_expired_opportunities(&self, now_ms: i64) -> usize {
        let mut opportunities = self.opportunities.lock().unwrap();

        let expired: Vec<String> = opportunities
            .iter()
            .filter(|(_, op)| self.is_expired(op, now_ms))
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            opportunities.remove(id);
        }
        let mut removed = expired.len();

        if opportunities.len() > self.config.max_opportunities {
            let k = opportunities.len() - self.config.max_opportunities;
            let oldest_ids = smallest_k_timestamps(&opportunities, k);
            for id in oldest_ids {
                opportunities.remove(&id);
                removed += 1;
            }
        }

        removed
    }

    fn is_expired(&self, op: &Opportunity, now_ms: i64) -> bool {
        if let Some(expires_at) = op.expires_at {
            return expires_at < now_ms;
        }
        let ttl = op
            .chain
            .as_deref()
            .and_then(|c| self.config.chain_ttl_overrides_ms.iter().find(|(name, _)| *name == c).map(|(_, ttl)| *ttl))
            .unwrap_or(self.config.opportunity_ttl_ms);
        now_ms - op.timestamp > ttl
    }

    pub fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::Release);
    }
}

/// Returns the ids of the `k` entries with the smallest `timestamp`, using
/// a bounded max-heap of size `k`: O(n log k) time, O(k) memory.
fn smallest_k_timestamps(opportunities: &HashMap<String, Opportunity>, k: usize) -> Vec<String> {
    if k == 0 {
        return Vec::new();
    }
    let mut heap: BinaryHeap<(i64, String)> = BinaryHeap::with_capacity(k + 1);
    for (id, op) in opportunities.iter() {
        heap.push((op.timestamp, id.clone()));
        if heap.len() > k {
            heap.pop();
        }
    }
    heap.into_iter().map(|(_, id)| id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StreamError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    struct RecordingClient {
        calls: AtomicUsize,
        fail_until: usize,
    }

    #[async_trait]
    impl StreamClient for RecordingClient {
        async fn xadd(&self, _stream: &str, _id: &str, _fields: &HashMap<String, String>, _options: XaddOptions) -> Result<String, StreamError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_until {
                Err(StreamError::Backend("down".to_string()))
            } else {
                Ok("1-1".to_string())
            }
        }
        async fn advance_group_to_latest(&self, _stream: &str, _group: &str) -> Result<(), StreamError> {
            Ok(())
        }
    }

    fn router_with(client: Option<Arc<dyn StreamClient>>) -> OpportunityRouter {
        let dir = std::env::temp_dir().join(format!("router-test-{}", uuid::Uuid::new_v4()));
        OpportunityRouter::new(RouterConfig::default(), client, Metrics::new(), 0, dir)
    }

    #[tokio::test]
    async fn happy_path_stores_and_forwards() {
        let client = Arc::new(RecordingClient { calls: AtomicUsize::new(0), fail_until: 0 });
        let router = router_with(Some(client));
        let data = json!({"id": "o1", "chain": "ethereum", "profitPercentage": 2.5, "status": "pending"});

        let accepted = router.process_opportunity(&data, true, None, 100_000).await;
        assert!(accepted);
        assert!(router.get("o1").is_some());
        assert_eq!(router.total_executions(), 1);
    }

    #[tokio::test]
    async fn circuit_open_routes_to_dlq_instead_of_forwarding() {
        let client = Arc::new(RecordingClient { calls: AtomicUsize::new(0), fail_until: usize::MAX });
        let router = router_with(Some(client));
        for _ in 0..5 {
            router.breaker.record_failure(100_000);
        }
        let data = json!({"id": "o1", "chain": "ethereum", "status": "pending"});
        router.process_opportunity(&data, true, None, 100_000).await;
        assert_eq!(router.total_executions(), 0);
    }

    #[tokio::test]
    async fn retry_succeeds_after_transient_failures() {
        let client = Arc::new(RecordingClient { calls: AtomicUsize::new(0), fail_until: 2 });
        let router = router_with(Some(client));
        let data = json!({"id": "o1", "chain": "ethereum", "status": "pending"});
        let accepted = router.process_opportunity(&data, true, None, 100_000).await;
        assert!(accepted);
        assert_eq!(router.total_executions(), 1);
    }

    #[tokio::test]
    async fn retry_exhaustion_drops_and_writes_dlq() {
        let client = Arc::new(RecordingClient { calls: AtomicUsize::new(0), fail_until: usize::MAX });
        let router = router_with(Some(client));
        let data = json!({"id": "o1", "chain": "ethereum", "status": "pending"});
        router.process_opportunity(&data, true, None, 100_000).await;
        assert_eq!(router.total_executions(), 0);
    }

    #[tokio::test]
    async fn duplicate_within_window_is_rejected() {
        let router = router_with(None);
        let data = json!({"id": "o1", "chain": "ethereum", "status": "pending", "timestamp": 100_000});
        router.process_opportunity(&data, false, None, 100_000).await;
        let accepted = router.process_opportunity(&data, false, None, 101_000).await;
        assert!(!accepted);
    }

    #[tokio::test]
    async fn expired_on_arrival_is_stored_but_not_forwarded() {
        let client = Arc::new(RecordingClient { calls: AtomicUsize::new(0), fail_until: 0 });
        let router = router_with(Some(client));
        let data = json!({"id": "o1", "chain": "ethereum", "status": "pending", "timestamp": 0, "expiresAt": 10});
        let accepted = router.process_opportunity(&data, true, None, 100_000).await;
        assert!(accepted);
        assert_eq!(router.total_executions(), 0);
        assert_eq!(router.consecutive_expired(), 1);
    }

    #[tokio::test]
    async fn unknown_chain_is_rejected() {
        let router = router_with(None);
        let data = json!({"id": "o1", "chain": "dogechain"});
        assert!(!router.process_opportunity(&data, false, None, 0).await);
    }

    #[test]
    fn cleanup_removes_expired_and_then_oldest_over_capacity() {
        let router = router_with(None);
        {
            let mut opportunities = router.opportunities.lock().unwrap();
            for i in 0..5i64 {
                let op = Opportunity {
                    id: format!("o{i}"),
                    kind: Default::default(),
                    chain: Some("ethereum".to_string()),
                    source_chain: None,
                    target_chain: None,
                    buy_dex: String::new(),
                    sell_dex: String::new(),
                    buy_pair: String::new(),
                    sell_pair: String::new(),
                    token0: String::new(),
                    token1: String::new(),
                    token_in: None,
                    token_out: None,
                    amount_in: String::new(),
                    buy_price: 0.0,
                    sell_price: 0.0,
                    profit_percentage: None,
                    confidence: 0.0,
                    timestamp: i * 1_000,
                    expires_at: None,
                    status: None,
                    block_number: None,
                    use_flash_loan: None,
                    pipeline_timestamps: Default::default(),
                    extra: Default::default(),
                };
                opportunities.insert(op.id.clone(), op);
            }
        }
        let mut router = router;
        router.config.max_opportunities = 3;
        router.config.opportunity_ttl_ms = 1_000_000;

        let removed = router.cleanup_expired_opportunities(10_000);
        assert_eq!(removed, 2);
        assert_eq!(router.size(), 3);
        assert!(router.get("o0").is_none());
        assert!(router.get("o1").is_none());
    }
}
