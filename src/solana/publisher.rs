//! src/solana/publisher.rs
//!
//! Publishes detected opportunities onto the shared opportunities stream.
//! Retry/backoff plus a self-disabling breaker on repeated failure, the
//! same staleness-then-refresh-under-failure shape as the reference bot's
//! fee cache, generalized from "serve stale data" to "stop publishing and
//! cool down."

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::time::{sleep, Duration};

use crate::model::opportunity::Opportunity;
use crate::model::wire::to_stream_fields;
use crate::streaming::{StreamClient, XaddOptions};
use crate::telemetry::metrics::Metrics;
use crate::telemetry::trace_context::TraceContext;

const MAX_ATTEMPTS: u32 = 3;
const BASE_DELAY_MS: u64 = 50;
const FAILURE_THRESHOLD: u64 = 10;
const COOLDOWN_MS: i64 = 60_000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PublishOutcome {
    Sent,
    Disabled,
    Failed,
}

pub struct OpportunityPublisher {
    stream_client: Arc<dyn StreamClient>,
    stream_name: String,
    max_len: usize,
    instance_id: String,
    consecutive_failures: AtomicU64,
    is_disabled: AtomicBool,
    disabled_at_ms: AtomicI64,
    metrics: Arc<Metrics>,
}

impl OpportunityPublisher {
    pub fn new(stream_client: Arc<dyn StreamClient>, stream_name: String, max_len: usize, instance_id: String, metrics: Arc<Metrics>) -> Self {
        Self {
            stream_client,
            stream_name,
            max_len,
            instance_id,
            consecutive_failures: AtomicU64::new(0),
            is_disabled: AtomicBool::new(false),
            disabled_at_ms: AtomicI64::new(0),
            metrics,
        }
    }

    /// While disabled, publishing is a no-op until `COOLDOWN_MS` elapses,
    /// at which point state resets and exactly one probe attempt is made.
    pub async fn publish_opportunity(&self, op: &Opportunity, now_ms: i64, trace: Option<&TraceContext>) -> PublishOutcome {
        if self.is_disabled.load(Ordering::Acquire) {
            let disabled_at = self.disabled_at_ms.load(Ordering::Acquire);
            if now_ms - disabled_at < COOLDOWN_MS {
                return PublishOutcome::Disabled;
            }
            self.is_disabled.store(false, Ordering::Release);
            self.consecutive_failures.store(0, Ordering::Release);
        }

        let fields: HashMap<String, String> = to_stream_fields(op, &self.instance_id, now_ms, trace);

        for attempt in 0..MAX_ATTEMPTS {
            let result = self
                .stream_client
                .xadd(&self.stream_name, "*", &fields, XaddOptions { max_len: Some(self.max_len), approximate: true })
                .await;

            match result {
                Ok(_) => {
                    self.consecutive_failures.store(0, Ordering::Release);
                    self.metrics.inc_publisher_sent();
                    return PublishOutcome::Sent;
                }
                Err(err) => {
                    tracing::warn!(attempt, error = %err, "opportunity publish attempt failed");
                    if attempt + 1 < MAX_ATTEMPTS {
                        sleep(Duration::from_millis(BASE_DELAY_MS * 2u64.pow(attempt))).await;
                    }
                }
            }
        }

        let failures = self.consecutive_failures.fetch_add(1, Ordering::AcqRel) + 1;
        if failures >= FAILURE_THRESHOLD {
            self.is_disabled.store(true, Ordering::Release);
            self.disabled_at_ms.store(now_ms, Ordering::Release);
            self.metrics.inc_publisher_disabled_events();
            tracing::error!("opportunity publisher disabled after {failures} consecutive failures");
        }
        PublishOutcome::Failed
    }

    pub fn is_disabled(&self) -> bool {
        self.is_disabled.load(Ordering::Acquire)
    }

    pub fn consecutive_failures(&self) -> u64 {
        self.consecutive_failures.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StreamError;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    struct FlakyClient {
        succeed_after: usize,
        calls: AtomicUsize,
        log: Mutex<Vec<()>>,
    }

    #[async_trait]
    impl StreamClient for FlakyClient {
        async fn xadd(&self, _stream: &str, _id: &str, _fields: &HashMap<String, String>, _options: XaddOptions) -> Result<String, StreamError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            self.log.lock().unwrap().push(());
            if n >= self.succeed_after {
                Ok("1-1".to_string())
            } else {
                Err(StreamError::Backend("down".to_string()))
            }
        }

        async fn advance_group_to_latest(&self, _stream: &str, _group: &str) -> Result<(), StreamError> {
            Ok(())
        }
    }

    fn sample_op() -> Opportunity {
        crate::solana::factory::OpportunityFactory::new(30_000, 10).build_intra_solana(
            0, "raydium", "orca", "SOL-USDC", "SOL", "USDC", 100.0, 101.0, 1.0,
        )
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures_within_max_attempts() {
        let client = Arc::new(FlakyClient { succeed_after: 2, calls: AtomicUsize::new(0), log: Mutex::new(Vec::new()) });
        let publisher = OpportunityPublisher::new(client, "stream:opportunities".to_string(), 5_000, "inst-1".to_string(), Metrics::new());
        let outcome = publisher.publish_opportunity(&sample_op(), 0, None).await;
        assert_eq!(outcome, PublishOutcome::Sent);
        assert_eq!(publisher.consecutive_failures(), 0);
    }

    #[tokio::test]
    async fn disables_after_failure_threshold() {
        let client = Arc::new(FlakyClient { succeed_after: usize::MAX, calls: AtomicUsize::new(0), log: Mutex::new(Vec::new()) });
        let publisher = OpportunityPublisher::new(client, "stream:opportunities".to_string(), 5_000, "inst-1".to_string(), Metrics::new());

        for i in 0..(FAILURE_THRESHOLD - 1) {
            let outcome = publisher.publish_opportunity(&sample_op(), i as i64, None).await;
            assert_eq!(outcome, PublishOutcome::Failed);
        }
        assert!(!publisher.is_disabled());
        let last = publisher.publish_opportunity(&sample_op(), 100, None).await;
        assert_eq!(last, PublishOutcome::Failed);
        assert!(publisher.is_disabled());
    }

    #[tokio::test]
    async fn stays_disabled_until_cooldown_elapses() {
        let client = Arc::new(FlakyClient { succeed_after: usize::MAX, calls: AtomicUsize::new(0), log: Mutex::new(Vec::new()) });
        let publisher = OpportunityPublisher::new(client, "stream:opportunities".to_string(), 5_000, "inst-1".to_string(), Metrics::new());
        for i in 0..FAILURE_THRESHOLD {
            publisher.publish_opportunity(&sample_op(), i as i64, None).await;
        }
        assert!(publisher.is_disabled());

        let outcome = publisher.publish_opportunity(&sample_op(), (FAILURE_THRESHOLD as i64) + 10, None).await;
        assert_eq!(outcome, PublishOutcome::Disabled);
    }
}
