//! src/router/cleanup.rs
//!
//! Periodic driver for `OpportunityRouter::cleanup_expired_opportunities`.
//! Owns its own background task the same way the Solana engine's price-feed
//! subscription owns one: a stored `JoinHandle` that `stop()` aborts.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};

use crate::clock::now_ms;
use crate::router::router::OpportunityRouter;

pub struct CleanupScheduler {
    handle: Option<JoinHandle<()>>,
}

impl CleanupScheduler {
    pub fn new() -> Self {
        Self { handle: None }
    }

    /// Starts (or restarts) the periodic cleanup loop at `interval_ms`.
    pub fn start(&mut self, router: Arc<OpportunityRouter>, interval_ms: u64) {
        self.stop();
        let handle = tokio::spawn(async move {
            let mut ticker = interval(Duration::from_millis(interval_ms));
            loop {
                ticker.tick().await;
                let removed = router.cleanup_expired_opportunities(now_ms());
                if removed > 0 {
                    tracing::debug!(removed, "cleanup pass removed expired opportunities");
                }
            }
        });
        self.handle = Some(handle);
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Default for CleanupScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CleanupScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouterConfig;
    use crate::telemetry::metrics::Metrics;
    use serde_json::json;
    use std::time::Duration as StdDuration;

    #[tokio::test]
    async fn periodic_cleanup_removes_expired_entries() {
        let dir = std::env::temp_dir().join(format!("cleanup-test-{}", uuid::Uuid::new_v4()));
        let router = Arc::new(OpportunityRouter::new(RouterConfig::default(), None, Metrics::new(), 0, dir));
        let data = json!({"id": "o1", "chain": "ethereum", "status": "pending", "timestamp": 0, "expiresAt": 10});
        router.process_opportunity(&data, false, None, 20).await;
        assert_eq!(router.size(), 1);

        let mut scheduler = CleanupScheduler::new();
        scheduler.start(router.clone(), 10);
        tokio::time::sleep(StdDuration::from_millis(50)).await;
        scheduler.stop();

        assert_eq!(router.size(), 0);
    }
}
