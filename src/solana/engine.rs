//! src/solana/engine.rs
//!
//! `SolanaArbitrageEngine`: owns the pool store, the opportunity factory,
//! the detection circuit breaker, and the publisher, and exposes the pool
//! ingestion contract. Composition mirrors the reference bot's
//! `TransactionExecutor` — one struct aggregating store, service handles,
//! metrics, and a queue behind a handful of async entry points.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, mpsc};

use crate::config::DetectionConfig;
use crate::error::DetectionError;
use crate::reliability::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStatus};
use crate::solana::detection::cross_chain::EvmPriceUpdate;
use crate::solana::detection::{cross_chain, intra, triangular, DetectionResult};
use crate::solana::factory::OpportunityFactory;
use crate::solana::normalize::{normalize_for_pricing, sanitize_symbol};
use crate::solana::pool_store::{pair_key, Pool, PoolStore, TokenInfo};
use crate::solana::publisher::OpportunityPublisher;
use crate::telemetry::metrics::Metrics;

/// Minimum interval between accepted `set`s for the same address.
const POOL_UPDATE_COOLDOWN_MS: i64 = 100;
const LATENCY_WINDOW_CAPACITY: usize = 100;

#[derive(Debug, Clone)]
pub struct RawPool {
    pub address: String,
    pub program_id: String,
    pub dex: String,
    pub token0_mint: String,
    pub token0_symbol: String,
    pub token0_decimals: u8,
    pub token1_mint: String,
    pub token1_symbol: String,
    pub token1_decimals: u8,
    pub fee_bps: i64,
    pub reserve0: f64,
    pub reserve1: f64,
    pub price: f64,
    pub last_updated: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AddPoolOutcome {
    Inserted { evicted: Option<String>, price_changed: bool },
    RateLimited,
    InvalidAddress,
    InvalidFee,
    EmptySymbolAfterSanitize,
}

/// Messages accepted from an external price source. `PoolRemoved` and pool
/// payloads both carry `chain` so the adapter can reject cross-chain
/// traffic that doesn't belong to this engine.
#[derive(Debug, Clone)]
pub enum SourceMessage {
    PoolUpdate { chain: String, pool: RawPool },
    PriceUpdate { chain: String, pool: RawPool },
    PoolRemoved { chain: String, address: String },
}

#[derive(Debug, Clone)]
pub enum EngineEvent {
    PriceUpdate { address: String, price: f64 },
}

fn is_valid_address(address: &str) -> bool {
    if address.contains(':') {
        // Permissive synthesized test format, e.g. "pool:sol-usdc:1".
        return !address.is_empty();
    }
    let len = address.len();
    (32..=44).contains(&len) && bs58::decode(address).into_vec().is_ok()
}

pub struct SolanaArbitrageEngine {
    chain: String,
    store: PoolStore,
    factory: OpportunityFactory,
    detection_config: DetectionConfig,
    breaker: CircuitBreaker,
    publisher: OpportunityPublisher,
    metrics: Arc<Metrics>,
    cooldowns: Mutex<HashMap<String, i64>>,
    latency_window_ms: Mutex<VecDeque<i64>>,
    events: broadcast::Sender<EngineEvent>,
    subscription: Mutex<Option<tokio::task::JoinHandle<()>>>,
    last_detection_version: AtomicI64,
}

impl SolanaArbitrageEngine {
    pub fn new(
        chain: impl Into<String>,
        max_pool_store_size: usize,
        detection_config: DetectionConfig,
        breaker_config: CircuitBreakerConfig,
        publisher: OpportunityPublisher,
        metrics: Arc<Metrics>,
    ) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            chain: chain.into(),
            store: PoolStore::new(max_pool_store_size),
            factory: OpportunityFactory::new(detection_config.opportunity_expiry_ms, detection_config.cross_chain_expiry_multiplier),
            detection_config,
            breaker: CircuitBreaker::new(breaker_config),
            publisher,
            metrics,
            cooldowns: Mutex::new(HashMap::new()),
            latency_window_ms: Mutex::new(VecDeque::with_capacity(LATENCY_WINDOW_CAPACITY)),
            events,
            subscription: Mutex::new(None),
            last_detection_version: AtomicI64::new(-1),
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    pub fn pool_store(&self) -> &PoolStore {
        &self.store
    }

    pub fn circuit_breaker_status(&self, now_ms: i64) -> CircuitBreakerStatus {
        self.breaker.status(now_ms)
    }

    /// Pool ingestion contract: rate-limit, validate, sanitize, normalize,
    /// persist, and emit a price-update event on change.
    pub fn add_pool(&self, raw: RawPool, now_ms: i64) -> AddPoolOutcome {
        {
            let mut cooldowns = self.cooldowns.lock().unwrap();
            if let Some(&last) = cooldowns.get(&raw.address) {
                if now_ms - last < POOL_UPDATE_COOLDOWN_MS {
                    return AddPoolOutcome::RateLimited;
                }
            }
            cooldowns.insert(raw.address.clone(), now_ms);
        }

        if !is_valid_address(&raw.address) {
            return AddPoolOutcome::InvalidAddress;
        }
        if !(0..=10_000).contains(&raw.fee_bps) {
            return AddPoolOutcome::InvalidFee;
        }

        let sanitized0 = match sanitize_symbol(&raw.token0_symbol) {
            Some(s) => s,
            None => return AddPoolOutcome::EmptySymbolAfterSanitize,
        };
        let sanitized1 = match sanitize_symbol(&raw.token1_symbol) {
            Some(s) => s,
            None => return AddPoolOutcome::EmptySymbolAfterSanitize,
        };
        let normalized0 = normalize_for_pricing(&sanitized0);
        let normalized1 = normalize_for_pricing(&sanitized1);
        let key = pair_key(&normalized0, &normalized1);

        let previous_price = self.store.get(&raw.address).map(|p| p.price);
        let price_changed = previous_price.map(|p| (p - raw.price).abs() > f64::EPSILON).unwrap_or(true);

        let pool = Pool {
            address: raw.address.clone(),
            program_id: raw.program_id,
            dex: raw.dex,
            token0: TokenInfo { mint: raw.token0_mint, symbol: sanitized0, decimals: raw.token0_decimals },
            token1: TokenInfo { mint: raw.token1_mint, symbol: sanitized1, decimals: raw.token1_decimals },
            fee_bps: raw.fee_bps as u16,
            reserve0: raw.reserve0,
            reserve1: raw.reserve1,
            price: raw.price,
            last_updated: raw.last_updated.unwrap_or(now_ms),
            normalized_token0: normalized0,
            normalized_token1: normalized1,
            pair_key: key,
        };

        let (_, evicted) = self.store.set(pool);
        if let Some(evicted_addr) = &evicted {
            self.metrics.inc_pool_store_evictions();
            self.cooldowns.lock().unwrap().remove(evicted_addr);
        }
        self.metrics.add_pools_loaded(1);

        if price_changed {
            let _ = self.events.send(EngineEvent::PriceUpdate { address: raw.address, price: raw.price });
        }

        AddPoolOutcome::Inserted { evicted, price_changed }
    }

    pub fn remove_pool(&self, address: &str) -> bool {
        self.cooldowns.lock().unwrap().remove(address);
        self.store.delete(address)
    }

    /// Drops cooldown entries whose window has already elapsed. Called on
    /// every detection cycle so the map never grows past the set of
    /// addresses updated within the last `POOL_UPDATE_COOLDOWN_MS`.
    fn prune_cooldowns(&self, now_ms: i64) {
        self.cooldowns.lock().unwrap().retain(|_, &mut last| now_ms - last < POOL_UPDATE_COOLDOWN_MS);
    }

    fn record_latency(&self, elapsed_ms: i64) {
        let mut window = self.latency_window_ms.lock().unwrap();
        if window.len() == LATENCY_WINDOW_CAPACITY {
            window.pop_front();
        }
        window.push_back(elapsed_ms);
    }

    pub fn average_detection_latency_ms(&self) -> f64 {
        let window = self.latency_window_ms.lock().unwrap();
        if window.is_empty() {
            return 0.0;
        }
        window.iter().sum::<i64>() as f64 / window.len() as f64
    }

    /// Runs a detection kernel behind the circuit breaker: `[]` immediately
    /// if open. Otherwise runs the kernel, measuring elapsed wall-clock time
    /// for the latency window and comparing the pool store's version before
    /// and after the run — a version change means another thread mutated
    /// the store mid-detection, so the snapshot the kernel read from was
    /// inconsistent. That failure is recorded on the breaker and re-thrown,
    /// same as any other detection exception; a clean run records success.
    fn gated<F>(&self, now_ms: i64, run: F) -> Result<DetectionResult, DetectionError>
    where
        F: FnOnce() -> DetectionResult,
    {
        if self.breaker.is_open(now_ms) {
            return Ok(DetectionResult::default());
        }
        let version_before = self.store.version();
        let started = crate::clock::now_ms();
        let result = run();
        self.record_latency((crate::clock::now_ms() - started).max(0));
        let version_after = self.store.version();

        if version_after != version_before {
            self.breaker.record_failure(now_ms);
            return Err(DetectionError::InconsistentSnapshot(format!(
                "pool store version changed from {version_before} to {version_after} during detection"
            )));
        }

        self.breaker.record_success();
        self.metrics.inc_detection_runs();
        Ok(result)
    }

    pub fn detect_intra(&self, now_ms: i64) -> Result<DetectionResult, DetectionError> {
        self.gated(now_ms, || intra::detect(&self.store, &self.factory, &self.detection_config, now_ms))
    }

    pub fn detect_triangular(&self, now_ms: i64) -> Result<DetectionResult, DetectionError> {
        if !self.detection_config.triangular_enabled {
            return Ok(DetectionResult::default());
        }
        self.gated(now_ms, || triangular::detect(&self.store, &self.factory, &self.detection_config, now_ms))
    }

    pub fn detect_cross_chain(&self, now_ms: i64, update: &EvmPriceUpdate) -> Result<DetectionResult, DetectionError> {
        self.gated(now_ms, || cross_chain::detect(&self.store, &self.factory, &self.detection_config, now_ms, update))
    }

    /// Runs intra-DEX and (if enabled) triangular detection, publishing
    /// every opportunity found. Returns the combined result; a detection
    /// exception propagates to the caller rather than being swallowed here.
    pub async fn run_detection_cycle(&self, now_ms: i64) -> Result<DetectionResult, DetectionError> {
        self.prune_cooldowns(now_ms);

        let mut combined = self.detect_intra(now_ms)?;
        let triangular = self.detect_triangular(now_ms)?;
        combined.opportunities.extend(triangular.opportunities);
        combined.stale_pools_skipped += triangular.stale_pools_skipped;
        combined.paths_explored = triangular.paths_explored;

        for op in &combined.opportunities {
            self.publisher.publish_opportunity(op, now_ms, None).await;
        }
        Ok(combined)
    }

    /// Tears down any previous subscription before wiring a new one, per
    /// the spec's "must tear down previously registered handlers before
    /// re-subscribing" requirement.
    pub fn connect_to_price_updates(self: &Arc<Self>, mut source: mpsc::Receiver<SourceMessage>) {
        self.stop();
        let engine = Arc::clone(self);
        let handle = tokio::spawn(async move {
            while let Some(message) = source.recv().await {
                engine.handle_source_message(message);
            }
        });
        *self.subscription.lock().unwrap() = Some(handle);
    }

    pub fn stop(&self) {
        if let Some(handle) = self.subscription.lock().unwrap().take() {
            handle.abort();
        }
    }

    fn handle_source_message(&self, message: SourceMessage) {
        let now_ms = crate::clock::now_ms();
        match message {
            SourceMessage::PoolUpdate { chain, pool } | SourceMessage::PriceUpdate { chain, pool } => {
                if chain != self.chain {
                    tracing::debug!(chain = %chain, expected = %self.chain, "dropping price update for foreign chain");
                    return;
                }
                self.add_pool(pool, now_ms);
            }
            SourceMessage::PoolRemoved { chain, address } => {
                if chain != self.chain {
                    return;
                }
                self.remove_pool(&address);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streaming::{StreamClient, XaddOptions};
    use async_trait::async_trait;

    struct NoopClient;
    #[async_trait]
    impl StreamClient for NoopClient {
        async fn xadd(&self, _s: &str, _i: &str, _f: &HashMap<String, String>, _o: XaddOptions) -> Result<String, crate::error::StreamError> {
            Ok("1-1".to_string())
        }
        async fn advance_group_to_latest(&self, _s: &str, _g: &str) -> Result<(), crate::error::StreamError> {
            Ok(())
        }
    }

    fn engine() -> SolanaArbitrageEngine {
        let publisher = OpportunityPublisher::new(Arc::new(NoopClient), "stream:opportunities".to_string(), 5_000, "inst".to_string(), Metrics::new());
        SolanaArbitrageEngine::new("solana", 100, DetectionConfig::default(), CircuitBreakerConfig::default(), publisher, Metrics::new())
    }

    fn raw_pool(address: &str, price: f64) -> RawPool {
        RawPool {
            address: address.to_string(),
            program_id: "prog".to_string(),
            dex: "raydium".to_string(),
            token0_mint: "m0".to_string(),
            token0_symbol: "SOL".to_string(),
            token0_decimals: 9,
            token1_mint: "m1".to_string(),
            token1_symbol: "USDC".to_string(),
            token1_decimals: 6,
            fee_bps: 25,
            reserve0: 1_000.0,
            reserve1: 100_000.0,
            price,
            last_updated: None,
        }
    }

    #[test]
    fn rejects_updates_within_cooldown_window() {
        let engine = engine();
        let addr = "4k3Dyjzvzp8eJSxCJvhRgvsLgLxQkiQgGjTmUULdmEPz";
        assert!(matches!(engine.add_pool(raw_pool(addr, 100.0), 0), AddPoolOutcome::Inserted { .. }));
        assert_eq!(engine.add_pool(raw_pool(addr, 101.0), 50), AddPoolOutcome::RateLimited);
        assert!(matches!(engine.add_pool(raw_pool(addr, 101.0), 150), AddPoolOutcome::Inserted { .. }));
    }

    #[test]
    fn rejects_invalid_address_and_fee() {
        let engine = engine();
        assert_eq!(engine.add_pool(raw_pool("too-short", 100.0), 0), AddPoolOutcome::InvalidAddress);

        let mut bad_fee = raw_pool("4k3Dyjzvzp8eJSxCJvhRgvsLgLxQkiQgGjTmUULdmEPz", 100.0);
        bad_fee.fee_bps = 20_000;
        assert_eq!(engine.add_pool(bad_fee, 0), AddPoolOutcome::InvalidFee);
    }

    #[test]
    fn synthesized_test_address_format_is_accepted() {
        let engine = engine();
        let outcome = engine.add_pool(raw_pool("pool:sol-usdc:1", 100.0), 0);
        assert!(matches!(outcome, AddPoolOutcome::Inserted { .. }));
    }

    #[test]
    fn circuit_breaker_gate_short_circuits_detection() {
        let engine = engine();
        for i in 0..CircuitBreakerConfig::default().failure_threshold {
            engine.breaker.record_failure(i as i64);
        }
        let result = engine.detect_intra(0).unwrap();
        assert!(result.opportunities.is_empty());
    }

    #[test]
    fn cooldowns_are_pruned_once_their_window_elapses() {
        let engine = engine();
        engine.add_pool(raw_pool("4k3Dyjzvzp8eJSxCJvhRgvsLgLxQkiQgGjTmUULdmEPz", 100.0), 0);
        assert_eq!(engine.cooldowns.lock().unwrap().len(), 1);
        engine.prune_cooldowns(0);
        assert_eq!(engine.cooldowns.lock().unwrap().len(), 1, "window hasn't elapsed yet");
        engine.prune_cooldowns(POOL_UPDATE_COOLDOWN_MS);
        assert_eq!(engine.cooldowns.lock().unwrap().len(), 0);
    }

    #[test]
    fn evicting_a_pool_drops_its_cooldown_entry() {
        let engine = engine();
        let addr = "4k3Dyjzvzp8eJSxCJvhRgvsLgLxQkiQgGjTmUULdmEPz";
        engine.add_pool(raw_pool(addr, 100.0), 0);
        assert!(engine.remove_pool(addr));
        assert!(engine.cooldowns.lock().unwrap().get(addr).is_none());
    }
}
