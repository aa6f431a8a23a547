//! src/config.rs
//!
//! Environment-driven configuration. Mirrors the teacher's JSON-config
//! loading style (`Config::load` reading a single source of truth) but
//! follows spec section 6's environment table, which is env-var based
//! rather than file based for this component.

use std::env;
use std::time::Duration;

use crate::error::ConfigError;

#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub duplicate_window_ms: i64,
    pub min_profit_percentage: f64,
    pub max_profit_percentage: f64,
    pub max_opportunities: usize,
    pub opportunity_ttl_ms: i64,
    pub chain_ttl_overrides_ms: Vec<(&'static str, i64)>,
    pub startup_grace_period_ms: i64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub execution_stream_max_len: usize,
    pub execution_requests_stream: String,
    pub forwarding_dlq_stream: String,
    pub instance_id: String,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            duplicate_window_ms: 5_000,
            min_profit_percentage: -100.0,
            // Spec's Open Question on `maxProfitPercentage` is resolved to
            // 100 (percent), the variant with a stated rationale.
            max_profit_percentage: 100.0,
            max_opportunities: 10_000,
            opportunity_ttl_ms: 60_000,
            chain_ttl_overrides_ms: vec![
                ("arbitrum", 15_000),
                ("optimism", 15_000),
                ("base", 15_000),
                ("zksync", 15_000),
                ("linea", 15_000),
                ("solana", 10_000),
            ],
            startup_grace_period_ms: 15_000,
            max_retries: 3,
            retry_base_delay_ms: 10,
            execution_stream_max_len: 5_000,
            execution_requests_stream: "stream:execution-requests".to_string(),
            forwarding_dlq_stream: "stream:forwarding-dlq".to_string(),
            instance_id: "opportunity-router".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DetectionConfig {
    pub min_profit_threshold_percent: f64,
    pub max_triangular_depth: usize,
    pub opportunity_expiry_ms: i64,
    pub cross_chain_expiry_multiplier: u32,
    pub default_trade_value_usd: f64,
    pub cross_chain_enabled: bool,
    pub triangular_enabled: bool,
    pub price_staleness_ms: i64,
    pub bridge_fee_decimal: f64,
    pub latency_risk_premium_decimal: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_profit_threshold_percent: 0.5,
            max_triangular_depth: 3,
            opportunity_expiry_ms: 30_000,
            cross_chain_expiry_multiplier: 10,
            default_trade_value_usd: 10_000.0,
            cross_chain_enabled: true,
            triangular_enabled: true,
            price_staleness_ms: 5_000,
            bridge_fee_decimal: 0.001,
            latency_risk_premium_decimal: 0.002,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub redis_url: String,
    pub node_env: String,
    pub router: RouterConfig,
    pub detection: DetectionConfig,
    pub opportunities_stream: String,
}

impl CoordinatorConfig {
    /// Loads configuration from the environment, applying the production
    /// guards spec section 6 requires. `NODE_ENV=test` bypasses validation
    /// entirely, matching the spec's stated escape hatch for test runs.
    pub fn from_env() -> Result<Self, ConfigError> {
        let node_env = env::var("NODE_ENV").unwrap_or_else(|_| "development".to_string());
        let bypass_validation = node_env == "test";

        let redis_url = env::var("REDIS_URL").unwrap_or_default();
        if !bypass_validation {
            if redis_url.is_empty() {
                return Err(ConfigError::MissingEnv("REDIS_URL"));
            }
            validate_redis_url(&redis_url)?;
        }

        if node_env == "production" && !bypass_validation && redis_url.is_empty() {
            return Err(ConfigError::ProductionGuard(
                "REDIS_URL must be set in production".to_string(),
            ));
        }

        let mut router = RouterConfig::default();
        let mut detection = DetectionConfig::default();

        if let Ok(v) = env::var("MIN_PROFIT_THRESHOLD") {
            if let Ok(parsed) = v.parse() {
                detection.min_profit_threshold_percent = parsed;
            }
        }
        if let Ok(v) = env::var("MAX_TRIANGULAR_DEPTH") {
            if let Ok(parsed) = v.parse() {
                detection.max_triangular_depth = parsed;
            }
        }
        if let Ok(v) = env::var("OPPORTUNITY_EXPIRY_MS") {
            if let Ok(parsed) = v.parse() {
                detection.opportunity_expiry_ms = parsed;
                router.opportunity_ttl_ms = parsed;
            }
        }
        if let Ok(v) = env::var("SOLANA_DEFAULT_TRADE_VALUE_USD") {
            if let Ok(parsed) = v.parse() {
                detection.default_trade_value_usd = parsed;
            }
        }
        if let Ok(v) = env::var("CROSS_CHAIN_ENABLED") {
            detection.cross_chain_enabled = parse_bool_env(&v);
        }
        if let Ok(v) = env::var("TRIANGULAR_ENABLED") {
            detection.triangular_enabled = parse_bool_env(&v);
        }

        Ok(Self {
            redis_url,
            node_env,
            router,
            detection,
            opportunities_stream: "stream:opportunities".to_string(),
        })
    }

    pub fn startup_grace_period(&self) -> Duration {
        Duration::from_millis(self.router.startup_grace_period_ms as u64)
    }
}

fn parse_bool_env(v: &str) -> bool {
    matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

fn validate_redis_url(url: &str) -> Result<(), ConfigError> {
    let scheme = url
        .split_once("://")
        .map(|(scheme, _)| scheme)
        .ok_or_else(|| ConfigError::InvalidRedisUrl(url.to_string()))?;
    match scheme {
        "redis" | "rediss" | "redis+sentinel" => Ok(()),
        other => Err(ConfigError::UnsupportedRedisScheme(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_known_redis_schemes() {
        assert!(validate_redis_url("redis://localhost:6379").is_ok());
        assert!(validate_redis_url("rediss://localhost:6379").is_ok());
        assert!(validate_redis_url("redis+sentinel://localhost:26379").is_ok());
    }

    #[test]
    fn rejects_unknown_scheme() {
        assert!(matches!(
            validate_redis_url("http://localhost:6379"),
            Err(ConfigError::UnsupportedRedisScheme(_))
        ));
    }
}
