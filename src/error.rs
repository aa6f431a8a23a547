//! src/error.rs

use thiserror::Error;

/// Fatal at startup; never recovered from inside the running coordinator.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("REDIS_URL has unsupported scheme `{0}`, expected redis:, rediss:, or redis+sentinel:")]
    UnsupportedRedisScheme(String),

    #[error("REDIS_URL is not a valid URL: {0}")]
    InvalidRedisUrl(String),

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },

    #[error("production configuration guard failed: {0}")]
    ProductionGuard(String),
}

/// Errors surfaced by a `StreamClient` implementation. These are recovered
/// locally by the router (retried, circuit-broken, or routed to the DLQ) and
/// never propagate to the stream-consumer loop.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("stream backend error: {0}")]
    Backend(String),

    #[error("stream client is shutting down")]
    ShuttingDown,
}

/// Raised when a detection kernel's read of the pool store turns out to have
/// been inconsistent; propagated to the engine's caller for visibility
/// rather than swallowed, with the breaker recording the failure first.
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("pool store snapshot is inconsistent: {0}")]
    InconsistentSnapshot(String),

    #[error("detection circuit breaker is open")]
    CircuitOpen,
}
