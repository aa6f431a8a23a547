//! src/reliability/circuit_breaker.rs
//!
//! Shared three-phase failure gate used by both the router's forward path
//! and the Solana engine's detection gating. "Half-open" is deliberately
//! *not* a stored third state — it's derived from `open && cooldown
//! elapsed`, per the specification's resolved Open Question. That keeps a
//! single boolean plus a timestamp as the entire mutable state, which is
//! all a probe-after-cooldown breaker actually needs.

use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Default)]
struct State {
    failures: u32,
    open: bool,
    last_failure_ms: Option<i64>,
    opened_at_ms: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircuitBreakerStatus {
    pub open: bool,
    pub failures: u32,
    pub last_failure_time: Option<i64>,
    pub in_half_open_state: bool,
}

pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: Mutex<State>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: Mutex::new(State::default()),
        }
    }

    fn cooldown_elapsed(&self, state: &State, now_ms: i64) -> bool {
        match state.opened_at_ms {
            Some(opened_at) => (now_ms - opened_at) as u64 >= self.config.cooldown.as_millis() as u64,
            None => false,
        }
    }

    /// Resets the failure count and closes the breaker.
    pub fn record_success(&self) {
        let mut state = self.state.lock().unwrap();
        state.failures = 0;
        state.open = false;
        state.opened_at_ms = None;
    }

    /// Records a failure, returning `true` if this call just tripped the
    /// breaker open (i.e. crossed the threshold for the first time).
    pub fn record_failure(&self, now_ms: i64) -> bool {
        let mut state = self.state.lock().unwrap();
        state.failures += 1;
        state.last_failure_ms = Some(now_ms);
        if !state.open && state.failures >= self.config.failure_threshold {
            state.open = true;
            state.opened_at_ms = Some(now_ms);
            true
        } else {
            false
        }
    }

    /// Whether forwarding/detection should be gated right now. Once the
    /// cooldown elapses the gate opens for exactly one probe attempt; the
    /// caller's subsequent `record_success`/`record_failure` call decides
    /// whether the breaker actually closes.
    pub fn is_open(&self, now_ms: i64) -> bool {
        let state = self.state.lock().unwrap();
        state.open && !self.cooldown_elapsed(&state, now_ms)
    }

    pub fn status(&self, now_ms: i64) -> CircuitBreakerStatus {
        let state = self.state.lock().unwrap();
        CircuitBreakerStatus {
            open: state.open,
            failures: state.failures,
            last_failure_time: state.last_failure_ms,
            in_half_open_state: state.open && self.cooldown_elapsed(&state, now_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 3,
            cooldown: Duration::from_millis(100),
        })
    }

    #[test]
    fn opens_after_threshold_failures() {
        let cb = breaker();
        assert!(!cb.record_failure(0));
        assert!(!cb.record_failure(1));
        assert!(cb.record_failure(2));
        assert!(cb.is_open(2));
        assert_eq!(cb.status(2).failures, 3);
    }

    #[test]
    fn half_open_after_cooldown_then_recloses_on_success() {
        let cb = breaker();
        cb.record_failure(0);
        cb.record_failure(0);
        cb.record_failure(0);
        assert!(cb.is_open(50));
        assert!(!cb.status(50).in_half_open_state);

        assert!(!cb.is_open(200));
        assert!(cb.status(200).in_half_open_state);

        cb.record_success();
        assert!(!cb.is_open(200));
        assert_eq!(cb.status(200).failures, 0);
    }

    #[test]
    fn success_resets_failure_count_before_threshold() {
        let cb = breaker();
        cb.record_failure(0);
        cb.record_success();
        assert_eq!(cb.status(0).failures, 0);
        assert!(!cb.record_failure(1));
    }
}
