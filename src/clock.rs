//! src/clock.rs
//!
//! The one place that reads the wall clock. Everything else takes `now_ms`
//! as a parameter so tests can drive time explicitly.

use std::time::{SystemTime, UNIX_EPOCH};

pub fn now_ms() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).expect("system clock before epoch").as_millis() as i64
}
