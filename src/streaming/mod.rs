//! src/streaming/mod.rs

pub mod client;
pub mod redis_client;

pub use client::{StreamClient, XaddOptions};
pub use redis_client::RedisStreamClient;
