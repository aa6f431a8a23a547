//! src/streaming/redis_client.rs
//!
//! `StreamClient` backed by a real Redis connection, grounded on the
//! `async-trait` + `redis::aio::MultiplexedConnection` idiom used elsewhere
//! in the retrieved pack's Redis-backed stores.

use std::collections::HashMap;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tokio::sync::Mutex;

use super::client::{StreamClient, XaddOptions};
use crate::error::StreamError;

pub struct RedisStreamClient {
    conn: Mutex<MultiplexedConnection>,
}

impl RedisStreamClient {
    pub async fn connect(redis_url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn from_connection(conn: MultiplexedConnection) -> Self {
        Self { conn: Mutex::new(conn) }
    }
}

#[async_trait]
impl StreamClient for RedisStreamClient {
    async fn xadd(
        &self,
        stream: &str,
        id: &str,
        fields: &HashMap<String, String>,
        options: XaddOptions,
    ) -> Result<String, StreamError> {
        let items: Vec<(&String, &String)> = fields.iter().collect();
        let mut conn = self.conn.lock().await;

        let result: redis::RedisResult<String> = match options.max_len {
            Some(max_len) => {
                let mut cmd = redis::cmd("XADD");
                cmd.arg(stream).arg("MAXLEN");
                if options.approximate {
                    cmd.arg("~");
                } else {
                    cmd.arg("=");
                }
                cmd.arg(max_len).arg(id);
                for (k, v) in items {
                    cmd.arg(k).arg(v);
                }
                cmd.query_async(&mut *conn).await
            }
            None => conn.xadd(stream, id, &items).await,
        };

        result.map_err(|e| StreamError::Backend(e.to_string()))
    }

    async fn advance_group_to_latest(&self, stream: &str, group: &str) -> Result<(), StreamError> {
        let mut conn = self.conn.lock().await;
        redis::cmd("XGROUP")
            .arg("SETID")
            .arg(stream)
            .arg(group)
            .arg("$")
            .query_async::<()>(&mut *conn)
            .await
            .map_err(|e| StreamError::Backend(e.to_string()))
    }
}
