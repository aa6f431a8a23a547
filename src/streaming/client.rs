//! src/streaming/client.rs
//!
//! The narrow boundary the router and publisher depend on. Consumer-group
//! reads and the transport's wire protocol live entirely outside this
//! crate; only the append and backlog-skip operations are needed here.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::StreamError;

#[derive(Debug, Clone, Copy, Default)]
pub struct XaddOptions {
    pub max_len: Option<usize>,
    pub approximate: bool,
}

#[async_trait]
pub trait StreamClient: Send + Sync {
    /// Appends `fields` to `stream`, returning the assigned message id.
    /// `id` is usually `"*"` (auto-assign).
    async fn xadd(
        &self,
        stream: &str,
        id: &str,
        fields: &HashMap<String, String>,
        options: XaddOptions,
    ) -> Result<String, StreamError>;

    /// Convenience wrapper applying the stream's configured MAXLEN.
    async fn xadd_with_limit(
        &self,
        stream: &str,
        fields: &HashMap<String, String>,
        max_len: usize,
    ) -> Result<String, StreamError> {
        self.xadd(
            stream,
            "*",
            fields,
            XaddOptions { max_len: Some(max_len), approximate: true },
        )
        .await
    }

    /// Advances `group`'s cursor on `stream` to `$` (the current tail),
    /// implementing the backlog-skip recovery path. Invoked by the external
    /// consumer loop after `OpportunityRouter::consecutive_expired` crosses
    /// its warn threshold; present here because it shares the same
    /// transport connection as `xadd`.
    async fn advance_group_to_latest(&self, stream: &str, group: &str) -> Result<(), StreamError>;
}
