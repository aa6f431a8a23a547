//! src/telemetry/trace_context.rs
//!
//! Trace-context propagation attached to forwarded opportunities
//! (`_trace_traceId`, `_trace_spanId`, ...). The coordinator doesn't own a
//! tracer; it just carries whatever context the caller supplies through to
//! the downstream stream.

use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct TraceContext {
    pub trace_id: String,
    pub span_id: String,
    pub parent_span_id: Option<String>,
    pub service_name: String,
    pub timestamp_ms: i64,
}

impl TraceContext {
    pub fn new_root(service_name: impl Into<String>, now_ms: i64) -> Self {
        Self {
            trace_id: Uuid::new_v4().to_string(),
            span_id: Uuid::new_v4().to_string(),
            parent_span_id: None,
            service_name: service_name.into(),
            timestamp_ms: now_ms,
        }
    }

    pub fn child(&self, now_ms: i64) -> Self {
        Self {
            trace_id: self.trace_id.clone(),
            span_id: Uuid::new_v4().to_string(),
            parent_span_id: Some(self.span_id.clone()),
            service_name: self.service_name.clone(),
            timestamp_ms: now_ms,
        }
    }
}
