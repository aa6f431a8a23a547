//! src/model/wire.rs
//!
//! Two independent wire boundaries meet here:
//!
//! 1. **Ingest** — upstream detectors hand the router a duck-typed JSON
//!    object (`decode_incoming`). Fields are pulled out one at a time with
//!    explicit defaulting; anything we don't recognize is preserved in
//!    `Opportunity::extra` so forwarding stays lossless.
//! 2. **Forward** — the router and the Solana publisher both serialize an
//!    `Opportunity` into the flat string map the downstream streams expect
//!    (`to_stream_fields` / `from_stream_fields`). The OR-default vs.
//!    nullish-default split here is the one the specification's Open
//!    Questions section fixes: `type`/`chain`/`timestamp` substitute their
//!    default when the source value is empty or absent; every other
//!    optional string preserves an empty value rather than defaulting it.

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use serde_json::{Map, Value};

use super::chain;
use super::opportunity::{Opportunity, OpportunityStatus, OpportunityType};
use crate::telemetry::trace_context::TraceContext;

const KNOWN_INCOMING_KEYS: &[&str] = &[
    "id",
    "type",
    "chain",
    "sourceChain",
    "targetChain",
    "buyDex",
    "sellDex",
    "buyPair",
    "sellPair",
    "token0",
    "token1",
    "tokenIn",
    "tokenOut",
    "amountIn",
    "buyPrice",
    "sellPrice",
    "profitPercentage",
    "confidence",
    "timestamp",
    "expiresAt",
    "status",
    "blockNumber",
    "useFlashLoan",
    "pipelineTimestamps",
];

fn str_field(obj: &Map<String, Value>, key: &str) -> String {
    obj.get(key).and_then(Value::as_str).unwrap_or("").to_string()
}

fn opt_str_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_string)
}

fn f64_field(obj: &Map<String, Value>, key: &str, default: f64) -> f64 {
    obj.get(key).and_then(Value::as_f64).unwrap_or(default)
}

fn opt_f64_field(obj: &Map<String, Value>, key: &str) -> Option<f64> {
    obj.get(key).and_then(Value::as_f64)
}

fn opt_i64_field(obj: &Map<String, Value>, key: &str) -> Option<i64> {
    obj.get(key).and_then(Value::as_i64)
}

fn opt_bool_field(obj: &Map<String, Value>, key: &str) -> Option<bool> {
    obj.get(key).and_then(Value::as_bool)
}

/// Decodes an upstream, duck-typed opportunity payload into the canonical
/// record. Returns `None` only when `id` is missing, non-string, or empty —
/// every other field has an explicit default so malformed data degrades
/// gracefully instead of being rejected outright (chain/profit validation
/// happens one layer up, in the router).
pub fn decode_incoming(data: &Value, now_ms: i64) -> Option<Opportunity> {
    let obj = data.as_object()?;

    let id = obj.get("id").and_then(Value::as_str)?.to_string();
    if id.is_empty() {
        return None;
    }

    let kind = obj
        .get("type")
        .and_then(Value::as_str)
        .map(|s| OpportunityType::from_str(s).unwrap())
        .unwrap_or_default();

    // Non-string chain values are accepted as "absent" rather than rejected.
    let chain_raw = opt_str_field(obj, "chain");

    let timestamp = match obj.get("timestamp").and_then(Value::as_f64) {
        Some(n) if n.is_finite() => n as i64,
        _ => now_ms,
    };

    let status = obj
        .get("status")
        .and_then(Value::as_str)
        .and_then(|s| OpportunityStatus::from_str(s).ok());

    let pipeline_timestamps: BTreeMap<String, i64> = obj
        .get("pipelineTimestamps")
        .and_then(Value::as_object)
        .map(|m| {
            m.iter()
                .filter_map(|(k, v)| v.as_i64().map(|n| (k.clone(), n)))
                .collect()
        })
        .unwrap_or_default();

    let mut extra = Map::new();
    for (k, v) in obj {
        if !KNOWN_INCOMING_KEYS.contains(&k.as_str()) {
            extra.insert(k.clone(), v.clone());
        }
    }

    Some(Opportunity {
        id,
        kind,
        chain: chain_raw,
        source_chain: opt_str_field(obj, "sourceChain"),
        target_chain: opt_str_field(obj, "targetChain"),
        buy_dex: str_field(obj, "buyDex"),
        sell_dex: str_field(obj, "sellDex"),
        buy_pair: str_field(obj, "buyPair"),
        sell_pair: str_field(obj, "sellPair"),
        token0: str_field(obj, "token0"),
        token1: str_field(obj, "token1"),
        token_in: opt_str_field(obj, "tokenIn"),
        token_out: opt_str_field(obj, "tokenOut"),
        amount_in: str_field(obj, "amountIn"),
        buy_price: f64_field(obj, "buyPrice", 0.0),
        sell_price: f64_field(obj, "sellPrice", 0.0),
        profit_percentage: opt_f64_field(obj, "profitPercentage"),
        confidence: f64_field(obj, "confidence", 0.0),
        timestamp,
        expires_at: opt_i64_field(obj, "expiresAt"),
        status,
        block_number: opt_i64_field(obj, "blockNumber"),
        use_flash_loan: opt_bool_field(obj, "useFlashLoan"),
        pipeline_timestamps,
        extra,
    })
}

/// Normalizes `chain` per spec step 4.5.5, returning the canonical id when
/// recognized, `Ok(None)` when absent, and `Err(())` when present-but-not-
/// whitelisted (the router rejects on `Err`).
pub fn normalize_record_chain(raw: Option<&str>) -> Result<Option<String>, ()> {
    match raw {
        None => Ok(None),
        Some(s) => chain::normalize_chain(s).map(Some).ok_or(()),
    }
}

/// Serializes an opportunity into the flat string map the execution-request
/// and opportunities streams expect.
pub fn to_stream_fields(
    op: &Opportunity,
    forwarded_by: &str,
    now_ms: i64,
    trace: Option<&TraceContext>,
) -> HashMap<String, String> {
    let mut fields = HashMap::new();

    let type_str = op.kind.to_string();
    fields.insert(
        "type".to_string(),
        if type_str.is_empty() { "simple".to_string() } else { type_str },
    );

    let chain_str = op.chain.clone().unwrap_or_default();
    fields.insert(
        "chain".to_string(),
        if chain_str.is_empty() { "unknown".to_string() } else { chain_str },
    );

    let ts = if op.timestamp == 0 { now_ms } else { op.timestamp };

    fields.insert("id".to_string(), op.id.clone());
    fields.insert("buyDex".to_string(), op.buy_dex.clone());
    fields.insert("sellDex".to_string(), op.sell_dex.clone());
    fields.insert(
        "profitPercentage".to_string(),
        op.profit_percentage.map(|p| p.to_string()).unwrap_or_else(|| "0".to_string()),
    );
    fields.insert("confidence".to_string(), op.confidence.to_string());
    fields.insert("timestamp".to_string(), ts.to_string());
    fields.insert(
        "expiresAt".to_string(),
        op.expires_at.map(|e| e.to_string()).unwrap_or_default(),
    );
    fields.insert("tokenIn".to_string(), op.token_in.clone().unwrap_or_default());
    fields.insert("tokenOut".to_string(), op.token_out.clone().unwrap_or_default());
    fields.insert("amountIn".to_string(), op.amount_in.clone());
    fields.insert("forwardedBy".to_string(), forwarded_by.to_string());
    fields.insert("forwardedAt".to_string(), now_ms.to_string());

    if !op.pipeline_timestamps.is_empty() {
        if let Ok(json) = serde_json::to_string(&op.pipeline_timestamps) {
            fields.insert("pipelineTimestamps".to_string(), json);
        }
    }

    if let Some(t) = trace {
        fields.insert("_trace_traceId".to_string(), t.trace_id.clone());
        fields.insert("_trace_spanId".to_string(), t.span_id.clone());
        if let Some(parent) = &t.parent_span_id {
            fields.insert("_trace_parentSpanId".to_string(), parent.clone());
        }
        fields.insert("_trace_serviceName".to_string(), t.service_name.clone());
        fields.insert("_trace_timestamp".to_string(), t.timestamp_ms.to_string());
    }

    fields
}

/// Inverse of `to_stream_fields`, used to validate the round-trip law: every
/// recognized field survives, `type`/`chain`/`timestamp` resolve to their
/// default iff the input was empty or missing, and other optional strings
/// preserve an empty value instead of defaulting.
pub fn from_stream_fields(fields: &HashMap<String, String>, now_ms: i64) -> Opportunity {
    let get = |k: &str| fields.get(k).cloned().unwrap_or_default();

    let type_raw = get("type");
    let kind = if type_raw.is_empty() {
        OpportunityType::Simple
    } else {
        OpportunityType::from_str(&type_raw).unwrap()
    };

    let chain_raw = get("chain");
    let chain = if chain_raw.is_empty() { "unknown".to_string() } else { chain_raw };

    let timestamp = fields
        .get("timestamp")
        .and_then(|s| s.parse::<i64>().ok())
        .filter(|&t| t != 0)
        .unwrap_or(now_ms);

    let expires_at = fields.get("expiresAt").and_then(|s| {
        if s.is_empty() {
            None
        } else {
            s.parse::<i64>().ok()
        }
    });

    let pipeline_timestamps: BTreeMap<String, i64> = fields
        .get("pipelineTimestamps")
        .and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or_default();

    Opportunity {
        id: get("id"),
        kind,
        chain: Some(chain),
        source_chain: None,
        target_chain: None,
        buy_dex: get("buyDex"),
        sell_dex: get("sellDex"),
        buy_pair: String::new(),
        sell_pair: String::new(),
        token0: String::new(),
        token1: String::new(),
        token_in: Some(get("tokenIn")),
        token_out: Some(get("tokenOut")),
        amount_in: get("amountIn"),
        buy_price: 0.0,
        sell_price: 0.0,
        profit_percentage: fields.get("profitPercentage").and_then(|s| s.parse().ok()),
        confidence: fields.get("confidence").and_then(|s| s.parse().ok()).unwrap_or(0.0),
        timestamp,
        expires_at,
        status: None,
        block_number: None,
        use_flash_loan: None,
        pipeline_timestamps,
        extra: Map::new(),
    }
}
