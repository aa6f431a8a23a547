//! src/solana/factory.rs
//!
//! `OpportunityFactory`: builds the three Solana-engine opportunity
//! variants with unique, ordered ids and type-fixed confidence.

use std::sync::atomic::{AtomicU64, Ordering};

use rand::Rng;
use serde_json::Map;
use std::collections::BTreeMap;

use crate::model::opportunity::{Opportunity, OpportunityType};

/// One pool traversal in a triangular-detection path.
#[derive(Debug, Clone)]
pub struct TriangularHop {
    pub from: String,
    pub to: String,
    pub dex: String,
    pub pool_address: String,
}

const INTRA_CONFIDENCE: f64 = 0.85;
const TRIANGULAR_CONFIDENCE: f64 = 0.75;
const CROSS_CHAIN_CONFIDENCE: f64 = 0.60;

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap()
}

pub struct OpportunityFactory {
    process_prefix: String,
    counter: AtomicU64,
    expiry_ms: i64,
    cross_chain_expiry_multiplier: u32,
}

impl OpportunityFactory {
    pub fn new(expiry_ms: i64, cross_chain_expiry_multiplier: u32) -> Self {
        let mut rng = rand::thread_rng();
        let prefix_seed: u64 = rng.gen();
        Self {
            process_prefix: to_base36(prefix_seed % 36u64.pow(6)),
            counter: AtomicU64::new(0),
            expiry_ms,
            cross_chain_expiry_multiplier,
        }
    }

    fn next_id(&self, kind: &str) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("sol-{kind}-{}-{}", self.process_prefix, to_base36(n))
    }

    fn base(&self, kind_str: &'static str, kind: OpportunityType, now_ms: i64, confidence: f64, expires_in_ms: i64) -> Opportunity {
        Opportunity {
            id: self.next_id(kind_str),
            kind,
            chain: Some("solana".to_string()),
            source_chain: None,
            target_chain: None,
            buy_dex: String::new(),
            sell_dex: String::new(),
            buy_pair: String::new(),
            sell_pair: String::new(),
            token0: String::new(),
            token1: String::new(),
            token_in: None,
            token_out: None,
            amount_in: String::new(),
            buy_price: 0.0,
            sell_price: 0.0,
            profit_percentage: Some(0.0),
            confidence,
            timestamp: now_ms,
            expires_at: Some(now_ms + expires_in_ms),
            status: None,
            block_number: None,
            use_flash_loan: None,
            pipeline_timestamps: BTreeMap::from([("detectedAt".to_string(), now_ms)]),
            extra: Map::new(),
        }
    }

    pub fn build_intra_solana(
        &self,
        now_ms: i64,
        buy_dex: &str,
        sell_dex: &str,
        pair_key: &str,
        token0: &str,
        token1: &str,
        buy_price: f64,
        sell_price: f64,
        net_profit_percent: f64,
    ) -> Opportunity {
        let mut op = self.base("intra", OpportunityType::IntraSolana, now_ms, INTRA_CONFIDENCE, self.expiry_ms);
        op.buy_dex = buy_dex.to_string();
        op.sell_dex = sell_dex.to_string();
        op.buy_pair = pair_key.to_string();
        op.sell_pair = pair_key.to_string();
        op.token0 = token0.to_string();
        op.token1 = token1.to_string();
        op.token_in = Some(token0.to_string());
        op.token_out = Some(token1.to_string());
        op.buy_price = buy_price;
        op.sell_price = sell_price;
        op.profit_percentage = Some(net_profit_percent);
        op
    }

    /// `hops` is the sequence of pool traversals (length == DFS path depth,
    /// e.g. 3 for a SOL→USDC→JUP→SOL triangle), not the token list — the
    /// `path` extra field's length mirrors the hop count.
    pub fn build_triangular(&self, now_ms: i64, hops: &[TriangularHop], profit_percent: f64) -> Opportunity {
        let mut op = self.base("triangular", OpportunityType::Triangular, now_ms, TRIANGULAR_CONFIDENCE, self.expiry_ms);
        let start = hops.first().map(|h| h.from.clone()).unwrap_or_default();
        op.token0 = start.clone();
        op.token1 = start.clone();
        op.token_in = Some(start.clone());
        op.token_out = Some(start);
        op.buy_dex = hops.first().map(|h| h.dex.clone()).unwrap_or_default();
        op.sell_dex = hops.last().map(|h| h.dex.clone()).unwrap_or_default();
        op.profit_percentage = Some(profit_percent);
        op.extra.insert(
            "path".to_string(),
            serde_json::Value::Array(
                hops.iter()
                    .map(|h| {
                        let mut m = Map::new();
                        m.insert("from".to_string(), serde_json::Value::String(h.from.clone()));
                        m.insert("to".to_string(), serde_json::Value::String(h.to.clone()));
                        m.insert("dex".to_string(), serde_json::Value::String(h.dex.clone()));
                        m.insert("poolAddress".to_string(), serde_json::Value::String(h.pool_address.clone()));
                        serde_json::Value::Object(m)
                    })
                    .collect(),
            ),
        );
        op
    }

    pub fn build_cross_chain(
        &self,
        now_ms: i64,
        source_chain: &str,
        target_chain: &str,
        pair_key: &str,
        token0: &str,
        token1: &str,
        direction: &str,
        net_profit_percent: f64,
        estimated_gas_cost: f64,
    ) -> Opportunity {
        let expires_in_ms = self.expiry_ms * self.cross_chain_expiry_multiplier as i64;
        let mut op = self.base(
            "cross-chain",
            OpportunityType::CrossChain,
            now_ms,
            CROSS_CHAIN_CONFIDENCE,
            expires_in_ms,
        );
        op.source_chain = Some(source_chain.to_string());
        op.target_chain = Some(target_chain.to_string());
        op.buy_pair = pair_key.to_string();
        op.sell_pair = pair_key.to_string();
        op.token0 = token0.to_string();
        op.token1 = token1.to_string();
        op.token_in = Some(token0.to_string());
        op.token_out = Some(token1.to_string());
        op.profit_percentage = Some(net_profit_percent);
        op.extra.insert("direction".to_string(), serde_json::Value::String(direction.to_string()));
        op.extra.insert(
            "estimatedGasCost".to_string(),
            serde_json::Number::from_f64(estimated_gas_cost)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
        );
        op
    }
}
