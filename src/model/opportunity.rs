//! src/model/opportunity.rs
//!
//! The canonical internal `Opportunity` record (spec section "Data Model").
//! Unknown fields survive a round trip through `extra` so forwarding never
//! silently drops data an upstream detector attached.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Arbitrage type. Free-form in the source system; `Other` preserves any
/// value the whitelist below doesn't recognize instead of discarding it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum OpportunityType {
    Simple,
    IntraSolana,
    Triangular,
    CrossChain,
    Other(String),
}

impl Default for OpportunityType {
    fn default() -> Self {
        OpportunityType::Simple
    }
}

impl fmt::Display for OpportunityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OpportunityType::Simple => "simple",
            OpportunityType::IntraSolana => "intra-solana",
            OpportunityType::Triangular => "triangular",
            OpportunityType::CrossChain => "cross-chain",
            OpportunityType::Other(s) => s.as_str(),
        })
    }
}

impl FromStr for OpportunityType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "" => OpportunityType::Simple,
            "simple" => OpportunityType::Simple,
            "intra-solana" => OpportunityType::IntraSolana,
            "triangular" => OpportunityType::Triangular,
            "cross-chain" => OpportunityType::CrossChain,
            other => OpportunityType::Other(other.to_string()),
        })
    }
}

impl From<String> for OpportunityType {
    fn from(s: String) -> Self {
        s.parse().unwrap()
    }
}

impl From<OpportunityType> for String {
    fn from(t: OpportunityType) -> Self {
        t.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpportunityStatus {
    Pending,
    Executing,
    Executed,
    Failed,
}

impl fmt::Display for OpportunityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OpportunityStatus::Pending => "pending",
            OpportunityStatus::Executing => "executing",
            OpportunityStatus::Executed => "executed",
            OpportunityStatus::Failed => "failed",
        })
    }
}

impl FromStr for OpportunityStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OpportunityStatus::Pending),
            "executing" => Ok(OpportunityStatus::Executing),
            "executed" => Ok(OpportunityStatus::Executed),
            "failed" => Ok(OpportunityStatus::Failed),
            _ => Err(()),
        }
    }
}

/// Canonical opportunity record, stored by the router and produced by the
/// Solana engine's `OpportunityFactory`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Opportunity {
    pub id: String,
    #[serde(default, rename = "type")]
    pub kind: OpportunityType,
    #[serde(default)]
    pub chain: Option<String>,
    #[serde(default, rename = "sourceChain")]
    pub source_chain: Option<String>,
    #[serde(default, rename = "targetChain")]
    pub target_chain: Option<String>,
    #[serde(default, rename = "buyDex")]
    pub buy_dex: String,
    #[serde(default, rename = "sellDex")]
    pub sell_dex: String,
    #[serde(default, rename = "buyPair")]
    pub buy_pair: String,
    #[serde(default, rename = "sellPair")]
    pub sell_pair: String,
    #[serde(default)]
    pub token0: String,
    #[serde(default)]
    pub token1: String,
    #[serde(default, rename = "tokenIn")]
    pub token_in: Option<String>,
    #[serde(default, rename = "tokenOut")]
    pub token_out: Option<String>,
    #[serde(default, rename = "amountIn")]
    pub amount_in: String,
    #[serde(default, rename = "buyPrice")]
    pub buy_price: f64,
    #[serde(default, rename = "sellPrice")]
    pub sell_price: f64,
    #[serde(default, rename = "profitPercentage")]
    pub profit_percentage: Option<f64>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default, rename = "expiresAt")]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub status: Option<OpportunityStatus>,
    #[serde(default, rename = "blockNumber")]
    pub block_number: Option<i64>,
    #[serde(default, rename = "useFlashLoan")]
    pub use_flash_loan: Option<bool>,
    #[serde(default, rename = "pipelineTimestamps")]
    pub pipeline_timestamps: BTreeMap<String, i64>,
    /// Unknown fields from the wire, preserved losslessly.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Opportunity {
    /// `token_in` mirrored from `token0` when absent, per spec.
    pub fn effective_token_in(&self) -> String {
        self.token_in.clone().unwrap_or_else(|| self.token0.clone())
    }

    pub fn effective_token_out(&self) -> String {
        self.token_out.clone().unwrap_or_else(|| self.token1.clone())
    }

    /// `undefined` status is treated as pending everywhere in the spec.
    pub fn effective_status(&self) -> OpportunityStatus {
        self.status.unwrap_or(OpportunityStatus::Pending)
    }

    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        matches!(self.expires_at, Some(exp) if exp < now_ms)
    }

    pub fn stamp_coordinator_at(&mut self, now_ms: i64) {
        self.pipeline_timestamps.insert("coordinatorAt".to_string(), now_ms);
    }
}
