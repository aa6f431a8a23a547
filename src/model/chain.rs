//! src/model/chain.rs
//!
//! Canonical chain ids and the normalization rule applied to any `chain`
//! field arriving from an upstream detector. Normalization is deliberately
//! narrow: lowercase, trim, collapse a handful of well-known aliases, then
//! check membership in the fixed whitelist.

pub const CANONICAL_CHAINS: &[&str] = &[
    "ethereum",
    "bsc",
    "arbitrum",
    "polygon",
    "optimism",
    "base",
    "avalanche",
    "fantom",
    "zksync",
    "linea",
    "solana",
];

/// Normalizes a free-form chain identifier to one of `CANONICAL_CHAINS`,
/// returning `None` when the input doesn't resolve to a known chain.
pub fn normalize_chain(raw: &str) -> Option<String> {
    let trimmed = raw.trim().to_ascii_lowercase();
    if trimmed.is_empty() {
        return None;
    }
    let canonical = match trimmed.as_str() {
        "eth" | "ethereum" | "mainnet" => "ethereum",
        "bsc" | "bnb" | "binance-smart-chain" => "bsc",
        "arbitrum" | "arb" | "arbitrum-one" => "arbitrum",
        "polygon" | "matic" => "polygon",
        "optimism" | "op" => "optimism",
        "base" => "base",
        "avalanche" | "avax" => "avalanche",
        "fantom" | "ftm" => "fantom",
        "zksync" | "zksync-era" => "zksync",
        "linea" => "linea",
        "solana" | "sol" => "solana",
        _ => return None,
    };
    Some(canonical.to_string())
}

pub fn is_canonical(chain: &str) -> bool {
    CANONICAL_CHAINS.contains(&chain)
}
