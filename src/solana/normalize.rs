//! src/solana/normalize.rs
//!
//! Token-symbol sanitation and the two normalization rules the pool
//! ingestion contract and cross-chain detector need: one that preserves
//! liquid-staking identity (so `mSOL` keeps pricing against `SOL`
//! separately) and one that collapses it (so cross-chain pairing treats
//! `mSOL`/`stSOL`/`SOL` as the same underlying asset).

const MAX_SYMBOL_LEN: usize = 20;

/// Strips everything but alphanumerics, `.`, and `-`, then truncates.
/// Returns `None` if nothing survives sanitation.
pub fn sanitize_symbol(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '.' || *c == '-')
        .take(MAX_SYMBOL_LEN)
        .collect();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Pricing-preserving normalization: case-fold only.
pub fn normalize_for_pricing(symbol: &str) -> String {
    symbol.to_ascii_uppercase()
}

/// Collapses known liquid-staking derivatives to their underlying asset for
/// cross-chain pair matching.
pub fn normalize_for_cross_chain(symbol: &str) -> String {
    match normalize_for_pricing(symbol).as_str() {
        "MSOL" | "STSOL" | "JITOSOL" | "BSOL" => "SOL".to_string(),
        "WETH" | "STETH" | "WSTETH" | "RETH" | "CBETH" => "ETH".to_string(),
        "WBTC" | "RENBTC" => "BTC".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_disallowed_characters_and_truncates() {
        assert_eq!(sanitize_symbol("SOL$$!").as_deref(), Some("SOL"));
        assert_eq!(sanitize_symbol("wrapped.eth-v2").as_deref(), Some("wrapped.eth-v2"));
        let long = "A".repeat(30);
        assert_eq!(sanitize_symbol(&long).unwrap().len(), MAX_SYMBOL_LEN);
    }

    #[test]
    fn sanitize_rejects_empty_after_stripping() {
        assert_eq!(sanitize_symbol("$$$"), None);
    }

    #[test]
    fn cross_chain_collapses_liquid_staking_variants() {
        assert_eq!(normalize_for_cross_chain("mSOL"), "SOL");
        assert_eq!(normalize_for_cross_chain("stETH"), "ETH");
        assert_eq!(normalize_for_pricing("msol"), "MSOL");
    }
}
