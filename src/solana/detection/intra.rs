//! src/solana/detection/intra.rs
//!
//! Intra-DEX detection: for every pair key, compare fresh pools against
//! each other and emit an opportunity wherever the gross spread clears
//! fees plus the configured threshold.

use crate::config::DetectionConfig;
use crate::model::opportunity::Opportunity;
use crate::solana::factory::OpportunityFactory;
use crate::solana::pool_store::{Pool, PoolStore};

use super::DetectionResult;

/// Beyond this many ordered comparisons for a single pair, the remaining
/// combinations are skipped and the pair is logged as truncated.
pub const MAX_COMPARISONS_PER_PAIR: usize = 500;

/// Flat per-tx cost estimate for a Solana swap, expressed in USD. There is
/// no live compute-unit price feed in this crate; this is the same kind of
/// fixed estimate the reference bot's fee cache falls back to when a live
/// quote is unavailable.
pub(crate) const SOLANA_BASE_GAS_COST_USD: f64 = 0.02;

pub fn detect(store: &PoolStore, factory: &OpportunityFactory, config: &DetectionConfig, now_ms: i64) -> DetectionResult {
    let mut opportunities = Vec::new();
    let mut stale_skipped = 0usize;

    for pair_key in store.pair_keys() {
        let pools = store.pools_for_pair(&pair_key);
        let mut survivors: Vec<Pool> = Vec::with_capacity(pools.len());
        for pool in pools {
            if pool.is_stale(now_ms, config.price_staleness_ms) {
                stale_skipped += 1;
                continue;
            }
            if !pool.has_valid_price() {
                continue;
            }
            survivors.push(pool);
        }
        if survivors.len() < 2 {
            continue;
        }

        let mut compared = 0usize;
        'outer: for i in 0..survivors.len() {
            for j in (i + 1)..survivors.len() {
                if compared >= MAX_COMPARISONS_PER_PAIR {
                    tracing::warn!(pair_key = %pair_key, "intra-dex comparison bound reached, truncating pair");
                    break 'outer;
                }
                compared += 1;

                if let Some(op) = evaluate_pair(factory, config, now_ms, &survivors[i], &survivors[j]) {
                    opportunities.push(op);
                }
            }
        }
    }

    DetectionResult { opportunities, stale_pools_skipped: stale_skipped, paths_explored: None }
}

fn evaluate_pair(
    factory: &OpportunityFactory,
    config: &DetectionConfig,
    now_ms: i64,
    a: &Pool,
    b: &Pool,
) -> Option<Opportunity> {
    let (buy, sell) = if a.price <= b.price { (a, b) } else { (b, a) };
    let gross = (sell.price - buy.price) / buy.price;
    let net = gross - (buy.fee_decimal() + sell.fee_decimal());
    let threshold = config.min_profit_threshold_percent / 100.0;
    if net < threshold {
        return None;
    }

    let gas_estimate = SOLANA_BASE_GAS_COST_USD / config.default_trade_value_usd;
    let mut op = factory.build_intra_solana(
        now_ms,
        &buy.dex,
        &sell.dex,
        &buy.pair_key,
        &buy.normalized_token0,
        &buy.normalized_token1,
        buy.price,
        sell.price,
        net * 100.0,
    );
    op.extra.insert(
        "estimatedGasCost".to_string(),
        serde_json::Number::from_f64(gas_estimate).map(serde_json::Value::Number).unwrap_or(serde_json::Value::Null),
    );
    Some(op)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solana::pool_store::TokenInfo;

    fn pool(address: &str, dex: &str, price: f64, fee_bps: u16) -> Pool {
        Pool {
            address: address.to_string(),
            program_id: "prog".to_string(),
            dex: dex.to_string(),
            token0: TokenInfo { mint: "m0".into(), symbol: "SOL".into(), decimals: 9 },
            token1: TokenInfo { mint: "m1".into(), symbol: "USDC".into(), decimals: 6 },
            fee_bps,
            reserve0: 1_000.0,
            reserve1: 100_000.0,
            price,
            last_updated: 1_000,
            normalized_token0: "SOL".into(),
            normalized_token1: "USDC".into(),
            pair_key: "SOL-USDC".to_string(),
        }
    }

    #[test]
    fn emits_opportunity_when_spread_clears_fees_and_threshold() {
        let store = PoolStore::new(100);
        store.set(pool("raydium-pool", "raydium", 100.0, 25));
        store.set(pool("orca-pool", "orca", 102.0, 25));
        let factory = OpportunityFactory::new(30_000, 10);
        let config = DetectionConfig::default();

        let result = detect(&store, &factory, &config, 1_000);
        assert_eq!(result.opportunities.len(), 1);
        let op = &result.opportunities[0];
        assert_eq!(op.buy_dex, "raydium");
        assert_eq!(op.sell_dex, "orca");
        assert!(op.profit_percentage.unwrap() > 0.5);
    }

    #[test]
    fn skips_pair_when_spread_does_not_clear_fees() {
        let store = PoolStore::new(100);
        store.set(pool("a", "raydium", 100.0, 25));
        store.set(pool("b", "orca", 100.01, 25));
        let factory = OpportunityFactory::new(30_000, 10);
        let config = DetectionConfig::default();

        let result = detect(&store, &factory, &config, 1_000);
        assert!(result.opportunities.is_empty());
    }

    #[test]
    fn stale_pools_are_excluded_and_counted() {
        let store = PoolStore::new(100);
        store.set(pool("a", "raydium", 100.0, 25));
        let mut stale = pool("b", "orca", 105.0, 25);
        stale.last_updated = 0;
        store.set(stale);
        let factory = OpportunityFactory::new(30_000, 10);
        let config = DetectionConfig::default();

        let result = detect(&store, &factory, &config, 10_000);
        assert!(result.opportunities.is_empty());
        assert_eq!(result.stale_pools_skipped, 1);
    }
}
