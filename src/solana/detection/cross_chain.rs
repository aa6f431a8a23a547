//! src/solana/detection/cross_chain.rs
//!
//! Cross-chain detection driven by incoming EVM price updates rather than
//! a store scan: each update is matched against Solana pools sharing its
//! normalized pair key, and cost-accounted against bridge, gas, and
//! latency-risk assumptions before being compared to the profit threshold.

use crate::config::DetectionConfig;
use crate::solana::factory::OpportunityFactory;
use crate::solana::normalize::normalize_for_cross_chain;
use crate::solana::pool_store::{pair_key, PoolStore};

use super::intra::SOLANA_BASE_GAS_COST_USD;
use super::DetectionResult;

/// Typical pool fee assumed for the EVM side, since the update carries no
/// fee field of its own.
const EVM_DEFAULT_POOL_FEE_DECIMAL: f64 = 0.003;

/// A price observation forwarded by an EVM-side detector.
#[derive(Debug, Clone)]
pub struct EvmPriceUpdate {
    pub chain: String,
    pub token0: String,
    pub token1: String,
    pub price: f64,
}

fn per_chain_evm_gas_usd(chain: &str, default: f64) -> f64 {
    match chain {
        "ethereum" => 15.0,
        "arbitrum" | "optimism" | "base" | "zksync" | "linea" => 0.25,
        _ => default,
    }
}

pub fn detect(store: &PoolStore, factory: &OpportunityFactory, config: &DetectionConfig, now_ms: i64, update: &EvmPriceUpdate) -> DetectionResult {
    if !config.cross_chain_enabled {
        return DetectionResult::default();
    }

    let normalized0 = normalize_for_cross_chain(&update.token0);
    let normalized1 = normalize_for_cross_chain(&update.token1);
    let key = pair_key(&normalized0, &normalized1);

    let mut stale_skipped = 0usize;
    let mut opportunities = Vec::new();

    for pool in store.pools_for_pair(&key) {
        if pool.is_stale(now_ms, config.price_staleness_ms) {
            stale_skipped += 1;
            continue;
        }
        if !pool.has_valid_price() || !update.price.is_finite() || update.price <= 0.0 {
            continue;
        }

        let gross = (update.price - pool.price).abs() / pool.price;
        let evm_gas_usd = per_chain_evm_gas_usd(&update.chain, config.default_trade_value_usd * 0.0015);
        let gas_decimal = (evm_gas_usd + SOLANA_BASE_GAS_COST_USD) / config.default_trade_value_usd;
        let total_costs = EVM_DEFAULT_POOL_FEE_DECIMAL + pool.fee_decimal() + config.bridge_fee_decimal + gas_decimal + config.latency_risk_premium_decimal;
        let net = gross - total_costs;
        let threshold = config.min_profit_threshold_percent / 100.0;
        if net < threshold {
            continue;
        }

        let direction = if pool.price < update.price { "buy-solana-sell-evm" } else { "buy-evm-sell-solana" };
        let op = factory.build_cross_chain(
            now_ms,
            &update.chain,
            "solana",
            &key,
            &normalized0,
            &normalized1,
            direction,
            net * 100.0,
            gas_decimal,
        );
        opportunities.push(op);
    }

    DetectionResult { opportunities, stale_pools_skipped: stale_skipped, paths_explored: None }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solana::pool_store::{Pool, TokenInfo};

    fn pool(price: f64, fee_bps: u16, last_updated: i64) -> Pool {
        Pool {
            address: "sol-pool".to_string(),
            program_id: "prog".to_string(),
            dex: "raydium".to_string(),
            token0: TokenInfo { mint: "m0".into(), symbol: "SOL".into(), decimals: 9 },
            token1: TokenInfo { mint: "m1".into(), symbol: "USDC".into(), decimals: 6 },
            fee_bps,
            reserve0: 1_000.0,
            reserve1: 100_000.0,
            price,
            last_updated,
            normalized_token0: "SOL".into(),
            normalized_token1: "USDC".into(),
            pair_key: "SOL-USDC".to_string(),
        }
    }

    #[test]
    fn emits_opportunity_when_spread_clears_all_costs() {
        let store = PoolStore::new(10);
        store.set(pool(100.0, 10, 1_000));
        let factory = OpportunityFactory::new(30_000, 10);
        let config = DetectionConfig::default();
        let update = EvmPriceUpdate { chain: "arbitrum".to_string(), token0: "SOL".to_string(), token1: "USDC".to_string(), price: 108.0 };

        let result = detect(&store, &factory, &config, 1_000, &update);
        assert_eq!(result.opportunities.len(), 1);
        assert_eq!(result.opportunities[0].source_chain.as_deref(), Some("arbitrum"));
        assert_eq!(result.opportunities[0].extra.get("direction").and_then(|v| v.as_str()), Some("buy-solana-sell-evm"));
    }

    #[test]
    fn disabled_flag_short_circuits() {
        let store = PoolStore::new(10);
        store.set(pool(100.0, 10, 1_000));
        let factory = OpportunityFactory::new(30_000, 10);
        let mut config = DetectionConfig::default();
        config.cross_chain_enabled = false;
        let update = EvmPriceUpdate { chain: "ethereum".to_string(), token0: "SOL".to_string(), token1: "USDC".to_string(), price: 150.0 };

        let result = detect(&store, &factory, &config, 1_000, &update);
        assert!(result.opportunities.is_empty());
    }

    #[test]
    fn small_spread_does_not_clear_ethereum_gas_cost() {
        let store = PoolStore::new(10);
        store.set(pool(100.0, 10, 1_000));
        let factory = OpportunityFactory::new(30_000, 10);
        let config = DetectionConfig::default();
        let update = EvmPriceUpdate { chain: "ethereum".to_string(), token0: "SOL".to_string(), token1: "USDC".to_string(), price: 100.5 };

        let result = detect(&store, &factory, &config, 1_000, &update);
        assert!(result.opportunities.is_empty());
    }
}
