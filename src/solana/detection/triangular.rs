//! src/solana/detection/triangular.rs
//!
//! Bounded-depth triangular-path DFS over the pool graph, with explicit
//! backtracking (push, recurse, pop) on a shared path buffer instead of
//! allocating a new vector per call, and a composite-tuple memoization key
//! rather than the formatted-string key a looser implementation would use.

use std::collections::{HashMap, HashSet};

use crate::config::DetectionConfig;
use crate::solana::factory::{OpportunityFactory, TriangularHop};
use crate::solana::pool_store::{PoolStore, MIN_VALID_PRICE};

use super::DetectionResult;

pub const MAX_PATHS_PER_LEVEL: usize = 100;
pub const MAX_MEMO_CACHE_SIZE: usize = 10_000;

#[derive(Debug, Clone)]
struct Edge {
    to: String,
    effective_price: f64,
    fee: f64,
    pool_address: String,
    dex: String,
}

type MemoKey = (String, String, u8, String);

pub fn detect(store: &PoolStore, factory: &OpportunityFactory, config: &DetectionConfig, now_ms: i64) -> DetectionResult {
    let mut stale_skipped = 0usize;
    let mut adjacency: HashMap<String, Vec<Edge>> = HashMap::new();

    for pool in store.all_pools() {
        if pool.is_stale(now_ms, config.price_staleness_ms) {
            stale_skipped += 1;
            continue;
        }
        if !pool.has_valid_price() {
            continue;
        }
        let fee = pool.fee_decimal();
        adjacency.entry(pool.normalized_token0.clone()).or_default().push(Edge {
            to: pool.normalized_token1.clone(),
            effective_price: pool.price,
            fee,
            pool_address: pool.address.clone(),
            dex: pool.dex.clone(),
        });
        let inverse = 1.0 / pool.price;
        if inverse.is_finite() && inverse >= MIN_VALID_PRICE {
            adjacency.entry(pool.normalized_token1.clone()).or_default().push(Edge {
                to: pool.normalized_token0.clone(),
                effective_price: inverse,
                fee,
                pool_address: pool.address.clone(),
                dex: pool.dex.clone(),
            });
        }
    }

    let global_cap = MAX_PATHS_PER_LEVEL * 10;
    let mut memo: HashSet<MemoKey> = HashSet::new();
    let mut paths_explored = 0usize;
    let mut found: Vec<(String, Vec<Edge>, f64)> = Vec::new();

    let tokens: Vec<String> = adjacency.keys().cloned().collect();
    for start in &tokens {
        if paths_explored >= global_cap {
            break;
        }
        let mut path: Vec<Edge> = Vec::new();
        let mut visited_pools: HashSet<String> = HashSet::new();
        let mut visited_tokens: HashSet<String> = HashSet::new();
        visited_tokens.insert(start.clone());
        dfs(
            &adjacency,
            config.max_triangular_depth,
            start,
            start,
            0,
            &mut path,
            &mut visited_pools,
            &mut visited_tokens,
            &mut memo,
            &mut paths_explored,
            global_cap,
            &mut found,
        );
    }

    let opportunities = found
        .into_iter()
        .map(|(start, edges, profit)| (hops_from_edges(&start, &edges), profit))
        .map(|(hops, profit)| factory.build_triangular(now_ms, &hops, profit * 100.0))
        .collect();

    DetectionResult { opportunities, stale_pools_skipped: stale_skipped, paths_explored: Some(paths_explored) }
}

/// Edges only carry `to`; `from` for hop N is `start` for N=0, or the
/// previous hop's `to` otherwise.
fn hops_from_edges(start: &str, edges: &[Edge]) -> Vec<TriangularHop> {
    let mut prev = start.to_string();
    edges
        .iter()
        .map(|edge| {
            let hop = TriangularHop { from: prev.clone(), to: edge.to.clone(), dex: edge.dex.clone(), pool_address: edge.pool_address.clone() };
            prev = edge.to.clone();
            hop
        })
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn dfs(
    adjacency: &HashMap<String, Vec<Edge>>,
    max_depth: usize,
    start_token: &str,
    current_token: &str,
    depth: usize,
    path: &mut Vec<Edge>,
    visited_pools: &mut HashSet<String>,
    visited_tokens: &mut HashSet<String>,
    memo: &mut HashSet<MemoKey>,
    paths_explored: &mut usize,
    global_cap: usize,
    found: &mut Vec<(String, Vec<Edge>, f64)>,
) {
    if depth >= 3 && current_token == start_token {
        if let Some(profit) = compute_profit(path) {
            if profit > 0.0 {
                found.push((start_token.to_string(), path.clone(), profit));
            }
        }
        return;
    }
    if depth >= max_depth || *paths_explored >= global_cap {
        return;
    }

    let edges = match adjacency.get(current_token) {
        Some(e) => e,
        None => return,
    };

    let mut taken_at_level = 0usize;
    for edge in edges {
        if taken_at_level >= MAX_PATHS_PER_LEVEL || *paths_explored >= global_cap {
            break;
        }
        if visited_pools.contains(&edge.pool_address) {
            continue;
        }
        let is_terminal = edge.to == start_token;
        if !is_terminal && visited_tokens.contains(&edge.to) {
            continue;
        }

        let key: MemoKey = (start_token.to_string(), edge.to.clone(), depth as u8, edge.pool_address.clone());
        if memo.contains(&key) {
            continue;
        }
        if memo.len() < MAX_MEMO_CACHE_SIZE {
            memo.insert(key);
        }

        path.push(edge.clone());
        visited_pools.insert(edge.pool_address.clone());
        if !is_terminal {
            visited_tokens.insert(edge.to.clone());
        }
        *paths_explored += 1;
        taken_at_level += 1;

        dfs(
            adjacency,
            max_depth,
            start_token,
            &edge.to,
            depth + 1,
            path,
            visited_pools,
            visited_tokens,
            memo,
            paths_explored,
            global_cap,
            found,
        );

        path.pop();
        visited_pools.remove(&edge.pool_address);
        if !is_terminal {
            visited_tokens.remove(&edge.to);
        }
    }
}

fn compute_profit(path: &[Edge]) -> Option<f64> {
    let mut amount = 1.0f64;
    for edge in path {
        amount *= edge.effective_price;
        if !amount.is_finite() || amount <= 0.0 {
            return None;
        }
        amount *= 1.0 - edge.fee;
        if !amount.is_finite() || amount <= 0.0 {
            return None;
        }
    }
    Some(amount - 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solana::pool_store::TokenInfo;
    use crate::solana::pool_store::Pool;

    fn pool(address: &str, dex: &str, t0: &str, t1: &str, price: f64, fee_bps: u16) -> Pool {
        Pool {
            address: address.to_string(),
            program_id: "prog".to_string(),
            dex: dex.to_string(),
            token0: TokenInfo { mint: t0.into(), symbol: t0.into(), decimals: 9 },
            token1: TokenInfo { mint: t1.into(), symbol: t1.into(), decimals: 6 },
            fee_bps,
            reserve0: 1.0,
            reserve1: 1.0,
            price,
            last_updated: 1_000,
            normalized_token0: t0.to_string(),
            normalized_token1: t1.to_string(),
            pair_key: crate::solana::pool_store::pair_key(t0, t1),
        }
    }

    #[test]
    fn finds_profitable_triangle_matching_the_reference_example() {
        let store = PoolStore::new(100);
        store.set(pool("p1", "raydium", "SOL", "USDC", 100.0, 10));
        store.set(pool("p2", "orca", "USDC", "JUP", 0.05, 10));
        store.set(pool("p3", "meteora", "JUP", "SOL", 0.21, 10));
        let factory = OpportunityFactory::new(30_000, 10);
        let config = DetectionConfig::default();

        let result = detect(&store, &factory, &config, 1_000);
        assert_eq!(result.opportunities.len(), 1);
        let op = &result.opportunities[0];
        assert_eq!(op.confidence, 0.75);
        let path = op.extra.get("path").and_then(|v| v.as_array()).unwrap();
        assert_eq!(path.len(), 3);
        let profit = op.profit_percentage.unwrap();
        assert!((profit - 4.69).abs() < 0.05, "profit was {profit}");
    }

    #[test]
    fn no_triangle_found_when_graph_does_not_close() {
        let store = PoolStore::new(100);
        store.set(pool("p1", "raydium", "SOL", "USDC", 100.0, 10));
        store.set(pool("p2", "orca", "USDC", "JUP", 0.05, 10));
        let factory = OpportunityFactory::new(30_000, 10);
        let config = DetectionConfig::default();

        let result = detect(&store, &factory, &config, 1_000);
        assert!(result.opportunities.is_empty());
    }
}
