use arb_coordinator::solana::pool_store::{pair_key, Pool, PoolStore, TokenInfo};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn pool(address: &str, price: f64) -> Pool {
    Pool {
        address: address.to_string(),
        program_id: "prog".to_string(),
        dex: "raydium".to_string(),
        token0: TokenInfo { mint: "m0".into(), symbol: "SOL".into(), decimals: 9 },
        token1: TokenInfo { mint: "m1".into(), symbol: "USDC".into(), decimals: 6 },
        fee_bps: 25,
        reserve0: 1_000.0,
        reserve1: 100_000.0,
        price,
        last_updated: 1_000,
        normalized_token0: "SOL".to_string(),
        normalized_token1: "USDC".to_string(),
        pair_key: pair_key("SOL", "USDC"),
    }
}

fn bench_set_at_capacity(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_store_set");

    for size in [100, 1_000, 10_000].iter() {
        let store = PoolStore::new(*size);
        for i in 0..*size {
            store.set(pool(&format!("addr-{i}"), 100.0));
        }

        group.bench_with_input(BenchmarkId::new("at_capacity", size), size, |b, _| {
            let mut n = 0u64;
            b.iter(|| {
                n += 1;
                store.set(black_box(pool(&format!("churn-{n}"), 100.0 + (n % 7) as f64)))
            })
        });
    }

    group.finish();
}

fn bench_pools_for_pair(c: &mut Criterion) {
    let mut group = c.benchmark_group("pools_for_pair");
    let store = PoolStore::new(10_000);
    for i in 0..5_000 {
        store.set(pool(&format!("addr-{i}"), 100.0 + (i % 11) as f64));
    }

    group.bench_function("lookup", |b| {
        b.iter(|| store.pools_for_pair(black_box("SOL-USDC")))
    });

    group.finish();
}

criterion_group!(benches, bench_set_at_capacity, bench_pools_for_pair);
criterion_main!(benches);
