//! src/bin/coordinator.rs
//!
//! Process entrypoint: loads configuration, wires the Solana engine, the
//! opportunity router, and the cleanup scheduler together, then runs the
//! detection loop until a shutdown signal arrives.

use std::sync::Arc;

use arb_coordinator::clock::now_ms;
use arb_coordinator::config::CoordinatorConfig;
use arb_coordinator::control::ControlSurface;
use arb_coordinator::reliability::CircuitBreakerConfig;
use arb_coordinator::router::{CleanupScheduler, OpportunityRouter};
use arb_coordinator::solana::{OpportunityPublisher, SolanaArbitrageEngine};
use arb_coordinator::streaming::RedisStreamClient;
use arb_coordinator::telemetry::{init_tracing, metrics::Metrics};

use clap::Parser;
use tokio::time::{interval, Duration};

#[derive(Parser, Debug)]
#[command(name = "coordinator", about = "Cross-chain arbitrage opportunity coordinator")]
struct Cli {
    /// Chain this process detects opportunities for.
    #[arg(long, default_value = "solana")]
    chain: String,

    /// Whether this instance forwards opportunities to execution (exactly
    /// one replica in a deployment should run with this set).
    #[arg(long)]
    leader: bool,

    /// Detection cycle interval, in milliseconds.
    #[arg(long, default_value_t = 500)]
    detection_interval_ms: u64,

    /// Expired-opportunity sweep interval, in milliseconds.
    #[arg(long, default_value_t = 5_000)]
    cleanup_interval_ms: u64,

    #[arg(long, default_value = "/var/lib/arb-coordinator/dlq")]
    dlq_fallback_dir: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = CoordinatorConfig::from_env()?;

    let stream_client: Arc<dyn arb_coordinator::streaming::StreamClient> = Arc::new(RedisStreamClient::connect(&config.redis_url).await?);

    let metrics = Metrics::new();
    let start = now_ms();

    let publisher = OpportunityPublisher::new(
        stream_client.clone(),
        config.opportunities_stream.clone(),
        config.router.execution_stream_max_len,
        config.router.instance_id.clone(),
        metrics.clone(),
    );
    let engine = Arc::new(SolanaArbitrageEngine::new(
        cli.chain.clone(),
        10_000,
        config.detection.clone(),
        CircuitBreakerConfig::default(),
        publisher,
        metrics.clone(),
    ));

    let router = Arc::new(OpportunityRouter::new(
        config.router.clone(),
        Some(stream_client.clone()),
        metrics.clone(),
        start,
        cli.dlq_fallback_dir.clone(),
    ));

    let control = ControlSurface::new(router.clone(), engine.clone(), metrics.clone(), start);

    let mut cleanup = CleanupScheduler::new();
    cleanup.start(router.clone(), cli.cleanup_interval_ms);

    tracing::info!(chain = %cli.chain, leader = cli.leader, "coordinator starting");

    let mut ticker = interval(Duration::from_millis(cli.detection_interval_ms));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = now_ms();
                match engine.run_detection_cycle(now).await {
                    Ok(result) if !result.opportunities.is_empty() => {
                        tracing::debug!(found = result.opportunities.len(), "detection cycle found opportunities");
                    }
                    Ok(_) => {}
                    Err(err) => tracing::error!(error = %err, "detection cycle failed"),
                }
                control.refresh(now);
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown signal received");
                break;
            }
        }
    }

    router.shutdown();
    cleanup.stop();
    engine.stop();
    Ok(())
}
