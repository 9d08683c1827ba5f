//! Common utilities for all binaries
//!
//! Shared initialization, CLI parsing, and setup code.

use anyhow::Result;
use clap::{Parser, ValueEnum};
use mimir_core::engine::{EngineConfig, EngineStats, Strategy, TradeEngine};

/// Which reference strategy drives the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StrategyKind {
    MarketMaker,
    LiquidityTaker,
}

/// Common CLI arguments for all binaries.
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct CommonArgs {
    /// Number of simulated instruments
    #[arg(short, long, default_value = "4")]
    pub tickers: usize,

    /// Strategy to run
    #[arg(short, long, value_enum, default_value = "market-maker")]
    pub strategy: StrategyKind,

    /// CPU core to pin the engine thread to
    #[arg(short = 'c', long)]
    pub cpu_core: Option<usize>,

    /// Enable real-time priority (requires privileges)
    #[arg(long)]
    pub realtime: bool,

    /// Seconds to run before shutting down
    #[arg(short, long, default_value = "10")]
    pub duration_secs: u64,

    /// Seed for the simulated feed
    #[arg(long, default_value = "7")]
    pub seed: u64,

    /// Path to a JSON engine config; defaults are used when omitted
    #[arg(long)]
    pub config: Option<std::path::PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// Emit JSON logs
    #[arg(long)]
    pub json_logs: bool,
}

impl CommonArgs {
    /// Engine config from `--config`, or defaults scaled to the CLI.
    pub fn engine_config(&self) -> Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)?;
                serde_json::from_str(&text)?
            }
            None => EngineConfig::default(),
        };
        config.num_tickers = self.tickers;
        config.validate()?;
        Ok(config)
    }
}

/// Initialize tracing/logging.
pub fn init_logging(args: &CommonArgs) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level.clone()));

    if args.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false))
            .init();
    }
}

/// Pin the calling thread and raise its priority per the CLI flags.
pub fn setup_performance(args: &CommonArgs) -> Result<()> {
    if let Some(core) = args.cpu_core {
        mimir_core::perf::pin_to_core(core)?;
    }

    if args.realtime {
        mimir_core::perf::set_realtime_priority(50)?;
    }

    Ok(())
}

/// Print final statistics.
pub fn print_stats<S: Strategy>(engine: &TradeEngine<S>) {
    let stats: std::sync::Arc<EngineStats> = engine.stats();
    let load = |c: &std::sync::atomic::AtomicU64| c.load(std::sync::atomic::Ordering::Relaxed);

    tracing::info!("=== Final Statistics ===");
    tracing::info!("market updates processed: {}", load(&stats.md_processed));
    tracing::info!("trades processed:         {}", load(&stats.trades_processed));
    tracing::info!("responses processed:      {}", load(&stats.responses_processed));
    tracing::info!("requests sent:            {}", load(&stats.orders_sent));
    tracing::info!("risk rejections:          {}", load(&stats.risk_rejections));
    tracing::info!(
        "drops (ring/pool/table):  {}/{}/{}",
        load(&stats.drops_ring_full),
        load(&stats.drops_pool_exhausted),
        load(&stats.drops_order_table_full),
    );
    tracing::info!("unknown order updates:    {}", load(&stats.unknown_order_updates));

    let positions = engine.router().positions();
    tracing::info!(
        "P&L realized/unrealized:  {}/{}",
        positions.total_realized_pnl(),
        positions.total_unrealized_pnl(),
    );
    tracing::info!("gross exposure:           {}", positions.total_exposure());

    let risk = engine.router().risk().counters();
    tracing::info!(
        "risk admissions pass/reject: {}/{}",
        risk.passed,
        risk.rejected()
    );
}
