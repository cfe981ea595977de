//! Asset Rotator - Main Entry Point
//!
//! Runs the momentum/mean-reversion rotation against Alpaca, with a mock
//! broker mode for paper trading without credentials.

use anyhow::Result;
use asset_rotator::broker::{AlpacaClient, Broker, MarketData, MockBroker};
use asset_rotator::config::Config;
use asset_rotator::strategy::RotationStrategy;
use asset_rotator::supervisor::Supervisor;
use clap::Parser;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

/// Asset Rotator CLI
#[derive(Parser)]
#[command(name = "asset-rotator")]
#[command(version, about = "Momentum/mean-reversion asset rotation on Alpaca")]
struct Cli {
    /// Run against the in-memory mock broker instead of Alpaca
    #[arg(long)]
    mock: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load()?;
    config.validate()?;

    init_logging(&config)?;

    info!("╔════════════════════════════════════════════════════════╗");
    info!(
        "║            Asset Rotator v{}                        ║",
        env!("CARGO_PKG_VERSION")
    );
    info!("╚════════════════════════════════════════════════════════╝");
    log_config(&config);

    if cli.mock || config.alpaca.api_key.is_empty() {
        if !cli.mock {
            info!("⚠️  No API keys provided. Running against the mock broker.");
        }
        info!("📝 MOCK MODE - Instant fills against canned data");
        let broker = Arc::new(MockBroker::new(dec!(100000)));
        seed_demo_bars(&broker, &config).await;
        run_trading(&config, broker).await
    } else {
        if config.alpaca.paper {
            info!("📝 PAPER TRADING MODE - Alpaca paper endpoint");
        } else {
            warn!("⚠️  LIVE TRADING MODE - Real money at risk!");
        }
        let broker = Arc::new(AlpacaClient::new(&config.alpaca)?);
        run_trading(&config, broker).await
    }
}

/// Build the strategy instances and hand them to the supervisor.
async fn run_trading<B>(config: &Config, broker: Arc<B>) -> Result<()>
where
    B: Broker + MarketData + 'static,
{
    let mut supervisor = Supervisor::new();
    for i in 1..=config.strategy.instances {
        let strategy = Arc::new(RotationStrategy::new(
            format!("rotation-{i}"),
            config.strategy.clone(),
            broker.clone(),
        ));
        supervisor.add_strategy(strategy)?;
    }

    info!("🚀 Starting {} strategy instance(s)...", config.strategy.instances);
    supervisor.run_all().await;
    Ok(())
}

/// Canned close series so mock cycles have something to score. Each symbol
/// gets a distinct drift so selection is deterministic.
async fn seed_demo_bars(broker: &MockBroker, config: &Config) {
    let drifts = [
        dec!(0.05),
        dec!(-0.06),
        dec!(0.02),
        dec!(-0.01),
        dec!(0.03),
        dec!(-0.04),
        dec!(0.01),
    ];
    let window = config.strategy.lookback + 2;

    for (i, symbol) in config.strategy.symbols.iter().enumerate() {
        let base = dec!(100) + Decimal::from(i as u64 * 25);
        let step = base * drifts[i % drifts.len()];
        let closes: Vec<Decimal> = (0..window)
            .map(|n| base + step * Decimal::from(n as u64))
            .collect();
        broker.set_closes(symbol, &closes).await;
    }
}

fn init_logging(config: &Config) -> Result<()> {
    use tracing_subscriber::fmt::writer::MakeWriterExt;

    let filter = EnvFilter::from_default_env()
        .add_directive("asset_rotator=debug".parse()?)
        .add_directive(Level::INFO.into());

    match &config.logging.directory {
        Some(directory) => {
            std::fs::create_dir_all(directory)?;
            let file_appender = tracing_appender::rolling::daily(directory, "asset-rotator.log");
            let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
            // Keep the writer guard alive for the program duration.
            Box::leak(Box::new(guard));

            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stdout.and(file_writer))
                .with_target(true)
                .with_ansi(true)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(true)
                .with_ansi(true)
                .init();
        }
    }

    Ok(())
}

/// Log configuration on startup.
fn log_config(config: &Config) {
    info!("📋 Configuration:");
    info!("   Universe: {}", config.strategy.symbols.join(", "));
    info!("   Rebalance Period: {} iterations", config.strategy.rebalance_period);
    info!(
        "   Lookback: {} bars ({:?})",
        config.strategy.lookback, config.strategy.timestep
    );
    info!(
        "   Allocation per Leg: {:.0}%",
        config.strategy.allocation_fraction * dec!(100)
    );
    info!(
        "   Mean-Reversion Threshold: {:.1}%",
        config.strategy.mean_reversion_threshold * dec!(100)
    );
    info!("   Instances: {}", config.strategy.instances);
}
