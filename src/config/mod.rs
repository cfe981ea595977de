//! Configuration management for the asset rotator.
//!
//! Loads settings from environment variables and config files.

use crate::broker::Timestep;
use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Alpaca API credentials
    #[serde(default)]
    pub alpaca: AlpacaConfig,
    /// Rotation strategy parameters
    #[serde(default)]
    pub strategy: StrategyConfig,
    /// Logging output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlpacaConfig {
    /// API key for authentication
    #[serde(default)]
    pub api_key: String,
    /// Secret key sent alongside the API key
    #[serde(default)]
    pub secret_key: String,
    /// Use the paper-trading endpoint instead of production
    #[serde(default = "default_paper")]
    pub paper: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Universe of symbols to score each cycle
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,
    /// Number of outer iterations between decision cycles
    #[serde(default = "default_rebalance_period")]
    pub rebalance_period: u32,
    /// Lookback window (in bars) for the return calculation
    #[serde(default = "default_lookback")]
    pub lookback: usize,
    /// Bar granularity for the lookback window
    #[serde(default = "default_timestep")]
    pub timestep: Timestep,
    /// Fraction of available cash allocated per leg (0.0-1.0)
    #[serde(default = "default_allocation_fraction")]
    pub allocation_fraction: Decimal,
    /// Minimum absolute return required for the mean-reversion leg to act
    #[serde(default = "default_mean_reversion_threshold")]
    pub mean_reversion_threshold: Decimal,
    /// Seconds to wait between outer iterations (0 = wait for market close)
    #[serde(default)]
    pub cadence_secs: u64,
    /// Number of independent strategy instances to run
    #[serde(default = "default_instances")]
    pub instances: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Directory for rolling log files (console only if unset)
    #[serde(default)]
    pub directory: Option<String>,
}

// Default value functions
fn default_paper() -> bool {
    true
}

fn default_symbols() -> Vec<String> {
    ["AAPL", "MSFT", "GOOGL", "META", "TSLA", "NVDA", "NFLX"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_rebalance_period() -> u32 {
    2
}

fn default_lookback() -> usize {
    2
}

fn default_timestep() -> Timestep {
    Timestep::Day
}

fn default_allocation_fraction() -> Decimal {
    Decimal::new(5, 1) // 0.5 - each leg gets half the cash pool
}

fn default_mean_reversion_threshold() -> Decimal {
    Decimal::new(3, 2) // 0.03 - act only on moves larger than 3%
}

fn default_instances() -> u32 {
    1
}

impl Config {
    /// Load configuration from environment variables and config files.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::default().separator("__").prefix("ROTATOR"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            !self.strategy.symbols.is_empty(),
            "symbols must contain at least one entry"
        );

        anyhow::ensure!(
            self.strategy.rebalance_period >= 1,
            "rebalance_period must be >= 1"
        );

        anyhow::ensure!(self.strategy.lookback >= 1, "lookback must be >= 1");

        anyhow::ensure!(
            self.strategy.allocation_fraction > Decimal::ZERO
                && self.strategy.allocation_fraction <= Decimal::ONE,
            "allocation_fraction must be between 0 and 1"
        );

        anyhow::ensure!(
            self.strategy.mean_reversion_threshold >= Decimal::ZERO,
            "mean_reversion_threshold must be >= 0"
        );

        anyhow::ensure!(self.strategy.instances >= 1, "instances must be >= 1");

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            alpaca: AlpacaConfig::default(),
            strategy: StrategyConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for AlpacaConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            secret_key: String::new(),
            paper: default_paper(),
        }
    }
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            symbols: default_symbols(),
            rebalance_period: default_rebalance_period(),
            lookback: default_lookback(),
            timestep: default_timestep(),
            allocation_fraction: default_allocation_fraction(),
            mean_reversion_threshold: default_mean_reversion_threshold(),
            cadence_secs: 0,
            instances: default_instances(),
        }
    }
}
