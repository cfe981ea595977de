//! # Asset Rotator
//!
//! A Rust application that rotates capital between the strongest and the most
//! oversold assets of a configurable universe, on a fixed rebalancing cadence.
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `broker`: Alpaca API client plus a mock broker for paper trading
//! - `strategy`: The rotation decision engine (momentum + mean-reversion legs)
//! - `supervisor`: Runs strategy instances concurrently and coordinates shutdown

pub mod broker;
pub mod config;
pub mod strategy;
pub mod supervisor;

pub use config::Config;
