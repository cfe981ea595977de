//! Broker and market-data collaborators.
//!
//! ## Alpaca
//! REST connectivity for:
//! - Historical bars (daily and minute granularity)
//! - Account state (cash, portfolio value, market clock)
//! - Order submission and position queries
//!
//! ## Mock
//! In-memory broker with instant fills for paper trading and tests.

mod alpaca;
pub mod mock;
mod traits;
mod types;

pub use alpaca::AlpacaClient;
pub use mock::MockBroker;
pub use traits::{Broker, MarketData};
pub use types::*;
