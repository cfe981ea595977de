//! Collaborator interfaces consumed by the decision engine.
//!
//! The engine never talks to a venue directly; it sees one trait for
//! historical bars and one for account state and order submission. Both the
//! Alpaca client and the mock broker implement the pair.

use super::types::{BarSet, Order, OrderId, OrderRequest, Position, Timestep};
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Historical price-bar retrieval.
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Fetch `lookback + 2` bars per symbol at the given granularity.
    ///
    /// Symbols without data are simply absent from the returned map; the
    /// caller decides how to degrade.
    async fn get_bars(
        &self,
        symbols: &[String],
        lookback: usize,
        timestep: Timestep,
    ) -> Result<HashMap<String, BarSet>>;
}

/// Account queries and order submission.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Build an order handle from a request. Pure construction, no I/O.
    fn create_order(&self, request: OrderRequest) -> Order {
        Order {
            symbol: request.symbol,
            quantity: request.quantity,
            side: request.side,
            stop_price: request.stop_price,
            take_profit_price: request.take_profit_price,
        }
    }

    /// Submit a previously created order.
    async fn submit_order(&self, order: &Order) -> Result<OrderId>;

    /// Current position for a symbol, or `None` when flat.
    async fn get_position(&self, symbol: &str) -> Result<Option<Position>>;

    /// Cash available for new orders.
    async fn get_cash(&self) -> Result<Decimal>;

    /// Total account value (cash + marked positions), refreshed per call.
    async fn portfolio_value(&self) -> Result<Decimal>;

    /// Whether the venue is currently accepting orders.
    async fn is_market_open(&self) -> Result<bool>;
}
