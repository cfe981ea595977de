//! Mock broker for paper trading and tests.
//!
//! Keeps cash, positions and canned bar windows in memory. Submitted orders
//! fill immediately at the symbol's latest close so that the engine's
//! optimistic bookkeeping can be cross-checked against broker state.

use super::traits::{Broker, MarketData};
use super::types::{Bar, BarSet, Order, OrderId, Position, Timestep};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Default)]
struct MockBrokerState {
    cash: Decimal,
    market_open: bool,
    positions: HashMap<String, Decimal>,
    bars: HashMap<String, BarSet>,
    failing_symbols: HashSet<String>,
    submitted: Vec<Order>,
    order_seq: u64,
}

/// In-memory broker + data source with instant fills.
pub struct MockBroker {
    state: Arc<RwLock<MockBrokerState>>,
}

impl MockBroker {
    /// Create a mock broker with the given starting cash. Market starts open.
    pub fn new(cash: Decimal) -> Self {
        let state = MockBrokerState {
            cash,
            market_open: true,
            ..Default::default()
        };
        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// Install a bar window for a symbol from a list of closes (oldest first).
    pub async fn set_closes(&self, symbol: &str, closes: &[Decimal]) {
        let bars = closes_to_bars(closes);
        self.state
            .write()
            .await
            .bars
            .insert(symbol.to_string(), BarSet::new(symbol, bars));
    }

    /// Mark a symbol's data as unavailable; `get_bars` will omit it.
    pub async fn fail_symbol(&self, symbol: &str) {
        self.state
            .write()
            .await
            .failing_symbols
            .insert(symbol.to_string());
    }

    pub async fn set_market_open(&self, open: bool) {
        self.state.write().await.market_open = open;
    }

    pub async fn set_cash(&self, cash: Decimal) {
        self.state.write().await.cash = cash;
    }

    /// All orders submitted so far, in submission order.
    pub async fn submitted_orders(&self) -> Vec<Order> {
        self.state.read().await.submitted.clone()
    }

    pub async fn position_quantity(&self, symbol: &str) -> Decimal {
        self.state
            .read()
            .await
            .positions
            .get(symbol)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }
}

/// Build synthetic daily bars from a close series (oldest first).
fn closes_to_bars(closes: &[Decimal]) -> Vec<Bar> {
    let start = Utc::now() - Duration::days(closes.len() as i64);
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Bar {
            timestamp: start + Duration::days(i as i64),
            open: close,
            high: close,
            low: close,
            close,
            volume: Decimal::from(1_000u64),
        })
        .collect()
}

#[async_trait]
impl MarketData for MockBroker {
    async fn get_bars(
        &self,
        symbols: &[String],
        _lookback: usize,
        _timestep: Timestep,
    ) -> Result<HashMap<String, BarSet>> {
        let state = self.state.read().await;
        Ok(symbols
            .iter()
            .filter(|s| !state.failing_symbols.contains(*s))
            .filter_map(|s| state.bars.get(s).map(|b| (s.clone(), b.clone())))
            .collect())
    }
}

#[async_trait]
impl Broker for MockBroker {
    async fn submit_order(&self, order: &Order) -> Result<OrderId> {
        let mut state = self.state.write().await;

        let price = state
            .bars
            .get(&order.symbol)
            .and_then(|b| b.last_price())
            .ok_or_else(|| anyhow!("no price for {}", order.symbol))?;

        let notional = order.quantity * price;
        match order.side {
            super::types::OrderSide::Buy => {
                state.cash -= notional;
                *state
                    .positions
                    .entry(order.symbol.clone())
                    .or_insert(Decimal::ZERO) += order.quantity;
            }
            super::types::OrderSide::Sell => {
                state.cash += notional;
                let remaining = {
                    let qty = state
                        .positions
                        .entry(order.symbol.clone())
                        .or_insert(Decimal::ZERO);
                    *qty -= order.quantity;
                    *qty
                };
                if remaining == Decimal::ZERO {
                    state.positions.remove(&order.symbol);
                }
            }
        }

        state.submitted.push(order.clone());
        state.order_seq += 1;
        let id = format!("mock-{}", state.order_seq);
        debug!(
            symbol = %order.symbol,
            side = ?order.side,
            quantity = %order.quantity,
            %price,
            order_id = %id,
            "Mock fill"
        );
        Ok(id)
    }

    async fn get_position(&self, symbol: &str) -> Result<Option<Position>> {
        Ok(self
            .state
            .read()
            .await
            .positions
            .get(symbol)
            .map(|&quantity| Position {
                symbol: symbol.to_string(),
                quantity,
            }))
    }

    async fn get_cash(&self) -> Result<Decimal> {
        Ok(self.state.read().await.cash)
    }

    async fn portfolio_value(&self) -> Result<Decimal> {
        let state = self.state.read().await;
        let mut value = state.cash;
        for (symbol, qty) in &state.positions {
            if let Some(price) = state.bars.get(symbol).and_then(|b| b.last_price()) {
                value += *qty * price;
            }
        }
        Ok(value)
    }

    async fn is_market_open(&self) -> Result<bool> {
        Ok(self.state.read().await.market_open)
    }
}
