//! Type definitions for market data and order submission.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bar granularity supported by the data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timestep {
    Day,
    Minute,
}

impl Timestep {
    /// Timeframe string in Alpaca's data API format.
    pub fn as_timeframe(&self) -> &'static str {
        match self {
            Timestep::Day => "1Day",
            Timestep::Minute => "1Min",
        }
    }
}

/// A single OHLCV bar.
#[derive(Debug, Clone, Deserialize)]
pub struct Bar {
    #[serde(rename = "t")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "o")]
    pub open: Decimal,
    #[serde(rename = "h")]
    pub high: Decimal,
    #[serde(rename = "l")]
    pub low: Decimal,
    #[serde(rename = "c")]
    pub close: Decimal,
    #[serde(rename = "v")]
    pub volume: Decimal,
}

/// A window of bars for one symbol, most recent last.
#[derive(Debug, Clone)]
pub struct BarSet {
    pub symbol: String,
    pub bars: Vec<Bar>,
}

impl BarSet {
    pub fn new(symbol: impl Into<String>, bars: Vec<Bar>) -> Self {
        Self {
            symbol: symbol.into(),
            bars,
        }
    }

    /// Close of the most recent bar, if any.
    pub fn last_price(&self) -> Option<Decimal> {
        self.bars.last().map(|b| b.close)
    }

    /// Fractional price change between two bars, addressed as offsets from the
    /// most recent bar (0 = latest). `start_offset` must be the older bar.
    /// Not annualized. Returns `None` when the window is too short or the
    /// start close is zero.
    pub fn return_over(&self, start_offset: usize, end_offset: usize) -> Option<Decimal> {
        let len = self.bars.len();
        if start_offset <= end_offset || start_offset >= len {
            return None;
        }
        let start = self.bars[len - 1 - start_offset].close;
        let end = self.bars[len - 1 - end_offset].close;
        if start == Decimal::ZERO {
            return None;
        }
        Some((end - start) / start)
    }

    /// Simple moving average of the last `window` closes.
    pub fn moving_average(&self, window: usize) -> Option<Decimal> {
        if window == 0 || self.bars.len() < window {
            return None;
        }
        let sum: Decimal = self.bars[self.bars.len() - window..]
            .iter()
            .map(|b| b.close)
            .sum();
        Some(sum / Decimal::from(window as u64))
    }
}

/// Order direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "buy",
            OrderSide::Sell => "sell",
        }
    }
}

/// Parameters for constructing an order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub symbol: String,
    pub quantity: Decimal,
    pub side: OrderSide,
    pub stop_price: Option<Decimal>,
    pub take_profit_price: Option<Decimal>,
}

impl OrderRequest {
    pub fn new(symbol: impl Into<String>, quantity: Decimal, side: OrderSide) -> Self {
        Self {
            symbol: symbol.into(),
            quantity,
            side,
            stop_price: None,
            take_profit_price: None,
        }
    }
}

/// An order handle produced by `Broker::create_order`, ready for submission.
#[derive(Debug, Clone)]
pub struct Order {
    pub symbol: String,
    pub quantity: Decimal,
    pub side: OrderSide,
    pub stop_price: Option<Decimal>,
    pub take_profit_price: Option<Decimal>,
}

/// Broker-assigned identifier of a submitted order.
pub type OrderId = String;

/// An open position reported by the broker.
#[derive(Debug, Clone)]
pub struct Position {
    pub symbol: String,
    pub quantity: Decimal,
}

/// Errors surfaced by broker/data collaborators.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn bar(close: Decimal) -> Bar {
        Bar {
            timestamp: Utc::now(),
            open: close,
            high: close,
            low: close,
            close,
            volume: dec!(1000),
        }
    }

    fn barset(closes: &[Decimal]) -> BarSet {
        BarSet::new("TEST", closes.iter().copied().map(bar).collect())
    }

    #[test]
    fn test_last_price_is_latest_close() {
        let bars = barset(&[dec!(100), dec!(101), dec!(105)]);
        assert_eq!(bars.last_price(), Some(dec!(105)));
        assert_eq!(barset(&[]).last_price(), None);
    }

    #[test]
    fn test_return_over_excludes_latest_bar() {
        // Offsets 3..1 span the window ending "yesterday".
        let bars = barset(&[dec!(100), dec!(102), dec!(105), dec!(200)]);
        assert_eq!(bars.return_over(3, 1), Some(dec!(0.05)));
    }

    #[test]
    fn test_return_over_short_window_is_none() {
        let bars = barset(&[dec!(100), dec!(105)]);
        assert_eq!(bars.return_over(3, 1), None);
    }

    #[test]
    fn test_return_over_rejects_inverted_offsets() {
        let bars = barset(&[dec!(100), dec!(102), dec!(105)]);
        assert_eq!(bars.return_over(1, 1), None);
        assert_eq!(bars.return_over(0, 1), None);
    }

    #[test]
    fn test_moving_average() {
        let bars = barset(&[dec!(10), dec!(20), dec!(30), dec!(40)]);
        assert_eq!(bars.moving_average(2), Some(dec!(35)));
        assert_eq!(bars.moving_average(4), Some(dec!(25)));
        assert_eq!(bars.moving_average(5), None);
        assert_eq!(bars.moving_average(0), None);
    }

    #[test]
    fn test_timestep_timeframe_strings() {
        assert_eq!(Timestep::Day.as_timeframe(), "1Day");
        assert_eq!(Timestep::Minute.as_timeframe(), "1Min");
    }
}
