//! Per-cycle observability row.
//!
//! Flat ordered mapping from string keys to values, built once per decision
//! cycle and emitted as a single structured log line. Not a behavioral
//! contract.

use super::decision::PositionState;
use super::scoring::ScoredAsset;
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::info;

/// State captured on either side of a decision cycle.
#[derive(Debug, Clone)]
pub struct CycleSnapshot {
    pub momentum: PositionState,
    pub mean_reversion: PositionState,
    pub cash: Option<Decimal>,
    pub portfolio_value: Option<Decimal>,
}

fn symbol_value(position: &PositionState) -> Value {
    position
        .held_symbol()
        .map(|s| Value::String(s.to_string()))
        .unwrap_or(Value::Null)
}

fn decimal_value(value: Decimal) -> Value {
    Value::String(value.to_string())
}

fn optional_value(value: Option<Decimal>) -> Value {
    value.map(decimal_value).unwrap_or(Value::Null)
}

/// Build the trace row for one cycle.
pub fn cycle_trace_row(
    before: &CycleSnapshot,
    after: &CycleSnapshot,
    momentum: &[ScoredAsset],
    mean_reversion: &[ScoredAsset],
) -> BTreeMap<String, Value> {
    let mut row = BTreeMap::new();

    row.insert("old_momentum_symbol".to_string(), symbol_value(&before.momentum));
    row.insert(
        "old_momentum_quantity".to_string(),
        decimal_value(before.momentum.held_quantity()),
    );
    row.insert(
        "old_mean_reversion_symbol".to_string(),
        symbol_value(&before.mean_reversion),
    );
    row.insert(
        "old_mean_reversion_quantity".to_string(),
        decimal_value(before.mean_reversion.held_quantity()),
    );
    row.insert("old_cash".to_string(), optional_value(before.cash));
    row.insert(
        "old_portfolio_value".to_string(),
        optional_value(before.portfolio_value),
    );

    row.insert("new_momentum_symbol".to_string(), symbol_value(&after.momentum));
    row.insert(
        "new_momentum_quantity".to_string(),
        decimal_value(after.momentum.held_quantity()),
    );
    row.insert(
        "new_mean_reversion_symbol".to_string(),
        symbol_value(&after.mean_reversion),
    );
    row.insert(
        "new_mean_reversion_quantity".to_string(),
        decimal_value(after.mean_reversion.held_quantity()),
    );

    for asset in momentum {
        row.insert(
            format!("{}_momentum_return", asset.symbol),
            decimal_value(asset.score),
        );
        row.insert(
            format!("{}_momentum_price", asset.symbol),
            decimal_value(asset.price),
        );
    }
    for asset in mean_reversion {
        row.insert(
            format!("{}_mean_reversion_return", asset.symbol),
            decimal_value(asset.score),
        );
    }

    row
}

/// Emit one trace row as a structured log line.
pub fn emit(strategy: &str, row: &BTreeMap<String, Value>) {
    let json = serde_json::to_string(row).unwrap_or_default();
    info!(target: "cycle_trace", %strategy, row = %json, "Cycle trace");
}
