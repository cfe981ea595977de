//! Per-leg swap/hold decisions and position sizing.
//!
//! Pure functions: they look at one leg's position slot, the best-ranked
//! asset and a cash snapshot, and return the order intents to emit. The
//! caller owns submission and the subsequent state mutation.

use super::scoring::ScoredAsset;
use crate::broker::{OrderRequest, OrderSide};
use rust_decimal::Decimal;

/// Position slot of one sub-strategy leg.
///
/// Field access goes through methods so the quantity/symbol pairing cannot
/// drift apart: quantity is zero exactly when no symbol is held.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionState {
    held_symbol: Option<String>,
    held_quantity: Decimal,
}

impl PositionState {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn holding(symbol: impl Into<String>, quantity: Decimal) -> Self {
        debug_assert!(quantity > Decimal::ZERO);
        Self {
            held_symbol: Some(symbol.into()),
            held_quantity: quantity,
        }
    }

    pub fn held_symbol(&self) -> Option<&str> {
        self.held_symbol.as_deref()
    }

    pub fn held_quantity(&self) -> Decimal {
        self.held_quantity
    }

    pub fn is_empty(&self) -> bool {
        self.held_symbol.is_none()
    }

    pub fn set(&mut self, symbol: impl Into<String>, quantity: Decimal) {
        self.held_symbol = Some(symbol.into());
        self.held_quantity = quantity;
    }

    pub fn clear(&mut self) {
        self.held_symbol = None;
        self.held_quantity = Decimal::ZERO;
    }
}

/// Why a leg did nothing this cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// Sized quantity was zero or its notional exceeded available cash.
    InsufficientCash {
        symbol: String,
        price: Decimal,
        cash: Decimal,
    },
}

/// Outcome of one leg's decision.
#[derive(Debug, Clone, PartialEq)]
pub enum LegAction {
    /// Best asset is already held (or the leg is gated); emit nothing.
    Hold,
    /// No prior position: open only.
    Enter { open: OrderRequest },
    /// Replace the held asset: close must be emitted before open.
    Swap {
        close: OrderRequest,
        open: OrderRequest,
    },
    /// Leg funded decision failed; state stays untouched.
    Skip(SkipReason),
}

/// Whole shares affordable with `fraction` of the cash snapshot.
pub fn size_position(fraction: Decimal, cash: Decimal, price: Decimal) -> Decimal {
    if price <= Decimal::ZERO || cash <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    (fraction * cash / price).floor()
}

/// Momentum leg: hold the best asset, swap when a better one appears.
pub fn decide_momentum_leg(
    position: &PositionState,
    best: &ScoredAsset,
    cash: Decimal,
    allocation_fraction: Decimal,
) -> LegAction {
    decide_leg(position, best, cash, allocation_fraction)
}

/// Mean-reversion leg: same mechanics as momentum, but the leg only acts when
/// the candidate's move is large enough; below the threshold it holds
/// regardless of symbol change.
pub fn decide_mean_reversion_leg(
    position: &PositionState,
    best: &ScoredAsset,
    return_value: Decimal,
    cash: Decimal,
    allocation_fraction: Decimal,
    threshold: Decimal,
) -> LegAction {
    if return_value.abs() <= threshold {
        return LegAction::Hold;
    }
    decide_leg(position, best, cash, allocation_fraction)
}

fn decide_leg(
    position: &PositionState,
    best: &ScoredAsset,
    cash: Decimal,
    allocation_fraction: Decimal,
) -> LegAction {
    if position.held_symbol() == Some(best.symbol.as_str()) {
        return LegAction::Hold;
    }

    let quantity = size_position(allocation_fraction, cash, best.price);
    // Flooring bounds the notional by fraction * cash, but a zero quantity or
    // a stale snapshot still has to be caught before any intent is emitted.
    if quantity < Decimal::ONE || quantity * best.price > cash {
        return LegAction::Skip(SkipReason::InsufficientCash {
            symbol: best.symbol.clone(),
            price: best.price,
            cash,
        });
    }

    let open = OrderRequest::new(best.symbol.clone(), quantity, OrderSide::Buy);
    match position.held_symbol() {
        Some(held) => LegAction::Swap {
            close: OrderRequest::new(held, position.held_quantity(), OrderSide::Sell),
            open,
        },
        None => LegAction::Enter { open },
    }
}
