//! The rotation strategy: one momentum leg and one mean-reversion leg
//! sharing a single cash pool.

use super::decision::{
    decide_mean_reversion_leg, decide_momentum_leg, LegAction, PositionState, SkipReason,
};
use super::scoring::{compute_scores, observe, select_best, SelectionMode};
use super::trace::{self, CycleSnapshot};
use super::traits::{Strategy, StrategyHandle};
use crate::broker::{Broker, MarketData, OrderRequest};
use crate::config::StrategyConfig;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

const MARKET_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Mutable engine state owned by one strategy instance. Cycles execute
/// strictly sequentially under the lock.
#[derive(Debug, Default)]
struct EngineState {
    counter: u32,
    momentum: PositionState,
    mean_reversion: PositionState,
}

/// A single rotation strategy instance.
pub struct RotationStrategy<B> {
    name: String,
    config: StrategyConfig,
    broker: Arc<B>,
    state: Mutex<EngineState>,
    handle: StrategyHandle,
}

impl<B> RotationStrategy<B>
where
    B: Broker + MarketData,
{
    pub fn new(name: impl Into<String>, config: StrategyConfig, broker: Arc<B>) -> Self {
        Self {
            name: name.into(),
            config,
            broker,
            state: Mutex::new(EngineState::default()),
            handle: StrategyHandle::new(),
        }
    }

    /// One decision cycle. Never fails: every collaborator error degrades to
    /// a logged no-op for the affected symbol, leg, or cycle.
    async fn run_cycle(&self, state: &mut EngineState) {
        let cfg = &self.config;

        let portfolio_value = self.broker.portfolio_value().await.ok();
        let before = CycleSnapshot {
            momentum: state.momentum.clone(),
            mean_reversion: state.mean_reversion.clone(),
            cash: self.broker.get_cash().await.ok(),
            portfolio_value,
        };

        let bars = match self
            .broker
            .get_bars(&cfg.symbols, cfg.lookback, cfg.timestep)
            .await
        {
            Ok(bars) => bars,
            Err(e) => {
                warn!(strategy = %self.name, error = %e, "Bar fetch failed; cycle is a no-op");
                return;
            }
        };

        let observations = observe(&bars, &cfg.symbols, cfg.lookback, cfg.timestep);
        if observations.is_empty() {
            warn!(strategy = %self.name, "No usable data for any symbol; cycle is a no-op");
            return;
        }
        let (momentum_list, mean_reversion_list) = compute_scores(&observations);

        if let Some(best) = select_best(&momentum_list, SelectionMode::Momentum) {
            match self.broker.get_cash().await {
                Ok(cash) => {
                    let action =
                        decide_momentum_leg(&state.momentum, best, cash, cfg.allocation_fraction);
                    self.apply_leg("momentum", &mut state.momentum, action).await;
                }
                Err(e) => {
                    warn!(strategy = %self.name, error = %e, "Cash query failed; momentum leg skipped")
                }
            }
        }

        // Fresh cash snapshot between the legs: the momentum buy just spent
        // part of the shared pool.
        if let Some(best) = select_best(&mean_reversion_list, SelectionMode::MeanReversion) {
            match self.broker.get_cash().await {
                Ok(cash) => {
                    let action = decide_mean_reversion_leg(
                        &state.mean_reversion,
                        best,
                        best.score,
                        cash,
                        cfg.allocation_fraction,
                        cfg.mean_reversion_threshold,
                    );
                    self.apply_leg("mean-reversion", &mut state.mean_reversion, action)
                        .await;
                }
                Err(e) => {
                    warn!(strategy = %self.name, error = %e, "Cash query failed; mean-reversion leg skipped")
                }
            }
        }

        let after = CycleSnapshot {
            momentum: state.momentum.clone(),
            mean_reversion: state.mean_reversion.clone(),
            cash: self.broker.get_cash().await.ok(),
            portfolio_value,
        };
        trace::emit(
            &self.name,
            &trace::cycle_trace_row(&before, &after, &momentum_list, &mean_reversion_list),
        );
    }

    /// Emit a leg's order intents and update its position slot afterwards.
    /// The close intent always goes out before the open intent.
    async fn apply_leg(&self, leg: &'static str, position: &mut PositionState, action: LegAction) {
        match action {
            LegAction::Hold => {
                if let Some(symbol) = position.held_symbol() {
                    info!(
                        strategy = %self.name,
                        leg,
                        %symbol,
                        quantity = %position.held_quantity(),
                        "Keeping current position"
                    );
                }
            }
            LegAction::Skip(SkipReason::InsufficientCash {
                symbol,
                price,
                cash,
            }) => {
                warn!(
                    strategy = %self.name,
                    leg,
                    %symbol,
                    %price,
                    %cash,
                    "Not enough cash to take the position; leg skipped this cycle"
                );
            }
            LegAction::Enter { open } => {
                if self.submit(leg, &open).await {
                    position.set(open.symbol, open.quantity);
                }
            }
            LegAction::Swap { close, open } => {
                info!(
                    strategy = %self.name,
                    leg,
                    from = %close.symbol,
                    to = %open.symbol,
                    "Swapping position"
                );
                if !self.submit(leg, &close).await {
                    // Close never went out: keep the old position on the books.
                    return;
                }
                position.clear();
                if self.submit(leg, &open).await {
                    position.set(open.symbol, open.quantity);
                }
            }
        }
    }

    async fn submit(&self, leg: &'static str, request: &OrderRequest) -> bool {
        let order = self.broker.create_order(request.clone());
        match self.broker.submit_order(&order).await {
            Ok(order_id) => {
                info!(
                    strategy = %self.name,
                    leg,
                    symbol = %order.symbol,
                    side = ?order.side,
                    quantity = %order.quantity,
                    %order_id,
                    "Order submitted"
                );
                true
            }
            Err(e) => {
                error!(
                    strategy = %self.name,
                    leg,
                    symbol = %order.symbol,
                    side = ?order.side,
                    error = %e,
                    "Order submission failed"
                );
                false
            }
        }
    }
}

#[async_trait]
impl<B> Strategy for RotationStrategy<B>
where
    B: Broker + MarketData + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self) -> &StrategyHandle {
        &self.handle
    }

    async fn on_trading_iteration(&self) {
        let mut state = self.state.lock().await;

        let market_open = match self.broker.is_market_open().await {
            Ok(open) => open,
            Err(e) => {
                warn!(strategy = %self.name, error = %e, "Market clock query failed");
                false
            }
        };

        // Fires immediately on the first call, then every `period` calls.
        if market_open
            && (state.counter == 0 || state.counter == self.config.rebalance_period)
        {
            state.counter = 0;
            self.run_cycle(&mut state).await;
        }
        state.counter += 1;
    }

    async fn idle_until_next_iteration(&self) {
        if self.config.cadence_secs > 0 {
            tokio::time::sleep(Duration::from_secs(self.config.cadence_secs)).await;
            return;
        }

        // Cadence 0: ride out the current session, then wait for the next
        // open. Clock errors degrade to another poll round.
        while matches!(self.broker.is_market_open().await, Ok(true)) {
            tokio::time::sleep(MARKET_POLL_INTERVAL).await;
        }
        loop {
            match self.broker.is_market_open().await {
                Ok(true) => return,
                _ => tokio::time::sleep(MARKET_POLL_INTERVAL).await,
            }
        }
    }
}
