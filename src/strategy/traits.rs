//! Lifecycle surface a strategy instance exposes to the supervisor.

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{error, info};

/// Control flags shared between a strategy's worker task and the supervisor.
///
/// Both flags are single-writer/multi-reader watch channels: the close flag
/// is written by the shutdown path and read at cycle boundaries; the
/// readiness flag is set once after the abrupt-close hook has run. Waiting
/// sides block on the channel instead of busy-polling.
#[derive(Debug)]
pub struct StrategyHandle {
    close_tx: watch::Sender<bool>,
    ready_tx: watch::Sender<bool>,
}

impl StrategyHandle {
    pub fn new() -> Self {
        Self {
            close_tx: watch::Sender::new(false),
            ready_tx: watch::Sender::new(false),
        }
    }

    /// Ask the worker loop to stop at the next cycle boundary.
    pub fn request_close(&self) {
        self.close_tx.send_replace(true);
    }

    pub fn close_requested(&self) -> bool {
        *self.close_tx.borrow()
    }

    /// Mark the instance as done with its close-out.
    pub fn set_ready_to_close(&self) {
        self.ready_tx.send_replace(true);
    }

    pub fn ready_to_close(&self) -> bool {
        *self.ready_tx.borrow()
    }

    /// Resolve once close has been requested.
    pub async fn closed(&self) {
        let mut rx = self.close_tx.subscribe();
        // The sender lives in this handle, so the channel cannot drop early.
        let _ = rx.wait_for(|closed| *closed).await;
    }

    /// Resolve once the instance has reported ready-to-close. Unbounded.
    pub async fn ready(&self) {
        let mut rx = self.ready_tx.subscribe();
        let _ = rx.wait_for(|ready| *ready).await;
    }
}

impl Default for StrategyHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// A runnable strategy instance.
///
/// The supervisor drives `run()` on its own task and reaches the instance
/// through `handle()` and `on_abrupt_closing()` during shutdown.
#[async_trait]
pub trait Strategy: Send + Sync {
    fn name(&self) -> &str;

    fn handle(&self) -> &StrategyHandle;

    /// One-time setup before the first iteration.
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    /// One outer step: may or may not fire a decision cycle.
    async fn on_trading_iteration(&self);

    /// Cleanup hook invoked on signal-triggered shutdown. Default no-op.
    async fn on_abrupt_closing(&self) {}

    /// Suspend until the next iteration is due (cadence or market close).
    async fn idle_until_next_iteration(&self);

    /// Worker entry point: iterate until close is requested, checking the
    /// flag only at cycle boundaries so an in-flight cycle always finishes.
    async fn run(&self) {
        if let Err(e) = self.initialize().await {
            error!(strategy = self.name(), error = %e, "Initialization failed");
            self.handle().set_ready_to_close();
            return;
        }
        info!(strategy = self.name(), "Strategy started");

        loop {
            if self.handle().close_requested() {
                break;
            }
            self.on_trading_iteration().await;
            tokio::select! {
                _ = self.idle_until_next_iteration() => {}
                _ = self.handle().closed() => break,
            }
        }

        info!(strategy = self.name(), "Strategy loop terminated");
    }
}
