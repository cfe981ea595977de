//! Execution supervisor: runs strategy instances concurrently and owns the
//! coordinated shutdown sequence.

use crate::strategy::Strategy;
use anyhow::{bail, Result};
use futures_util::future;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

/// Cloneable trigger for the supervisor's shutdown path. The Ctrl-C handler
/// drives one of these; tests and embedders can hold another.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    shutdown_tx: watch::Sender<bool>,
}

impl ShutdownHandle {
    pub fn trigger(&self) {
        self.shutdown_tx.send_replace(true);
    }
}

/// Owns a set of strategy instances and their worker tasks.
pub struct Supervisor {
    strategies: Vec<Arc<dyn Strategy>>,
    shutdown_tx: watch::Sender<bool>,
}

impl Supervisor {
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
            shutdown_tx: watch::Sender::new(false),
        }
    }

    /// Register a strategy instance. Names must be unique so shutdown logs
    /// and trace rows stay attributable.
    pub fn add_strategy(&mut self, strategy: Arc<dyn Strategy>) -> Result<()> {
        if self.strategies.iter().any(|s| s.name() == strategy.name()) {
            bail!("duplicate strategy name: {}", strategy.name());
        }
        info!(strategy = strategy.name(), "Strategy registered");
        self.strategies.push(strategy);
        Ok(())
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            shutdown_tx: self.shutdown_tx.clone(),
        }
    }

    /// Run every registered strategy on its own task and block until they
    /// all finish or a shutdown is triggered (Ctrl-C or a `ShutdownHandle`).
    pub async fn run_all(self) {
        let shutdown = self.shutdown_handle();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Shutdown signal received");
                    shutdown.trigger();
                }
                Err(e) => warn!(error = %e, "Failed to listen for the shutdown signal"),
            }
        });

        let handles: Vec<_> = self
            .strategies
            .iter()
            .map(|strategy| {
                let strategy = strategy.clone();
                tokio::spawn(async move {
                    strategy.run().await;
                    // Natural completion counts as ready for the close-out.
                    strategy.handle().set_ready_to_close();
                })
            })
            .collect();

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        tokio::select! {
            _ = future::join_all(handles) => {
                info!("All strategies finished");
            }
            _ = async { let _ = shutdown_rx.wait_for(|requested| *requested).await; } => {
                self.abrupt_closing().await;
            }
        }
        info!("Trading finished");
    }

    /// Coordinated close-out: run every instance's cleanup hook, flag it
    /// ready, ask its loop to stop, then wait for all readiness flags.
    async fn abrupt_closing(&self) {
        for strategy in &self.strategies {
            info!(
                strategy = strategy.name(),
                "Executing the on_abrupt_closing event method"
            );
            strategy.on_abrupt_closing().await;
            strategy.handle().set_ready_to_close();
            strategy.handle().request_close();
        }
        self.wait_for_all_ready().await;
    }

    /// Block until every instance has reported ready-to-close. No timeout:
    /// a hook that never finishes keeps the shutdown blocked, visibly.
    async fn wait_for_all_ready(&self) {
        for strategy in &self.strategies {
            strategy.handle().ready().await;
            info!(strategy = strategy.name(), "Strategy ready to close");
        }
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}
