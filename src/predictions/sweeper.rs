//! Background resolution sweep
//!
//! Periodically asks the lifecycle engine to resolve mature pending
//! predictions. The loop never holds any lock between records and keeps
//! running through individual failures.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::predictions::PredictionEngine;

pub struct ResolutionSweeper {
    engine: Arc<PredictionEngine>,
}

impl ResolutionSweeper {
    pub fn new(engine: Arc<PredictionEngine>) -> Self {
        Self { engine }
    }

    /// Spawn the sweep loop as a detached task
    pub fn spawn(self) -> JoinHandle<()> {
        let interval = Duration::from_secs(self.engine.sweep_interval_secs());
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                match self.engine.resolve_mature().await {
                    Ok(0) => {}
                    Ok(resolved) => info!(resolved, "resolution sweep settled predictions"),
                    Err(e) => warn!(error = %e, "resolution sweep failed"),
                }
            }
        })
    }
}
