//! Tokio heartbeat that drives a [`TickScheduler`] in real time.
//!
//! Used by the threaded profile. The cooperative profile calls
//! [`TickScheduler::tick`] from its own game loop instead.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use lapse_core::{LapseError, Result};

use crate::scheduler::TickScheduler;

/// A running heartbeat. Dropping it without [`shutdown`](Self::shutdown)
/// leaves the task running until the runtime stops.
pub struct HeartbeatHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<u64>,
}

impl HeartbeatHandle {
    /// Stop ticking and wait for the task to exit. Returns the ticks it drove.
    pub async fn shutdown(self) -> u64 {
        // A send error means the task already exited.
        let _ = self.shutdown_tx.send(true);
        match self.task.await {
            Ok(ticks) => ticks,
            Err(err) => {
                warn!(error = %err, "Heartbeat task did not finish cleanly");
                0
            }
        }
    }

    /// Whether the heartbeat task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Tick `scheduler` once per `period` on the current tokio runtime.
///
/// Late ticks are caught up in a burst so the tick count keeps pace with
/// wall time.
///
/// # Errors
/// Returns [`LapseError::InvalidInterval`] when `period` is zero.
///
/// # Panics
/// Panics if called outside a tokio runtime.
pub fn spawn_heartbeat(scheduler: Arc<TickScheduler>, period: Duration) -> Result<HeartbeatHandle> {
    if period.is_zero() {
        return Err(LapseError::InvalidInterval { what: "heartbeat" });
    }
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(run(scheduler, period, shutdown_rx));
    info!(?period, "Heartbeat started");
    Ok(HeartbeatHandle { shutdown_tx, task })
}

async fn run(scheduler: Arc<TickScheduler>, period: Duration, mut shutdown_rx: watch::Receiver<bool>) -> u64 {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);
    // The first tick completes immediately; start one period from now.
    ticker.tick().await;

    let mut driven = 0;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let ran = scheduler.tick();
                driven += 1;
                if ran > 0 {
                    debug!(tick = scheduler.current_tick(), tasks = ran, "Heartbeat tick");
                }
            }
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }
    info!(ticks = driven, "Heartbeat stopped");
    driven
}
