//! Background task that keeps the queue directory fresh.
//!
//! The task refreshes once on start and then on every tick of the configured
//! interval. A slow refresh delays the next tick rather than stacking cycles.

use crate::directory::{QueueDirectory, RefreshError};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[cfg(test)]
#[path = "refresh_tests.rs"]
mod tests;

/// Spawner for the directory refresh loop
pub struct RefreshTask;

impl RefreshTask {
    /// Spawn the refresh loop on the current runtime
    pub fn spawn(directory: Arc<QueueDirectory>, refresh_interval: Duration) -> RefreshHandle {
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();

        let join = tokio::spawn(async move {
            run_refresh_loop(directory, refresh_interval, task_cancel).await;
        });

        RefreshHandle { cancel, join }
    }
}

/// Handle used to stop the refresh loop
pub struct RefreshHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl RefreshHandle {
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Cancel the loop and wait for it to exit
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.join.await {
            error!(error = %e, "Directory refresh task ended abnormally");
        }
    }
}

async fn run_refresh_loop(
    directory: Arc<QueueDirectory>,
    refresh_interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = interval(refresh_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        interval_secs = refresh_interval.as_secs(),
        "Directory refresh task started"
    );

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Directory refresh task shutting down");
                break;
            }
            _ = ticker.tick() => {
                match directory.refresh_with_cancellation(&cancel).await {
                    Ok(_) => {}
                    Err(RefreshError::Cancelled) => {
                        info!("Directory refresh task shutting down");
                        break;
                    }
                    Err(e) => error!(error = %e, "Directory refresh cycle failed"),
                }
            }
        }
    }
}
