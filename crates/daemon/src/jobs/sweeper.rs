use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::JobManager;

/// Periodically removes expired jobs until `shutdown` fires. The first sweep
/// happens one full `interval` after start.
pub fn spawn_retention_sweeper(
    manager: Arc<JobManager>,
    interval: Duration,
    max_age: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            interval_secs = interval.as_secs(),
            max_age_secs = max_age.as_secs(),
            "Retention sweeper started"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let report = manager.sweep(max_age).await;
                    debug!(records = report.records, workspaces = report.workspaces, "Sweep finished");
                }
            }
        }

        info!("Retention sweeper stopped");
    })
}
