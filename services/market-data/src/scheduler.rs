//! Periodic ingestion trigger
//!
//! Drives [`IngestionJob::run`] on a fixed interval. Runs are sequential:
//! a slow run delays the next tick instead of overlapping it, and ticks
//! missed while a run was in flight are skipped. A failed run is logged and
//! the loop keeps going.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{error, info};

use crate::ingestion::IngestionJob;

/// Runs an ingestion job on a fixed interval.
pub struct IngestionScheduler {
    job: Arc<IngestionJob>,
    interval: Duration,
}

impl IngestionScheduler {
    pub fn new(job: Arc<IngestionJob>, interval: Duration) -> Self {
        info!(interval_ms = interval.as_millis() as u64, "IngestionScheduler initialized");
        Self { job, interval }
    }

    /// Tick until `shutdown` resolves. The first run starts immediately.
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!(runs = self.job.runs(), "Ingestion scheduler stopping");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(err) = self.job.run().await {
                        error!(
                            error = %err,
                            failed_runs = self.job.failed_runs(),
                            "Ingestion run failed"
                        );
                    }
                }
            }
        }
    }

    /// Spawn the loop onto the runtime.
    pub fn spawn<F>(self, shutdown: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(self.run_until(shutdown))
    }
}
