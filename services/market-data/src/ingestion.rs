//! Price ingestion job
//!
//! One run = one harvest cycle: fetch the full snapshot from the feed,
//! parse and encode every entry, and hand the whole batch to the store in a
//! single write. Malformed keys are dropped (see [`crate::keys`]); a feed or
//! store failure fails the run and nothing is retried here. Scheduling and
//! retry policy belong to the caller (see [`crate::scheduler`]).
//!
//! Runs are not deduplicated: every successful run appends a fresh set of
//! observations stamped at write time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::encoder;
use crate::feed::{FeedError, PriceFeed};
use crate::keys;
use crate::store::{StoreError, TimeSeriesStore};

/// Errors that fail an ingestion run.
#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("price feed unavailable: {0}")]
    FeedUnavailable(#[from] FeedError),

    #[error("storage write failed: {0}")]
    StorageWrite(#[source] StoreError),
}

/// Summary of one successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestionReport {
    /// Identifier of this run (UUID v7, time-sortable).
    pub run_id: Uuid,
    /// Entries in the fetched snapshot.
    pub fetched: usize,
    /// Observations handed to the store.
    pub written: usize,
    /// Entries dropped for malformed keys.
    pub rejected: usize,
    /// Wall time from fetch start to write completion.
    pub elapsed: Duration,
}

/// Fetches, encodes and persists price snapshots.
pub struct IngestionJob {
    feed: Arc<dyn PriceFeed>,
    store: Arc<dyn TimeSeriesStore>,
    /// Runs started since creation.
    runs: AtomicU64,
    /// Runs that ended in an error.
    failed_runs: AtomicU64,
    /// Observations written since creation.
    observations_written: AtomicU64,
    /// Snapshot keys dropped as malformed since creation.
    keys_rejected: AtomicU64,
}

impl IngestionJob {
    pub fn new(feed: Arc<dyn PriceFeed>, store: Arc<dyn TimeSeriesStore>) -> Self {
        Self {
            feed,
            store,
            runs: AtomicU64::new(0),
            failed_runs: AtomicU64::new(0),
            observations_written: AtomicU64::new(0),
            keys_rejected: AtomicU64::new(0),
        }
    }

    /// Run one harvest cycle.
    pub async fn run(&self) -> Result<IngestionReport, IngestionError> {
        let run_id = Uuid::now_v7();
        let started = Instant::now();
        self.runs.fetch_add(1, Ordering::Relaxed);

        info!(%run_id, "Fetching latest crypto prices across all markets and pairs");

        let snapshot = match self.feed.fetch_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                self.failed_runs.fetch_add(1, Ordering::Relaxed);
                error!(%run_id, error = %err, "Price feed fetch failed");
                return Err(IngestionError::FeedUnavailable(err));
            }
        };

        let parsed = keys::parse_snapshot(&snapshot);
        let batch = encoder::encode_all(&parsed.entries);

        if batch.is_empty() {
            warn!(
                %run_id,
                fetched = snapshot.len(),
                rejected = parsed.rejected_count(),
                "No valid price entries in snapshot, skipping write"
            );
        } else if let Err(err) = self.store.write(&batch).await {
            self.failed_runs.fetch_add(1, Ordering::Relaxed);
            error!(%run_id, points = batch.len(), error = %err, "Storage write failed");
            return Err(IngestionError::StorageWrite(err));
        }

        self.observations_written
            .fetch_add(batch.len() as u64, Ordering::Relaxed);
        self.keys_rejected
            .fetch_add(parsed.rejected_count() as u64, Ordering::Relaxed);

        let report = IngestionReport {
            run_id,
            fetched: snapshot.len(),
            written: batch.len(),
            rejected: parsed.rejected_count(),
            elapsed: started.elapsed(),
        };

        info!(
            %run_id,
            fetched = report.fetched,
            written = report.written,
            rejected = report.rejected,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Price metrics written to storage"
        );

        Ok(report)
    }

    /// Total runs started since creation.
    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::Relaxed)
    }

    /// Total runs that failed since creation.
    pub fn failed_runs(&self) -> u64 {
        self.failed_runs.load(Ordering::Relaxed)
    }

    /// Total observations written since creation.
    pub fn observations_written(&self) -> u64 {
        self.observations_written.load(Ordering::Relaxed)
    }

    /// Total malformed keys dropped since creation.
    pub fn keys_rejected(&self) -> u64 {
        self.keys_rejected.load(Ordering::Relaxed)
    }
}
