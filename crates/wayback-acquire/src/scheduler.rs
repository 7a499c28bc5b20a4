use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::{self, JoinError, JoinSet};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use wayback_model::{FailureReason, RetrievalOutcome, RunSummary, RunTally, SnapshotId, SnapshotStore};

use crate::config::RetrievalConfig;
use crate::limiter::ConcurrencyLimiter;
use crate::session::{ArchiveSession, SnapshotFetcher};
use crate::worker::SnapshotWorker;

/// Errors that end a run without a summary.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("retrieval cancelled")]
    Cancelled,

    #[error("failed to create storage folder {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to set up HTTP session: {0}")]
    Session(#[from] reqwest::Error),
}

/// Drives a [`SnapshotWorker`] over an identifier list, one batch at a time.
///
/// Batches run strictly in sequence: the next one starts only after every
/// worker of the current one has returned. At the batch deadline the
/// remaining workers are told to stop and are then awaited, so each one is
/// counted by what it actually left on disk.
pub struct BatchScheduler {
    worker: SnapshotWorker,
    batch_size: usize,
    batch_timeout: Duration,
    batch_delay: Duration,
}

impl BatchScheduler {
    pub fn new(worker: SnapshotWorker, config: &RetrievalConfig) -> Self {
        Self {
            worker,
            batch_size: config.batch_size.max(1),
            batch_timeout: config.batch_timeout,
            batch_delay: config.batch_delay,
        }
    }

    pub fn batch_count(&self, total: usize) -> usize {
        total.div_ceil(self.batch_size)
    }

    /// Retrieve every identifier and report the final counts.
    ///
    /// Returns [`RunError::Cancelled`] once `cancel` fires and the in-flight
    /// workers have wound down; no summary is produced.
    pub async fn run(&self, ids: &[SnapshotId], cancel: &CancellationToken) -> Result<RunSummary, RunError> {
        let tally = RunTally::new();
        let batches = self.batch_count(ids.len());

        tracing::info!(
            snapshots = ids.len(),
            batches,
            folder = %self.worker.store().folder().display(),
            "Retrieving snapshots"
        );

        for (index, batch) in ids.chunks(self.batch_size).enumerate() {
            if cancel.is_cancelled() {
                return Err(RunError::Cancelled);
            }

            self.run_batch(index, batch, &tally, cancel).await?;

            if index + 1 < batches {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(RunError::Cancelled),
                    _ = tokio::time::sleep(self.batch_delay) => {}
                }
            }
        }

        Ok(tally.finish())
    }

    async fn run_batch(
        &self,
        index: usize,
        batch: &[SnapshotId],
        tally: &RunTally,
        cancel: &CancellationToken,
    ) -> Result<(), RunError> {
        tracing::debug!(batch = index, size = batch.len(), "Starting batch");

        // Fires on the batch deadline, and with `cancel`
        let stop = cancel.child_token();
        let mut tasks = JoinSet::new();
        let mut pending = HashMap::with_capacity(batch.len());
        for &id in batch {
            let worker = self.worker.clone();
            let stop = stop.clone();
            let handle = tasks.spawn(async move { worker.retrieve(id, &stop).await });
            pending.insert(handle.id(), id);
        }

        let deadline = tokio::time::sleep_until(Instant::now() + self.batch_timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    tracing::warn!(batch = index, in_flight = tasks.len(), "Cancelling batch");
                    while tasks.join_next().await.is_some() {}
                    return Err(RunError::Cancelled);
                }

                joined = tasks.join_next_with_id() => {
                    let Some(joined) = joined else { break };
                    settle(tally, &mut pending, joined);
                }

                _ = &mut deadline => {
                    tracing::warn!(
                        batch = index,
                        pending = pending.len(),
                        timeout_secs = self.batch_timeout.as_secs_f64(),
                        "Batch timed out"
                    );
                    stop.cancel();
                    while let Some(joined) = tasks.join_next_with_id().await {
                        settle(tally, &mut pending, joined);
                    }
                    break;
                }
            }
        }

        tracing::debug!(batch = index, recorded = tally.recorded(), "Batch finished");
        Ok(())
    }
}

/// Record a joined worker against the identifier it was spawned for.
fn settle(
    tally: &RunTally,
    pending: &mut HashMap<task::Id, SnapshotId>,
    joined: Result<(task::Id, RetrievalOutcome), JoinError>,
) {
    let (task_id, outcome) = match joined {
        Ok((task_id, outcome)) => (task_id, outcome),
        Err(e) => (e.id(), RetrievalOutcome::Failed(FailureReason::Aborted(e.to_string()))),
    };
    match pending.remove(&task_id) {
        Some(id) => record(tally, id, outcome),
        None => tally.record(&outcome),
    }
}

fn record(tally: &RunTally, id: SnapshotId, outcome: RetrievalOutcome) {
    match &outcome {
        RetrievalOutcome::Created => tracing::debug!(snapshot = %id, "Created"),
        RetrievalOutcome::Duplicate => tracing::debug!(snapshot = %id, "Duplicate snapshot"),
        RetrievalOutcome::Failed(reason) => {
            tracing::warn!(snapshot = %id, reason = %reason, "Failed to retrieve snapshot")
        }
    }
    tally.record(&outcome);
}

/// Retrieve `ids` of `url` from the archive into `store`.
///
/// Creates the storage folder (reusing an existing one), opens one HTTP
/// session for the whole run and drops it when the run ends, cancelled or not.
pub async fn retrieve_snapshots(
    url: &str,
    ids: &[SnapshotId],
    store: SnapshotStore,
    config: &RetrievalConfig,
    cancel: &CancellationToken,
) -> Result<RunSummary, RunError> {
    store.create().map_err(|source| RunError::Storage {
        path: store.folder().to_path_buf(),
        source,
    })?;

    let session: Arc<dyn SnapshotFetcher> = Arc::new(ArchiveSession::new(config)?);
    run_with_fetcher(session, url, ids, store, config, cancel).await
}

/// Same as [`retrieve_snapshots`] with a caller-supplied fetcher.
pub async fn run_with_fetcher(
    fetcher: Arc<dyn SnapshotFetcher>,
    url: &str,
    ids: &[SnapshotId],
    store: SnapshotStore,
    config: &RetrievalConfig,
    cancel: &CancellationToken,
) -> Result<RunSummary, RunError> {
    let limiter = ConcurrencyLimiter::new(config.concurrency, config.saturation_pause);
    let worker = SnapshotWorker::new(fetcher, limiter, store, url);
    BatchScheduler::new(worker, config).run(ids, cancel).await
}
