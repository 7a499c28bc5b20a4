use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use wayback_model::{FailureReason, RetrievalOutcome, SnapshotId, SnapshotStore};

use crate::limiter::ConcurrencyLimiter;
use crate::session::SnapshotFetcher;

/// Retrieves single snapshots of one page into one storage folder.
///
/// Cheap to clone; every clone shares the same fetcher and limiter.
#[derive(Clone)]
pub struct SnapshotWorker {
    fetcher: Arc<dyn SnapshotFetcher>,
    limiter: ConcurrencyLimiter,
    store: SnapshotStore,
    url: String,
}

impl SnapshotWorker {
    pub fn new(
        fetcher: Arc<dyn SnapshotFetcher>,
        limiter: ConcurrencyLimiter,
        store: SnapshotStore,
        url: impl Into<String>,
    ) -> Self {
        Self {
            fetcher,
            limiter,
            store,
            url: url.into(),
        }
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Retrieve one snapshot and classify the result.
    ///
    /// Never returns an error: every failure becomes
    /// [`RetrievalOutcome::Failed`] so the rest of the batch carries on.
    ///
    /// Once `stop` fires the worker gives up waiting for a slot or a
    /// response, discards any body it has not yet persisted and resolves to
    /// [`FailureReason::TimedOut`]. A new file is written exactly when the
    /// outcome says `Created`.
    pub async fn retrieve(&self, id: SnapshotId, stop: &CancellationToken) -> RetrievalOutcome {
        // Already on disk: no request needed
        if self.store.contains(id) {
            return RetrievalOutcome::Duplicate;
        }

        let _slot = tokio::select! {
            biased;
            _ = stop.cancelled() => return RetrievalOutcome::Failed(FailureReason::TimedOut),
            slot = self.limiter.admit() => match slot {
                Some(slot) => slot,
                None => return RetrievalOutcome::Failed(FailureReason::Aborted("limiter closed".into())),
            },
        };

        let fetched = tokio::select! {
            biased;
            _ = stop.cancelled() => return RetrievalOutcome::Failed(FailureReason::TimedOut),
            fetched = self.fetcher.fetch(id, &self.url) => fetched,
        };
        let body = match fetched {
            Ok(body) => body,
            Err(e) => return RetrievalOutcome::Failed(e.into()),
        };

        let folder = self.store.folder().to_path_buf();
        let target = self.store.html_path(id);
        let stop = stop.clone();
        let written = tokio::task::spawn_blocking(move || write_snapshot(&folder, &target, &body, &stop)).await;

        match written {
            Ok(Ok(Written::Created)) => RetrievalOutcome::Created,
            Ok(Ok(Written::Exists)) => RetrievalOutcome::Duplicate,
            Ok(Ok(Written::Discarded)) => RetrievalOutcome::Failed(FailureReason::TimedOut),
            Ok(Err(e)) => RetrievalOutcome::Failed(FailureReason::Storage(e.to_string())),
            Err(e) => RetrievalOutcome::Failed(FailureReason::Aborted(e.to_string())),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Written {
    Created,
    Exists,
    Discarded,
}

/// Write `body` to `target` unless `target` already exists.
///
/// The body goes to a temp file in the same folder first and is moved into
/// place with a no-clobber rename, so `target` is either absent or complete.
/// If `stop` has fired by the time the temp file is synced, the temp file is
/// removed instead of persisted.
fn write_snapshot(folder: &Path, target: &Path, body: &[u8], stop: &CancellationToken) -> io::Result<Written> {
    let mut tmp = tempfile::Builder::new()
        .prefix(".snapshot-")
        .suffix(".part")
        .tempfile_in(folder)?;
    tmp.write_all(body)?;
    tmp.as_file().sync_all()?;

    if stop.is_cancelled() {
        tmp.close()?;
        return Ok(Written::Discarded);
    }

    match tmp.persist_noclobber(target) {
        Ok(_) => Ok(Written::Created),
        Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => Ok(Written::Exists),
        Err(e) => Err(e.error),
    }
}
