use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result of retrieving one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum RetrievalOutcome {
    /// The body was fetched and written to a new file.
    Created,
    /// A file for this snapshot already existed and was left untouched.
    Duplicate,
    /// The snapshot could not be retrieved or stored.
    Failed(FailureReason),
}

/// Why a snapshot ended up as [`RetrievalOutcome::Failed`].
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    #[error("response code {0}")]
    Status(u16),

    #[error("network error: {0}")]
    Network(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("batch timed out before the snapshot resolved")]
    TimedOut,

    #[error("worker aborted: {0}")]
    Aborted(String),
}
