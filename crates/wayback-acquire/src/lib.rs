//! Snapshot acquisition: query the capture index, retrieve snapshot bodies
//! under a concurrency limit in paced batches, and turn saved pages into text.

pub mod cdx;
pub mod config;
pub mod limiter;
pub mod scheduler;
pub mod session;
pub mod text;
pub mod worker;

pub use cdx::IndexClient;
pub use config::RetrievalConfig;
pub use limiter::ConcurrencyLimiter;
pub use scheduler::{retrieve_snapshots, run_with_fetcher, BatchScheduler, RunError};
pub use session::{ArchiveSession, FetchError, SnapshotFetcher};
pub use worker::SnapshotWorker;
