use std::time::Duration;

pub const ARCHIVE_BASE: &str = "https://web.archive.org";
pub const INDEX_URL: &str = "https://web.archive.org/cdx/search/cdx";
pub const USER_AGENT: &str = concat!("wb-scraper/", env!("CARGO_PKG_VERSION"), " (archive snapshot tool)");

/// Maximum number of snapshots in flight at once.
pub const CONCURRENCY: usize = 5;
/// Snapshots launched per batch.
pub const BATCH_SIZE: usize = 12;
pub const BATCH_TIMEOUT: Duration = Duration::from_secs(30);
/// Pause between batches.
pub const BATCH_DELAY: Duration = Duration::from_secs(2);
/// Pause taken by a worker admitted while the limiter is full.
pub const SATURATION_PAUSE: Duration = Duration::from_secs(2);

/// Settings for one retrieval run.
///
/// The CLI always runs with [`RetrievalConfig::default`]; other values exist
/// for tests and embedding.
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// Archive host that serves `/web/<timestamp>/<url>`.
    pub archive_base: String,
    pub user_agent: String,
    pub concurrency: usize,
    pub batch_size: usize,
    pub batch_timeout: Duration,
    pub batch_delay: Duration,
    pub saturation_pause: Duration,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            archive_base: ARCHIVE_BASE.to_string(),
            user_agent: USER_AGENT.to_string(),
            concurrency: CONCURRENCY,
            batch_size: BATCH_SIZE,
            batch_timeout: BATCH_TIMEOUT,
            batch_delay: BATCH_DELAY,
            saturation_pause: SATURATION_PAUSE,
        }
    }
}
