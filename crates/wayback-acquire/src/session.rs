use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;
use wayback_model::{FailureReason, SnapshotId};

use crate::config::RetrievalConfig;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("response code {0}")]
    Status(u16),

    #[error("{0}")]
    Network(String),
}

impl From<FetchError> for FailureReason {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Status(code) => FailureReason::Status(code),
            FetchError::Network(msg) => FailureReason::Network(msg),
        }
    }
}

/// Source of snapshot bodies.
///
/// One fetcher is shared by every worker in a run; implementations must not
/// hold per-request state.
#[async_trait]
pub trait SnapshotFetcher: Send + Sync {
    /// Fetch the archived body of `url` as captured at `id`.
    ///
    /// Anything other than HTTP 200 is an error.
    async fn fetch(&self, id: SnapshotId, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// HTTP session against the archive, reused for every snapshot in a run.
#[derive(Debug, Clone)]
pub struct ArchiveSession {
    client: reqwest::Client,
    archive_base: String,
}

impl ArchiveSession {
    pub fn new(config: &RetrievalConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .build()?;
        Ok(Self::with_client(client, &config.archive_base))
    }

    pub fn with_client(client: reqwest::Client, archive_base: &str) -> Self {
        Self {
            client,
            archive_base: archive_base.trim_end_matches('/').to_string(),
        }
    }

    /// `<archive>/web/<timestamp>/<original url>`
    pub fn snapshot_url(&self, id: SnapshotId, url: &str) -> String {
        format!("{}/web/{id}/{url}", self.archive_base)
    }
}

#[async_trait]
impl SnapshotFetcher for ArchiveSession {
    async fn fetch(&self, id: SnapshotId, url: &str) -> Result<Vec<u8>, FetchError> {
        let snapshot_url = self.snapshot_url(id, url);
        tracing::debug!(url = %snapshot_url, "Fetching snapshot");

        let response = self
            .client
            .get(&snapshot_url)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Network(format!("failed to read response body: {e}")))?;
        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAGE: &str = "example.com/page";

    fn session_for(server: &MockServer) -> ArchiveSession {
        ArchiveSession::with_client(reqwest::Client::new(), &server.uri())
    }

    #[test]
    fn test_snapshot_url() {
        let session = ArchiveSession::with_client(reqwest::Client::new(), "https://web.archive.org/");
        assert_eq!(
            session.snapshot_url(SnapshotId::new(20200101000000), "example.com/page"),
            "https://web.archive.org/web/20200101000000/example.com/page"
        );
    }

    #[tokio::test]
    async fn test_fetch_ok_returns_body_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/web/20200101000000/example.com/page"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"<html>\xff raw</html>".to_vec()))
            .mount(&server)
            .await;

        let session = session_for(&server);
        let body = session.fetch(SnapshotId::new(20200101000000), PAGE).await.unwrap();
        assert_eq!(body, b"<html>\xff raw</html>".to_vec());
    }

    #[tokio::test]
    async fn test_fetch_non_200_is_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let session = session_for(&server);
        let err = session.fetch(SnapshotId::new(20200101000000), PAGE).await.unwrap_err();
        assert_eq!(err, FetchError::Status(404));
        assert_eq!(FailureReason::from(err), FailureReason::Status(404));
    }

    #[tokio::test]
    async fn test_fetch_other_2xx_is_not_ok() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let session = session_for(&server);
        let err = session.fetch(SnapshotId::new(20200101000000), PAGE).await.unwrap_err();
        assert_eq!(err, FetchError::Status(204));
    }

    #[tokio::test]
    async fn test_fetch_connection_refused_is_network_error() {
        // Nothing listens on port 1
        let session = ArchiveSession::with_client(reqwest::Client::new(), "http://127.0.0.1:1");
        let err = session.fetch(SnapshotId::new(20200101000000), PAGE).await.unwrap_err();
        assert!(matches!(err, FetchError::Network(_)));
    }
}
