use anyhow::{Context, Result};
use serde_json::Value;
use wayback_model::SnapshotId;

use crate::config::{INDEX_URL, USER_AGENT};

/// Column that holds capture timestamps when the header doesn't say otherwise.
const DEFAULT_TIMESTAMP_COLUMN: usize = 1;

/// Client for the archive's capture index (CDX) API.
#[derive(Debug, Clone)]
pub struct IndexClient {
    client: reqwest::Client,
    index_url: String,
}

impl IndexClient {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self::with_client(client, INDEX_URL))
    }

    pub fn with_client(client: reqwest::Client, index_url: &str) -> Self {
        Self {
            client,
            index_url: index_url.to_string(),
        }
    }

    /// List every capture of `url`, in the order the index returns them.
    pub async fn captures(&self, url: &str) -> Result<Vec<SnapshotId>> {
        tracing::info!(url = %url, "Querying capture index");

        let response = self
            .client
            .get(&self.index_url)
            .query(&[("url", url), ("output", "json")])
            .send()
            .await
            .context("Failed to query capture index")?;

        let status = response.status();
        anyhow::ensure!(status.is_success(), "HTTP {status} from capture index for {url}");

        let body = response
            .text()
            .await
            .context("Failed to read capture index response")?;
        let captures = parse_index(&body)?;
        tracing::info!(captures = captures.len(), "Received capture index");
        Ok(captures)
    }
}

/// Parse a JSON capture index: an array of rows, the first being the header.
///
/// An empty body or an empty array means no captures.
pub fn parse_index(body: &str) -> Result<Vec<SnapshotId>> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }

    let rows: Vec<Vec<Value>> =
        serde_json::from_str(body).context("Failed to parse capture index JSON")?;
    let Some((header, entries)) = rows.split_first() else {
        return Ok(Vec::new());
    };

    let column = header
        .iter()
        .position(|h| h.as_str() == Some("timestamp"))
        .unwrap_or(DEFAULT_TIMESTAMP_COLUMN);

    entries
        .iter()
        .enumerate()
        .map(|(row, entry)| {
            let raw = match entry.get(column) {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Number(n)) => n.to_string(),
                _ => anyhow::bail!("capture index row {} has no timestamp column", row + 1),
            };
            raw.parse::<SnapshotId>()
                .with_context(|| format!("capture index row {}", row + 1))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SAMPLE: &str = r#"[
        ["urlkey","timestamp","original","mimetype","statuscode","digest","length"],
        ["com,example)/","20020120142510","http://example.com:80/","text/html","200","HT2DYGA5UKZCPBSFVCV3JOBXGW2G5UUA","1792"],
        ["com,example)/","20020328012821","http://www.example.com:80/","text/html","200","UY6OPOYD6ZHRGP3XOTTIRF6NEDK2YPHV","1793"]
    ]"#;

    #[test]
    fn test_parse_index() {
        let ids = parse_index(SAMPLE).unwrap();
        assert_eq!(
            ids,
            vec![SnapshotId::new(20020120142510), SnapshotId::new(20020328012821)]
        );
    }

    #[test]
    fn test_parse_index_empty() {
        assert!(parse_index("").unwrap().is_empty());
        assert!(parse_index("[]").unwrap().is_empty());
        assert!(parse_index(r#"[["urlkey","timestamp"]]"#).unwrap().is_empty());
    }

    #[test]
    fn test_parse_index_uses_header_position() {
        let body = r#"[["timestamp","original"],["20200101000000","http://example.com/"]]"#;
        assert_eq!(parse_index(body).unwrap(), vec![SnapshotId::new(20200101000000)]);
    }

    #[test]
    fn test_parse_index_rejects_bad_rows() {
        assert!(parse_index("not json").is_err());
        assert!(parse_index(r#"[["urlkey","timestamp"],["only-one"]]"#).is_err());
        assert!(parse_index(r#"[["urlkey","timestamp"],["k","yesterday"]]"#).is_err());
    }

    #[tokio::test]
    async fn test_captures_queries_index() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cdx/search/cdx"))
            .and(query_param("url", "example.com"))
            .and(query_param("output", "json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(SAMPLE))
            .expect(1)
            .mount(&server)
            .await;

        let client = IndexClient::with_client(
            reqwest::Client::new(),
            &format!("{}/cdx/search/cdx", server.uri()),
        );
        let ids = client.captures("example.com").await.unwrap();
        assert_eq!(ids.len(), 2);
    }

    #[tokio::test]
    async fn test_captures_http_error_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = IndexClient::with_client(reqwest::Client::new(), &server.uri());
        let err = client.captures("example.com").await.unwrap_err();
        assert!(err.to_string().contains("503"));
    }
}
