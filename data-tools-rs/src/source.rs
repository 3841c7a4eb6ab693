//! Source acquisition collaborators.
//!
//! `TableSource` is the seam the pipeline executor calls through; the shipped
//! `HttpTableClient` fetches JSON tables over HTTP with its own request
//! timeout. Real HTML scraping and warehouse querying live outside this
//! repository; references they would serve come back as errors here and the
//! core degrades to its fallback dataset.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Result, ToolError};
use crate::table::TabularData;

/// Default per-request timeout for source fetches
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// User agent presented to upstream sources
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// A reference to where raw data should come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRef {
    /// Fetch a table from a URL
    Url(String),
    /// Query a named/remote dataset
    Dataset(String),
    /// The question carries its own data or none at all
    None,
}

/// Source-acquisition collaborator contract
#[async_trait]
pub trait TableSource: Send + Sync {
    /// Collaborator name, for logging
    fn name(&self) -> &str;

    /// Fetch raw tabular data for the given reference
    async fn fetch(&self, source: &SourceRef) -> Result<TabularData>;
}

/// HTTP-backed table source using a shared reqwest client
#[derive(Debug, Clone)]
pub struct HttpTableClient {
    client: reqwest::Client,
}

impl HttpTableClient {
    /// Build a client with the given per-request timeout
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ToolError::network(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

impl Default for HttpTableClient {
    fn default() -> Self {
        // Building with a plain timeout cannot fail in practice
        Self::new(DEFAULT_FETCH_TIMEOUT).unwrap_or_else(|_| Self {
            client: reqwest::Client::new(),
        })
    }
}

#[async_trait]
impl TableSource for HttpTableClient {
    fn name(&self) -> &str {
        "http-table-client"
    }

    async fn fetch(&self, source: &SourceRef) -> Result<TabularData> {
        match source {
            SourceRef::Url(url) => {
                log::info!("Fetching table from {}", url);
                let response = self.client.get(url).send().await?;
                let status = response.status();
                if !status.is_success() {
                    return Err(ToolError::network(format!(
                        "source returned HTTP {}",
                        status
                    )));
                }
                let body: Value = response
                    .json()
                    .await
                    .map_err(|e| ToolError::parsing(format!("source body is not JSON: {}", e)))?;
                let table = TabularData::from_json(&body)?;
                log::info!("Fetched {} rows from {}", table.len(), url);
                Ok(table)
            }
            SourceRef::Dataset(reference) => Err(ToolError::unsupported(format!(
                "dataset queries are delegated to an external collaborator: {}",
                reference
            ))),
            SourceRef::None => Err(ToolError::unsupported(
                "question carries no fetchable source reference",
            )),
        }
    }
}
