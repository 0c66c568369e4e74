//! Remote description lookup
//!
//! One lookup is one HTTP GET against the knowledge base, keyed by symbol
//! name, followed by pulling the description region out of the returned
//! markup. A page without that region is a miss, not an error.

use std::time::Duration;

use async_trait::async_trait;
use scraper::{Html, Selector};
use thiserror::Error;

/// Per-symbol lookup endpoint of the MalAPI knowledge base.
pub const DEFAULT_BASE_URL: &str = "https://malapi.io/winapi";

/// Default per-request timeout, bounding how long a lookup can hold a worker.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = concat!("malscout/", env!("CARGO_PKG_VERSION"));

/// Description lookup errors
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected HTTP status {0}")]
    Status(u16),
}

/// Source of per-symbol descriptions.
///
/// `Ok(None)` means the source has no information for the name; only
/// transport-level failures are errors.
#[async_trait]
pub trait DescriptionSource: Send + Sync {
    async fn lookup(&self, name: &str) -> Result<Option<String>, LookupError>;
}

/// HTTP client for the MalAPI lookup endpoint.
///
/// Owns one `reqwest::Client`, so every lookup of a run reuses the same
/// connection pool.
pub struct MalapiClient {
    http: reqwest::Client,
    base_url: String,
}

impl MalapiClient {
    pub fn new() -> Result<Self, LookupError> {
        Self::with_base_url(DEFAULT_BASE_URL, DEFAULT_TIMEOUT)
    }

    /// Client against an alternate endpoint, for deployments that proxy or
    /// mirror the knowledge base.
    pub fn with_base_url(
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LookupError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| LookupError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl DescriptionSource for MalapiClient {
    async fn lookup(&self, name: &str) -> Result<Option<String>, LookupError> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), name);
        tracing::debug!(name = %name, url = %url, "querying description source");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| LookupError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::Status(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| LookupError::Network(e.to_string()))?;

        Ok(extract_description(&body))
    }
}

/// Pull the description text out of a lookup page.
///
/// The page lays out symbol details as `.detail-container .content` blocks;
/// the second block holds the description. A page missing that block, or with
/// only whitespace in it, carries no information for the symbol.
pub fn extract_description(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(".detail-container .content").ok()?;
    let block = document.select(&selector).nth(1)?;
    let text: String = block.text().collect();
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}
