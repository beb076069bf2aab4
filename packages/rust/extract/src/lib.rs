//! Plain-text extraction for arbitrary files.
//!
//! The crawler only sees [`TextExtractor`]. The production implementation,
//! [`TikaExtractor`], uploads each file to an Apache Tika server, asks for
//! XHTML, and flattens the markup to text with one line per text node.

mod xhtml;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::ACCEPT;
use tracing::{debug, instrument};

use docdigest_shared::{DigestError, Result, TikaConfig};

pub use xhtml::xhtml_to_text;

/// User-Agent string for extraction requests.
const USER_AGENT: &str = concat!("docdigest/", env!("CARGO_PKG_VERSION"));

/// Turns a file into plain text.
///
/// Implementations may return an empty string when the file has no textual
/// content; callers decide what to do with that.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Extract the text of the file at `path`.
    async fn extract(&self, path: &Path) -> Result<String>;
}

// ---------------------------------------------------------------------------
// Tika
// ---------------------------------------------------------------------------

/// Extractor backed by a running Tika server.
#[derive(Debug, Clone)]
pub struct TikaExtractor {
    client: Client,
    endpoint: String,
}

impl TikaExtractor {
    /// Build an extractor for the configured endpoint.
    pub fn new(config: &TikaConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DigestError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        })
    }

    /// Base URL this extractor talks to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl TextExtractor for TikaExtractor {
    #[instrument(skip_all, fields(path = %path.display()))]
    async fn extract(&self, path: &Path) -> Result<String> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| DigestError::io(path, e))?;

        let url = format!("{}/tika", self.endpoint);
        let response = self
            .client
            .put(&url)
            .header(ACCEPT, "text/html")
            .body(bytes)
            .send()
            .await
            .map_err(|e| DigestError::extraction(path, format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DigestError::extraction(path, format!("{url}: HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| DigestError::extraction(path, format!("failed to read body: {e}")))?;

        let text = xhtml_to_text(&body);
        debug!(chars = text.chars().count(), "extracted text");
        Ok(text)
    }
}
