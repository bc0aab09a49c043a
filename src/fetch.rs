//! Source fetching seam for the ingestion pipeline.
//!
//! The pipeline only requires readable plain text per source; how it is
//! obtained (HTTP fetch, readability extraction, a file read) is behind the
//! [`PageFetcher`] trait so alternative extractors and test doubles plug in
//! without touching the pipeline. The bundled [`HttpFetcher`] performs a
//! plain GET and treats the body as already-extracted text; full HTML
//! readability conversion belongs to an external collaborator implementing
//! this trait.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::{KbError, Result};

/// Readable content fetched for one source.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub title: Option<String>,
    pub text: String,
}

/// Fetches and extracts readable text for a source URL.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage>;
}

/// Plain-HTTP fetcher: GET the URL, require a 2xx response, use the first
/// non-empty line as the title.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| KbError::Provider(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| KbError::Fetch {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(KbError::Fetch {
                url: url.to_string(),
                reason: format!("HTTP {}", status),
            });
        }

        let text = response.text().await.map_err(|e| KbError::Fetch {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(FetchedPage {
            title: first_line_title(&text),
            text,
        })
    }
}

/// First non-empty line, capped at 120 chars, as a display title.
fn first_line_title(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| line.chars().take(120).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::GET, MockServer};

    #[tokio::test]
    async fn fetch_returns_body_and_title() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/doc");
                then.status(200).body("A Title Line\n\nBody paragraph.");
            })
            .await;

        let fetcher = HttpFetcher::new(5).unwrap();
        let page = fetcher.fetch(&server.url("/doc")).await.unwrap();
        assert_eq!(page.title.as_deref(), Some("A Title Line"));
        assert!(page.text.contains("Body paragraph."));
    }

    #[tokio::test]
    async fn non_2xx_is_a_fetch_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/missing");
                then.status(404);
            })
            .await;

        let fetcher = HttpFetcher::new(5).unwrap();
        let err = fetcher.fetch(&server.url("/missing")).await.unwrap_err();
        assert!(matches!(err, KbError::Fetch { .. }));
        assert!(err.to_string().contains("404"));
    }

    #[test]
    fn title_skips_blank_lines() {
        assert_eq!(
            first_line_title("\n\n  \nReal title\nmore"),
            Some("Real title".to_string())
        );
        assert_eq!(first_line_title("   \n \n"), None);
    }
}
