//! Managed crawling service retrieval.
//!
//! Delegates rendering and anti-bot handling to Firecrawl. Slower than a
//! direct request but reaches portals that refuse automated clients. The
//! service absorbs blocks itself, so this fetcher never reports
//! [`FetchError::Blocked`].

use async_trait::async_trait;
use firecrawl_client::{FirecrawlClient, FirecrawlError, ScrapeOptions};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{AcquisitionError, FetchError, FetchResult};
use crate::traits::fetcher::Fetcher;
use crate::types::content::RawContent;
use crate::types::listing::FetchStrategy;

/// Tags worth keeping for listing extraction; `img` carries static-map
/// references that encode coordinates.
const LISTING_TAGS: &[&str] = &["title", "h1", "h2", "h3", "p", "span", "div", "li", "img"];

/// Fetcher backed by the Firecrawl scrape endpoint.
pub struct ManagedCrawlFetcher {
    client: FirecrawlClient,
    options: ScrapeOptions,
}

impl ManagedCrawlFetcher {
    /// Create a fetcher with the given API key.
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, AcquisitionError> {
        let client = FirecrawlClient::with_timeout(api_key.into(), timeout)
            .map_err(|e| AcquisitionError::FetcherSetup(Box::new(e)))?;
        Ok(Self::with_client(client))
    }

    /// Wrap an existing client.
    pub fn with_client(client: FirecrawlClient) -> Self {
        let options = ScrapeOptions::default()
            .with_include_tags(LISTING_TAGS.iter().copied())
            .with_wait_for(3000);
        Self { client, options }
    }
}

fn map_error(url: &str, e: FirecrawlError) -> FetchError {
    if e.is_timeout() {
        return FetchError::Timeout {
            url: url.to_string(),
        };
    }
    FetchError::network(url, e)
}

#[async_trait]
impl Fetcher for ManagedCrawlFetcher {
    async fn fetch(&self, url: &str) -> FetchResult<RawContent> {
        debug!(url = %url, "Managed crawl starting");

        let data = self.client.scrape(url, &self.options).await.map_err(|e| {
            warn!(url = %url, error = %e, "Managed crawl failed");
            map_error(url, e)
        })?;

        let status = data.metadata.as_ref().and_then(|m| m.status_code);

        // HTML keeps static-map references; markdown is the fallback
        let raw = match (data.best_html(), data.markdown()) {
            (Some(html), _) => RawContent::html(url, html, FetchStrategy::ManagedCrawl),
            (None, Some(markdown)) => {
                RawContent::markdown(url, markdown, FetchStrategy::ManagedCrawl)
            }
            // Empty pages are left for the extractor to reject
            (None, None) => {
                debug!(url = %url, "Managed crawl returned an empty page");
                RawContent::markdown(url, String::new(), FetchStrategy::ManagedCrawl)
            }
        };

        debug!(url = %url, content_length = raw.body.len(), "Managed crawl complete");

        Ok(match status {
            Some(status) => raw.with_status(status),
            None => raw,
        })
    }

    fn strategy(&self) -> FetchStrategy {
        FetchStrategy::ManagedCrawl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://www.zoopla.co.uk/to-rent/details/1";

    #[test]
    fn test_gateway_timeout_maps_to_timeout() {
        let err = map_error(
            URL,
            FirecrawlError::Api {
                status: 504,
                message: "upstream timed out".into(),
            },
        );
        assert!(matches!(err, FetchError::Timeout { .. }));
    }

    #[test]
    fn test_api_errors_map_to_network() {
        for status in [429, 500, 502] {
            let err = map_error(
                URL,
                FirecrawlError::Api {
                    status,
                    message: String::new(),
                },
            );
            assert!(matches!(err, FetchError::Network { .. }), "status {status}");
        }

        let err = map_error(URL, FirecrawlError::ScrapeFailed("quota".into()));
        assert!(err.is_retryable());
        assert!(!err.is_blocked());
    }

    #[test]
    fn test_default_options_keep_images() {
        let fetcher = ManagedCrawlFetcher::with_client(FirecrawlClient::new("key".into()));
        assert!(fetcher.options.include_tags.iter().any(|t| t == "img"));
        assert_eq!(fetcher.options.wait_for, Some(3000));
        assert_eq!(fetcher.strategy(), FetchStrategy::ManagedCrawl);
    }
}
