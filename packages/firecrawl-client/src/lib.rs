//! Pure Firecrawl REST API client.
//!
//! A minimal client for the Firecrawl managed crawling API. Supports
//! single-page scrapes returning markdown and HTML.
//!
//! # Example
//!
//! ```rust,ignore
//! use firecrawl_client::{FirecrawlClient, ScrapeOptions};
//!
//! let client = FirecrawlClient::new("fc-your-key".into());
//!
//! let page = client
//!     .scrape("https://www.zoopla.co.uk/to-rent/details/123", &ScrapeOptions::default())
//!     .await?;
//! println!("{}", page.markdown().unwrap_or("(no markdown)"));
//! ```

pub mod error;
pub mod types;

pub use error::{FirecrawlError, Result};
pub use types::{PageMetadata, ScrapeData, ScrapeOptions, ScrapeRequest, ScrapeResponse};

use std::time::Duration;

const BASE_URL: &str = "https://api.firecrawl.dev/v1";

pub struct FirecrawlClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl FirecrawlClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: BASE_URL.to_string(),
        }
    }

    /// Build with a request timeout applied to every call.
    pub fn with_timeout(api_key: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key,
            base_url: BASE_URL.to_string(),
        })
    }

    /// Point the client at a different API root (self-hosted Firecrawl).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Scrape a single URL. A page that rendered nothing comes back as
    /// data with neither HTML nor markdown; callers decide what that means.
    pub async fn scrape(&self, url: &str, options: &ScrapeOptions) -> Result<ScrapeData> {
        tracing::debug!(url, "Firecrawl scrape");

        let endpoint = format!("{}/scrape", self.base_url);
        let resp = self
            .client
            .post(&endpoint)
            .bearer_auth(&self.api_key)
            .json(&ScrapeRequest { url, options })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FirecrawlError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let scrape: ScrapeResponse = resp.json().await?;
        into_scrape_data(url, scrape)
    }
}

fn into_scrape_data(url: &str, scrape: ScrapeResponse) -> Result<ScrapeData> {
    if !scrape.success {
        return Err(FirecrawlError::ScrapeFailed(
            scrape.error.unwrap_or_else(|| "unknown Firecrawl error".to_string()),
        ));
    }

    let data = scrape.data.unwrap_or_default();
    if data.best_html().is_none() && data.markdown().is_none() {
        tracing::debug!(url, "Firecrawl returned an empty page");
    }

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_override_trims_slash() {
        let client = FirecrawlClient::new("key".into()).with_base_url("http://localhost:3002/v1/");
        assert_eq!(client.base_url(), "http://localhost:3002/v1");
    }

    #[test]
    fn test_request_flattens_options() {
        let options = ScrapeOptions::default().with_wait_for(2000);
        let body = serde_json::to_value(ScrapeRequest {
            url: "https://www.zoopla.co.uk/to-rent/details/1",
            options: &options,
        })
        .unwrap();

        assert_eq!(body["url"], "https://www.zoopla.co.uk/to-rent/details/1");
        assert_eq!(body["onlyMainContent"], true);
        assert_eq!(body["waitFor"], 2000);
        assert!(body.get("includeTags").is_none());
        assert!(body.get("timeout").is_none());
    }

    #[test]
    fn test_successful_response_is_unwrapped() {
        let scrape: ScrapeResponse = serde_json::from_str(
            r##"{
                "success": true,
                "data": {
                    "markdown": "# 2 bed flat to rent",
                    "html": "<h1>2 bed flat to rent</h1>",
                    "metadata": {"title": "2 bed flat", "sourceURL": "https://x.test/1", "statusCode": 200}
                }
            }"##,
        )
        .unwrap();

        let data = into_scrape_data("https://x.test/1", scrape).unwrap();
        assert_eq!(data.best_html(), Some("<h1>2 bed flat to rent</h1>"));
        assert_eq!(data.metadata.unwrap().status_code, Some(200));
    }

    #[test]
    fn test_unsuccessful_response_is_error() {
        let scrape: ScrapeResponse =
            serde_json::from_str(r#"{"success": false, "error": "quota exceeded"}"#).unwrap();

        let err = into_scrape_data("https://x.test/1", scrape).unwrap_err();
        assert!(matches!(err, FirecrawlError::ScrapeFailed(ref m) if m == "quota exceeded"));
    }

    #[test]
    fn test_blank_content_is_returned_empty() {
        let scrape: ScrapeResponse =
            serde_json::from_str(r#"{"success": true, "data": {"markdown": "   ", "html": ""}}"#)
                .unwrap();

        let data = into_scrape_data("https://x.test/1", scrape).unwrap();
        assert!(data.best_html().is_none());
        assert!(data.markdown().is_none());
    }

    #[test]
    fn test_blank_raw_html_falls_back_to_html() {
        let scrape: ScrapeResponse = serde_json::from_str(
            r#"{"success": true, "data": {"rawHtml": " ", "html": "<p>£900 pcm</p>"}}"#,
        )
        .unwrap();

        let data = into_scrape_data("https://x.test/1", scrape).unwrap();
        assert_eq!(data.best_html(), Some("<p>£900 pcm</p>"));
    }

    #[test]
    fn test_timeout_statuses() {
        let err = FirecrawlError::Api {
            status: 504,
            message: String::new(),
        };
        assert!(err.is_timeout());
        assert_eq!(err.status(), Some(504));

        let err = FirecrawlError::Api {
            status: 500,
            message: String::new(),
        };
        assert!(!err.is_timeout());
    }
}
