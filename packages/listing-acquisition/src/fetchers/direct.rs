//! Direct HTTP retrieval with browser-like headers.
//!
//! Low latency, but portals with anti-automation defenses will answer with
//! a challenge page or a refusal. Those responses surface as
//! [`FetchError::Blocked`] so the orchestrator can switch strategy.

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::{self, HeaderMap, HeaderValue};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{AcquisitionError, FetchError, FetchResult};
use crate::extractors::text::html_to_text;
use crate::traits::fetcher::Fetcher;
use crate::types::content::RawContent;
use crate::types::listing::FetchStrategy;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Body fragments served by bot-challenge pages. Matched case-insensitively.
const CHALLENGE_SIGNATURES: &[&str] = &[
    "captcha",
    "cf-challenge",
    "cf_chl_",
    "access denied",
    "pardon our interruption",
    "are you a robot",
    "unusual traffic",
    "request unsuccessful. incapsula",
    "please enable cookies",
];

/// Fetcher that requests listing pages directly.
pub struct DirectFetcher {
    client: reqwest::Client,
}

impl DirectFetcher {
    /// Build a fetcher with realistic browser headers.
    ///
    /// `timeout` is a client-level backstop; the host gate applies the
    /// per-host limit.
    pub fn new(timeout: Duration) -> Result<Self, AcquisitionError> {
        let client = reqwest::Client::builder()
            .default_headers(browser_headers())
            .user_agent(BROWSER_USER_AGENT)
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| AcquisitionError::FetcherSetup(Box::new(e)))?;
        Ok(Self { client })
    }

    /// Set a custom HTTP client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static("en-GB,en;q=0.5"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("max-age=0"));
    headers.insert(header::UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
    headers.insert("Sec-Fetch-Dest", HeaderValue::from_static("document"));
    headers.insert("Sec-Fetch-Mode", HeaderValue::from_static("navigate"));
    headers.insert("Sec-Fetch-Site", HeaderValue::from_static("none"));
    headers.insert("Sec-Fetch-User", HeaderValue::from_static("?1"));
    headers
}

/// Visible text longer than this is a real page, whatever it mentions.
const CHALLENGE_MAX_TEXT: usize = 4096;

static RE_NOSCRIPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<noscript[^>]*>.*?</noscript>").unwrap());

fn find_signature(haystack: &str) -> Option<&'static str> {
    let lower = haystack.to_lowercase();
    CHALLENGE_SIGNATURES
        .iter()
        .copied()
        .find(|signature| lower.contains(signature))
}

/// Signature on a page served as a success. Only visible text counts, and
/// only on pages small enough to be an interstitial; listing pages load
/// captcha scripts and carry cookie notices too.
fn challenge_on_success(body: &str) -> Option<&'static str> {
    let visible = html_to_text(&RE_NOSCRIPT.replace_all(body, " "));
    if visible.chars().count() > CHALLENGE_MAX_TEXT {
        return None;
    }
    find_signature(&visible)
}

/// Decide what a response means for the fetch.
///
/// - 2xx: blocked only when the page is a small challenge interstitial;
/// - 403: always blocked;
/// - 4xx, 429 and 503: blocked when the body carries a challenge signature;
/// - any other non-success status is a network failure.
fn classify_response(url: &str, status: u16, body: &str) -> Option<FetchError> {
    let blocked = |reason: String| {
        Some(FetchError::Blocked {
            url: url.to_string(),
            reason,
        })
    };

    if (200..300).contains(&status) {
        return match challenge_on_success(body) {
            Some(signature) => blocked(format!("HTTP {status}: challenge page ({signature})")),
            None => None,
        };
    }

    if status == 403 {
        return blocked("HTTP 403".to_string());
    }

    let is_server_error = (500..600).contains(&status);
    if !is_server_error || status == 503 {
        if let Some(signature) = find_signature(body) {
            return blocked(format!("HTTP {status}: challenge page ({signature})"));
        }
    }

    Some(FetchError::network(url, format!("HTTP {status}")))
}

fn map_transport_error(url: &str, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::network(url, e)
    }
}

#[async_trait]
impl Fetcher for DirectFetcher {
    async fn fetch(&self, url: &str) -> FetchResult<RawContent> {
        debug!(url = %url, "Direct fetch starting");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| map_transport_error(url, e))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| map_transport_error(url, e))?;

        if let Some(err) = classify_response(url, status, &body) {
            warn!(url = %url, status, error = %err, "Direct fetch rejected");
            return Err(err);
        }

        debug!(url = %url, status, content_length = body.len(), "Direct fetch complete");

        Ok(RawContent::html(url, body, FetchStrategy::Direct)
            .with_status(status))
    }

    fn strategy(&self) -> FetchStrategy {
        FetchStrategy::Direct
    }
}
