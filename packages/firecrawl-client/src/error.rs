use thiserror::Error;

/// Errors returned by the Firecrawl API client.
#[derive(Debug, Error)]
pub enum FirecrawlError {
    /// Transport-level failure (connect, TLS, body decode).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("Firecrawl API error {status}: {message}")]
    Api { status: u16, message: String },

    /// The API answered 2xx but reported `success: false`.
    #[error("scrape failed: {0}")]
    ScrapeFailed(String),
}

impl FirecrawlError {
    /// HTTP status of an API error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            FirecrawlError::Api { status, .. } => Some(*status),
            FirecrawlError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether the failure was the request (or the remote page) timing out.
    pub fn is_timeout(&self) -> bool {
        match self {
            FirecrawlError::Http(e) => e.is_timeout(),
            FirecrawlError::Api { status, .. } => matches!(status, 408 | 504),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, FirecrawlError>;
