//! Typed errors for the acquisition engine.
//!
//! Uses `thiserror` for library errors (not `anyhow`) so the orchestrator
//! can tell blocked, transient, malformed and invalid outcomes apart.

use thiserror::Error;

/// Errors from a single fetch attempt.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Anti-automation defenses rejected the request.
    #[error("blocked fetching {url}: {reason}")]
    Blocked { url: String, reason: String },

    /// The request did not complete within the host timeout.
    #[error("timeout fetching {url}")]
    Timeout { url: String },

    /// Transport failure or unexpected server response.
    #[error("network error fetching {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl FetchError {
    pub fn network(
        url: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        FetchError::Network {
            url: url.into(),
            source: source.into(),
        }
    }

    /// Transient failures worth another attempt on the same strategy.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Timeout { .. } | FetchError::Network { .. })
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, FetchError::Blocked { .. })
    }
}

/// Errors turning raw content into a listing.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("empty content for {url}")]
    EmptyContent { url: String },

    #[error("unparseable content for {url}: {reason}")]
    Unparseable { url: String, reason: String },

    /// Content parsed but none of price, bedrooms or address were found.
    #[error("no required fields recovered from {url}")]
    MissingRequiredFields { url: String },

    #[error("no listing id in {url}")]
    NoListingId { url: String },

    #[error("no extractor registered for source {0}")]
    UnknownSource(String),
}

/// A record broke one or more business rules.
#[derive(Debug, Error)]
#[error("validation failed: {}", .violations.join("; "))]
pub struct ValidationError {
    pub violations: Vec<String>,
}

/// Persistence failures from a repository.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("corrupt record for {uid}: {reason}")]
    Corrupt { uid: String, reason: String },
}

impl StoreError {
    pub fn storage(e: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        StoreError::Storage(e.into())
    }
}

/// Engine construction and configuration errors.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("config error: {0}")]
    Config(String),

    #[error("fetcher setup failed: {0}")]
    FetcherSetup(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type alias for fetch operations.
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Result type alias for extraction.
pub type ExtractionResult<T> = std::result::Result<T, ExtractionError>;

/// Result type alias for repository and store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result type alias for engine setup.
pub type Result<T> = std::result::Result<T, AcquisitionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let timeout = FetchError::Timeout {
            url: "https://x.test".into(),
        };
        let network = FetchError::network("https://x.test", "connection reset");
        let blocked = FetchError::Blocked {
            url: "https://x.test".into(),
            reason: "HTTP 403".into(),
        };

        assert!(timeout.is_retryable());
        assert!(network.is_retryable());
        assert!(!blocked.is_retryable());
        assert!(blocked.is_blocked());
    }

    #[test]
    fn test_validation_message_joins_violations() {
        let err = ValidationError {
            violations: vec!["price must be positive".into(), "bad url".into()],
        };
        assert_eq!(
            err.to_string(),
            "validation failed: price must be positive; bad url"
        );
    }
}
