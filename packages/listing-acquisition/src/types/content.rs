//! Raw fetched content, before extraction.

use serde::{Deserialize, Serialize};

use crate::types::listing::FetchStrategy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentFormat {
    Html,
    Markdown,
}

/// Page body as returned by a fetcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawContent {
    /// Requested URL
    pub url: String,

    pub body: String,

    pub format: ContentFormat,

    /// Strategy that produced this body
    pub strategy: FetchStrategy,

    /// HTTP status as reported by the origin, when known
    pub status: Option<u16>,
}

impl RawContent {
    pub fn new(
        url: impl Into<String>,
        body: impl Into<String>,
        format: ContentFormat,
        strategy: FetchStrategy,
    ) -> Self {
        Self {
            url: url.into(),
            body: body.into(),
            format,
            strategy,
            status: None,
        }
    }

    pub fn html(url: impl Into<String>, body: impl Into<String>, strategy: FetchStrategy) -> Self {
        Self::new(url, body, ContentFormat::Html, strategy)
    }

    pub fn markdown(
        url: impl Into<String>,
        body: impl Into<String>,
        strategy: FetchStrategy,
    ) -> Self {
        Self::new(url, body, ContentFormat::Markdown, strategy)
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Check if the body has any non-whitespace content.
    pub fn has_content(&self) -> bool {
        !self.body.trim().is_empty()
    }
}
