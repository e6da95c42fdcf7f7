use serde::{Deserialize, Serialize};

/// Options for a single-page scrape.
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeOptions {
    pub formats: Vec<String>,
    #[serde(rename = "onlyMainContent")]
    pub only_main_content: bool,
    #[serde(rename = "includeTags", skip_serializing_if = "Vec::is_empty")]
    pub include_tags: Vec<String>,
    #[serde(rename = "excludeTags", skip_serializing_if = "Vec::is_empty")]
    pub exclude_tags: Vec<String>,
    /// Milliseconds to wait for dynamic content before capture.
    #[serde(rename = "waitFor", skip_serializing_if = "Option::is_none")]
    pub wait_for: Option<u64>,
    /// Server-side page timeout in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl Default for ScrapeOptions {
    fn default() -> Self {
        Self {
            formats: vec!["markdown".to_string(), "html".to_string()],
            only_main_content: true,
            include_tags: Vec::new(),
            exclude_tags: vec![
                "script".to_string(),
                "style".to_string(),
                "nav".to_string(),
                "footer".to_string(),
            ],
            wait_for: Some(3000),
            timeout: None,
        }
    }
}

impl ScrapeOptions {
    pub fn with_wait_for(mut self, millis: u64) -> Self {
        self.wait_for = Some(millis);
        self
    }

    pub fn with_timeout(mut self, millis: u64) -> Self {
        self.timeout = Some(millis);
        self
    }

    pub fn with_include_tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.include_tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// Body of `POST /scrape`.
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeRequest<'a> {
    pub url: &'a str,
    #[serde(flatten)]
    pub options: &'a ScrapeOptions,
}

/// Wrapper returned by `POST /scrape`.
#[derive(Debug, Clone, Deserialize)]
pub struct ScrapeResponse {
    pub success: bool,
    pub data: Option<ScrapeData>,
    pub error: Option<String>,
}

/// Scraped page payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScrapeData {
    pub markdown: Option<String>,
    pub html: Option<String>,
    #[serde(rename = "rawHtml")]
    pub raw_html: Option<String>,
    pub metadata: Option<PageMetadata>,
}

impl ScrapeData {
    /// Richest HTML available, if any.
    pub fn best_html(&self) -> Option<&str> {
        [self.raw_html.as_deref(), self.html.as_deref()]
            .into_iter()
            .flatten()
            .find(|s| !s.trim().is_empty())
    }

    pub fn markdown(&self) -> Option<&str> {
        self.markdown.as_deref().filter(|s| !s.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageMetadata {
    pub title: Option<String>,
    #[serde(rename = "sourceURL")]
    pub source_url: Option<String>,
    #[serde(rename = "statusCode")]
    pub status_code: Option<u16>,
}
