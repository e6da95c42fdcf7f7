//! Zoopla listing pages.
//!
//! Zoopla blocks direct automated requests, so content usually arrives via
//! the managed crawler: HTML when available, otherwise markdown whose first
//! heading is the title ("3 bed flat to rent in Leeds LS1"). Maps come from
//! Zoopla's own tile service or Google static maps.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::ExtractionResult;
use crate::extractors::geo::{RE_GOOGLE_EMBED, RE_GOOGLE_STATIC_MAP, RE_ZOOPLA_MAP};
use crate::extractors::rules::ExtractionRules;
use crate::extractors::text::TitleSource;
use crate::traits::extractor::{Extraction, Extractor};
use crate::types::content::RawContent;
use crate::types::listing::SourceName;

static RE_LISTING_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/to-rent/details/(\d+)").unwrap());
static RE_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:to rent in|for rent in)\s+(.+?)(?:\s*(?:\||-\s*Zoopla)|$)").unwrap()
});
static RE_AGENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)<[a-z0-9]+\b[^>]*?(?:class|data-testid)\s*=\s*["'][^"']*(?:agent-name|agent_name|listing-agent|agent-details__name)[^"']*["'][^>]*>(.*?)</[a-z0-9]+>"#,
    )
    .unwrap()
});

pub static ZOOPLA_RULES: ExtractionRules = ExtractionRules {
    source: SourceName::Zoopla,
    listing_id: &RE_LISTING_ID,
    title_order: &[
        TitleSource::HtmlHeading,
        TitleSource::HtmlTitle,
        TitleSource::MarkdownHeading,
    ],
    address_anchor: &RE_ADDRESS,
    map_patterns: &[&RE_ZOOPLA_MAP, &RE_GOOGLE_STATIC_MAP, &RE_GOOGLE_EMBED],
    agent_anchor: &RE_AGENT,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct ZooplaExtractor;

impl Extractor for ZooplaExtractor {
    fn source(&self) -> SourceName {
        SourceName::Zoopla
    }

    fn listing_id(&self, url: &str) -> Option<String> {
        ZOOPLA_RULES.listing_id(url)
    }

    fn extract(&self, raw: &RawContent) -> ExtractionResult<Extraction> {
        ZOOPLA_RULES.extract(raw)
    }
}
