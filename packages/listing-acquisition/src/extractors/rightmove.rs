//! Rightmove listing pages.
//!
//! Rightmove serves full HTML to direct requests. The `<title>` reads like
//! "2 bedroom flat for rent in Test Street, AB1 2CD | Rightmove" and the
//! location map is a `media.rightmove.co.uk/map/_generate` image.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::ExtractionResult;
use crate::extractors::geo::{RE_GOOGLE_EMBED, RE_GOOGLE_STATIC_MAP, RE_RIGHTMOVE_MAP};
use crate::extractors::rules::ExtractionRules;
use crate::extractors::text::TitleSource;
use crate::traits::extractor::{Extraction, Extractor};
use crate::types::content::RawContent;
use crate::types::listing::SourceName;

static RE_LISTING_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/properties/(\d+)").unwrap());
static RE_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:for rent in|to rent in|\bin)\s+(.+?)(?:\s*\||$)").unwrap()
});
static RE_AGENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)<[a-z0-9]+\b[^>]*?(?:class|data-testid)\s*=\s*["'][^"']*(?:agent-name|contactBranchName|branch-name)[^"']*["'][^>]*>(.*?)</[a-z0-9]+>"#,
    )
    .unwrap()
});

pub static RIGHTMOVE_RULES: ExtractionRules = ExtractionRules {
    source: SourceName::Rightmove,
    listing_id: &RE_LISTING_ID,
    title_order: &[
        TitleSource::HtmlTitle,
        TitleSource::HtmlHeading,
        TitleSource::MarkdownHeading,
    ],
    address_anchor: &RE_ADDRESS,
    map_patterns: &[&RE_RIGHTMOVE_MAP, &RE_GOOGLE_STATIC_MAP, &RE_GOOGLE_EMBED],
    agent_anchor: &RE_AGENT,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct RightmoveExtractor;

impl Extractor for RightmoveExtractor {
    fn source(&self) -> SourceName {
        SourceName::Rightmove
    }

    fn listing_id(&self, url: &str) -> Option<String> {
        RIGHTMOVE_RULES.listing_id(url)
    }

    fn extract(&self, raw: &RawContent) -> ExtractionResult<Extraction> {
        RIGHTMOVE_RULES.extract(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExtractionError;
    use crate::types::listing::{Coordinates, Feature, FetchStrategy, PropertyType};

    const URL: &str = "https://www.rightmove.co.uk/properties/152345678#/?channel=RES_LET";

    #[test]
    fn test_listing_id() {
        assert_eq!(RightmoveExtractor.listing_id(URL).as_deref(), Some("152345678"));
        assert!(RightmoveExtractor
            .listing_id("https://www.rightmove.co.uk/property-to-rent/find.html")
            .is_none());
    }

    #[test]
    fn test_fixture_title_and_price() {
        let raw = RawContent::html(
            URL,
            "<html><head><title>2 bedroom flat for rent in Test Street, AB1 2CD</title></head>\
             <body><p>£2,000 pcm</p></body></html>",
            FetchStrategy::Direct,
        );
        let extraction = RightmoveExtractor.extract(&raw).unwrap();
        let fields = &extraction.fields;

        assert_eq!(fields.bedrooms, Some(2));
        assert_eq!(fields.property_type, Some(PropertyType::Flat));
        assert!(fields.address.as_deref().unwrap().contains("Test Street"));
        assert_eq!(fields.postcode.as_deref(), Some("AB1 2CD"));
        assert_eq!(fields.price_raw.as_deref(), Some("£2,000 pcm"));
        assert_eq!(fields.price_normalized, Some(200_000));
        assert_eq!(extraction.confidence, 1.0);
    }

    #[test]
    fn test_full_page() {
        let raw = RawContent::html(
            URL,
            r#"<html><head><title>3 bedroom terraced house for rent in Harrow Road, London, W9 | Rightmove</title></head>
            <body>
              <h1>Harrow Road, London, W9</h1>
              <span>£2,450 pcm</span><span>£565 pw</span>
              <ul><li>2 bathrooms</li><li>Unfurnished</li><li>Private rear garden</li><li>Sorry, no pets</li></ul>
              <div data-testid="agent-name"><a href="/estate-agents/agent/Foxtons/Maida-Vale-1.html">Foxtons, Maida Vale</a></div>
              <a href="tel:020 3870 1234">Call agent</a>
              <img src="https://media.rightmove.co.uk/dir/property-photo/abc/1_max_656x437.jpeg">
              <img src="https://media.rightmove.co.uk/map/_generate?width=768&amp;height=347&amp;latitude=51.52523&amp;longitude=-0.19571&amp;signature=x">
            </body></html>"#,
            FetchStrategy::Direct,
        );
        let fields = RightmoveExtractor.extract(&raw).unwrap().fields;

        assert_eq!(fields.bedrooms, Some(3));
        assert_eq!(fields.bathrooms, Some(2));
        assert_eq!(fields.property_type, Some(PropertyType::House));
        assert_eq!(fields.address.as_deref(), Some("Harrow Road, London, W9"));
        assert_eq!(fields.price_normalized, Some(245_000));
        assert_eq!(fields.coordinates, Some(Coordinates::new(51.52523, -0.19571)));
        assert!(fields.features.contains(&Feature::Garden));
        assert!(!fields.features.contains(&Feature::PetsAllowed));
        assert_eq!(fields.images.len(), 1);
        assert_eq!(fields.area.as_deref(), Some("W9"));
        assert_eq!(fields.agent_name.as_deref(), Some("Foxtons, Maida Vale"));
        assert_eq!(fields.agent_phone.as_deref(), Some("020 3870 1234"));
    }

    #[test]
    fn test_empty_body() {
        let raw = RawContent::html(URL, "  \n ", FetchStrategy::Direct);
        let err = RightmoveExtractor.extract(&raw).unwrap_err();
        assert!(matches!(err, ExtractionError::EmptyContent { .. }));
    }
}
