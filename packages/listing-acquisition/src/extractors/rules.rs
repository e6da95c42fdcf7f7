//! Declarative per-source extraction rules and the algorithm that applies
//! them.
//!
//! A source is described by an [`ExtractionRules`] table: where its titles
//! live, how its titles phrase the address, which static-map assets it
//! embeds, where it names the letting agent and how its listing URLs carry
//! an id. Everything else (price, postcode, features, images, confidence)
//! is shared.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::error::{ExtractionError, ExtractionResult};
use crate::extractors::details::{
    find_agent_name, find_agent_phone, find_available_date, find_description,
};
use crate::extractors::features::{detect_features, detect_let_type};
use crate::extractors::geo::find_coordinates;
use crate::extractors::price::find_price;
use crate::extractors::text::{body_text, find_title, TitleSource};
use crate::traits::extractor::Extraction;
use crate::types::content::{ContentFormat, RawContent};
use crate::types::listing::{FurnishedState, ListingFields, PropertyType, SourceName};

/// Maximum images kept per listing.
pub const MAX_IMAGES: usize = 10;

/// Price, bedrooms and address.
const REQUIRED_FIELDS: f32 = 3.0;

static RE_BEDROOMS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d{1,2})\s*-?\s*bed(?:room)?s?\b").unwrap());
static RE_BATHROOMS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d{1,2})\s*-?\s*bath(?:room)?s?\b").unwrap());
static RE_TYPE_AFTER_BED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\bbed(?:room)?s?\s+(semi-detached|detached|terraced|end[\s-]terrace|flat|apartment|house|studio|maisonette|bungalow)\b",
    )
    .unwrap()
});
static RE_TYPE_BARE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(semi-detached|detached|terraced|end[\s-]terrace|flat|apartment|house|studio|maisonette|bungalow)\b",
    )
    .unwrap()
});
static RE_POSTCODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([A-Z]{1,2}[0-9R][0-9A-Z]?)\s*([0-9][A-Z]{2})\b").unwrap()
});
static RE_PART_FURNISHED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:part|partly|partially)[\s-]furnished\b").unwrap());
static RE_UNFURNISHED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bunfurnished\b").unwrap());
static RE_FURNISHED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:^|[^-\w])furnished\b").unwrap());
static RE_HTML_IMG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<img\b[^>]*?\bsrc\s*=\s*["']([^"']+)["']"#).unwrap());
static RE_MARKDOWN_IMG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[[^\]]*\]\(([^)\s]+)").unwrap());

/// How a single source is parsed.
pub struct ExtractionRules {
    pub source: SourceName,

    /// Captures the source-local id from a listing URL in group 1.
    pub listing_id: &'static LazyLock<Regex>,

    /// Where to look for the title, in order.
    pub title_order: &'static [TitleSource],

    /// Captures the address fragment of a title in group 1.
    pub address_anchor: &'static LazyLock<Regex>,

    /// Static-map asset patterns, most reliable first.
    pub map_patterns: &'static [&'static LazyLock<Regex>],

    /// Captures the inner markup of the agent name element in group 1.
    pub agent_anchor: &'static LazyLock<Regex>,
}

impl ExtractionRules {
    pub fn listing_id(&self, url: &str) -> Option<String> {
        self.listing_id
            .captures(url)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }

    /// Apply the rules to fetched content.
    pub fn extract(&self, raw: &RawContent) -> ExtractionResult<Extraction> {
        if !raw.has_content() {
            return Err(ExtractionError::EmptyContent {
                url: raw.url.clone(),
            });
        }

        let text = body_text(raw);
        if text.is_empty() {
            return Err(ExtractionError::Unparseable {
                url: raw.url.clone(),
                reason: "no text left after stripping markup".to_string(),
            });
        }

        let title = find_title(raw, self.title_order);
        let title_text = title.as_deref().unwrap_or("");

        let mut fields = ListingFields {
            title: title.clone(),
            ..Default::default()
        };

        fields.bedrooms = first_number(&RE_BEDROOMS, title_text)
            .or_else(|| first_number(&RE_BEDROOMS, &text));
        fields.property_type = property_type(title_text).or_else(|| {
            first_capture(&RE_TYPE_AFTER_BED, &text).map(|t| to_property_type(&t))
        });
        if fields.bedrooms.is_none() && fields.property_type == Some(PropertyType::Studio) {
            fields.bedrooms = Some(0);
        }
        fields.address = first_capture(self.address_anchor, title_text)
            .map(|a| a.trim_matches(|c: char| c == ',' || c.is_whitespace()).to_string())
            .filter(|a| !a.is_empty());

        if let Some(price) = find_price(title_text).or_else(|| find_price(&text)) {
            fields.price_normalized = price.monthly_pence();
            if fields.price_normalized.is_some() {
                fields.price_raw = Some(price.raw);
            }
        }

        fields.postcode = [fields.address.as_deref(), title.as_deref()]
            .into_iter()
            .flatten()
            .find_map(|s| find_postcode(&s.to_uppercase()))
            .or_else(|| find_postcode(&text));
        fields.area = fields.address.as_deref().and_then(area_from_address);

        fields.bathrooms = first_number(&RE_BATHROOMS, &text);
        fields.furnished_state = furnished_state(&text);
        fields.coordinates = find_coordinates(&raw.body, self.map_patterns);
        fields.features = detect_features(&text);
        fields.let_type = detect_let_type(&text);
        fields.images = extract_images(raw);
        fields.description = find_description(raw);
        fields.available_date = find_available_date(&text);
        fields.agent_name = find_agent_name(raw, self.agent_anchor, &text);
        fields.agent_phone = find_agent_phone(&raw.body);

        let recovered = [
            fields.price_normalized.is_some(),
            fields.bedrooms.is_some(),
            fields.address.is_some(),
        ]
        .into_iter()
        .filter(|found| *found)
        .count();

        if recovered == 0 {
            return Err(ExtractionError::MissingRequiredFields {
                url: raw.url.clone(),
            });
        }

        Ok(Extraction {
            fields,
            confidence: recovered as f32 / REQUIRED_FIELDS,
        })
    }
}

fn first_capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

fn first_number(re: &Regex, text: &str) -> Option<u32> {
    first_capture(re, text).and_then(|n| n.parse().ok())
}

fn to_property_type(word: &str) -> PropertyType {
    PropertyType::from_keyword(&word.replace('-', " "))
}

/// Property type from a title: "N bedroom <type>" first, then any type
/// word.
fn property_type(title: &str) -> Option<PropertyType> {
    first_capture(&RE_TYPE_AFTER_BED, title)
        .or_else(|| first_capture(&RE_TYPE_BARE, title))
        .map(|t| to_property_type(&t))
}

/// Upper-case postcode with a single space before the inward code.
pub fn find_postcode(text: &str) -> Option<String> {
    RE_POSTCODE
        .captures(text)
        .map(|caps| format!("{} {}", &caps[1], &caps[2]))
}

/// Last comma-separated part of an address once any postcode is removed.
/// Single-part addresses have no separate area.
pub fn area_from_address(address: &str) -> Option<String> {
    let without_postcode = RE_POSTCODE.replace_all(address, "");
    let parts: Vec<&str> = without_postcode
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect();
    match parts.as_slice() {
        [_, .., last] => Some(last.to_string()),
        _ => None,
    }
}

fn furnished_state(text: &str) -> Option<FurnishedState> {
    if RE_PART_FURNISHED.is_match(text) {
        return Some(FurnishedState::PartFurnished);
    }
    match (RE_UNFURNISHED.is_match(text), RE_FURNISHED.is_match(text)) {
        (true, false) => Some(FurnishedState::Unfurnished),
        (false, true) => Some(FurnishedState::Furnished),
        // "furnished or unfurnished" says nothing
        _ => None,
    }
}

fn is_listing_image(src: &str) -> bool {
    let lower = src.to_ascii_lowercase();
    if !(lower.starts_with("https://") || lower.starts_with("http://")) {
        return false;
    }
    if lower.contains("logo") || lower.contains("map/_generate") || lower.contains("staticmap") {
        return false;
    }
    let path = lower.split(['?', '#']).next().unwrap_or("");
    [".jpg", ".jpeg", ".png", ".webp"]
        .iter()
        .any(|ext| path.ends_with(ext))
}

/// Absolute listing photo URLs, deduplicated in page order.
pub fn extract_images(raw: &RawContent) -> Vec<String> {
    let re: &Regex = match raw.format {
        ContentFormat::Html => &*RE_HTML_IMG,
        ContentFormat::Markdown => &*RE_MARKDOWN_IMG,
    };

    let mut seen = HashSet::new();
    re.captures_iter(&raw.body)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().replace("&amp;", "&"))
        .filter(|src| is_listing_image(src))
        .filter(|src| seen.insert(src.clone()))
        .take(MAX_IMAGES)
        .collect()
}
