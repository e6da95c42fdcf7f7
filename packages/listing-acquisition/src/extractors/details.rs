//! Listing details beyond the headline facts: description, availability
//! and agent contact.

use regex::Regex;
use std::sync::LazyLock;

use crate::extractors::text::{decode_entities, html_to_text};
use crate::types::content::{ContentFormat, RawContent};

/// Shorter blocks are labels, not descriptions.
const MIN_DESCRIPTION_CHARS: usize = 20;

static RE_HTML_DESCRIPTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)<(?:div|section|article|p)\b[^>]*?(?:class|data-testid)\s*=\s*["'][^"']*description[^"']*["'][^>]*>(.*?)</(?:div|section|article|p)>"#,
    )
    .unwrap()
});
static RE_MARKDOWN_DESCRIPTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?ims)^#{1,6}\s*(?:property\s+|full\s+)?description\s*$(.*?)(?:^#|\z)").unwrap()
});
static RE_AVAILABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\bavailable\s*(?:from|date)?\s*:?\s*(now|immediately|\d{1,2}/\d{1,2}/\d{2,4}|\d{1,2}(?:st|nd|rd|th)?\s+[a-z]{3,9}\s+\d{4})\b",
    )
    .unwrap()
});
static RE_MARKETED_BY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^\s*(?:marketed|listed)\s+by:?\s*(.+?)\s*$").unwrap());
static RE_TEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\btel:\s*(\+?[0-9][0-9 ()\-]{7,}[0-9])").unwrap());
static RE_WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

fn squash(text: &str) -> String {
    RE_WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

/// Description block, whitespace collapsed.
pub fn find_description(raw: &RawContent) -> Option<String> {
    match raw.format {
        ContentFormat::Html => RE_HTML_DESCRIPTION
            .captures_iter(&raw.body)
            .filter_map(|caps| caps.get(1))
            .map(|m| squash(&html_to_text(m.as_str())))
            .find(|d| d.chars().count() > MIN_DESCRIPTION_CHARS),
        ContentFormat::Markdown => RE_MARKDOWN_DESCRIPTION
            .captures(&raw.body)
            .and_then(|caps| caps.get(1))
            .map(|m| squash(&decode_entities(m.as_str())))
            .filter(|d| d.chars().count() > MIN_DESCRIPTION_CHARS),
    }
}

/// Availability as written on the page.
pub fn find_available_date(text: &str) -> Option<String> {
    RE_AVAILABLE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| squash(m.as_str()))
}

/// Agent name from the source's agent element, else a "Marketed by" line.
pub fn find_agent_name(raw: &RawContent, anchor: &Regex, text: &str) -> Option<String> {
    let from_markup = match raw.format {
        ContentFormat::Html => anchor
            .captures_iter(&raw.body)
            .filter_map(|caps| caps.get(1))
            .map(|m| squash(&html_to_text(m.as_str())))
            .find(|name| name.chars().count() > 2),
        ContentFormat::Markdown => None,
    };

    from_markup.or_else(|| {
        RE_MARKETED_BY
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| squash(m.as_str()))
            .filter(|name| name.chars().count() > 2)
    })
}

/// First `tel:` link, reduced to digits and dialling punctuation.
pub fn find_agent_phone(body: &str) -> Option<String> {
    RE_TEL
        .captures_iter(body)
        .filter_map(|caps| caps.get(1))
        .map(|m| {
            m.as_str()
                .chars()
                .filter(|c| c.is_ascii_digit() || matches!(c, ' ' | '+' | '-' | '(' | ')'))
                .collect::<String>()
        })
        .map(|phone| squash(&phone))
        .find(|phone| phone.len() > 8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::listing::FetchStrategy;

    static RE_AGENT: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r#"(?is)<[a-z0-9]+\b[^>]*?class\s*=\s*["'][^"']*agent-name[^"']*["'][^>]*>(.*?)</[a-z0-9]+>"#,
        )
        .unwrap()
    });

    fn html(body: &str) -> RawContent {
        RawContent::html("https://x.test/1", body, FetchStrategy::Direct)
    }

    #[test]
    fn test_html_description() {
        let raw = html(
            r#"<div class="label-description">Key</div>
               <div data-testid="property-description">A bright   two bedroom flat
               moments from the station.</div>"#,
        );
        assert_eq!(
            find_description(&raw).as_deref(),
            Some("A bright two bedroom flat moments from the station.")
        );
    }

    #[test]
    fn test_markdown_description_stops_at_next_heading() {
        let raw = RawContent::markdown(
            "https://x.test/1",
            "# 1 bed flat\n\n## Description\n\nTop floor flat with views over the park.\n\n## Floorplan\n\nnone",
            FetchStrategy::ManagedCrawl,
        );
        assert_eq!(
            find_description(&raw).as_deref(),
            Some("Top floor flat with views over the park.")
        );
    }

    #[test]
    fn test_available_date() {
        assert_eq!(find_available_date("Let available date: 01/09/2024").as_deref(), Some("01/09/2024"));
        assert_eq!(find_available_date("Available now").as_deref(), Some("now"));
        assert_eq!(
            find_available_date("Available from 1st September 2024").as_deref(),
            Some("1st September 2024")
        );
        assert!(find_available_date("Parking not available").is_none());
    }

    #[test]
    fn test_agent_name_and_phone() {
        let raw = html(
            r#"<div class="agent-name"><a href="/agents/1">Foxtons &amp; Co</a></div>
               <a href="tel:020 7946 0000">Call agent</a>"#,
        );
        assert_eq!(
            find_agent_name(&raw, &RE_AGENT, "").as_deref(),
            Some("Foxtons & Co")
        );
        assert_eq!(find_agent_phone(&raw.body).as_deref(), Some("020 7946 0000"));
    }

    #[test]
    fn test_marketed_by_fallback() {
        let raw = RawContent::markdown("https://x.test/1", "", FetchStrategy::ManagedCrawl);
        let text = "£900 pcm\nMarketed by: Hunters, Leeds\nmore";
        assert_eq!(
            find_agent_name(&raw, &RE_AGENT, text).as_deref(),
            Some("Hunters, Leeds")
        );
        assert!(find_agent_phone("tel:123").is_none());
    }
}
