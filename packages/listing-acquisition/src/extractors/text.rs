//! Plain-text helpers shared by the portal extractors.

use regex::Regex;
use std::sync::LazyLock;

use crate::types::content::{ContentFormat, RawContent};

static RE_SCRIPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script[^>]*>.*?</script>").unwrap());
static RE_STYLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<style[^>]*>.*?</style>").unwrap());
static RE_BLOCK_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<(?:br\s*/?|/p|/div|/li|/h[1-6]|/tr)>").unwrap());
static RE_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
static RE_SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t\r\f]+").unwrap());
static RE_NEWLINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*\n\s*").unwrap());
static RE_NUMERIC_ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&#(x[0-9a-fA-F]+|[0-9]+);").unwrap());

static RE_HTML_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap());
static RE_HTML_H1: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<h1[^>]*>(.*?)</h1>").unwrap());
static RE_MARKDOWN_H1: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#\s+(.+?)\s*$").unwrap());

/// Decode the HTML entities that show up in listing pages.
pub fn decode_entities(text: &str) -> String {
    let decoded = RE_NUMERIC_ENTITY.replace_all(text, |caps: &regex::Captures| {
        let code = &caps[1];
        let value = match code.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => code.parse::<u32>().ok(),
        };
        value
            .and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_else(|| caps[0].to_string())
    });

    decoded
        .replace("&nbsp;", " ")
        .replace("&pound;", "£")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Strip markup and collapse whitespace, keeping block boundaries as
/// newlines.
pub fn html_to_text(html: &str) -> String {
    let text = RE_SCRIPT.replace_all(html, " ");
    let text = RE_STYLE.replace_all(&text, " ");
    let text = RE_BLOCK_BREAK.replace_all(&text, "\n");
    let text = RE_TAG.replace_all(&text, " ");
    let text = decode_entities(&text);
    let text = RE_SPACES.replace_all(&text, " ");
    let text = RE_NEWLINES.replace_all(&text, "\n");
    text.trim().to_string()
}

/// Body text of raw content regardless of its format.
pub fn body_text(raw: &RawContent) -> String {
    match raw.format {
        ContentFormat::Html => html_to_text(&raw.body),
        ContentFormat::Markdown => decode_entities(&raw.body),
    }
}

/// Where a page title can come from, in the order a source prefers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleSource {
    HtmlTitle,
    HtmlHeading,
    MarkdownHeading,
}

fn capture_text(re: &Regex, haystack: &str) -> Option<String> {
    re.captures(haystack)
        .and_then(|caps| caps.get(1))
        .map(|m| html_to_text(m.as_str()))
        .filter(|t| !t.is_empty())
}

/// First non-empty title found, trying sources in order.
pub fn find_title(raw: &RawContent, order: &[TitleSource]) -> Option<String> {
    order.iter().find_map(|source| match (source, raw.format) {
        (TitleSource::HtmlTitle, ContentFormat::Html) => capture_text(&RE_HTML_TITLE, &raw.body),
        (TitleSource::HtmlHeading, ContentFormat::Html) => capture_text(&RE_HTML_H1, &raw.body),
        (TitleSource::MarkdownHeading, _) => RE_MARKDOWN_H1
            .captures(&raw.body)
            .and_then(|caps| caps.get(1))
            .map(|m| decode_entities(m.as_str()).trim().to_string())
            .filter(|t| !t.is_empty()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::listing::FetchStrategy;

    #[test]
    fn test_html_to_text_strips_scripts_and_tags() {
        let html = r#"<html><head><script>var x = "<b>no</b>";</script><style>p{}</style></head>
            <body><p>£1,250&nbsp;pcm</p><ul><li>Garden</li><li>Parking &amp; storage</li></ul></body></html>"#;
        let text = html_to_text(html);

        assert!(text.contains("£1,250 pcm"));
        assert!(text.contains("Parking & storage"));
        assert!(!text.contains("var x"));
        assert!(!text.contains('<'));
    }

    #[test]
    fn test_numeric_entities() {
        assert_eq!(decode_entities("&#163;900 &#x2013; 2 bed"), "£900 – 2 bed");
        assert_eq!(decode_entities("a=1&amp;b=2"), "a=1&b=2");
    }

    #[test]
    fn test_title_fallback_order() {
        let raw = RawContent::html(
            "https://x.test/1",
            "<h1>Studio to rent</h1><p>body</p>",
            FetchStrategy::Direct,
        );
        let order = [TitleSource::HtmlTitle, TitleSource::HtmlHeading];
        assert_eq!(find_title(&raw, &order).as_deref(), Some("Studio to rent"));

        let md = RawContent::markdown(
            "https://x.test/1",
            "intro\n# 3 bed house to rent in Leeds\nmore",
            FetchStrategy::ManagedCrawl,
        );
        let order = [TitleSource::HtmlTitle, TitleSource::MarkdownHeading];
        assert_eq!(
            find_title(&md, &order).as_deref(),
            Some("3 bed house to rent in Leeds")
        );
    }
}
