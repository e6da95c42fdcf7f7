//! Coordinates decoded from static-map asset references.
//!
//! Listing pages rarely state a location outright, but the small map image
//! next to the address is generated from a URL that carries it.

use regex::Regex;
use std::sync::LazyLock;

use crate::extractors::text::decode_entities;
use crate::types::listing::Coordinates;

/// UK bounding box; anything outside is a decoding accident.
const UK_LATITUDE: std::ops::RangeInclusive<f64> = 49.5..=61.0;
const UK_LONGITUDE: std::ops::RangeInclusive<f64> = -8.5..=2.0;

pub static RE_RIGHTMOVE_MAP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)media\.rightmove\.co\.uk/map/_generate[^"'\s]*?[?&]latitude=(-?\d+(?:\.\d+)?)[^"'\s]*?[?&]longitude=(-?\d+(?:\.\d+)?)"#,
    )
    .unwrap()
});
pub static RE_ZOOPLA_MAP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)https?://[^"'\s]*zoopla[^"'\s]*?[?&]lat=(-?\d+(?:\.\d+)?)[^"'\s]*?[?&]lng=(-?\d+(?:\.\d+)?)"#,
    )
    .unwrap()
});
pub static RE_GOOGLE_STATIC_MAP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)maps\.googleapis\.com/maps/api/staticmap[^"'\s]*?[?&](?:center|markers)=(?:[^"'\s&]*?%7C|[^"'\s&]*?\|)?(-?\d+(?:\.\d+)?)(?:,|%2C)(-?\d+(?:\.\d+)?)"#,
    )
    .unwrap()
});
pub static RE_GOOGLE_EMBED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)google\.com/maps[^"'\s]*?[?&@](?:q=)?(-?\d+(?:\.\d+)?)(?:,|%2C)(-?\d+(?:\.\d+)?)"#,
    )
    .unwrap()
});

/// Decode the first in-range coordinate pair matched by any pattern, in
/// the given order.
pub fn find_coordinates(body: &str, patterns: &[&'static LazyLock<Regex>]) -> Option<Coordinates> {
    let content = decode_entities(body);
    patterns.iter().find_map(|pattern| {
        pattern.captures_iter(&content).find_map(|caps| {
            let latitude: f64 = caps[1].parse().ok()?;
            let longitude: f64 = caps[2].parse().ok()?;
            in_uk(latitude, longitude).then(|| Coordinates::new(latitude, longitude))
        })
    })
}

pub fn in_uk(latitude: f64, longitude: f64) -> bool {
    UK_LATITUDE.contains(&latitude) && UK_LONGITUDE.contains(&longitude)
}
