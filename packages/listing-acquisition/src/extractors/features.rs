//! Amenity and let-type detection from free text.
//!
//! Each feature has an allow pattern and an optional deny pattern. A deny
//! match suppresses the feature even when the allow pattern also matches,
//! so "no pets" never reads as pets allowed.

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

use crate::types::listing::{Feature, LetType};

static RE_PARKING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:parking(?:\s*(?:space|spot|bay)s?)?|garage[ds]?|car\s*port|driveway)\b",
    )
    .unwrap()
});
static RE_NO_PARKING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:no\s*parking|parking\s*not\s*(?:available|included)|street\s*parking\s*only)\b",
    )
    .unwrap()
});

static RE_GARDEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:gardens?|outdoor\s*space|patios?|courtyards?|decks?|(?:back|rear|private)\s+yards?|landscaped)\b",
    )
    .unwrap()
});
static RE_NO_GARDEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bno\s*(?:garden|outdoor\s*space)\b").unwrap()
});

static RE_BALCONY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:balcon(?:y|ies)|roof\s*terraces?|verandas?|loggias?)\b").unwrap()
});
static RE_NO_BALCONY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bno\s*balcon(?:y|ies)\b").unwrap());

static RE_PETS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:pets?\s*(?:are\s+)?(?:allowed|welcome|considered|accepted)|(?:dogs?|cats?|animals?)\s+(?:allowed|welcome|considered|accepted)|pet.?friendly|(?:pets?|animals?)\s*ok)\b",
    )
    .unwrap()
});
static RE_NO_PETS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:no\s+pets?|pets?\s+not\s+(?:allowed|permitted)|pet.?free|animals?\s+not\s+(?:allowed|permitted))\b",
    )
    .unwrap()
});

static RE_STUDENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:students?|university|academic\s*year|term\s*time|hmo|house\s*(?:in\s*)?multiple\s*occupation)\b",
    )
    .unwrap()
});
static RE_PROFESSIONAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:professionals?|corporate\s*(?:let|rental)|executive|business\s*(?:let|rental))\b",
    )
    .unwrap()
});
static RE_SHORT_TERM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:short.?term|temporary|holiday\s*(?:let|rental)|serviced\s*apartment|min(?:imum)?\s*[123]\s*(?:week|month)s?|flexible\s*(?:lease|term))\b",
    )
    .unwrap()
});
static RE_LONG_TERM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:long.?term|permanent|min(?:imum)?\s*(?:6|12)\s*months?|annual\s*(?:lease|tenancy)|assured\s*shorthold)\b",
    )
    .unwrap()
});

struct FeaturePattern {
    feature: Feature,
    allow: &'static LazyLock<Regex>,
    deny: Option<&'static LazyLock<Regex>>,
}

static FEATURE_PATTERNS: &[FeaturePattern] = &[
    FeaturePattern {
        feature: Feature::Parking,
        allow: &RE_PARKING,
        deny: Some(&RE_NO_PARKING),
    },
    FeaturePattern {
        feature: Feature::Garden,
        allow: &RE_GARDEN,
        deny: Some(&RE_NO_GARDEN),
    },
    FeaturePattern {
        feature: Feature::Balcony,
        allow: &RE_BALCONY,
        deny: Some(&RE_NO_BALCONY),
    },
    FeaturePattern {
        feature: Feature::PetsAllowed,
        allow: &RE_PETS,
        deny: Some(&RE_NO_PETS),
    },
];

/// Let types in priority order; the first match wins.
static LET_TYPE_PATTERNS: &[(LetType, &LazyLock<Regex>)] = &[
    (LetType::Student, &RE_STUDENT),
    (LetType::Professional, &RE_PROFESSIONAL),
    (LetType::ShortTerm, &RE_SHORT_TERM),
    (LetType::LongTerm, &RE_LONG_TERM),
];

/// Features mentioned and not negated in the text.
pub fn detect_features(text: &str) -> BTreeSet<Feature> {
    FEATURE_PATTERNS
        .iter()
        .filter(|p| !p.deny.is_some_and(|deny| deny.is_match(text)))
        .filter(|p| p.allow.is_match(text))
        .map(|p| p.feature)
        .collect()
}

pub fn detect_let_type(text: &str) -> Option<LetType> {
    LET_TYPE_PATTERNS
        .iter()
        .find(|(_, re)| re.is_match(text))
        .map(|(let_type, _)| *let_type)
}
