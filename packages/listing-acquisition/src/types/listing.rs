//! Canonical listing record and its value types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// External listing provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceName {
    Rightmove,
    Zoopla,
}

impl SourceName {
    pub const ALL: [SourceName; 2] = [SourceName::Rightmove, SourceName::Zoopla];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceName::Rightmove => "rightmove",
            SourceName::Zoopla => "zoopla",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rightmove" => Some(SourceName::Rightmove),
            "zoopla" => Some(SourceName::Zoopla),
            _ => None,
        }
    }
}

impl fmt::Display for SourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable listing identity: `source:local_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uid(String);

impl Uid {
    pub fn new(source: SourceName, local_id: &str) -> Self {
        Self(format!("{}:{}", source.as_str(), local_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse a stored `source:local_id` string.
    pub fn parse(s: &str) -> Option<Self> {
        let (source, id) = s.split_once(':')?;
        if id.is_empty() {
            return None;
        }
        Some(Self::new(SourceName::parse(source)?, id))
    }

    /// Split back into source and local id.
    pub fn parts(&self) -> Option<(SourceName, &str)> {
        let (source, id) = self.0.split_once(':')?;
        Some((SourceName::parse(source)?, id))
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which retrieval strategy produced the raw content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStrategy {
    Direct,
    ManagedCrawl,
}

impl FetchStrategy {
    pub fn alternate(self) -> Self {
        match self {
            FetchStrategy::Direct => FetchStrategy::ManagedCrawl,
            FetchStrategy::ManagedCrawl => FetchStrategy::Direct,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FetchStrategy::Direct => "direct",
            FetchStrategy::ManagedCrawl => "managed_crawl",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "direct" => Some(FetchStrategy::Direct),
            "managed_crawl" => Some(FetchStrategy::ManagedCrawl),
            _ => None,
        }
    }
}

impl fmt::Display for FetchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    Flat,
    Apartment,
    House,
    Studio,
    Maisonette,
    Bungalow,
    Unknown,
}

impl PropertyType {
    /// Map free text to a property type. House sub-kinds collapse to `House`.
    pub fn from_keyword(s: &str) -> Self {
        let s = s.to_ascii_lowercase();
        const MAPPING: &[(&str, PropertyType)] = &[
            ("flat", PropertyType::Flat),
            ("apartment", PropertyType::Apartment),
            ("maisonette", PropertyType::Maisonette),
            ("studio", PropertyType::Studio),
            ("bungalow", PropertyType::Bungalow),
            ("house", PropertyType::House),
            ("semi-detached", PropertyType::House),
            ("detached", PropertyType::House),
            ("terraced", PropertyType::House),
            ("end terrace", PropertyType::House),
        ];
        MAPPING
            .iter()
            .find(|(key, _)| s.contains(key))
            .map(|(_, t)| *t)
            .unwrap_or(PropertyType::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyType::Flat => "flat",
            PropertyType::Apartment => "apartment",
            PropertyType::House => "house",
            PropertyType::Studio => "studio",
            PropertyType::Maisonette => "maisonette",
            PropertyType::Bungalow => "bungalow",
            PropertyType::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FurnishedState {
    Furnished,
    PartFurnished,
    Unfurnished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LetType {
    LongTerm,
    ShortTerm,
    Student,
    Professional,
}

/// Amenity flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Parking,
    Garden,
    Balcony,
    PetsAllowed,
}

/// Fields recovered from one page.
///
/// Everything is optional; which fields are required is decided by the
/// extractor's confidence scoring, not by the type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListingFields {
    pub title: Option<String>,
    pub address: Option<String>,
    pub postcode: Option<String>,
    /// District: the last address part once the postcode is removed.
    pub area: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub price_raw: Option<String>,
    pub price_normalized: Option<i64>,
    pub bedrooms: Option<u32>,
    pub bathrooms: Option<u32>,
    pub property_type: Option<PropertyType>,
    pub furnished_state: Option<FurnishedState>,
    pub let_type: Option<LetType>,
    pub description: Option<String>,
    /// As written on the page ("Now", "01/09/2024").
    pub available_date: Option<String>,
    pub agent_name: Option<String>,
    pub agent_phone: Option<String>,
    #[serde(default)]
    pub features: BTreeSet<Feature>,
    #[serde(default)]
    pub images: Vec<String>,
}

impl ListingFields {
    /// Overwrite with every field `newer` recovered.
    pub fn merge_from(&mut self, newer: ListingFields) {
        fn take<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }

        take(&mut self.title, newer.title);
        take(&mut self.address, newer.address);
        take(&mut self.postcode, newer.postcode);
        take(&mut self.area, newer.area);
        take(&mut self.coordinates, newer.coordinates);
        take(&mut self.price_raw, newer.price_raw);
        take(&mut self.price_normalized, newer.price_normalized);
        take(&mut self.bedrooms, newer.bedrooms);
        take(&mut self.bathrooms, newer.bathrooms);
        take(&mut self.property_type, newer.property_type);
        take(&mut self.furnished_state, newer.furnished_state);
        take(&mut self.let_type, newer.let_type);
        take(&mut self.description, newer.description);
        take(&mut self.available_date, newer.available_date);
        take(&mut self.agent_name, newer.agent_name);
        take(&mut self.agent_phone, newer.agent_phone);
        if !newer.features.is_empty() {
            self.features = newer.features;
        }
        if !newer.images.is_empty() {
            self.images = newer.images;
        }
    }
}

/// A validated extraction ready for the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedListing {
    pub uid: Uid,
    pub source: SourceName,
    pub source_local_id: String,
    pub url: String,
    pub fields: ListingFields,
    pub extraction_method: FetchStrategy,
    pub extraction_confidence: f32,
    /// When the raw content was fetched.
    pub observed_at: DateTime<Utc>,
}

/// Canonical stored listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingRecord {
    pub uid: Uid,
    pub source: SourceName,
    pub source_local_id: String,
    pub url: String,
    #[serde(flatten)]
    pub fields: ListingFields,
    pub extraction_method: FetchStrategy,
    pub extraction_confidence: f32,
    pub first_seen: DateTime<Utc>,
    pub last_scraped: DateTime<Utc>,
    pub scrape_count: u32,
    pub is_active: bool,
}

impl ListingRecord {
    /// First sighting of a listing.
    pub fn from_extracted(extracted: ExtractedListing) -> Self {
        Self {
            uid: extracted.uid,
            source: extracted.source,
            source_local_id: extracted.source_local_id,
            url: extracted.url,
            fields: extracted.fields,
            extraction_method: extracted.extraction_method,
            extraction_confidence: extracted.extraction_confidence,
            first_seen: extracted.observed_at,
            last_scraped: extracted.observed_at,
            scrape_count: 1,
            is_active: true,
        }
    }

    /// Fold a newer observation into this record. Identity and `first_seen`
    /// never change; fields the observation did not recover keep their
    /// stored values.
    pub fn apply(&mut self, extracted: ExtractedListing) {
        self.url = extracted.url;
        self.fields.merge_from(extracted.fields);
        self.extraction_method = extracted.extraction_method;
        self.extraction_confidence = extracted.extraction_confidence;
        self.last_scraped = extracted.observed_at;
        self.scrape_count = self.scrape_count.saturating_add(1);
        self.is_active = true;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceHistoryEntry {
    pub uid: Uid,
    pub price_normalized: i64,
    pub price_raw: Option<String>,
    /// Difference from the previous recorded price, in minor units.
    pub change: Option<i64>,
    pub recorded_at: DateTime<Utc>,
}
