//! Extractor trait for per-portal normalization.

use crate::error::ExtractionResult;
use crate::types::content::RawContent;
use crate::types::listing::{ListingFields, SourceName};

/// Fields recovered from one page plus how complete they are.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub fields: ListingFields,
    /// Fraction of required fields recovered, in `0.0..=1.0`.
    pub confidence: f32,
}

/// Turns raw content from one source into listing fields.
///
/// Extraction is pure CPU work, so the trait is synchronous.
pub trait Extractor: Send + Sync {
    /// The source this extractor understands.
    fn source(&self) -> SourceName;

    /// Source-local listing id parsed from a listing URL.
    fn listing_id(&self, url: &str) -> Option<String>;

    /// Extract listing fields from fetched content.
    fn extract(&self, raw: &RawContent) -> ExtractionResult<Extraction>;
}
