//! Source to extractor lookup.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{ExtractionError, ExtractionResult};
use crate::extractors::rightmove::RightmoveExtractor;
use crate::extractors::zoopla::ZooplaExtractor;
use crate::traits::extractor::Extractor;
use crate::types::listing::SourceName;

/// Extractors keyed by source, built once and shared by every job.
#[derive(Clone)]
pub struct ExtractorRegistry {
    extractors: HashMap<SourceName, Arc<dyn Extractor>>,
}

impl Default for ExtractorRegistry {
    /// Registry with every built-in portal.
    fn default() -> Self {
        Self::new()
            .with_extractor(Arc::new(RightmoveExtractor))
            .with_extractor(Arc::new(ZooplaExtractor))
    }
}

impl ExtractorRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            extractors: HashMap::new(),
        }
    }

    /// Register an extractor under its own source, replacing any previous one.
    pub fn with_extractor(mut self, extractor: Arc<dyn Extractor>) -> Self {
        self.extractors.insert(extractor.source(), extractor);
        self
    }

    pub fn get(&self, source: SourceName) -> ExtractionResult<&Arc<dyn Extractor>> {
        self.extractors
            .get(&source)
            .ok_or_else(|| ExtractionError::UnknownSource(source.to_string()))
    }

    /// Source-local listing id for a URL.
    pub fn listing_id(&self, source: SourceName, url: &str) -> ExtractionResult<String> {
        self.get(source)?
            .listing_id(url)
            .ok_or_else(|| ExtractionError::NoListingId {
                url: url.to_string(),
            })
    }
}
