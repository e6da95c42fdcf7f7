//! Per-portal extraction.
//!
//! Each source is described by a declarative [`rules::ExtractionRules`]
//! table and exposed through the [`Extractor`](crate::traits::extractor::Extractor)
//! trait. The [`ExtractorRegistry`] selects the extractor for a source.

pub mod details;
pub mod features;
pub mod geo;
pub mod price;
pub mod registry;
pub mod rightmove;
pub mod rules;
pub mod text;
pub mod zoopla;

pub use registry::ExtractorRegistry;
pub use rightmove::RightmoveExtractor;
pub use rules::ExtractionRules;
pub use zoopla::ZooplaExtractor;
