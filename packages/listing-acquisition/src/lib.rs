//! Hybrid acquisition and deduplication engine for rental listings.
//!
//! Fetches listing pages from portals that differ in how they tolerate
//! automated access, normalizes them into one canonical record, and skips
//! listings that were acquired recently.
//!
//! # Usage
//!
//! ```rust,ignore
//! use listing_acquisition::{
//!     AcquisitionConfig, Candidate, DirectFetcher, FreshnessStore, MemoryRepository,
//!     Orchestrator, SourceName,
//! };
//!
//! let store = Arc::new(FreshnessStore::new(MemoryRepository::new()));
//! let config = AcquisitionConfig::new(Duration::from_secs(24 * 3600));
//! let orchestrator = Orchestrator::new(config, store)
//!     .with_fetcher(Arc::new(DirectFetcher::new(Duration::from_secs(30))?));
//!
//! let output = orchestrator
//!     .run_batch(vec![Candidate::new(
//!         "https://www.rightmove.co.uk/properties/152345678",
//!         SourceName::Rightmove,
//!     )])
//!     .await;
//! println!("{} new listings", output.report.new_count);
//! ```
//!
//! # Modules
//!
//! - [`traits`] - Core trait abstractions (Fetcher, Extractor, ListingRepository)
//! - [`types`] - Listings, jobs, reports and configuration
//! - [`fetchers`] - Direct and managed-crawl fetchers behind per-host gates
//! - [`extractors`] - Per-portal extraction rules
//! - [`stores`] - Repositories and the freshness store
//! - [`pipeline`] - Validation and the batch orchestrator
//! - [`testing`] - Mock implementations for testing

pub mod clock;
pub mod config;
pub mod error;
pub mod extractors;
pub mod fetchers;
pub mod pipeline;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use clock::{Clock, SystemClock};
pub use config::AppConfig;
pub use error::{
    AcquisitionError, ExtractionError, FetchError, Result, StoreError, ValidationError,
};
pub use extractors::{ExtractorRegistry, RightmoveExtractor, ZooplaExtractor};
pub use fetchers::{DirectFetcher, HostGate, HostGates, ManagedCrawlFetcher};
pub use pipeline::Orchestrator;
pub use stores::{FreshnessStore, MemoryRepository, RecordOutcome};
pub use traits::{
    extractor::{Extraction, Extractor},
    fetcher::Fetcher,
    repository::ListingRepository,
};
pub use types::{
    config::{AcquisitionConfig, HostConfig, RetryPolicy, SourcePolicy},
    content::{ContentFormat, RawContent},
    job::{AcquisitionJob, AttemptOutcome, AttemptRecord, Candidate, JobState},
    listing::{
        Coordinates, ExtractedListing, Feature, FetchStrategy, FurnishedState, LetType,
        ListingFields, ListingRecord, PriceHistoryEntry, PropertyType, SourceName, Uid,
    },
    report::{BatchOutput, FailureKind, JobFailure, ProcessedBatchReport, StrategyUsage},
    statistics::{PriceStatistics, SourceStatistics, StoreStatistics},
};

#[cfg(feature = "sqlite")]
pub use stores::SqliteRepository;
