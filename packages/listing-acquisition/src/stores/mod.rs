//! Storage for listing records and price history.
//!
//! Available backends:
//! - `MemoryRepository` - In-memory storage (always available)
//! - `SqliteRepository` - SQLite storage (requires `sqlite` feature)
//!
//! `FreshnessStore` wraps any backend with the dedup and freshness rules.

pub mod freshness;
pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use freshness::{FreshnessStore, RecordOutcome};
pub use memory::MemoryRepository;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteRepository;
