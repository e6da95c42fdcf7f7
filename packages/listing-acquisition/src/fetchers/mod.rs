//! Retrieval strategies and the per-host gates that wrap them.

pub mod direct;
pub mod gate;
pub mod managed;

pub use direct::DirectFetcher;
pub use gate::{host_of, HostGate, HostGates};
pub use managed::ManagedCrawlFetcher;
