//! Acquisition pipeline.
//!
//! - `validate` - business rules applied to extracted listings
//! - `orchestrator` - batch driver with retry, fallback and cancellation

pub mod orchestrator;
pub mod validate;

pub use orchestrator::Orchestrator;
pub use validate::{validate, MAX_ROOMS};
