//! Core trait abstractions for the acquisition engine.
//!
//! These traits are the seams between the orchestrator and its
//! collaborators: how content is fetched, how a portal page becomes a
//! listing, and where listings are persisted.

pub mod extractor;
pub mod fetcher;
pub mod repository;
