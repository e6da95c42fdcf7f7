//! Data types for listings, jobs, reports and configuration.

pub mod config;
pub mod content;
pub mod job;
pub mod listing;
pub mod report;
pub mod statistics;
