//! Store-wide summary figures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::listing::SourceName;

/// Listing counts for one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceStatistics {
    pub source: SourceName,
    pub total: u64,
    pub active: u64,
    /// Listings with a normalized price.
    pub with_price: u64,
    /// Mean monthly price in pence, rounded.
    pub average_price: Option<i64>,
}

/// Spread of current monthly prices, in pence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceStatistics {
    pub min: i64,
    pub max: i64,
    pub average: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreStatistics {
    /// One entry per source with stored listings, ordered by source.
    pub sources: Vec<SourceStatistics>,
    /// Listings scraped at or after `recent_since`.
    pub recently_scraped: u64,
    pub recent_since: DateTime<Utc>,
    /// `None` when no listing has a price.
    pub prices: Option<PriceStatistics>,
    /// History entries recording a change from an earlier price.
    pub price_changes: u64,
}

impl StoreStatistics {
    pub fn total(&self) -> u64 {
        self.sources.iter().map(|s| s.total).sum()
    }

    pub fn active(&self) -> u64 {
        self.sources.iter().map(|s| s.active).sum()
    }

    pub fn source(&self, source: SourceName) -> Option<&SourceStatistics> {
        self.sources.iter().find(|s| s.source == source)
    }
}

/// Rounded mean of `sum / count`.
pub(crate) fn rounded_average(sum: i128, count: u64) -> Option<i64> {
    if count == 0 {
        return None;
    }
    Some((sum as f64 / count as f64).round() as i64)
}
