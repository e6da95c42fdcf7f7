//! Persistence contract for listings and their price history.
//!
//! The store layer only needs this narrow interface; durable storage
//! technology is up to the implementation (see `stores::memory` and, with
//! the `sqlite` feature, `stores::sqlite`).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::error::StoreResult;
use crate::types::listing::{ListingRecord, PriceHistoryEntry, SourceName, Uid};
use crate::types::statistics::StoreStatistics;

#[async_trait]
pub trait ListingRepository: Send + Sync {
    /// Get a listing by uid.
    async fn get(&self, uid: &Uid) -> StoreResult<Option<ListingRecord>>;

    /// Insert or replace a listing.
    async fn upsert(&self, record: &ListingRecord) -> StoreResult<()>;

    /// Append a price history entry for a uid.
    async fn append_price_history(&self, uid: &Uid, entry: &PriceHistoryEntry) -> StoreResult<()>;

    /// Price history for a uid, oldest first.
    async fn price_history(&self, uid: &Uid) -> StoreResult<Vec<PriceHistoryEntry>>;

    /// Uids of every active listing from a source.
    async fn active_uids(&self, source: SourceName) -> StoreResult<Vec<Uid>>;

    /// Summary counts; `recent_since` bounds the recently scraped count.
    async fn statistics(&self, recent_since: DateTime<Utc>) -> StoreResult<StoreStatistics>;

    /// Store a record together with the history entry its observation
    /// produced.
    ///
    /// The default appends the entry before writing the record, so a failed
    /// record write leaves the price in history and a failed append leaves
    /// nothing. Implementations with transactions should write both at once.
    async fn save(&self, record: &ListingRecord, entry: Option<&PriceHistoryEntry>) -> StoreResult<()> {
        if let Some(entry) = entry {
            self.append_price_history(&record.uid, entry).await?;
        }
        self.upsert(record).await
    }

    /// Most recently recorded price for a uid.
    async fn last_price(&self, uid: &Uid) -> StoreResult<Option<i64>> {
        Ok(self
            .price_history(uid)
            .await?
            .last()
            .map(|entry| entry.price_normalized))
    }
}

#[async_trait]
impl<T: ListingRepository + ?Sized> ListingRepository for Arc<T> {
    async fn get(&self, uid: &Uid) -> StoreResult<Option<ListingRecord>> {
        (**self).get(uid).await
    }

    async fn upsert(&self, record: &ListingRecord) -> StoreResult<()> {
        (**self).upsert(record).await
    }

    async fn append_price_history(&self, uid: &Uid, entry: &PriceHistoryEntry) -> StoreResult<()> {
        (**self).append_price_history(uid, entry).await
    }

    async fn price_history(&self, uid: &Uid) -> StoreResult<Vec<PriceHistoryEntry>> {
        (**self).price_history(uid).await
    }

    async fn active_uids(&self, source: SourceName) -> StoreResult<Vec<Uid>> {
        (**self).active_uids(source).await
    }

    async fn statistics(&self, recent_since: DateTime<Utc>) -> StoreResult<StoreStatistics> {
        (**self).statistics(recent_since).await
    }

    async fn save(&self, record: &ListingRecord, entry: Option<&PriceHistoryEntry>) -> StoreResult<()> {
        (**self).save(record, entry).await
    }

    async fn last_price(&self, uid: &Uid) -> StoreResult<Option<i64>> {
        (**self).last_price(uid).await
    }
}
