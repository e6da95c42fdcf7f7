//! Deduplication and freshness tracking on top of a repository.
//!
//! The store decides whether a known listing is due for another fetch,
//! folds new observations into the canonical record and keeps the price
//! history. Updates to the same uid are serialized; different uids never
//! wait on each other.
//!
//! Price changes are measured against the last history entry rather than
//! the stored record, so a save that failed halfway is repaired by the
//! next observation of the same price.

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::error::StoreResult;
use crate::traits::repository::ListingRepository;
use crate::types::listing::{
    ExtractedListing, ListingRecord, PriceHistoryEntry, SourceName, Uid,
};
use crate::types::statistics::StoreStatistics;

/// What `record_outcome` did with an observation.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordOutcome {
    /// The stored record after the update.
    pub record: ListingRecord,
    /// First sighting of this uid.
    pub is_new: bool,
    /// A history entry was appended for a changed price.
    pub price_changed: bool,
    /// Observation predates the stored record and was ignored.
    pub stale: bool,
}

pub struct FreshnessStore<R: ListingRepository> {
    repo: R,
    clock: Arc<dyn Clock>,
    locks: DashMap<Uid, Arc<Mutex<()>>>,
}

impl<R: ListingRepository> FreshnessStore<R> {
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            clock: Arc::new(SystemClock),
            locks: DashMap::new(),
        }
    }

    /// Use a different time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// True if the uid is unknown or was last scraped at least
    /// `freshness_window` ago.
    pub async fn should_scrape(&self, uid: &Uid, freshness_window: Duration) -> StoreResult<bool> {
        let Some(record) = self.repo.get(uid).await? else {
            return Ok(true);
        };
        let window = TimeDelta::from_std(freshness_window).unwrap_or(TimeDelta::MAX);
        let age = self.clock.now() - record.last_scraped;
        Ok(age >= window)
    }

    /// Create or update the record for an extracted listing.
    pub async fn record_outcome(&self, extracted: ExtractedListing) -> StoreResult<RecordOutcome> {
        let uid = extracted.uid.clone();
        let lock = self.lock_for(&uid);
        let guard = lock.lock().await;

        let result = self.apply_locked(extracted).await;

        drop(guard);
        drop(lock);
        self.release(&uid);
        result
    }

    async fn apply_locked(&self, extracted: ExtractedListing) -> StoreResult<RecordOutcome> {
        let Some(mut record) = self.repo.get(&extracted.uid).await? else {
            let record = ListingRecord::from_extracted(extracted);
            let entry = record
                .fields
                .price_normalized
                .map(|price| history_entry(&record, price, None));
            self.repo.save(&record, entry.as_ref()).await?;
            debug!(uid = %record.uid, "New listing stored");
            return Ok(RecordOutcome {
                record,
                is_new: true,
                price_changed: false,
                stale: false,
            });
        };

        if extracted.observed_at < record.last_scraped {
            debug!(
                uid = %record.uid,
                observed_at = %extracted.observed_at,
                last_scraped = %record.last_scraped,
                "Ignoring stale observation"
            );
            return Ok(RecordOutcome {
                record,
                is_new: false,
                price_changed: false,
                stale: true,
            });
        }

        let last = self.repo.last_price(&record.uid).await?;
        let observed = extracted.fields.price_normalized;
        record.apply(extracted);

        let entry = match observed {
            Some(price) if observed != last => {
                Some(history_entry(&record, price, last.map(|p| price - p)))
            }
            _ => None,
        };
        self.repo.save(&record, entry.as_ref()).await?;

        if let Some(entry) = &entry {
            info!(
                uid = %record.uid,
                price = entry.price_normalized,
                change = ?entry.change,
                "Price changed"
            );
        }
        debug!(uid = %record.uid, scrape_count = record.scrape_count, "Listing updated");

        Ok(RecordOutcome {
            record,
            is_new: false,
            price_changed: entry.is_some(),
            stale: false,
        })
    }

    /// Mark listings inactive. Returns how many changed state.
    pub async fn mark_absent(&self, uids: &[Uid]) -> StoreResult<usize> {
        let mut changed = 0;
        for uid in uids {
            let lock = self.lock_for(uid);
            let guard = lock.lock().await;

            let result = match self.repo.get(uid).await {
                Ok(Some(mut record)) if record.is_active => {
                    record.is_active = false;
                    self.repo.upsert(&record).await.map(|_| true)
                }
                Ok(_) => Ok(false),
                Err(e) => Err(e),
            };

            drop(guard);
            drop(lock);
            self.release(uid);

            if result? {
                changed += 1;
            }
        }
        debug!(requested = uids.len(), changed, "Marked listings absent");
        Ok(changed)
    }

    pub async fn price_history(&self, uid: &Uid) -> StoreResult<Vec<PriceHistoryEntry>> {
        self.repo.price_history(uid).await
    }

    /// Store totals, counting listings scraped within `recent` as recent.
    pub async fn statistics(&self, recent: Duration) -> StoreResult<StoreStatistics> {
        let since = TimeDelta::from_std(recent)
            .ok()
            .and_then(|window| self.clock.now().checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        self.repo.statistics(since).await
    }

    pub async fn active_uids(&self, source: SourceName) -> StoreResult<Vec<Uid>> {
        self.repo.active_uids(source).await
    }

    pub async fn get(&self, uid: &Uid) -> StoreResult<Option<ListingRecord>> {
        self.repo.get(uid).await
    }

    fn lock_for(&self, uid: &Uid) -> Arc<Mutex<()>> {
        Arc::clone(
            self.locks
                .entry(uid.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        )
    }

    /// Drop the uid's lock once nobody else holds it.
    fn release(&self, uid: &Uid) {
        self.locks.remove_if(uid, |_, lock| Arc::strong_count(lock) == 1);
    }
}

fn history_entry(record: &ListingRecord, price: i64, change: Option<i64>) -> PriceHistoryEntry {
    PriceHistoryEntry {
        uid: record.uid.clone(),
        price_normalized: price,
        price_raw: record.fields.price_raw.clone(),
        change,
        recorded_at: record.last_scraped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::stores::memory::MemoryRepository;
    use crate::testing::{fixtures, ManualClock};
    use crate::traits::repository::ListingRepository;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Memory repository whose first history write fails.
    #[derive(Default)]
    struct FlakyHistory {
        inner: MemoryRepository,
        failed: AtomicBool,
    }

    #[async_trait]
    impl ListingRepository for FlakyHistory {
        async fn get(&self, uid: &Uid) -> StoreResult<Option<ListingRecord>> {
            self.inner.get(uid).await
        }

        async fn upsert(&self, record: &ListingRecord) -> StoreResult<()> {
            self.inner.upsert(record).await
        }

        async fn append_price_history(&self, uid: &Uid, entry: &PriceHistoryEntry) -> StoreResult<()> {
            if !self.failed.swap(true, Ordering::SeqCst) {
                return Err(StoreError::storage("history write failed"));
            }
            self.inner.append_price_history(uid, entry).await
        }

        async fn price_history(&self, uid: &Uid) -> StoreResult<Vec<PriceHistoryEntry>> {
            self.inner.price_history(uid).await
        }

        async fn active_uids(&self, source: SourceName) -> StoreResult<Vec<Uid>> {
            self.inner.active_uids(source).await
        }

        async fn statistics(&self, recent_since: DateTime<Utc>) -> StoreResult<StoreStatistics> {
            self.inner.statistics(recent_since).await
        }
    }

    fn store() -> (FreshnessStore<MemoryRepository>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(fixtures::epoch()));
        let store = FreshnessStore::new(MemoryRepository::new()).with_clock(clock.clone());
        (store, clock)
    }

    #[tokio::test]
    async fn test_should_scrape_window_boundary() {
        let (store, clock) = store();
        let window = Duration::from_secs(3600);
        let listing = fixtures::extracted(SourceName::Rightmove, "1", Some(100_000), clock.now());
        let uid = listing.uid.clone();

        assert!(store.should_scrape(&uid, window).await.unwrap());
        store.record_outcome(listing).await.unwrap();

        clock.advance(Duration::from_secs(3599));
        assert!(!store.should_scrape(&uid, window).await.unwrap());

        clock.advance(Duration::from_secs(1));
        assert!(store.should_scrape(&uid, window).await.unwrap());
    }

    #[tokio::test]
    async fn test_identical_observations_record_one_history_entry() {
        let (store, clock) = store();
        let listing = fixtures::extracted(SourceName::Zoopla, "7", Some(150_000), clock.now());
        let uid = listing.uid.clone();

        let first = store.record_outcome(listing.clone()).await.unwrap();
        let second = store.record_outcome(listing).await.unwrap();

        assert!(first.is_new);
        assert!(!second.is_new);
        assert!(!second.price_changed);
        assert_eq!(second.record.scrape_count, 2);
        assert_eq!(store.price_history(&uid).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_price_change_appends_with_delta() {
        let (store, clock) = store();
        let first = fixtures::extracted(SourceName::Rightmove, "3", Some(200_000), clock.now());
        let uid = first.uid.clone();
        store.record_outcome(first).await.unwrap();

        clock.advance(Duration::from_secs(86_400));
        let cheaper = fixtures::extracted(SourceName::Rightmove, "3", Some(190_000), clock.now());
        let outcome = store.record_outcome(cheaper).await.unwrap();

        assert!(outcome.price_changed);
        let history = store.price_history(&uid).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].change, Some(-10_000));
        assert!(history[0].recorded_at < history[1].recorded_at);
    }

    #[tokio::test]
    async fn test_failed_history_write_is_recovered() {
        let clock = Arc::new(ManualClock::new(fixtures::epoch()));
        let store = FreshnessStore::new(FlakyHistory::default()).with_clock(clock.clone());
        let listing = fixtures::extracted(SourceName::Zoopla, "2", None, clock.now());
        let uid = listing.uid.clone();
        store.record_outcome(listing).await.unwrap();

        clock.advance(Duration::from_secs(60));
        let priced = fixtures::extracted(SourceName::Zoopla, "2", Some(130_000), clock.now());
        assert!(store.record_outcome(priced.clone()).await.is_err());
        assert_eq!(store.get(&uid).await.unwrap().unwrap().scrape_count, 1);

        let outcome = store.record_outcome(priced).await.unwrap();
        assert!(outcome.price_changed);
        assert_eq!(outcome.record.scrape_count, 2);
        let history = store.price_history(&uid).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].price_normalized, 130_000);
        assert_eq!(history[0].change, None);
    }

    #[tokio::test]
    async fn test_statistics_window() {
        let (store, clock) = store();
        store
            .record_outcome(fixtures::extracted(SourceName::Rightmove, "1", Some(100_000), clock.now()))
            .await
            .unwrap();
        clock.advance(Duration::from_secs(2 * 86_400));
        store
            .record_outcome(fixtures::extracted(SourceName::Zoopla, "1", Some(90_000), clock.now()))
            .await
            .unwrap();
        store
            .record_outcome(fixtures::extracted(SourceName::Zoopla, "1", Some(80_000), clock.now()))
            .await
            .unwrap();

        let stats = store.statistics(Duration::from_secs(86_400)).await.unwrap();
        assert_eq!(stats.total(), 2);
        assert_eq!(stats.recently_scraped, 1);
        assert_eq!(stats.price_changes, 1);
        assert_eq!(stats.recent_since, clock.now() - TimeDelta::days(1));

        let everything = store.statistics(Duration::MAX).await.unwrap();
        assert_eq!(everything.recently_scraped, 2);
    }

    #[tokio::test]
    async fn test_stale_observation_ignored() {
        let (store, clock) = store();
        let now = clock.now();
        let current = fixtures::extracted(SourceName::Zoopla, "5", Some(100_000), now);
        let uid = current.uid.clone();
        store.record_outcome(current).await.unwrap();

        let older = fixtures::extracted(
            SourceName::Zoopla,
            "5",
            Some(90_000),
            now - TimeDelta::minutes(5),
        );
        let outcome = store.record_outcome(older).await.unwrap();

        assert!(outcome.stale);
        assert_eq!(outcome.record.last_scraped, now);
        assert_eq!(outcome.record.fields.price_normalized, Some(100_000));
        assert_eq!(outcome.record.scrape_count, 1);
        assert_eq!(store.price_history(&uid).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_first_seen_preserved() {
        let (store, clock) = store();
        let first_seen = clock.now();
        store
            .record_outcome(fixtures::extracted(SourceName::Rightmove, "8", None, first_seen))
            .await
            .unwrap();

        clock.advance(Duration::from_secs(7200));
        let outcome = store
            .record_outcome(fixtures::extracted(SourceName::Rightmove, "8", None, clock.now()))
            .await
            .unwrap();

        assert_eq!(outcome.record.first_seen, first_seen);
        assert_eq!(outcome.record.last_scraped, clock.now());
    }

    #[tokio::test]
    async fn test_mark_absent_only_counts_changes() {
        let (store, clock) = store();
        let listing = fixtures::extracted(SourceName::Rightmove, "4", None, clock.now());
        let uid = listing.uid.clone();
        store.record_outcome(listing).await.unwrap();

        let unknown = Uid::new(SourceName::Rightmove, "404");
        assert_eq!(store.mark_absent(&[uid.clone(), unknown.clone()]).await.unwrap(), 1);
        assert_eq!(store.mark_absent(&[uid.clone()]).await.unwrap(), 0);
        assert!(!store.get(&uid).await.unwrap().unwrap().is_active);

        // Reappearing reactivates
        clock.advance(Duration::from_secs(60));
        let outcome = store
            .record_outcome(fixtures::extracted(SourceName::Rightmove, "4", None, clock.now()))
            .await
            .unwrap();
        assert!(outcome.record.is_active);
    }

    #[tokio::test]
    async fn test_concurrent_updates_serialize_per_uid() {
        let (store, clock) = store();
        let store = Arc::new(store);
        let now = clock.now();

        let mut handles = Vec::new();
        for _ in 0..20 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .record_outcome(fixtures::extracted(SourceName::Zoopla, "1", Some(99_000), now))
                    .await
                    .unwrap()
            }));
        }
        let outcomes = futures::future::join_all(handles).await;

        let new_count = outcomes.iter().filter(|o| o.as_ref().unwrap().is_new).count();
        let uid = Uid::new(SourceName::Zoopla, "1");
        let record = store.get(&uid).await.unwrap().unwrap();

        assert_eq!(new_count, 1);
        assert_eq!(record.scrape_count, 20);
        assert_eq!(store.price_history(&uid).await.unwrap().len(), 1);
        assert!(store.locks.is_empty());
    }
}
