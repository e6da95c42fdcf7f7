//! In-memory repository for testing and development.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{StoreError, StoreResult};
use crate::traits::repository::ListingRepository;
use crate::types::listing::{ListingRecord, PriceHistoryEntry, SourceName, Uid};
use crate::types::statistics::{
    rounded_average, PriceStatistics, SourceStatistics, StoreStatistics,
};

/// In-memory listing storage.
///
/// Useful for testing and single-run batches. Data is lost on restart.
#[derive(Default)]
pub struct MemoryRepository {
    listings: RwLock<HashMap<Uid, ListingRecord>>,
    history: RwLock<HashMap<Uid, Vec<PriceHistoryEntry>>>,
}

fn read<T>(lock: &RwLock<T>) -> StoreResult<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|_| StoreError::storage("memory repository lock poisoned"))
}

fn write<T>(lock: &RwLock<T>) -> StoreResult<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|_| StoreError::storage("memory repository lock poisoned"))
}

impl MemoryRepository {
    /// Create a new empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with existing records (for tests and warm starts).
    pub fn with_records(records: impl IntoIterator<Item = ListingRecord>) -> Self {
        let listings = records.into_iter().map(|r| (r.uid.clone(), r)).collect();
        Self {
            listings: RwLock::new(listings),
            history: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored listings.
    pub fn len(&self) -> usize {
        self.listings.read().map(|l| l.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every stored listing.
    pub fn records(&self) -> StoreResult<Vec<ListingRecord>> {
        Ok(read(&self.listings)?.values().cloned().collect())
    }
}

#[async_trait]
impl ListingRepository for MemoryRepository {
    async fn get(&self, uid: &Uid) -> StoreResult<Option<ListingRecord>> {
        Ok(read(&self.listings)?.get(uid).cloned())
    }

    async fn upsert(&self, record: &ListingRecord) -> StoreResult<()> {
        write(&self.listings)?.insert(record.uid.clone(), record.clone());
        Ok(())
    }

    async fn append_price_history(&self, uid: &Uid, entry: &PriceHistoryEntry) -> StoreResult<()> {
        write(&self.history)?
            .entry(uid.clone())
            .or_default()
            .push(entry.clone());
        Ok(())
    }

    async fn price_history(&self, uid: &Uid) -> StoreResult<Vec<PriceHistoryEntry>> {
        Ok(read(&self.history)?.get(uid).cloned().unwrap_or_default())
    }

    async fn active_uids(&self, source: SourceName) -> StoreResult<Vec<Uid>> {
        let mut uids: Vec<Uid> = read(&self.listings)?
            .values()
            .filter(|r| r.source == source && r.is_active)
            .map(|r| r.uid.clone())
            .collect();
        uids.sort();
        Ok(uids)
    }

    async fn statistics(&self, recent_since: DateTime<Utc>) -> StoreResult<StoreStatistics> {
        let listings = read(&self.listings)?;

        let mut by_source: BTreeMap<SourceName, (SourceStatistics, i128)> = BTreeMap::new();
        let mut recently_scraped = 0;
        let mut price_range: Option<(i64, i64)> = None;
        let mut price_sum: i128 = 0;
        let mut priced = 0u64;

        for record in listings.values() {
            let (stats, sum) = by_source.entry(record.source).or_insert_with(|| {
                (
                    SourceStatistics {
                        source: record.source,
                        total: 0,
                        active: 0,
                        with_price: 0,
                        average_price: None,
                    },
                    0,
                )
            });
            stats.total += 1;
            if record.is_active {
                stats.active += 1;
            }
            if let Some(price) = record.fields.price_normalized {
                stats.with_price += 1;
                *sum += i128::from(price);
                price_sum += i128::from(price);
                priced += 1;
                price_range = Some(match price_range {
                    Some((min, max)) => (min.min(price), max.max(price)),
                    None => (price, price),
                });
            }
            if record.last_scraped >= recent_since {
                recently_scraped += 1;
            }
        }

        let sources = by_source
            .into_values()
            .map(|(mut stats, sum)| {
                stats.average_price = rounded_average(sum, stats.with_price);
                stats
            })
            .collect();

        let prices = price_range.zip(rounded_average(price_sum, priced)).map(
            |((min, max), average)| PriceStatistics { min, max, average },
        );

        let price_changes = read(&self.history)?
            .values()
            .flatten()
            .filter(|entry| entry.change.is_some())
            .count() as u64;

        Ok(StoreStatistics {
            sources,
            recently_scraped,
            recent_since,
            prices,
            price_changes,
        })
    }

    async fn save(&self, record: &ListingRecord, entry: Option<&PriceHistoryEntry>) -> StoreResult<()> {
        let mut listings = write(&self.listings)?;
        let mut history = write(&self.history)?;
        if let Some(entry) = entry {
            history
                .entry(record.uid.clone())
                .or_default()
                .push(entry.clone());
        }
        listings.insert(record.uid.clone(), record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[tokio::test]
    async fn test_upsert_and_get() {
        let repo = MemoryRepository::new();
        let record = fixtures::record(SourceName::Rightmove, "1", Some(120_000));

        repo.upsert(&record).await.unwrap();

        let stored = repo.get(&record.uid).await.unwrap().unwrap();
        assert_eq!(stored, record);
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn test_active_uids_filters_source_and_state() {
        let mut inactive = fixtures::record(SourceName::Rightmove, "2", None);
        inactive.is_active = false;
        let repo = MemoryRepository::with_records([
            fixtures::record(SourceName::Rightmove, "1", None),
            inactive,
            fixtures::record(SourceName::Zoopla, "3", None),
        ]);

        let uids = repo.active_uids(SourceName::Rightmove).await.unwrap();
        assert_eq!(uids, vec![Uid::new(SourceName::Rightmove, "1")]);
    }

    #[tokio::test]
    async fn test_history_appends_in_order() {
        let repo = MemoryRepository::new();
        let uid = Uid::new(SourceName::Zoopla, "9");

        for (i, price) in [100_000, 95_000].into_iter().enumerate() {
            let entry = PriceHistoryEntry {
                uid: uid.clone(),
                price_normalized: price,
                price_raw: None,
                change: None,
                recorded_at: fixtures::epoch() + chrono::Duration::days(i as i64),
            };
            repo.append_price_history(&uid, &entry).await.unwrap();
        }

        let history = repo.price_history(&uid).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].price_normalized, 95_000);
        assert_eq!(repo.last_price(&uid).await.unwrap(), Some(95_000));
    }

    #[tokio::test]
    async fn test_statistics() {
        let mut stale = fixtures::record(SourceName::Rightmove, "2", Some(200_000));
        stale.is_active = false;
        stale.last_scraped = fixtures::epoch() - chrono::Duration::days(3);
        let repo = MemoryRepository::with_records([
            fixtures::record(SourceName::Rightmove, "1", Some(100_000)),
            stale,
            fixtures::record(SourceName::Zoopla, "3", None),
        ]);
        let uid = Uid::new(SourceName::Rightmove, "1");
        let entry = PriceHistoryEntry {
            uid: uid.clone(),
            price_normalized: 100_000,
            price_raw: None,
            change: Some(-5_000),
            recorded_at: fixtures::epoch(),
        };
        repo.append_price_history(&uid, &entry).await.unwrap();

        let stats = repo
            .statistics(fixtures::epoch() - chrono::Duration::days(1))
            .await
            .unwrap();

        assert_eq!(stats.total(), 3);
        assert_eq!(stats.active(), 2);
        assert_eq!(stats.recently_scraped, 2);
        assert_eq!(stats.price_changes, 1);
        assert_eq!(
            stats.prices,
            Some(PriceStatistics {
                min: 100_000,
                max: 200_000,
                average: 150_000
            })
        );

        let rightmove = stats.source(SourceName::Rightmove).unwrap();
        assert_eq!(rightmove.with_price, 2);
        assert_eq!(rightmove.average_price, Some(150_000));
        let zoopla = stats.source(SourceName::Zoopla).unwrap();
        assert_eq!(zoopla.with_price, 0);
        assert_eq!(zoopla.average_price, None);
        assert_eq!(stats.sources[0].source, SourceName::Rightmove);
    }
}
