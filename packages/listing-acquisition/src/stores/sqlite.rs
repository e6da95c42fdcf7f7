//! SQLite repository.
//!
//! Listing fields are stored as a JSON document next to the columns the
//! store queries on. Timestamps are RFC 3339 text.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;

use crate::error::{StoreError, StoreResult};
use crate::traits::repository::ListingRepository;
use crate::types::listing::{
    FetchStrategy, ListingFields, ListingRecord, PriceHistoryEntry, SourceName, Uid,
};
use crate::types::statistics::{PriceStatistics, SourceStatistics, StoreStatistics};

const UPSERT_LISTING: &str = r#"
    INSERT INTO listings (
        uid, source, source_local_id, url, fields, price_normalized,
        extraction_method, extraction_confidence, first_seen, last_scraped,
        scrape_count, is_active
    )
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT(uid) DO UPDATE SET
        url = excluded.url,
        fields = excluded.fields,
        price_normalized = excluded.price_normalized,
        extraction_method = excluded.extraction_method,
        extraction_confidence = excluded.extraction_confidence,
        last_scraped = excluded.last_scraped,
        scrape_count = excluded.scrape_count,
        is_active = excluded.is_active
"#;

const INSERT_HISTORY: &str = r#"
    INSERT INTO price_history (uid, price_normalized, price_raw, change, recorded_at)
    VALUES (?, ?, ?, ?, ?)
"#;

type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

fn upsert_query(record: &ListingRecord) -> StoreResult<SqliteQuery<'_>> {
    let fields = serde_json::to_string(&record.fields).map_err(StoreError::storage)?;
    Ok(sqlx::query(UPSERT_LISTING)
        .bind(record.uid.as_str())
        .bind(record.source.as_str())
        .bind(&record.source_local_id)
        .bind(&record.url)
        .bind(fields)
        .bind(record.fields.price_normalized)
        .bind(record.extraction_method.as_str())
        .bind(record.extraction_confidence as f64)
        .bind(record.first_seen.to_rfc3339())
        .bind(record.last_scraped.to_rfc3339())
        .bind(i64::from(record.scrape_count))
        .bind(record.is_active))
}

fn history_query<'q>(uid: &'q Uid, entry: &'q PriceHistoryEntry) -> SqliteQuery<'q> {
    sqlx::query(INSERT_HISTORY)
        .bind(uid.as_str())
        .bind(entry.price_normalized)
        .bind(&entry.price_raw)
        .bind(entry.change)
        .bind(entry.recorded_at.to_rfc3339())
}

pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Connect and run migrations.
    ///
    /// # Example URLs
    /// - `sqlite::memory:` - In-memory database (ephemeral)
    /// - `sqlite://./listings.db?mode=rwc` - File, created if missing
    pub async fn new(database_url: &str) -> StoreResult<Self> {
        Self::connect(database_url, 5).await
    }

    /// In-memory database. A single connection, since each connection
    /// would otherwise see its own empty database.
    pub async fn in_memory() -> StoreResult<Self> {
        Self::connect("sqlite::memory:", 1).await
    }

    async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(StoreError::storage)?;

        let repo = Self { pool };
        repo.run_migrations().await?;
        Ok(repo)
    }

    async fn run_migrations(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS listings (
                uid TEXT PRIMARY KEY,
                source TEXT NOT NULL,
                source_local_id TEXT NOT NULL,
                url TEXT NOT NULL,
                fields TEXT NOT NULL DEFAULT '{}',
                price_normalized INTEGER,
                extraction_method TEXT NOT NULL,
                extraction_confidence REAL NOT NULL,
                first_seen TEXT NOT NULL,
                last_scraped TEXT NOT NULL,
                scrape_count INTEGER NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1
            );

            CREATE INDEX IF NOT EXISTS idx_listings_source_active ON listings(source, is_active);
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(StoreError::storage)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS price_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                uid TEXT NOT NULL,
                price_normalized INTEGER NOT NULL,
                price_raw TEXT,
                change INTEGER,
                recorded_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_price_history_uid ON price_history(uid);
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(StoreError::storage)?;

        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn parse_time(uid: &str, value: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt {
            uid: uid.to_string(),
            reason: format!("invalid date {}: {}", value, e),
        })
}

fn corrupt(uid: &str, reason: impl Into<String>) -> StoreError {
    StoreError::Corrupt {
        uid: uid.to_string(),
        reason: reason.into(),
    }
}

#[derive(Debug, FromRow)]
struct ListingRow {
    uid: String,
    source: String,
    source_local_id: String,
    url: String,
    fields: String,
    extraction_method: String,
    extraction_confidence: f64,
    first_seen: String,
    last_scraped: String,
    scrape_count: i64,
    is_active: bool,
}

impl ListingRow {
    fn into_record(self) -> StoreResult<ListingRecord> {
        let uid = Uid::parse(&self.uid).ok_or_else(|| corrupt(&self.uid, "malformed uid"))?;
        let source = SourceName::parse(&self.source)
            .ok_or_else(|| corrupt(&self.uid, format!("unknown source {}", self.source)))?;
        let extraction_method = FetchStrategy::parse(&self.extraction_method).ok_or_else(|| {
            corrupt(&self.uid, format!("unknown strategy {}", self.extraction_method))
        })?;
        let fields: ListingFields = serde_json::from_str(&self.fields)
            .map_err(|e| corrupt(&self.uid, format!("invalid fields JSON: {}", e)))?;

        Ok(ListingRecord {
            first_seen: parse_time(&self.uid, &self.first_seen)?,
            last_scraped: parse_time(&self.uid, &self.last_scraped)?,
            uid,
            source,
            source_local_id: self.source_local_id,
            url: self.url,
            fields,
            extraction_method,
            extraction_confidence: self.extraction_confidence as f32,
            scrape_count: u32::try_from(self.scrape_count).unwrap_or(u32::MAX),
            is_active: self.is_active,
        })
    }
}

#[derive(Debug, FromRow)]
struct PriceHistoryRow {
    uid: String,
    price_normalized: i64,
    price_raw: Option<String>,
    change: Option<i64>,
    recorded_at: String,
}

impl PriceHistoryRow {
    fn into_entry(self) -> StoreResult<PriceHistoryEntry> {
        let uid = Uid::parse(&self.uid).ok_or_else(|| corrupt(&self.uid, "malformed uid"))?;
        Ok(PriceHistoryEntry {
            recorded_at: parse_time(&self.uid, &self.recorded_at)?,
            uid,
            price_normalized: self.price_normalized,
            price_raw: self.price_raw,
            change: self.change,
        })
    }
}

#[async_trait]
impl ListingRepository for SqliteRepository {
    async fn get(&self, uid: &Uid) -> StoreResult<Option<ListingRecord>> {
        let row: Option<ListingRow> = sqlx::query_as(
            r#"
            SELECT uid, source, source_local_id, url, fields, extraction_method,
                   extraction_confidence, first_seen, last_scraped, scrape_count, is_active
            FROM listings WHERE uid = ?
            "#,
        )
        .bind(uid.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::storage)?;

        row.map(|r| r.into_record()).transpose()
    }

    async fn upsert(&self, record: &ListingRecord) -> StoreResult<()> {
        upsert_query(record)?
            .execute(&self.pool)
            .await
            .map_err(StoreError::storage)?;
        Ok(())
    }

    async fn append_price_history(&self, uid: &Uid, entry: &PriceHistoryEntry) -> StoreResult<()> {
        history_query(uid, entry)
            .execute(&self.pool)
            .await
            .map_err(StoreError::storage)?;
        Ok(())
    }

    async fn save(&self, record: &ListingRecord, entry: Option<&PriceHistoryEntry>) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(StoreError::storage)?;

        if let Some(entry) = entry {
            history_query(&record.uid, entry)
                .execute(&mut *tx)
                .await
                .map_err(StoreError::storage)?;
        }
        upsert_query(record)?
            .execute(&mut *tx)
            .await
            .map_err(StoreError::storage)?;

        tx.commit().await.map_err(StoreError::storage)?;
        Ok(())
    }

    async fn last_price(&self, uid: &Uid) -> StoreResult<Option<i64>> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT price_normalized FROM price_history WHERE uid = ? ORDER BY id DESC LIMIT 1",
        )
        .bind(uid.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::storage)?;

        Ok(row.map(|(price,)| price))
    }

    async fn price_history(&self, uid: &Uid) -> StoreResult<Vec<PriceHistoryEntry>> {
        let rows: Vec<PriceHistoryRow> = sqlx::query_as(
            r#"
            SELECT uid, price_normalized, price_raw, change, recorded_at
            FROM price_history WHERE uid = ?
            ORDER BY id
            "#,
        )
        .bind(uid.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::storage)?;

        rows.into_iter().map(|r| r.into_entry()).collect()
    }

    async fn active_uids(&self, source: SourceName) -> StoreResult<Vec<Uid>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT uid FROM listings WHERE source = ? AND is_active = 1 ORDER BY uid",
        )
        .bind(source.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::storage)?;

        rows.into_iter()
            .map(|(uid,)| Uid::parse(&uid).ok_or_else(|| corrupt(&uid, "malformed uid")))
            .collect()
    }

    async fn statistics(&self, recent_since: DateTime<Utc>) -> StoreResult<StoreStatistics> {
        let rows: Vec<(String, i64, i64, i64, Option<f64>)> = sqlx::query_as(
            r#"
            SELECT source, COUNT(*), COALESCE(SUM(is_active), 0),
                   COUNT(price_normalized), AVG(price_normalized)
            FROM listings
            GROUP BY source
            ORDER BY source
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::storage)?;

        let mut sources = Vec::with_capacity(rows.len());
        for (source, total, active, with_price, average) in rows {
            let source = SourceName::parse(&source)
                .ok_or_else(|| corrupt(&source, "unknown source in listings"))?;
            sources.push(SourceStatistics {
                source,
                total: total.max(0) as u64,
                active: active.max(0) as u64,
                with_price: with_price.max(0) as u64,
                average_price: average.map(|a| a.round() as i64),
            });
        }

        // julianday() accepts RFC 3339 with any number of fractional digits
        let (recently_scraped,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM listings WHERE julianday(last_scraped) >= julianday(?)",
        )
        .bind(recent_since.to_rfc3339())
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::storage)?;

        let (min, max, average): (Option<i64>, Option<i64>, Option<f64>) = sqlx::query_as(
            r#"
            SELECT MIN(price_normalized), MAX(price_normalized), AVG(price_normalized)
            FROM listings WHERE price_normalized IS NOT NULL
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::storage)?;

        let (price_changes,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM price_history WHERE change IS NOT NULL")
                .fetch_one(&self.pool)
                .await
                .map_err(StoreError::storage)?;

        let prices = match (min, max, average) {
            (Some(min), Some(max), Some(average)) => Some(PriceStatistics {
                min,
                max,
                average: average.round() as i64,
            }),
            _ => None,
        };

        Ok(StoreStatistics {
            sources,
            recently_scraped: recently_scraped.max(0) as u64,
            recent_since,
            prices,
            price_changes: price_changes.max(0) as u64,
        })
    }
}
