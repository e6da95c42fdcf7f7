//! Testing utilities including mock implementations.
//!
//! These let applications exercise the engine without network access or
//! real time passing.

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::clock::Clock;
use crate::error::{FetchError, FetchResult};
use crate::traits::fetcher::Fetcher;
use crate::types::content::RawContent;
use crate::types::listing::FetchStrategy;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// What a mock fetch returns.
#[derive(Debug, Clone, PartialEq)]
pub enum MockResponse {
    /// A listing page at this monthly rent (whole pounds).
    Listing { price_pcm: u32 },
    Html(String),
    Markdown(String),
    Blocked,
    Timeout,
    Network,
}

impl MockResponse {
    fn render(&self, url: &str, strategy: FetchStrategy) -> FetchResult<RawContent> {
        match self {
            MockResponse::Listing { price_pcm } => Ok(RawContent::html(
                url,
                fixtures::listing_html(*price_pcm),
                strategy,
            )
            .with_status(200)),
            MockResponse::Html(body) => Ok(RawContent::html(url, body.clone(), strategy)),
            MockResponse::Markdown(body) => Ok(RawContent::markdown(url, body.clone(), strategy)),
            MockResponse::Blocked => Err(FetchError::Blocked {
                url: url.to_string(),
                reason: "HTTP 403".into(),
            }),
            MockResponse::Timeout => Err(FetchError::Timeout {
                url: url.to_string(),
            }),
            MockResponse::Network => Err(FetchError::network(url, "connection reset")),
        }
    }
}

/// A scripted fetcher.
///
/// Each URL can carry a queue of responses consumed one per call; once the
/// queue is empty the default response is used. Clones share state, so a
/// clone handed to the engine still reports calls to the test.
#[derive(Clone)]
pub struct MockFetcher {
    strategy: FetchStrategy,
    delay: Duration,
    default: MockResponse,
    scripted: Arc<Mutex<HashMap<String, VecDeque<MockResponse>>>>,
    calls: Arc<Mutex<Vec<String>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl MockFetcher {
    /// Create a mock that serves a valid listing page for every URL.
    pub fn new(strategy: FetchStrategy) -> Self {
        Self {
            strategy,
            delay: Duration::ZERO,
            default: MockResponse::Listing { price_pcm: 1500 },
            scripted: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Hold every call for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Response for URLs without a script.
    pub fn with_default(mut self, response: MockResponse) -> Self {
        self.default = response;
        self
    }

    /// Queue responses for a URL, consumed in order.
    pub fn with_outcome(
        self,
        url: impl Into<String>,
        responses: impl IntoIterator<Item = MockResponse>,
    ) -> Self {
        lock(&self.scripted)
            .entry(url.into())
            .or_default()
            .extend(responses);
        self
    }

    /// URLs requested, in call order.
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Calls made for one URL.
    pub fn calls_for(&self, url: &str) -> usize {
        lock(&self.calls).iter().filter(|u| *u == url).count()
    }

    /// Highest number of concurrent calls observed.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_response(&self, url: &str) -> MockResponse {
        lock(&self.scripted)
            .get_mut(url)
            .and_then(|queue| queue.pop_front())
            .unwrap_or_else(|| self.default.clone())
    }
}

/// Decrements the in-flight count even when the call is cancelled.
struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> FetchResult<RawContent> {
        lock(&self.calls).push(url.to_string());
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        let _in_flight = InFlight(Arc::clone(&self.in_flight));

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.next_response(url).render(url, self.strategy)
    }

    fn strategy(&self) -> FetchStrategy {
        self.strategy
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(at) }
    }

    pub fn advance(&self, by: Duration) {
        let by = TimeDelta::from_std(by).unwrap_or(TimeDelta::MAX);
        let mut now = lock(&self.now);
        *now = now.checked_add_signed(by).unwrap_or(*now);
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *lock(&self.now) = at;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *lock(&self.now)
    }
}

/// Canned listings and pages.
pub mod fixtures {
    use chrono::{DateTime, Utc};

    use crate::types::listing::{
        ExtractedListing, FetchStrategy, ListingFields, ListingRecord, PropertyType, SourceName,
        Uid,
    };

    /// 2024-01-01T00:00:00Z
    pub fn epoch() -> DateTime<Utc> {
        DateTime::from_timestamp(1_704_067_200, 0).unwrap_or_default()
    }

    /// Detail page URL for a listing id.
    pub fn listing_url(source: SourceName, id: &str) -> String {
        match source {
            SourceName::Rightmove => format!("https://www.rightmove.co.uk/properties/{id}"),
            SourceName::Zoopla => format!("https://www.zoopla.co.uk/to-rent/details/{id}/"),
        }
    }

    /// A detail page either portal's extractor recovers fully.
    pub fn listing_html(price_pcm: u32) -> String {
        format!(
            "<html><head><title>2 bedroom flat for rent in Test Street, AB1 2CD</title></head>\
             <body><h1>2 bedroom flat for rent in Test Street, AB1 2CD</h1>\
             <p>£{price_pcm} pcm</p><p>1 bathroom. Furnished.</p></body></html>"
        )
    }

    pub fn extracted(
        source: SourceName,
        id: &str,
        price_pence: Option<i64>,
        observed_at: DateTime<Utc>,
    ) -> ExtractedListing {
        ExtractedListing {
            uid: Uid::new(source, id),
            source,
            source_local_id: id.to_string(),
            url: listing_url(source, id),
            fields: ListingFields {
                title: Some("2 bedroom flat for rent in Test Street, AB1 2CD".into()),
                address: Some("Test Street, AB1 2CD".into()),
                postcode: Some("AB1 2CD".into()),
                price_raw: price_pence.map(|p| format!("£{} pcm", p / 100)),
                price_normalized: price_pence,
                bedrooms: Some(2),
                property_type: Some(PropertyType::Flat),
                ..Default::default()
            },
            extraction_method: FetchStrategy::Direct,
            extraction_confidence: 1.0,
            observed_at,
        }
    }

    /// A stored record first seen at `epoch()`.
    pub fn record(source: SourceName, id: &str, price_pence: Option<i64>) -> ListingRecord {
        ListingRecord::from_extracted(extracted(source, id, price_pence, epoch()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_then_default() {
        let url = "https://www.zoopla.co.uk/to-rent/details/1/";
        let mock = MockFetcher::new(FetchStrategy::Direct)
            .with_outcome(url, [MockResponse::Blocked, MockResponse::Timeout]);

        assert!(mock.fetch(url).await.unwrap_err().is_blocked());
        assert!(matches!(mock.fetch(url).await, Err(FetchError::Timeout { .. })));
        assert!(mock.fetch(url).await.unwrap().has_content());
        assert_eq!(mock.calls_for(url), 3);
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(fixtures::epoch());
        clock.advance(Duration::from_secs(90));
        assert_eq!(clock.now(), fixtures::epoch() + TimeDelta::seconds(90));
        clock.set(fixtures::epoch());
        assert_eq!(clock.now(), fixtures::epoch());
    }
}
