//! Per-host politeness gates.
//!
//! Each host gets a counting limiter for simultaneous requests plus a
//! governor quota that spaces request starts by the host's minimum
//! interval. Gates apply to every strategy, so a direct fetch and a
//! managed crawl of the same portal share one budget.

use dashmap::DashMap;
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use crate::error::{FetchError, FetchResult};
use crate::traits::fetcher::Fetcher;
use crate::types::config::HostConfig;
use crate::types::content::RawContent;

type DefaultRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Concurrency and spacing limits for one host.
pub struct HostGate {
    host: String,
    config: HostConfig,
    permits: Arc<Semaphore>,
    limiter: Option<DefaultRateLimiter>,
}

impl HostGate {
    pub fn new(host: impl Into<String>, config: HostConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrency.max(1)));
        let limiter = Quota::with_period(config.min_request_interval)
            .map(|quota| RateLimiter::direct(quota.allow_burst(nonzero!(1u32))));

        Self {
            host: host.into(),
            config,
            permits,
            limiter,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Wait for a concurrency slot, then for the next allowed start time.
    ///
    /// The returned permit must be held for the duration of the request.
    pub async fn acquire(&self) -> Option<OwnedSemaphorePermit> {
        let permit = Arc::clone(&self.permits).acquire_owned().await.ok()?;
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
        Some(permit)
    }

    /// Run one fetch through the gate, bounded by the host timeout.
    pub async fn fetch(&self, fetcher: &dyn Fetcher, url: &str) -> FetchResult<RawContent> {
        let _permit = self
            .acquire()
            .await
            .ok_or_else(|| FetchError::network(url, "host gate closed"))?;

        debug!(host = %self.host, url = %url, strategy = %fetcher.strategy(), "Gate open");

        match tokio::time::timeout(self.config.timeout, fetcher.fetch(url)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout {
                url: url.to_string(),
            }),
        }
    }
}

/// Registry of gates keyed by lowercased host.
///
/// Owned by one orchestrator; two hosts never share a gate.
pub struct HostGates {
    default_config: HostConfig,
    overrides: HashMap<String, HostConfig>,
    gates: DashMap<String, Arc<HostGate>>,
}

impl HostGates {
    pub fn new(default_config: HostConfig) -> Self {
        Self {
            default_config,
            overrides: HashMap::new(),
            gates: DashMap::new(),
        }
    }

    pub fn with_overrides(mut self, overrides: HashMap<String, HostConfig>) -> Self {
        self.overrides = overrides
            .into_iter()
            .map(|(host, config)| (host.to_ascii_lowercase(), config))
            .collect();
        self
    }

    /// Config used for a host.
    pub fn config_for(&self, host: &str) -> &HostConfig {
        self.overrides.get(host).unwrap_or(&self.default_config)
    }

    /// Gate for the host of a URL, created on first use.
    pub fn gate_for_url(&self, url: &str) -> Arc<HostGate> {
        self.gate(&host_of(url))
    }

    pub fn gate(&self, host: &str) -> Arc<HostGate> {
        let host = host.to_ascii_lowercase();
        if let Some(gate) = self.gates.get(&host) {
            return Arc::clone(gate.value());
        }
        let config = self.config_for(&host).clone();
        let gate = self
            .gates
            .entry(host.clone())
            .or_insert_with(|| Arc::new(HostGate::new(host, config)));
        Arc::clone(gate.value())
    }

    /// Number of hosts seen so far.
    pub fn len(&self) -> usize {
        self.gates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }
}

/// Lowercased host of a URL, or an empty string if it has none.
pub fn host_of(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockFetcher;
    use crate::types::listing::FetchStrategy;
    use std::time::{Duration, Instant};

    #[tokio::test]
    async fn test_concurrency_bound() {
        let mock = MockFetcher::new(FetchStrategy::Direct)
            .with_delay(Duration::from_millis(40));
        let gate = Arc::new(HostGate::new(
            "www.rightmove.co.uk",
            HostConfig::new(2, Duration::ZERO, Duration::from_secs(5)),
        ));

        let mut handles = Vec::new();
        for i in 0..6 {
            let gate = Arc::clone(&gate);
            let mock = mock.clone();
            handles.push(tokio::spawn(async move {
                let url = format!("https://www.rightmove.co.uk/properties/{i}");
                gate.fetch(&mock, &url).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(mock.call_count(), 6);
        assert!(mock.max_in_flight() <= 2, "in flight: {}", mock.max_in_flight());
    }

    #[tokio::test]
    async fn test_min_interval_spaces_starts() {
        let mock = MockFetcher::new(FetchStrategy::Direct);
        let gate = HostGate::new(
            "www.zoopla.co.uk",
            HostConfig::new(5, Duration::from_millis(100), Duration::from_secs(5)),
        );

        let start = Instant::now();
        for i in 0..3 {
            let url = format!("https://www.zoopla.co.uk/to-rent/details/{i}");
            gate.fetch(&mock, &url).await.unwrap();
        }

        // First start is immediate, the next two wait one interval each
        assert!(start.elapsed() >= Duration::from_millis(190), "{:?}", start.elapsed());
    }

    #[tokio::test]
    async fn test_timeout_surfaces_as_fetch_timeout() {
        let mock = MockFetcher::new(FetchStrategy::ManagedCrawl)
            .with_delay(Duration::from_millis(200));
        let gate = HostGate::new(
            "www.zoopla.co.uk",
            HostConfig::new(1, Duration::ZERO, Duration::from_millis(20)),
        );

        let err = gate
            .fetch(&mock, "https://www.zoopla.co.uk/to-rent/details/9")
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Timeout { .. }));
    }

    #[test]
    fn test_registry_keys_by_host() {
        let mut overrides = HashMap::new();
        overrides.insert(
            "WWW.ZOOPLA.CO.UK".to_string(),
            HostConfig::default().with_max_concurrency(1),
        );
        let gates = HostGates::new(HostConfig::default()).with_overrides(overrides);

        let a = gates.gate_for_url("https://www.zoopla.co.uk/to-rent/details/1");
        let b = gates.gate_for_url("https://WWW.zoopla.co.uk/to-rent/details/2");
        let c = gates.gate_for_url("https://www.rightmove.co.uk/properties/3");

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(a.config().max_concurrency, 1);
        assert_eq!(c.config().max_concurrency, 5);
        assert_eq!(gates.len(), 2);
    }
}
