//! Configuration types for fetching, retrying and batching.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::types::listing::{FetchStrategy, SourceName};

/// Per-host politeness settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostConfig {
    /// Maximum simultaneous in-flight requests to the host.
    pub max_concurrency: usize,

    /// Minimum spacing between successive request starts.
    #[serde(with = "duration_millis")]
    pub min_request_interval: Duration,

    /// Upper bound on a single fetch.
    #[serde(with = "duration_millis")]
    pub timeout: Duration,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 5,
            min_request_interval: Duration::from_millis(500),
            timeout: Duration::from_secs(30),
        }
    }
}

impl HostConfig {
    pub fn new(max_concurrency: usize, min_request_interval: Duration, timeout: Duration) -> Self {
        Self {
            max_concurrency,
            min_request_interval,
            timeout,
        }
    }

    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max;
        self
    }

    pub fn with_min_request_interval(mut self, interval: Duration) -> Self {
        self.min_request_interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Exponential backoff budget for one strategy.
///
/// `max_attempts` counts every attempt including the first, so a policy of
/// 3 means one try plus two retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    #[serde(with = "duration_millis")]
    pub base_delay: Duration,
    pub multiplier: f64,
    #[serde(with = "duration_millis")]
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, multiplier: f64) -> Self {
        Self {
            max_attempts,
            base_delay,
            multiplier,
            ..Self::default()
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let factor = self.multiplier.max(1.0).powi(exponent);
        let nanos = (self.base_delay.as_nanos() as f64 * factor).round();
        if !nanos.is_finite() || nanos >= self.max_delay.as_nanos() as f64 {
            return self.max_delay;
        }
        Duration::from_nanos(nanos as u64)
    }

    /// Whether another attempt is allowed after `attempts_made`.
    pub fn allows_another(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }
}

/// Primary fetch strategy per source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcePolicy {
    primary: HashMap<SourceName, FetchStrategy>,
}

impl Default for SourcePolicy {
    /// Rightmove tolerates direct retrieval; Zoopla blocks it.
    fn default() -> Self {
        Self::new()
            .with_primary(SourceName::Rightmove, FetchStrategy::Direct)
            .with_primary(SourceName::Zoopla, FetchStrategy::ManagedCrawl)
    }
}

impl SourcePolicy {
    pub fn new() -> Self {
        Self {
            primary: HashMap::new(),
        }
    }

    pub fn with_primary(mut self, source: SourceName, strategy: FetchStrategy) -> Self {
        self.primary.insert(source, strategy);
        self
    }

    /// Primary strategy for a source; `Direct` when unconfigured.
    pub fn primary(&self, source: SourceName) -> FetchStrategy {
        self.primary
            .get(&source)
            .copied()
            .unwrap_or(FetchStrategy::Direct)
    }

    /// Primary followed by its alternate.
    pub fn chain(&self, source: SourceName) -> [FetchStrategy; 2] {
        let primary = self.primary(source);
        [primary, primary.alternate()]
    }
}

/// Settings for one orchestrator instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Minimum age before a known listing is fetched again. No default.
    #[serde(with = "duration_millis")]
    pub freshness_window: Duration,

    pub retry: RetryPolicy,

    pub sources: SourcePolicy,

    /// Fallback settings for hosts without an explicit entry.
    pub default_host: HostConfig,

    #[serde(default)]
    pub hosts: HashMap<String, HostConfig>,

    /// Optional wall-clock budget for a whole batch.
    #[serde(default, with = "option_duration_millis")]
    pub batch_deadline: Option<Duration>,
}

impl AcquisitionConfig {
    /// Create a config. The freshness window must always be supplied.
    pub fn new(freshness_window: Duration) -> Self {
        Self {
            freshness_window,
            retry: RetryPolicy::default(),
            sources: SourcePolicy::default(),
            default_host: HostConfig::default(),
            hosts: HashMap::new(),
            batch_deadline: None,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_sources(mut self, sources: SourcePolicy) -> Self {
        self.sources = sources;
        self
    }

    pub fn with_default_host(mut self, host: HostConfig) -> Self {
        self.default_host = host;
        self
    }

    pub fn with_host(mut self, host: impl Into<String>, config: HostConfig) -> Self {
        self.hosts.insert(host.into().to_ascii_lowercase(), config);
        self
    }

    pub fn with_batch_deadline(mut self, deadline: Duration) -> Self {
        self.batch_deadline = Some(deadline);
        self
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

mod option_duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_some(&(d.as_millis() as u64)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100), 2.0)
            .with_max_delay(Duration::from_millis(350));

        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(policy.delay_after(3), Duration::from_millis(350));
        assert_eq!(policy.delay_after(30), Duration::from_millis(350));
    }

    #[test]
    fn test_attempt_budget() {
        let policy = RetryPolicy::new(2, Duration::ZERO, 2.0);
        assert!(policy.allows_another(0));
        assert!(policy.allows_another(1));
        assert!(!policy.allows_another(2));
    }

    #[test]
    fn test_default_source_policy() {
        let policy = SourcePolicy::default();
        assert_eq!(
            policy.chain(SourceName::Rightmove),
            [FetchStrategy::Direct, FetchStrategy::ManagedCrawl]
        );
        assert_eq!(
            policy.chain(SourceName::Zoopla),
            [FetchStrategy::ManagedCrawl, FetchStrategy::Direct]
        );
    }

    #[test]
    fn test_config_deserializes_durations_as_millis() {
        let config: AcquisitionConfig = serde_json::from_str(
            r#"{
                "freshness_window": 86400000,
                "retry": {"max_attempts": 2, "base_delay": 10, "multiplier": 3.0, "max_delay": 1000},
                "sources": {"primary": {"zoopla": "managed_crawl"}},
                "default_host": {"max_concurrency": 2, "min_request_interval": 250, "timeout": 5000}
            }"#,
        )
        .unwrap();

        assert_eq!(config.freshness_window, Duration::from_secs(86_400));
        assert_eq!(config.retry.delay_after(2), Duration::from_millis(30));
        assert_eq!(config.default_host.max_concurrency, 2);
        assert!(config.batch_deadline.is_none());
        assert_eq!(config.sources.primary(SourceName::Rightmove), FetchStrategy::Direct);
    }
}
