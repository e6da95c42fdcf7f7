//! Environment-driven configuration for the `acquire` binary.

use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{AcquisitionError, Result};
use crate::types::config::{AcquisitionConfig, HostConfig};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub freshness_window: Duration,
    pub firecrawl_api_key: String,
    /// JSON array of `{ "url", "source" }` candidates
    pub discovery_feed: PathBuf,
    pub database_url: Option<String>,
    pub max_concurrency_per_host: Option<usize>,
    pub min_request_interval: Option<Duration>,
    pub request_timeout: Option<Duration>,
    pub batch_deadline: Option<Duration>,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |name: &str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| AcquisitionError::Config(format!("{} must be set", name)))
        };

        let hours: u64 = parse(
            "FRESHNESS_WINDOW_HOURS",
            &required("FRESHNESS_WINDOW_HOURS")?,
        )?;

        Ok(Self {
            freshness_window: Duration::from_secs(hours.saturating_mul(3600)),
            firecrawl_api_key: required("FIRECRAWL_API_KEY")?,
            discovery_feed: PathBuf::from(required("DISCOVERY_FEED")?),
            database_url: lookup("DATABASE_URL").filter(|v| !v.is_empty()),
            max_concurrency_per_host: optional(&lookup, "MAX_CONCURRENCY_PER_HOST")?,
            min_request_interval: optional(&lookup, "MIN_REQUEST_INTERVAL_MS")?
                .map(Duration::from_millis),
            request_timeout: optional(&lookup, "REQUEST_TIMEOUT_SECS")?.map(Duration::from_secs),
            batch_deadline: optional(&lookup, "BATCH_DEADLINE_SECS")?.map(Duration::from_secs),
        })
    }

    /// Engine configuration with the host overrides applied.
    pub fn to_acquisition_config(&self) -> AcquisitionConfig {
        let mut host = HostConfig::default();
        if let Some(max) = self.max_concurrency_per_host {
            host = host.with_max_concurrency(max);
        }
        if let Some(interval) = self.min_request_interval {
            host = host.with_min_request_interval(interval);
        }
        if let Some(timeout) = self.request_timeout {
            host = host.with_timeout(timeout);
        }

        let config = AcquisitionConfig::new(self.freshness_window).with_default_host(host);
        match self.batch_deadline {
            Some(deadline) => config.with_batch_deadline(deadline),
            None => config,
        }
    }
}

fn parse<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| AcquisitionError::Config(format!("{} must be a valid number", name)))
}

fn optional<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>> {
    lookup(name)
        .filter(|v| !v.trim().is_empty())
        .map(|v| parse(name, &v))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("FRESHNESS_WINDOW_HOURS", "24"),
        ("FIRECRAWL_API_KEY", "fc-test"),
        ("DISCOVERY_FEED", "feed.json"),
    ];

    #[test]
    fn test_required_values() {
        let config = AppConfig::from_lookup(lookup(&REQUIRED)).unwrap();
        assert_eq!(config.freshness_window, Duration::from_secs(86_400));
        assert!(config.database_url.is_none());

        let acquisition = config.to_acquisition_config();
        assert_eq!(acquisition.freshness_window, Duration::from_secs(86_400));
        assert_eq!(acquisition.default_host, HostConfig::default());
        assert!(acquisition.batch_deadline.is_none());
    }

    #[test]
    fn test_missing_window_is_an_error() {
        let err = AppConfig::from_lookup(lookup(&REQUIRED[1..])).unwrap_err();
        assert!(err.to_string().contains("FRESHNESS_WINDOW_HOURS"));
    }

    #[test]
    fn test_host_overrides() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("MAX_CONCURRENCY_PER_HOST", "2"),
            ("MIN_REQUEST_INTERVAL_MS", "750"),
            ("BATCH_DEADLINE_SECS", "600"),
        ]);
        let acquisition = AppConfig::from_lookup(lookup(&pairs))
            .unwrap()
            .to_acquisition_config();

        assert_eq!(acquisition.default_host.max_concurrency, 2);
        assert_eq!(
            acquisition.default_host.min_request_interval,
            Duration::from_millis(750)
        );
        assert_eq!(acquisition.batch_deadline, Some(Duration::from_secs(600)));
    }

    #[test]
    fn test_bad_number() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("REQUEST_TIMEOUT_SECS", "soon"));
        assert!(AppConfig::from_lookup(lookup(&pairs)).is_err());
    }
}
