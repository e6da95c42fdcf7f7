//! Batch outcome reporting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::job::AcquisitionJob;
use crate::types::listing::{FetchStrategy, ListingRecord, Uid};

/// Why a job ended without a stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Every strategy ended on an anti-automation block.
    Blocked,
    Timeout,
    Network,
    /// Content was empty, unparseable or missing all required fields.
    Malformed,
    /// Extracted record broke a business rule.
    Invalid,
    /// The candidate URL carried no listing id.
    InvalidCandidate,
    Persistence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobFailure {
    pub uid: Option<Uid>,
    pub url: String,
    pub kind: FailureKind,
    pub detail: String,
}

/// Per-strategy request counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyUsage {
    pub direct_attempts: usize,
    pub managed_crawl_attempts: usize,
    /// Jobs that succeeded only after switching strategy.
    pub fallbacks: usize,
}

impl StrategyUsage {
    pub fn record(&mut self, strategy: FetchStrategy) {
        match strategy {
            FetchStrategy::Direct => self.direct_attempts += 1,
            FetchStrategy::ManagedCrawl => self.managed_crawl_attempts += 1,
        }
    }
}

/// Summary of one acquisition run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedBatchReport {
    pub new_count: usize,
    pub updated_count: usize,
    pub skipped_count: usize,
    pub failed_count: usize,
    pub cancelled_count: usize,
    /// Set when a persistence failure lost at least one otherwise good job.
    pub partial: bool,
    pub errors: Vec<JobFailure>,
    pub cancelled: Vec<String>,
    pub usage: StrategyUsage,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ProcessedBatchReport {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            new_count: 0,
            updated_count: 0,
            skipped_count: 0,
            failed_count: 0,
            cancelled_count: 0,
            partial: false,
            errors: Vec::new(),
            cancelled: Vec::new(),
            usage: StrategyUsage::default(),
            started_at,
            finished_at: None,
        }
    }

    pub fn record_failure(&mut self, failure: JobFailure) {
        if failure.kind == FailureKind::Persistence {
            self.partial = true;
        }
        self.failed_count += 1;
        self.errors.push(failure);
    }

    pub fn record_cancelled(&mut self, url: impl Into<String>) {
        self.cancelled_count += 1;
        self.cancelled.push(url.into());
    }

    /// Number of failures of one kind.
    pub fn failures_of(&self, kind: FailureKind) -> usize {
        self.errors.iter().filter(|e| e.kind == kind).count()
    }

    pub fn total(&self) -> usize {
        self.new_count + self.updated_count + self.skipped_count + self.failed_count + self.cancelled_count
    }

    pub fn finish(&mut self, at: DateTime<Utc>) {
        self.finished_at = Some(at);
    }
}

/// Everything a batch hands to downstream consumers.
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutput {
    pub report: ProcessedBatchReport,
    /// Records created or updated in this batch.
    pub records: Vec<ListingRecord>,
    /// Final state and attempt trace of every job that entered fetching.
    pub jobs: Vec<AcquisitionJob>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persistence_failure_marks_partial() {
        let mut report = ProcessedBatchReport::new(Utc::now());
        report.record_failure(JobFailure {
            uid: None,
            url: "https://x.test/1".into(),
            kind: FailureKind::Malformed,
            detail: "empty".into(),
        });
        assert!(!report.partial);

        report.record_failure(JobFailure {
            uid: None,
            url: "https://x.test/2".into(),
            kind: FailureKind::Persistence,
            detail: "disk full".into(),
        });
        assert!(report.partial);
        assert_eq!(report.failed_count, 2);
        assert_eq!(report.failures_of(FailureKind::Malformed), 1);
    }

    #[test]
    fn test_cancelled_kept_apart_from_failed() {
        let mut report = ProcessedBatchReport::new(Utc::now());
        report.record_cancelled("https://x.test/3");

        assert_eq!(report.cancelled_count, 1);
        assert_eq!(report.failed_count, 0);
        assert_eq!(report.total(), 1);
    }
}
