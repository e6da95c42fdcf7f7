//! Discovery candidates and per-job state.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::listing::{FetchStrategy, SourceName, Uid};

/// One entry of the discovery feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub url: String,
    pub source: SourceName,
}

impl Candidate {
    pub fn new(url: impl Into<String>, source: SourceName) -> Self {
        Self {
            url: url.into(),
            source,
        }
    }
}

/// Position of a job in the acquisition state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Fetching,
    Extracting,
    /// Fields extracted, not yet validated.
    Extracted,
    Validating,
    /// Passed validation, waiting on the store.
    Validated,
    Done,
    FetchFailed,
    ExtractFailed,
    ValidationFailed,
    PersistenceFailed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Done
                | JobState::FetchFailed
                | JobState::ExtractFailed
                | JobState::ValidationFailed
                | JobState::PersistenceFailed
                | JobState::Cancelled
        )
    }
}

/// Result of one fetch attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "detail")]
pub enum AttemptOutcome {
    Success,
    Blocked(String),
    Timeout,
    Network(String),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub strategy: FetchStrategy,
    /// 1-based attempt number within the strategy's budget.
    pub attempt: u32,
    pub outcome: AttemptOutcome,
    #[serde(with = "millis")]
    pub elapsed: Duration,
}

/// Transient unit of work for one candidate.
#[derive(Debug, Clone, Serialize)]
pub struct AcquisitionJob {
    pub url: String,
    pub source: SourceName,
    pub uid: Uid,
    pub state: JobState,
    pub trace: Vec<AttemptRecord>,
}

impl AcquisitionJob {
    pub fn new(candidate: &Candidate, uid: Uid) -> Self {
        Self {
            url: candidate.url.clone(),
            source: candidate.source,
            uid,
            state: JobState::Pending,
            trace: Vec::new(),
        }
    }

    pub fn transition(&mut self, next: JobState) {
        tracing::trace!(uid = %self.uid, from = ?self.state, to = ?next, "job transition");
        self.state = next;
    }

    pub fn record_attempt(&mut self, record: AttemptRecord) {
        self.trace.push(record);
    }

    pub fn attempt_count(&self) -> usize {
        self.trace.len()
    }

    /// Distinct strategies tried, in order.
    pub fn strategies_tried(&self) -> Vec<FetchStrategy> {
        let mut tried: Vec<FetchStrategy> = Vec::new();
        for record in &self.trace {
            if tried.last() != Some(&record.strategy) {
                tried.push(record.strategy);
            }
        }
        tried
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt(strategy: FetchStrategy, attempt: u32, outcome: AttemptOutcome) -> AttemptRecord {
        AttemptRecord {
            strategy,
            attempt,
            outcome,
            elapsed: Duration::ZERO,
        }
    }

    #[test]
    fn test_strategies_tried_collapses_retries() {
        let candidate = Candidate::new("https://www.zoopla.co.uk/to-rent/details/1", SourceName::Zoopla);
        let mut job = AcquisitionJob::new(&candidate, Uid::new(SourceName::Zoopla, "1"));

        job.record_attempt(attempt(FetchStrategy::Direct, 1, AttemptOutcome::Timeout));
        job.record_attempt(attempt(FetchStrategy::Direct, 2, AttemptOutcome::Blocked("403".into())));
        job.record_attempt(attempt(FetchStrategy::ManagedCrawl, 1, AttemptOutcome::Success));

        assert_eq!(job.attempt_count(), 3);
        assert_eq!(
            job.strategies_tried(),
            vec![FetchStrategy::Direct, FetchStrategy::ManagedCrawl]
        );
    }

    #[test]
    fn test_terminal_states() {
        assert!(!JobState::Pending.is_terminal());
        assert!(!JobState::Fetching.is_terminal());
        assert!(!JobState::Extracted.is_terminal());
        assert!(!JobState::Validated.is_terminal());
        assert!(JobState::Cancelled.is_terminal());
        assert!(JobState::PersistenceFailed.is_terminal());
    }

    #[test]
    fn test_candidate_feed_format() {
        let feed: Vec<Candidate> = serde_json::from_str(
            r#"[{"url": "https://www.rightmove.co.uk/properties/1", "source": "rightmove"}]"#,
        )
        .unwrap();
        assert_eq!(feed[0].source, SourceName::Rightmove);
    }
}
