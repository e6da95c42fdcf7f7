//! Batch acquisition: partition, fetch with retry and fallback, extract,
//! validate, store, report.

use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{FetchError, StoreResult};
use crate::extractors::ExtractorRegistry;
use crate::fetchers::HostGates;
use crate::pipeline::validate::validate;
use crate::stores::freshness::{FreshnessStore, RecordOutcome};
use crate::traits::fetcher::Fetcher;
use crate::traits::repository::ListingRepository;
use crate::types::config::AcquisitionConfig;
use crate::types::content::RawContent;
use crate::types::job::{AcquisitionJob, AttemptOutcome, AttemptRecord, Candidate, JobState};
use crate::types::listing::{ExtractedListing, FetchStrategy, ListingRecord, SourceName, Uid};
use crate::types::report::{BatchOutput, FailureKind, JobFailure, ProcessedBatchReport};

/// A candidate that passed partitioning.
struct PlannedJob {
    job: AcquisitionJob,
    local_id: String,
}

enum JobOutcome {
    Stored(RecordOutcome),
    Failed(JobFailure),
    Cancelled,
}

struct FinishedJob {
    job: AcquisitionJob,
    outcome: JobOutcome,
}

/// How the fetch phase of a job ended without content.
enum FetchEnd {
    Failed(FetchError),
    Cancelled,
}

fn attempt_outcome(error: &FetchError) -> AttemptOutcome {
    match error {
        FetchError::Blocked { reason, .. } => AttemptOutcome::Blocked(reason.clone()),
        FetchError::Timeout { .. } => AttemptOutcome::Timeout,
        FetchError::Network { source, .. } => AttemptOutcome::Network(source.to_string()),
    }
}

fn failure_kind(error: &FetchError) -> FailureKind {
    match error {
        FetchError::Blocked { .. } => FailureKind::Blocked,
        FetchError::Timeout { .. } => FailureKind::Timeout,
        FetchError::Network { .. } => FailureKind::Network,
    }
}

/// Drives batches of candidates through the engine.
///
/// Owns the per-host gates, so two orchestrators never share rate limits.
pub struct Orchestrator<R: ListingRepository> {
    config: AcquisitionConfig,
    store: Arc<FreshnessStore<R>>,
    fetchers: HashMap<FetchStrategy, Arc<dyn Fetcher>>,
    extractors: ExtractorRegistry,
    gates: HostGates,
}

impl<R: ListingRepository> Orchestrator<R> {
    /// Create an orchestrator with the default extractors and no fetchers.
    pub fn new(config: AcquisitionConfig, store: Arc<FreshnessStore<R>>) -> Self {
        let gates = HostGates::new(config.default_host.clone()).with_overrides(config.hosts.clone());
        Self {
            config,
            store,
            fetchers: HashMap::new(),
            extractors: ExtractorRegistry::default(),
            gates,
        }
    }

    /// Register the fetcher for its strategy, replacing any previous one.
    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetchers.insert(fetcher.strategy(), fetcher);
        self
    }

    pub fn with_extractors(mut self, extractors: ExtractorRegistry) -> Self {
        self.extractors = extractors;
        self
    }

    pub fn config(&self) -> &AcquisitionConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<FreshnessStore<R>> {
        &self.store
    }

    pub fn gates(&self) -> &HostGates {
        &self.gates
    }

    /// Run one batch, honoring the configured batch deadline.
    pub async fn run_batch(&self, candidates: Vec<Candidate>) -> BatchOutput {
        self.run_batch_with_cancel(candidates, CancellationToken::new())
            .await
    }

    /// Run one batch that stops early when `cancel` fires or the batch
    /// deadline passes. The deadline counts from the call, partitioning
    /// included. Finished jobs are kept; unfinished ones are reported as
    /// cancelled.
    pub async fn run_batch_with_cancel(
        &self,
        candidates: Vec<Candidate>,
        cancel: CancellationToken,
    ) -> BatchOutput {
        // The deadline cancels this batch only, never the caller's token
        let cancel = cancel.child_token();
        let deadline_timer = self.config.batch_deadline.map(|deadline| {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(deadline).await;
                if !cancel.is_cancelled() {
                    warn!(deadline = ?deadline, "Batch deadline reached, cancelling");
                    cancel.cancel();
                }
            })
        });

        let clock = Arc::clone(self.store.clock());
        let mut report = ProcessedBatchReport::new(clock.now());
        let mut records = Vec::new();
        let mut jobs = Vec::new();

        let planned = self.partition(candidates, &mut report, &cancel).await;

        let mut per_source: BTreeMap<SourceName, usize> = BTreeMap::new();
        for p in &planned {
            *per_source.entry(p.job.source).or_default() += 1;
        }
        for (source, count) in &per_source {
            info!(
                source = %source,
                jobs = count,
                primary = %self.config.sources.primary(*source),
                "Dispatching jobs"
            );
        }

        let mut running: FuturesUnordered<_> = planned
            .into_iter()
            .map(|p| self.run_job(p, &cancel))
            .collect();

        while let Some(finished) = running.next().await {
            self.aggregate(finished, &mut report, &mut records, &mut jobs);
        }
        drop(running);

        if let Some(timer) = deadline_timer {
            timer.abort();
        }
        report.finish(clock.now());

        info!(
            new = report.new_count,
            updated = report.updated_count,
            skipped = report.skipped_count,
            failed = report.failed_count,
            cancelled = report.cancelled_count,
            partial = report.partial,
            "Batch complete"
        );

        BatchOutput {
            report,
            records,
            jobs,
        }
    }

    /// Resolve uids and drop candidates that are still fresh. Candidates
    /// reached after cancellation are reported as cancelled.
    async fn partition(
        &self,
        candidates: Vec<Candidate>,
        report: &mut ProcessedBatchReport,
        cancel: &CancellationToken,
    ) -> Vec<PlannedJob> {
        let window = self.config.freshness_window;
        let mut planned = Vec::new();

        for candidate in candidates {
            let local_id = match self.extractors.listing_id(candidate.source, &candidate.url) {
                Ok(id) => id,
                Err(e) => {
                    warn!(url = %candidate.url, error = %e, "Invalid candidate");
                    report.record_failure(JobFailure {
                        uid: None,
                        url: candidate.url,
                        kind: FailureKind::InvalidCandidate,
                        detail: e.to_string(),
                    });
                    continue;
                }
            };
            let uid = Uid::new(candidate.source, &local_id);

            let fresh_check = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                result = self.store.should_scrape(&uid, window) => Some(result),
            };
            let Some(fresh_check) = fresh_check else {
                debug!(uid = %uid, "Cancelled before dispatch");
                report.record_cancelled(candidate.url);
                continue;
            };

            match fresh_check {
                Ok(true) => planned.push(PlannedJob {
                    job: AcquisitionJob::new(&candidate, uid),
                    local_id,
                }),
                Ok(false) => {
                    debug!(uid = %uid, "Fresh, skipping");
                    report.skipped_count += 1;
                }
                Err(e) => {
                    warn!(uid = %uid, error = %e, "Freshness lookup failed");
                    report.record_failure(JobFailure {
                        uid: Some(uid),
                        url: candidate.url,
                        kind: FailureKind::Persistence,
                        detail: e.to_string(),
                    });
                }
            }
        }

        info!(
            to_scrape = planned.len(),
            skipped = report.skipped_count,
            invalid = report.failures_of(FailureKind::InvalidCandidate),
            "Partitioned batch"
        );
        planned
    }

    async fn run_job(&self, planned: PlannedJob, cancel: &CancellationToken) -> FinishedJob {
        let PlannedJob { mut job, local_id } = planned;

        if cancel.is_cancelled() {
            job.transition(JobState::Cancelled);
            return FinishedJob {
                job,
                outcome: JobOutcome::Cancelled,
            };
        }

        job.transition(JobState::Fetching);
        let raw = match self.fetch(&mut job, cancel).await {
            Ok(raw) => raw,
            Err(FetchEnd::Cancelled) => {
                job.transition(JobState::Cancelled);
                return FinishedJob {
                    job,
                    outcome: JobOutcome::Cancelled,
                };
            }
            Err(FetchEnd::Failed(e)) => {
                job.transition(JobState::FetchFailed);
                let failure = self.failure(&job, failure_kind(&e), e.to_string());
                return FinishedJob {
                    job,
                    outcome: JobOutcome::Failed(failure),
                };
            }
        };

        job.transition(JobState::Extracting);
        let extraction = self
            .extractors
            .get(job.source)
            .and_then(|extractor| extractor.extract(&raw));
        let extraction = match extraction {
            Ok(extraction) => {
                job.transition(JobState::Extracted);
                extraction
            }
            Err(e) => {
                job.transition(JobState::ExtractFailed);
                let failure = self.failure(&job, FailureKind::Malformed, e.to_string());
                return FinishedJob {
                    job,
                    outcome: JobOutcome::Failed(failure),
                };
            }
        };

        let listing = ExtractedListing {
            uid: job.uid.clone(),
            source: job.source,
            source_local_id: local_id,
            url: job.url.clone(),
            fields: extraction.fields,
            extraction_method: raw.strategy,
            extraction_confidence: extraction.confidence,
            observed_at: self.store.clock().now(),
        };

        job.transition(JobState::Validating);
        if let Err(e) = validate(&listing) {
            job.transition(JobState::ValidationFailed);
            let failure = self.failure(&job, FailureKind::Invalid, e.to_string());
            return FinishedJob {
                job,
                outcome: JobOutcome::Failed(failure),
            };
        }
        job.transition(JobState::Validated);

        match self.store.record_outcome(listing).await {
            Ok(outcome) => {
                job.transition(JobState::Done);
                FinishedJob {
                    job,
                    outcome: JobOutcome::Stored(outcome),
                }
            }
            Err(e) => {
                job.transition(JobState::PersistenceFailed);
                let failure = self.failure(&job, FailureKind::Persistence, e.to_string());
                FinishedJob {
                    job,
                    outcome: JobOutcome::Failed(failure),
                }
            }
        }
    }

    /// Walk the strategy chain. Transient errors retry with backoff on the
    /// same strategy; a block moves straight to the next strategy with a
    /// fresh budget.
    async fn fetch(
        &self,
        job: &mut AcquisitionJob,
        cancel: &CancellationToken,
    ) -> Result<RawContent, FetchEnd> {
        let retry = &self.config.retry;
        let url = job.url.clone();
        let gate = self.gates.gate_for_url(&url);
        let mut last_error = None;

        for strategy in self.config.sources.chain(job.source) {
            let Some(fetcher) = self.fetchers.get(&strategy) else {
                debug!(uid = %job.uid, strategy = %strategy, "No fetcher registered");
                continue;
            };

            let mut attempt = 0;
            loop {
                attempt += 1;
                let started = Instant::now();

                let result = tokio::select! {
                    result = gate.fetch(fetcher.as_ref(), &url) => result,
                    _ = cancel.cancelled() => {
                        job.record_attempt(AttemptRecord {
                            strategy,
                            attempt,
                            outcome: AttemptOutcome::Cancelled,
                            elapsed: started.elapsed(),
                        });
                        return Err(FetchEnd::Cancelled);
                    }
                };

                let error = match result {
                    Ok(raw) => {
                        job.record_attempt(AttemptRecord {
                            strategy,
                            attempt,
                            outcome: AttemptOutcome::Success,
                            elapsed: started.elapsed(),
                        });
                        debug!(uid = %job.uid, strategy = %strategy, attempt, "Fetched");
                        return Ok(raw);
                    }
                    Err(e) => e,
                };

                job.record_attempt(AttemptRecord {
                    strategy,
                    attempt,
                    outcome: attempt_outcome(&error),
                    elapsed: started.elapsed(),
                });

                if error.is_blocked() {
                    info!(uid = %job.uid, strategy = %strategy, error = %error, "Blocked, falling back");
                    last_error = Some(error);
                    break;
                }

                if !retry.allows_another(attempt) {
                    warn!(uid = %job.uid, strategy = %strategy, attempts = attempt, error = %error, "Retries exhausted");
                    last_error = Some(error);
                    break;
                }

                let delay = retry.delay_after(attempt);
                debug!(uid = %job.uid, strategy = %strategy, attempt, delay = ?delay, error = %error, "Retrying");
                last_error = Some(error);

                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => return Err(FetchEnd::Cancelled),
                }
            }
        }

        Err(FetchEnd::Failed(last_error.unwrap_or_else(|| {
            FetchError::network(url.as_str(), "no fetcher registered for any strategy")
        })))
    }

    fn failure(&self, job: &AcquisitionJob, kind: FailureKind, detail: String) -> JobFailure {
        warn!(uid = %job.uid, url = %job.url, kind = ?kind, detail = %detail, "Job failed");
        JobFailure {
            uid: Some(job.uid.clone()),
            url: job.url.clone(),
            kind,
            detail,
        }
    }

    fn aggregate(
        &self,
        finished: FinishedJob,
        report: &mut ProcessedBatchReport,
        records: &mut Vec<ListingRecord>,
        jobs: &mut Vec<AcquisitionJob>,
    ) {
        let FinishedJob { job, outcome } = finished;

        for attempt in &job.trace {
            if attempt.outcome != AttemptOutcome::Cancelled {
                report.usage.record(attempt.strategy);
            }
        }

        match outcome {
            JobOutcome::Stored(outcome) => {
                let primary = self.config.sources.primary(job.source);
                if outcome.record.extraction_method != primary {
                    report.usage.fallbacks += 1;
                }

                if outcome.stale {
                    report.skipped_count += 1;
                } else {
                    if outcome.is_new {
                        report.new_count += 1;
                    } else {
                        report.updated_count += 1;
                    }
                    records.push(outcome.record);
                }
            }
            JobOutcome::Failed(failure) => report.record_failure(failure),
            JobOutcome::Cancelled => {
                debug!(uid = %job.uid, "Job cancelled");
                report.record_cancelled(job.url.clone());
            }
        }

        jobs.push(job);
    }

    /// Deactivate every active listing of `source` absent from a completed
    /// discovery pass. Returns how many were deactivated.
    pub async fn complete_discovery_pass(
        &self,
        source: SourceName,
        discovered: &[Uid],
    ) -> StoreResult<usize> {
        let discovered: HashSet<&Uid> = discovered.iter().collect();
        let absent: Vec<Uid> = self
            .store
            .active_uids(source)
            .await?
            .into_iter()
            .filter(|uid| !discovered.contains(uid))
            .collect();

        let changed = self.store.mark_absent(&absent).await?;
        info!(source = %source, absent = absent.len(), deactivated = changed, "Discovery pass complete");
        Ok(changed)
    }
}
