//! Batch job record, status state machine, and progress counters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;
use uuid::Uuid;

/// Maximum entries retained in a job's error log.
pub const MAX_ERROR_LOG_ENTRIES: usize = 100;

/// Lifecycle state of a batch job.
///
/// Transitions are forward-only:
/// `Pending -> Processing -> Completed | Partial | Failed`.
/// The three right-hand states are terminal; nothing leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
    Partial,
}

impl JobStatus {
    /// Whether this state admits no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Partial)
    }
}

/// Progress counters for a batch job.
///
/// Invariant: `processed == succeeded + failed <= total` at all times.
/// Counters are folded in chunk-sized units so a partially processed
/// chunk is never visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct JobCounters {
    pub total: u64,
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
}

impl JobCounters {
    /// Counters for a freshly submitted job.
    pub fn for_total(total: u64) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    /// Fold one chunk's results into the counters as a single update.
    pub fn record_chunk(&mut self, succeeded: u64, failed: u64) {
        self.succeeded += succeeded;
        self.failed += failed;
        self.processed = self.succeeded + self.failed;
    }

    /// Move previously failed items to succeeded after a retry pass.
    pub fn reclaim_failed(&mut self, recovered: u64) {
        debug_assert!(recovered <= self.failed);
        self.failed -= recovered;
        self.succeeded += recovered;
        self.processed = self.succeeded + self.failed;
    }

    /// Completion fraction in percent.
    pub fn progress_percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.processed as f64 / self.total as f64 * 100.0
    }
}

/// One entry in a job's bounded, append-only error log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorLogEntry {
    pub timestamp: DateTime<Utc>,
    /// Item index range `[start, end)` of the chunk the error belongs to.
    pub chunk_range: (usize, usize),
    pub message: String,
}

/// A batch job: one tenant's request to process a list of product URLs.
///
/// The orchestrator is the single writer for a job record; stores only
/// persist snapshots of it.
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct BatchJob {
    #[builder(default = Uuid::new_v4())]
    pub id: Uuid,

    pub tenant_id: String,

    /// Immutable input list of product URLs.
    pub items: Vec<String>,

    pub chunk_size: usize,
    pub max_concurrency: usize,

    #[builder(default)]
    pub status: JobStatus,

    #[builder(default)]
    pub counters: JobCounters,

    #[builder(default)]
    pub error_log: Vec<ErrorLogEntry>,

    /// Items that failed processing, kept verbatim so `retry_failed`
    /// can resubmit exactly this sub-list.
    #[builder(default)]
    pub failed_items: Vec<String>,

    /// Set on jobs created by `retry_failed`. Retry jobs never run the
    /// automatic retry pass, which bounds retry chains at depth one.
    #[builder(default = false)]
    pub is_retry: bool,

    /// The job this one retries, if any.
    #[builder(default, setter(strip_option))]
    pub retry_of: Option<Uuid>,

    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,

    #[builder(default, setter(strip_option))]
    pub started_at: Option<DateTime<Utc>>,

    #[builder(default, setter(strip_option))]
    pub completed_at: Option<DateTime<Utc>>,

    /// Set when the job reaches a terminal state; the record becomes
    /// eligible for garbage collection after this instant.
    #[builder(default, setter(strip_option))]
    pub expires_at: Option<DateTime<Utc>>,
}

impl BatchJob {
    /// Append an error log entry, dropping it silently once the log is
    /// at capacity. The counters remain authoritative either way.
    pub fn push_error(&mut self, chunk_range: (usize, usize), message: impl Into<String>) {
        if self.error_log.len() < MAX_ERROR_LOG_ENTRIES {
            self.error_log.push(ErrorLogEntry {
                timestamp: Utc::now(),
                chunk_range,
                message: message.into(),
            });
        }
    }
}

/// Read-only view of a job returned by status queries.
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub id: Uuid,
    pub tenant_id: String,
    pub status: JobStatus,
    pub counters: JobCounters,
    pub progress_percent: f64,
    /// Estimated seconds until completion; only present while the job
    /// is `Processing` and some progress has been made.
    pub eta_seconds: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_job() -> BatchJob {
        BatchJob::builder()
            .tenant_id("tenant-1")
            .items(vec!["https://shop.example/a".to_string()])
            .chunk_size(100usize)
            .max_concurrency(10usize)
            .build()
    }

    #[test]
    fn new_job_starts_pending() {
        let job = sample_job();
        assert_eq!(job.status, JobStatus::Pending);
        assert!(!job.is_retry);
    }

    #[test]
    fn terminal_states_are_terminal() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Partial.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
    }

    #[test]
    fn counters_hold_invariant_across_chunks() {
        let mut counters = JobCounters::for_total(250);
        counters.record_chunk(90, 10);
        counters.record_chunk(100, 0);
        assert_eq!(counters.processed, counters.succeeded + counters.failed);
        assert!(counters.processed <= counters.total);
        assert_eq!(counters.processed, 200);
    }

    #[test]
    fn reclaim_moves_failed_to_succeeded() {
        let mut counters = JobCounters::for_total(100);
        counters.record_chunk(70, 30);
        counters.reclaim_failed(20);
        assert_eq!(counters.succeeded, 90);
        assert_eq!(counters.failed, 10);
        assert_eq!(counters.processed, 100);
    }

    #[test]
    fn error_log_is_bounded() {
        let mut job = sample_job();
        for i in 0..(MAX_ERROR_LOG_ENTRIES + 25) {
            job.push_error((i, i + 1), "boom");
        }
        assert_eq!(job.error_log.len(), MAX_ERROR_LOG_ENTRIES);
    }

    #[test]
    fn progress_percent_handles_empty_total() {
        let counters = JobCounters::default();
        assert_eq!(counters.progress_percent(), 0.0);
    }
}
