//! Batch job orchestrator: lifecycle, chunked execution, and progress.
//!
//! The orchestrator is the single writer for job records. Submission
//! persists a `Pending` record and returns immediately; execution
//! proceeds on a spawned task that drives chunks strictly in order,
//! folding each chunk's results into the counters as one store update.
//!
//! Failure semantics: per-item failures are counted and logged, never
//! fatal. A store write failure is the one fatal class; it forces the
//! job to `Failed` because progress can no longer be trusted.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{BatchError, Result, StoreError};
use crate::jobs::chunk::run_chunk;
use crate::traits::processor::ItemProcessor;
use crate::traits::store::JobStore;
use crate::types::{
    config::{EngineConfig, JobOptions},
    job::{BatchJob, JobSnapshot, JobStatus},
    webhook::{EVENT_BATCH_COMPLETED, EVENT_BATCH_FAILED, EVENT_BATCH_PARTIAL},
};
use crate::webhooks::delivery::WebhookEngine;

/// Drives batch jobs from submission to a terminal state.
#[derive(Clone)]
pub struct BatchOrchestrator {
    store: Arc<dyn JobStore>,
    processor: Arc<dyn ItemProcessor>,
    webhooks: Option<Arc<WebhookEngine>>,
    config: Arc<EngineConfig>,
    /// Root token threaded into every item call. There is no public
    /// mid-job cancel operation yet; the hook exists so one can be
    /// added without re-architecture.
    shutdown: CancellationToken,
}

impl BatchOrchestrator {
    /// Create an orchestrator over a job store and item processor.
    pub fn new(
        store: Arc<dyn JobStore>,
        processor: Arc<dyn ItemProcessor>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            processor,
            webhooks: None,
            config: Arc::new(config),
            shutdown: CancellationToken::new(),
        }
    }

    /// Attach a webhook engine; terminal jobs then notify the tenant.
    pub fn with_webhooks(mut self, webhooks: Arc<WebhookEngine>) -> Self {
        self.webhooks = Some(webhooks);
        self
    }

    /// The token cancelled on engine shutdown.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Accept a batch of product URLs for background processing.
    ///
    /// Validates input, persists the `Pending` record, schedules
    /// execution, and returns the job id without waiting for the job
    /// to start.
    pub async fn submit(
        &self,
        tenant_id: &str,
        items: Vec<String>,
        options: JobOptions,
    ) -> Result<Uuid> {
        if items.is_empty() {
            return Err(BatchError::Validation {
                reason: "items must not be empty".to_string(),
            });
        }
        if items.len() > self.config.max_items_per_job {
            return Err(BatchError::Validation {
                reason: format!(
                    "item count {} exceeds ceiling {}",
                    items.len(),
                    self.config.max_items_per_job
                ),
            });
        }
        options.validate()?;

        let total = items.len() as u64;
        let job = BatchJob::builder()
            .tenant_id(tenant_id)
            .items(items)
            .chunk_size(options.chunk_size)
            .max_concurrency(options.max_concurrency)
            .counters(crate::types::job::JobCounters::for_total(total))
            .build();

        self.spawn_job(job).await
    }

    /// Status snapshot for a job, with progress and (while processing)
    /// an ETA computed from the observed progress rate. Pure read.
    pub async fn get_status(&self, job_id: Uuid) -> Result<JobSnapshot> {
        let job = self
            .store
            .load_job(job_id)
            .await?
            .ok_or_else(|| BatchError::NotFound {
                job_id: job_id.to_string(),
            })?;

        let progress = job.counters.progress_percent();
        let eta_seconds = match (job.status, job.started_at) {
            (JobStatus::Processing, Some(started)) if progress > 0.0 => {
                let elapsed = (Utc::now() - started).num_seconds().max(0) as f64;
                Some((elapsed / progress * 100.0 - elapsed).max(0.0) as u64)
            }
            _ => None,
        };

        Ok(JobSnapshot {
            id: job.id,
            tenant_id: job.tenant_id,
            status: job.status,
            counters: job.counters,
            progress_percent: progress,
            eta_seconds,
            created_at: job.created_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
        })
    }

    /// Resubmit exactly the failed items of a terminal job as a new
    /// job. The new job carries the retry flag, which disables the
    /// automatic retry pass and so bounds retry chains.
    pub async fn retry_failed(&self, job_id: Uuid) -> Result<Uuid> {
        let original = self
            .store
            .load_job(job_id)
            .await?
            .ok_or_else(|| BatchError::NotFound {
                job_id: job_id.to_string(),
            })?;

        if !original.status.is_terminal() {
            return Err(BatchError::InvalidState {
                reason: format!("job {} is still {:?}", job_id, original.status),
            });
        }
        if original.failed_items.is_empty() {
            return Err(BatchError::NoFailedItems);
        }

        let total = original.failed_items.len() as u64;
        let retry = BatchJob::builder()
            .tenant_id(original.tenant_id.clone())
            .items(original.failed_items.clone())
            .chunk_size(original.chunk_size)
            .max_concurrency(original.max_concurrency)
            .counters(crate::types::job::JobCounters::for_total(total))
            .is_retry(true)
            .retry_of(original.id)
            .build();

        info!(original = %job_id, retry = %retry.id, items = total, "resubmitting failed items");
        self.spawn_job(retry).await
    }

    /// Persist a pending job and schedule its execution.
    async fn spawn_job(&self, job: BatchJob) -> Result<Uuid> {
        let job_id = job.id;
        self.store.insert_job(&job).await?;

        let this = self.clone();
        tokio::spawn(async move {
            this.run_job(job).await;
        });

        Ok(job_id)
    }

    /// Execute a job to its terminal state. Runs on a spawned task.
    async fn run_job(&self, mut job: BatchJob) {
        info!(
            job_id = %job.id,
            tenant_id = %job.tenant_id,
            items = job.items.len(),
            chunk_size = job.chunk_size,
            "job starting"
        );

        job.status = JobStatus::Processing;
        job.started_at = Some(Utc::now());
        if let Err(e) = self.store.update_job(&job).await {
            // Could not even record the transition; nothing downstream
            // can be trusted, so give up after a best-effort fail mark.
            self.fail_job(&mut job, &e).await;
            return;
        }

        if let Err(e) = self.run_chunks(&mut job).await {
            self.fail_job(&mut job, &e).await;
            return;
        }

        if self.should_auto_retry(&job) {
            if let Err(e) = self.retry_pass(&mut job).await {
                self.fail_job(&mut job, &e).await;
                return;
            }
        }

        let status = if job.counters.failed == 0 {
            JobStatus::Completed
        } else {
            JobStatus::Partial
        };
        self.finish_job(&mut job, status).await;
    }

    /// Drive every chunk of the job's item list, strictly in order.
    async fn run_chunks(&self, job: &mut BatchJob) -> std::result::Result<(), StoreError> {
        let items = job.items.clone();
        let chunk_count = items.len().div_ceil(job.chunk_size);

        for (index, chunk) in items.chunks(job.chunk_size).enumerate() {
            let start = index * job.chunk_size;
            let range = (start, start + chunk.len());

            let results = run_chunk(
                chunk,
                job.max_concurrency,
                self.config.item_timeout,
                self.processor.clone(),
                &self.shutdown,
            )
            .await;

            let mut succeeded = 0u64;
            let mut failed = 0u64;
            for result in results {
                if result.success {
                    succeeded += 1;
                } else {
                    failed += 1;
                    job.failed_items.push(result.item.clone());
                    job.push_error(
                        range,
                        format!(
                            "{}: {}",
                            result.item,
                            result.error.as_deref().unwrap_or("unknown error")
                        ),
                    );
                }
            }

            // One counter fold per chunk; a partial chunk is never
            // visible to status readers.
            job.counters.record_chunk(succeeded, failed);
            self.store.update_job(job).await?;

            info!(
                job_id = %job.id,
                chunk = index + 1,
                chunks = chunk_count,
                succeeded,
                failed,
                "chunk complete"
            );

            if index + 1 < chunk_count {
                tokio::time::sleep(self.config.inter_chunk_delay).await;
            }
        }

        Ok(())
    }

    /// Whether the sub-threshold automatic retry pass should run.
    ///
    /// Above the threshold the job is left for operator inspection
    /// instead of auto-retrying against a failing downstream.
    fn should_auto_retry(&self, job: &BatchJob) -> bool {
        if job.is_retry || job.counters.failed == 0 || job.counters.total == 0 {
            return false;
        }
        let failure_rate = job.counters.failed as f64 / job.counters.total as f64;
        failure_rate < self.config.auto_retry_threshold
    }

    /// Re-run the failed items once within the same job. Items that
    /// succeed move from failed to succeeded; the rest stay failed.
    async fn retry_pass(&self, job: &mut BatchJob) -> std::result::Result<(), StoreError> {
        let retry_items = std::mem::take(&mut job.failed_items);
        info!(job_id = %job.id, items = retry_items.len(), "running retry pass over failed items");

        let mut recovered = 0u64;
        for chunk in retry_items.chunks(job.chunk_size) {
            let results = run_chunk(
                chunk,
                job.max_concurrency,
                self.config.item_timeout,
                self.processor.clone(),
                &self.shutdown,
            )
            .await;

            for result in results {
                if result.success {
                    recovered += 1;
                } else {
                    job.failed_items.push(result.item);
                }
            }
        }

        job.counters.reclaim_failed(recovered);
        self.store.update_job(job).await?;
        Ok(())
    }

    /// Move the job into a terminal state and notify the tenant.
    async fn finish_job(&self, job: &mut BatchJob, status: JobStatus) {
        job.status = status;
        job.completed_at = Some(Utc::now());
        job.expires_at = Some(
            Utc::now() + chrono::Duration::from_std(self.config.job_retention).unwrap_or_default(),
        );

        // A failed terminal write is a store fault like any other: the
        // record must end up `Failed` with the cause in its error log,
        // not stranded at `Processing`.
        if let Err(e) = self.store.update_job(job).await {
            self.fail_job(job, &e).await;
            return;
        }

        info!(
            job_id = %job.id,
            status = ?job.status,
            succeeded = job.counters.succeeded,
            failed = job.counters.failed,
            "job finished"
        );

        self.notify_terminal(job).await;
    }

    /// Force the job to `Failed` after a store-level fault.
    async fn fail_job(&self, job: &mut BatchJob, cause: &StoreError) {
        error!(job_id = %job.id, error = %cause, "store failure, failing job");

        job.status = JobStatus::Failed;
        job.completed_at = Some(Utc::now());
        job.expires_at = Some(
            Utc::now() + chrono::Duration::from_std(self.config.job_retention).unwrap_or_default(),
        );
        job.push_error((0, job.items.len()), format!("store failure: {cause}"));

        // Best effort: the store already failed once.
        if let Err(e) = self.store.update_job(job).await {
            error!(job_id = %job.id, error = %e, "could not persist failed state");
        }

        self.notify_terminal(job).await;
    }

    /// Fire the terminal webhook event for the tenant, if a webhook
    /// engine is attached. Delivery failures are logged, never raised.
    async fn notify_terminal(&self, job: &BatchJob) {
        let Some(webhooks) = &self.webhooks else {
            return;
        };

        let event = match job.status {
            JobStatus::Completed => EVENT_BATCH_COMPLETED,
            JobStatus::Partial => EVENT_BATCH_PARTIAL,
            JobStatus::Failed => EVENT_BATCH_FAILED,
            _ => return,
        };

        let payload = json!({
            "job_id": job.id,
            "tenant_id": job.tenant_id,
            "status": job.status,
            "counters": job.counters,
        });

        match webhooks.trigger_for_tenant(&job.tenant_id, event, payload).await {
            Ok(outcome) => {
                info!(
                    job_id = %job.id,
                    event,
                    delivered = outcome.delivered,
                    failed = outcome.failed,
                    "terminal webhooks triggered"
                );
            }
            Err(e) => {
                warn!(job_id = %job.id, event, error = %e, "terminal webhook trigger failed");
            }
        }
    }
}
