//! Storage traits for jobs, webhooks, counters, and monitor snapshots.
//!
//! The storage layer is split into focused traits so each component can
//! be tested against an in-memory fake and swapped for a distributed
//! store without touching the callers:
//! - `JobStore`: batch job snapshots (single writer: the orchestrator)
//! - `CounterStore`: atomic windowed counters for admission control
//! - `WebhookStore`: webhook registrations
//! - `DeliveryLog`: short-lived delivery attempt records
//! - `SnapshotStore`: last-seen product snapshots for the monitor

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StoreResult;
use crate::types::{
    job::BatchJob,
    monitor::ProductSnapshot,
    webhook::{DeliveryAttempt, WebhookRegistration, WebhookStatus},
};

/// Durable record of batch jobs.
///
/// Only the orchestrator mutates job records; every call persists a
/// whole snapshot atomically.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a new job.
    async fn insert_job(&self, job: &BatchJob) -> StoreResult<()>;

    /// Load a job by id. Returns `None` for unknown or expired ids.
    async fn load_job(&self, id: Uuid) -> StoreResult<Option<BatchJob>>;

    /// Overwrite an existing job's snapshot.
    async fn update_job(&self, job: &BatchJob) -> StoreResult<()>;
}

/// Atomic windowed counters for the rate limiter.
///
/// `increment` must be increment-then-return-atomic: two concurrent
/// calls for the same key may never observe the same value, otherwise
/// both could pass a ceiling check.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increment the counter at `key`, creating it with the given TTL
    /// if absent, and return the post-increment value.
    async fn increment(&self, key: &str, ttl: Duration) -> StoreResult<u64>;

    /// Current value at `key`, zero if absent or expired.
    async fn get(&self, key: &str) -> StoreResult<u64>;
}

/// Durable record of webhook registrations.
#[async_trait]
pub trait WebhookStore: Send + Sync {
    /// Persist a new registration.
    async fn insert_webhook(&self, registration: &WebhookRegistration) -> StoreResult<()>;

    /// Load a registration by id.
    async fn load_webhook(&self, id: Uuid) -> StoreResult<Option<WebhookRegistration>>;

    /// All active registrations for a tenant.
    async fn active_webhooks_for_tenant(
        &self,
        tenant_id: &str,
    ) -> StoreResult<Vec<WebhookRegistration>>;

    /// Flip a registration's status (the only field that mutates).
    async fn set_webhook_status(&self, id: Uuid, status: WebhookStatus) -> StoreResult<()>;

    /// Remove a registration entirely.
    async fn delete_webhook(&self, id: Uuid) -> StoreResult<()>;

    /// Record delivery activity, resetting the inactivity TTL clock.
    async fn touch_webhook(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()>;
}

/// Short-lived log of webhook delivery attempts, for operator
/// debugging. Entries are retained for 7 days.
#[async_trait]
pub trait DeliveryLog: Send + Sync {
    /// Append an attempt record.
    async fn append_attempt(&self, attempt: &DeliveryAttempt) -> StoreResult<()>;

    /// Recent attempts for one webhook, newest last.
    async fn attempts_for_webhook(&self, webhook_id: Uuid) -> StoreResult<Vec<DeliveryAttempt>>;
}

/// Last-seen snapshots and check times for monitored products.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// The stored snapshot for a monitor, if any.
    async fn load_snapshot(&self, monitor_id: Uuid) -> StoreResult<Option<ProductSnapshot>>;

    /// Replace the stored snapshot.
    async fn store_snapshot(
        &self,
        monitor_id: Uuid,
        snapshot: &ProductSnapshot,
    ) -> StoreResult<()>;

    /// When this monitor was last checked, if ever.
    async fn last_checked_at(&self, monitor_id: Uuid) -> StoreResult<Option<DateTime<Utc>>>;

    /// Record a check time.
    async fn mark_checked(&self, monitor_id: Uuid, at: DateTime<Utc>) -> StoreResult<()>;
}
