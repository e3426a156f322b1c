//! In-memory storage implementation for testing and development.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StoreResult;
use crate::traits::store::{CounterStore, DeliveryLog, JobStore, SnapshotStore, WebhookStore};
use crate::types::{
    job::BatchJob,
    monitor::ProductSnapshot,
    webhook::{DeliveryAttempt, WebhookRegistration, WebhookStatus},
};

struct CounterEntry {
    value: u64,
    expires_at: DateTime<Utc>,
}

/// In-memory store backing every storage trait in the engine.
///
/// Useful for testing and development. Not suitable for production as
/// data is lost on restart; TTL expiry happens lazily on read plus an
/// explicit `purge_expired` sweep.
pub struct MemoryStore {
    jobs: RwLock<HashMap<Uuid, BatchJob>>,
    counters: RwLock<HashMap<String, CounterEntry>>,
    webhooks: RwLock<HashMap<Uuid, WebhookRegistration>>,
    deliveries: RwLock<Vec<DeliveryAttempt>>,
    snapshots: RwLock<HashMap<Uuid, ProductSnapshot>>,
    checked_at: RwLock<HashMap<Uuid, DateTime<Utc>>>,
    delivery_log_retention: Duration,
    webhook_inactivity_ttl: Duration,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store with default retention windows
    /// (7 days of delivery attempts, 30 days of webhook inactivity).
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            counters: RwLock::new(HashMap::new()),
            webhooks: RwLock::new(HashMap::new()),
            deliveries: RwLock::new(Vec::new()),
            snapshots: RwLock::new(HashMap::new()),
            checked_at: RwLock::new(HashMap::new()),
            delivery_log_retention: Duration::from_secs(7 * 24 * 60 * 60),
            webhook_inactivity_ttl: Duration::from_secs(30 * 24 * 60 * 60),
        }
    }

    /// Override the retention windows.
    pub fn with_retention(
        mut self,
        delivery_log_retention: Duration,
        webhook_inactivity_ttl: Duration,
    ) -> Self {
        self.delivery_log_retention = delivery_log_retention;
        self.webhook_inactivity_ttl = webhook_inactivity_ttl;
        self
    }

    /// Number of stored jobs (including expired-but-unswept ones).
    pub fn job_count(&self) -> usize {
        self.jobs.read().unwrap().len()
    }

    /// Number of stored webhook registrations.
    pub fn webhook_count(&self) -> usize {
        self.webhooks.read().unwrap().len()
    }

    /// Drop everything past its retention window, as of `now`:
    /// terminal jobs past `expires_at`, expired counters, old delivery
    /// attempts, and registrations idle past the inactivity TTL.
    pub fn purge_expired(&self, now: DateTime<Utc>) {
        self.jobs
            .write()
            .unwrap()
            .retain(|_, job| job.expires_at.map_or(true, |at| at > now));

        self.counters
            .write()
            .unwrap()
            .retain(|_, entry| entry.expires_at > now);

        let delivery_cutoff =
            now - chrono::Duration::from_std(self.delivery_log_retention).unwrap_or_default();
        self.deliveries
            .write()
            .unwrap()
            .retain(|attempt| attempt.timestamp > delivery_cutoff);

        let inactivity_cutoff =
            now - chrono::Duration::from_std(self.webhook_inactivity_ttl).unwrap_or_default();
        self.webhooks
            .write()
            .unwrap()
            .retain(|_, reg| reg.last_event_at > inactivity_cutoff);
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn insert_job(&self, job: &BatchJob) -> StoreResult<()> {
        self.jobs.write().unwrap().insert(job.id, job.clone());
        Ok(())
    }

    async fn load_job(&self, id: Uuid) -> StoreResult<Option<BatchJob>> {
        let job = self.jobs.read().unwrap().get(&id).cloned();
        // Expired records read as absent even before a sweep runs.
        Ok(job.filter(|j| j.expires_at.map_or(true, |at| at > Utc::now())))
    }

    async fn update_job(&self, job: &BatchJob) -> StoreResult<()> {
        self.jobs.write().unwrap().insert(job.id, job.clone());
        Ok(())
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn increment(&self, key: &str, ttl: Duration) -> StoreResult<u64> {
        let now = Utc::now();
        let mut counters = self.counters.write().unwrap();

        let entry = counters.entry(key.to_string()).or_insert(CounterEntry {
            value: 0,
            expires_at: now + chrono::Duration::from_std(ttl).unwrap_or_default(),
        });

        if entry.expires_at <= now {
            entry.value = 0;
            entry.expires_at = now + chrono::Duration::from_std(ttl).unwrap_or_default();
        }

        entry.value += 1;
        Ok(entry.value)
    }

    async fn get(&self, key: &str) -> StoreResult<u64> {
        let counters = self.counters.read().unwrap();
        Ok(counters
            .get(key)
            .filter(|entry| entry.expires_at > Utc::now())
            .map_or(0, |entry| entry.value))
    }
}

#[async_trait]
impl WebhookStore for MemoryStore {
    async fn insert_webhook(&self, registration: &WebhookRegistration) -> StoreResult<()> {
        self.webhooks
            .write()
            .unwrap()
            .insert(registration.id, registration.clone());
        Ok(())
    }

    async fn load_webhook(&self, id: Uuid) -> StoreResult<Option<WebhookRegistration>> {
        Ok(self.webhooks.read().unwrap().get(&id).cloned())
    }

    async fn active_webhooks_for_tenant(
        &self,
        tenant_id: &str,
    ) -> StoreResult<Vec<WebhookRegistration>> {
        Ok(self
            .webhooks
            .read()
            .unwrap()
            .values()
            .filter(|reg| reg.tenant_id == tenant_id && reg.is_active())
            .cloned()
            .collect())
    }

    async fn set_webhook_status(&self, id: Uuid, status: WebhookStatus) -> StoreResult<()> {
        if let Some(reg) = self.webhooks.write().unwrap().get_mut(&id) {
            reg.status = status;
        }
        Ok(())
    }

    async fn delete_webhook(&self, id: Uuid) -> StoreResult<()> {
        self.webhooks.write().unwrap().remove(&id);
        Ok(())
    }

    async fn touch_webhook(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        if let Some(reg) = self.webhooks.write().unwrap().get_mut(&id) {
            reg.last_event_at = at;
        }
        Ok(())
    }
}

#[async_trait]
impl DeliveryLog for MemoryStore {
    async fn append_attempt(&self, attempt: &DeliveryAttempt) -> StoreResult<()> {
        self.deliveries.write().unwrap().push(attempt.clone());
        Ok(())
    }

    async fn attempts_for_webhook(&self, webhook_id: Uuid) -> StoreResult<Vec<DeliveryAttempt>> {
        Ok(self
            .deliveries
            .read()
            .unwrap()
            .iter()
            .filter(|a| a.webhook_id == webhook_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn load_snapshot(&self, monitor_id: Uuid) -> StoreResult<Option<ProductSnapshot>> {
        Ok(self.snapshots.read().unwrap().get(&monitor_id).cloned())
    }

    async fn store_snapshot(
        &self,
        monitor_id: Uuid,
        snapshot: &ProductSnapshot,
    ) -> StoreResult<()> {
        self.snapshots
            .write()
            .unwrap()
            .insert(monitor_id, snapshot.clone());
        Ok(())
    }

    async fn last_checked_at(&self, monitor_id: Uuid) -> StoreResult<Option<DateTime<Utc>>> {
        Ok(self.checked_at.read().unwrap().get(&monitor_id).copied())
    }

    async fn mark_checked(&self, monitor_id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        self.checked_at.write().unwrap().insert(monitor_id, at);
        Ok(())
    }
}
