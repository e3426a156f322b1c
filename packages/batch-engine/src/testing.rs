//! Testing utilities including mock implementations.
//!
//! These are useful for testing applications that use the engine
//! without real scraping, generation, or network calls.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{DeliveryError, StoreError, StoreResult};
use crate::stores::MemoryStore;
use crate::traits::processor::{ItemProcessor, ProductFetcher};
use crate::traits::store::{CounterStore, DeliveryLog, JobStore, SnapshotStore, WebhookStore};
use crate::traits::transport::{WebhookTransport, EVENT_HEADER};
use crate::types::job::BatchJob;
use crate::types::monitor::ProductSnapshot;
use crate::types::webhook::{DeliveryAttempt, WebhookRegistration, WebhookStatus};

/// A mock item processor with scripted failures and call tracking.
///
/// Records every processed item and the high-water mark of concurrent
/// in-flight calls, so tests can assert the semaphore bound.
#[derive(Default)]
pub struct MockProcessor {
    /// Items that fail on every attempt.
    failing: RwLock<HashSet<String>>,
    /// Items that fail only on their first attempt.
    failing_once: RwLock<HashSet<String>>,
    /// Artificial per-item latency.
    delay: Option<Duration>,
    attempts: RwLock<HashMap<String, u32>>,
    calls: RwLock<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockProcessor {
    /// Create a processor where every item succeeds instantly.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add artificial latency to every item call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Make the given items fail on every attempt.
    pub fn failing_on(self, items: &[String]) -> Self {
        self.failing.write().unwrap().extend(items.iter().cloned());
        self
    }

    /// Make the given items fail on their first attempt only, so a
    /// retry pass recovers them.
    pub fn failing_once_on(self, items: &[String]) -> Self {
        self.failing_once
            .write()
            .unwrap()
            .extend(items.iter().cloned());
        self
    }

    /// Total item calls made.
    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }

    /// Every item processed, in completion order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }

    /// Highest number of simultaneously in-flight calls observed.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ItemProcessor for MockProcessor {
    async fn process(
        &self,
        item: &str,
        _cancel: &CancellationToken,
    ) -> std::result::Result<serde_json::Value, Box<dyn std::error::Error + Send + Sync>> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let attempt = {
            let mut attempts = self.attempts.write().unwrap();
            let entry = attempts.entry(item.to_string()).or_insert(0);
            *entry += 1;
            *entry
        };
        self.calls.write().unwrap().push(item.to_string());
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.read().unwrap().contains(item) {
            return Err(format!("simulated failure: {item}").into());
        }
        if attempt == 1 && self.failing_once.read().unwrap().contains(item) {
            return Err(format!("transient failure: {item}").into());
        }

        Ok(json!({ "item": item, "template_id": format!("tpl-{attempt}") }))
    }
}

/// One request recorded by [`MockTransport`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

enum TransportScript {
    Always(u16),
    Sequence(Vec<u16>),
    FailForUrl(String),
}

/// A mock webhook transport with scripted HTTP statuses.
pub struct MockTransport {
    script: TransportScript,
    requests: RwLock<Vec<RecordedRequest>>,
    cursor: AtomicUsize,
}

impl MockTransport {
    /// Every post returns 200.
    pub fn succeeding() -> Self {
        Self::always(200)
    }

    /// Every post returns the given status.
    pub fn failing(status: u16) -> Self {
        Self::always(status)
    }

    fn always(status: u16) -> Self {
        Self {
            script: TransportScript::Always(status),
            requests: RwLock::new(Vec::new()),
            cursor: AtomicUsize::new(0),
        }
    }

    /// Posts return the scripted statuses in order; the last one
    /// repeats once the script is exhausted.
    pub fn with_statuses(statuses: Vec<u16>) -> Self {
        Self {
            script: TransportScript::Sequence(statuses),
            requests: RwLock::new(Vec::new()),
            cursor: AtomicUsize::new(0),
        }
    }

    /// Posts to the given URL return 500; everything else 200.
    pub fn failing_for_url(url: impl Into<String>) -> Self {
        Self {
            script: TransportScript::FailForUrl(url.into()),
            requests: RwLock::new(Vec::new()),
            cursor: AtomicUsize::new(0),
        }
    }

    /// Number of posts made.
    pub fn request_count(&self) -> usize {
        self.requests.read().unwrap().len()
    }

    /// Every recorded post.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.read().unwrap().clone()
    }

    /// The event header value of every post, in order.
    pub fn event_headers(&self) -> Vec<String> {
        self.requests
            .read()
            .unwrap()
            .iter()
            .filter_map(|r| {
                r.headers
                    .iter()
                    .find(|(name, _)| name == EVENT_HEADER)
                    .map(|(_, value)| value.clone())
            })
            .collect()
    }
}

#[async_trait]
impl WebhookTransport for MockTransport {
    async fn post(
        &self,
        url: &str,
        headers: &[(&str, String)],
        body: &[u8],
    ) -> std::result::Result<u16, DeliveryError> {
        self.requests.write().unwrap().push(RecordedRequest {
            url: url.to_string(),
            headers: headers
                .iter()
                .map(|(name, value)| (name.to_string(), value.clone()))
                .collect(),
            body: body.to_vec(),
        });

        let status = match &self.script {
            TransportScript::Always(status) => *status,
            TransportScript::Sequence(statuses) => {
                let index = self.cursor.fetch_add(1, Ordering::SeqCst);
                *statuses
                    .get(index)
                    .or_else(|| statuses.last())
                    .unwrap_or(&200)
            }
            TransportScript::FailForUrl(bad_url) => {
                if url == bad_url {
                    500
                } else {
                    200
                }
            }
        };
        Ok(status)
    }
}

/// A [`MemoryStore`] wrapper that fails `update_job` on scripted call
/// numbers, for exercising the store-fault path of a running job.
pub struct FailingStore {
    inner: MemoryStore,
    failing_update_calls: HashSet<usize>,
    update_calls: AtomicUsize,
}

impl FailingStore {
    /// Fail `update_job` on the given 1-based call numbers; every
    /// other operation delegates to a fresh in-memory store.
    pub fn failing_update_calls(calls: &[usize]) -> Self {
        Self {
            inner: MemoryStore::new(),
            failing_update_calls: calls.iter().copied().collect(),
            update_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl JobStore for FailingStore {
    async fn insert_job(&self, job: &BatchJob) -> StoreResult<()> {
        self.inner.insert_job(job).await
    }

    async fn load_job(&self, id: Uuid) -> StoreResult<Option<BatchJob>> {
        self.inner.load_job(id).await
    }

    async fn update_job(&self, job: &BatchJob) -> StoreResult<()> {
        let call = self.update_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.failing_update_calls.contains(&call) {
            return Err(StoreError::Backend("simulated write failure".into()));
        }
        self.inner.update_job(job).await
    }
}

#[async_trait]
impl CounterStore for FailingStore {
    async fn increment(&self, key: &str, ttl: Duration) -> StoreResult<u64> {
        self.inner.increment(key, ttl).await
    }

    async fn get(&self, key: &str) -> StoreResult<u64> {
        self.inner.get(key).await
    }
}

#[async_trait]
impl WebhookStore for FailingStore {
    async fn insert_webhook(&self, registration: &WebhookRegistration) -> StoreResult<()> {
        self.inner.insert_webhook(registration).await
    }

    async fn load_webhook(&self, id: Uuid) -> StoreResult<Option<WebhookRegistration>> {
        self.inner.load_webhook(id).await
    }

    async fn active_webhooks_for_tenant(
        &self,
        tenant_id: &str,
    ) -> StoreResult<Vec<WebhookRegistration>> {
        self.inner.active_webhooks_for_tenant(tenant_id).await
    }

    async fn set_webhook_status(&self, id: Uuid, status: WebhookStatus) -> StoreResult<()> {
        self.inner.set_webhook_status(id, status).await
    }

    async fn delete_webhook(&self, id: Uuid) -> StoreResult<()> {
        self.inner.delete_webhook(id).await
    }

    async fn touch_webhook(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        self.inner.touch_webhook(id, at).await
    }
}

#[async_trait]
impl DeliveryLog for FailingStore {
    async fn append_attempt(&self, attempt: &DeliveryAttempt) -> StoreResult<()> {
        self.inner.append_attempt(attempt).await
    }

    async fn attempts_for_webhook(&self, webhook_id: Uuid) -> StoreResult<Vec<DeliveryAttempt>> {
        self.inner.attempts_for_webhook(webhook_id).await
    }
}

#[async_trait]
impl SnapshotStore for FailingStore {
    async fn load_snapshot(&self, monitor_id: Uuid) -> StoreResult<Option<ProductSnapshot>> {
        self.inner.load_snapshot(monitor_id).await
    }

    async fn store_snapshot(
        &self,
        monitor_id: Uuid,
        snapshot: &ProductSnapshot,
    ) -> StoreResult<()> {
        self.inner.store_snapshot(monitor_id, snapshot).await
    }

    async fn last_checked_at(&self, monitor_id: Uuid) -> StoreResult<Option<DateTime<Utc>>> {
        self.inner.last_checked_at(monitor_id).await
    }

    async fn mark_checked(&self, monitor_id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        self.inner.mark_checked(monitor_id, at).await
    }
}

enum FetchScript {
    Fixed(ProductSnapshot),
    Sequence(Vec<ProductSnapshot>),
    Failing(String),
    Outcomes(Vec<Result<ProductSnapshot, String>>),
}

/// A mock product fetcher with scripted snapshots.
pub struct MockFetcher {
    script: FetchScript,
    cursor: AtomicUsize,
}

impl MockFetcher {
    /// Every fetch returns the same snapshot.
    pub fn returning(snapshot: ProductSnapshot) -> Self {
        Self {
            script: FetchScript::Fixed(snapshot),
            cursor: AtomicUsize::new(0),
        }
    }

    /// Fetches return the scripted snapshots in order; the last one
    /// repeats once the script is exhausted.
    pub fn sequence(snapshots: Vec<ProductSnapshot>) -> Self {
        Self {
            script: FetchScript::Sequence(snapshots),
            cursor: AtomicUsize::new(0),
        }
    }

    /// Every fetch fails with the given message.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            script: FetchScript::Failing(message.into()),
            cursor: AtomicUsize::new(0),
        }
    }

    /// Fetches return the scripted outcomes in order, mixing failures
    /// and snapshots; the last one repeats once exhausted.
    pub fn outcomes(outcomes: Vec<Result<ProductSnapshot, String>>) -> Self {
        Self {
            script: FetchScript::Outcomes(outcomes),
            cursor: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ProductFetcher for MockFetcher {
    async fn fetch(
        &self,
        _product_url: &str,
    ) -> std::result::Result<ProductSnapshot, Box<dyn std::error::Error + Send + Sync>> {
        match &self.script {
            FetchScript::Fixed(snapshot) => Ok(snapshot.clone()),
            FetchScript::Sequence(snapshots) => {
                let index = self.cursor.fetch_add(1, Ordering::SeqCst);
                Ok(snapshots
                    .get(index)
                    .or_else(|| snapshots.last())
                    .cloned()
                    .unwrap_or_default())
            }
            FetchScript::Failing(message) => Err(message.clone().into()),
            FetchScript::Outcomes(outcomes) => {
                let index = self.cursor.fetch_add(1, Ordering::SeqCst);
                match outcomes.get(index).or_else(|| outcomes.last()) {
                    Some(Ok(snapshot)) => Ok(snapshot.clone()),
                    Some(Err(message)) => Err(message.clone().into()),
                    None => Ok(ProductSnapshot::default()),
                }
            }
        }
    }
}
