//! Top-level wiring of the engine's components.
//!
//! The transport layer (HTTP handlers, CLI) is an external
//! collaborator; it translates requests into calls on [`BatchEngine`]
//! and renders the typed results.

use std::collections::HashSet;
use std::sync::Arc;

use uuid::Uuid;

use crate::error::{MonitorError, Result, StoreResult, WebhookResult};
use crate::jobs::orchestrator::BatchOrchestrator;
use crate::limiter::{AdmitDecision, RateLimiter};
use crate::monitor::{ChangeMonitor, CheckOutcome};
use crate::traits::processor::{ItemProcessor, ProductFetcher};
use crate::traits::store::{CounterStore, DeliveryLog, JobStore, SnapshotStore, WebhookStore};
use crate::traits::transport::{HttpTransport, WebhookTransport};
use crate::types::{
    config::{EngineConfig, JobOptions},
    job::JobSnapshot,
    monitor::ProductMonitor,
    tier::Tier,
    webhook::{DeliveryOutcome, RetryPolicy, TriggerOutcome},
};
use crate::webhooks::{WebhookEngine, WebhookRegistry};

/// The batch orchestration and notification engine.
///
/// Owns the orchestrator, rate limiter, webhook registry/delivery, and
/// change monitor, wired over injected stores and collaborators.
pub struct BatchEngine {
    orchestrator: BatchOrchestrator,
    limiter: RateLimiter,
    registry: WebhookRegistry,
    webhooks: Arc<WebhookEngine>,
    monitor: ChangeMonitor,
}

impl BatchEngine {
    /// Wire an engine over a combined store (any type implementing all
    /// of the storage traits, such as [`crate::stores::MemoryStore`]),
    /// an item processor, a product fetcher, and a webhook transport.
    pub fn new<S>(
        store: Arc<S>,
        processor: Arc<dyn ItemProcessor>,
        fetcher: Arc<dyn ProductFetcher>,
        transport: Arc<dyn WebhookTransport>,
        config: EngineConfig,
    ) -> Self
    where
        S: JobStore + CounterStore + WebhookStore + DeliveryLog + SnapshotStore + 'static,
    {
        let webhooks = Arc::new(WebhookEngine::new(
            store.clone(),
            store.clone(),
            transport,
        ));
        let orchestrator = BatchOrchestrator::new(store.clone(), processor, config.clone())
            .with_webhooks(webhooks.clone());
        let limiter = RateLimiter::new(store.clone());
        let registry = WebhookRegistry::new(store.clone(), config.dev_mode);
        let monitor = ChangeMonitor::new(
            store,
            fetcher,
            webhooks.clone(),
            config.min_recheck_interval,
        );

        Self {
            orchestrator,
            limiter,
            registry,
            webhooks,
            monitor,
        }
    }

    /// Wire an engine with the reqwest-backed transport, using the
    /// configured per-attempt delivery timeout.
    pub fn with_http_transport<S>(
        store: Arc<S>,
        processor: Arc<dyn ItemProcessor>,
        fetcher: Arc<dyn ProductFetcher>,
        config: EngineConfig,
    ) -> Self
    where
        S: JobStore + CounterStore + WebhookStore + DeliveryLog + SnapshotStore + 'static,
    {
        let transport = Arc::new(HttpTransport::new(config.delivery_timeout));
        Self::new(store, processor, fetcher, transport, config)
    }

    /// Enqueue a batch job; returns without waiting for processing.
    pub async fn submit(
        &self,
        tenant_id: &str,
        items: Vec<String>,
        options: JobOptions,
    ) -> Result<Uuid> {
        self.orchestrator.submit(tenant_id, items, options).await
    }

    /// Poll a job's progress.
    pub async fn get_status(&self, job_id: Uuid) -> Result<JobSnapshot> {
        self.orchestrator.get_status(job_id).await
    }

    /// Resubmit a terminal job's failed items as a new job.
    pub async fn retry_failed(&self, job_id: Uuid) -> Result<Uuid> {
        self.orchestrator.retry_failed(job_id).await
    }

    /// Admission check; the transport layer runs this before every
    /// mutating request and surfaces rejections as 429s.
    pub async fn admit(&self, tenant_id: &str, tier: Tier) -> StoreResult<AdmitDecision> {
        self.limiter.admit(tenant_id, tier).await
    }

    /// Subscribe a tenant endpoint to events.
    pub async fn register_webhook(
        &self,
        tenant_id: &str,
        url: &str,
        secret: Option<String>,
        subscribed_events: HashSet<String>,
        retry_policy: RetryPolicy,
    ) -> WebhookResult<Uuid> {
        self.registry
            .register(tenant_id, url, secret, subscribed_events, retry_policy)
            .await
    }

    /// Revoke a webhook registration.
    pub async fn revoke_webhook(&self, webhook_id: Uuid) -> WebhookResult<()> {
        self.registry.revoke(webhook_id).await
    }

    /// Remove a webhook registration.
    pub async fn unregister_webhook(&self, webhook_id: Uuid) -> WebhookResult<()> {
        self.registry.unregister(webhook_id).await
    }

    /// Deliver one event to one registration. Internal surface: called
    /// by the orchestrator and monitor, not by clients.
    pub async fn deliver(
        &self,
        webhook_id: Uuid,
        event: &str,
        payload: serde_json::Value,
    ) -> WebhookResult<DeliveryOutcome> {
        self.webhooks.deliver(webhook_id, event, payload).await
    }

    /// Fan an event out to every active registration of a tenant.
    pub async fn trigger_for_tenant(
        &self,
        tenant_id: &str,
        event: &str,
        payload: serde_json::Value,
    ) -> WebhookResult<TriggerOutcome> {
        self.webhooks
            .trigger_for_tenant(tenant_id, event, payload)
            .await
    }

    /// Run one change-detection pass for a monitored product.
    pub async fn check_monitor(
        &self,
        monitor: &ProductMonitor,
    ) -> std::result::Result<CheckOutcome, MonitorError> {
        self.monitor.check(monitor).await
    }

    /// Cancel the root token threaded through item processing.
    pub fn shutdown(&self) {
        self.orchestrator.shutdown_token().cancel();
    }
}
