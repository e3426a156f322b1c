//! Webhook delivery engine with bounded retries and linear backoff.

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{WebhookError, WebhookResult};
use crate::traits::store::{DeliveryLog, WebhookStore};
use crate::traits::transport::{WebhookTransport, EVENT_HEADER, SIGNATURE_HEADER};
use crate::types::webhook::{
    DeliveryAttempt, DeliveryOutcome, EventEnvelope, TriggerOutcome, WebhookRegistration,
};
use crate::webhooks::signature;

/// Signs and delivers event notifications with retry and backoff.
///
/// Delivery failures never propagate to job callers; they surface only
/// through the delivery log.
pub struct WebhookEngine {
    store: Arc<dyn WebhookStore>,
    log: Arc<dyn DeliveryLog>,
    transport: Arc<dyn WebhookTransport>,
}

impl WebhookEngine {
    /// Create a delivery engine.
    pub fn new(
        store: Arc<dyn WebhookStore>,
        log: Arc<dyn DeliveryLog>,
        transport: Arc<dyn WebhookTransport>,
    ) -> Self {
        Self {
            store,
            log,
            transport,
        }
    }

    /// Deliver one event to one registration.
    ///
    /// No-ops (`success = false`, zero attempts) when the registration
    /// is revoked or not subscribed to the event.
    pub async fn deliver(
        &self,
        webhook_id: Uuid,
        event: &str,
        payload: serde_json::Value,
    ) -> WebhookResult<DeliveryOutcome> {
        let registration = self
            .store
            .load_webhook(webhook_id)
            .await?
            .ok_or(WebhookError::NotFound {
                webhook_id: webhook_id.to_string(),
            })?;

        if !registration.is_active() || !registration.subscribes_to(event) {
            debug!(webhook_id = %webhook_id, event, "delivery skipped");
            return Ok(DeliveryOutcome::skipped());
        }

        self.deliver_to(&registration, event, payload).await
    }

    /// Fan `deliver` out across every active registration of a tenant
    /// subscribed to the event, concurrently. A tenant with zero
    /// webhooks is a no-op success.
    pub async fn trigger_for_tenant(
        &self,
        tenant_id: &str,
        event: &str,
        payload: serde_json::Value,
    ) -> WebhookResult<TriggerOutcome> {
        let registrations: Vec<_> = self
            .store
            .active_webhooks_for_tenant(tenant_id)
            .await?
            .into_iter()
            .filter(|reg| reg.subscribes_to(event))
            .collect();

        if registrations.is_empty() {
            return Ok(TriggerOutcome::default());
        }

        let deliveries = registrations
            .iter()
            .map(|reg| self.deliver_to(reg, event, payload.clone()));
        let results = join_all(deliveries).await;

        let mut outcome = TriggerOutcome::default();
        for result in results {
            match result {
                Ok(DeliveryOutcome { success: true, .. }) => outcome.delivered += 1,
                Ok(_) => outcome.failed += 1,
                Err(e) => {
                    warn!(tenant_id, event, error = %e, "delivery errored");
                    outcome.failed += 1;
                }
            }
        }

        info!(
            tenant_id,
            event,
            delivered = outcome.delivered,
            failed = outcome.failed,
            "tenant fan-out complete"
        );
        Ok(outcome)
    }

    /// The delivery loop for one registration: build and sign the
    /// envelope once, then attempt up to `max_retries` posts with
    /// linear backoff, logging every attempt.
    async fn deliver_to(
        &self,
        registration: &WebhookRegistration,
        event: &str,
        payload: serde_json::Value,
    ) -> WebhookResult<DeliveryOutcome> {
        let envelope = EventEnvelope {
            event: event.to_string(),
            timestamp: Utc::now(),
            data: payload,
        };
        let body = serde_json::to_vec(&envelope)?;

        let mut headers = vec![(EVENT_HEADER, event.to_string())];
        if let Some(secret) = &registration.secret {
            headers.push((SIGNATURE_HEADER, signature::sign(secret, &body)));
        }

        let policy = registration.retry_policy;
        let mut attempts = 0u32;
        let mut last_error: Option<String> = None;

        while attempts < policy.max_retries {
            attempts += 1;

            let result = self.transport.post(&registration.url, &headers, &body).await;
            let (success, http_status) = match &result {
                Ok(status) if (200..300).contains(&(*status as u32)) => (true, Some(*status)),
                Ok(status) => (false, Some(*status)),
                Err(_) => (false, None),
            };

            self.log
                .append_attempt(&DeliveryAttempt {
                    webhook_id: registration.id,
                    event: event.to_string(),
                    attempt_number: attempts,
                    success,
                    http_status,
                    timestamp: Utc::now(),
                })
                .await?;

            if success {
                self.store.touch_webhook(registration.id, Utc::now()).await?;
                debug!(webhook_id = %registration.id, event, attempts, "delivered");
                return Ok(DeliveryOutcome {
                    success: true,
                    attempts,
                });
            }

            last_error = Some(match result {
                Ok(status) => format!("endpoint returned status {status}"),
                Err(e) => e.to_string(),
            });

            if attempts < policy.max_retries {
                tokio::time::sleep(policy.backoff_after(attempts)).await;
            }
        }

        self.store.touch_webhook(registration.id, Utc::now()).await?;
        warn!(
            webhook_id = %registration.id,
            event,
            attempts,
            error = last_error.as_deref().unwrap_or("unknown"),
            "delivery exhausted retries"
        );
        Ok(DeliveryOutcome {
            success: false,
            attempts,
        })
    }
}
