//! Webhook registration, event envelope, and delivery bookkeeping types.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event emitted when a batch job reaches `Completed`.
pub const EVENT_BATCH_COMPLETED: &str = "batch.completed";
/// Event emitted when a batch job reaches `Partial`.
pub const EVENT_BATCH_PARTIAL: &str = "batch.partial";
/// Event emitted when a batch job reaches `Failed`.
pub const EVENT_BATCH_FAILED: &str = "batch.failed";
/// Event emitted when any tracked field of a monitored product changed.
pub const EVENT_PRODUCT_UPDATED: &str = "product.updated";
/// Event emitted when a monitored product's price decreased.
pub const EVENT_PRODUCT_PRICE_DROP: &str = "product.price_drop";
/// Event emitted when a monitored product came back in stock.
pub const EVENT_PRODUCT_BACK_IN_STOCK: &str = "product.back_in_stock";

/// Wildcard subscription matching every event.
pub const EVENT_WILDCARD: &str = "*";

/// Registration lifecycle. Only `status` mutates after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WebhookStatus {
    #[default]
    Active,
    Revoked,
}

/// Retry behavior for a registration's deliveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total delivery attempts (not retries after the first).
    pub max_retries: u32,
    /// Backoff base; attempt N waits `base_delay * N` before the next
    /// attempt (linear backoff).
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
        }
    }
}

impl RetryPolicy {
    /// Backoff to apply after the given 1-based attempt number.
    pub fn backoff_after(&self, attempt_number: u32) -> Duration {
        Duration::from_millis(self.base_delay_ms * u64::from(attempt_number))
    }
}

/// A tenant's webhook endpoint subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookRegistration {
    pub id: Uuid,
    pub tenant_id: String,
    pub url: String,
    /// When present, deliveries carry an HMAC-SHA256 signature over the
    /// serialized envelope.
    pub secret: Option<String>,
    /// Event names, or the `*` wildcard.
    pub subscribed_events: HashSet<String>,
    pub retry_policy: RetryPolicy,
    pub status: WebhookStatus,
    pub created_at: DateTime<Utc>,
    /// Updated on every delivery; drives the 30-day inactivity expiry.
    pub last_event_at: DateTime<Utc>,
}

impl WebhookRegistration {
    /// Whether this registration should receive the given event.
    pub fn subscribes_to(&self, event: &str) -> bool {
        self.subscribed_events.contains(EVENT_WILDCARD) || self.subscribed_events.contains(event)
    }

    /// Whether the registration is live.
    pub fn is_active(&self) -> bool {
        self.status == WebhookStatus::Active
    }
}

/// The payload shape posted to webhook endpoints.
///
/// Field order is part of the signing contract: the signature is
/// computed over this exact serialization, so receivers must verify
/// against the raw request body, not a re-serialized copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event: String,
    pub timestamp: DateTime<Utc>,
    pub data: serde_json::Value,
}

/// Record of one delivery attempt. Ephemeral: retained for 7 days in
/// the delivery log, never persisted beyond that.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryAttempt {
    pub webhook_id: Uuid,
    pub event: String,
    /// 1-based attempt counter.
    pub attempt_number: u32,
    pub success: bool,
    pub http_status: Option<u16>,
    pub timestamp: DateTime<Utc>,
}

/// Outcome of delivering one event to one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub success: bool,
    /// Attempts actually made; zero when the registration was revoked
    /// or not subscribed to the event.
    pub attempts: u32,
}

impl DeliveryOutcome {
    /// Outcome for a delivery that never left the engine.
    pub fn skipped() -> Self {
        Self {
            success: false,
            attempts: 0,
        }
    }
}

/// Aggregate of a tenant-wide fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TriggerOutcome {
    pub delivered: usize,
    pub failed: usize,
}
