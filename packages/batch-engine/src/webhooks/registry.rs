//! Webhook registration with SSRF-guarded URL validation.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use url::{Host, Url};
use uuid::Uuid;

use crate::error::{UrlValidationError, WebhookError, WebhookResult};
use crate::traits::store::WebhookStore;
use crate::types::webhook::{RetryPolicy, WebhookRegistration, WebhookStatus};

/// Creates, revokes, and removes webhook registrations.
pub struct WebhookRegistry {
    store: Arc<dyn WebhookStore>,
    /// Permits localhost targets. Must stay off in production: a
    /// webhook pointed at loopback is a trivial SSRF vector.
    dev_mode: bool,
}

impl WebhookRegistry {
    /// Create a registry over a webhook store.
    pub fn new(store: Arc<dyn WebhookStore>, dev_mode: bool) -> Self {
        Self { store, dev_mode }
    }

    /// Register an endpoint for a tenant. The URL is validated before
    /// anything is persisted.
    pub async fn register(
        &self,
        tenant_id: &str,
        url: &str,
        secret: Option<String>,
        subscribed_events: HashSet<String>,
        retry_policy: RetryPolicy,
    ) -> WebhookResult<Uuid> {
        validate_url(url, self.dev_mode)?;

        let registration = WebhookRegistration {
            id: Uuid::new_v4(),
            tenant_id: tenant_id.to_string(),
            url: url.to_string(),
            secret,
            subscribed_events,
            retry_policy,
            status: WebhookStatus::Active,
            created_at: Utc::now(),
            last_event_at: Utc::now(),
        };

        self.store.insert_webhook(&registration).await?;
        info!(webhook_id = %registration.id, tenant_id, url, "webhook registered");
        Ok(registration.id)
    }

    /// Revoke a registration; the record stays for auditing until the
    /// inactivity TTL removes it.
    pub async fn revoke(&self, webhook_id: Uuid) -> WebhookResult<()> {
        self.require(webhook_id).await?;
        self.store
            .set_webhook_status(webhook_id, WebhookStatus::Revoked)
            .await?;
        info!(webhook_id = %webhook_id, "webhook revoked");
        Ok(())
    }

    /// Remove a registration entirely.
    pub async fn unregister(&self, webhook_id: Uuid) -> WebhookResult<()> {
        self.require(webhook_id).await?;
        self.store.delete_webhook(webhook_id).await?;
        info!(webhook_id = %webhook_id, "webhook unregistered");
        Ok(())
    }

    /// Load a registration or fail with `NotFound`.
    async fn require(&self, webhook_id: Uuid) -> WebhookResult<WebhookRegistration> {
        self.store
            .load_webhook(webhook_id)
            .await?
            .ok_or(WebhookError::NotFound {
                webhook_id: webhook_id.to_string(),
            })
    }
}

/// Validate a webhook target URL.
///
/// Only `http` and `https` schemes are accepted, and loopback hosts
/// are rejected unless `dev_mode` is on.
pub fn validate_url(raw: &str, dev_mode: bool) -> Result<(), UrlValidationError> {
    let url = Url::parse(raw)?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(UrlValidationError::DisallowedScheme(other.to_string())),
    }

    let host = url.host().ok_or(UrlValidationError::NoHost)?;
    if dev_mode {
        return Ok(());
    }

    let blocked = match &host {
        Host::Domain(domain) => domain.eq_ignore_ascii_case("localhost"),
        Host::Ipv4(ip) => ip.is_loopback(),
        Host::Ipv6(ip) => ip.is_loopback(),
    };
    if blocked {
        return Err(UrlValidationError::BlockedHost(host.to_string()));
    }

    Ok(())
}
