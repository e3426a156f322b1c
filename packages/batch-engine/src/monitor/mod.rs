//! Periodic change detection for monitored products.
//!
//! An external scheduler decides when `check` runs; the diff-and-
//! trigger logic lives here. Checks are idempotent: re-running against
//! unchanged data produces zero triggers, and only the tracked fields
//! (price, availability, stock, rating) ever trigger.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::error::MonitorError;
use crate::traits::processor::ProductFetcher;
use crate::traits::store::SnapshotStore;
use crate::types::monitor::{ProductMonitor, TrackedField};
use crate::types::webhook::{
    EVENT_PRODUCT_BACK_IN_STOCK, EVENT_PRODUCT_PRICE_DROP, EVENT_PRODUCT_UPDATED,
};
use crate::webhooks::delivery::WebhookEngine;

/// What a single monitor check did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Checked too recently; nothing was fetched.
    Throttled,
    /// First observation; baseline stored, no triggers.
    Baseline,
    /// Snapshot identical to the stored one; no triggers.
    Unchanged,
    /// Tracked fields changed and tenant webhooks were triggered.
    Changed(Vec<TrackedField>),
}

/// Re-fetches monitored products and fires webhooks on change.
pub struct ChangeMonitor {
    snapshots: Arc<dyn SnapshotStore>,
    fetcher: Arc<dyn ProductFetcher>,
    webhooks: Arc<WebhookEngine>,
    /// Floor between re-checks of the same product.
    min_recheck_interval: Duration,
}

impl ChangeMonitor {
    /// Create a monitor runner.
    pub fn new(
        snapshots: Arc<dyn SnapshotStore>,
        fetcher: Arc<dyn ProductFetcher>,
        webhooks: Arc<WebhookEngine>,
        min_recheck_interval: Duration,
    ) -> Self {
        Self {
            snapshots,
            fetcher,
            webhooks,
            min_recheck_interval,
        }
    }

    /// Run one check of a monitored product.
    pub async fn check(&self, monitor: &ProductMonitor) -> Result<CheckOutcome, MonitorError> {
        let now = Utc::now();

        if let Some(last) = self.snapshots.last_checked_at(monitor.id).await? {
            let min_gap =
                chrono::Duration::from_std(self.min_recheck_interval).unwrap_or_default();
            if now - last < min_gap {
                debug!(monitor_id = %monitor.id, "check throttled");
                return Ok(CheckOutcome::Throttled);
            }
        }
        let current = self
            .fetcher
            .fetch(&monitor.product_url)
            .await
            .map_err(|e| MonitorError::Fetch {
                product_url: monitor.product_url.clone(),
                message: e.to_string(),
            })?;

        // Marked only after a successful fetch, so a transient fetch
        // error does not consume the whole recheck interval.
        self.snapshots.mark_checked(monitor.id, now).await?;

        let Some(previous) = self.snapshots.load_snapshot(monitor.id).await? else {
            self.snapshots.store_snapshot(monitor.id, &current).await?;
            debug!(monitor_id = %monitor.id, "baseline snapshot stored");
            return Ok(CheckOutcome::Baseline);
        };

        let changed = current.diff(&previous);
        if changed.is_empty() {
            return Ok(CheckOutcome::Unchanged);
        }

        self.snapshots.store_snapshot(monitor.id, &current).await?;

        let payload = json!({
            "monitor_id": monitor.id,
            "product_url": monitor.product_url,
            "changed_fields": changed.iter().map(|f| f.as_str()).collect::<Vec<_>>(),
            "previous": previous,
            "current": current,
        });

        // Delivery problems never fail the check; they surface through
        // the delivery log.
        self.trigger(monitor, EVENT_PRODUCT_UPDATED, &payload).await;
        if current.price_dropped_from(&previous) {
            self.trigger(monitor, EVENT_PRODUCT_PRICE_DROP, &payload).await;
        }
        if current.restocked_from(&previous) {
            self.trigger(monitor, EVENT_PRODUCT_BACK_IN_STOCK, &payload)
                .await;
        }

        info!(
            monitor_id = %monitor.id,
            product_url = %monitor.product_url,
            fields = ?changed,
            "product change detected"
        );
        Ok(CheckOutcome::Changed(changed))
    }

    async fn trigger(&self, monitor: &ProductMonitor, event: &str, payload: &serde_json::Value) {
        if let Err(e) = self
            .webhooks
            .trigger_for_tenant(&monitor.tenant_id, event, payload.clone())
            .await
        {
            warn!(monitor_id = %monitor.id, event, error = %e, "change trigger failed");
        }
    }
}
