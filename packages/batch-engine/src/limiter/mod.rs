//! Per-tenant, multi-window admission control.
//!
//! Three fixed wall-clock windows (minute, hour, day) are kept per
//! tenant, bucketed by window index (`floor(now / window)`). This is
//! not a true sliding window: a burst straddling a window boundary can
//! admit up to 2x the nominal rate over a short interval. Accepted
//! trade-off for counter simplicity.
//!
//! Ordering is increment-then-check (fail-closed): the counter is
//! bumped before the ceiling is evaluated, so a rejected request still
//! consumes a slot. This is a deliberate choice matching the source
//! system; it closes the race where two concurrent requests both pass
//! a check-then-increment boundary.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::StoreResult;
use crate::traits::store::CounterStore;
use crate::types::tier::Tier;

const MINUTE_SECS: i64 = 60;
const HOUR_SECS: i64 = 60 * 60;
const DAY_SECS: i64 = 24 * 60 * 60;

/// Rate-limit metadata for the finest-grained (minute) window,
/// surfaced by the transport layer as response headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitInfo {
    /// Minute ceiling; `None` for unbounded tiers.
    pub limit: Option<u64>,
    /// `max(0, limit - used)`; `None` for unbounded tiers.
    pub remaining: Option<u64>,
    /// Epoch second at which the minute window resets.
    pub reset_at_epoch_seconds: i64,
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmitDecision {
    Allow(RateLimitInfo),
    Reject {
        /// Seconds until the violated window rolls over; machine
        /// actionable for a 429 `Retry-After` header.
        retry_after_seconds: u64,
        info: RateLimitInfo,
    },
}

impl AdmitDecision {
    /// Whether the request was admitted.
    pub fn is_allowed(&self) -> bool {
        matches!(self, AdmitDecision::Allow(_))
    }

    /// The minute-window metadata regardless of outcome.
    pub fn info(&self) -> RateLimitInfo {
        match self {
            AdmitDecision::Allow(info) => *info,
            AdmitDecision::Reject { info, .. } => *info,
        }
    }
}

struct Window {
    label: &'static str,
    seconds: i64,
}

const WINDOWS: [Window; 3] = [
    Window { label: "minute", seconds: MINUTE_SECS },
    Window { label: "hour", seconds: HOUR_SECS },
    Window { label: "day", seconds: DAY_SECS },
];

/// Admission controller guarding the API boundary.
///
/// Counter state lives behind the injected [`CounterStore`], so the
/// limiter runs unchanged against the in-memory store or a shared
/// distributed one.
pub struct RateLimiter {
    counters: Arc<dyn CounterStore>,
}

impl RateLimiter {
    /// Create a limiter over a counter store.
    pub fn new(counters: Arc<dyn CounterStore>) -> Self {
        Self { counters }
    }

    /// Admit or reject a request for the tenant at its tier.
    pub async fn admit(&self, tenant_id: &str, tier: Tier) -> StoreResult<AdmitDecision> {
        self.admit_at(tenant_id, tier, Utc::now()).await
    }

    /// Admission check against an explicit clock reading. Exists so
    /// window behavior is deterministic under test; production callers
    /// use [`RateLimiter::admit`].
    pub async fn admit_at(
        &self,
        tenant_id: &str,
        tier: Tier,
        now: DateTime<Utc>,
    ) -> StoreResult<AdmitDecision> {
        let minute_reset = window_reset(now, MINUTE_SECS);

        let Some(ceilings) = tier.ceilings() else {
            return Ok(AdmitDecision::Allow(RateLimitInfo {
                limit: None,
                remaining: None,
                reset_at_epoch_seconds: minute_reset,
            }));
        };

        let limits = [ceilings.per_minute, ceilings.per_hour, ceilings.per_day];
        let mut minute_used = 0;

        for (window, limit) in WINDOWS.iter().zip(limits) {
            let index = now.timestamp().div_euclid(window.seconds);
            let key = format!("ratelimit:{tenant_id}:{}:{index}", window.label);
            let ttl = Duration::from_secs(window.seconds as u64);

            let used = self.counters.increment(&key, ttl).await?;
            if window.seconds == MINUTE_SECS {
                minute_used = used;
            }

            // First violation rejects and short-circuits: coarser
            // windows are not charged for a rejected request.
            if used > limit {
                let retry_after = (window_reset(now, window.seconds) - now.timestamp()).max(1);
                debug!(
                    tenant_id,
                    window = window.label,
                    used,
                    limit,
                    "request rejected by rate limiter"
                );
                return Ok(AdmitDecision::Reject {
                    retry_after_seconds: retry_after as u64,
                    info: RateLimitInfo {
                        limit: Some(ceilings.per_minute),
                        remaining: Some(ceilings.per_minute.saturating_sub(minute_used)),
                        reset_at_epoch_seconds: minute_reset,
                    },
                });
            }
        }

        Ok(AdmitDecision::Allow(RateLimitInfo {
            limit: Some(ceilings.per_minute),
            remaining: Some(ceilings.per_minute.saturating_sub(minute_used)),
            reset_at_epoch_seconds: minute_reset,
        }))
    }
}

/// Epoch second at which the current fixed window rolls over.
fn window_reset(now: DateTime<Utc>, window_secs: i64) -> i64 {
    (now.timestamp().div_euclid(window_secs) + 1) * window_secs
}
