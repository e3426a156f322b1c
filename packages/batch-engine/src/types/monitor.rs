//! Product monitoring types: snapshots and tracked-field diffs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A monitored product belonging to one tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductMonitor {
    pub id: Uuid,
    pub tenant_id: String,
    pub product_url: String,
    pub created_at: DateTime<Utc>,
}

impl ProductMonitor {
    /// Create a monitor for a product URL.
    pub fn new(tenant_id: impl Into<String>, product_url: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id: tenant_id.into(),
            product_url: product_url.into(),
            created_at: Utc::now(),
        }
    }
}

/// The fields the monitor tracks. Changes to anything else never
/// trigger a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackedField {
    Price,
    Availability,
    Stock,
    Rating,
}

impl TrackedField {
    /// Stable name used in webhook payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackedField::Price => "price",
            TrackedField::Availability => "availability",
            TrackedField::Stock => "stock",
            TrackedField::Rating => "rating",
        }
    }
}

/// Point-in-time view of a monitored product's tracked fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProductSnapshot {
    pub price: Option<f64>,
    pub availability: Option<bool>,
    pub stock: Option<i64>,
    pub rating: Option<f64>,
}

impl ProductSnapshot {
    /// Field-by-field equality diff against a previous snapshot.
    ///
    /// Returns the tracked fields whose values differ. An identical
    /// snapshot yields an empty list, which is what makes repeated
    /// checks idempotent.
    pub fn diff(&self, previous: &ProductSnapshot) -> Vec<TrackedField> {
        let mut changed = Vec::new();
        if self.price != previous.price {
            changed.push(TrackedField::Price);
        }
        if self.availability != previous.availability {
            changed.push(TrackedField::Availability);
        }
        if self.stock != previous.stock {
            changed.push(TrackedField::Stock);
        }
        if self.rating != previous.rating {
            changed.push(TrackedField::Rating);
        }
        changed
    }

    /// Whether the price moved strictly downward.
    pub fn price_dropped_from(&self, previous: &ProductSnapshot) -> bool {
        matches!((previous.price, self.price), (Some(old), Some(new)) if new < old)
    }

    /// Whether availability flipped from unavailable to available.
    pub fn restocked_from(&self, previous: &ProductSnapshot) -> bool {
        previous.availability == Some(false) && self.availability == Some(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_snapshots_diff_empty() {
        let snap = ProductSnapshot {
            price: Some(19.99),
            availability: Some(true),
            stock: Some(12),
            rating: Some(4.5),
        };
        assert!(snap.diff(&snap.clone()).is_empty());
    }

    #[test]
    fn diff_reports_only_changed_fields() {
        let old = ProductSnapshot {
            price: Some(19.99),
            availability: Some(true),
            stock: Some(12),
            rating: Some(4.5),
        };
        let new = ProductSnapshot {
            price: Some(14.99),
            stock: Some(3),
            ..old.clone()
        };
        let changed = new.diff(&old);
        assert_eq!(changed, vec![TrackedField::Price, TrackedField::Stock]);
    }

    #[test]
    fn price_drop_requires_both_prices() {
        let old = ProductSnapshot {
            price: None,
            ..Default::default()
        };
        let new = ProductSnapshot {
            price: Some(9.99),
            ..Default::default()
        };
        assert!(!new.price_dropped_from(&old));
    }

    #[test]
    fn restock_detects_false_to_true() {
        let old = ProductSnapshot {
            availability: Some(false),
            ..Default::default()
        };
        let new = ProductSnapshot {
            availability: Some(true),
            ..Default::default()
        };
        assert!(new.restocked_from(&old));
        assert!(!old.restocked_from(&new));
    }
}
