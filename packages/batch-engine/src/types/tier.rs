//! Subscription tiers and their rate-limit ceilings.

use serde::{Deserialize, Serialize};

/// A tenant's subscription level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    #[default]
    Free,
    Starter,
    Growth,
    Enterprise,
}

/// Request ceilings for one tier across the three admission windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierCeilings {
    pub per_minute: u64,
    pub per_hour: u64,
    pub per_day: u64,
}

impl Tier {
    /// Ceilings for this tier, or `None` for unbounded (enterprise).
    pub fn ceilings(&self) -> Option<TierCeilings> {
        match self {
            Tier::Free => Some(TierCeilings {
                per_minute: 10,
                per_hour: 100,
                per_day: 1_000,
            }),
            Tier::Starter => Some(TierCeilings {
                per_minute: 60,
                per_hour: 1_000,
                per_day: 10_000,
            }),
            Tier::Growth => Some(TierCeilings {
                per_minute: 300,
                per_hour: 5_000,
                per_day: 50_000,
            }),
            Tier::Enterprise => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_tier_ceilings() {
        let ceilings = Tier::Free.ceilings().unwrap();
        assert_eq!(ceilings.per_minute, 10);
        assert_eq!(ceilings.per_hour, 100);
        assert_eq!(ceilings.per_day, 1_000);
    }

    #[test]
    fn enterprise_is_unbounded() {
        assert!(Tier::Enterprise.ceilings().is_none());
    }
}
