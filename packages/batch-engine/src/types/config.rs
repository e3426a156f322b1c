//! Configuration types with documented bounds and defaults.
//!
//! Options are validated once at the submission boundary rather than
//! threaded through the system as loosely-typed maps.

use std::time::Duration;

use crate::error::BatchError;

/// Allowed range for `JobOptions::chunk_size`.
pub const CHUNK_SIZE_RANGE: (usize, usize) = (10, 500);

/// Allowed range for `JobOptions::max_concurrency`.
pub const MAX_CONCURRENCY_RANGE: (usize, usize) = (1, 50);

/// Per-job tuning accepted at submission time.
#[derive(Debug, Clone, Copy)]
pub struct JobOptions {
    /// Items per chunk. Bounds: 10..=500. Default: 100.
    pub chunk_size: usize,
    /// Simultaneous in-flight item calls within a chunk.
    /// Bounds: 1..=50. Default: 10.
    pub max_concurrency: usize,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            chunk_size: 100,
            max_concurrency: 10,
        }
    }
}

impl JobOptions {
    /// Check both fields against their documented bounds.
    pub fn validate(&self) -> Result<(), BatchError> {
        let (min_chunk, max_chunk) = CHUNK_SIZE_RANGE;
        if self.chunk_size < min_chunk || self.chunk_size > max_chunk {
            return Err(BatchError::Validation {
                reason: format!(
                    "chunk_size {} outside allowed range {}..={}",
                    self.chunk_size, min_chunk, max_chunk
                ),
            });
        }

        let (min_conc, max_conc) = MAX_CONCURRENCY_RANGE;
        if self.max_concurrency < min_conc || self.max_concurrency > max_conc {
            return Err(BatchError::Validation {
                reason: format!(
                    "max_concurrency {} outside allowed range {}..={}",
                    self.max_concurrency, min_conc, max_conc
                ),
            });
        }

        Ok(())
    }

    /// Set the chunk size.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Set the concurrency bound.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }
}

/// Engine-wide configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Fixed delay between chunks. A simple fixed-rate throttle, not
    /// adaptive congestion control; known limitation. Default: 1s.
    pub inter_chunk_delay: Duration,

    /// Timeout for a single item operation (the bulk-extract call
    /// downstream runs up to this long). Default: 180s.
    pub item_timeout: Duration,

    /// Timeout for a single webhook delivery attempt. Default: 10s.
    pub delivery_timeout: Duration,

    /// Allow `localhost` webhook targets. Must stay off in production;
    /// rejecting loopback targets is the SSRF guard. Default: false.
    pub dev_mode: bool,

    /// Maximum item count accepted per submission. Default: 10_000.
    pub max_items_per_job: usize,

    /// How long terminal jobs are retained before garbage collection.
    /// Default: 24h.
    pub job_retention: Duration,

    /// How long delivery attempts are retained for operator debugging.
    /// Default: 7 days.
    pub delivery_log_retention: Duration,

    /// Webhook registrations idle longer than this are expired.
    /// Default: 30 days.
    pub webhook_inactivity_ttl: Duration,

    /// Minimum interval between re-checks of a monitored product.
    /// Default: 1h.
    pub min_recheck_interval: Duration,

    /// Cumulative failure fraction above which the automatic retry
    /// pass is skipped, leaving the job for operator inspection
    /// instead of hammering a failing downstream. Default: 0.2.
    pub auto_retry_threshold: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            inter_chunk_delay: Duration::from_secs(1),
            item_timeout: Duration::from_secs(180),
            delivery_timeout: Duration::from_secs(10),
            dev_mode: false,
            max_items_per_job: 10_000,
            job_retention: Duration::from_secs(24 * 60 * 60),
            delivery_log_retention: Duration::from_secs(7 * 24 * 60 * 60),
            webhook_inactivity_ttl: Duration::from_secs(30 * 24 * 60 * 60),
            min_recheck_interval: Duration::from_secs(60 * 60),
            auto_retry_threshold: 0.2,
        }
    }
}

impl EngineConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable development mode (permits localhost webhook targets).
    pub fn with_dev_mode(mut self, dev_mode: bool) -> Self {
        self.dev_mode = dev_mode;
        self
    }

    /// Set the inter-chunk delay.
    pub fn with_inter_chunk_delay(mut self, delay: Duration) -> Self {
        self.inter_chunk_delay = delay;
        self
    }

    /// Set the per-item timeout.
    pub fn with_item_timeout(mut self, timeout: Duration) -> Self {
        self.item_timeout = timeout;
        self
    }

    /// Set the per-attempt delivery timeout.
    pub fn with_delivery_timeout(mut self, timeout: Duration) -> Self {
        self.delivery_timeout = timeout;
        self
    }

    /// Set the submission size ceiling.
    pub fn with_max_items_per_job(mut self, max: usize) -> Self {
        self.max_items_per_job = max;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_are_valid() {
        assert!(JobOptions::default().validate().is_ok());
    }

    #[test]
    fn chunk_size_bounds_are_enforced() {
        assert!(JobOptions::default().with_chunk_size(9).validate().is_err());
        assert!(JobOptions::default().with_chunk_size(10).validate().is_ok());
        assert!(JobOptions::default().with_chunk_size(500).validate().is_ok());
        assert!(JobOptions::default().with_chunk_size(501).validate().is_err());
    }

    #[test]
    fn concurrency_bounds_are_enforced() {
        assert!(JobOptions::default().with_max_concurrency(0).validate().is_err());
        assert!(JobOptions::default().with_max_concurrency(1).validate().is_ok());
        assert!(JobOptions::default().with_max_concurrency(50).validate().is_ok());
        assert!(JobOptions::default().with_max_concurrency(51).validate().is_err());
    }

    #[test]
    fn default_config_matches_documented_values() {
        let config = EngineConfig::default();
        assert_eq!(config.inter_chunk_delay, Duration::from_secs(1));
        assert_eq!(config.max_items_per_job, 10_000);
        assert!(!config.dev_mode);
    }
}
