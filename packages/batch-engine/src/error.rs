//! Typed errors for the batch engine.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling. Only store-level
//! failures are fatal to a running job; item and delivery failures
//! are always recovered locally.

use thiserror::Error;

/// Errors surfaced by batch job operations.
#[derive(Debug, Error)]
pub enum BatchError {
    /// Malformed input rejected at the boundary, before any resource
    /// is created. Always recoverable by correcting the request.
    #[error("validation error: {reason}")]
    Validation { reason: String },

    /// Job id is unknown or has expired past its retention window.
    #[error("job not found: {job_id}")]
    NotFound { job_id: String },

    /// Operation requires the job to be in a different state
    /// (e.g. retrying a job that is not terminal).
    #[error("invalid job state: {reason}")]
    InvalidState { reason: String },

    /// Retry was requested but the job recorded no failed items.
    #[error("job has no failed items to retry")]
    NoFailedItems,

    /// The durability layer rejected a read or write. This is the one
    /// fatal class: progress can no longer be trusted.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors from the injected storage layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Record not present.
    #[error("record not found: {key}")]
    NotFound { key: String },

    /// Backend rejected the operation.
    #[error("storage backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Errors surfaced by webhook registration and delivery.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// URL failed validation at registration time.
    #[error("invalid webhook URL: {0}")]
    InvalidUrl(#[from] UrlValidationError),

    /// Registration id is unknown.
    #[error("webhook not found: {webhook_id}")]
    NotFound { webhook_id: String },

    /// Storage failure while reading or writing registrations.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Envelope serialization failed.
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Why a webhook URL was rejected, primarily for SSRF protection.
#[derive(Debug, Error)]
pub enum UrlValidationError {
    /// URL could not be parsed at all.
    #[error("URL parse error: {0}")]
    Parse(#[from] url::ParseError),

    /// Only http and https targets are accepted.
    #[error("disallowed URL scheme: {0}")]
    DisallowedScheme(String),

    /// Loopback targets are rejected outside of development mode.
    #[error("blocked host: {0}")]
    BlockedHost(String),

    /// URL has no host component.
    #[error("URL has no host")]
    NoHost,
}

/// A single delivery attempt failure. Never raised to job callers;
/// retried per policy, then logged.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Transport-level failure (connect, DNS, TLS).
    #[error("transport error: {0}")]
    Transport(String),

    /// Endpoint answered with a non-2xx status.
    #[error("endpoint returned status {status}")]
    Status { status: u16 },

    /// Attempt exceeded the delivery timeout.
    #[error("delivery timed out after {seconds}s")]
    Timeout { seconds: u64 },
}

/// Errors from the periodic change monitor.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Re-fetching the monitored product failed; the stored snapshot
    /// stays authoritative and no triggers fire.
    #[error("fetch failed for {product_url}: {message}")]
    Fetch { product_url: String, message: String },

    /// Storage failure while reading or writing snapshots.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type alias for batch job operations.
pub type Result<T> = std::result::Result<T, BatchError>;

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result type alias for webhook operations.
pub type WebhookResult<T> = std::result::Result<T, WebhookError>;
