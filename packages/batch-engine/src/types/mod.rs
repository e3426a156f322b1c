//! Core data types for jobs, webhooks, monitoring, and admission control.

pub mod config;
pub mod job;
pub mod monitor;
pub mod tier;
pub mod webhook;

pub use config::{EngineConfig, JobOptions, CHUNK_SIZE_RANGE, MAX_CONCURRENCY_RANGE};
pub use job::{
    BatchJob, ErrorLogEntry, JobCounters, JobSnapshot, JobStatus, MAX_ERROR_LOG_ENTRIES,
};
pub use monitor::{ProductMonitor, ProductSnapshot, TrackedField};
pub use tier::{Tier, TierCeilings};
pub use webhook::{
    DeliveryAttempt, DeliveryOutcome, EventEnvelope, RetryPolicy, TriggerOutcome,
    WebhookRegistration, WebhookStatus, EVENT_BATCH_COMPLETED, EVENT_BATCH_FAILED,
    EVENT_BATCH_PARTIAL, EVENT_PRODUCT_BACK_IN_STOCK, EVENT_PRODUCT_PRICE_DROP,
    EVENT_PRODUCT_UPDATED, EVENT_WILDCARD,
};
