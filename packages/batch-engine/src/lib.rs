//! Batch Campaign Orchestration & Notification Engine
//!
//! The asynchronous core behind a marketing-content generation API:
//! accepts batches of thousands of product URLs, executes them under
//! bounded concurrency and chunking with crash-recoverable progress,
//! enforces per-tenant rate limits at the API boundary, and reliably
//! delivers signed webhook notifications when jobs finish or monitored
//! products change.
//!
//! # Design
//!
//! - Content generation, storage, and HTTP transport are external
//!   collaborators behind trait seams ([`traits`]); the engine owns
//!   scheduling, throttling, retrying, and reporting.
//! - Submission is fire-and-continue: [`BatchEngine::submit`] persists
//!   a pending record and returns the job id immediately while a
//!   spawned task drives chunks strictly in order.
//! - Per-item and delivery failures are recovered locally; only store
//!   failures are fatal to a job.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use batch_engine::{BatchEngine, EngineConfig, JobOptions, MemoryStore};
//!
//! let store = Arc::new(MemoryStore::new());
//! let engine = BatchEngine::new(store, processor, fetcher, transport, EngineConfig::default());
//!
//! let job_id = engine.submit("tenant-1", product_urls, JobOptions::default()).await?;
//! let snapshot = engine.get_status(job_id).await?;
//! ```
//!
//! # Modules
//!
//! - [`traits`] - Storage seams and external collaborators
//! - [`types`] - Jobs, webhooks, tiers, monitor snapshots, config
//! - [`jobs`] - Orchestrator and chunk processor
//! - [`limiter`] - Per-tenant multi-window admission control
//! - [`webhooks`] - Registration, signing, delivery
//! - [`monitor`] - Periodic product change detection
//! - [`stores`] - Storage implementations (MemoryStore)
//! - [`testing`] - Mock implementations for testing

pub mod engine;
pub mod error;
pub mod jobs;
pub mod limiter;
pub mod monitor;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;
pub mod webhooks;

// Re-export core types at crate root
pub use engine::BatchEngine;
pub use error::{BatchError, DeliveryError, MonitorError, StoreError, UrlValidationError, WebhookError};
pub use jobs::{run_chunk, BatchOrchestrator, ItemResult};
pub use limiter::{AdmitDecision, RateLimitInfo, RateLimiter};
pub use monitor::{ChangeMonitor, CheckOutcome};
pub use stores::MemoryStore;
pub use traits::{
    CounterStore, DeliveryLog, HttpTransport, ItemProcessor, JobStore, ProductFetcher,
    SnapshotStore, WebhookStore, WebhookTransport,
};
pub use types::{
    BatchJob, EngineConfig, EventEnvelope, JobCounters, JobOptions, JobSnapshot, JobStatus,
    ProductMonitor, ProductSnapshot, RetryPolicy, Tier, TrackedField, WebhookRegistration,
    WebhookStatus,
};
pub use webhooks::{validate_url, WebhookEngine, WebhookRegistry};
