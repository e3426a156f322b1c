//! Batch job orchestration: submission, chunked execution, retries.

pub mod chunk;
pub mod orchestrator;

pub use chunk::{run_chunk, ItemResult};
pub use orchestrator::BatchOrchestrator;
