//! Core trait abstractions: storage seams and external collaborators.

pub mod processor;
pub mod store;
pub mod transport;

pub use processor::{ItemProcessor, ProductFetcher};
pub use store::{CounterStore, DeliveryLog, JobStore, SnapshotStore, WebhookStore};
pub use transport::{HttpTransport, WebhookTransport, EVENT_HEADER, SIGNATURE_HEADER};
