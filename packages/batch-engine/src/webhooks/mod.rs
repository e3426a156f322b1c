//! Webhook registration, signing, and delivery.

pub mod delivery;
pub mod registry;
pub mod signature;

pub use delivery::WebhookEngine;
pub use registry::{validate_url, WebhookRegistry};
