//! Item processing and product fetching collaborator seams.
//!
//! The engine treats content generation as opaque: scraping a product
//! page, generating the email artifact, and persisting it all happen
//! behind `ItemProcessor`. Likewise the monitor's re-fetch goes
//! through `ProductFetcher`.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::types::monitor::ProductSnapshot;

/// Processes one work item (a product URL) into a generated artifact.
///
/// Implementations should honor the cancellation token at their own
/// suspension points. The engine does not expose mid-job cancellation
/// yet, but the hook is threaded through so it can be added without
/// re-architecture.
#[async_trait]
pub trait ItemProcessor: Send + Sync {
    /// Process a single item. The returned value is opaque to the
    /// engine; errors are captured per item and never abort a chunk.
    async fn process(
        &self,
        item: &str,
        cancel: &CancellationToken,
    ) -> std::result::Result<serde_json::Value, Box<dyn std::error::Error + Send + Sync>>;
}

/// Re-fetches the tracked fields of a monitored product.
#[async_trait]
pub trait ProductFetcher: Send + Sync {
    /// Fetch the current snapshot for a product URL.
    async fn fetch(
        &self,
        product_url: &str,
    ) -> std::result::Result<ProductSnapshot, Box<dyn std::error::Error + Send + Sync>>;
}
