//! Bounded-concurrency execution of one chunk of work items.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::traits::processor::ItemProcessor;

/// Outcome of processing a single item within a chunk.
#[derive(Debug, Clone)]
pub struct ItemResult {
    pub item: String,
    pub success: bool,
    /// Opaque processor output on success.
    pub output: Option<serde_json::Value>,
    pub error: Option<String>,
}

/// Run every item in `items` through the processor with at most
/// `max_concurrency` calls in flight at once.
///
/// Completion order is unspecified, but the returned list is
/// positionally aligned with the input. Each call is independently
/// fault-isolated: an item error or timeout becomes a failed
/// `ItemResult` and never cancels its siblings.
pub async fn run_chunk(
    items: &[String],
    max_concurrency: usize,
    item_timeout: Duration,
    processor: Arc<dyn ItemProcessor>,
    cancel: &CancellationToken,
) -> Vec<ItemResult> {
    let semaphore = Arc::new(Semaphore::new(max_concurrency));

    let tasks = items.iter().map(|item| {
        let semaphore = semaphore.clone();
        let processor = processor.clone();
        let cancel = cancel.clone();
        let item = item.clone();

        async move {
            // Closed semaphores are never observable here; the permit
            // is held for the duration of the item call.
            let _permit = semaphore.acquire().await.expect("semaphore never closed");

            match tokio::time::timeout(item_timeout, processor.process(&item, &cancel)).await {
                Ok(Ok(output)) => ItemResult {
                    item,
                    success: true,
                    output: Some(output),
                    error: None,
                },
                Ok(Err(e)) => {
                    debug!(item = %item, error = %e, "item processing failed");
                    ItemResult {
                        item,
                        success: false,
                        output: None,
                        error: Some(e.to_string()),
                    }
                }
                Err(_) => {
                    debug!(item = %item, "item processing timed out");
                    ItemResult {
                        item,
                        success: false,
                        output: None,
                        error: Some(format!("timed out after {}s", item_timeout.as_secs())),
                    }
                }
            }
        }
    });

    // join_all preserves input order regardless of completion order.
    futures::future::join_all(tasks).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockProcessor;

    fn urls(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("https://shop.example/p/{i}")).collect()
    }

    #[tokio::test]
    async fn results_align_with_input_order() {
        let items = urls(20);
        let processor = Arc::new(MockProcessor::new());
        let results = run_chunk(
            &items,
            5,
            Duration::from_secs(30),
            processor,
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(results.len(), items.len());
        for (result, item) in results.iter().zip(&items) {
            assert_eq!(&result.item, item);
            assert!(result.success);
        }
    }

    #[tokio::test]
    async fn failures_do_not_cancel_siblings() {
        let items = urls(10);
        let processor = Arc::new(MockProcessor::new().failing_on(&[items[3].clone()]));
        let results = run_chunk(
            &items,
            4,
            Duration::from_secs(30),
            processor,
            &CancellationToken::new(),
        )
        .await;

        let failed: Vec<_> = results.iter().filter(|r| !r.success).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].item, items[3]);
        assert!(failed[0].error.is_some());
        assert_eq!(results.iter().filter(|r| r.success).count(), 9);
    }

    #[tokio::test]
    async fn concurrency_bound_is_enforced() {
        let items = urls(30);
        let processor = Arc::new(MockProcessor::new().with_delay(Duration::from_millis(20)));
        let tracker = processor.clone();

        run_chunk(
            &items,
            7,
            Duration::from_secs(30),
            processor,
            &CancellationToken::new(),
        )
        .await;

        assert!(tracker.max_in_flight() <= 7);
        assert_eq!(tracker.call_count(), 30);
    }

    #[tokio::test]
    async fn slow_items_are_timed_out() {
        let items = urls(2);
        let processor = Arc::new(MockProcessor::new().with_delay(Duration::from_millis(200)));
        let results = run_chunk(
            &items,
            2,
            Duration::from_millis(20),
            processor,
            &CancellationToken::new(),
        )
        .await;

        assert!(results.iter().all(|r| !r.success));
        assert!(results[0].error.as_deref().unwrap().contains("timed out"));
    }
}
