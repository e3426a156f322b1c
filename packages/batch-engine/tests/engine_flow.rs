//! End-to-end scenarios driving [`BatchEngine`] over the in-memory
//! store with mock collaborators.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use batch_engine::testing::{FailingStore, MockFetcher, MockProcessor, MockTransport};
use batch_engine::types::webhook::{
    EVENT_BATCH_COMPLETED, EVENT_BATCH_FAILED, EVENT_BATCH_PARTIAL, EVENT_WILDCARD,
};
use batch_engine::{
    BatchEngine, BatchError, EngineConfig, JobOptions, JobSnapshot, JobStatus, JobStore,
    MemoryStore, ProductSnapshot, RetryPolicy, Tier,
};

fn urls(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("https://shop.example/p/{i}")).collect()
}

fn engine_over(
    processor: Arc<MockProcessor>,
    transport: Arc<MockTransport>,
    config: EngineConfig,
) -> (BatchEngine, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let engine = BatchEngine::new(
        store.clone(),
        processor,
        Arc::new(MockFetcher::returning(ProductSnapshot::default())),
        transport,
        config,
    );
    (engine, store)
}

fn fast_config() -> EngineConfig {
    EngineConfig::default().with_inter_chunk_delay(Duration::ZERO)
}

async fn wait_terminal(engine: &BatchEngine, job_id: Uuid) -> JobSnapshot {
    for _ in 0..500 {
        let snapshot = engine.get_status(job_id).await.unwrap();
        if snapshot.status.is_terminal() {
            return snapshot;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {job_id} never reached a terminal state");
}

#[tokio::test]
async fn clean_batch_runs_every_item_exactly_once() {
    let processor = Arc::new(MockProcessor::new());
    let (engine, _) = engine_over(
        processor.clone(),
        Arc::new(MockTransport::succeeding()),
        fast_config(),
    );

    let items = urls(250);
    let job_id = engine
        .submit("tenant-1", items.clone(), JobOptions::default())
        .await
        .unwrap();

    let snapshot = wait_terminal(&engine, job_id).await;
    assert_eq!(snapshot.status, JobStatus::Completed);
    assert_eq!(snapshot.counters.total, 250);
    assert_eq!(snapshot.counters.processed, 250);
    assert_eq!(snapshot.counters.succeeded, 250);
    assert_eq!(snapshot.counters.failed, 0);
    assert_eq!(snapshot.progress_percent, 100.0);
    assert!(snapshot.completed_at.is_some());

    // Every input item ran, none twice, in three strictly sequential
    // waves of [100, 100, 50]: each wave is a permutation of its
    // contiguous input slice.
    assert_eq!(processor.call_count(), 250);
    let calls = processor.calls();
    let mut start = 0;
    for wave in items.chunks(100) {
        let ran: HashSet<_> = calls[start..start + wave.len()].iter().cloned().collect();
        assert_eq!(ran, wave.iter().cloned().collect::<HashSet<_>>());
        start += wave.len();
    }
}

#[tokio::test]
async fn heavy_failures_finish_partial_without_a_retry_pass() {
    let items = urls(100);
    let processor = Arc::new(MockProcessor::new().failing_on(&items[..30]));
    let (engine, _) = engine_over(
        processor.clone(),
        Arc::new(MockTransport::succeeding()),
        fast_config(),
    );

    let job_id = engine
        .submit("tenant-1", items, JobOptions::default())
        .await
        .unwrap();

    let snapshot = wait_terminal(&engine, job_id).await;
    assert_eq!(snapshot.status, JobStatus::Partial);
    assert_eq!(snapshot.counters.succeeded, 70);
    assert_eq!(snapshot.counters.failed, 30);
    assert_eq!(snapshot.counters.processed, 100);

    // 30% failure rate is at or above the retry threshold, so no item
    // was attempted a second time.
    assert_eq!(processor.call_count(), 100);
}

#[tokio::test]
async fn transient_failures_below_threshold_are_recovered_in_place() {
    let items = urls(100);
    let processor = Arc::new(MockProcessor::new().failing_once_on(&items[..10]));
    let (engine, _) = engine_over(
        processor.clone(),
        Arc::new(MockTransport::succeeding()),
        fast_config(),
    );

    let job_id = engine
        .submit("tenant-1", items, JobOptions::default())
        .await
        .unwrap();

    let snapshot = wait_terminal(&engine, job_id).await;
    assert_eq!(snapshot.status, JobStatus::Completed);
    assert_eq!(snapshot.counters.succeeded, 100);
    assert_eq!(snapshot.counters.failed, 0);
    assert_eq!(snapshot.counters.processed, 100);

    // 100 first-pass calls plus one retry for each transient failure.
    assert_eq!(processor.call_count(), 110);
}

#[tokio::test]
async fn retry_failed_resubmits_exactly_the_failed_sublist() {
    let items = urls(50);
    let processor = Arc::new(MockProcessor::new().failing_on(&items[..20]));
    let (engine, _) = engine_over(
        processor.clone(),
        Arc::new(MockTransport::succeeding()),
        fast_config(),
    );

    let job_id = engine
        .submit("tenant-1", items, JobOptions::default())
        .await
        .unwrap();
    let original = wait_terminal(&engine, job_id).await;
    assert_eq!(original.status, JobStatus::Partial);
    assert_eq!(original.counters.failed, 20);

    let retry_id = engine.retry_failed(job_id).await.unwrap();
    assert_ne!(retry_id, job_id);

    let retry = wait_terminal(&engine, retry_id).await;
    assert_eq!(retry.counters.total, 20);
    // Items fail deterministically, so the retry job ends partial too,
    // and being a retry it must not run its own retry pass.
    assert_eq!(retry.status, JobStatus::Partial);
    assert_eq!(retry.counters.failed, 20);
    assert_eq!(processor.call_count(), 70);

    // The original job's record is untouched by the retry.
    let original_again = engine.get_status(job_id).await.unwrap();
    assert_eq!(original_again.counters.failed, 20);
}

#[tokio::test]
async fn retry_of_a_fully_successful_job_is_rejected() {
    let (engine, _) = engine_over(
        Arc::new(MockProcessor::new()),
        Arc::new(MockTransport::succeeding()),
        fast_config(),
    );

    let job_id = engine
        .submit("tenant-1", urls(15), JobOptions::default())
        .await
        .unwrap();
    wait_terminal(&engine, job_id).await;

    let err = engine.retry_failed(job_id).await.unwrap_err();
    assert!(matches!(err, BatchError::NoFailedItems));
}

#[tokio::test]
async fn unknown_job_ids_are_not_found() {
    let (engine, _) = engine_over(
        Arc::new(MockProcessor::new()),
        Arc::new(MockTransport::succeeding()),
        fast_config(),
    );

    let missing = Uuid::new_v4();
    assert!(matches!(
        engine.get_status(missing).await.unwrap_err(),
        BatchError::NotFound { .. }
    ));
    assert!(matches!(
        engine.retry_failed(missing).await.unwrap_err(),
        BatchError::NotFound { .. }
    ));
}

#[tokio::test]
async fn invalid_submissions_are_rejected_before_any_job_exists() {
    let (engine, store) = engine_over(
        Arc::new(MockProcessor::new()),
        Arc::new(MockTransport::succeeding()),
        fast_config().with_max_items_per_job(100),
    );

    let empty = engine
        .submit("tenant-1", Vec::new(), JobOptions::default())
        .await;
    assert!(matches!(empty, Err(BatchError::Validation { .. })));

    let oversize = engine
        .submit("tenant-1", urls(101), JobOptions::default())
        .await;
    assert!(matches!(oversize, Err(BatchError::Validation { .. })));

    let bad_chunk = engine
        .submit(
            "tenant-1",
            urls(10),
            JobOptions::default().with_chunk_size(5),
        )
        .await;
    assert!(matches!(bad_chunk, Err(BatchError::Validation { .. })));

    assert_eq!(store.job_count(), 0);
}

#[tokio::test]
async fn terminal_jobs_notify_subscribed_webhooks() {
    let transport = Arc::new(MockTransport::succeeding());
    let (engine, _) = engine_over(
        Arc::new(MockProcessor::new()),
        transport.clone(),
        fast_config(),
    );

    engine
        .register_webhook(
            "tenant-1",
            "https://hooks.example.com/amp",
            Some("whsec_test".to_string()),
            [EVENT_WILDCARD.to_string()].into_iter().collect(),
            RetryPolicy::default(),
        )
        .await
        .unwrap();

    let job_id = engine
        .submit("tenant-1", urls(20), JobOptions::default())
        .await
        .unwrap();
    wait_terminal(&engine, job_id).await;

    // The terminal notification is fired after the terminal state is
    // persisted, so give the spawned task a moment to post it.
    for _ in 0..100 {
        if transport.request_count() > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(transport.event_headers(), vec![EVENT_BATCH_COMPLETED]);
    let request = &transport.requests()[0];
    let envelope: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
    assert_eq!(envelope["event"], EVENT_BATCH_COMPLETED);
    assert_eq!(envelope["data"]["job_id"], job_id.to_string());
    assert_eq!(envelope["data"]["tenant_id"], "tenant-1");
}

#[tokio::test]
async fn partial_jobs_emit_the_partial_event() {
    let items = urls(40);
    let transport = Arc::new(MockTransport::succeeding());
    let (engine, _) = engine_over(
        Arc::new(MockProcessor::new().failing_on(&items[..20])),
        transport.clone(),
        fast_config(),
    );

    engine
        .register_webhook(
            "tenant-1",
            "https://hooks.example.com/amp",
            None,
            [EVENT_BATCH_PARTIAL.to_string()].into_iter().collect(),
            RetryPolicy::default(),
        )
        .await
        .unwrap();

    let job_id = engine
        .submit("tenant-1", items, JobOptions::default())
        .await
        .unwrap();
    let snapshot = wait_terminal(&engine, job_id).await;
    assert_eq!(snapshot.status, JobStatus::Partial);

    for _ in 0..100 {
        if transport.request_count() > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(transport.event_headers(), vec![EVENT_BATCH_PARTIAL]);
}

#[tokio::test]
async fn store_write_failure_fails_the_job_and_notifies() {
    // Update calls for a single-chunk job: 1 = processing transition,
    // 2 = chunk fold, 3 = terminal write.
    let store = Arc::new(FailingStore::failing_update_calls(&[2]));
    let transport = Arc::new(MockTransport::succeeding());
    let engine = BatchEngine::new(
        store.clone(),
        Arc::new(MockProcessor::new()),
        Arc::new(MockFetcher::returning(ProductSnapshot::default())),
        transport.clone(),
        fast_config(),
    );

    engine
        .register_webhook(
            "tenant-1",
            "https://hooks.example.com/amp",
            None,
            [EVENT_WILDCARD.to_string()].into_iter().collect(),
            RetryPolicy::default(),
        )
        .await
        .unwrap();

    let job_id = engine
        .submit("tenant-1", urls(10), JobOptions::default())
        .await
        .unwrap();
    let snapshot = wait_terminal(&engine, job_id).await;
    assert_eq!(snapshot.status, JobStatus::Failed);

    let job = store.load_job(job_id).await.unwrap().unwrap();
    assert!(job
        .error_log
        .iter()
        .any(|entry| entry.message.contains("store failure")));

    for _ in 0..100 {
        if transport.request_count() > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(transport.event_headers(), vec![EVENT_BATCH_FAILED]);
}

#[tokio::test]
async fn failed_terminal_write_still_persists_a_failed_record() {
    // The terminal write (call 3) fails; the fault handler's follow-up
    // write lands, so the durable record must read Failed with the
    // cause logged, never a stranded Processing.
    let store = Arc::new(FailingStore::failing_update_calls(&[3]));
    let engine = BatchEngine::new(
        store.clone(),
        Arc::new(MockProcessor::new()),
        Arc::new(MockFetcher::returning(ProductSnapshot::default())),
        Arc::new(MockTransport::succeeding()),
        fast_config(),
    );

    let job_id = engine
        .submit("tenant-1", urls(10), JobOptions::default())
        .await
        .unwrap();
    let snapshot = wait_terminal(&engine, job_id).await;
    assert_eq!(snapshot.status, JobStatus::Failed);

    let job = store.load_job(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(!job.error_log.is_empty());
    assert!(job.completed_at.is_some());
}

#[tokio::test]
async fn http_transport_wiring_processes_jobs() {
    // Built from the configured delivery timeout; with no registered
    // webhooks the job runs to completion without any network traffic.
    let store = Arc::new(MemoryStore::new());
    let engine = BatchEngine::with_http_transport(
        store,
        Arc::new(MockProcessor::new()),
        Arc::new(MockFetcher::returning(ProductSnapshot::default())),
        fast_config().with_delivery_timeout(Duration::from_secs(5)),
    );

    let job_id = engine
        .submit("tenant-1", urls(15), JobOptions::default())
        .await
        .unwrap();
    let snapshot = wait_terminal(&engine, job_id).await;
    assert_eq!(snapshot.status, JobStatus::Completed);
}

#[tokio::test]
async fn admission_control_guards_the_engine_boundary() {
    let (engine, _) = engine_over(
        Arc::new(MockProcessor::new()),
        Arc::new(MockTransport::succeeding()),
        fast_config(),
    );

    let mut admitted = 0;
    let mut rejected = 0;
    for _ in 0..11 {
        if engine.admit("tenant-1", Tier::Free).await.unwrap().is_allowed() {
            admitted += 1;
        } else {
            rejected += 1;
        }
    }

    // Free tier admits 10 per minute. The loop runs well inside one
    // minute, but may straddle a window boundary; either way at least
    // ten calls pass and at most ten per window.
    assert!(admitted >= 10);
    assert!(admitted + rejected == 11);

    // Enterprise never trips.
    for _ in 0..50 {
        assert!(engine
            .admit("tenant-big", Tier::Enterprise)
            .await
            .unwrap()
            .is_allowed());
    }
}
