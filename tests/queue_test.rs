//! Integration tests for the queue engine.

use serde_json::json;
use tailq::config::QueueConfig;
use tailq::error::QueueError;
use tailq::model::Status;
use tailq::queue::JobQueue;
use tailq::store::{LogStore, MemoryLogStore};
use tailq::wait::BoundedEmptyPolls;

async fn test_queue() -> JobQueue<MemoryLogStore> {
    JobQueue::open(MemoryLogStore::new(), QueueConfig::new("jobs"))
        .await
        .expect("failed to open queue")
}

// ---------------------------------------------------------------------------
// Provisioning and validation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn open_provisions_a_fresh_queue() {
    let queue = test_queue().await;
    assert!(queue.is_valid().await.unwrap());
    assert_eq!(queue.count().await.unwrap(), 0);
}

#[tokio::test]
async fn provisioning_twice_fails() {
    let queue = test_queue().await;
    let result = queue.provision().await;
    assert!(matches!(result, Err(QueueError::AlreadyProvisioned(_))));
}

#[tokio::test]
async fn open_attaches_to_an_existing_queue() {
    let store = MemoryLogStore::new();
    let first = JobQueue::open(store.clone(), QueueConfig::new("jobs"))
        .await
        .unwrap();
    first.publish(json!({"n": 1})).await.unwrap();

    // Second open must attach, not recreate.
    let second = JobQueue::open(store, QueueConfig::new("jobs"))
        .await
        .unwrap();
    assert_eq!(second.count().await.unwrap(), 1);
}

#[tokio::test]
async fn unbounded_backing_log_is_invalid() {
    let store = MemoryLogStore::new();
    store.create_unbounded("jobs").unwrap();

    let queue = JobQueue::open(store, QueueConfig::new("jobs"))
        .await
        .unwrap();
    assert!(!queue.is_valid().await.unwrap());

    // Claim paths refuse to run over it.
    assert!(matches!(queue.next().await, Err(QueueError::NotBounded(_))));
    assert!(matches!(
        queue.consume_with(BoundedEmptyPolls::new(1)).await.err(),
        Some(QueueError::NotBounded(_))
    ));
}

// ---------------------------------------------------------------------------
// Publish
// ---------------------------------------------------------------------------

#[tokio::test]
async fn publish_increases_waiting_count_by_one() {
    let queue = test_queue().await;
    assert_eq!(queue.count().await.unwrap(), 0);

    queue.publish(json!({"message": "one"})).await.unwrap();
    assert_eq!(queue.count().await.unwrap(), 1);

    queue.publish(json!({"message": "two"})).await.unwrap();
    assert_eq!(queue.count().await.unwrap(), 2);
}

#[tokio::test]
async fn published_jobs_wait_with_unset_started_and_done() {
    let queue = test_queue().await;
    let record = queue.publish(json!({"message": "fresh"})).await.unwrap();

    assert_eq!(record.status, Status::Waiting);
    assert!(record.ts.started.is_none());
    assert!(record.ts.done.is_none());
}

#[tokio::test]
async fn publish_after_clear_fails() {
    let queue = test_queue().await;
    queue.clear().await.unwrap();

    let result = queue.publish(json!({"message": "too late"})).await;
    assert!(matches!(result, Err(QueueError::Publish(_))));
}

// ---------------------------------------------------------------------------
// One-shot claim
// ---------------------------------------------------------------------------

#[tokio::test]
async fn next_on_empty_queue_reports_empty() {
    let queue = test_queue().await;
    assert!(matches!(queue.next().await, Err(QueueError::Empty)));
}

#[tokio::test]
async fn next_returns_the_published_payload_and_drains_it() {
    let queue = test_queue().await;
    queue
        .publish(json!({"message": "hello world!"}))
        .await
        .unwrap();

    let record = queue.next().await.unwrap();
    assert_eq!(record.payload, json!({"message": "hello world!"}));
    assert_eq!(record.status, Status::Done);
    assert_eq!(queue.count().await.unwrap(), 0);
}

#[tokio::test]
async fn next_claims_in_insertion_order() {
    let queue = test_queue().await;
    for n in 1..=3 {
        queue.publish(json!({"n": n})).await.unwrap();
    }
    for n in 1..=3 {
        let record = queue.next().await.unwrap();
        assert_eq!(record.payload, json!({"n": n}));
    }
}

#[tokio::test]
async fn one_shot_claims_have_ordered_timestamps() {
    let queue = test_queue().await;
    queue.publish(json!({"message": "timed"})).await.unwrap();

    let record = queue.next().await.unwrap();
    let started = record.ts.started.expect("started should be set");
    let done = record.ts.done.expect("done should be set");
    assert!(record.ts.created <= started);
    assert!(started <= done);
}

// ---------------------------------------------------------------------------
// Streaming consumption
// ---------------------------------------------------------------------------

#[tokio::test]
async fn consume_drains_exactly_the_published_jobs() {
    let store = MemoryLogStore::new();
    let queue = JobQueue::open(store.clone(), QueueConfig::new("jobs"))
        .await
        .unwrap();
    for n in 1..=3 {
        queue
            .publish(json!({"message": format!("job {n}")}))
            .await
            .unwrap();
    }

    let mut consumer = queue
        .consume_with(BoundedEmptyPolls::new(2))
        .await
        .unwrap();
    let mut yielded = Vec::new();
    while let Some(record) = consumer.next().await.unwrap() {
        // A claimed job is observed Working while held.
        assert_eq!(record.status, Status::Working);
        assert!(record.ts.created <= record.ts.started.unwrap());
        yielded.push(record.id);
    }

    assert_eq!(yielded.len(), 3);
    assert_eq!(queue.count().await.unwrap(), 0);
    assert_eq!(store.count("jobs", Status::Done).await.unwrap(), 3);
}

#[tokio::test]
async fn consume_completes_the_previous_job_on_resumption() {
    let store = MemoryLogStore::new();
    let queue = JobQueue::open(store.clone(), QueueConfig::new("jobs"))
        .await
        .unwrap();
    queue.publish(json!({"n": 1})).await.unwrap();
    queue.publish(json!({"n": 2})).await.unwrap();

    let mut consumer = queue
        .consume_with(BoundedEmptyPolls::new(1))
        .await
        .unwrap();

    consumer.next().await.unwrap().unwrap();
    assert_eq!(store.count("jobs", Status::Working).await.unwrap(), 1);
    assert_eq!(store.count("jobs", Status::Done).await.unwrap(), 0);

    consumer.next().await.unwrap().unwrap();
    assert_eq!(store.count("jobs", Status::Working).await.unwrap(), 1);
    assert_eq!(store.count("jobs", Status::Done).await.unwrap(), 1);
}

#[tokio::test]
async fn explicit_complete_is_idempotent() {
    let store = MemoryLogStore::new();
    let queue = JobQueue::open(store.clone(), QueueConfig::new("jobs"))
        .await
        .unwrap();
    queue.publish(json!({"n": 1})).await.unwrap();

    let mut consumer = queue
        .consume_with(BoundedEmptyPolls::new(1))
        .await
        .unwrap();
    consumer.next().await.unwrap().unwrap();

    consumer.complete().await.unwrap();
    consumer.complete().await.unwrap();
    assert_eq!(store.count("jobs", Status::Done).await.unwrap(), 1);
}

#[tokio::test]
async fn consume_finishes_the_last_job_before_stopping() {
    let store = MemoryLogStore::new();
    let queue = JobQueue::open(store.clone(), QueueConfig::new("jobs"))
        .await
        .unwrap();
    queue.publish(json!({"n": 1})).await.unwrap();

    let mut consumer = queue
        .consume_with(BoundedEmptyPolls::new(1))
        .await
        .unwrap();
    assert!(consumer.next().await.unwrap().is_some());
    assert!(consumer.next().await.unwrap().is_none());
    assert_eq!(store.count("jobs", Status::Done).await.unwrap(), 1);
}

#[tokio::test]
async fn consume_surfaces_store_loss_as_an_error() {
    let queue = test_queue().await;
    queue.publish(json!({"n": 1})).await.unwrap();

    let mut consumer = queue
        .consume_with(BoundedEmptyPolls::new(1))
        .await
        .unwrap();
    consumer.next().await.unwrap().unwrap();

    queue.clear().await.unwrap();
    assert!(consumer.next().await.is_err());
}

// ---------------------------------------------------------------------------
// Destructive drain
// ---------------------------------------------------------------------------

#[tokio::test]
async fn clear_destroys_and_requires_reprovisioning() {
    let store = MemoryLogStore::new();
    let queue = JobQueue::open(store.clone(), QueueConfig::new("jobs"))
        .await
        .unwrap();
    queue.publish(json!({"n": 1})).await.unwrap();
    queue.publish(json!({"n": 2})).await.unwrap();

    queue.clear().await.unwrap();
    assert!(!store.exists("jobs").await.unwrap());
    assert!(queue.count().await.is_err());

    // A re-provisioned queue of the same name starts empty.
    let queue = JobQueue::open(store, QueueConfig::new("jobs"))
        .await
        .unwrap();
    assert_eq!(queue.count().await.unwrap(), 0);
}
