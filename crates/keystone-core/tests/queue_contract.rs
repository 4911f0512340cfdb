use std::sync::Arc;

use keystone_core::models::{HealthStatus, RequeueOutcome};
use keystone_core::{Episode, KeystoneError, QueueConfig, QueueMetrics, RetryPolicy, SyncQueue};
use serde::{Deserialize, Serialize};
use tempfile::tempdir;

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct EpisodeSidecar {
    task_id: String,
    robot_id: String,
    file_size_bytes: u64,
}

#[test]
fn uploader_round_trip_over_spilled_backlog() {
    // Pseudocode:
    // Given a queue whose memory tier holds 3 episodes
    // When a producer pushes 10 JSON episodes and the uploader drains in batches
    // Then every episode arrives once, in push order, and the queue ends empty.
    let temp = tempdir().expect("tempdir");
    let config = QueueConfig::new(temp.path().join("edge/sync-queue.db")).with_memory_capacity(3);
    let metrics = Arc::new(QueueMetrics::new());
    let queue = SyncQueue::open_with_metrics(&config, Arc::clone(&metrics)).expect("open");

    for i in 0..10_u64 {
        let sidecar = EpisodeSidecar {
            task_id: format!("task-{i}"),
            robot_id: "robot-01".to_string(),
            file_size_bytes: 1024 * i,
        };
        let episode = Episode::from_json(format!("ep-{i:03}"), &sidecar).expect("encode");
        queue.push_episode(episode).expect("push");
    }
    assert_eq!(queue.size().expect("size"), 10);

    let mut delivered = Vec::new();
    loop {
        let batch = queue.pop_batch(4).expect("batch");
        if batch.is_empty() {
            break;
        }
        for record in batch {
            let sidecar: EpisodeSidecar = record.decode_json().expect("decode");
            delivered.push((record.id, sidecar.task_id));
        }
    }

    let expected = (0..10)
        .map(|i| (format!("ep-{i:03}"), format!("task-{i}")))
        .collect::<Vec<_>>();
    assert_eq!(delivered, expected);
    assert_eq!(queue.size().expect("size"), 0);

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.pushed_memory, 3);
    assert_eq!(snapshot.spilled_disk, 7);
    assert_eq!(snapshot.popped, 10);
}

#[test]
fn conservation_holds_across_interleaved_push_and_pop() {
    let temp = tempdir().expect("tempdir");
    let config = QueueConfig::new(temp.path().join("queue.db")).with_memory_capacity(2);
    let queue = SyncQueue::open(&config).expect("open");

    let mut pushed = 0_u64;
    let mut popped = 0_u64;
    for round in 0..12_u8 {
        queue
            .push(format!("ep-{round}"), vec![round])
            .expect("push");
        pushed += 1;
        if round % 3 == 0 && queue.pop().expect("pop").is_some() {
            popped += 1;
        }
        assert_eq!(queue.size().expect("size"), pushed - popped);
    }
}

#[test]
fn durability_after_reopen_keeps_spilled_backlog() {
    let temp = tempdir().expect("tempdir");
    let config = QueueConfig::new(temp.path().join("queue.db")).with_memory_capacity(2);

    let spilled = {
        let queue = SyncQueue::open(&config).expect("open");
        for i in 0..6_u8 {
            queue.push(format!("ep-{i}"), vec![i]).expect("push");
        }
        let spilled = queue.status().expect("status").disk_items;
        queue.close().expect("close");
        spilled
    };
    assert_eq!(spilled, 4);

    let reopened = SyncQueue::open(&config).expect("reopen");
    assert!(reopened.size().expect("size") >= spilled);
    let first = reopened.pop().expect("pop").expect("record");
    assert_eq!(first.id, "ep-2");
}

#[test]
fn producers_can_tell_backpressure_from_fatal_errors() {
    let temp = tempdir().expect("tempdir");
    let config = QueueConfig::new(temp.path().join("queue.db"))
        .with_memory_capacity(1)
        .with_max_bytes(16);
    let queue = SyncQueue::open(&config).expect("open");

    queue.push("fits", vec![0_u8; 16]).expect("push");
    let err = queue.push("overflow", vec![0_u8; 1]).expect_err("ceiling");
    assert!(err.is_backpressure());
    assert_eq!(err.code(), "CAPACITY_EXCEEDED");

    let payload = err.to_payload("queue.push");
    assert_eq!(payload.code, "CAPACITY_EXCEEDED");
    assert_eq!(queue.health(), HealthStatus::Degraded);

    queue.close().expect("close");
    let err = queue.push("late", vec![1_u8]).expect_err("closed");
    assert!(matches!(err, KeystoneError::QueueClosed));
    assert!(!err.is_backpressure());
}

#[test]
fn retry_budget_is_applied_before_dead_lettering() {
    let temp = tempdir().expect("tempdir");
    let config = QueueConfig::new(temp.path().join("queue.db")).with_retry(RetryPolicy {
        max_retries: 2,
        base_backoff_secs: 1,
        max_backoff_secs: 30,
    });
    let queue = SyncQueue::open(&config).expect("open");
    queue.push("ep-flaky", b"{}".to_vec()).expect("push");

    let mut outcomes = Vec::new();
    while let Some(record) = queue.pop().expect("pop") {
        outcomes.push(queue.requeue(&record).expect("requeue"));
    }

    assert_eq!(outcomes.len(), 3);
    assert!(matches!(
        outcomes[0],
        RequeueOutcome::Requeued { retry_count: 1, .. }
    ));
    assert!(matches!(
        outcomes[1],
        RequeueOutcome::Requeued { retry_count: 2, .. }
    ));
    assert_eq!(outcomes[2], RequeueOutcome::DeadLettered { retry_count: 3 });

    let parked = queue.dead_letters(5).expect("dead letters");
    assert_eq!(parked.len(), 1);
    assert!(parked[0].reason.contains("3 attempts"));
    assert_eq!(queue.status().expect("status").dead_letters, 1);
}
