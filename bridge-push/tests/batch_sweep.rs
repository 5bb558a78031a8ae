// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

mod common;

use common::{deposit, Harness, COMMIT_LOCK, VERIFY_LOCK};
use serde_json::Value;
use serial_test::serial;
use starcoin_bridge_push::checkpoint::Watermark;
use starcoin_bridge_push::duration::{DurationEstimator, DurationWindowConfig};
use starcoin_bridge_push::storage::KvStore;
use starcoin_bridge_push::tasks::{BatchRole, SweepTask, TickOutcome};
use starcoin_bridge_push::types::LeafType;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

static CLOCK_SECS: AtomicU64 = AtomicU64::new(0);

fn test_clock() -> u64 {
    CLOCK_SECS.load(Ordering::SeqCst)
}

fn fixed_clock() -> u64 {
    1_700_000_000
}

fn window(capacity: u64, min_secs: u64, max_secs: u64) -> DurationWindowConfig {
    DurationWindowConfig {
        capacity,
        min_secs,
        max_secs,
        default_secs: 600,
    }
}

fn statuses(h: &Harness) -> Vec<u64> {
    h.transport
        .messages()
        .iter()
        .map(|m| {
            let content: Value = serde_json::from_str(&m.push_content).unwrap();
            content[0]["status"].as_u64().unwrap()
        })
        .collect()
}

#[tokio::test]
async fn test_commit_sweeps_blocks_above_previous_ceiling() {
    let h = Harness::new(
        vec![
            deposit(1, 1, 80, LeafType::Asset),
            deposit(1, 2, 81, LeafType::Asset),
            deposit(1, 3, 120, LeafType::Asset),
            deposit(1, 4, 121, LeafType::Asset),
            deposit(1, 5, 100, LeafType::Message),
        ],
        100,
    );
    h.checkpoints.advance(Watermark::CommitBatchNum, 4).await.unwrap();
    h.checkpoints
        .advance(Watermark::CommitMaxBlockNum, 80)
        .await
        .unwrap();
    h.chain.set_committed(5, 120);

    let task = h
        .batch_task(BatchRole::Commit, DurationWindowConfig::commit_default())
        .with_clock(fixed_clock);
    let outcome = task.tick().await.unwrap();
    assert_eq!(
        outcome,
        TickOutcome::Advanced {
            from: 4,
            to: 5,
            dispatched: 2
        }
    );

    let query = h.records.queries()[0];
    assert_eq!((query.block_low, query.block_high), (81, 120));
    assert_eq!(h.settle().await, 2);
    assert_eq!(statuses(&h), vec![2, 2]);

    assert_eq!(h.checkpoints.get(Watermark::CommitBatchNum).await.unwrap(), 5);
    assert_eq!(
        h.checkpoints.get(Watermark::CommitMaxBlockNum).await.unwrap(),
        120
    );
    assert_eq!(h.kv.list("bridge_commit_time_list"), vec![fixed_clock()]);
    assert!(!h.kv.is_locked(COMMIT_LOCK));
}

#[tokio::test]
async fn test_stale_batch_is_noop() {
    let h = Harness::new(vec![deposit(1, 1, 50, LeafType::Asset)], 100);
    h.checkpoints.advance(Watermark::CommitBatchNum, 9).await.unwrap();
    h.chain.set_committed(9, 200);
    let writes = h.kv.write_count();

    let task = h
        .batch_task(BatchRole::Commit, DurationWindowConfig::commit_default())
        .with_clock(fixed_clock);
    assert_eq!(task.tick().await.unwrap(), TickOutcome::NoChange);
    assert_eq!(h.kv.write_count(), writes);
    assert!(h.records.queries().is_empty());
    assert!(h.kv.list("bridge_commit_time_list").is_empty());
}

#[tokio::test]
async fn test_batch_without_blocks_aborts_without_mutation() {
    let h = Harness::new(vec![deposit(1, 1, 50, LeafType::Asset)], 100);
    h.checkpoints.advance(Watermark::CommitBatchNum, 2).await.unwrap();
    h.chain.set_committed_without_blocks(3);
    let writes = h.kv.write_count();

    let task = h
        .batch_task(BatchRole::Commit, DurationWindowConfig::commit_default())
        .with_clock(fixed_clock);
    let err = task.tick().await.unwrap_err();
    assert_eq!(err.error_type(), "data_anomaly");
    assert_eq!(h.kv.write_count(), writes);
    assert_eq!(h.checkpoints.get(Watermark::CommitBatchNum).await.unwrap(), 2);
    assert!(!h.kv.is_locked(COMMIT_LOCK));
}

#[tokio::test]
async fn test_held_lock_skips_batch_tick() {
    let h = Harness::new(vec![], 100);
    h.chain.set_committed(1, 10);
    h.kv
        .try_lock(COMMIT_LOCK, "other-replica", Duration::from_secs(10))
        .await
        .unwrap();

    let task = h
        .batch_task(BatchRole::Commit, DurationWindowConfig::commit_default())
        .with_clock(fixed_clock);
    assert_eq!(task.tick().await.unwrap(), TickOutcome::Locked);
    assert_eq!(h.kv.write_count(), 0);
    assert_eq!(h.chain.calls(), 0);
}

#[tokio::test]
async fn test_verify_runs_while_commit_lock_is_held() {
    let h = Harness::new(vec![deposit(1, 7, 30, LeafType::Asset)], 100);
    h.chain.set_verified(2, 40);
    h.kv
        .try_lock(COMMIT_LOCK, "other-replica", Duration::from_secs(10))
        .await
        .unwrap();

    let task = h
        .batch_task(BatchRole::Verify, DurationWindowConfig::verify_default())
        .with_clock(fixed_clock);
    let outcome = task.tick().await.unwrap();
    assert!(matches!(outcome, TickOutcome::Advanced { to: 2, dispatched: 1, .. }));
    assert_eq!(h.settle().await, 1);
    assert_eq!(statuses(&h), vec![3]);

    assert_eq!(h.checkpoints.get(Watermark::VerifyBatchNum).await.unwrap(), 2);
    assert_eq!(h.checkpoints.get(Watermark::CommitBatchNum).await.unwrap(), 0);
    // each role releases only its own key
    assert!(!h.kv.is_locked(VERIFY_LOCK));
    assert!(h.kv.is_locked(COMMIT_LOCK));
}

#[tokio::test]
async fn test_ceiling_not_advanced_skips_scan() {
    let h = Harness::new(vec![deposit(1, 1, 50, LeafType::Asset)], 100);
    h.checkpoints.advance(Watermark::CommitBatchNum, 1).await.unwrap();
    h.checkpoints
        .advance(Watermark::CommitMaxBlockNum, 100)
        .await
        .unwrap();
    h.chain.set_committed(2, 90);

    let task = h
        .batch_task(BatchRole::Commit, DurationWindowConfig::commit_default())
        .with_clock(fixed_clock);
    let outcome = task.tick().await.unwrap();
    assert!(matches!(outcome, TickOutcome::Advanced { to: 2, dispatched: 0, .. }));
    assert!(h.records.queries().is_empty());
    assert_eq!(
        h.checkpoints.get(Watermark::CommitMaxBlockNum).await.unwrap(),
        100
    );
}

#[tokio::test]
#[serial]
async fn test_commit_durations_feed_the_average() {
    let h = Harness::new(vec![], 100);
    let task = h
        .batch_task(BatchRole::Commit, window(5, 30, 600))
        .with_clock(test_clock);

    for (i, ts) in [0u64, 60, 120, 180, 240, 300].into_iter().enumerate() {
        CLOCK_SECS.store(ts, Ordering::SeqCst);
        h.chain.set_committed(i as u64 + 1, (i as u64 + 1) * 10);
        task.tick().await.unwrap();
    }

    let estimator = DurationEstimator::commit(h.checkpoints.clone(), window(5, 30, 600));
    assert_eq!(estimator.stored_average().await.unwrap(), Some(60));
    assert_eq!(
        h.kv.list("bridge_commit_time_list"),
        vec![300, 240, 180, 120, 60]
    );
}

#[tokio::test]
#[serial]
async fn test_out_of_bound_average_keeps_previous() {
    let h = Harness::new(vec![], 100);
    let task = h
        .batch_task(BatchRole::Commit, window(2, 30, 600))
        .with_clock(test_clock);

    for (i, ts) in [0u64, 60, 120, 10_120].into_iter().enumerate() {
        CLOCK_SECS.store(ts, Ordering::SeqCst);
        h.chain.set_committed(i as u64 + 1, (i as u64 + 1) * 10);
        task.tick().await.unwrap();
    }

    let estimator = DurationEstimator::commit(h.checkpoints.clone(), window(2, 30, 600));
    assert_eq!(estimator.stored_average().await.unwrap(), Some(60));
    // the batch checkpoint still advanced
    assert_eq!(h.checkpoints.get(Watermark::CommitBatchNum).await.unwrap(), 4);
}

#[tokio::test]
async fn test_store_failure_during_scan_retries_same_blocks() {
    let h = Harness::new(vec![deposit(1, 1, 100, LeafType::Asset)], 100);
    h.checkpoints.advance(Watermark::CommitBatchNum, 4).await.unwrap();
    h.checkpoints
        .advance(Watermark::CommitMaxBlockNum, 80)
        .await
        .unwrap();
    h.chain.set_committed(5, 120);
    let task = h
        .batch_task(BatchRole::Commit, DurationWindowConfig::commit_default())
        .with_clock(fixed_clock);

    h.records.set_failing(true);
    let err = task.tick().await.unwrap_err();
    assert_eq!(err.error_type(), "store");
    assert_eq!(h.checkpoints.get(Watermark::CommitBatchNum).await.unwrap(), 4);
    assert_eq!(
        h.checkpoints.get(Watermark::CommitMaxBlockNum).await.unwrap(),
        80
    );
    assert!(h.kv.list("bridge_commit_time_list").is_empty());
    assert!(!h.kv.is_locked(COMMIT_LOCK));

    h.records.set_failing(false);
    let outcome = task.tick().await.unwrap();
    assert_eq!(
        outcome,
        TickOutcome::Advanced {
            from: 4,
            to: 5,
            dispatched: 1
        }
    );
    let query = *h.records.queries().last().unwrap();
    assert_eq!((query.block_low, query.block_high), (81, 120));
    assert_eq!(h.settle().await, 1);
    assert_eq!(h.checkpoints.get(Watermark::CommitBatchNum).await.unwrap(), 5);
}

#[tokio::test]
async fn test_failed_batch_write_records_one_sample() {
    let h = Harness::new(vec![], 100);
    h.chain.set_committed(1, 10);
    let task = h
        .batch_task(BatchRole::Commit, DurationWindowConfig::commit_default())
        .with_clock(fixed_clock);

    h.faults.fail_next_set("bridge_commit_batch_num");
    let err = task.tick().await.unwrap_err();
    assert_eq!(err.error_type(), "kv_store");
    assert_eq!(h.checkpoints.get(Watermark::CommitBatchNum).await.unwrap(), 0);
    assert!(h.kv.list("bridge_commit_time_list").is_empty());

    assert!(matches!(
        task.tick().await.unwrap(),
        TickOutcome::Advanced { to: 1, .. }
    ));
    assert_eq!(h.checkpoints.get(Watermark::CommitBatchNum).await.unwrap(), 1);
    assert_eq!(h.kv.list("bridge_commit_time_list"), vec![fixed_clock()]);

    // the batch is now persisted, further ticks add nothing
    assert_eq!(task.tick().await.unwrap(), TickOutcome::NoChange);
    assert_eq!(h.kv.list("bridge_commit_time_list").len(), 1);
}
