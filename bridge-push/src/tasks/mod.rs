// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Periodic sweep tasks
//!
//! Each task runs one `tick` per interval. A tick either finds the task lock
//! held elsewhere, finds nothing new, or advances its checkpoint and
//! dispatches notifications for the deposits that matured (or, for the record
//! feeds, for the rows synced since the last tick).
//!
//! ```text
//!  interval ──► tick ──► try lock ──┬── held ──────────────► Locked
//!                                   └── acquired ──► read remote state
//!                                                    │
//!                               not ahead of store ──┼──► NoChange
//!                                                    ▼
//!                                   page + dispatch, then write checkpoint(s)
//!                                                    │
//!                                                    ▼
//!                                            release ──► Advanced
//! ```

mod batch;
mod l1_confirmation;
mod record_feed;
mod sweep;

pub use self::batch::{BatchRole, BatchSweepTask};
pub use self::l1_confirmation::{maturity_window, L1ConfirmationTask};
pub use self::record_feed::{RecordFeed, RecordFeedTask};
pub use self::sweep::{DepositScanner, ScanSummary};

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::PushResult;
use crate::metrics::PushMetrics;

/// Result of one successful tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Another replica holds the task lock
    Locked,
    /// Remote state has not moved past the stored checkpoint
    NoChange,
    /// Checkpoint moved from `from` to `to`
    Advanced { from: u64, to: u64, dispatched: u64 },
}

impl TickOutcome {
    fn label(&self) -> &'static str {
        match self {
            TickOutcome::Locked => "skipped_locked",
            TickOutcome::NoChange => "no_change",
            TickOutcome::Advanced { .. } => "ok",
        }
    }
}

#[async_trait]
pub trait SweepTask: Send + Sync {
    fn name(&self) -> &'static str;

    /// Run one sweep. Errors leave every checkpoint untouched.
    async fn tick(&self) -> PushResult<TickOutcome>;
}

/// Run `task.tick()` every `interval` until `cancel` fires.
///
/// Cancellation is only observed between ticks, a tick in progress always
/// runs to completion.
pub fn spawn_periodic(
    task: Arc<dyn SweepTask>,
    interval: Duration,
    metrics: Arc<PushMetrics>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let name = task.name();
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!("[{}] Started with interval: {:?}", name, interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("[{}] Cancelled", name);
                    break;
                }
                _ = ticker.tick() => {
                    run_tick(task.as_ref(), &metrics).await;
                }
            }
        }
    })
}

async fn run_tick(task: &dyn SweepTask, metrics: &PushMetrics) {
    let name = task.name();
    match task.tick().await {
        Ok(outcome) => {
            metrics
                .sweep_ticks
                .with_label_values(&[name, outcome.label()])
                .inc();
            match outcome {
                TickOutcome::Advanced {
                    from,
                    to,
                    dispatched,
                } => info!(
                    "[{}] Advanced {} -> {}, dispatched {} notifications",
                    name, from, to, dispatched
                ),
                other => debug!("[{}] Tick finished: {:?}", name, other),
            }
        }
        Err(e) => {
            metrics
                .sweep_ticks
                .with_label_values(&[name, "error"])
                .inc();
            metrics
                .sweep_errors
                .with_label_values(&[name, e.error_type()])
                .inc();
            warn!("[{}] Tick aborted, retrying next interval: {}", name, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PushTaskError;
    use crate::lock::DistributedLock;
    use crate::storage::MemoryKvStore;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[derive(Default)]
    struct CountingTask {
        ticks: AtomicU64,
        fail: bool,
    }

    #[async_trait]
    impl SweepTask for CountingTask {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn tick(&self) -> PushResult<TickOutcome> {
            let n = self.ticks.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(PushTaskError::Rpc("down".into()));
            }
            Ok(TickOutcome::Advanced {
                from: n,
                to: n + 1,
                dispatched: 0,
            })
        }
    }

    /// Holds its lock across a long critical section
    struct SlowTask {
        lock: DistributedLock,
        started: AtomicU64,
        completed: AtomicU64,
    }

    #[async_trait]
    impl SweepTask for SlowTask {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn tick(&self) -> PushResult<TickOutcome> {
            let Some(guard) = self.lock.try_acquire().await? else {
                return Ok(TickOutcome::Locked);
            };
            self.started.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(5)).await;
            self.completed.fetch_add(1, Ordering::SeqCst);
            guard.release().await;
            Ok(TickOutcome::NoChange)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_lets_in_flight_tick_finish() {
        let store = Arc::new(MemoryKvStore::new());
        let task = Arc::new(SlowTask {
            lock: DistributedLock::new(store.clone(), "slow_lock", Duration::from_secs(10)),
            started: AtomicU64::new(0),
            completed: AtomicU64::new(0),
        });
        let cancel = CancellationToken::new();
        let handle = spawn_periodic(
            task.clone(),
            Duration::from_secs(60),
            PushMetrics::new_for_testing(),
            cancel.clone(),
        );

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(task.started.load(Ordering::SeqCst), 1);
        assert!(store.is_locked("slow_lock"));

        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(task.completed.load(Ordering::SeqCst), 1);
        assert!(!store.is_locked("slow_lock"));
        // no new tick was started after cancellation
        assert_eq!(task.started.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_until_cancelled() {
        let task = Arc::new(CountingTask::default());
        let cancel = CancellationToken::new();
        let metrics = PushMetrics::new_for_testing();
        let handle = spawn_periodic(
            task.clone(),
            Duration::from_secs(1),
            metrics.clone(),
            cancel.clone(),
        );

        tokio::time::sleep(Duration::from_millis(3500)).await;
        cancel.cancel();
        handle.await.unwrap();

        let ticks = task.ticks.load(Ordering::SeqCst);
        assert!((3..=5).contains(&ticks), "ticks = {}", ticks);
        assert_eq!(
            metrics
                .sweep_ticks
                .with_label_values(&["counting", "ok"])
                .get(),
            ticks
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_do_not_stop_the_loop() {
        let task = Arc::new(CountingTask {
            fail: true,
            ..Default::default()
        });
        let cancel = CancellationToken::new();
        let metrics = PushMetrics::new_for_testing();
        let handle = spawn_periodic(
            task.clone(),
            Duration::from_secs(1),
            metrics.clone(),
            cancel.clone(),
        );

        tokio::time::sleep(Duration::from_millis(2500)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert!(task.ticks.load(Ordering::SeqCst) >= 2);
        assert!(
            metrics
                .sweep_errors
                .with_label_values(&["counting", "rpc"])
                .get()
                >= 2
        );
    }
}
