// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::sweep::DepositScanner;
use super::{SweepTask, TickOutcome};
use crate::chain::ChainRpc;
use crate::checkpoint::{CheckpointStore, Watermark};
use crate::duration::{DurationEstimator, SampleOutcome};
use crate::error::PushResult;
use crate::lock::DistributedLock;
use crate::metrics::PushMetrics;
use crate::types::{now_secs, TransactionStatus};

/// Which batch milestone a [`BatchSweepTask`] follows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchRole {
    Commit,
    Verify,
}

impl BatchRole {
    pub fn name(&self) -> &'static str {
        match self {
            BatchRole::Commit => "commit",
            BatchRole::Verify => "verify",
        }
    }

    pub fn status(&self) -> TransactionStatus {
        match self {
            BatchRole::Commit => TransactionStatus::PendingVerification,
            BatchRole::Verify => TransactionStatus::Verified,
        }
    }

    pub fn batch_watermark(&self) -> Watermark {
        match self {
            BatchRole::Commit => Watermark::CommitBatchNum,
            BatchRole::Verify => Watermark::VerifyBatchNum,
        }
    }

    pub fn ceiling_watermark(&self) -> Watermark {
        match self {
            BatchRole::Commit => Watermark::CommitMaxBlockNum,
            BatchRole::Verify => Watermark::VerifyMaxBlockNum,
        }
    }

    async fn latest_batch(&self, chain: &dyn ChainRpc) -> PushResult<u64> {
        match self {
            BatchRole::Commit => chain.latest_committed_batch().await,
            BatchRole::Verify => chain.latest_verified_batch().await,
        }
    }
}

/// Notifies deposits covered by a newly committed or verified batch
pub struct BatchSweepTask {
    role: BatchRole,
    lock: DistributedLock,
    checkpoints: CheckpointStore,
    chain: Arc<dyn ChainRpc>,
    scanner: DepositScanner,
    durations: DurationEstimator,
    network_id: u32,
    metrics: Arc<PushMetrics>,
    clock: fn() -> u64,
}

impl BatchSweepTask {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        role: BatchRole,
        lock: DistributedLock,
        checkpoints: CheckpointStore,
        chain: Arc<dyn ChainRpc>,
        scanner: DepositScanner,
        durations: DurationEstimator,
        network_id: u32,
        metrics: Arc<PushMetrics>,
    ) -> Self {
        Self {
            role,
            lock,
            checkpoints,
            chain,
            scanner,
            durations,
            network_id,
            metrics,
            clock: now_secs,
        }
    }

    /// Replace the wall clock (seconds) used for duration samples
    pub fn with_clock(mut self, clock: fn() -> u64) -> Self {
        self.clock = clock;
        self
    }

    pub fn role(&self) -> BatchRole {
        self.role
    }

    async fn record_duration(&self) -> PushResult<()> {
        match self.durations.record_sample((self.clock)()).await? {
            SampleOutcome::Accepted { average_secs } => {
                self.metrics
                    .average_durations
                    .with_label_values(&[self.role.name()])
                    .set(average_secs as i64);
            }
            SampleOutcome::Rejected { .. } => {
                self.metrics
                    .rejected_averages
                    .with_label_values(&[self.role.name()])
                    .inc();
            }
            SampleOutcome::Filling { .. } => {}
        }
        Ok(())
    }

    async fn sweep(&self) -> PushResult<TickOutcome> {
        let name = self.name();
        let latest = self.role.latest_batch(self.chain.as_ref()).await?;
        let stored = self.checkpoints.get(self.role.batch_watermark()).await?;
        if latest <= stored {
            debug!(
                "[{}] Latest batch {} not past checkpoint {}",
                name, latest, stored
            );
            return Ok(TickOutcome::NoChange);
        }

        let new_ceiling = self.chain.max_block_number_for_batch(latest).await?;
        let prev_ceiling = self.checkpoints.get(self.role.ceiling_watermark()).await?;

        // Checkpoints move only after the scan, so a failed page retries the
        // same block range on the next tick.
        let mut dispatched = 0;
        if new_ceiling > prev_ceiling {
            let summary = self
                .scanner
                .scan(
                    name,
                    self.network_id,
                    prev_ceiling + 1,
                    new_ceiling,
                    self.role.status(),
                )
                .await?;
            info!(
                "[{}] Batch {} covers blocks ({}, {}]: {} deposits over {} pages",
                name, latest, prev_ceiling, new_ceiling, summary.matched, summary.pages
            );
            dispatched = summary.dispatched;
        } else {
            warn!(
                "[{}] Batch {} ends at block {}, not past previous ceiling {}",
                name, latest, new_ceiling, prev_ceiling
            );
        }

        // Ceiling before batch number: a failure in between leaves a retry
        // that finds nothing left to scan.
        if self
            .checkpoints
            .advance(self.role.ceiling_watermark(), new_ceiling)
            .await?
        {
            self.metrics
                .checkpoints
                .with_label_values(&[self.role.ceiling_watermark().key_name()])
                .set(new_ceiling as i64);
        }
        self.checkpoints
            .advance(self.role.batch_watermark(), latest)
            .await?;
        self.metrics
            .checkpoints
            .with_label_values(&[self.role.batch_watermark().key_name()])
            .set(latest as i64);

        // One sample per observed batch, recorded once the batch is persisted.
        self.record_duration().await?;

        Ok(TickOutcome::Advanced {
            from: stored,
            to: latest,
            dispatched,
        })
    }
}

#[async_trait]
impl SweepTask for BatchSweepTask {
    fn name(&self) -> &'static str {
        match self.role {
            BatchRole::Commit => "CommittedBatch",
            BatchRole::Verify => "VerifiedBatch",
        }
    }

    async fn tick(&self) -> PushResult<TickOutcome> {
        let Some(guard) = self.lock.try_acquire().await? else {
            return Ok(TickOutcome::Locked);
        };
        let outcome = self.sweep().await;
        guard.release().await;
        outcome
    }
}
