// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use super::sweep::DepositScanner;
use super::{SweepTask, TickOutcome};
use crate::chain::ChainRpc;
use crate::checkpoint::{CheckpointStore, Watermark};
use crate::error::PushResult;
use crate::live::Live;
use crate::lock::DistributedLock;
use crate::metrics::PushMetrics;
use crate::types::TransactionStatus;

/// Source blocks that reached `confirmations` depth when the head moved from
/// `old_head` to `new_head`: `[old_head + 1 - C, new_head - C]`.
///
/// When the previous sweep recorded `last_scanned`, the window resumes right
/// after it instead, so a lowered `C` leaves no unscanned gap and a raised `C`
/// never rescans. With a constant `C` both starts coincide.
///
/// `None` when no block crossed the depth.
pub fn maturity_window(
    old_head: u64,
    new_head: u64,
    confirmations: u64,
    last_scanned: Option<u64>,
) -> Option<(u64, u64)> {
    let low = match last_scanned {
        Some(scanned) => scanned.saturating_add(1),
        None => old_head.saturating_add(1).saturating_sub(confirmations),
    };
    let high = new_head.checked_sub(confirmations)?;
    (low <= high).then_some((low, high))
}

/// Notifies deposits whose source block is deep enough on L1 to be auto-claimed
pub struct L1ConfirmationTask {
    lock: DistributedLock,
    checkpoints: CheckpointStore,
    chain: Arc<dyn ChainRpc>,
    scanner: DepositScanner,
    network_id: u32,
    confirmations: Live<u64>,
    metrics: Arc<PushMetrics>,
}

impl L1ConfirmationTask {
    pub fn new(
        lock: DistributedLock,
        checkpoints: CheckpointStore,
        chain: Arc<dyn ChainRpc>,
        scanner: DepositScanner,
        network_id: u32,
        confirmations: Live<u64>,
        metrics: Arc<PushMetrics>,
    ) -> Self {
        Self {
            lock,
            checkpoints,
            chain,
            scanner,
            network_id,
            confirmations,
            metrics,
        }
    }

    async fn sweep(&self) -> PushResult<TickOutcome> {
        let old_head = self.checkpoints.get(Watermark::L1BlockNum).await?;
        let new_head = self.chain.head_height().await?;
        if new_head <= old_head {
            debug!(
                "[{}] Head {} not past checkpoint {}",
                self.name(),
                new_head,
                old_head
            );
            return Ok(TickOutcome::NoChange);
        }

        let confirmations = self.confirmations.get();
        let last_scanned = self.checkpoints.get_opt(Watermark::L1ScannedBlockNum).await?;
        let mut dispatched = 0;
        let mut scanned_high = None;
        match maturity_window(old_head, new_head, confirmations, last_scanned) {
            Some((low, high)) => {
                let summary = self
                    .scanner
                    .scan(
                        self.name(),
                        self.network_id,
                        low,
                        high,
                        TransactionStatus::PendingAutoClaim,
                    )
                    .await?;
                info!(
                    "[{}] Blocks [{}, {}] matured: {} deposits over {} pages",
                    self.name(),
                    low,
                    high,
                    summary.matched,
                    summary.pages
                );
                dispatched = summary.dispatched;
                scanned_high = Some(high);
            }
            None => debug!(
                "[{}] No block reached {} confirmations between heads {} and {}",
                self.name(),
                confirmations,
                old_head,
                new_head
            ),
        }

        if let Some(high) = scanned_high {
            self.checkpoints
                .advance(Watermark::L1ScannedBlockNum, high)
                .await?;
        }
        self.checkpoints
            .advance(Watermark::L1BlockNum, new_head)
            .await?;
        self.metrics
            .checkpoints
            .with_label_values(&[Watermark::L1BlockNum.key_name()])
            .set(new_head as i64);

        Ok(TickOutcome::Advanced {
            from: old_head,
            to: new_head,
            dispatched,
        })
    }
}

#[async_trait]
impl SweepTask for L1ConfirmationTask {
    fn name(&self) -> &'static str {
        "L1Confirmation"
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
