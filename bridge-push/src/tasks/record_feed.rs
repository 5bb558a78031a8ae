// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{SweepTask, TickOutcome};
use crate::checkpoint::{CheckpointStore, Watermark};
use crate::error::PushResult;
use crate::lock::DistributedLock;
use crate::metrics::PushMetrics;
use crate::notify::Dispatcher;
use crate::store::RecordStore;

/// Which synced table a [`RecordFeedTask`] follows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFeed {
    /// New deposits, announced as created
    Deposits,
    /// New claims, announced as claimed
    Claims,
}

impl RecordFeed {
    pub fn name(&self) -> &'static str {
        match self {
            RecordFeed::Deposits => "DepositFeed",
            RecordFeed::Claims => "ClaimFeed",
        }
    }

    pub fn watermark(&self) -> Watermark {
        match self {
            RecordFeed::Deposits => Watermark::DepositFeedId,
            RecordFeed::Claims => Watermark::ClaimFeedId,
        }
    }
}

/// Follows a synced table by row id and notifies each new record.
///
/// The first tick on a fresh store only records the current latest id, so
/// history is never replayed. After that every page is dispatched before the
/// watermark moves past it.
pub struct RecordFeedTask {
    feed: RecordFeed,
    lock: DistributedLock,
    checkpoints: CheckpointStore,
    records: Arc<dyn RecordStore>,
    dispatcher: Dispatcher,
    page_size: u32,
    metrics: Arc<PushMetrics>,
}

/// Result of one feed page
struct FeedPage {
    rows: u64,
    last_id: Option<u64>,
    dispatched: u64,
}

impl RecordFeedTask {
    pub fn new(
        feed: RecordFeed,
        lock: DistributedLock,
        checkpoints: CheckpointStore,
        records: Arc<dyn RecordStore>,
        dispatcher: Dispatcher,
        page_size: u32,
        metrics: Arc<PushMetrics>,
    ) -> Self {
        Self {
            feed,
            lock,
            checkpoints,
            records,
            dispatcher,
            page_size: page_size.max(1),
            metrics,
        }
    }

    async fn sweep(&self) -> PushResult<TickOutcome> {
        let watermark = self.feed.watermark();
        let Some(from) = self.checkpoints.get_opt(watermark).await? else {
            let latest = match self.feed {
                RecordFeed::Deposits => self.records.latest_deposit_id().await?,
                RecordFeed::Claims => self.records.latest_claim_id().await?,
            };
            self.checkpoints.seed(watermark, latest).await?;
            info!(
                "[{}] Following records after id {}, earlier ones are not announced",
                self.name(),
                latest
            );
            return Ok(TickOutcome::NoChange);
        };

        let mut last = from;
        let mut dispatched = 0;
        loop {
            let page = match self.feed {
                RecordFeed::Deposits => self.deposit_page(last).await?,
                RecordFeed::Claims => self.claim_page(last).await?,
            };
            self.metrics
                .sweep_pages
                .with_label_values(&[self.name()])
                .inc();
            dispatched += page.dispatched;
            if let Some(id) = page.last_id {
                self.checkpoints.advance(watermark, id).await?;
                last = id;
            }
            if page.rows < self.page_size as u64 {
                break;
            }
        }

        if last == from {
            debug!("[{}] No record after id {}", self.name(), from);
            return Ok(TickOutcome::NoChange);
        }
        self.metrics
            .checkpoints
            .with_label_values(&[watermark.key_name()])
            .set(last as i64);
        Ok(TickOutcome::Advanced {
            from,
            to: last,
            dispatched,
        })
    }

    async fn deposit_page(&self, after_id: u64) -> PushResult<FeedPage> {
        let rows = self
            .records
            .query_deposits_after(after_id, self.page_size)
            .await?;
        let mut page = FeedPage {
            rows: rows.len() as u64,
            last_id: rows.last().map(|(id, _)| *id),
            dispatched: 0,
        };
        for (_, deposit) in rows {
            if self.dispatcher.dispatch_created(deposit) {
                page.dispatched += 1;
            }
        }
        Ok(page)
    }

    async fn claim_page(&self, after_id: u64) -> PushResult<FeedPage> {
        let rows = self
            .records
            .query_claims_after(after_id, self.page_size)
            .await?;
        let mut page = FeedPage {
            rows: rows.len() as u64,
            last_id: rows.last().map(|(id, _)| *id),
            dispatched: 0,
        };
        for (id, claim) in rows {
            let Some(deposit) = self
                .records
                .get_deposit(claim.origin_network, claim.deposit_count)
                .await?
            else {
                warn!(
                    "[{}] Claim {} ({}) has no synced deposit {} on network {}, skipping",
                    self.name(),
                    id,
                    claim.tx_hash,
                    claim.deposit_count,
                    claim.origin_network
                );
                continue;
            };
            if self.dispatcher.dispatch_claim(deposit, claim) {
                page.dispatched += 1;
            }
        }
        Ok(page)
    }
}

#[async_trait]
impl SweepTask for RecordFeedTask {
    fn name(&self) -> &'static str {
        self.feed.name()
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
