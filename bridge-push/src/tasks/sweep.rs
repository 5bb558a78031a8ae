// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use tracing::debug;

use crate::error::PushResult;
use crate::metrics::PushMetrics;
use crate::notify::Dispatcher;
use crate::store::RecordStore;
use crate::types::TransactionStatus;

/// Totals for one paged scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub pages: u64,
    pub matched: u64,
    pub dispatched: u64,
}

/// Pages through maturing deposits and hands each one to the dispatcher
#[derive(Debug, Clone)]
pub struct DepositScanner {
    store: Arc<dyn RecordStore>,
    dispatcher: Dispatcher,
    metrics: Arc<PushMetrics>,
    page_size: u32,
}

impl DepositScanner {
    pub fn new(
        store: Arc<dyn RecordStore>,
        dispatcher: Dispatcher,
        metrics: Arc<PushMetrics>,
        page_size: u32,
    ) -> Self {
        Self {
            store,
            dispatcher,
            metrics,
            page_size: page_size.max(1),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Dispatch `status` for every deposit from `network_id` maturing in
    /// `[block_low, block_high]`.
    ///
    /// Stops after the first page shorter than the page size. An empty range
    /// issues no query at all.
    pub async fn scan(
        &self,
        task: &'static str,
        network_id: u32,
        block_low: u64,
        block_high: u64,
        status: TransactionStatus,
    ) -> PushResult<ScanSummary> {
        let mut summary = ScanSummary::default();
        if block_low > block_high {
            return Ok(summary);
        }

        let mut offset = 0u64;
        loop {
            let page = self
                .store
                .query_maturing_deposits(network_id, block_low, block_high, self.page_size, offset)
                .await?;
            summary.pages += 1;
            self.metrics.sweep_pages.with_label_values(&[task]).inc();

            let rows = page.len() as u64;
            summary.matched += rows;
            for deposit in page {
                if self.dispatcher.dispatch(deposit, status) {
                    summary.dispatched += 1;
                }
            }
            debug!(
                "[{}] Page at offset {} returned {} deposits in [{}, {}]",
                task, offset, rows, block_low, block_high
            );

            if rows < self.page_size as u64 {
                break;
            }
            offset += rows;
        }
        Ok(summary)
    }
}
