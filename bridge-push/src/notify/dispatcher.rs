// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Fire-and-forget status notifications
//!
//! Every dispatch runs on its own spawned task and is never awaited by the
//! caller. A failed send is logged and counted, then dropped.

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::message::{PushMessage, TransactionUpdate};
use super::transport::MessageTransport;
use crate::chain_ids::ChainIdTable;
use crate::config::EstimateConfig;
use crate::duration::DurationEstimator;
use crate::live::Live;
use crate::metrics::PushMetrics;
use crate::types::{global_index, now_ms, Claim, Deposit, TransactionStatus};

#[derive(Clone, Debug)]
pub struct Dispatcher {
    transport: Option<Arc<dyn MessageTransport>>,
    chain_ids: Live<ChainIdTable>,
    estimate: EstimateConfig,
    commit_durations: DurationEstimator,
    rollup_id: u32,
    biz_code: String,
    metrics: Arc<PushMetrics>,
}

impl Dispatcher {
    pub fn new(
        transport: Option<Arc<dyn MessageTransport>>,
        chain_ids: Live<ChainIdTable>,
        estimate: EstimateConfig,
        commit_durations: DurationEstimator,
        rollup_id: u32,
        biz_code: impl Into<String>,
        metrics: Arc<PushMetrics>,
    ) -> Self {
        if transport.is_none() {
            info!("[Dispatcher] No transport configured, notifications are disabled");
        }
        Self {
            transport,
            chain_ids,
            estimate,
            commit_durations,
            rollup_id,
            biz_code: biz_code.into(),
            metrics,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.transport.is_some()
    }

    /// Notify that `deposit` reached `status`.
    ///
    /// Returns `true` if a send was spawned. Message leaves and a missing
    /// transport both return `false` without doing anything.
    pub fn dispatch(&self, deposit: Deposit, status: TransactionStatus) -> bool {
        self.spawn_send(deposit, status, None)
    }

    /// Notify that `deposit` was claimed on its destination network.
    pub fn dispatch_claim(&self, deposit: Deposit, claim: Claim) -> bool {
        self.spawn_send(deposit, TransactionStatus::Claimed, Some(claim))
    }

    /// Notify that `deposit` was seen on its source network.
    pub fn dispatch_created(&self, deposit: Deposit) -> bool {
        self.spawn_send(deposit, TransactionStatus::Created, None)
    }

    fn spawn_send(&self, deposit: Deposit, status: TransactionStatus, claim: Option<Claim>) -> bool {
        let Some(transport) = self.transport.clone() else {
            return false;
        };
        if !deposit.is_asset() {
            debug!(
                "[Dispatcher] Skipping non-asset deposit {} ({})",
                deposit.deposit_count, deposit.tx_hash
            );
            self.metrics
                .dispatches
                .with_label_values(&[status.name(), "skipped"])
                .inc();
            return false;
        }

        let this = self.clone();
        tokio::spawn(async move {
            let update = this.build_update(&deposit, status, claim.as_ref()).await;
            let result = match PushMessage::new(&this.biz_code, &update, now_ms()) {
                Ok(message) => transport.send(&message).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => {
                    this.metrics
                        .dispatches
                        .with_label_values(&[status.name(), "sent"])
                        .inc();
                    debug!(
                        "[Dispatcher] Sent {} for deposit {} ({})",
                        status.name(),
                        deposit.deposit_count,
                        deposit.tx_hash
                    );
                }
                Err(e) => {
                    this.metrics
                        .dispatches
                        .with_label_values(&[status.name(), "failed"])
                        .inc();
                    warn!(
                        "[Dispatcher] Failed to send {} for deposit {} ({}): {}",
                        status.name(),
                        deposit.deposit_count,
                        deposit.tx_hash,
                        e
                    );
                }
            }
        });
        true
    }

    /// Project a deposit (and claim, if any) into the consumer-facing update.
    pub async fn build_update(
        &self,
        deposit: &Deposit,
        status: TransactionStatus,
        claim: Option<&Claim>,
    ) -> TransactionUpdate {
        let chain_ids = self.chain_ids.get();
        let mut update = TransactionUpdate {
            from_chain: deposit.network_id,
            to_chain: deposit.destination_network,
            from_chain_id: chain_ids.external_chain_id(deposit.network_id),
            to_chain_id: chain_ids.external_chain_id(deposit.destination_network),
            tx_hash: deposit.tx_hash.clone(),
            index: deposit.deposit_count as u64,
            status: status.code(),
            dest_addr: deposit.destination_address.clone(),
            global_index: Some(
                global_index(
                    deposit.from_l1(),
                    self.rollup_id.saturating_sub(1),
                    deposit.deposit_count,
                )
                .to_string(),
            ),
            ..Default::default()
        };

        match status {
            TransactionStatus::Created => {
                update.bridge_token = Some(deposit.original_address.clone());
                update.token_amount = Some(deposit.amount.clone());
                update.time = Some(deposit.created_at_ms);
                update.block_number = Some(deposit.block_number);
                update.estimate_time = Some(self.estimate_minutes(deposit, now_ms()).await);
            }
            TransactionStatus::Claimed => {
                if let Some(claim) = claim {
                    update.claim_tx_hash = Some(claim.tx_hash.clone());
                    update.claim_time = Some(claim.claimed_at_ms);
                }
            }
            _ => {}
        }
        update
    }

    /// Minutes until `deposit` is expected to complete.
    ///
    /// Deposits leaving a rollup wait for a batch commit, so their estimate is
    /// the commit average minus the time already spent. Everything else uses
    /// the flat per-network default.
    pub async fn estimate_minutes(&self, deposit: &Deposit, now_ms: u64) -> u32 {
        if deposit.from_l1() {
            return self.estimate.minutes_for_network(deposit.network_id);
        }
        let average_secs = self.commit_durations.average_or_default().await;
        let elapsed_secs = now_ms.saturating_sub(deposit.created_at_ms) / 1000;
        remaining_minutes(average_secs, elapsed_secs)
    }
}

/// `round_half_up((average - elapsed) / 60)`, never below 0
pub fn remaining_minutes(average_secs: u64, elapsed_secs: u64) -> u32 {
    let remaining = average_secs.saturating_sub(elapsed_secs);
    ((remaining + 30) / 60).min(u32::MAX as u64) as u32
}
