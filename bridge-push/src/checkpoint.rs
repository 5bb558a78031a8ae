// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Checkpoint Store
//!
//! Watermarks shared by all replicas, kept in the [`KvStore`].
//!
//! ## Watermark Semantics
//! - A watermark only moves forward. Writes that would lower it are refused.
//! - Absent watermarks read as 0, so a fresh deployment starts from genesis.
//! - Writes happen only while holding the lock of the task that owns the key.
//!
//! [`KvStore`]: crate::storage::KvStore

use tracing::{debug, warn};

use crate::error::PushResult;
use crate::storage::SharedKvStore;

/// The watermarks tracked by the sweep tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Watermark {
    /// Last observed L1 head height
    L1BlockNum,
    /// Highest source block already swept for L1 confirmations
    L1ScannedBlockNum,
    /// Last committed batch number
    CommitBatchNum,
    /// Highest block covered by the last committed batch
    CommitMaxBlockNum,
    /// Last verified batch number
    VerifyBatchNum,
    /// Highest block covered by the last verified batch
    VerifyMaxBlockNum,
    /// Last deposit row announced as created
    DepositFeedId,
    /// Last claim row announced as claimed
    ClaimFeedId,
}

impl Watermark {
    pub fn key_name(&self) -> &'static str {
        match self {
            Watermark::L1BlockNum => "bridge_l1_block_num",
            Watermark::L1ScannedBlockNum => "bridge_l1_scanned_block_num",
            Watermark::CommitBatchNum => "bridge_commit_batch_num",
            Watermark::CommitMaxBlockNum => "bridge_commit_max_block_num",
            Watermark::VerifyBatchNum => "bridge_verify_batch_num",
            Watermark::VerifyMaxBlockNum => "bridge_verify_max_block_num",
            Watermark::DepositFeedId => "bridge_push_deposit_id",
            Watermark::ClaimFeedId => "bridge_push_claim_id",
        }
    }

    pub const ALL: [Watermark; 8] = [
        Watermark::L1BlockNum,
        Watermark::L1ScannedBlockNum,
        Watermark::CommitBatchNum,
        Watermark::CommitMaxBlockNum,
        Watermark::VerifyBatchNum,
        Watermark::VerifyMaxBlockNum,
        Watermark::DepositFeedId,
        Watermark::ClaimFeedId,
    ];
}

/// Monotonic watermarks in the shared store
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    store: SharedKvStore,
    namespace: String,
}

impl CheckpointStore {
    pub fn new(store: SharedKvStore, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
        }
    }

    /// Full key for a name, with the namespace prefix applied
    pub fn key(&self, name: &str) -> String {
        if self.namespace.is_empty() {
            name.to_string()
        } else {
            format!("{}:{}", self.namespace, name)
        }
    }

    pub fn store(&self) -> &SharedKvStore {
        &self.store
    }

    /// Read a watermark, 0 if never written
    pub async fn get(&self, watermark: Watermark) -> PushResult<u64> {
        Ok(self
            .store
            .get_int(&self.key(watermark.key_name()))
            .await?
            .unwrap_or(0))
    }

    /// Read a watermark, `None` if never written
    pub async fn get_opt(&self, watermark: Watermark) -> PushResult<Option<u64>> {
        self.store.get_int(&self.key(watermark.key_name())).await
    }

    /// Write `value` only if the watermark was never written.
    ///
    /// Returns `true` if this call wrote it.
    pub async fn seed(&self, watermark: Watermark, value: u64) -> PushResult<bool> {
        let key = self.key(watermark.key_name());
        if self.store.get_int(&key).await?.is_some() {
            return Ok(false);
        }
        self.store.set_int(&key, value).await?;
        debug!("[Checkpoint] {} seeded at {}", key, value);
        Ok(true)
    }

    /// Move a watermark forward.
    ///
    /// Returns `Ok(false)` without writing when `value` is below the stored one.
    /// Writing the same value again is allowed and a no-op in effect.
    pub async fn advance(&self, watermark: Watermark, value: u64) -> PushResult<bool> {
        let key = self.key(watermark.key_name());
        let current = self.store.get_int(&key).await?.unwrap_or(0);
        if value < current {
            warn!(
                "[Checkpoint] Refusing to move {} backwards: {} -> {}",
                key, current, value
            );
            return Ok(false);
        }
        if value == current {
            return Ok(true);
        }
        self.store.set_int(&key, value).await?;
        debug!("[Checkpoint] {} advanced {} -> {}", key, current, value);
        Ok(true)
    }
}
