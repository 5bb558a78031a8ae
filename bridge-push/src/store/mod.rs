// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Read-only access to synced bridge records

mod pg;

pub use self::pg::PgRecordStore;

use async_trait::async_trait;
use std::fmt::Debug;

use crate::error::PushResult;
use crate::types::{Claim, Deposit};

#[async_trait]
pub trait RecordStore: Send + Sync + Debug {
    /// Deposits from `network_id` not yet flagged ready for claim, with a source
    /// block in `[block_low, block_high]`.
    ///
    /// Ordered by a stable key so `offset` pages never overlap.
    async fn query_maturing_deposits(
        &self,
        network_id: u32,
        block_low: u64,
        block_high: u64,
        limit: u32,
        offset: u64,
    ) -> PushResult<Vec<Deposit>>;

    /// Deposits with a row id above `after_id`, oldest first, paired with their id.
    async fn query_deposits_after(&self, after_id: u64, limit: u32) -> PushResult<Vec<(u64, Deposit)>>;

    /// Claims with a row id above `after_id`, oldest first, paired with their id.
    async fn query_claims_after(&self, after_id: u64, limit: u32) -> PushResult<Vec<(u64, Claim)>>;

    /// The deposit `deposit_count` made on `network_id`, if synced.
    async fn get_deposit(&self, network_id: u32, deposit_count: u32) -> PushResult<Option<Deposit>>;

    /// Highest deposit row id, 0 for an empty table
    async fn latest_deposit_id(&self) -> PushResult<u64>;

    /// Highest claim row id, 0 for an empty table
    async fn latest_claim_id(&self) -> PushResult<u64>;
}
