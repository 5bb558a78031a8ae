// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Chain RPC access used by the sweep tasks

mod client;

pub use self::client::JsonRpcChainClient;

use async_trait::async_trait;
use std::fmt::Debug;

use crate::error::PushResult;

/// Read-only view of the chains the sweeps follow
#[async_trait]
pub trait ChainRpc: Send + Sync + Debug {
    /// Current head height of the L1 chain
    async fn head_height(&self) -> PushResult<u64>;

    /// Number of the latest batch committed (sequenced) to L1
    async fn latest_committed_batch(&self) -> PushResult<u64>;

    /// Number of the latest batch whose validity proof was verified on L1
    async fn latest_verified_batch(&self) -> PushResult<u64>;

    /// Highest block number included in `batch`.
    ///
    /// A batch that reports no blocks is a [`DataAnomaly`].
    ///
    /// [`DataAnomaly`]: crate::error::PushTaskError::DataAnomaly
    async fn max_block_number_for_batch(&self, batch: u64) -> PushResult<u64>;
}
