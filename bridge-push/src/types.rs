// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Bridge records as seen by the push pipeline

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Network id of the L1 (mainnet) leg.
pub const L1_NETWORK_ID: u32 = 0;

/// Distinguishes plain asset transfers from message-carrying transfers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LeafType {
    Asset,
    Message,
}

impl LeafType {
    pub fn as_u8(&self) -> u8 {
        match self {
            LeafType::Asset => 0,
            LeafType::Message => 1,
        }
    }

    pub fn is_asset(&self) -> bool {
        matches!(self, LeafType::Asset)
    }
}

impl From<u8> for LeafType {
    fn from(raw: u8) -> Self {
        match raw {
            0 => LeafType::Asset,
            _ => LeafType::Message,
        }
    }
}

/// Lifecycle status reported to notification consumers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionStatus {
    /// Deposit seen on its source network
    Created,
    /// Source block reached the L1 confirmation depth
    PendingAutoClaim,
    /// Covered by a committed batch
    PendingVerification,
    /// Covered by a verified batch
    Verified,
    /// Claimed on the destination network
    Claimed,
}

impl TransactionStatus {
    pub fn code(&self) -> u32 {
        match self {
            TransactionStatus::Created => 0,
            TransactionStatus::PendingAutoClaim => 1,
            TransactionStatus::PendingVerification => 2,
            TransactionStatus::Verified => 3,
            TransactionStatus::Claimed => 4,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TransactionStatus::Created => "created",
            TransactionStatus::PendingAutoClaim => "pending_auto_claim",
            TransactionStatus::PendingVerification => "pending_verification",
            TransactionStatus::Verified => "verified",
            TransactionStatus::Claimed => "claimed",
        }
    }
}

/// A transfer initiated on a source network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deposit {
    pub network_id: u32,
    pub destination_network: u32,
    pub destination_address: String,
    pub deposit_count: u32,
    pub leaf_type: LeafType,
    pub original_address: String,
    /// Decimal string, token amounts can exceed 64 bits
    pub amount: String,
    pub block_number: u64,
    pub tx_hash: String,
    pub created_at_ms: u64,
}

impl Deposit {
    pub fn is_asset(&self) -> bool {
        self.leaf_type.is_asset()
    }

    pub fn from_l1(&self) -> bool {
        self.network_id == L1_NETWORK_ID
    }
}

/// Finalization of a deposit on its destination network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    pub deposit_count: u32,
    pub origin_network: u32,
    pub tx_hash: String,
    pub claimed_at_ms: u64,
}

/// Global exit-tree index of a deposit.
///
/// `(mainnet_flag << 64) + (rollup_index << 32) + deposit_count`
pub fn global_index(mainnet: bool, rollup_index: u32, deposit_count: u32) -> u128 {
    let mainnet_flag: u128 = if mainnet { 1 } else { 0 };
    (mainnet_flag << 64) + ((rollup_index as u128) << 32) + deposit_count as u128
}

/// Wall-clock time in milliseconds since the Unix epoch
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Wall-clock time in seconds since the Unix epoch
pub fn now_secs() -> u64 {
    now_ms() / 1000
}
