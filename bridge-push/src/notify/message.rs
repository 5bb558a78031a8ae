// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Serialize;

use crate::error::{PushResult, PushTaskError};

const REQUEST_ID_LEN: usize = 16;

/// Status update for one bridge transaction, as consumers receive it.
///
/// Optional fields are omitted from the JSON when unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionUpdate {
    pub from_chain: u32,
    pub to_chain: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_chain_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_chain_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bridge_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_amount: Option<String>,
    /// Minutes until the transfer is expected to complete
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimate_time: Option<u32>,
    /// Deposit creation time, ms
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<u64>,
    pub tx_hash: String,
    pub index: u64,
    pub status: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    pub dest_addr: String,
    /// Decimal rendering of the u128 global index
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_index: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claim_tx_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claim_time: Option<u64>,
}

/// Envelope handed to the transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushMessage {
    pub biz_code: String,
    pub wallet_address: String,
    pub request_id: String,
    /// JSON array holding the single [`TransactionUpdate`]
    pub push_content: String,
    pub time: u64,
}

impl PushMessage {
    pub fn new(biz_code: &str, update: &TransactionUpdate, now_ms: u64) -> PushResult<Self> {
        let push_content = serde_json::to_string(&[update])
            .map_err(|e| PushTaskError::Internal(format!("encode transaction update: {}", e)))?;
        Ok(Self {
            biz_code: biz_code.to_string(),
            wallet_address: update.dest_addr.clone(),
            request_id: request_id(),
            push_content,
            time: now_ms,
        })
    }

    pub fn to_json(&self) -> PushResult<String> {
        serde_json::to_string(self)
            .map_err(|e| PushTaskError::Internal(format!("encode push message: {}", e)))
    }
}

fn request_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(REQUEST_ID_LEN)
        .map(char::from)
        .collect()
}
