// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use diesel::{Identifiable, Queryable, Selectable};
use serde::Serialize;

use crate::schema::{claim, deposit};

/// A bridge deposit as synced from its source network.
#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = deposit, primary_key(id))]
pub struct DepositRow {
    pub id: i64,
    pub leaf_type: i16,
    pub network_id: i32,
    pub orig_net: i32,
    pub orig_addr: String,
    pub amount: String,
    pub dest_net: i32,
    pub dest_addr: String,
    pub block_num: i64,
    pub deposit_cnt: i64,
    pub tx_hash: String,
    pub ready_for_claim: bool,
    pub time_ms: i64,
}

/// A claim of a deposit on its destination network.
#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = claim, primary_key(id))]
pub struct ClaimRow {
    pub id: i64,
    pub network_id: i32,
    pub idx: i64,
    pub orig_net: i32,
    pub orig_addr: String,
    pub amount: String,
    pub dest_addr: String,
    pub block_num: i64,
    pub tx_hash: String,
    pub time_ms: i64,
}
