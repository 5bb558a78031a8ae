// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper};
use diesel_async::RunQueryDsl;
use starcoin_bridge_pg_db::{Connection, Db};
use starcoin_bridge_schema::models::{ClaimRow, DepositRow};
use starcoin_bridge_schema::schema::{claim, deposit};
use std::future::Future;
use std::time::Duration;

use super::RecordStore;
use crate::error::{PushResult, PushTaskError};
use crate::types::{Claim, Deposit, LeafType};

/// [`RecordStore`] over the bridge Postgres database
#[derive(Debug, Clone)]
pub struct PgRecordStore {
    db: Db,
    timeout: Duration,
}

impl PgRecordStore {
    pub fn new(db: Db, timeout: Duration) -> Self {
        Self { db, timeout }
    }

    async fn connect(&self) -> PushResult<Connection<'_>> {
        self.db
            .connect()
            .await
            .map_err(|e| PushTaskError::Store(format!("{:#}", e)))
    }

    async fn bounded<T, F>(&self, what: &str, query: F) -> PushResult<T>
    where
        F: Future<Output = PushResult<T>>,
    {
        tokio::time::timeout(self.timeout, query)
            .await
            .map_err(|_| {
                PushTaskError::Store(format!("{} timed out after {:?}", what, self.timeout))
            })?
    }
}

fn to_i64(value: u64, what: &str) -> PushResult<i64> {
    i64::try_from(value).map_err(|_| PushTaskError::Store(format!("{} {} out of range", what, value)))
}

impl From<DepositRow> for Deposit {
    fn from(row: DepositRow) -> Self {
        Deposit {
            network_id: row.network_id.max(0) as u32,
            destination_network: row.dest_net.max(0) as u32,
            destination_address: row.dest_addr,
            deposit_count: row.deposit_cnt.max(0) as u32,
            leaf_type: LeafType::from(row.leaf_type.clamp(0, u8::MAX as i16) as u8),
            original_address: row.orig_addr,
            amount: row.amount,
            block_number: row.block_num.max(0) as u64,
            tx_hash: row.tx_hash,
            created_at_ms: row.time_ms.max(0) as u64,
        }
    }
}

impl From<ClaimRow> for Claim {
    /// The claim row records the network it was claimed on. With a single
    /// rollup the deposit came from the other network.
    fn from(row: ClaimRow) -> Self {
        let network_id = row.network_id.max(0) as u32;
        Claim {
            deposit_count: row.idx.clamp(0, u32::MAX as i64) as u32,
            origin_network: 1 - network_id.min(1),
            tx_hash: row.tx_hash,
            claimed_at_ms: row.time_ms.max(0) as u64,
        }
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn query_maturing_deposits(
        &self,
        network_id: u32,
        block_low: u64,
        block_high: u64,
        limit: u32,
        offset: u64,
    ) -> PushResult<Vec<Deposit>> {
        let low = to_i64(block_low, "block_low")?;
        let high = to_i64(block_high, "block_high")?;
        let offset = to_i64(offset, "offset")?;

        let rows = self
            .bounded("deposit page query", async {
                let mut conn = self.connect().await?;
                let rows: Vec<DepositRow> = deposit::table
                    .filter(deposit::network_id.eq(network_id as i32))
                    .filter(deposit::ready_for_claim.eq(false))
                    .filter(deposit::block_num.between(low, high))
                    .order(deposit::id.asc())
                    .limit(limit as i64)
                    .offset(offset)
                    .select(DepositRow::as_select())
                    .load(&mut *conn)
                    .await?;
                Ok(rows)
            })
            .await?;
        Ok(rows.into_iter().map(Deposit::from).collect())
    }

    async fn query_deposits_after(&self, after_id: u64, limit: u32) -> PushResult<Vec<(u64, Deposit)>> {
        let after = to_i64(after_id, "after_id")?;
        let rows = self
            .bounded("deposit feed query", async {
                let mut conn = self.connect().await?;
                let rows: Vec<DepositRow> = deposit::table
                    .filter(deposit::id.gt(after))
                    .order(deposit::id.asc())
                    .limit(limit as i64)
                    .select(DepositRow::as_select())
                    .load(&mut *conn)
                    .await?;
                Ok(rows)
            })
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| (row.id.max(0) as u64, Deposit::from(row)))
            .collect())
    }

    async fn query_claims_after(&self, after_id: u64, limit: u32) -> PushResult<Vec<(u64, Claim)>> {
        let after = to_i64(after_id, "after_id")?;
        let rows = self
            .bounded("claim feed query", async {
                let mut conn = self.connect().await?;
                let rows: Vec<ClaimRow> = claim::table
                    .filter(claim::id.gt(after))
                    .order(claim::id.asc())
                    .limit(limit as i64)
                    .select(ClaimRow::as_select())
                    .load(&mut *conn)
                    .await?;
                Ok(rows)
            })
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| (row.id.max(0) as u64, Claim::from(row)))
            .collect())
    }

    async fn get_deposit(&self, network_id: u32, deposit_count: u32) -> PushResult<Option<Deposit>> {
        let row = self
            .bounded("deposit lookup", async {
                let mut conn = self.connect().await?;
                let row: Option<DepositRow> = deposit::table
                    .filter(deposit::network_id.eq(network_id as i32))
                    .filter(deposit::deposit_cnt.eq(deposit_count as i64))
                    .select(DepositRow::as_select())
                    .first(&mut *conn)
                    .await
                    .optional()?;
                Ok(row)
            })
            .await?;
        Ok(row.map(Deposit::from))
    }

    async fn latest_deposit_id(&self) -> PushResult<u64> {
        let max = self
            .bounded("latest deposit id", async {
                let mut conn = self.connect().await?;
                let max: Option<i64> = deposit::table
                    .select(diesel::dsl::max(deposit::id))
                    .first(&mut *conn)
                    .await?;
                Ok(max)
            })
            .await?;
        Ok(max.unwrap_or(0).max(0) as u64)
    }

    async fn latest_claim_id(&self) -> PushResult<u64> {
        let max = self
            .bounded("latest claim id", async {
                let mut conn = self.connect().await?;
                let max: Option<i64> = claim::table
                    .select(diesel::dsl::max(claim::id))
                    .first(&mut *conn)
                    .await?;
                Ok(max)
            })
            .await?;
        Ok(max.unwrap_or(0).max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(leaf_type: i16) -> DepositRow {
        DepositRow {
            id: 1,
            leaf_type,
            network_id: 0,
            orig_net: 0,
            orig_addr: "0x0000000000000000000000000000000000000000".into(),
            amount: "5".into(),
            dest_net: 1,
            dest_addr: "0xabc".into(),
            block_num: 50,
            deposit_cnt: 9,
            tx_hash: "0x01".into(),
            ready_for_claim: false,
            time_ms: 1_700_000_000_000,
        }
    }

    #[test]
    fn test_row_conversion() {
        let d = Deposit::from(row(0));
        assert_eq!(d.network_id, 0);
        assert_eq!(d.destination_network, 1);
        assert_eq!(d.deposit_count, 9);
        assert_eq!(d.block_number, 50);
        assert!(d.is_asset());
        assert!(!Deposit::from(row(1)).is_asset());
    }

    #[test]
    fn test_claim_row_points_back_to_origin() {
        let claim = Claim::from(ClaimRow {
            id: 4,
            network_id: 1,
            idx: 9,
            orig_net: 0,
            orig_addr: "0x0000000000000000000000000000000000000000".into(),
            amount: "5".into(),
            dest_addr: "0xabc".into(),
            block_num: 80,
            tx_hash: "0x02".into(),
            time_ms: 1_700_000_060_000,
        });
        assert_eq!(claim.origin_network, 0);
        assert_eq!(claim.deposit_count, 9);
        assert_eq!(claim.claimed_at_ms, 1_700_000_060_000);
    }

    #[test]
    fn test_out_of_range_bounds() {
        assert!(to_i64(u64::MAX, "block_high").is_err());
        assert_eq!(to_i64(101, "block_high").unwrap(), 101);
    }
}
