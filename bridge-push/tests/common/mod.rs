// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

#![allow(dead_code)]

use async_trait::async_trait;
use starcoin_bridge_push::chain::ChainRpc;
use starcoin_bridge_push::chain_ids::ChainIdTable;
use starcoin_bridge_push::checkpoint::CheckpointStore;
use starcoin_bridge_push::config::{EstimateConfig, PushConfig};
use starcoin_bridge_push::duration::{DurationEstimator, DurationWindowConfig};
use starcoin_bridge_push::error::{PushResult, PushTaskError};
use starcoin_bridge_push::live::Live;
use starcoin_bridge_push::lock::DistributedLock;
use starcoin_bridge_push::metrics::PushMetrics;
use starcoin_bridge_push::notify::{Dispatcher, MessageTransport, RecordingTransport};
use starcoin_bridge_push::storage::{KvStore, MemoryKvStore};
use starcoin_bridge_push::store::RecordStore;
use starcoin_bridge_push::tasks::{
    BatchRole, BatchSweepTask, DepositScanner, L1ConfirmationTask, RecordFeed, RecordFeedTask,
};
use starcoin_bridge_push::types::{Claim, Deposit, LeafType};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const L1_LOCK: &str = "bridge_l1_block_num_lock";
pub const COMMIT_LOCK: &str = "sync_l1_committed_batch_lock";
pub const VERIFY_LOCK: &str = "sync_l1_verified_batch_lock";
pub const DEPOSIT_FEED_LOCK: &str = "bridge_push_deposit_feed_lock";
pub const CLAIM_FEED_LOCK: &str = "bridge_push_claim_feed_lock";

pub fn deposit(network_id: u32, deposit_count: u32, block_number: u64, leaf_type: LeafType) -> Deposit {
    Deposit {
        network_id,
        destination_network: if network_id == 0 { 1 } else { 0 },
        destination_address: format!("0x{:040x}", deposit_count),
        deposit_count,
        leaf_type,
        original_address: "0x0000000000000000000000000000000000000000".to_string(),
        amount: "1000".to_string(),
        block_number,
        tx_hash: format!("0x{:064x}", deposit_count),
        created_at_ms: 1_700_000_000_000,
    }
}

/// Claim of `deposit_count` made on the network opposite `origin_network`
pub fn claim(origin_network: u32, deposit_count: u32) -> Claim {
    Claim {
        deposit_count,
        origin_network,
        tx_hash: format!("0x{:064x}", 0xc1a1_0000u64 + deposit_count as u64),
        claimed_at_ms: 1_700_000_090_000,
    }
}

#[derive(Debug, Default)]
struct ChainState {
    head: u64,
    committed: u64,
    verified: u64,
    ceilings: HashMap<u64, u64>,
    calls: u64,
    unavailable: bool,
    delay: Duration,
}

/// Scripted chain: heads and batch numbers are set by the test
#[derive(Debug, Default)]
pub struct FakeChain {
    state: Mutex<ChainState>,
}

impl FakeChain {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_head(&self, head: u64) {
        self.state.lock().unwrap().head = head;
    }

    pub fn set_committed(&self, batch: u64, max_block: u64) {
        let mut state = self.state.lock().unwrap();
        state.committed = batch;
        state.ceilings.insert(batch, max_block);
    }

    pub fn set_verified(&self, batch: u64, max_block: u64) {
        let mut state = self.state.lock().unwrap();
        state.verified = batch;
        state.ceilings.insert(batch, max_block);
    }

    /// A batch whose block list comes back empty
    pub fn set_committed_without_blocks(&self, batch: u64) {
        let mut state = self.state.lock().unwrap();
        state.committed = batch;
        state.ceilings.remove(&batch);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unwrap().unavailable = unavailable;
    }

    /// Every call sleeps this long before answering
    pub fn set_delay(&self, delay: Duration) {
        self.state.lock().unwrap().delay = delay;
    }

    pub fn calls(&self) -> u64 {
        self.state.lock().unwrap().calls
    }

    async fn read<T>(&self, f: impl FnOnce(&ChainState) -> PushResult<T>) -> PushResult<T> {
        let delay = self.state.lock().unwrap().delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        if state.unavailable {
            return Err(PushTaskError::Rpc("connection refused".into()));
        }
        f(&state)
    }
}

#[async_trait]
impl ChainRpc for FakeChain {
    async fn head_height(&self) -> PushResult<u64> {
        self.read(|s| Ok(s.head)).await
    }

    async fn latest_committed_batch(&self) -> PushResult<u64> {
        self.read(|s| Ok(s.committed)).await
    }

    async fn latest_verified_batch(&self) -> PushResult<u64> {
        self.read(|s| Ok(s.verified)).await
    }

    async fn max_block_number_for_batch(&self, batch: u64) -> PushResult<u64> {
        self.read(|s| {
            s.ceilings
                .get(&batch)
                .copied()
                .ok_or_else(|| PushTaskError::DataAnomaly(format!("batch {} has no blocks", batch)))
        })
        .await
    }
}

/// One `query_maturing_deposits` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageQuery {
    pub network_id: u32,
    pub block_low: u64,
    pub block_high: u64,
    pub limit: u32,
    pub offset: u64,
}

/// Row ids are positions in insertion order, starting at 1
#[derive(Debug, Default)]
pub struct FakeRecordStore {
    deposits: Mutex<Vec<Deposit>>,
    claims: Mutex<Vec<Claim>>,
    queries: Mutex<Vec<PageQuery>>,
    failing: Mutex<bool>,
}

impl FakeRecordStore {
    pub fn new(deposits: Vec<Deposit>) -> Arc<Self> {
        Arc::new(Self {
            deposits: Mutex::new(deposits),
            ..Default::default()
        })
    }

    pub fn queries(&self) -> Vec<PageQuery> {
        self.queries.lock().unwrap().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    pub fn push_deposit(&self, deposit: Deposit) {
        self.deposits.lock().unwrap().push(deposit);
    }

    pub fn push_claim(&self, claim: Claim) {
        self.claims.lock().unwrap().push(claim);
    }

    fn check_available(&self) -> PushResult<()> {
        if *self.failing.lock().unwrap() {
            return Err(PushTaskError::Store("database is down".into()));
        }
        Ok(())
    }
}

fn rows_after<T: Clone>(rows: &[T], after_id: u64, limit: u32) -> Vec<(u64, T)> {
    rows.iter()
        .enumerate()
        .map(|(i, row)| (i as u64 + 1, row.clone()))
        .filter(|(id, _)| *id > after_id)
        .take(limit as usize)
        .collect()
}

#[async_trait]
impl RecordStore for FakeRecordStore {
    async fn query_maturing_deposits(
        &self,
        network_id: u32,
        block_low: u64,
        block_high: u64,
        limit: u32,
        offset: u64,
    ) -> PushResult<Vec<Deposit>> {
        self.queries.lock().unwrap().push(PageQuery {
            network_id,
            block_low,
            block_high,
            limit,
            offset,
        });
        self.check_available()?;
        Ok(self
            .deposits
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.network_id == network_id)
            .filter(|d| (block_low..=block_high).contains(&d.block_number))
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn query_deposits_after(&self, after_id: u64, limit: u32) -> PushResult<Vec<(u64, Deposit)>> {
        self.check_available()?;
        Ok(rows_after(&self.deposits.lock().unwrap(), after_id, limit))
    }

    async fn query_claims_after(&self, after_id: u64, limit: u32) -> PushResult<Vec<(u64, Claim)>> {
        self.check_available()?;
        Ok(rows_after(&self.claims.lock().unwrap(), after_id, limit))
    }

    async fn get_deposit(&self, network_id: u32, deposit_count: u32) -> PushResult<Option<Deposit>> {
        self.check_available()?;
        Ok(self
            .deposits
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.network_id == network_id && d.deposit_count == deposit_count)
            .cloned())
    }

    async fn latest_deposit_id(&self) -> PushResult<u64> {
        self.check_available()?;
        Ok(self.deposits.lock().unwrap().len() as u64)
    }

    async fn latest_claim_id(&self) -> PushResult<u64> {
        self.check_available()?;
        Ok(self.claims.lock().unwrap().len() as u64)
    }
}

/// Delegates to a [`MemoryKvStore`], failing the next `set_int` on chosen keys
#[derive(Debug)]
pub struct FaultyKvStore {
    inner: Arc<MemoryKvStore>,
    fail_next_set: Mutex<Vec<String>>,
}

impl FaultyKvStore {
    pub fn new(inner: Arc<MemoryKvStore>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            fail_next_set: Mutex::new(vec![]),
        })
    }

    pub fn fail_next_set(&self, key: &str) {
        self.fail_next_set.lock().unwrap().push(key.to_string());
    }
}

#[async_trait]
impl KvStore for FaultyKvStore {
    async fn try_lock(&self, key: &str, token: &str, ttl: Duration) -> PushResult<bool> {
        self.inner.try_lock(key, token, ttl).await
    }

    async fn extend_lock(&self, key: &str, token: &str, ttl: Duration) -> PushResult<bool> {
        self.inner.extend_lock(key, token, ttl).await
    }

    async fn release_lock(&self, key: &str, token: &str) -> PushResult<bool> {
        self.inner.release_lock(key, token).await
    }

    async fn get_int(&self, key: &str) -> PushResult<Option<u64>> {
        self.inner.get_int(key).await
    }

    async fn set_int(&self, key: &str, value: u64) -> PushResult<()> {
        let failing = {
            let mut keys = self.fail_next_set.lock().unwrap();
            let position = keys.iter().position(|k| k == key);
            position.map(|i| keys.remove(i)).is_some()
        };
        if failing {
            return Err(PushTaskError::KvStore(format!("write to {} refused", key)));
        }
        self.inner.set_int(key, value).await
    }

    async fn push_timestamp(&self, key: &str, timestamp: u64) -> PushResult<u64> {
        self.inner.push_timestamp(key, timestamp).await
    }

    async fn pop_oldest_timestamp(&self, key: &str) -> PushResult<u64> {
        self.inner.pop_oldest_timestamp(key).await
    }

    async fn list_len(&self, key: &str) -> PushResult<u64> {
        self.inner.list_len(key).await
    }
}

/// Everything a sweep task needs, wired to in-memory fakes
pub struct Harness {
    pub kv: Arc<MemoryKvStore>,
    pub faults: Arc<FaultyKvStore>,
    pub chain: Arc<FakeChain>,
    pub records: Arc<FakeRecordStore>,
    pub transport: Arc<RecordingTransport>,
    pub checkpoints: CheckpointStore,
    pub metrics: Arc<PushMetrics>,
    pub page_size: u32,
}

impl Harness {
    pub fn new(deposits: Vec<Deposit>, page_size: u32) -> Self {
        let kv = Arc::new(MemoryKvStore::new());
        let faults = FaultyKvStore::new(kv.clone());
        Self {
            checkpoints: CheckpointStore::new(faults.clone(), ""),
            kv,
            faults,
            chain: FakeChain::new(),
            records: FakeRecordStore::new(deposits),
            transport: Arc::new(RecordingTransport::new()),
            metrics: PushMetrics::new_for_testing(),
            page_size,
        }
    }

    pub fn lock(&self, key: &str) -> DistributedLock {
        DistributedLock::new(self.faults.clone(), key, PushConfig::default().lock_ttl())
    }

    pub fn dispatcher(&self) -> Dispatcher {
        let chain_ids = ChainIdTable::new(&[0, 1], &[1, 196], &[], &[]).unwrap();
        Dispatcher::new(
            Some(self.transport.clone() as Arc<dyn MessageTransport>),
            Live::fixed(chain_ids),
            EstimateConfig::default(),
            DurationEstimator::commit(
                self.checkpoints.clone(),
                DurationWindowConfig::commit_default(),
            ),
            1,
            "BridgeOrder",
            self.metrics.clone(),
        )
    }

    pub fn scanner(&self) -> DepositScanner {
        DepositScanner::new(
            self.records.clone(),
            self.dispatcher(),
            self.metrics.clone(),
            self.page_size,
        )
    }

    pub fn feed_task(&self, feed: RecordFeed) -> RecordFeedTask {
        let lock_key = match feed {
            RecordFeed::Deposits => DEPOSIT_FEED_LOCK,
            RecordFeed::Claims => CLAIM_FEED_LOCK,
        };
        RecordFeedTask::new(
            feed,
            self.lock(lock_key),
            self.checkpoints.clone(),
            self.records.clone(),
            self.dispatcher(),
            self.page_size,
            self.metrics.clone(),
        )
    }

    pub fn l1_task(&self, confirmations: u64) -> L1ConfirmationTask {
        self.l1_task_with(Live::fixed(confirmations))
    }

    pub fn l1_task_with(&self, confirmations: Live<u64>) -> L1ConfirmationTask {
        L1ConfirmationTask::new(
            self.lock(L1_LOCK),
            self.checkpoints.clone(),
            self.chain.clone(),
            self.scanner(),
            0,
            confirmations,
            self.metrics.clone(),
        )
    }

    pub fn batch_task(&self, role: BatchRole, window: DurationWindowConfig) -> BatchSweepTask {
        let (lock_key, durations) = match role {
            BatchRole::Commit => (
                COMMIT_LOCK,
                DurationEstimator::commit(self.checkpoints.clone(), window),
            ),
            BatchRole::Verify => (
                VERIFY_LOCK,
                DurationEstimator::verify(self.checkpoints.clone(), window),
            ),
        };
        BatchSweepTask::new(
            role,
            self.lock(lock_key),
            self.checkpoints.clone(),
            self.chain.clone(),
            self.scanner(),
            durations,
            1,
            self.metrics.clone(),
        )
    }

    /// Give spawned dispatches a chance to run, then count what was sent
    pub async fn settle(&self) -> usize {
        for _ in 0..20 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        self.transport.len()
    }
}
