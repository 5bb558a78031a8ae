// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! In-process [`KvStore`]
//!
//! Behaves like the Redis store for a single process: locks expire after their
//! TTL, lists are FIFO with pushes at the head. Useful for running one replica
//! without Redis, and as the shared store in tests. Fault injection
//! ([`MemoryKvStore::set_unavailable`]) simulates an unreachable backend.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

use super::KvStore;
use crate::error::{PushResult, PushTaskError};

#[derive(Debug, Default)]
struct Inner {
    locks: HashMap<String, (String, Instant)>,
    ints: HashMap<String, u64>,
    lists: HashMap<String, VecDeque<u64>>,
}

#[derive(Debug, Default)]
pub struct MemoryKvStore {
    inner: Mutex<Inner>,
    unavailable: AtomicBool,
    /// Number of successful writes to ints and lists (locks excluded)
    writes: AtomicU64,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail as if the backend were unreachable
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Data writes performed so far. Lock traffic is not counted.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Snapshot of a list, head (newest) first
    pub fn list(&self, key: &str) -> Vec<u64> {
        self.lock_inner()
            .lists
            .get(key)
            .map(|l| l.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Whether a lock key is currently held
    pub fn is_locked(&self, key: &str) -> bool {
        let mut inner = self.lock_inner();
        Self::expire_locks(&mut inner);
        inner.locks.contains_key(key)
    }

    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_available(&self) -> PushResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(PushTaskError::KvStore(
                "connection: memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }

    fn expire_locks(inner: &mut Inner) {
        let now = Instant::now();
        inner.locks.retain(|_, (_, expires_at)| now < *expires_at);
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn try_lock(&self, key: &str, token: &str, ttl: Duration) -> PushResult<bool> {
        self.check_available()?;
        let mut inner = self.lock_inner();
        Self::expire_locks(&mut inner);
        if inner.locks.contains_key(key) {
            return Ok(false);
        }
        let ttl = ttl.max(Duration::from_millis(1));
        inner
            .locks
            .insert(key.to_string(), (token.to_string(), Instant::now() + ttl));
        Ok(true)
    }

    async fn extend_lock(&self, key: &str, token: &str, ttl: Duration) -> PushResult<bool> {
        self.check_available()?;
        let mut inner = self.lock_inner();
        Self::expire_locks(&mut inner);
        match inner.locks.get_mut(key) {
            Some((holder, expires_at)) if holder == token => {
                *expires_at = Instant::now() + ttl.max(Duration::from_millis(1));
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_lock(&self, key: &str, token: &str) -> PushResult<bool> {
        self.check_available()?;
        let mut inner = self.lock_inner();
        Self::expire_locks(&mut inner);
        match inner.locks.get(key) {
            Some((holder, _)) if holder == token => {
                inner.locks.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get_int(&self, key: &str) -> PushResult<Option<u64>> {
        self.check_available()?;
        Ok(self.lock_inner().ints.get(key).copied())
    }

    async fn set_int(&self, key: &str, value: u64) -> PushResult<()> {
        self.check_available()?;
        self.lock_inner().ints.insert(key.to_string(), value);
        self.record_write();
        Ok(())
    }

    async fn push_timestamp(&self, key: &str, timestamp: u64) -> PushResult<u64> {
        self.check_available()?;
        let len = {
            let mut inner = self.lock_inner();
            let list = inner.lists.entry(key.to_string()).or_default();
            list.push_front(timestamp);
            list.len() as u64
        };
        self.record_write();
        Ok(len)
    }

    async fn pop_oldest_timestamp(&self, key: &str) -> PushResult<u64> {
        self.check_available()?;
        let popped = self
            .lock_inner()
            .lists
            .get_mut(key)
            .and_then(|list| list.pop_back());
        match popped {
            Some(ts) => {
                self.record_write();
                Ok(ts)
            }
            None => Err(PushTaskError::KvStore(format!("list {} is empty", key))),
        }
    }

    async fn list_len(&self, key: &str) -> PushResult<u64> {
        self.check_available()?;
        Ok(self
            .lock_inner()
            .lists
            .get(key)
            .map(|l| l.len() as u64)
            .unwrap_or(0))
    }
}
