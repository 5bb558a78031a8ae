// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Shared key-value store
//!
//! Every replica talks to the same store. It holds three kinds of state:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       KvStore (trait)                        │
//! ├──────────────────────────────────────────────────────────────┤
//! │  locks        try_lock / extend_lock /    (TTL, owner token) │
//! │               release_lock                                   │
//! │  checkpoints  get_int / set_int           (u64 scalars)      │
//! │  windows      push_timestamp / pop_oldest_timestamp /        │
//! │               list_len                    (FIFO of u64)      │
//! └──────────────────────────────────────────────────────────────┘
//!              │                                   │
//!              ▼                                   ▼
//!      ┌───────────────┐                  ┌────────────────┐
//!      │ RedisKvStore  │                  │ MemoryKvStore  │
//!      │ (production)  │                  │ (single node / │
//!      └───────────────┘                  │  tests)        │
//!                                         └────────────────┘
//! ```

mod memory;
mod redis_store;

pub use self::memory::MemoryKvStore;
pub use self::redis_store::RedisKvStore;

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use crate::error::PushResult;

/// Shared store used for locks, checkpoints and duration windows
#[async_trait]
pub trait KvStore: Send + Sync + Debug {
    /// Set `key` to `token` with a TTL, only if the key is absent.
    ///
    /// Returns `false` when another holder owns the key.
    async fn try_lock(&self, key: &str, token: &str, ttl: Duration) -> PushResult<bool>;

    /// Reset the TTL of `key` if it still holds `token`.
    ///
    /// Returns `false` when the lease already expired or changed hands.
    async fn extend_lock(&self, key: &str, token: &str, ttl: Duration) -> PushResult<bool>;

    /// Delete `key` if it still holds `token`. Returns whether it was deleted.
    async fn release_lock(&self, key: &str, token: &str) -> PushResult<bool>;

    /// Read an integer. Absent keys read as `None`.
    async fn get_int(&self, key: &str) -> PushResult<Option<u64>>;

    async fn set_int(&self, key: &str, value: u64) -> PushResult<()>;

    /// Push a timestamp at the head of a list. Returns the new list length.
    async fn push_timestamp(&self, key: &str, timestamp: u64) -> PushResult<u64>;

    /// Pop the oldest timestamp from the tail of a list. Fails if the list is empty.
    async fn pop_oldest_timestamp(&self, key: &str) -> PushResult<u64>;

    async fn list_len(&self, key: &str) -> PushResult<u64>;
}

pub type SharedKvStore = Arc<dyn KvStore>;
