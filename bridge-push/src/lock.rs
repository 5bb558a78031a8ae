// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! TTL-based mutual exclusion across replicas
//!
//! Each acquisition writes a fresh random token under the lock key. Release is
//! a compare-and-delete on that token, so a replica whose lease already ran out
//! never deletes a successor's lock. If the holder crashes the TTL frees the key.
//!
//! While a guard is alive a background task renews the lease every third of
//! the TTL, so a tick slowed down by hung RPCs keeps exclusive ownership.

use rand::distributions::Alphanumeric;
use rand::Rng;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::PushResult;
use crate::storage::SharedKvStore;

const TOKEN_LEN: usize = 16;

#[derive(Debug, Clone)]
pub struct DistributedLock {
    store: SharedKvStore,
    key: String,
    ttl: Duration,
}

/// Proof of holding a [`DistributedLock`].
///
/// Call [`LockGuard::release`] on every exit path. A guard dropped without
/// release (early return, panic) schedules the release in the background.
#[derive(Debug)]
pub struct LockGuard {
    store: SharedKvStore,
    key: String,
    token: String,
    keepalive: CancellationToken,
    released: bool,
}

impl DistributedLock {
    pub fn new(store: SharedKvStore, key: impl Into<String>, ttl: Duration) -> Self {
        Self {
            store,
            key: key.into(),
            ttl,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Try to take the lock without waiting.
    ///
    /// `Ok(None)` means another replica holds it. Errors mean the backend
    /// could not be reached and the caller should skip this round.
    pub async fn try_acquire(&self) -> PushResult<Option<LockGuard>> {
        let token = random_token();
        if !self.store.try_lock(&self.key, &token, self.ttl).await? {
            debug!("[Lock] {} held by another replica", self.key);
            return Ok(None);
        }
        let keepalive = CancellationToken::new();
        spawn_keepalive(
            self.store.clone(),
            self.key.clone(),
            token.clone(),
            self.ttl,
            keepalive.clone(),
        );
        Ok(Some(LockGuard {
            store: self.store.clone(),
            key: self.key.clone(),
            token,
            keepalive,
            released: false,
        }))
    }
}

fn spawn_keepalive(
    store: SharedKvStore,
    key: String,
    token: String,
    ttl: Duration,
    stop: CancellationToken,
) {
    let period = (ttl / 3).max(Duration::from_millis(1));
    tokio::spawn(async move {
        let mut ticker =
            tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                _ = ticker.tick() => {
                    match store.extend_lock(&key, &token, ttl).await {
                        Ok(true) => debug!("[Lock] Renewed {}", key),
                        Ok(false) => {
                            warn!("[Lock] Lease on {} lost before renewal", key);
                            break;
                        }
                        // the next period retries, the remaining TTL covers the gap
                        Err(e) => warn!("[Lock] Failed to renew {}: {}", key, e),
                    }
                }
            }
        }
    });
}

impl LockGuard {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Release the lock. Failures are logged, the TTL cleans up after them.
    pub async fn release(mut self) {
        self.released = true;
        self.keepalive.cancel();
        match self.store.release_lock(&self.key, &self.token).await {
            Ok(true) => {}
            Ok(false) => warn!(
                "[Lock] {} expired before release; the critical section outlived the TTL",
                self.key
            ),
            Err(e) => warn!("[Lock] Failed to release {}: {}", self.key, e),
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.keepalive.cancel();
        let store = self.store.clone();
        let key = std::mem::take(&mut self.key);
        let token = std::mem::take(&mut self.token);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = store.release_lock(&key, &token).await {
                        warn!("[Lock] Deferred release of {} failed: {}", key, e);
                    }
                });
            }
            Err(_) => warn!("[Lock] {} dropped outside a runtime, left to expire", key),
        }
    }
}

fn random_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}
