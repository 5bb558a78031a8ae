// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Redis-backed [`KvStore`]
//!
//! Locks:
//! - Acquire: `SET key token NX PX ttl_ms`
//! - Extend: Lua compare-and-`PEXPIRE`, renewing only our own lease.
//! - Release: Lua compare-and-delete, so a holder whose lease already expired
//!   cannot delete the lock of the replica that took over.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use std::time::Duration;
use tracing::{debug, info};

use super::KvStore;
use crate::error::{PushResult, PushTaskError};

const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
  return redis.call("DEL", KEYS[1])
else
  return 0
end
"#;

const EXTEND_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
  return redis.call("PEXPIRE", KEYS[1], ARGV[2])
else
  return 0
end
"#;

#[derive(Clone)]
pub struct RedisKvStore {
    conn: ConnectionManager,
    extend_script: Script,
    release_script: Script,
    timeout: Duration,
}

impl std::fmt::Debug for RedisKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisKvStore")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl RedisKvStore {
    /// Connect and verify the server answers `PING`.
    pub async fn connect(url: &str, timeout: Duration) -> PushResult<Self> {
        if url.trim().is_empty() {
            return Err(PushTaskError::Config("redis url is empty".to_string()));
        }
        let client =
            redis::Client::open(url).map_err(|e| PushTaskError::Config(e.to_string()))?;
        let conn = tokio::time::timeout(timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| PushTaskError::KvStore("redis connect timed out".to_string()))??;

        let store = Self {
            conn,
            extend_script: Script::new(EXTEND_SCRIPT),
            release_script: Script::new(RELEASE_SCRIPT),
            timeout,
        };
        store.ping().await?;
        info!("[Redis] Connected");
        Ok(store)
    }

    async fn ping(&self) -> PushResult<()> {
        let mut conn = self.conn.clone();
        let _: String = self
            .bounded(async move { redis::cmd("PING").query_async(&mut conn).await })
            .await?;
        Ok(())
    }

    /// Every call is bounded so an unreachable server cannot stall a tick.
    async fn bounded<T, F>(&self, fut: F) -> PushResult<T>
    where
        F: std::future::Future<Output = redis::RedisResult<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(map_redis_err),
            Err(_) => Err(PushTaskError::KvStore(format!(
                "redis call timed out after {:?}",
                self.timeout
            ))),
        }
    }
}

#[async_trait]
impl KvStore for RedisKvStore {
    async fn try_lock(&self, key: &str, token: &str, ttl: Duration) -> PushResult<bool> {
        let mut conn = self.conn.clone();
        let ttl_ms = ttl.as_millis().max(1) as u64;
        let reply: Option<String> = self
            .bounded(async move {
                redis::cmd("SET")
                    .arg(key)
                    .arg(token)
                    .arg("NX")
                    .arg("PX")
                    .arg(ttl_ms)
                    .query_async(&mut conn)
                    .await
            })
            .await?;
        Ok(reply.is_some())
    }

    async fn extend_lock(&self, key: &str, token: &str, ttl: Duration) -> PushResult<bool> {
        let mut conn = self.conn.clone();
        let script = self.extend_script.clone();
        let ttl_ms = ttl.as_millis().max(1) as u64;
        let extended: i64 = self
            .bounded(async move {
                script
                    .key(key)
                    .arg(token)
                    .arg(ttl_ms)
                    .invoke_async(&mut conn)
                    .await
            })
            .await?;
        Ok(extended > 0)
    }

    async fn release_lock(&self, key: &str, token: &str) -> PushResult<bool> {
        let mut conn = self.conn.clone();
        let script = self.release_script.clone();
        let deleted: i64 = self
            .bounded(async move { script.key(key).arg(token).invoke_async(&mut conn).await })
            .await?;
        if deleted == 0 {
            debug!("[Redis] Lock {} was no longer held by this owner", key);
        }
        Ok(deleted > 0)
    }

    async fn get_int(&self, key: &str) -> PushResult<Option<u64>> {
        let mut conn = self.conn.clone();
        self.bounded(async move { conn.get(key).await }).await
    }

    async fn set_int(&self, key: &str, value: u64) -> PushResult<()> {
        let mut conn = self.conn.clone();
        self.bounded(async move { conn.set(key, value).await }).await
    }

    async fn push_timestamp(&self, key: &str, timestamp: u64) -> PushResult<u64> {
        let mut conn = self.conn.clone();
        self.bounded(async move { conn.lpush(key, timestamp).await })
            .await
    }

    async fn pop_oldest_timestamp(&self, key: &str) -> PushResult<u64> {
        let mut conn = self.conn.clone();
        let popped: Option<u64> = self
            .bounded(async move { conn.rpop(key, None).await })
            .await?;
        popped.ok_or_else(|| PushTaskError::KvStore(format!("list {} is empty", key)))
    }

    async fn list_len(&self, key: &str) -> PushResult<u64> {
        let mut conn = self.conn.clone();
        self.bounded(async move { conn.llen(key).await }).await
    }
}

fn map_redis_err(e: redis::RedisError) -> PushTaskError {
    if e.is_timeout() {
        return PushTaskError::KvStore(format!("timeout: {}", e));
    }
    if e.is_connection_refusal() || e.is_connection_dropped() || e.is_io_error() {
        return PushTaskError::KvStore(format!("connection: {}", e));
    }
    PushTaskError::KvStore(e.to_string())
}
