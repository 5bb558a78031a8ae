// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! RPC endpoint failover
//!
//! Calls go to the active endpoint; after `attempts_per_url` consecutive
//! failures the next endpoint becomes active. Each attempt is bounded by
//! `attempt_timeout` so a hung node cannot stall a sweep tick. Only transient
//! errors are retried.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::warn;

use crate::error::{PushResult, PushTaskError};

#[derive(Debug, Clone)]
pub struct FailoverPolicy {
    pub attempts_per_url: u32,
    pub retry_delay: Duration,
    pub attempt_timeout: Duration,
}

impl Default for FailoverPolicy {
    fn default() -> Self {
        Self {
            attempts_per_url: 2,
            retry_delay: Duration::from_millis(200),
            attempt_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug)]
pub struct FailoverUrls {
    urls: Vec<String>,
    active: AtomicUsize,
    policy: FailoverPolicy,
}

impl FailoverUrls {
    pub fn new(urls: Vec<String>, policy: FailoverPolicy) -> PushResult<Self> {
        let urls: Vec<String> = urls
            .into_iter()
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .collect();
        if urls.is_empty() {
            return Err(PushTaskError::Config(
                "at least one RPC URL is required".to_string(),
            ));
        }
        Ok(Self {
            urls,
            active: AtomicUsize::new(0),
            policy,
        })
    }

    pub fn active_url(&self) -> &str {
        &self.urls[self.active.load(Ordering::SeqCst) % self.urls.len()]
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    fn rotate(&self, from: usize) {
        let next = (from + 1) % self.urls.len();
        if self
            .active
            .compare_exchange(from, next, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
            && next != from
        {
            warn!(
                "[Failover] Switched from {} to {}",
                self.urls[from], self.urls[next]
            );
        }
    }

    /// Run `f` against the active URL, failing over on errors and timeouts.
    pub async fn call<F, Fut, T>(&self, what: &str, mut f: F) -> PushResult<T>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = PushResult<T>>,
    {
        let per_url = self.policy.attempts_per_url.max(1) as usize;
        let total = per_url * self.urls.len();
        let mut last_error = None;

        for attempt in 0..total {
            let index = self.active.load(Ordering::SeqCst) % self.urls.len();
            let url = self.urls[index].clone();

            let outcome = tokio::time::timeout(self.policy.attempt_timeout, f(url.clone())).await;
            let err = match outcome {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => e,
                Err(_) => PushTaskError::Rpc(format!(
                    "{} timed out after {:?}",
                    what, self.policy.attempt_timeout
                )),
            };
            warn!(
                "[Failover] {} failed on {} (attempt {}/{}): {}",
                what,
                url,
                attempt + 1,
                total,
                err
            );
            // anomalies in the answer will not go away on another node
            if !err.is_transient() {
                return Err(err);
            }
            last_error = Some(err);

            if (attempt + 1) % per_url == 0 {
                self.rotate(index);
            } else {
                tokio::time::sleep(self.policy.retry_delay).await;
            }
        }

        Err(last_error.unwrap_or_else(|| PushTaskError::Rpc(format!("{} failed", what))))
    }
}
