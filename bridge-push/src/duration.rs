// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Rolling duration estimator
//!
//! Keeps a bounded FIFO of observation timestamps (seconds) in the shared
//! store and derives the average spacing between observations. Used once for
//! batch commits and once for batch verifications.
//!
//! ```text
//!  push(now) ──► [now, t4, t3, t2, t1, t0] ──► len > capacity ──► pop t0
//!                                                  │
//!                        avg = (now - t0) / (len - 1)  (half-up)
//!                                                  │
//!                          min <= avg <= max ? store : discard
//! ```

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::checkpoint::CheckpointStore;
use crate::error::PushResult;

/// Bounds and window size for one estimator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationWindowConfig {
    /// Samples kept in the window
    pub capacity: u64,
    /// Lowest average accepted, seconds
    pub min_secs: u64,
    /// Highest average accepted, seconds
    pub max_secs: u64,
    /// Reported when no average has been stored yet
    pub default_secs: u64,
}

impl DurationWindowConfig {
    pub fn commit_default() -> Self {
        Self {
            capacity: 5,
            min_secs: 5 * 60,
            max_secs: 10 * 60,
            default_secs: 10 * 60,
        }
    }

    pub fn verify_default() -> Self {
        Self {
            capacity: 100,
            min_secs: 3 * 60,
            max_secs: 10 * 60,
            default_secs: 10 * 60,
        }
    }

    pub fn accepts(&self, average_secs: u64) -> bool {
        (self.min_secs..=self.max_secs).contains(&average_secs)
    }
}

/// What happened to a pushed sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleOutcome {
    /// Window not full yet, no average computed
    Filling { len: u64 },
    /// Average computed and stored
    Accepted { average_secs: u64 },
    /// Average computed but out of bounds, previous value kept
    Rejected { average_secs: u64 },
}

#[derive(Debug, Clone)]
pub struct DurationEstimator {
    name: &'static str,
    checkpoints: CheckpointStore,
    list_key: String,
    average_key: String,
    config: DurationWindowConfig,
}

impl DurationEstimator {
    pub fn new(
        name: &'static str,
        checkpoints: CheckpointStore,
        list_name: &str,
        average_name: &str,
        config: DurationWindowConfig,
    ) -> Self {
        let list_key = checkpoints.key(list_name);
        let average_key = checkpoints.key(average_name);
        Self {
            name,
            checkpoints,
            list_key,
            average_key,
            config,
        }
    }

    pub fn commit(checkpoints: CheckpointStore, config: DurationWindowConfig) -> Self {
        Self::new(
            "commit",
            checkpoints,
            "bridge_commit_time_list",
            "bridge_avg_commit_duration",
            config,
        )
    }

    pub fn verify(checkpoints: CheckpointStore, config: DurationWindowConfig) -> Self {
        Self::new(
            "verify",
            checkpoints,
            "bridge_verify_time_list",
            "bridge_avg_verify_duration",
            config,
        )
    }

    pub fn config(&self) -> &DurationWindowConfig {
        &self.config
    }

    pub async fn push_sample(&self, timestamp_secs: u64) -> PushResult<u64> {
        self.checkpoints
            .store()
            .push_timestamp(&self.list_key, timestamp_secs)
            .await
    }

    pub async fn len(&self) -> PushResult<u64> {
        self.checkpoints.store().list_len(&self.list_key).await
    }

    pub async fn pop_oldest(&self) -> PushResult<u64> {
        self.checkpoints
            .store()
            .pop_oldest_timestamp(&self.list_key)
            .await
    }

    /// Record one observation and refresh the stored average if the window is full.
    pub async fn record_sample(&self, now_secs: u64) -> PushResult<SampleOutcome> {
        let len = self.push_sample(now_secs).await?;
        if len <= self.config.capacity {
            info!(
                "[Duration] {} window has {}/{} samples, average not computed yet",
                self.name, len, self.config.capacity
            );
            return Ok(SampleOutcome::Filling { len });
        }

        let oldest = self.pop_oldest().await?;
        let average_secs = average_interval(now_secs, oldest, len - 1);
        if !self.config.accepts(average_secs) {
            warn!(
                "[Duration] Discarding {} average {}s outside [{}, {}]",
                self.name, average_secs, self.config.min_secs, self.config.max_secs
            );
            return Ok(SampleOutcome::Rejected { average_secs });
        }

        self.checkpoints
            .store()
            .set_int(&self.average_key, average_secs)
            .await?;
        info!(
            "[Duration] Stored new {} average: {}s",
            self.name, average_secs
        );
        Ok(SampleOutcome::Accepted { average_secs })
    }

    /// Last accepted average, `None` if never stored (or stored as 0)
    pub async fn stored_average(&self) -> PushResult<Option<u64>> {
        Ok(self
            .checkpoints
            .store()
            .get_int(&self.average_key)
            .await?
            .filter(|v| *v > 0))
    }

    /// Last accepted average, falling back to the configured default
    pub async fn average_or_default(&self) -> u64 {
        match self.stored_average().await {
            Ok(Some(v)) => v,
            Ok(None) => self.config.default_secs,
            Err(e) => {
                warn!(
                    "[Duration] Failed to read {} average, using default: {}",
                    self.name, e
                );
                self.config.default_secs
            }
        }
    }
}

/// `(newest - oldest) / intervals`, rounded half-up.
pub fn average_interval(newest: u64, oldest: u64, intervals: u64) -> u64 {
    if intervals == 0 {
        return 0;
    }
    let delta = newest.saturating_sub(oldest);
    (delta + intervals / 2) / intervals
}
