// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Push task configuration
//!
//! Loaded from YAML with `${VAR}` environment substitution. Every field has a
//! default, so an empty file is a valid configuration.

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use crate::chain_ids::ChainIdTable;
use crate::duration::DurationWindowConfig;
use crate::error::{PushResult, PushTaskError};

/// Complete push task configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushConfig {
    /// Prefix for every key in the shared store, empty for none
    #[serde(default)]
    pub namespace: String,
    #[serde(default = "default_rollup_id")]
    pub rollup_id: u32,
    #[serde(default = "default_lock_ttl_secs")]
    pub lock_ttl_secs: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Upper bound for a single chain RPC or store call
    #[serde(default = "default_rpc_timeout_secs")]
    pub rpc_timeout_secs: u64,
    /// How often the config file is re-read for hot-reloadable values, 0 disables
    #[serde(default = "default_reload_interval_secs")]
    pub reload_interval_secs: u64,
    #[serde(default)]
    pub l1_sweep: L1SweepConfig,
    #[serde(default = "BatchSweepConfig::commit_default")]
    pub commit_sweep: BatchSweepConfig,
    #[serde(default = "BatchSweepConfig::verify_default")]
    pub verify_sweep: BatchSweepConfig,
    #[serde(default)]
    pub record_feed: RecordFeedConfig,
    #[serde(default)]
    pub chain_ids: ChainIdsConfig,
    #[serde(default)]
    pub estimate: EstimateConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub batch_rpc: BatchRpcConfig,
}

fn default_rollup_id() -> u32 {
    1
}

fn default_lock_ttl_secs() -> u64 {
    10
}

fn default_page_size() -> u32 {
    100
}

fn default_rpc_timeout_secs() -> u64 {
    10
}

fn default_reload_interval_secs() -> u64 {
    30
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            namespace: String::new(),
            rollup_id: default_rollup_id(),
            lock_ttl_secs: default_lock_ttl_secs(),
            page_size: default_page_size(),
            rpc_timeout_secs: default_rpc_timeout_secs(),
            reload_interval_secs: default_reload_interval_secs(),
            l1_sweep: L1SweepConfig::default(),
            commit_sweep: BatchSweepConfig::commit_default(),
            verify_sweep: BatchSweepConfig::verify_default(),
            record_feed: RecordFeedConfig::default(),
            chain_ids: ChainIdsConfig::default(),
            estimate: EstimateConfig::default(),
            transport: TransportConfig::default(),
            batch_rpc: BatchRpcConfig::default(),
        }
    }
}

impl PushConfig {
    /// Load configuration from YAML file with environment variable substitution
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .context(format!("Failed to read push config file: {:?}", path))?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let contents = substitute_env_vars(contents);
        let config: PushConfig = if contents.trim().is_empty() {
            PushConfig::default()
        } else {
            serde_yaml::from_str(&contents).context("Failed to parse push config YAML")?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> PushResult<()> {
        if self.page_size == 0 {
            return Err(PushTaskError::Config("page_size must be > 0".into()));
        }
        if self.lock_ttl_secs == 0 {
            return Err(PushTaskError::Config("lock_ttl_secs must be > 0".into()));
        }
        if self.rpc_timeout_secs == 0 {
            return Err(PushTaskError::Config("rpc_timeout_secs must be > 0".into()));
        }
        self.l1_sweep.validate()?;
        self.commit_sweep.validate("commit_sweep")?;
        self.verify_sweep.validate("verify_sweep")?;
        self.record_feed.validate()?;

        let keys = [
            &self.l1_sweep.lock_key,
            &self.commit_sweep.lock_key,
            &self.verify_sweep.lock_key,
            &self.record_feed.deposit_lock_key,
            &self.record_feed.claim_lock_key,
        ];
        for (i, a) in keys.iter().enumerate() {
            if keys[i + 1..].contains(a) {
                return Err(PushTaskError::Config(format!(
                    "lock key {} is shared by two sweep tasks",
                    a
                )));
            }
        }

        self.chain_ids.to_table()?;
        Ok(())
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_secs)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(content: &str) -> String {
    static ENV_VAR: OnceLock<Regex> = OnceLock::new();
    let re = ENV_VAR.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid env var pattern")
    });

    re.replace_all(content, |cap: &regex::Captures| {
        let var_name = &cap[1];
        match std::env::var(var_name) {
            Ok(value) => value,
            Err(_) => {
                // Keep the placeholder if env var is not set
                tracing::warn!(
                    "Environment variable {} not found, keeping placeholder",
                    var_name
                );
                cap[0].to_string()
            }
        }
    })
    .into_owned()
}

/// L1 confirmation sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct L1SweepConfig {
    #[serde(default = "default_l1_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_l1_lock_key")]
    pub lock_key: String,
    /// Source network whose deposits wait for confirmations
    #[serde(default)]
    pub network_id: u32,
    /// Hot-reloadable
    #[serde(default = "default_l1_confirmations")]
    pub confirmations: u64,
}

fn default_l1_interval_secs() -> u64 {
    5
}

fn default_l1_lock_key() -> String {
    "bridge_l1_block_num_lock".to_string()
}

fn default_l1_confirmations() -> u64 {
    64
}

impl Default for L1SweepConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_l1_interval_secs(),
            lock_key: default_l1_lock_key(),
            network_id: 0,
            confirmations: default_l1_confirmations(),
        }
    }
}

impl L1SweepConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    fn validate(&self) -> PushResult<()> {
        if self.interval_secs == 0 {
            return Err(PushTaskError::Config(
                "l1_sweep.interval_secs must be > 0".into(),
            ));
        }
        if self.lock_key.is_empty() {
            return Err(PushTaskError::Config("l1_sweep.lock_key is empty".into()));
        }
        Ok(())
    }
}

/// Commit or verify batch sweep. All fields are required once the section is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSweepConfig {
    pub interval_secs: u64,
    pub lock_key: String,
    /// Source network whose deposits mature with the batch
    pub network_id: u32,
    pub window: DurationWindowConfig,
}

impl BatchSweepConfig {
    pub fn commit_default() -> Self {
        Self {
            interval_secs: 2,
            lock_key: "sync_l1_committed_batch_lock".to_string(),
            network_id: 1,
            window: DurationWindowConfig::commit_default(),
        }
    }

    pub fn verify_default() -> Self {
        Self {
            interval_secs: 10,
            lock_key: "sync_l1_verified_batch_lock".to_string(),
            network_id: 1,
            window: DurationWindowConfig::verify_default(),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    fn validate(&self, section: &str) -> PushResult<()> {
        if self.interval_secs == 0 {
            return Err(PushTaskError::Config(format!(
                "{}.interval_secs must be > 0",
                section
            )));
        }
        if self.lock_key.is_empty() {
            return Err(PushTaskError::Config(format!("{}.lock_key is empty", section)));
        }
        if self.window.capacity == 0 {
            return Err(PushTaskError::Config(format!(
                "{}.window.capacity must be > 0",
                section
            )));
        }
        if self.window.min_secs > self.window.max_secs {
            return Err(PushTaskError::Config(format!(
                "{}.window.min_secs exceeds max_secs",
                section
            )));
        }
        Ok(())
    }
}

/// Created and claimed notifications for newly synced rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordFeedConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_feed_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_deposit_feed_lock_key")]
    pub deposit_lock_key: String,
    #[serde(default = "default_claim_feed_lock_key")]
    pub claim_lock_key: String,
}

fn default_true() -> bool {
    true
}

fn default_feed_interval_secs() -> u64 {
    5
}

fn default_deposit_feed_lock_key() -> String {
    "bridge_push_deposit_feed_lock".to_string()
}

fn default_claim_feed_lock_key() -> String {
    "bridge_push_claim_feed_lock".to_string()
}

impl Default for RecordFeedConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_feed_interval_secs(),
            deposit_lock_key: default_deposit_feed_lock_key(),
            claim_lock_key: default_claim_feed_lock_key(),
        }
    }
}

impl RecordFeedConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    fn validate(&self) -> PushResult<()> {
        if self.interval_secs == 0 {
            return Err(PushTaskError::Config(
                "record_feed.interval_secs must be > 0".into(),
            ));
        }
        if self.deposit_lock_key.is_empty() || self.claim_lock_key.is_empty() {
            return Err(PushTaskError::Config("record_feed lock keys must be set".into()));
        }
        Ok(())
    }
}

/// Network / chain id tables. Hot-reloadable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainIdsConfig {
    #[serde(default = "default_networks")]
    pub networks: Vec<u32>,
    #[serde(default = "default_chain_ids")]
    pub chain_ids: Vec<u64>,
    #[serde(default)]
    pub standard_chain_ids: Vec<u64>,
    #[serde(default)]
    pub inner_chain_ids: Vec<u64>,
}

fn default_networks() -> Vec<u32> {
    vec![0, 1]
}

fn default_chain_ids() -> Vec<u64> {
    vec![1, 196]
}

impl Default for ChainIdsConfig {
    fn default() -> Self {
        Self {
            networks: default_networks(),
            chain_ids: default_chain_ids(),
            standard_chain_ids: vec![],
            inner_chain_ids: vec![],
        }
    }
}

impl ChainIdsConfig {
    pub fn to_table(&self) -> PushResult<ChainIdTable> {
        ChainIdTable::new(
            &self.networks,
            &self.chain_ids,
            &self.standard_chain_ids,
            &self.inner_chain_ids,
        )
    }
}

/// Flat completion-time estimates, minutes, per source network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimateConfig {
    #[serde(default = "default_estimate_minutes")]
    pub default_minutes: HashMap<u32, u32>,
    #[serde(default = "default_fallback_minutes")]
    pub fallback_minutes: u32,
}

fn default_estimate_minutes() -> HashMap<u32, u32> {
    HashMap::from([(0, 15)])
}

fn default_fallback_minutes() -> u32 {
    60
}

impl Default for EstimateConfig {
    fn default() -> Self {
        Self {
            default_minutes: default_estimate_minutes(),
            fallback_minutes: default_fallback_minutes(),
        }
    }
}

impl EstimateConfig {
    pub fn minutes_for_network(&self, network_id: u32) -> u32 {
        self.default_minutes
            .get(&network_id)
            .copied()
            .unwrap_or(self.fallback_minutes)
    }
}

/// Notification transport. An empty endpoint disables notifications.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub push_key: String,
    #[serde(default = "default_biz_code")]
    pub biz_code: String,
    #[serde(default = "default_transport_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_biz_code() -> String {
    "BridgeOrder".to_string()
}

fn default_transport_timeout_secs() -> u64 {
    5
}

impl TransportConfig {
    pub fn is_configured(&self) -> bool {
        !self.endpoint.trim().is_empty()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// JSON-RPC method names for batch queries on the destination chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRpcConfig {
    #[serde(default = "default_committed_batch_method")]
    pub committed_batch_method: String,
    #[serde(default = "default_verified_batch_method")]
    pub verified_batch_method: String,
    #[serde(default = "default_batch_by_number_method")]
    pub batch_by_number_method: String,
}

fn default_committed_batch_method() -> String {
    "zkevm_virtualBatchNumber".to_string()
}

fn default_verified_batch_method() -> String {
    "zkevm_verifiedBatchNumber".to_string()
}

fn default_batch_by_number_method() -> String {
    "zkevm_getBatchByNumber".to_string()
}

impl Default for BatchRpcConfig {
    fn default() -> Self {
        Self {
            committed_batch_method: default_committed_batch_method(),
            verified_batch_method: default_verified_batch_method(),
            batch_by_number_method: default_batch_by_number_method(),
        }
    }
}
