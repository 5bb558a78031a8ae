// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error taxonomy for the push pipeline

use thiserror::Error;

/// Result type for push pipeline operations
pub type PushResult<T> = Result<T, PushTaskError>;

/// Errors raised while sweeping and dispatching.
///
/// None of these are fatal to the process. A sweep tick that hits one of them
/// is abandoned before any checkpoint is written and retried on the next tick.
#[derive(Debug, Error)]
pub enum PushTaskError {
    /// Chain RPC failure or timeout
    #[error("RPC error: {0}")]
    Rpc(String),

    /// Relational record store failure
    #[error("Record store error: {0}")]
    Store(String),

    /// Shared key-value store (lock, checkpoint, duration window) failure
    #[error("KV store error: {0}")]
    KvStore(String),

    /// Notification transport failure
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Config error: {0}")]
    Config(String),

    /// Remote data that cannot be used as-is, e.g. a batch without blocks
    #[error("Data anomaly: {0}")]
    DataAnomaly(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PushTaskError {
    /// Returns a short string identifying the error type for metrics labels
    pub fn error_type(&self) -> &'static str {
        match self {
            PushTaskError::Rpc(_) => "rpc",
            PushTaskError::Store(_) => "store",
            PushTaskError::KvStore(_) => "kv_store",
            PushTaskError::Transport(_) => "transport",
            PushTaskError::Config(_) => "config",
            PushTaskError::DataAnomaly(_) => "data_anomaly",
            PushTaskError::Internal(_) => "internal",
        }
    }

    /// Transient infrastructure errors are expected to clear up on their own.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PushTaskError::Rpc(_)
                | PushTaskError::Store(_)
                | PushTaskError::KvStore(_)
                | PushTaskError::Transport(_)
        )
    }
}

impl From<anyhow::Error> for PushTaskError {
    fn from(e: anyhow::Error) -> Self {
        PushTaskError::Internal(format!("{:#}", e))
    }
}

impl From<redis::RedisError> for PushTaskError {
    fn from(e: redis::RedisError) -> Self {
        PushTaskError::KvStore(e.to_string())
    }
}

impl From<diesel::result::Error> for PushTaskError {
    fn from(e: diesel::result::Error) -> Self {
        PushTaskError::Store(e.to_string())
    }
}
