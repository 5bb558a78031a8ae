// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use reqwest::Client;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

use super::message::PushMessage;
use crate::config::TransportConfig;
use crate::error::{PushResult, PushTaskError};

const TOPIC_HEADER: &str = "X-Push-Topic";
const PUSH_KEY_HEADER: &str = "X-Push-Key";

/// Delivers one message, once. No retries at this layer.
#[async_trait]
pub trait MessageTransport: Send + Sync + Debug {
    async fn send(&self, message: &PushMessage) -> PushResult<()>;
}

/// POSTs the JSON envelope to a push gateway
pub struct HttpTransport {
    client: Client,
    endpoint: String,
    topic: String,
    push_key: String,
}

impl Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("endpoint", &self.endpoint)
            .field("topic", &self.topic)
            .field("push_key", &"<redacted>")
            .finish()
    }
}

impl HttpTransport {
    /// `None` when no endpoint is configured
    pub fn from_config(config: &TransportConfig) -> PushResult<Option<Self>> {
        if !config.is_configured() {
            return Ok(None);
        }
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| PushTaskError::Config(format!("build push HTTP client: {}", e)))?;
        Ok(Some(Self {
            client,
            endpoint: config.endpoint.trim().to_string(),
            topic: config.topic.clone(),
            push_key: config.push_key.clone(),
        }))
    }
}

#[async_trait]
impl MessageTransport for HttpTransport {
    async fn send(&self, message: &PushMessage) -> PushResult<()> {
        let mut request = self.client.post(&self.endpoint).json(message);
        if !self.topic.is_empty() {
            request = request.header(TOPIC_HEADER, &self.topic);
        }
        if !self.push_key.is_empty() {
            request = request.header(PUSH_KEY_HEADER, &self.push_key);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| PushTaskError::Transport(format!("POST {}: {}", self.endpoint, e)))?;
        if !resp.status().is_success() {
            return Err(PushTaskError::Transport(format!(
                "POST {} returned {}",
                self.endpoint,
                resp.status()
            )));
        }
        debug!(
            "[Transport] Delivered {} to {}",
            message.request_id, self.endpoint
        );
        Ok(())
    }
}

/// In-memory transport that keeps every message it is handed
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<PushMessage>>,
    failing: AtomicBool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `send` fail. Failed sends are still recorded.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn messages(&self) -> Vec<PushMessage> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait until at least `count` messages arrived or `timeout` passed.
    /// Returns whether the count was reached.
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.len() >= count {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

#[async_trait]
impl MessageTransport for RecordingTransport {
    async fn send(&self, message: &PushMessage) -> PushResult<()> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(message.clone());
        if self.failing.load(Ordering::SeqCst) {
            return Err(PushTaskError::Transport("recording transport set to fail".into()));
        }
        Ok(())
    }
}
