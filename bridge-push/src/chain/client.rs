// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::{H256, U64};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::ChainRpc;
use crate::config::BatchRpcConfig;
use crate::error::{PushResult, PushTaskError};
use crate::failover::FailoverUrls;

/// JSON-RPC client over the L1 node and the rollup node.
///
/// Head height comes from L1. Batch numbers and batch contents come from the
/// rollup node, which exposes them through the methods in [`BatchRpcConfig`].
#[derive(Debug)]
pub struct JsonRpcChainClient {
    l1: FailoverUrls,
    l2: FailoverUrls,
    methods: BatchRpcConfig,
}

/// Result of the batch-by-number call; only the block list is used
#[derive(Debug, Serialize, Deserialize)]
struct BatchInfo {
    #[serde(default)]
    blocks: Vec<H256>,
}

fn provider(url: &str) -> PushResult<Provider<Http>> {
    Provider::<Http>::try_from(url)
        .map_err(|e| PushTaskError::Config(format!("invalid RPC URL {}: {}", url, e)))
}

fn rpc_err(what: &str, e: impl std::fmt::Display) -> PushTaskError {
    PushTaskError::Rpc(format!("{}: {}", what, e))
}

/// Parse a JSON-RPC quantity (`"0x1a"`) into a u64
pub fn parse_quantity(raw: &str) -> PushResult<u64> {
    let digits = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .ok_or_else(|| PushTaskError::DataAnomaly(format!("not a hex quantity: {:?}", raw)))?;
    if digits.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(digits, 16)
        .map_err(|e| PushTaskError::DataAnomaly(format!("bad hex quantity {:?}: {}", raw, e)))
}

impl JsonRpcChainClient {
    pub fn new(l1: FailoverUrls, l2: FailoverUrls, methods: BatchRpcConfig) -> Self {
        Self { l1, l2, methods }
    }

    async fn batch_number(&self, method: &str) -> PushResult<u64> {
        self.l2
            .call(method, |url| async move {
                let raw: String = provider(&url)?
                    .request(method, ())
                    .await
                    .map_err(|e| rpc_err(method, e))?;
                parse_quantity(&raw)
            })
            .await
    }
}

#[async_trait]
impl ChainRpc for JsonRpcChainClient {
    async fn head_height(&self) -> PushResult<u64> {
        self.l1
            .call("eth_blockNumber", |url| async move {
                let height = provider(&url)?
                    .get_block_number()
                    .await
                    .map_err(|e| rpc_err("eth_blockNumber", e))?;
                Ok(height.as_u64())
            })
            .await
    }

    async fn latest_committed_batch(&self) -> PushResult<u64> {
        self.batch_number(&self.methods.committed_batch_method).await
    }

    async fn latest_verified_batch(&self) -> PushResult<u64> {
        self.batch_number(&self.methods.verified_batch_method).await
    }

    async fn max_block_number_for_batch(&self, batch: u64) -> PushResult<u64> {
        let method = self.methods.batch_by_number_method.as_str();
        self.l2
            .call(method, |url| async move {
                let provider = provider(&url)?;
                let info: BatchInfo = provider
                    .request(method, [U64::from(batch)])
                    .await
                    .map_err(|e| rpc_err(method, e))?;
                let last_hash = info.blocks.last().copied().ok_or_else(|| {
                    PushTaskError::DataAnomaly(format!("batch {} has no blocks", batch))
                })?;

                let block = provider
                    .get_block(last_hash)
                    .await
                    .map_err(|e| rpc_err("eth_getBlockByHash", e))?
                    .ok_or_else(|| {
                        PushTaskError::DataAnomaly(format!(
                            "block {:?} of batch {} not found",
                            last_hash, batch
                        ))
                    })?;
                let number = block.number.ok_or_else(|| {
                    PushTaskError::DataAnomaly(format!("block {:?} is pending", last_hash))
                })?;
                debug!(
                    "[ChainRpc] Batch {} ends at block {} ({:?})",
                    batch, number, last_hash
                );
                Ok(number.as_u64())
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("0x0").unwrap(), 0);
        assert_eq!(parse_quantity("0x1a").unwrap(), 26);
        assert_eq!(parse_quantity("0X10").unwrap(), 16);
        assert_eq!(parse_quantity("0x").unwrap(), 0);
        assert!(parse_quantity("26").is_err());
        assert!(parse_quantity("0xzz").is_err());
    }

    #[test]
    fn test_batch_info_without_blocks() {
        let info: BatchInfo = serde_json::from_str(r#"{"number":"0x5"}"#).unwrap();
        assert!(info.blocks.is_empty());

        let info: BatchInfo = serde_json::from_str(
            r#"{"number":"0x5","blocks":["0x0000000000000000000000000000000000000000000000000000000000000001","0x0000000000000000000000000000000000000000000000000000000000000002"]}"#,
        )
        .unwrap();
        assert_eq!(info.blocks.last().copied(), Some(H256::from_low_u64_be(2)));
    }

    fn assert_request_result<R>()
    where
        R: Serialize + serde::de::DeserializeOwned + std::fmt::Debug + Send,
    {
    }

    #[test]
    fn test_batch_info_is_a_valid_request_result() {
        assert_request_result::<BatchInfo>();
    }

    #[test]
    fn test_invalid_url_is_config_error() {
        assert_eq!(provider("not a url").unwrap_err().error_type(), "config");
    }
}
