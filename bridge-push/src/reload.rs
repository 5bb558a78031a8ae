// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Periodic re-read of the config file for hot-reloadable values
//!
//! Only the L1 confirmation depth and the chain id tables change at runtime.
//! Everything else requires a restart.

use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::chain_ids::ChainIdTable;
use crate::config::PushConfig;
use crate::error::PushResult;
use crate::live::{live_value, Live, LiveSender};

#[derive(Debug)]
pub struct ConfigReloader {
    path: PathBuf,
    confirmations: LiveSender<u64>,
    chain_ids: LiveSender<ChainIdTable>,
}

/// Read handles fed by a [`ConfigReloader`]
#[derive(Debug, Clone)]
pub struct LiveValues {
    pub confirmations: Live<u64>,
    pub chain_ids: Live<ChainIdTable>,
}

impl ConfigReloader {
    pub fn new(path: PathBuf, initial: &PushConfig) -> PushResult<(Self, LiveValues)> {
        let (confirmations_tx, confirmations) =
            live_value("l1_sweep.confirmations", initial.l1_sweep.confirmations);
        let (chain_ids_tx, chain_ids) = live_value("chain_ids", initial.chain_ids.to_table()?);
        Ok((
            Self {
                path,
                confirmations: confirmations_tx,
                chain_ids: chain_ids_tx,
            },
            LiveValues {
                confirmations,
                chain_ids,
            },
        ))
    }

    /// Re-read the file once. Returns whether any live value changed.
    ///
    /// An unreadable or invalid file keeps the current values.
    pub fn reload(&self) -> PushResult<bool> {
        let config = PushConfig::from_file(&self.path)?;
        let table = config.chain_ids.to_table()?;
        let confirmations_changed = self.confirmations.publish(config.l1_sweep.confirmations);
        let chain_ids_changed = self.chain_ids.publish(table);
        Ok(confirmations_changed || chain_ids_changed)
    }

    pub fn spawn(self, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // the first tick fires immediately, the values are already current
            ticker.tick().await;
            info!(
                "[Reloader] Watching {:?} every {:?}",
                self.path, interval
            );

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("[Reloader] Cancelled");
                        break;
                    }
                    _ = ticker.tick() => {
                        match self.reload() {
                            Ok(true) => info!("[Reloader] Applied new values from {:?}", self.path),
                            Ok(false) => {}
                            Err(e) => warn!("[Reloader] Keeping current values: {}", e),
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Seek, Write};

    fn write(file: &mut tempfile::NamedTempFile, contents: &str) {
        let f = file.as_file_mut();
        f.set_len(0).unwrap();
        f.rewind().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f.flush().unwrap();
    }

    #[test]
    fn test_reload_publishes_changes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write(&mut file, "l1_sweep:\n  confirmations: 64\n");
        let initial = PushConfig::from_file(file.path()).unwrap();
        let (reloader, live) = ConfigReloader::new(file.path().to_path_buf(), &initial).unwrap();

        assert!(!reloader.reload().unwrap());
        assert_eq!(live.confirmations.get(), 64);

        write(
            &mut file,
            "l1_sweep:\n  confirmations: 12\nchain_ids:\n  networks: [0, 1]\n  chain_ids: [1, 196]\n  standard_chain_ids: [196]\n  inner_chain_ids: [66]\n",
        );
        assert!(reloader.reload().unwrap());
        assert_eq!(live.confirmations.get(), 12);
        assert_eq!(live.chain_ids.get().external_chain_id(1), Some(66));
    }

    #[test]
    fn test_invalid_file_keeps_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write(&mut file, "l1_sweep:\n  confirmations: 30\n");
        let initial = PushConfig::from_file(file.path()).unwrap();
        let (reloader, live) = ConfigReloader::new(file.path().to_path_buf(), &initial).unwrap();

        write(&mut file, "page_size: 0\n");
        assert!(reloader.reload().is_err());
        assert_eq!(live.confirmations.get(), 30);
    }
}
