// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Network id / chain id translation tables

use std::collections::{HashMap, HashSet};

use crate::error::{PushResult, PushTaskError};

/// Translates internal network ids into the chain ids consumers see.
///
/// Two tables are kept:
/// - network id -> standard chain id (e.g. `0 -> 1` for Ethereum mainnet)
/// - standard chain id <-> inner chain id, for chains that are known to
///   consumers under a different id. Ids without an entry map to themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainIdTable {
    network_chain_ids: HashMap<u32, u64>,
    standard_to_inner: HashMap<u64, u64>,
    inner_to_standard: HashMap<u64, u64>,
}

impl ChainIdTable {
    /// Build from paired lists. Lengths must match and no id may repeat
    /// within a list.
    pub fn new(
        networks: &[u32],
        chain_ids: &[u64],
        standard_chain_ids: &[u64],
        inner_chain_ids: &[u64],
    ) -> PushResult<Self> {
        if networks.len() != chain_ids.len() {
            return Err(PushTaskError::Config(format!(
                "network ids ({}) and chain ids ({}) differ in length",
                networks.len(),
                chain_ids.len()
            )));
        }
        if standard_chain_ids.len() != inner_chain_ids.len() {
            return Err(PushTaskError::Config(format!(
                "standard chain ids ({}) and inner chain ids ({}) differ in length",
                standard_chain_ids.len(),
                inner_chain_ids.len()
            )));
        }

        reject_duplicates("network ids", networks)?;
        reject_duplicates("standard chain ids", standard_chain_ids)?;
        reject_duplicates("inner chain ids", inner_chain_ids)?;

        let network_chain_ids = networks.iter().copied().zip(chain_ids.iter().copied()).collect();
        let mut standard_to_inner = HashMap::with_capacity(standard_chain_ids.len());
        let mut inner_to_standard = HashMap::with_capacity(standard_chain_ids.len());
        for (standard, inner) in standard_chain_ids.iter().zip(inner_chain_ids) {
            standard_to_inner.insert(*standard, *inner);
            inner_to_standard.insert(*inner, *standard);
        }

        Ok(Self {
            network_chain_ids,
            standard_to_inner,
            inner_to_standard,
        })
    }

    pub fn chain_id_for_network(&self, network_id: u32) -> Option<u64> {
        self.network_chain_ids.get(&network_id).copied()
    }

    pub fn inner_chain_id(&self, standard_chain_id: u64) -> u64 {
        self.standard_to_inner
            .get(&standard_chain_id)
            .copied()
            .unwrap_or(standard_chain_id)
    }

    pub fn standard_chain_id(&self, inner_chain_id: u64) -> u64 {
        self.inner_to_standard
            .get(&inner_chain_id)
            .copied()
            .unwrap_or(inner_chain_id)
    }

    /// Chain id exposed to consumers for a network, if the network is known.
    pub fn external_chain_id(&self, network_id: u32) -> Option<u64> {
        self.chain_id_for_network(network_id)
            .map(|id| self.inner_chain_id(id))
    }
}

fn reject_duplicates<T>(what: &str, ids: &[T]) -> PushResult<()>
where
    T: Copy + Eq + std::hash::Hash + std::fmt::Display,
{
    let mut seen = HashSet::with_capacity(ids.len());
    for id in ids {
        if !seen.insert(*id) {
            return Err(PushTaskError::Config(format!("duplicate entry {} in {}", id, what)));
        }
    }
    Ok(())
}
