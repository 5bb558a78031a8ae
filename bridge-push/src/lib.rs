// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Starcoin Bridge Push
//!
//! Sweeps synced bridge deposits as they mature and notifies consumers of
//! each status change.
//!
//! ```text
//!   L1 head ────────► L1ConfirmationTask ──┐
//!   committed batch ► BatchSweepTask ──────┼──► DepositScanner ──► Dispatcher ──► transport
//!   verified batch ─► BatchSweepTask ──────┘         │                  (spawned, never awaited)
//!                           │                         ▼
//!                           ▼                    RecordStore (Postgres)
//!          KvStore: locks, checkpoints, duration windows (Redis)
//!
//!   new deposit / claim rows ──► RecordFeedTask ──► Dispatcher (created, claimed)
//! ```
//!
//! Any number of replicas may run. Each task holds a TTL lock for the length
//! of one tick, so a checkpoint is only ever advanced by one replica at a time.

pub mod chain;
pub mod chain_ids;
pub mod checkpoint;
pub mod config;
pub mod duration;
pub mod error;
pub mod failover;
pub mod live;
pub mod lock;
pub mod metrics;
pub mod metrics_server;
pub mod notify;
pub mod reload;
pub mod storage;
pub mod store;
pub mod tasks;
pub mod types;
