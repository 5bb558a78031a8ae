// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use prometheus::{
    register_int_counter_vec_with_registry, register_int_gauge_vec_with_registry, IntCounterVec,
    IntGaugeVec, Registry,
};
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct PushMetrics {
    pub(crate) sweep_ticks: IntCounterVec,
    pub(crate) sweep_errors: IntCounterVec,
    pub(crate) sweep_pages: IntCounterVec,
    pub(crate) checkpoints: IntGaugeVec,
    pub(crate) average_durations: IntGaugeVec,
    pub(crate) rejected_averages: IntCounterVec,
    pub(crate) dispatches: IntCounterVec,
}

impl PushMetrics {
    pub fn new(registry: &Registry) -> Self {
        Self {
            sweep_ticks: register_int_counter_vec_with_registry!(
                "bridge_push_sweep_ticks",
                "Total number of sweep ticks by task and outcome",
                &["task", "outcome"],
                registry,
            )
            .unwrap(),
            sweep_errors: register_int_counter_vec_with_registry!(
                "bridge_push_sweep_errors",
                "Total number of aborted sweep ticks by task and error type",
                &["task", "error_type"],
                registry,
            )
            .unwrap(),
            sweep_pages: register_int_counter_vec_with_registry!(
                "bridge_push_sweep_pages",
                "Total number of record store pages queried by task",
                &["task"],
                registry,
            )
            .unwrap(),
            checkpoints: register_int_gauge_vec_with_registry!(
                "bridge_push_checkpoint",
                "Last checkpoint value written by this replica",
                &["watermark"],
                registry,
            )
            .unwrap(),
            average_durations: register_int_gauge_vec_with_registry!(
                "bridge_push_average_duration_secs",
                "Last accepted average batch duration in seconds",
                &["role"],
                registry,
            )
            .unwrap(),
            rejected_averages: register_int_counter_vec_with_registry!(
                "bridge_push_rejected_averages",
                "Total number of out-of-bound duration averages discarded",
                &["role"],
                registry,
            )
            .unwrap(),
            dispatches: register_int_counter_vec_with_registry!(
                "bridge_push_dispatches",
                "Total number of notification sends by status and result",
                &["status", "result"],
                registry,
            )
            .unwrap(),
        }
    }

    pub fn new_for_testing() -> Arc<Self> {
        Arc::new(Self::new(&Registry::new()))
    }
}
