// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Prometheus scrape endpoint

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use prometheus::{Encoder, Registry, TextEncoder};
use std::net::SocketAddr;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub const METRICS_ROUTE: &str = "/metrics";

pub fn metrics_router(registry: Registry) -> Router {
    Router::new()
        .route(METRICS_ROUTE, get(metrics))
        .with_state(registry)
}

async fn metrics(State(registry): State<Registry>) -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    match encoder.encode(&registry.gather(), &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, encoder.format_type().to_string())],
            buffer,
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("unable to encode metrics: {}", e),
        )
            .into_response(),
    }
}

/// Bind `addr` and serve the registry until `cancel` fires
pub async fn start_metrics_server(
    addr: SocketAddr,
    registry: Registry,
    cancel: CancellationToken,
) -> anyhow::Result<JoinHandle<()>> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", listener.local_addr()?);

    Ok(tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, metrics_router(registry))
            .with_graceful_shutdown(async move { cancel.cancelled().await })
            .await
        {
            error!("Metrics server error: {:?}", e);
        }
    }))
}
