//! Scrape and liveness endpoints for a hosted receiver
//!
//! - `/metrics`: Prometheus text exposition of the global registry
//! - `/health`: the receiver's lifecycle state. 200 while it is running,
//!   503 before start and once it stopped or its restart policy gave up.

use crate::ingest::{IngesterState, Receiver};
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::{Router, routing::get};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// HTTP server exposing metrics and receiver health
pub struct MetricsServer;

impl MetricsServer {
    /// Serve on `addr` in a tokio task
    ///
    /// Abort the returned handle to shut the server down.
    pub fn start(addr: SocketAddr, receiver: Arc<dyn Receiver>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let listener = match tokio::net::TcpListener::bind(addr).await {
                Ok(listener) => listener,
                Err(e) => {
                    error!(error = %e, %addr, "Failed to bind metrics server");
                    return;
                }
            };
            info!(%addr, receiver = receiver.name(), "Metrics server listening");

            if let Err(e) = axum::serve(listener, router(receiver)).await {
                error!(error = %e, "Metrics server error");
            }
        })
    }
}

/// Routes, with the receiver whose state `/health` reports
pub fn router(receiver: Arc<dyn Receiver>) -> Router {
    Router::new()
        .route("/metrics", get(scrape))
        .route("/health", get(health))
        .with_state(receiver)
}

async fn scrape() -> (StatusCode, [(header::HeaderName, &'static str); 1], String) {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)],
        crate::metrics::gather(),
    )
}

async fn health(State(receiver): State<Arc<dyn Receiver>>) -> (StatusCode, String) {
    let state = receiver.state();
    let status = match state {
        IngesterState::Running => StatusCode::OK,
        IngesterState::Created | IngesterState::StopRequested | IngesterState::Stopped => {
            StatusCode::SERVICE_UNAVAILABLE
        }
    };
    (status, format!("{} {}", receiver.name(), state.as_str()))
}
