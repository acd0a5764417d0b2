//! VIRTA - socket receiver
//!
//! Connects to a line-oriented TCP source and prints what it receives in
//! periodic batches, reconnecting with backoff when the source goes away.
//!
//! ## Usage
//!
//! ```bash
//! # Feed it something
//! nc -lk 9999
//!
//! # Run against localhost:9999
//! cargo run --bin virta
//!
//! # Debug output
//! VIRTA_LOG_LEVEL=debug cargo run --bin virta
//! ```
//!
//! ## Environment Variables
//!
//! - `VIRTA_HOST` / `VIRTA_PORT`: source to connect to (default: "localhost:9999")
//! - `VIRTA_BATCH_INTERVAL_MS`: how often buffered records are printed (default: 1000)
//! - `VIRTA_BUFFER_CAPACITY`: record buffer capacity (default: 100000)
//! - `VIRTA_METRICS_ADDR`: `/metrics` and `/health` address (default: "0.0.0.0:9090")
//! - `VIRTA_LOG_LEVEL` / `VIRTA_LOG_FORMAT`: logging (default: "info", "pretty")

use std::io::Write;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use virta_receiver::buffer::RingBuffer;
use virta_receiver::config::{Config, LogFormat};
use virta_receiver::ingest::{BackoffPolicy, SocketIngester};
use virta_receiver::metrics::Metrics;
use virta_receiver::metrics_server::MetricsServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.log_level.as_str().into());
    match config.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
    }

    info!(
        target_addr = %config.target(),
        metrics_addr = %config.metrics_addr,
        buffer_capacity = config.buffer_capacity,
        storage_level = %config.storage_level,
        "Starting VIRTA receiver"
    );

    Metrics::init()?;

    let buffer = Arc::new(RingBuffer::with_storage_level(
        config.buffer_capacity,
        config.storage_level,
    ));

    let ingester = Arc::new(
        SocketIngester::builder(config.target(), config.line_decoder(), buffer.clone())
            .timeouts(config.timeouts())
            .storage_level(config.storage_level)
            .restart_policy(BackoffPolicy::new(config.backoff()))
            .build(),
    );
    let metrics_handle = MetricsServer::start(config.metrics_addr, ingester.clone());
    ingester.start()?;

    let mut ticker = tokio::time::interval(config.batch_interval());
    let mut batch_id: u64 = 0;
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                batch_id += 1;
                print_batch(batch_id, buffer.drain_all());
            }
            _ = &mut shutdown => break,
        }
    }

    // Cooperative: a read blocked on a silent source is not interrupted.
    ingester.stop();
    print_batch(batch_id + 1, buffer.drain_all());
    metrics_handle.abort();

    let stats = ingester.stats();
    info!(
        records = stats.records_delivered,
        connections = stats.connections,
        restarts = stats.restarts,
        "VIRTA receiver shutdown complete"
    );
    Ok(())
}

fn print_batch(batch_id: u64, records: Vec<String>) {
    if records.is_empty() {
        return;
    }
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "── batch {batch_id} ({} records)", records.len()).ok();
    for record in &records {
        writeln!(stdout, "{record}").ok();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = ?e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = ?e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
