//! Prometheus metrics for VIRTA

use crate::error::{Result, VirtaError};
use prometheus::{
    CounterVec, Encoder, Gauge, TextEncoder, register_counter_vec, register_gauge,
};
use std::sync::OnceLock;

/// Global metrics instance
static METRICS: OnceLock<Metrics> = OnceLock::new();

/// All VIRTA metrics
pub struct Metrics {
    /// Records stored (by target)
    pub records_received: CounterVec,

    /// Records dropped (by reason)
    pub records_dropped: CounterVec,

    /// Restart requests (by failure kind)
    pub restarts: CounterVec,

    /// Connections opened (by target)
    pub connections: CounterVec,

    /// Currently open connections
    pub active_connections: Gauge,

    /// Current buffer size
    pub buffer_size: Gauge,
}

impl Metrics {
    /// Initialize metrics (call once at startup)
    ///
    /// Returns error if metric registration fails.
    pub fn init() -> Result<&'static Metrics> {
        if let Some(metrics) = METRICS.get() {
            return Ok(metrics);
        }

        let metrics = Metrics {
            records_received: register_counter_vec!(
                "virta_records_received_total",
                "Total records decoded and stored",
                &["target"]
            )
            .map_err(|e| VirtaError::Metrics(format!("records_received: {e}")))?,

            records_dropped: register_counter_vec!(
                "virta_records_dropped_total",
                "Total records dropped",
                &["reason"]
            )
            .map_err(|e| VirtaError::Metrics(format!("records_dropped: {e}")))?,

            restarts: register_counter_vec!(
                "virta_restarts_total",
                "Total restart requests emitted by receivers",
                &["kind"]
            )
            .map_err(|e| VirtaError::Metrics(format!("restarts: {e}")))?,

            connections: register_counter_vec!(
                "virta_connections_total",
                "Total connections established",
                &["target"]
            )
            .map_err(|e| VirtaError::Metrics(format!("connections: {e}")))?,

            active_connections: register_gauge!(
                "virta_active_connections",
                "Number of open receiver connections"
            )
            .map_err(|e| VirtaError::Metrics(format!("active_connections: {e}")))?,

            buffer_size: register_gauge!("virta_buffer_size", "Current number of buffered records")
                .map_err(|e| VirtaError::Metrics(format!("buffer_size: {e}")))?,
        };

        // Set the metrics (only succeeds once)
        let _ = METRICS.set(metrics);

        METRICS
            .get()
            .ok_or_else(|| VirtaError::Metrics("Failed to initialize metrics".to_string()))
    }

    /// Get the global metrics instance
    ///
    /// Returns None if metrics haven't been initialized yet.
    pub fn get() -> Option<&'static Metrics> {
        METRICS.get()
    }

    pub fn record_received(&self, target: &str, count: u64) {
        self.records_received
            .with_label_values(&[target])
            .inc_by(count as f64);
    }

    pub fn record_dropped(&self, reason: &str, count: u64) {
        self.records_dropped
            .with_label_values(&[reason])
            .inc_by(count as f64);
    }

    pub fn record_restart(&self, kind: &str) {
        self.restarts.with_label_values(&[kind]).inc();
    }

    pub fn record_connection(&self, target: &str) {
        self.connections.with_label_values(&[target]).inc();
    }

    pub fn set_buffer_size(&self, size: usize) {
        self.buffer_size.set(size as f64);
    }
}

/// Gather all metrics and encode as Prometheus text format
///
/// Returns the metrics as a String, ready to be served via HTTP.
pub fn gather() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_ok() {
        String::from_utf8(buffer).unwrap_or_default()
    } else {
        String::new()
    }
}

// Helpers below record only if metrics were initialized, otherwise skip.

pub fn try_record_received(target: &str, count: u64) {
    if let Some(m) = Metrics::get() {
        m.record_received(target, count);
    }
}

pub fn try_record_dropped(reason: &str, count: u64) {
    if let Some(m) = Metrics::get() {
        m.record_dropped(reason, count);
    }
}

pub fn try_record_restart(kind: &str) {
    if let Some(m) = Metrics::get() {
        m.record_restart(kind);
    }
}

pub fn try_record_connection(target: &str) {
    if let Some(m) = Metrics::get() {
        m.record_connection(target);
    }
}

pub fn try_inc_active_connections() {
    if let Some(m) = Metrics::get() {
        m.active_connections.inc();
    }
}

pub fn try_dec_active_connections() {
    if let Some(m) = Metrics::get() {
        m.active_connections.dec();
    }
}

pub fn try_set_buffer_size(size: usize) {
    if let Some(m) = Metrics::get() {
        m.set_buffer_size(size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_init() {
        // Metrics::init() may fail if already initialized from another test
        // so we just check get() works after any successful init
        let _ = Metrics::init();
        if let Some(metrics) = Metrics::get() {
            metrics.record_received("localhost:9999", 10);
            metrics.record_restart("end_of_stream");
            metrics.set_buffer_size(100);
            assert!(gather().contains("virta_records_received_total"));
        }
    }
}
