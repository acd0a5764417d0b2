//! Configuration for VIRTA

use crate::decode::LineDecoder;
use crate::error::{Result, VirtaError};
use crate::ingest::{BackoffConfig, ConnectionTarget, Timeouts};
use crate::storage::StorageLevel;
use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Main configuration for VIRTA
#[derive(Debug, Clone)]
pub struct Config {
    /// Host to connect to
    pub host: String,

    /// Port to connect to
    pub port: u16,

    /// Connection timeout in milliseconds (0 = OS default)
    pub connect_timeout_ms: u64,

    /// Read timeout in milliseconds (0 = block indefinitely)
    pub read_timeout_ms: u64,

    /// Maximum accepted line length in bytes (0 = unbounded)
    pub max_line_length: usize,

    /// Buffer capacity (number of records)
    pub buffer_capacity: usize,

    /// How often the buffer is drained into a batch, in milliseconds
    pub batch_interval_ms: u64,

    /// Durability requested from the storage side
    pub storage_level: StorageLevel,

    /// First restart delay in milliseconds
    pub restart_delay_ms: u64,

    /// Upper bound for restart delay in milliseconds
    pub restart_max_delay_ms: u64,

    /// Consecutive failed restarts before giving up (0 = never give up)
    pub restart_max_attempts: u32,

    /// Metrics server address
    pub metrics_addr: SocketAddr,

    /// Log level
    pub log_level: String,

    /// Log format (json or pretty)
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 9999,
            connect_timeout_ms: 5000,
            read_timeout_ms: 0,
            max_line_length: 0,
            buffer_capacity: 100_000,
            batch_interval_ms: 1000,
            storage_level: StorageLevel::MEMORY_AND_DISK_SER_2,
            restart_delay_ms: 100,
            restart_max_delay_ms: 30_000,
            restart_max_attempts: 0,
            metrics_addr: SocketAddr::from(([0, 0, 0, 0], 9090)),
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(host) = lookup("VIRTA_HOST") {
            config.host = host;
        }
        if let Some(port) = parse_var(&lookup, "VIRTA_PORT")? {
            config.port = port;
        }
        if let Some(ms) = parse_var(&lookup, "VIRTA_CONNECT_TIMEOUT_MS")? {
            config.connect_timeout_ms = ms;
        }
        if let Some(ms) = parse_var(&lookup, "VIRTA_READ_TIMEOUT_MS")? {
            config.read_timeout_ms = ms;
        }
        if let Some(len) = parse_var(&lookup, "VIRTA_MAX_LINE_LENGTH")? {
            config.max_line_length = len;
        }
        if let Some(cap) = parse_var(&lookup, "VIRTA_BUFFER_CAPACITY")? {
            config.buffer_capacity = cap;
        }
        if let Some(ms) = parse_var(&lookup, "VIRTA_BATCH_INTERVAL_MS")? {
            config.batch_interval_ms = ms;
        }
        if let Some(level) = lookup("VIRTA_STORAGE_LEVEL") {
            config.storage_level = level.parse()?;
        }
        if let Some(ms) = parse_var(&lookup, "VIRTA_RESTART_DELAY_MS")? {
            config.restart_delay_ms = ms;
        }
        if let Some(ms) = parse_var(&lookup, "VIRTA_RESTART_MAX_DELAY_MS")? {
            config.restart_max_delay_ms = ms;
        }
        if let Some(n) = parse_var(&lookup, "VIRTA_RESTART_MAX_ATTEMPTS")? {
            config.restart_max_attempts = n;
        }
        if let Some(addr) = parse_var(&lookup, "VIRTA_METRICS_ADDR")? {
            config.metrics_addr = addr;
        }
        if let Some(level) = lookup("VIRTA_LOG_LEVEL") {
            config.log_level = level;
        }
        if let Some(format) = lookup("VIRTA_LOG_FORMAT") {
            config.log_format = match format.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "pretty" => LogFormat::Pretty,
                other => {
                    return Err(VirtaError::Config(format!(
                        "invalid VIRTA_LOG_FORMAT: {other} (expected 'json' or 'pretty')"
                    )));
                }
            };
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(VirtaError::Config("VIRTA_HOST must not be empty".into()));
        }
        if self.buffer_capacity == 0 {
            return Err(VirtaError::Config(
                "VIRTA_BUFFER_CAPACITY must be greater than zero".into(),
            ));
        }
        if self.batch_interval_ms == 0 {
            return Err(VirtaError::Config(
                "VIRTA_BATCH_INTERVAL_MS must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn target(&self) -> ConnectionTarget {
        ConnectionTarget::new(self.host.clone(), self.port)
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            connect: non_zero_millis(self.connect_timeout_ms),
            read: non_zero_millis(self.read_timeout_ms),
        }
    }

    pub fn line_decoder(&self) -> LineDecoder {
        match self.max_line_length {
            0 => LineDecoder::new(),
            max => LineDecoder::new().with_max_line_length(max),
        }
    }

    pub fn backoff(&self) -> BackoffConfig {
        BackoffConfig {
            max_attempts: (self.restart_max_attempts > 0).then_some(self.restart_max_attempts),
            initial_delay: Duration::from_millis(self.restart_delay_ms),
            max_delay: Duration::from_millis(self.restart_max_delay_ms.max(self.restart_delay_ms)),
            ..Default::default()
        }
    }

    pub fn batch_interval(&self) -> Duration {
        Duration::from_millis(self.batch_interval_ms)
    }
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| VirtaError::Config(format!("invalid {name}: {e}")))
        })
        .transpose()
}

fn non_zero_millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.target().to_string(), "localhost:9999");
        assert_eq!(config.buffer_capacity, 100_000);
        assert_eq!(config.storage_level, StorageLevel::MEMORY_AND_DISK_SER_2);
        assert_eq!(config.timeouts().read, None);
        assert_eq!(config.backoff().max_attempts, None);
    }

    #[test]
    fn test_config_from_lookup() {
        let config = Config::from_lookup(lookup(&[
            ("VIRTA_HOST", "stream.internal"),
            ("VIRTA_PORT", "7000"),
            ("VIRTA_READ_TIMEOUT_MS", "1500"),
            ("VIRTA_MAX_LINE_LENGTH", "4096"),
            ("VIRTA_STORAGE_LEVEL", "memory_only"),
            ("VIRTA_RESTART_MAX_ATTEMPTS", "5"),
            ("VIRTA_LOG_FORMAT", "JSON"),
        ]))
        .unwrap();

        assert_eq!(config.target(), ConnectionTarget::new("stream.internal", 7000));
        assert_eq!(config.timeouts().read, Some(Duration::from_millis(1500)));
        assert_eq!(config.line_decoder().max_line_length(), 4096);
        assert_eq!(config.storage_level, StorageLevel::MEMORY_ONLY);
        assert_eq!(config.backoff().max_attempts, Some(5));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = Config::from_lookup(lookup(&[("VIRTA_PORT", "99999")])).unwrap_err();
        assert!(err.to_string().contains("VIRTA_PORT"));

        assert!(Config::from_lookup(lookup(&[("VIRTA_LOG_FORMAT", "xml")])).is_err());
        assert!(Config::from_lookup(lookup(&[("VIRTA_BUFFER_CAPACITY", "0")])).is_err());
        assert!(Config::from_lookup(lookup(&[("VIRTA_STORAGE_LEVEL", "TAPE")])).is_err());
    }

    #[test]
    fn test_config_from_env() {
        // Uses defaults unless the environment sets VIRTA_* variables
        let config = Config::from_env().unwrap();
        assert!(config.buffer_capacity > 0);
    }
}
