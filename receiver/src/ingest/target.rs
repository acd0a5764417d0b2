//! Connection target and socket timeouts

use std::fmt;
use std::time::Duration;

/// Default connection timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Remote endpoint a receiver connects to. Fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionTarget {
    pub host: String,
    pub port: u16,
}

impl ConnectionTarget {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Get the socket address string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// OS-level socket timeouts
///
/// `None` means block indefinitely. An expired read timeout surfaces as an
/// I/O error from the decoder and ends the connection like any other
/// transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub connect: Option<Duration>,
    pub read: Option<Duration>,
}

impl Timeouts {
    /// Set connection timeout
    pub fn with_connect(mut self, timeout: Duration) -> Self {
        self.connect = Some(timeout);
        self
    }

    /// Set read timeout
    pub fn with_read(mut self, timeout: Duration) -> Self {
        self.read = Some(timeout);
        self
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Some(DEFAULT_CONNECT_TIMEOUT),
            read: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_display() {
        let target = ConnectionTarget::new("localhost", 9999);
        assert_eq!(target.to_string(), "localhost:9999");
        assert_eq!(target.address(), "localhost:9999");
    }

    #[test]
    fn test_timeouts_builder() {
        let timeouts = Timeouts::default().with_read(Duration::from_millis(250));
        assert_eq!(timeouts.connect, Some(DEFAULT_CONNECT_TIMEOUT));
        assert_eq!(timeouts.read, Some(Duration::from_millis(250)));
    }
}
