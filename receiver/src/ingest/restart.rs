//! Restart requests and the policies that answer them
//!
//! The receive loop never retries on its own. Every exit other than a
//! deliberate stop produces a [`RestartRequest`]; a [`RestartPolicy`] decides
//! whether and when the next attempt runs.
//!
//! Provided policies:
//! - **FixedDelay**: constant delay between attempts
//! - **BackoffPolicy**: exponential backoff with jitter, optional attempt cap
//! - **NeverRestart**: report and give up

use super::target::ConnectionTarget;
use crate::error::{DecodeError, IngestError};
use rand::Rng;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Delay used by [`FixedDelay::default`]
pub const DEFAULT_RESTART_DELAY: Duration = Duration::from_secs(2);

/// Why the receive loop ended. Informational; every kind is retried alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Remote side closed the stream cleanly
    EndOfStream,
    /// Nothing accepted the connection
    ConnectionRefused,
    /// Connect timeout, reset, broken pipe, read timeout, ...
    Transport,
    /// Bytes arrived but could not be decoded
    Decode,
}

impl FailureKind {
    pub fn of(err: &IngestError) -> Self {
        match err {
            IngestError::ConnectionRefused { .. } => FailureKind::ConnectionRefused,
            IngestError::Connect { .. } | IngestError::Decode(DecodeError::Io(_)) => {
                FailureKind::Transport
            }
            IngestError::Decode(_) => FailureKind::Decode,
        }
    }

    /// Label used in logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::EndOfStream => "end_of_stream",
            FailureKind::ConnectionRefused => "connection_refused",
            FailureKind::Transport => "transport",
            FailureKind::Decode => "decode",
        }
    }
}

/// Emitted once per receive-loop exit that should lead to a reconnect
#[derive(Debug)]
pub struct RestartRequest {
    pub reason: String,
    pub kind: FailureKind,
    pub cause: Option<IngestError>,
}

impl RestartRequest {
    /// Clean end of stream without a stop request
    pub fn end_of_stream(target: &ConnectionTarget) -> Self {
        Self {
            reason: format!("Retrying connecting to {target}"),
            kind: FailureKind::EndOfStream,
            cause: None,
        }
    }

    /// Loop ended with an error
    pub fn failed(target: &ConnectionTarget, cause: IngestError) -> Self {
        let reason = if cause.is_connection_refused() {
            format!("Error connecting to {target}")
        } else {
            format!("Error receiving data from {target}")
        };
        Self {
            reason,
            kind: FailureKind::of(&cause),
            cause: Some(cause),
        }
    }
}

impl fmt::Display for RestartRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{}: {}", self.reason, cause),
            None => f.write_str(&self.reason),
        }
    }
}

/// Answer to a restart request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Restart {
    /// Run a fresh receive loop after the delay
    After(Duration),
    /// Give up; the receiver ends in `Stopped`
    Never,
}

/// Restart policy trait - decides what happens after a loop exit
///
/// Called from the receiver thread, never concurrently for one receiver.
pub trait RestartPolicy: Send + Sync {
    /// Decide whether and when to reconnect
    fn restart(&self, request: &RestartRequest) -> Restart;

    /// A connection delivered its first record; policies that count
    /// attempts reset here
    ///
    /// Not called for connections that close before yielding anything.
    fn on_connected(&self) {}
}

impl<P: RestartPolicy + ?Sized> RestartPolicy for Arc<P> {
    fn restart(&self, request: &RestartRequest) -> Restart {
        (**self).restart(request)
    }

    fn on_connected(&self) {
        (**self).on_connected()
    }
}

/// Always restart after the same delay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedDelay(pub Duration);

impl Default for FixedDelay {
    fn default() -> Self {
        Self(DEFAULT_RESTART_DELAY)
    }
}

impl RestartPolicy for FixedDelay {
    fn restart(&self, _: &RestartRequest) -> Restart {
        Restart::After(self.0)
    }
}

/// Never restart
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverRestart;

impl RestartPolicy for NeverRestart {
    fn restart(&self, _: &RestartRequest) -> Restart {
        Restart::Never
    }
}

/// Exponential backoff configuration
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Consecutive restarts allowed without a delivered record (None = unlimited)
    pub max_attempts: Option<u32>,
    /// Delay before the first restart
    pub initial_delay: Duration,
    /// Upper bound for any delay
    pub max_delay: Duration,
    /// Growth factor per attempt
    pub multiplier: f64,
    /// Relative jitter, 0.1 = +/-10%
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            max_attempts: None,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: 0.1,
        }
    }
}

impl BackoffConfig {
    /// Un-jittered delay before restart number `attempt` (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::try_from_secs_f64(secs)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Exponential backoff with jitter
#[derive(Debug)]
pub struct BackoffPolicy {
    config: BackoffConfig,
    attempts: AtomicU32,
}

impl BackoffPolicy {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            attempts: AtomicU32::new(0),
        }
    }

    /// Restarts requested since a connection last delivered a record
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::Relaxed)
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if self.config.jitter <= 0.0 || delay.is_zero() {
            return delay;
        }
        let factor = 1.0 + rand::thread_rng().gen_range(-self.config.jitter..=self.config.jitter);
        Duration::try_from_secs_f64(delay.as_secs_f64() * factor.max(0.0))
            .unwrap_or(delay)
            .min(self.config.max_delay)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(BackoffConfig::default())
    }
}

impl RestartPolicy for BackoffPolicy {
    fn restart(&self, _: &RestartRequest) -> Restart {
        let attempt = self.attempts.fetch_add(1, Ordering::Relaxed);
        if let Some(max) = self.config.max_attempts {
            if attempt >= max {
                return Restart::Never;
            }
        }
        Restart::After(self.jittered(self.config.delay_for(attempt)))
    }

    fn on_connected(&self) {
        self.attempts.store(0, Ordering::Relaxed);
    }
}
