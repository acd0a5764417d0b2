//! Socket receiver - connect, decode, store, restart
//!
//! # Threading
//!
//! `start()` spawns one dedicated thread per receiver and returns. That
//! thread runs a supervisor loop:
//!
//! ```text
//! ┌──────────────► receive_loop() ──── stop observed ───► Stopped
//! │                     │
//! │               RestartRequest
//! │                     ▼
//! └── sleep(d) ◄── policy.restart() ── Restart::Never ──► Stopped
//! ```
//!
//! Each `receive_loop()` owns exactly one connection and closes it before
//! returning, on every path.
//!
//! # Cancellation latency
//!
//! `stop()` only flips an atomic flag. The loop checks it before connecting,
//! before every record pull and before asking for a restart. A pull blocked
//! in `read()` is not interrupted: the stop takes effect once that read
//! returns (data, EOF, read timeout or error). Backoff sleeps are woken
//! immediately.

use super::connect::{Connection, Connector, TcpConnector};
use super::receiver::Receiver;
use super::restart::{FixedDelay, Restart, RestartPolicy, RestartRequest};
use super::state::{IngesterState, StateCell};
use super::target::{ConnectionTarget, Timeouts};
use crate::decode::{Decoder, LineDecoder};
use crate::error::{IngestError, Result, VirtaError};
use crate::metrics;
use crate::storage::{StorageLevel, Store};
use parking_lot::Mutex;
use std::io::Read;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle, Thread};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

/// Counters snapshot for a receiver
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngesterStats {
    /// Records handed to the store
    pub records_delivered: u64,
    /// Connections successfully opened
    pub connections: u64,
    /// Restart requests emitted
    pub restarts: u64,
    /// Most recent failure, if any
    pub last_error: Option<String>,
}

#[derive(Default)]
struct Stats {
    records_delivered: AtomicU64,
    connections: AtomicU64,
    restarts: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl Stats {
    fn snapshot(&self) -> IngesterStats {
        IngesterStats {
            records_delivered: self.records_delivered.load(Ordering::Relaxed),
            connections: self.connections.load(Ordering::Relaxed),
            restarts: self.restarts.load(Ordering::Relaxed),
            last_error: self.last_error.lock().clone(),
        }
    }
}

/// Builder for [`SocketIngester`]
pub struct SocketIngesterBuilder<D: Decoder> {
    target: ConnectionTarget,
    decoder: D,
    store: Arc<dyn Store<D::Record>>,
    timeouts: Timeouts,
    storage_level: StorageLevel,
    connector: Arc<dyn Connector>,
    policy: Arc<dyn RestartPolicy>,
}

impl<D: Decoder> SocketIngesterBuilder<D> {
    /// Socket timeouts (default: 5s connect, blocking read)
    pub fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Durability passed through to the storage side
    pub fn storage_level(mut self, level: StorageLevel) -> Self {
        self.storage_level = level;
        self
    }

    /// Replace the TCP connector
    pub fn connector<C: Connector>(mut self, connector: C) -> Self {
        self.connector = Arc::new(connector);
        self
    }

    /// Restart policy (default: fixed 2s delay)
    pub fn restart_policy<P: RestartPolicy + 'static>(mut self, policy: P) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    /// Restart policy (Arc version)
    pub fn restart_policy_arc(mut self, policy: Arc<dyn RestartPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn build(self) -> SocketIngester<D> {
        SocketIngester {
            inner: Arc::new(Inner {
                target: self.target,
                timeouts: self.timeouts,
                storage_level: self.storage_level,
                decoder: self.decoder,
                connector: self.connector,
                store: self.store,
                policy: self.policy,
                state: StateCell::new(),
                stats: Stats::default(),
            }),
            worker: Mutex::new(None),
        }
    }
}

/// Single-connection receiver
///
/// Connects to `host:port`, decodes the stream with `D` and stores every
/// record, in order, exactly once per successful decode. Failures turn into
/// restart requests answered by the configured [`RestartPolicy`].
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use virta_receiver::buffer::RingBuffer;
/// use virta_receiver::ingest::{BackoffPolicy, SocketIngester};
///
/// let buffer = Arc::new(RingBuffer::<String>::new(10_000));
/// let ingester = SocketIngester::lines("localhost", 9999, buffer.clone())
///     .restart_policy(BackoffPolicy::default())
///     .build();
///
/// ingester.start()?;
/// // ... drain `buffer` elsewhere ...
/// ingester.stop();
/// # Ok::<(), virta_receiver::VirtaError>(())
/// ```
pub struct SocketIngester<D: Decoder> {
    inner: Arc<Inner<D>>,
    worker: Mutex<Option<Worker>>,
}

struct Worker {
    thread: Thread,
    handle: Option<JoinHandle<()>>,
}

impl SocketIngester<LineDecoder> {
    /// Receiver for newline-delimited UTF-8 text
    pub fn lines<S>(
        host: impl Into<String>,
        port: u16,
        store: Arc<S>,
    ) -> SocketIngesterBuilder<LineDecoder>
    where
        S: Store<String> + 'static,
    {
        Self::builder(ConnectionTarget::new(host, port), LineDecoder::new(), store)
    }
}

impl<D: Decoder> SocketIngester<D> {
    pub fn builder<S>(target: ConnectionTarget, decoder: D, store: Arc<S>) -> SocketIngesterBuilder<D>
    where
        S: Store<D::Record> + 'static,
    {
        SocketIngesterBuilder {
            target,
            decoder,
            store,
            timeouts: Timeouts::default(),
            storage_level: StorageLevel::default(),
            connector: Arc::new(TcpConnector),
            policy: Arc::new(FixedDelay::default()),
        }
    }

    /// Spawn the receiver thread and return immediately
    ///
    /// Fails with `InvalidState` unless the receiver is freshly created.
    pub fn start(&self) -> Result<()> {
        self.inner
            .state
            .transition(IngesterState::Created, IngesterState::Running)
            .map_err(|actual| VirtaError::InvalidState {
                expected: IngesterState::Created,
                actual,
            })?;

        let inner = Arc::clone(&self.inner);
        let spawned = thread::Builder::new()
            .name(format!("virta-{}", self.inner.target))
            .spawn(move || inner.supervise());

        match spawned {
            Ok(handle) => {
                *self.worker.lock() = Some(Worker {
                    thread: handle.thread().clone(),
                    handle: Some(handle),
                });
                info!(address = %self.inner.target, "Receiver started");
                Ok(())
            }
            Err(e) => {
                self.inner.state.mark_stopped();
                error!(address = %self.inner.target, error = %e, "Failed to spawn receiver thread");
                Err(VirtaError::Io(e))
            }
        }
    }

    /// Request a cooperative stop and return immediately
    ///
    /// The receiver thread exits at its next checkpoint; see the module docs
    /// for the latency bound.
    pub fn stop(&self) {
        let previous = self.inner.state.request_stop();
        if previous == IngesterState::Running {
            info!(address = %self.inner.target, "Receiver stop requested");
            if let Some(worker) = self.worker.lock().as_ref() {
                worker.thread.unpark();
            }
        }
    }

    /// Wait for the receiver thread to finish
    ///
    /// Returns false if the receiver was never started, was already joined,
    /// or its thread panicked.
    pub fn join(&self) -> bool {
        let handle = self
            .worker
            .lock()
            .as_mut()
            .and_then(|worker| worker.handle.take());
        match handle {
            Some(handle) => handle.join().is_ok(),
            None => false,
        }
    }

    pub fn state(&self) -> IngesterState {
        self.inner.state.load()
    }

    pub fn target(&self) -> &ConnectionTarget {
        &self.inner.target
    }

    pub fn storage_level(&self) -> StorageLevel {
        self.inner.storage_level
    }

    pub fn stats(&self) -> IngesterStats {
        self.inner.stats.snapshot()
    }
}

impl<D: Decoder> Receiver for SocketIngester<D> {
    fn name(&self) -> &'static str {
        self.inner.decoder.name()
    }

    fn on_start(&self) -> Result<()> {
        self.start()
    }

    fn on_stop(&self) {
        self.stop()
    }

    fn storage_level(&self) -> StorageLevel {
        self.inner.storage_level
    }

    fn state(&self) -> IngesterState {
        self.inner.state.load()
    }
}

impl<D: Decoder> Drop for SocketIngester<D> {
    fn drop(&mut self) {
        // The thread holds its own Arc; without a handle nobody could stop it.
        self.stop();
    }
}

struct Inner<D: Decoder> {
    target: ConnectionTarget,
    timeouts: Timeouts,
    storage_level: StorageLevel,
    decoder: D,
    connector: Arc<dyn Connector>,
    store: Arc<dyn Store<D::Record>>,
    policy: Arc<dyn RestartPolicy>,
    state: StateCell,
    stats: Stats,
}

impl<D: Decoder> Inner<D> {
    /// Body of the receiver thread
    fn supervise(&self) {
        while let Some(request) = self.receive_loop() {
            let Some(delay) = self.restart_delay(&request) else {
                break;
            };
            if !self.sleep_unless_stopped(delay) {
                break;
            }
        }

        self.state.mark_stopped();
        info!(address = %self.target, "Receiver stopped");
    }

    /// Hand a request to the policy; `None` ends the receiver
    ///
    /// A stop that lands after the receive loop returned still wins: the
    /// request is neither counted nor shown to the policy.
    fn restart_delay(&self, request: &RestartRequest) -> Option<Duration> {
        if self.state.is_stop_requested() {
            return None;
        }
        self.stats.restarts.fetch_add(1, Ordering::Relaxed);
        metrics::try_record_restart(request.kind.as_str());

        match self.policy.restart(request) {
            Restart::After(delay) => {
                info!(
                    address = %self.target,
                    reason = %request.reason,
                    delay_ms = delay.as_millis() as u64,
                    "Restarting receiver"
                );
                Some(delay)
            }
            Restart::Never => {
                error!(address = %self.target, reason = %request, "Restart policy gave up");
                None
            }
        }
    }

    /// One connect/decode/store pass
    ///
    /// Returns the restart request to hand to the policy, or `None` when a
    /// stop was observed. Never retries internally.
    fn receive_loop(&self) -> Option<RestartRequest> {
        if self.state.is_stop_requested() {
            debug!(address = %self.target, "Stop observed before connecting");
            return None;
        }

        info!(address = %self.target, "Connecting");
        let outcome = self.receive();

        if self.state.is_stop_requested() {
            if let Err(e) = &outcome {
                debug!(address = %self.target, error = %e, "Receive ended with error after stop");
            }
            info!(address = %self.target, "Stop observed, not restarting");
            return None;
        }

        match outcome {
            Ok(()) => {
                info!(address = %self.target, "Stream ended");
                Some(RestartRequest::end_of_stream(&self.target))
            }
            Err(e) => {
                if e.is_connection_refused() {
                    warn!(address = %self.target, error = %e, "Connection refused");
                } else {
                    warn!(address = %self.target, error = %e, "Error receiving data");
                }
                *self.stats.last_error.lock() = Some(e.to_string());
                Some(RestartRequest::failed(&self.target, e))
            }
        }
    }

    fn receive(&self) -> std::result::Result<(), IngestError> {
        let connection = self
            .connector
            .connect(&self.target, &self.timeouts)
            .map_err(|e| IngestError::from_connect(self.target.address(), e))?;
        let mut guard = ConnectionGuard::new(connection, &self.target);

        self.stats.connections.fetch_add(1, Ordering::Relaxed);
        let target = self.target.address();
        metrics::try_record_connection(&target);
        info!(address = %self.target, decoder = self.decoder.name(), "Connected");

        // Declared after the guard, so dropped before the connection closes.
        let mut records = self.decoder.decode(guard.reader());
        let mut delivered = 0u64;
        while !self.state.is_stop_requested() {
            let Some(record) = records.next() else {
                break;
            };
            self.store.store(record?);
            // Reset only once the peer has sent something.
            if delivered == 0 {
                self.policy.on_connected();
            }
            delivered += 1;
            self.stats.records_delivered.fetch_add(1, Ordering::Relaxed);
            metrics::try_record_received(&target, 1);
            trace!(address = %self.target, "Record stored");
        }

        Ok(())
    }

    /// Sleep up to `delay`; false if a stop arrived meanwhile
    fn sleep_unless_stopped(&self, delay: Duration) -> bool {
        let deadline = Instant::now() + delay;
        loop {
            if self.state.is_stop_requested() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::park_timeout(deadline - now);
        }
    }
}

/// Closes the connection exactly once, whichever way the loop exits
struct ConnectionGuard<'t> {
    connection: Box<dyn Connection>,
    target: &'t ConnectionTarget,
}

impl<'t> ConnectionGuard<'t> {
    fn new(connection: Box<dyn Connection>, target: &'t ConnectionTarget) -> Self {
        metrics::try_inc_active_connections();
        Self { connection, target }
    }

    fn reader(&mut self) -> &mut dyn Read {
        self.connection.reader()
    }
}

impl Drop for ConnectionGuard<'_> {
    fn drop(&mut self) {
        metrics::try_dec_active_connections();
        match self.connection.close() {
            Ok(()) => debug!(address = %self.target, "Connection closed"),
            Err(e) => debug!(address = %self.target, error = %e, "Error closing connection"),
        }
    }
}
