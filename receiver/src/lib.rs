//! VIRTA - Resilient socket receiver
//!
//! Connects to a remote `host:port`, decodes the byte stream into records and
//! hands each record to a storage layer, reconnecting whenever the stream ends
//! or fails, until it is told to stop.
//!
//! # Architecture
//!
//! ```text
//! host:port ──► Connection ──► Decoder ──► Store (RingBuffer, ...)
//!                    │
//!            exit / failure ──► RestartPolicy ──► fresh receive loop
//! ```
//!
//! Decoders, stores, connectors and restart policies are pluggable via traits.

#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]

pub mod buffer;
pub mod config;
pub mod decode;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod metrics_server;
pub mod storage;

pub use buffer::RingBuffer;
pub use config::Config;
pub use decode::{Decoder, LineDecoder, Lines};
pub use error::{DecodeError, IngestError, Result, VirtaError};
pub use ingest::{
    BackoffConfig, BackoffPolicy, ConnectionTarget, FixedDelay, IngesterState, Receiver,
    RestartPolicy, RestartRequest, SocketIngester, Timeouts,
};
pub use storage::{StorageLevel, Store};
