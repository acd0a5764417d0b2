//! Ingest system for VIRTA
//!
//! A receiver opens an outbound connection, decodes the byte stream into
//! records and hands each record to a [`Store`](crate::storage::Store).
//! Failures never escape the receiver thread; they become restart requests.
//!
//! # Architecture
//!
//! ```text
//! Connector ──► Connection ──► Decoder ──► Store
//!                   ▲
//!                   └── RestartPolicy ◄── RestartRequest
//! ```

pub mod connect;
pub mod receiver;
pub mod restart;
pub mod socket;
pub mod state;
pub mod target;

pub use connect::{Connection, Connector, TcpConnection, TcpConnector};
pub use receiver::Receiver;
pub use restart::{
    BackoffConfig, BackoffPolicy, FailureKind, FixedDelay, NeverRestart, Restart, RestartPolicy,
    RestartRequest,
};
pub use socket::{IngesterStats, SocketIngester, SocketIngesterBuilder};
pub use state::IngesterState;
pub use target::{ConnectionTarget, Timeouts};
