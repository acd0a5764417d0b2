//! Outbound byte-stream connections
//!
//! [`Connector`] is the seam between the receive loop and the network. The
//! loop only needs something it can read from and close; production uses
//! [`TcpConnector`], tests plug in scripted connections.

use super::target::{ConnectionTarget, Timeouts};
use std::io::{self, Read};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use tracing::debug;

/// An open byte-stream connection owned by the receive loop
pub trait Connection: Send {
    /// Input side of the connection
    fn reader(&mut self) -> &mut dyn Read;

    /// Release the connection
    ///
    /// The receive loop calls this exactly once per opened connection.
    fn close(&mut self) -> io::Result<()>;
}

/// Opens connections to a target
pub trait Connector: Send + Sync + 'static {
    /// Open a connection, honouring the given timeouts
    ///
    /// Refusal must be reported with `io::ErrorKind::ConnectionRefused` so the
    /// loop can tell it apart from other failures.
    fn connect(
        &self,
        target: &ConnectionTarget,
        timeouts: &Timeouts,
    ) -> io::Result<Box<dyn Connection>>;
}

/// Plain TCP client connector
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    fn connect(
        &self,
        target: &ConnectionTarget,
        timeouts: &Timeouts,
    ) -> io::Result<Box<dyn Connection>> {
        let mut last_err = None;

        // Try every resolved address; "localhost" commonly yields ::1 and 127.0.0.1.
        for addr in (target.host.as_str(), target.port).to_socket_addrs()? {
            let attempt = match timeouts.connect {
                Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
                None => TcpStream::connect(addr),
            };
            match attempt {
                Ok(stream) => {
                    stream.set_read_timeout(timeouts.read)?;
                    debug!(%addr, "TCP connection established");
                    return Ok(Box::new(TcpConnection::new(stream)));
                }
                Err(e) => {
                    debug!(%addr, error = %e, "TCP connect attempt failed");
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("no addresses resolved for {target}"),
            )
        }))
    }
}

/// TCP stream wrapped as a [`Connection`]
pub struct TcpConnection {
    stream: TcpStream,
    closed: bool,
}

impl TcpConnection {
    pub fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            closed: false,
        }
    }
}

impl Connection for TcpConnection {
    fn reader(&mut self) -> &mut dyn Read {
        &mut self.stream
    }

    fn close(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        match self.stream.shutdown(Shutdown::Both) {
            // Peer already went away; nothing left to shut down.
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }
}
