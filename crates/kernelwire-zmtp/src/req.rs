use std::time::Duration;

use bytes::Bytes;
use kernelwire_transport::{Endpoint, KernelStream};
use tracing::debug;

use crate::codec::ZmtpConfig;
use crate::connection::Connection;
use crate::error::{Result, ZmtpError};
use crate::socket_type::SocketType;

/// Client side of a request/reply pair.
///
/// Sends and receives must strictly alternate. Each request is prefixed with
/// the empty delimiter frame a ROUTER or REP peer expects, and the delimiter
/// is stripped from replies.
#[derive(Debug)]
pub struct ReqSocket {
    conn: Connection,
    endpoint: Endpoint,
    awaiting_reply: bool,
}

impl ReqSocket {
    /// Connect and handshake with a REP or ROUTER peer.
    pub fn connect(endpoint: &Endpoint, config: &ZmtpConfig) -> Result<Self> {
        let stream = KernelStream::connect(endpoint, Some(config.connect_timeout))?;
        let conn = Connection::establish(stream, SocketType::Req, false, config)?;
        debug!(%endpoint, peer = %conn.peer().socket_type, "req socket connected");
        Ok(Self::from_connection(conn, endpoint.clone()))
    }

    pub(crate) fn from_connection(conn: Connection, endpoint: Endpoint) -> Self {
        Self {
            conn,
            endpoint,
            awaiting_reply: false,
        }
    }

    /// Send a request. Fails if the previous reply has not been received.
    pub fn send(&mut self, parts: &[Bytes]) -> Result<()> {
        if self.awaiting_reply {
            return Err(ZmtpError::InvalidState(
                "request already sent, receive the reply first",
            ));
        }
        let mut framed = Vec::with_capacity(parts.len() + 1);
        framed.push(Bytes::new());
        framed.extend_from_slice(parts);
        self.conn.send_multipart(&framed)?;
        self.awaiting_reply = true;
        Ok(())
    }

    /// Receive the reply to the last request.
    ///
    /// A timeout leaves the socket waiting for the same reply.
    pub fn recv(&mut self) -> Result<Vec<Bytes>> {
        if !self.awaiting_reply {
            return Err(ZmtpError::InvalidState("no request outstanding"));
        }
        let mut parts = match self.conn.recv_multipart() {
            Ok(parts) => parts,
            Err(err) => {
                if !err.is_timeout() {
                    self.awaiting_reply = false;
                }
                return Err(err);
            }
        };
        self.awaiting_reply = false;

        match parts.first() {
            Some(first) if first.is_empty() => {
                parts.remove(0);
                Ok(parts)
            }
            _ => Err(ZmtpError::MissingEnvelope),
        }
    }

    /// Set the reply timeout. `None` waits indefinitely.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.conn.set_read_timeout(timeout)
    }

    /// Shut down the connection. Safe to call more than once.
    pub fn close(&self) -> Result<()> {
        self.conn.shutdown()
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}
