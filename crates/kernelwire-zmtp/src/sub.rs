use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use kernelwire_transport::{Endpoint, KernelStream};
use tracing::debug;

use crate::codec::ZmtpConfig;
use crate::connection::Connection;
use crate::error::Result;
use crate::socket_type::SocketType;

/// Subscription message prefix byte (`0x01` subscribe, `0x00` cancel).
pub(crate) const SUBSCRIBE: u8 = 0x01;
pub(crate) const UNSUBSCRIBE: u8 = 0x00;

/// Subscriber side of a publish/subscribe pair.
#[derive(Debug)]
pub struct SubSocket {
    conn: Connection,
    endpoint: Endpoint,
    read_timeout: Option<Duration>,
}

impl SubSocket {
    /// Connect to a PUB or XPUB peer and subscribe to every topic.
    pub fn connect(endpoint: &Endpoint, config: &ZmtpConfig) -> Result<Self> {
        let stream = KernelStream::connect(endpoint, Some(config.connect_timeout))?;
        let conn = Connection::establish(stream, SocketType::Sub, false, config)?;
        debug!(%endpoint, peer = %conn.peer().socket_type, "sub socket connected");

        let mut socket = Self {
            conn,
            endpoint: endpoint.clone(),
            read_timeout: config.read_timeout,
        };
        socket.subscribe(b"")?;
        Ok(socket)
    }

    /// Subscribe to messages whose first frame starts with `prefix`.
    pub fn subscribe(&mut self, prefix: &[u8]) -> Result<()> {
        self.conn
            .send_multipart(&[subscription_message(SUBSCRIBE, prefix)])
    }

    /// Cancel a previous subscription.
    pub fn unsubscribe(&mut self, prefix: &[u8]) -> Result<()> {
        self.conn
            .send_multipart(&[subscription_message(UNSUBSCRIBE, prefix)])
    }

    /// Receive the next message, blocking up to the current read timeout.
    pub fn recv(&mut self) -> Result<Vec<Bytes>> {
        self.conn.recv_multipart()
    }

    /// Receive the next message, waiting at most `timeout`.
    ///
    /// Returns `Ok(None)` when nothing complete arrived in time. Frames of a
    /// partially received message are kept for the next call.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Result<Option<Vec<Bytes>>> {
        if self.read_timeout != Some(timeout) {
            self.conn.set_read_timeout(Some(timeout))?;
            self.read_timeout = Some(timeout);
        }
        match self.conn.recv_multipart() {
            Ok(parts) => Ok(Some(parts)),
            Err(err) if err.is_timeout() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Shut down the connection. A blocked receive returns an error.
    pub fn close(&self) -> Result<()> {
        self.conn.shutdown()
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

fn subscription_message(kind: u8, prefix: &[u8]) -> Bytes {
    let mut body = BytesMut::with_capacity(prefix.len() + 1);
    body.put_u8(kind);
    body.put_slice(prefix);
    body.freeze()
}
