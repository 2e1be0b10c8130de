//! Channel seams between the client runtime and the wire.
//!
//! The runtime only needs a request/reply pair and a polled broadcast feed;
//! [`ReqSocket`] and [`SubSocket`] provide them over ZMTP.

use std::time::Duration;

use bytes::Bytes;
use kernelwire_zmtp::{ReqSocket, SubSocket, ZmtpError};

/// Single-flight request/reply channel (the shell socket).
pub trait CommandTransport: Send {
    /// Write one multipart message.
    fn send(&mut self, frames: Vec<Bytes>) -> Result<(), ZmtpError>;

    /// Block for the reply to the last `send`.
    fn recv(&mut self) -> Result<Vec<Bytes>, ZmtpError>;

    fn close(&mut self) -> Result<(), ZmtpError>;
}

/// Subscription feed (the iopub socket).
pub trait BroadcastTransport: Send {
    /// Next multipart message, or `None` if nothing arrived within `timeout`.
    fn recv_timeout(&mut self, timeout: Duration) -> Result<Option<Vec<Bytes>>, ZmtpError>;

    fn close(&mut self) -> Result<(), ZmtpError>;
}

impl CommandTransport for ReqSocket {
    fn send(&mut self, frames: Vec<Bytes>) -> Result<(), ZmtpError> {
        ReqSocket::send(self, &frames)
    }

    fn recv(&mut self) -> Result<Vec<Bytes>, ZmtpError> {
        ReqSocket::recv(self)
    }

    fn close(&mut self) -> Result<(), ZmtpError> {
        ReqSocket::close(self)
    }
}

impl BroadcastTransport for SubSocket {
    fn recv_timeout(&mut self, timeout: Duration) -> Result<Option<Vec<Bytes>>, ZmtpError> {
        SubSocket::recv_timeout(self, timeout)
    }

    fn close(&mut self) -> Result<(), ZmtpError> {
        SubSocket::close(self)
    }
}
