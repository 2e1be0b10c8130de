use std::time::Duration;

use crate::socket_type::SocketType;

/// Errors that can occur while framing, handshaking or exchanging ZMTP messages.
#[derive(Debug, thiserror::Error)]
pub enum ZmtpError {
    /// A frame header carries flag bits outside MORE/LONG/COMMAND, or a
    /// command frame claims a continuation.
    #[error("invalid frame flags 0x{0:02x}")]
    InvalidFlags(u8),

    /// The frame body exceeds the configured maximum size.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: u64, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("zmtp I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,

    /// The peer greeting is not a ZMTP greeting.
    #[error("invalid greeting: {0}")]
    InvalidGreeting(String),

    /// The peer speaks a ZMTP revision older than 3.0.
    #[error("unsupported ZMTP version {major}.{minor}")]
    UnsupportedVersion { major: u8, minor: u8 },

    /// The peer requested a security mechanism other than NULL.
    #[error("unsupported security mechanism '{0}'")]
    UnsupportedMechanism(String),

    /// The READY exchange failed.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// The peer socket type cannot talk to the local socket type.
    #[error("peer socket type '{peer}' is incompatible with local {local}")]
    IncompatibleSocketType { local: SocketType, peer: String },

    /// The peer rejected the connection with an ERROR command.
    #[error("peer reported error: {0}")]
    PeerRejected(String),

    /// The socket was used out of its send/receive pattern.
    #[error("invalid socket state: {0}")]
    InvalidState(&'static str),

    /// A routed message did not carry its empty delimiter frame.
    #[error("message is missing its envelope delimiter")]
    MissingEnvelope,

    /// The handshake did not complete in time.
    #[error("handshake timed out after {0:?}")]
    Timeout(Duration),

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] kernelwire_transport::TransportError),
}

impl ZmtpError {
    /// True when the error is a read/write timeout that left the stream usable.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Io(err) => matches!(
                err.kind(),
                std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
            ),
            Self::Timeout(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ZmtpError>;
