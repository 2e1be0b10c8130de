use std::path::PathBuf;

/// Errors returned by client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Endpoint or socket-level error.
    #[error("transport error: {0}")]
    Transport(#[from] kernelwire_transport::TransportError),

    /// Error on the command or broadcast connection.
    #[error("zmtp error: {0}")]
    Zmtp(#[from] kernelwire_zmtp::ZmtpError),

    /// Message encoding, framing or signature error.
    #[error("message error: {0}")]
    Message(#[from] kernelwire_message::MessageError),

    /// The connection file could not be read.
    #[error("failed to read connection file {path}: {source}")]
    ConnectionFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The connection file is not valid connection info.
    #[error("invalid connection info: {0}")]
    InvalidConnectionInfo(#[from] serde_json::Error),

    /// Only `hmac-sha256` signing is implemented.
    #[error("unsupported signature scheme '{0}'")]
    UnsupportedSignatureScheme(String),

    /// Only `tcp` and `ipc` transports are implemented.
    #[error("unsupported transport '{0}'")]
    UnsupportedTransport(String),

    /// The reply's parent is not the request just sent.
    #[error("reply to {found:?} does not answer request {expected}")]
    UnexpectedReply {
        expected: String,
        found: Option<String>,
    },

    /// A request id is already waiting for output.
    #[error("request {0} is already registered")]
    DuplicateRequest(String),

    /// The broadcast loop stopped on a fatal error; the client is unusable.
    #[error("client terminated: {0}")]
    Terminated(DrainError),

    /// The client has been closed.
    #[error("client is closed")]
    Closed,

    /// The broadcast thread could not be started.
    #[error("failed to spawn broadcast thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Problems found while draining the broadcast channel.
///
/// Reported through [`crate::ClientConfig::error_sink`]. Fatal ones also end
/// the client and are returned as [`ClientError::Terminated`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DrainError {
    /// A broadcast frame set failed to decode or verify.
    #[error("undecodable broadcast message: {0}")]
    Decode(String),

    /// The broadcast `msg_type` is not one this client interprets.
    #[error("unknown broadcast message type '{msg_type}'")]
    UnknownMessageType {
        msg_type: String,
        parent_id: Option<String>,
    },

    /// Content does not match its `msg_type`.
    #[error("invalid {msg_type} content: {reason}")]
    Content { msg_type: String, reason: String },

    /// Output arrived for one of our requests that has no open stream.
    #[error("{msg_type} for {parent_type} {parent_id} has no listener")]
    Orphaned {
        parent_id: String,
        parent_type: String,
        msg_type: String,
    },

    /// The broadcast connection failed.
    #[error("broadcast transport failed: {0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;
