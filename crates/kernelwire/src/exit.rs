use std::fmt;
use std::io;

use kernelwire_client::ClientError;
use kernelwire_message::MessageError;
use kernelwire_transport::TransportError;
use kernelwire_zmtp::ZmtpError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::NotFound => TRANSPORT_ERROR,
        io::ErrorKind::InvalidData => DATA_INVALID,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => io_error(context, source),
        TransportError::InvalidEndpoint { .. } | TransportError::PathTooLong { .. } => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn zmtp_error(context: &str, err: ZmtpError) -> CliError {
    match err {
        ZmtpError::Io(source) => io_error(context, source),
        ZmtpError::Transport(err) => transport_error(context, err),
        ZmtpError::Timeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        ZmtpError::InvalidFlags(_) | ZmtpError::FrameTooLarge { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        ZmtpError::InvalidState(_) => CliError::new(INTERNAL, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn message_error(context: &str, err: MessageError) -> CliError {
    match err {
        MessageError::InvalidKey => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn client_error(context: &str, err: ClientError) -> CliError {
    match err {
        ClientError::Transport(err) => transport_error(context, err),
        ClientError::Zmtp(err) => zmtp_error(context, err),
        ClientError::Message(err) => message_error(context, err),
        ClientError::ConnectionFile { path, source } => {
            let context = format!("{context} {}", path.display());
            match source.kind() {
                io::ErrorKind::NotFound => CliError::new(USAGE, format!("{context}: {source}")),
                _ => io_error(&context, source),
            }
        }
        ClientError::InvalidConnectionInfo(_) | ClientError::UnexpectedReply { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        ClientError::UnsupportedSignatureScheme(_) | ClientError::UnsupportedTransport(_) => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        ClientError::Terminated(_) | ClientError::Closed => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refused_connection_is_transport_error() {
        let err = ClientError::Transport(TransportError::Connect {
            endpoint: "tcp://127.0.0.1:1".to_string(),
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        });
        assert_eq!(client_error("connect failed", err).code, TRANSPORT_ERROR);
    }

    #[test]
    fn bad_signature_is_invalid_data() {
        let err = ClientError::Message(MessageError::InvalidSignature);
        assert_eq!(client_error("execute failed", err).code, DATA_INVALID);
    }

    #[test]
    fn handshake_timeout_maps_to_timeout() {
        let err = ClientError::Zmtp(ZmtpError::Timeout(std::time::Duration::from_secs(1)));
        assert_eq!(client_error("connect failed", err).code, TIMEOUT);
    }

    #[test]
    fn missing_connection_file_is_usage() {
        let err = ClientError::ConnectionFile {
            path: "/nowhere/kernel.json".into(),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        let cli = client_error("cannot read connection file", err);
        assert_eq!(cli.code, USAGE);
        assert!(cli.message.contains("/nowhere/kernel.json"));
    }

    #[test]
    fn unsupported_scheme_is_usage() {
        let err = ClientError::UnsupportedSignatureScheme("hmac-md5".to_string());
        let cli = client_error("connection file", err);
        assert_eq!(cli.code, USAGE);
        assert!(cli.message.contains("hmac-md5"));
    }
}
