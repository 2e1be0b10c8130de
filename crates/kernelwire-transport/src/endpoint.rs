use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Result, TransportError};

/// A kernel socket address in ZeroMQ endpoint notation.
///
/// Jupyter connection files describe sockets as `transport` + `ip` + port;
/// `tcp` maps to `tcp://ip:port` and `ipc` maps to `ipc://ip-port`, where
/// `ip` is a filesystem path prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// TCP socket, `tcp://host:port`.
    Tcp { host: String, port: u16 },
    /// Unix domain socket, `ipc://path`.
    Ipc { path: PathBuf },
}

impl Endpoint {
    /// Build a TCP endpoint.
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::Tcp {
            host: host.into(),
            port,
        }
    }

    /// Build an ipc endpoint.
    pub fn ipc(path: impl AsRef<Path>) -> Self {
        Self::Ipc {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Parse `tcp://host:port` or `ipc://path`.
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = |reason| TransportError::InvalidEndpoint {
            endpoint: input.to_string(),
            reason,
        };

        let (scheme, rest) = input
            .split_once("://")
            .ok_or_else(|| invalid("missing '://' separator"))?;

        match scheme {
            "tcp" => {
                let (host, port) = rest
                    .rsplit_once(':')
                    .ok_or_else(|| invalid("missing port"))?;
                let host = host.trim_start_matches('[').trim_end_matches(']');
                if host.is_empty() {
                    return Err(invalid("missing host"));
                }
                let port = port.parse::<u16>().map_err(|_| invalid("invalid port"))?;
                Ok(Self::tcp(host, port))
            }
            "ipc" => {
                if rest.is_empty() {
                    return Err(invalid("missing path"));
                }
                Ok(Self::ipc(rest))
            }
            _ => Err(invalid("unknown scheme (expected tcp or ipc)")),
        }
    }

    /// Scheme name (`tcp` or `ipc`).
    pub fn scheme(&self) -> &'static str {
        match self {
            Self::Tcp { .. } => "tcp",
            Self::Ipc { .. } => "ipc",
        }
    }

    /// Host/port string suitable for `std::net` APIs.
    ///
    /// The ZeroMQ wildcard `*` binds on all interfaces.
    pub(crate) fn socket_addr_string(&self) -> Option<String> {
        match self {
            Self::Tcp { host, port } => {
                let host = if host == "*" { "0.0.0.0" } else { host.as_str() };
                if host.contains(':') {
                    Some(format!("[{host}]:{port}"))
                } else {
                    Some(format!("{host}:{port}"))
                }
            }
            Self::Ipc { .. } => None,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp { host, port } if host.contains(':') => write!(f, "tcp://[{host}]:{port}"),
            Self::Tcp { host, port } => write!(f, "tcp://{host}:{port}"),
            Self::Ipc { path } => write!(f, "ipc://{}", path.display()),
        }
    }
}

impl FromStr for Endpoint {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
