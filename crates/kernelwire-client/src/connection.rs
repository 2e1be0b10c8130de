//! Kernel connection descriptor, as written to `kernel-*.json` files.

use std::fmt;
use std::path::Path;

use kernelwire_message::SigningKey;
use kernelwire_transport::Endpoint;
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};

/// The only signature scheme this client implements.
pub const HMAC_SHA256: &str = "hmac-sha256";

/// Ports and credentials needed to reach a running kernel.
///
/// Only the shell and iopub ports are used; the other channels are kept so
/// a descriptor can be read and written back unchanged.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    #[serde(default = "default_scheme")]
    pub signature_scheme: String,
    #[serde(default = "default_transport")]
    pub transport: String,
    pub ip: String,
    #[serde(default)]
    pub key: String,
    pub shell_port: u16,
    #[serde(default)]
    pub control_port: u16,
    pub iopub_port: u16,
    #[serde(default)]
    pub hb_port: u16,
    #[serde(default)]
    pub stdin_port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kernel_name: Option<String>,
}

fn default_scheme() -> String {
    HMAC_SHA256.to_string()
}

fn default_transport() -> String {
    "tcp".to_string()
}

impl ConnectionInfo {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ClientError::ConnectionFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn shell_endpoint(&self) -> Result<Endpoint> {
        self.endpoint(self.shell_port)
    }

    pub fn iopub_endpoint(&self) -> Result<Endpoint> {
        self.endpoint(self.iopub_port)
    }

    /// Signing key for the configured scheme.
    ///
    /// An empty key disables signing. An empty scheme is accepted only
    /// together with an empty key.
    pub fn signing_key(&self) -> Result<SigningKey> {
        match self.signature_scheme.as_str() {
            HMAC_SHA256 => Ok(SigningKey::new(self.key.as_bytes())),
            "" if self.key.is_empty() => Ok(SigningKey::unsigned()),
            other => Err(ClientError::UnsupportedSignatureScheme(other.to_string())),
        }
    }

    // ipc endpoints are files named `<ip>-<port>`.
    fn endpoint(&self, port: u16) -> Result<Endpoint> {
        match self.transport.as_str() {
            "tcp" => Ok(Endpoint::tcp(&self.ip, port)),
            "ipc" => Ok(Endpoint::ipc(format!("{}-{}", self.ip, port))),
            other => Err(ClientError::UnsupportedTransport(other.to_string())),
        }
    }
}

impl fmt::Debug for ConnectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionInfo")
            .field("signature_scheme", &self.signature_scheme)
            .field("transport", &self.transport)
            .field("ip", &self.ip)
            .field("key", &format_args!("<redacted:{} bytes>", self.key.len()))
            .field("shell_port", &self.shell_port)
            .field("control_port", &self.control_port)
            .field("iopub_port", &self.iopub_port)
            .field("hb_port", &self.hb_port)
            .field("stdin_port", &self.stdin_port)
            .field("kernel_name", &self.kernel_name)
            .finish()
    }
}
