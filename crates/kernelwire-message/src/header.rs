use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Messaging protocol version sent in every header.
pub const PROTOCOL_VERSION: &str = "5.3";

/// Message header. `msg_id` is the correlation key.
///
/// Every field defaults to empty so partial headers from lenient kernels
/// still decode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Header {
    pub msg_id: String,
    pub username: String,
    pub session: String,
    pub date: String,
    pub msg_type: String,
    pub version: String,
}

impl Header {
    /// A fresh header with a random message id and the current UTC time.
    pub fn new(
        msg_type: impl Into<String>,
        session: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            msg_id: new_id(),
            username: username.into(),
            session: session.into(),
            date: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            msg_type: msg_type.into(),
            version: PROTOCOL_VERSION.to_string(),
        }
    }

    /// True for the empty header used as "no parent".
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A random UUID v4 in hyphenated form, used for message and session ids.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}
