//! Broadcast (IOPub) content, dispatched on `msg_type`.

use bytes::Bytes;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{MessageError, Result};

/// `stream`: text written to stdout or stderr.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamContent {
    /// `stdout` or `stderr`.
    pub name: String,
    pub text: String,
}

/// `display_data` and `update_display_data`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayData {
    /// MIME type to representation.
    pub data: Map<String, Value>,
    pub metadata: Map<String, Value>,
    /// Session-only data such as `display_id`.
    pub transient: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClearOutput {
    /// Clear only once new output arrives.
    pub wait: bool,
}

/// `execute_input`: the code being run, re-broadcast to all frontends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteInput {
    pub code: String,
    pub execution_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecuteResult {
    pub execution_count: u64,
    pub data: Map<String, Value>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// `error`: an exception raised while executing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorContent {
    pub ename: String,
    pub evalue: String,
    #[serde(default)]
    pub traceback: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionState {
    Busy,
    Idle,
    Starting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub execution_state: ExecutionState,
}

/// Content of a broadcast message.
#[derive(Debug, Clone, PartialEq)]
pub enum IoPubContent {
    Stream(StreamContent),
    DisplayData(DisplayData),
    UpdateDisplayData(DisplayData),
    ClearOutput(ClearOutput),
    ExecuteInput(ExecuteInput),
    ExecuteResult(ExecuteResult),
    Error(ErrorContent),
    Status(Status),
    /// A `msg_type` this crate does not interpret.
    Unknown { msg_type: String, raw: Bytes },
}

impl IoPubContent {
    /// Interpret `content` according to `msg_type`.
    ///
    /// Unknown types are returned as [`IoPubContent::Unknown`]; content that
    /// does not fit a known type fails with [`MessageError::Content`].
    pub fn parse(msg_type: &str, content: &[u8]) -> Result<Self> {
        let content: &[u8] = if content.is_empty() { b"{}" } else { content };
        let parsed = match msg_type {
            "stream" => serde_json::from_slice(content).map(Self::Stream),
            "display_data" => serde_json::from_slice(content).map(Self::DisplayData),
            "update_display_data" => serde_json::from_slice(content).map(Self::UpdateDisplayData),
            "clear_output" => serde_json::from_slice(content).map(Self::ClearOutput),
            "execute_input" => serde_json::from_slice(content).map(Self::ExecuteInput),
            "execute_result" => serde_json::from_slice(content).map(Self::ExecuteResult),
            "error" => serde_json::from_slice(content).map(Self::Error),
            "status" => serde_json::from_slice(content).map(Self::Status),
            _ => {
                return Ok(Self::Unknown {
                    msg_type: msg_type.to_string(),
                    raw: Bytes::copy_from_slice(content),
                })
            }
        };
        parsed.map_err(|source| MessageError::Content {
            msg_type: msg_type.to_string(),
            source,
        })
    }

    pub fn msg_type(&self) -> &str {
        match self {
            Self::Stream(_) => "stream",
            Self::DisplayData(_) => "display_data",
            Self::UpdateDisplayData(_) => "update_display_data",
            Self::ClearOutput(_) => "clear_output",
            Self::ExecuteInput(_) => "execute_input",
            Self::ExecuteResult(_) => "execute_result",
            Self::Error(_) => "error",
            Self::Status(_) => "status",
            Self::Unknown { msg_type, .. } => msg_type,
        }
    }

    /// The kernel reported it went idle: the terminal signal for the parent request.
    pub fn is_idle(&self) -> bool {
        matches!(
            self,
            Self::Status(Status {
                execution_state: ExecutionState::Idle
            })
        )
    }

    pub fn is_status(&self) -> bool {
        matches!(self, Self::Status(_))
    }

    /// Content as JSON. Unknown content that is not JSON becomes a string.
    pub fn to_value(&self) -> Value {
        let value = match self {
            Self::Stream(c) => serde_json::to_value(c),
            Self::DisplayData(c) | Self::UpdateDisplayData(c) => serde_json::to_value(c),
            Self::ClearOutput(c) => serde_json::to_value(c),
            Self::ExecuteInput(c) => serde_json::to_value(c),
            Self::ExecuteResult(c) => serde_json::to_value(c),
            Self::Error(c) => serde_json::to_value(c),
            Self::Status(c) => serde_json::to_value(c),
            Self::Unknown { raw, .. } => {
                return serde_json::from_slice(raw)
                    .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(raw).into_owned()))
            }
        };
        value.unwrap_or(Value::Null)
    }
}

impl Serialize for IoPubContent {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("msg_type", self.msg_type())?;
        map.serialize_entry("content", &self.to_value())?;
        map.end()
    }
}
