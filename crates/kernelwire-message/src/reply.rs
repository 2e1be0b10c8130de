//! Shell reply content.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    #[default]
    Ok,
    Error,
    /// Deprecated since protocol 5.1 in favour of `error`.
    Abort,
}

impl ReplyStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Error => "error",
            Self::Abort => "abort",
        }
    }
}

/// Exception details of a failed request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplyError {
    pub ename: String,
    pub evalue: String,
    pub traceback: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecuteReply {
    pub status: ReplyStatus,
    /// Kernel execution counter, used for prompt numbers.
    pub execution_count: u64,
    /// Deprecated payload dictionaries.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub payload: Vec<Value>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub user_expressions: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evalue: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub traceback: Vec<String>,
}

impl ExecuteReply {
    pub fn is_ok(&self) -> bool {
        self.status == ReplyStatus::Ok
    }

    /// The exception carried by an `error` reply.
    pub fn error(&self) -> Option<ReplyError> {
        if self.status != ReplyStatus::Error {
            return None;
        }
        Some(ReplyError {
            ename: self.ename.clone().unwrap_or_default(),
            evalue: self.evalue.clone().unwrap_or_default(),
            traceback: self.traceback.clone(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectReply {
    pub status: ReplyStatus,
    pub found: bool,
    /// MIME bundle describing the object.
    pub data: Map<String, Value>,
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompleteReply {
    pub status: ReplyStatus,
    pub matches: Vec<String>,
    /// Range of the request code the matches replace.
    pub cursor_start: usize,
    pub cursor_end: usize,
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryReply {
    pub status: ReplyStatus,
    pub history: Vec<HistoryItem>,
}

/// One history entry.
///
/// On the wire this is `[session, line, input]`, or
/// `[session, line, [input, output]]` when output was requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryItem {
    pub session: i64,
    pub line_number: i64,
    pub input: String,
    pub output: Option<String>,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum HistoryTuple {
    WithOutput(i64, i64, (String, Option<String>)),
    Plain(i64, i64, String),
}

impl Serialize for HistoryItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let tuple = match &self.output {
            Some(output) => HistoryTuple::WithOutput(
                self.session,
                self.line_number,
                (self.input.clone(), Some(output.clone())),
            ),
            None => HistoryTuple::Plain(self.session, self.line_number, self.input.clone()),
        };
        tuple.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for HistoryItem {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match HistoryTuple::deserialize(deserializer)? {
            HistoryTuple::WithOutput(session, line_number, (input, output)) => Self {
                session,
                line_number,
                input,
                output,
            },
            HistoryTuple::Plain(session, line_number, input) => Self {
                session,
                line_number,
                input,
                output: None,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn execute_reply_ok() {
        let reply: ExecuteReply =
            serde_json::from_value(json!({"status": "ok", "execution_count": 1})).unwrap();
        assert!(reply.is_ok());
        assert_eq!(reply.execution_count, 1);
        assert_eq!(
            serde_json::to_value(&reply).unwrap(),
            json!({"status": "ok", "execution_count": 1})
        );
    }

    #[test]
    fn execute_reply_error_fields() {
        let reply: ExecuteReply = serde_json::from_value(json!({
            "status": "error",
            "execution_count": 2,
            "ename": "ZeroDivisionError",
            "evalue": "division by zero",
            "traceback": ["line 1"],
        }))
        .unwrap();
        assert_eq!(reply.status, ReplyStatus::Error);
        let error = reply.error().expect("error fields should be captured");
        assert_eq!(error.ename, "ZeroDivisionError");
        assert_eq!(error.traceback, vec!["line 1".to_string()]);
    }

    #[test]
    fn ok_reply_has_no_error() {
        let reply: ExecuteReply = serde_json::from_value(json!({"status": "ok"})).unwrap();
        assert_eq!(reply.error(), None);
    }

    #[test]
    fn abort_status_parses() {
        let reply: InspectReply = serde_json::from_value(json!({"status": "abort"})).unwrap();
        assert_eq!(reply.status, ReplyStatus::Abort);
        assert!(!reply.found);
    }

    #[test]
    fn complete_reply_fields() {
        let reply: CompleteReply = serde_json::from_value(json!({
            "status": "ok",
            "matches": ["a.isalnum", "a.isalpha"],
            "cursor_start": 2,
            "cursor_end": 5,
            "metadata": {},
        }))
        .unwrap();
        assert_eq!(reply.matches.len(), 2);
        assert_eq!((reply.cursor_start, reply.cursor_end), (2, 5));
    }

    #[test]
    fn history_items_in_both_shapes() {
        let reply: HistoryReply = serde_json::from_value(json!({
            "status": "ok",
            "history": [[1, 1, "x = 1"], [1, 2, ["x + 1", "2"]], [1, 3, ["print(x)", null]]],
        }))
        .unwrap();
        assert_eq!(
            reply.history,
            vec![
                HistoryItem {
                    session: 1,
                    line_number: 1,
                    input: "x = 1".to_string(),
                    output: None,
                },
                HistoryItem {
                    session: 1,
                    line_number: 2,
                    input: "x + 1".to_string(),
                    output: Some("2".to_string()),
                },
                HistoryItem {
                    session: 1,
                    line_number: 3,
                    input: "print(x)".to_string(),
                    output: None,
                },
            ]
        );
    }

    #[test]
    fn history_item_serializes_as_array() {
        let item = HistoryItem {
            session: 4,
            line_number: 7,
            input: "2+2".to_string(),
            output: Some("4".to_string()),
        };
        assert_eq!(serde_json::to_value(&item).unwrap(), json!([4, 7, ["2+2", "4"]]));

        let plain = HistoryItem { output: None, ..item };
        assert_eq!(serde_json::to_value(&plain).unwrap(), json!([4, 7, "2+2"]));
    }

    #[test]
    fn malformed_history_item_rejected() {
        assert!(serde_json::from_value::<HistoryItem>(json!([1, 2])).is_err());
        assert!(serde_json::from_value::<HistoryItem>(json!({"session": 1})).is_err());
    }
}
