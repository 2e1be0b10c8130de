//! Shell requests and the reply each one expects.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::reply::{CompleteReply, ExecuteReply, HistoryReply, InspectReply};

/// A shell request bound to its wire types.
pub trait Request: Serialize {
    /// `msg_type` of the request header.
    const MSG_TYPE: &'static str;
    /// `msg_type` the kernel answers with.
    const REPLY_TYPE: &'static str;
    /// Reply content.
    type Reply: DeserializeOwned;
    /// The kernel broadcasts output parented to this request.
    const WANTS_OUTPUT: bool = false;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteRequest {
    pub code: String,
    /// Run without broadcasting output or storing history.
    pub silent: bool,
    pub store_history: bool,
    /// Expressions evaluated after execution, by name.
    pub user_expressions: BTreeMap<String, String>,
    pub allow_stdin: bool,
    /// Abort queued executions if this one raises.
    pub stop_on_error: bool,
}

impl ExecuteRequest {
    /// Execute `code` the way an interactive frontend would, without stdin.
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            silent: false,
            store_history: true,
            user_expressions: BTreeMap::new(),
            allow_stdin: false,
            stop_on_error: true,
        }
    }
}

impl Request for ExecuteRequest {
    const MSG_TYPE: &'static str = "execute_request";
    const REPLY_TYPE: &'static str = "execute_reply";
    type Reply = ExecuteReply;
    const WANTS_OUTPUT: bool = true;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectRequest {
    pub code: String,
    /// Cursor offset in unicode characters.
    pub cursor_pos: usize,
    /// 0 is `x?`, 1 is `x??` in IPython terms.
    pub detail_level: u8,
}

impl InspectRequest {
    pub fn new(code: impl Into<String>, cursor_pos: usize) -> Self {
        Self {
            code: code.into(),
            cursor_pos,
            detail_level: 0,
        }
    }
}

impl Request for InspectRequest {
    const MSG_TYPE: &'static str = "inspect_request";
    const REPLY_TYPE: &'static str = "inspect_reply";
    type Reply = InspectReply;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteRequest {
    pub code: String,
    pub cursor_pos: usize,
}

impl CompleteRequest {
    pub fn new(code: impl Into<String>, cursor_pos: usize) -> Self {
        Self {
            code: code.into(),
            cursor_pos,
        }
    }
}

impl Request for CompleteRequest {
    const MSG_TYPE: &'static str = "complete_request";
    const REPLY_TYPE: &'static str = "complete_reply";
    type Reply = CompleteReply;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistAccessType {
    Range,
    Tail,
    Search,
}

/// Query the kernel's input history.
///
/// Which optional fields matter depends on `hist_access_type`: `range`
/// reads `session`/`start`/`stop`, `tail` reads `n`, `search` reads
/// `n`/`pattern`/`unique`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRequest {
    /// Include output next to each input.
    pub output: bool,
    /// Raw input rather than transformed input.
    pub raw: bool,
    pub hist_access_type: HistAccessType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique: Option<bool>,
}

impl HistoryRequest {
    fn base(hist_access_type: HistAccessType) -> Self {
        Self {
            output: false,
            raw: true,
            hist_access_type,
            session: None,
            start: None,
            stop: None,
            n: None,
            pattern: None,
            unique: None,
        }
    }

    /// The last `n` cells.
    pub fn tail(n: u64) -> Self {
        Self {
            n: Some(n),
            ..Self::base(HistAccessType::Tail)
        }
    }

    /// Cells `start..stop` of `session` (negative sessions count back from the current one).
    pub fn range(session: i64, start: i64, stop: i64) -> Self {
        Self {
            session: Some(session),
            start: Some(start),
            stop: Some(stop),
            ..Self::base(HistAccessType::Range)
        }
    }

    /// The last `n` cells matching a glob `pattern`.
    pub fn search(pattern: impl Into<String>, n: u64, unique: bool) -> Self {
        Self {
            n: Some(n),
            pattern: Some(pattern.into()),
            unique: Some(unique),
            ..Self::base(HistAccessType::Search)
        }
    }

    pub fn with_output(mut self, output: bool) -> Self {
        self.output = output;
        self
    }
}

impl Request for HistoryRequest {
    const MSG_TYPE: &'static str = "history_request";
    const REPLY_TYPE: &'static str = "history_reply";
    type Reply = HistoryReply;
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn execute_defaults_match_interactive_frontend() {
        let value = serde_json::to_value(ExecuteRequest::new("2+2")).unwrap();
        assert_eq!(
            value,
            json!({
                "code": "2+2",
                "silent": false,
                "store_history": true,
                "user_expressions": {},
                "allow_stdin": false,
                "stop_on_error": true,
            })
        );
    }

    #[test]
    fn history_tail_omits_unused_fields() {
        let value = serde_json::to_value(HistoryRequest::tail(10)).unwrap();
        assert_eq!(
            value,
            json!({"output": false, "raw": true, "hist_access_type": "tail", "n": 10})
        );
    }

    #[test]
    fn history_range_and_search() {
        let range = serde_json::to_value(HistoryRequest::range(-1, 1, 5)).unwrap();
        assert_eq!(range["hist_access_type"], "range");
        assert_eq!(range["session"], -1);
        assert!(range.get("n").is_none());

        let search = serde_json::to_value(HistoryRequest::search("import *", 3, true)).unwrap();
        assert_eq!(search["pattern"], "import *");
        assert_eq!(search["unique"], true);
    }

    #[test]
    fn msg_types() {
        assert_eq!(ExecuteRequest::MSG_TYPE, "execute_request");
        assert_eq!(InspectRequest::REPLY_TYPE, "inspect_reply");
        assert_eq!(CompleteRequest::MSG_TYPE, "complete_request");
        assert_eq!(HistoryRequest::REPLY_TYPE, "history_reply");
        assert!(ExecuteRequest::WANTS_OUTPUT);
        assert!(!InspectRequest::WANTS_OUTPUT);
    }
}
