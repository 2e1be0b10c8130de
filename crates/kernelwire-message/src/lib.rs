//! Jupyter kernel message codec.
//!
//! A message travels as a multipart frame set:
//! routing identities, the `<IDS|MSG>` delimiter, an HMAC-SHA256 signature,
//! then four JSON frames (header, parent header, metadata, content) and
//! optional binary buffers.
//!
//! [`RawMessage::decode`] verifies and splits a frame set without looking at
//! the content; [`IoPubContent::parse`] and [`RawMessage::into_typed`]
//! interpret the content afterwards.

pub mod content;
pub mod error;
pub mod header;
pub mod message;
pub mod reply;
pub mod request;
pub mod signing;

pub use content::{
    ClearOutput, DisplayData, ErrorContent, ExecuteInput, ExecuteResult, ExecutionState,
    IoPubContent, Status, StreamContent,
};
pub use error::{MessageError, Result};
pub use header::{new_id, Header, PROTOCOL_VERSION};
pub use message::{Message, RawMessage, DELIMITER};
pub use reply::{
    CompleteReply, ExecuteReply, HistoryItem, HistoryReply, InspectReply, ReplyError, ReplyStatus,
};
pub use request::{
    CompleteRequest, ExecuteRequest, HistAccessType, HistoryRequest, InspectRequest, Request,
};
pub use signing::SigningKey;
