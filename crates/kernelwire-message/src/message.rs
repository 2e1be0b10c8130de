//! Multipart wire format.
//!
//! ```text
//! [ident...] <IDS|MSG> signature header parent_header metadata content [buffer...]
//! ```
//!
//! The signature is `hex(HMAC-SHA256(key, header ‖ parent_header ‖ metadata ‖ content))`,
//! or empty when the key is empty. Buffers are not signed.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{MessageError, Result};
use crate::header::Header;
use crate::signing::SigningKey;

/// Frame separating routing identities from the message.
pub const DELIMITER: &[u8] = b"<IDS|MSG>";

const EMPTY_OBJECT: &[u8] = b"{}";

/// A message with typed content.
#[derive(Debug, Clone, PartialEq)]
pub struct Message<T> {
    pub header: Header,
    /// Header of the message that caused this one. `None` for requests.
    pub parent_header: Option<Header>,
    pub metadata: Map<String, Value>,
    pub content: T,
    /// Binary frames following the content.
    pub buffers: Vec<Bytes>,
}

impl<T> Message<T> {
    pub fn new(header: Header, content: T) -> Self {
        Self {
            header,
            parent_header: None,
            metadata: Map::new(),
            content,
            buffers: Vec::new(),
        }
    }

    pub fn with_parent(mut self, parent: Header) -> Self {
        self.parent_header = Some(parent);
        self
    }

    /// `msg_id` of the parent, if any.
    pub fn parent_id(&self) -> Option<&str> {
        self.parent_header.as_ref().map(|parent| parent.msg_id.as_str())
    }
}

impl<T: Serialize> Message<T> {
    /// Encode into `[signature, header, parent_header, metadata, content, buffers...]`.
    pub fn encode(&self, key: &SigningKey) -> Result<Vec<Bytes>> {
        let header = to_frame("header", &self.header)?;
        let parent = match &self.parent_header {
            Some(parent) => to_frame("parent_header", parent)?,
            None => Bytes::from_static(EMPTY_OBJECT),
        };
        let metadata = to_frame("metadata", &self.metadata)?;
        let content = to_frame("content", &self.content)?;

        let signature = key.sign(&[&header[..], &parent[..], &metadata[..], &content[..]])?;

        let mut frames = Vec::with_capacity(5 + self.buffers.len());
        frames.push(Bytes::from(signature));
        frames.extend([header, parent, metadata, content]);
        frames.extend(self.buffers.iter().cloned());
        Ok(frames)
    }

    /// Encode with the delimiter in front, ready for a command socket.
    pub fn to_frames(&self, key: &SigningKey) -> Result<Vec<Bytes>> {
        let mut frames = vec![Bytes::from_static(DELIMITER)];
        frames.extend(self.encode(key)?);
        Ok(frames)
    }
}

impl<T: DeserializeOwned> Message<T> {
    /// Decode and verify a frame set, then parse the content as `T`.
    pub fn decode(frames: &[Bytes], key: &SigningKey) -> Result<Self> {
        RawMessage::decode(frames, key)?.into_typed()
    }
}

fn to_frame<V: Serialize>(part: &'static str, value: &V) -> Result<Bytes> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(|source| MessageError::Encoding { part, source })
}

/// A verified message whose content is still raw JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMessage {
    /// Routing identities found before the delimiter.
    pub identities: Vec<Bytes>,
    pub header: Header,
    pub parent_header: Option<Header>,
    pub metadata: Map<String, Value>,
    pub content: Bytes,
    pub buffers: Vec<Bytes>,
}

impl RawMessage {
    /// Locate the delimiter, verify the signature and decode the envelope.
    ///
    /// Empty header, metadata and content frames decode to their zero
    /// values; an empty or `{}` parent header decodes to `None`.
    pub fn decode(frames: &[Bytes], key: &SigningKey) -> Result<Self> {
        let delimiter = frames
            .iter()
            .position(|frame| frame.as_ref() == DELIMITER)
            .ok_or(MessageError::DelimiterNotFound {
                frames: frames.len(),
            })?;

        let rest = &frames[delimiter + 1..];
        if rest.len() < 5 {
            return Err(MessageError::MissingFrames { found: rest.len() });
        }
        let (signature, header, parent, metadata, content) =
            (&rest[0], &rest[1], &rest[2], &rest[3], &rest[4]);

        key.verify(&[&header[..], &parent[..], &metadata[..], &content[..]], signature)
            .inspect_err(|err| debug!(error = %err, frames = frames.len(), "signature rejected"))?;

        let header: Header = from_frame("header", header)?;
        let parent: Header = from_frame("parent_header", parent)?;
        let metadata: Map<String, Value> = from_frame("metadata", metadata)?;

        Ok(Self {
            identities: frames[..delimiter].to_vec(),
            header,
            parent_header: (!parent.is_empty()).then_some(parent),
            metadata,
            content: content.clone(),
            buffers: rest[5..].to_vec(),
        })
    }

    pub fn msg_type(&self) -> &str {
        &self.header.msg_type
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.parent_header.as_ref().map(|parent| parent.msg_id.as_str())
    }

    /// Content as untyped JSON.
    pub fn content_value(&self) -> Result<Value> {
        self.parse_content()
    }

    /// Parse the content as `T`, keeping the envelope.
    pub fn into_typed<T: DeserializeOwned>(self) -> Result<Message<T>> {
        let content = self.parse_content()?;
        Ok(Message {
            header: self.header,
            parent_header: self.parent_header,
            metadata: self.metadata,
            content,
            buffers: self.buffers,
        })
    }

    fn parse_content<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(non_empty(&self.content)).map_err(|source| MessageError::Content {
            msg_type: self.header.msg_type.clone(),
            source,
        })
    }
}

fn from_frame<T: DeserializeOwned>(part: &'static str, frame: &[u8]) -> Result<T> {
    serde_json::from_slice(non_empty(frame)).map_err(|source| MessageError::Decoding { part, source })
}

fn non_empty(frame: &[u8]) -> &[u8] {
    if frame.is_empty() {
        EMPTY_OBJECT
    } else {
        frame
    }
}
