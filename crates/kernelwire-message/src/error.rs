/// Errors raised while encoding, decoding or interpreting kernel messages.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    /// A message part could not be serialized.
    #[error("failed to encode {part}: {source}")]
    Encoding {
        part: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// A message part is not valid JSON for its expected shape.
    #[error("failed to decode {part}: {source}")]
    Decoding {
        part: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The `<IDS|MSG>` delimiter is absent from the frame set.
    #[error("delimiter <IDS|MSG> not found in {frames} frames")]
    DelimiterNotFound { frames: usize },

    /// Fewer than signature + four JSON frames follow the delimiter.
    #[error("expected 5 frames after delimiter, found {found}")]
    MissingFrames { found: usize },

    /// The HMAC signature is missing, malformed or does not match.
    #[error("invalid message signature")]
    InvalidSignature,

    /// The signing key cannot be used with the configured HMAC.
    #[error("invalid signing key")]
    InvalidKey,

    /// The content does not match the shape its `msg_type` requires.
    #[error("invalid {msg_type} content: {source}")]
    Content {
        msg_type: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, MessageError>;
