use std::time::Duration;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Result, ZmtpError};

/// More frames of the same message follow.
pub const FLAG_MORE: u8 = 0x01;
/// Size field is 8 bytes instead of 1.
pub const FLAG_LONG: u8 = 0x02;
/// Frame carries a command rather than message data.
pub const FLAG_COMMAND: u8 = 0x04;
const RESERVED_FLAGS: u8 = !(FLAG_MORE | FLAG_LONG | FLAG_COMMAND);

/// Header size for bodies up to 255 bytes: flags (1) + size (1).
pub const SHORT_HEADER_SIZE: usize = 2;
/// Header size for larger bodies: flags (1) + size (8, big-endian).
pub const LONG_HEADER_SIZE: usize = 9;

/// Default maximum frame body size: 64 MiB.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;

/// A single ZMTP frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZmtpFrame {
    /// More frames of the same message follow.
    pub more: bool,
    /// This is a command frame (handshake, subscription, heartbeat).
    pub command: bool,
    /// Frame body.
    pub body: Bytes,
}

impl ZmtpFrame {
    /// Create a message frame.
    pub fn message(body: impl Into<Bytes>, more: bool) -> Self {
        Self {
            more,
            command: false,
            body: body.into(),
        }
    }

    /// Create a command frame.
    pub fn command(body: impl Into<Bytes>) -> Self {
        Self {
            more: false,
            command: true,
            body: body.into(),
        }
    }

    /// The total wire size of this frame (header + body).
    pub fn wire_size(&self) -> usize {
        header_size(self.body.len()) + self.body.len()
    }
}

fn header_size(body_len: usize) -> usize {
    if body_len > u8::MAX as usize {
        LONG_HEADER_SIZE
    } else {
        SHORT_HEADER_SIZE
    }
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌────────────┬──────────────────────┬──────────────┐
/// │ Flags (1B) │ Size                 │ Body         │
/// │ MORE 0x01  │ 1B, or 8B BE if LONG │ (Size bytes) │
/// │ LONG 0x02  │                      │              │
/// │ CMD  0x04  │                      │              │
/// └────────────┴──────────────────────┴──────────────┘
/// ```
pub fn encode_frame(frame: &ZmtpFrame, dst: &mut BytesMut) {
    let len = frame.body.len();
    let mut flags = 0u8;
    if frame.more {
        flags |= FLAG_MORE;
    }
    if frame.command {
        flags |= FLAG_COMMAND;
    }

    dst.reserve(header_size(len) + len);
    if len > u8::MAX as usize {
        dst.put_u8(flags | FLAG_LONG);
        dst.put_u64(len as u64);
    } else {
        dst.put_u8(flags);
        dst.put_u8(len as u8);
    }
    dst.put_slice(&frame.body);
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut, max_frame_size: usize) -> Result<Option<ZmtpFrame>> {
    let Some(&flags) = src.first() else {
        return Ok(None);
    };

    if flags & RESERVED_FLAGS != 0 {
        return Err(ZmtpError::InvalidFlags(flags));
    }
    let more = flags & FLAG_MORE != 0;
    let command = flags & FLAG_COMMAND != 0;
    if command && more {
        return Err(ZmtpError::InvalidFlags(flags));
    }

    let (header_len, body_len) = if flags & FLAG_LONG != 0 {
        if src.len() < LONG_HEADER_SIZE {
            return Ok(None);
        }
        let mut size = [0u8; 8];
        size.copy_from_slice(&src[1..LONG_HEADER_SIZE]);
        (LONG_HEADER_SIZE, u64::from_be_bytes(size))
    } else {
        if src.len() < SHORT_HEADER_SIZE {
            return Ok(None);
        }
        (SHORT_HEADER_SIZE, u64::from(src[1]))
    };

    if body_len > max_frame_size as u64 {
        return Err(ZmtpError::FrameTooLarge {
            size: body_len,
            max: max_frame_size,
        });
    }
    let body_len = body_len as usize;

    if src.len() < header_len + body_len {
        return Ok(None);
    }

    src.advance(header_len);
    let body = src.split_to(body_len).freeze();

    Ok(Some(ZmtpFrame {
        more,
        command,
        body,
    }))
}

/// Configuration for ZMTP connections.
#[derive(Debug, Clone)]
pub struct ZmtpConfig {
    /// Maximum frame body size in bytes. Default: 64 MiB.
    pub max_frame_size: usize,
    /// Timeout for establishing the underlying connection.
    pub connect_timeout: Duration,
    /// Timeout for the greeting and READY exchange.
    pub handshake_timeout: Duration,
    /// Read timeout applied after the handshake.
    pub read_timeout: Option<Duration>,
    /// Write timeout applied after the handshake.
    pub write_timeout: Option<Duration>,
}

impl Default for ZmtpConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            connect_timeout: Duration::from_secs(5),
            handshake_timeout: Duration::from_secs(5),
            read_timeout: None,
            write_timeout: None,
        }
    }
}
