//! `tokio_util` codec for ZMTP frames (feature `async`).

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{decode_frame, encode_frame, ZmtpFrame, DEFAULT_MAX_FRAME_SIZE};
use crate::error::ZmtpError;

/// Frame codec for use with `tokio_util::codec::Framed`.
///
/// Only handles frames; the greeting must be exchanged before wrapping the
/// stream.
#[derive(Debug, Clone)]
pub struct ZmtpCodec {
    max_frame_size: usize,
}

impl ZmtpCodec {
    pub fn new(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }
}

impl Default for ZmtpCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_SIZE)
    }
}

impl Decoder for ZmtpCodec {
    type Item = ZmtpFrame;
    type Error = ZmtpError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        decode_frame(src, self.max_frame_size)
    }
}

impl Encoder<ZmtpFrame> for ZmtpCodec {
    type Error = ZmtpError;

    fn encode(&mut self, item: ZmtpFrame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.body.len() > self.max_frame_size {
            return Err(ZmtpError::FrameTooLarge {
                size: item.body.len() as u64,
                max: self.max_frame_size,
            });
        }
        encode_frame(&item, dst);
        Ok(())
    }
}
