use std::io::{ErrorKind, Read};

use bytes::{Bytes, BytesMut};

use crate::codec::{decode_frame, ZmtpConfig, ZmtpFrame};
use crate::error::{Result, ZmtpError};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete ZMTP frames from any `Read` stream.
///
/// Handles partial reads internally; callers always get complete frames.
/// Bytes received before a read timeout stay buffered, so a timed-out call
/// can simply be retried.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    max_frame_size: usize,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, &ZmtpConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: &ZmtpConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            max_frame_size: config.max_frame_size,
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(ZmtpError::ConnectionClosed)` when EOF is reached.
    pub fn read_frame(&mut self) -> Result<ZmtpFrame> {
        loop {
            if let Some(frame) = decode_frame(&mut self.buf, self.max_frame_size)? {
                return Ok(frame);
            }
            self.fill()?;
        }
    }

    /// Read exactly `len` unframed bytes (the greeting).
    pub fn read_raw(&mut self, len: usize) -> Result<Bytes> {
        while self.buf.len() < len {
            self.fill()?;
        }
        Ok(self.buf.split_to(len).freeze())
    }

    fn fill(&mut self) -> Result<()> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            match self.inner.read(&mut chunk) {
                Ok(0) => return Err(ZmtpError::ConnectionClosed),
                Ok(n) => {
                    self.buf.extend_from_slice(&chunk[..n]);
                    return Ok(());
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(ZmtpError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Update maximum frame size for subsequent decoding.
    pub fn set_max_frame_size(&mut self, max_frame_size: usize) {
        self.max_frame_size = max_frame_size;
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::BufMut;

    use super::*;
    use crate::codec::{encode_frame, FLAG_LONG};

    fn wire(frames: &[ZmtpFrame]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for frame in frames {
            encode_frame(frame, &mut buf);
        }
        buf.to_vec()
    }

    #[test]
    fn read_multiple_frames() {
        let bytes = wire(&[
            ZmtpFrame::message(&b"one"[..], true),
            ZmtpFrame::message(&b"two"[..], false),
        ]);
        let mut reader = FrameReader::new(Cursor::new(bytes));

        let f1 = reader.read_frame().unwrap();
        let f2 = reader.read_frame().unwrap();
        assert_eq!((f1.more, f1.body.as_ref()), (true, b"one".as_ref()));
        assert_eq!((f2.more, f2.body.as_ref()), (false, b"two".as_ref()));
    }

    #[test]
    fn read_frame_with_large_body() {
        let body = vec![0xCD; 64 * 1024];
        let bytes = wire(&[ZmtpFrame::message(body.clone(), false)]);
        let mut reader = FrameReader::new(Cursor::new(bytes));
        assert_eq!(reader.read_frame().unwrap().body.as_ref(), body.as_slice());
    }

    #[test]
    fn partial_read_handling() {
        let bytes = wire(&[ZmtpFrame::message(&b"slow"[..], false)]);
        let mut reader = FrameReader::new(ByteByByteReader { bytes, pos: 0 });
        assert_eq!(reader.read_frame().unwrap().body.as_ref(), b"slow");
    }

    #[test]
    fn raw_bytes_then_frames_share_buffer() {
        let mut bytes = vec![0xFF; 10];
        bytes.extend(wire(&[ZmtpFrame::message(&b"after"[..], false)]));
        let mut reader = FrameReader::new(Cursor::new(bytes));

        assert_eq!(reader.read_raw(10).unwrap().as_ref(), &[0xFF; 10]);
        assert_eq!(reader.read_frame().unwrap().body.as_ref(), b"after");
    }

    #[test]
    fn connection_closed_cleanly() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        assert!(matches!(
            reader.read_frame(),
            Err(ZmtpError::ConnectionClosed)
        ));
    }

    #[test]
    fn connection_closed_mid_frame() {
        let mut partial = BytesMut::new();
        partial.put_u8(FLAG_LONG);
        partial.put_u64(16);
        partial.put_slice(b"only-part");
        let mut reader = FrameReader::new(Cursor::new(partial.to_vec()));
        assert!(matches!(
            reader.read_frame(),
            Err(ZmtpError::ConnectionClosed)
        ));
    }

    #[test]
    fn oversized_frame_in_stream() {
        let bytes = wire(&[ZmtpFrame::message(vec![0u8; 1024], false)]);
        let config = ZmtpConfig {
            max_frame_size: 16,
            ..ZmtpConfig::default()
        };
        let mut reader = FrameReader::with_config(Cursor::new(bytes), &config);
        assert!(matches!(
            reader.read_frame(),
            Err(ZmtpError::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn would_block_keeps_buffered_bytes() {
        let bytes = wire(&[ZmtpFrame::message(&b"resumed"[..], false)]);
        let mut reader = FrameReader::new(StallingReader {
            bytes,
            pos: 0,
            stall_at: 3,
            stalled: false,
        });

        let err = reader.read_frame().unwrap_err();
        assert!(err.is_timeout());

        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.body.as_ref(), b"resumed");
    }

    #[test]
    fn interrupted_read_retries() {
        let bytes = wire(&[ZmtpFrame::message(&b"ok"[..], false)]);
        let mut reader = FrameReader::new(InterruptedThenData {
            interrupted: false,
            inner: Cursor::new(bytes),
        });
        assert_eq!(reader.read_frame().unwrap().body.as_ref(), b"ok");
    }

    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    /// Delivers `stall_at` bytes, reports WouldBlock once, then the rest.
    struct StallingReader {
        bytes: Vec<u8>,
        pos: usize,
        stall_at: usize,
        stalled: bool,
    }

    impl Read for StallingReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos == self.stall_at && !self.stalled {
                self.stalled = true;
                return Err(std::io::Error::from(ErrorKind::WouldBlock));
            }
            let end = if self.stalled {
                self.bytes.len()
            } else {
                self.stall_at
            };
            let n = (end - self.pos).min(buf.len());
            buf[..n].copy_from_slice(&self.bytes[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    struct InterruptedThenData {
        interrupted: bool,
        inner: Cursor<Vec<u8>>,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.inner.read(buf)
        }
    }
}
