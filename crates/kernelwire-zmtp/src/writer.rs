use std::io::{ErrorKind, Write};

use bytes::{Bytes, BytesMut};

use crate::codec::{encode_frame, ZmtpConfig, ZmtpFrame};
use crate::error::{Result, ZmtpError};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes ZMTP frames to any `Write` stream.
///
/// Multipart messages are encoded into one buffer and written with a single
/// pass, so a message is never interleaved with another writer's frames.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    max_frame_size: usize,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, &ZmtpConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: &ZmtpConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            max_frame_size: config.max_frame_size,
        }
    }

    /// Write a single frame.
    pub fn write_frame(&mut self, frame: &ZmtpFrame) -> Result<()> {
        self.check_size(frame.body.len())?;
        self.buf.clear();
        encode_frame(frame, &mut self.buf);
        self.write_buffered()
    }

    /// Write a multipart message. Every part but the last carries MORE.
    pub fn send_multipart(&mut self, parts: &[Bytes]) -> Result<()> {
        if parts.is_empty() {
            return Err(ZmtpError::InvalidState("cannot send an empty message"));
        }
        for part in parts {
            self.check_size(part.len())?;
        }

        self.buf.clear();
        let last = parts.len() - 1;
        for (idx, part) in parts.iter().enumerate() {
            encode_frame(&ZmtpFrame::message(part.clone(), idx < last), &mut self.buf);
        }
        self.write_buffered()
    }

    /// Write unframed bytes (the greeting).
    pub fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.buf.clear();
        self.buf.extend_from_slice(bytes);
        self.write_buffered()
    }

    fn check_size(&self, len: usize) -> Result<()> {
        if len > self.max_frame_size {
            return Err(ZmtpError::FrameTooLarge {
                size: len as u64,
                max: self.max_frame_size,
            });
        }
        Ok(())
    }

    fn write_buffered(&mut self) -> Result<()> {
        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(ZmtpError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(ZmtpError::Io(err)),
            }
        }
        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(ZmtpError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::codec::{decode_frame, FLAG_MORE};

    fn written(writer: FrameWriter<Cursor<Vec<u8>>>) -> BytesMut {
        BytesMut::from(writer.into_inner().into_inner().as_slice())
    }

    #[test]
    fn multipart_sets_more_on_all_but_last() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        writer
            .send_multipart(&[
                Bytes::from_static(b"a"),
                Bytes::from_static(b"b"),
                Bytes::from_static(b"c"),
            ])
            .unwrap();

        let mut wire = written(writer);
        let mut flags = Vec::new();
        while let Some(frame) = decode_frame(&mut wire, usize::MAX).unwrap() {
            flags.push((frame.more, frame.body));
        }
        assert_eq!(
            flags,
            vec![
                (true, Bytes::from_static(b"a")),
                (true, Bytes::from_static(b"b")),
                (false, Bytes::from_static(b"c")),
            ]
        );
    }

    #[test]
    fn empty_parts_are_encoded() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        writer
            .send_multipart(&[Bytes::new(), Bytes::from_static(b"x")])
            .unwrap();
        let wire = written(writer);
        assert_eq!(wire.as_ref(), &[FLAG_MORE, 0, 0, 1, b'x']);
    }

    #[test]
    fn empty_message_rejected() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        assert!(matches!(
            writer.send_multipart(&[]),
            Err(ZmtpError::InvalidState(_))
        ));
    }

    #[test]
    fn oversized_part_rejected_before_writing() {
        let config = ZmtpConfig {
            max_frame_size: 4,
            ..ZmtpConfig::default()
        };
        let mut writer = FrameWriter::with_config(Cursor::new(Vec::<u8>::new()), &config);
        let err = writer
            .send_multipart(&[Bytes::from_static(b"ok"), Bytes::from_static(b"oversized")])
            .unwrap_err();
        assert!(matches!(err, ZmtpError::FrameTooLarge { size: 9, max: 4 }));
        assert!(written(writer).is_empty());
    }

    #[test]
    fn raw_bytes_written_verbatim() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.write_raw(&[0xFF, 0, 0x7F]).unwrap();
        assert_eq!(written(writer).as_ref(), &[0xFF, 0, 0x7F]);
    }

    #[test]
    fn flush_propagates() {
        let sink = FlushTrackingWriter::default();
        let flag = Arc::clone(&sink.flushed);
        let mut writer = FrameWriter::new(sink);
        writer
            .write_frame(&ZmtpFrame::command(Bytes::from_static(b"\x05READY")))
            .unwrap();
        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn zero_write_is_connection_closed() {
        let mut writer = FrameWriter::new(ZeroWriter);
        assert!(matches!(
            writer.write_raw(b"x"),
            Err(ZmtpError::ConnectionClosed)
        ));
    }

    #[test]
    fn write_timeout_surfaces_as_timeout() {
        let mut writer = FrameWriter::new(BlockedWriter);
        let err = writer.write_raw(b"x").unwrap_err();
        assert!(err.is_timeout());
    }

    #[derive(Default)]
    struct FlushTrackingWriter {
        flushed: Arc<AtomicBool>,
    }

    impl Write for FlushTrackingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct BlockedWriter;

    impl Write for BlockedWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::WouldBlock))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
