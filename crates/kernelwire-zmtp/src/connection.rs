use std::time::Duration;

use bytes::Bytes;
use kernelwire_transport::KernelStream;
use tracing::trace;

use crate::codec::{ZmtpConfig, ZmtpFrame};
use crate::error::Result;
use crate::handshake::{command_name, handshake, PeerInfo};
use crate::reader::FrameReader;
use crate::socket_type::SocketType;
use crate::writer::FrameWriter;

/// A handshaken ZMTP connection over a kernel stream.
///
/// Socket types build their send/receive patterns on top of this.
pub struct Connection {
    control: KernelStream,
    reader: FrameReader<KernelStream>,
    writer: FrameWriter<KernelStream>,
    local: SocketType,
    peer: PeerInfo,
    partial: Vec<Bytes>,
}

impl Connection {
    /// Run the ZMTP handshake on `stream` and apply the post-handshake
    /// timeouts from `config`.
    pub fn establish(
        stream: KernelStream,
        local: SocketType,
        as_server: bool,
        config: &ZmtpConfig,
    ) -> Result<Self> {
        let reader_stream = stream.try_clone()?;
        let writer_stream = stream.try_clone()?;
        stream.set_read_timeout(Some(config.handshake_timeout))?;
        stream.set_write_timeout(Some(config.handshake_timeout))?;

        let mut reader = FrameReader::with_config(reader_stream, config);
        let mut writer = FrameWriter::with_config(writer_stream, config);
        let peer = handshake(
            &mut reader,
            &mut writer,
            local,
            as_server,
            config.handshake_timeout,
        )?;

        stream.set_read_timeout(config.read_timeout)?;
        stream.set_write_timeout(config.write_timeout)?;

        Ok(Self {
            control: stream,
            reader,
            writer,
            local,
            peer,
            partial: Vec::new(),
        })
    }

    /// Send a multipart message.
    pub fn send_multipart(&mut self, parts: &[Bytes]) -> Result<()> {
        self.writer.send_multipart(parts)
    }

    /// Send a command frame.
    pub(crate) fn send_command(&mut self, body: Bytes) -> Result<()> {
        self.writer.write_frame(&ZmtpFrame::command(body))
    }

    /// Receive the next complete multipart message, skipping command frames.
    ///
    /// If the read times out mid-message, the frames received so far are
    /// kept and the next call continues the same message.
    pub fn recv_multipart(&mut self) -> Result<Vec<Bytes>> {
        loop {
            let frame = self.reader.read_frame()?;
            if frame.command {
                trace!(
                    command = %String::from_utf8_lossy(command_name(&frame.body).unwrap_or(b"?")),
                    "ignoring command frame"
                );
                continue;
            }
            let more = frame.more;
            self.partial.push(frame.body);
            if !more {
                return Ok(std::mem::take(&mut self.partial));
            }
        }
    }

    /// Receive a single frame, commands included.
    pub(crate) fn recv_frame(&mut self) -> Result<ZmtpFrame> {
        self.reader.read_frame()
    }

    /// Set the read timeout. `None` blocks indefinitely.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.control.set_read_timeout(timeout)?;
        Ok(())
    }

    /// Shut down both directions; blocked reads on any clone return.
    pub fn shutdown(&self) -> Result<()> {
        self.control.shutdown()?;
        Ok(())
    }

    pub fn local_type(&self) -> SocketType {
        self.local
    }

    /// What the remote side announced during the handshake.
    pub fn peer(&self) -> &PeerInfo {
        &self.peer
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("stream", &self.control)
            .field("local", &self.local)
            .field("peer", &self.peer.socket_type)
            .finish()
    }
}
