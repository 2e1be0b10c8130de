//! ZMTP 3.0 greeting and NULL-mechanism READY exchange.
//!
//! ```text
//! greeting (64 bytes):
//!   0xFF  8 x 0x00  0x7F  major  minor  mechanism[20]  as-server  filler[31]
//!
//! READY command body:
//!   0x05 "READY" { name-len(1) name value-len(4, BE) value }*
//! ```

use std::io::{Read, Write};
use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::debug;

use crate::codec::ZmtpFrame;
use crate::error::{Result, ZmtpError};
use crate::reader::FrameReader;
use crate::socket_type::SocketType;
use crate::writer::FrameWriter;

/// Size of the fixed greeting.
pub const GREETING_SIZE: usize = 64;
/// Protocol revision advertised in the greeting.
pub const VERSION_MAJOR: u8 = 3;
pub const VERSION_MINOR: u8 = 0;

const MECHANISM_NULL: &str = "NULL";
const MECHANISM_LEN: usize = 20;
const READY: &[u8] = b"READY";
const ERROR: &[u8] = b"ERROR";
const PROP_SOCKET_TYPE: &str = "Socket-Type";
const PROP_IDENTITY: &str = "Identity";
const MAX_IDENTITY_LEN: usize = 255;

/// Parsed peer greeting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Greeting {
    pub major: u8,
    pub minor: u8,
    pub mechanism: String,
    pub as_server: bool,
}

impl Greeting {
    /// Greeting for the NULL mechanism at ZMTP 3.0.
    pub fn null(as_server: bool) -> Self {
        Self {
            major: VERSION_MAJOR,
            minor: VERSION_MINOR,
            mechanism: MECHANISM_NULL.to_string(),
            as_server,
        }
    }

    pub fn encode(&self) -> [u8; GREETING_SIZE] {
        let mut out = [0u8; GREETING_SIZE];
        out[0] = 0xFF;
        out[9] = 0x7F;
        out[10] = self.major;
        out[11] = self.minor;
        let mech = self.mechanism.as_bytes();
        let len = mech.len().min(MECHANISM_LEN);
        out[12..12 + len].copy_from_slice(&mech[..len]);
        out[32] = u8::from(self.as_server);
        out
    }

    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < GREETING_SIZE {
            return Err(ZmtpError::InvalidGreeting(format!(
                "expected {GREETING_SIZE} bytes, got {}",
                bytes.len()
            )));
        }
        if bytes[0] != 0xFF || bytes[9] & 0x01 == 0 {
            return Err(ZmtpError::InvalidGreeting(
                "bad signature (peer is not a ZMTP 3 socket)".to_string(),
            ));
        }

        let major = bytes[10];
        let minor = bytes[11];
        if major < VERSION_MAJOR {
            return Err(ZmtpError::UnsupportedVersion { major, minor });
        }

        let mech = &bytes[12..12 + MECHANISM_LEN];
        let end = mech.iter().position(|b| *b == 0).unwrap_or(MECHANISM_LEN);
        let mechanism = String::from_utf8_lossy(&mech[..end]).into_owned();

        Ok(Self {
            major,
            minor,
            mechanism,
            as_server: bytes[32] & 0x01 != 0,
        })
    }
}

/// Properties carried by a READY command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyCommand {
    pub socket_type: String,
    pub identity: Option<Bytes>,
}

impl ReadyCommand {
    pub fn new(socket_type: SocketType, identity: Option<Bytes>) -> Self {
        Self {
            socket_type: socket_type.as_str().to_string(),
            identity,
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut body = BytesMut::new();
        put_command_name(&mut body, READY);
        put_property(&mut body, PROP_SOCKET_TYPE, self.socket_type.as_bytes());
        if let Some(identity) = &self.identity {
            put_property(&mut body, PROP_IDENTITY, identity);
        }
        body.freeze()
    }

    pub fn parse(body: &[u8]) -> Result<Self> {
        let mut rest = strip_command_name(body, READY)
            .ok_or_else(|| ZmtpError::Handshake("expected READY command".to_string()))?;

        let mut socket_type = None;
        let mut identity = None;
        while !rest.is_empty() {
            let name_len = rest[0] as usize;
            rest = &rest[1..];
            if rest.len() < name_len + 4 {
                return Err(ZmtpError::Handshake("truncated READY property".to_string()));
            }
            let name = &rest[..name_len];
            rest = &rest[name_len..];

            let mut len = [0u8; 4];
            len.copy_from_slice(&rest[..4]);
            let value_len = u32::from_be_bytes(len) as usize;
            rest = &rest[4..];
            if rest.len() < value_len {
                return Err(ZmtpError::Handshake("truncated READY value".to_string()));
            }
            let value = &rest[..value_len];
            rest = &rest[value_len..];

            // property names are case-insensitive
            if name.eq_ignore_ascii_case(PROP_SOCKET_TYPE.as_bytes()) {
                socket_type = Some(String::from_utf8_lossy(value).into_owned());
            } else if name.eq_ignore_ascii_case(PROP_IDENTITY.as_bytes()) {
                identity = Some(Bytes::copy_from_slice(value));
            }
        }

        let socket_type = socket_type
            .ok_or_else(|| ZmtpError::Handshake("READY without Socket-Type".to_string()))?;
        Ok(Self {
            socket_type,
            identity,
        })
    }
}

/// Encode an ERROR command body.
pub fn error_command(reason: &str) -> Bytes {
    let reason = &reason.as_bytes()[..reason.len().min(u8::MAX as usize)];
    let mut body = BytesMut::new();
    put_command_name(&mut body, ERROR);
    body.put_u8(reason.len() as u8);
    body.put_slice(reason);
    body.freeze()
}

/// Parse an ERROR command body, returning the reason.
pub fn parse_error_command(body: &[u8]) -> Option<String> {
    let rest = strip_command_name(body, ERROR)?;
    let (&len, reason) = rest.split_first()?;
    let reason = reason.get(..len as usize).unwrap_or(reason);
    Some(String::from_utf8_lossy(reason).into_owned())
}

/// Command name of a command frame body (`READY`, `SUBSCRIBE`, ...).
pub fn command_name(body: &[u8]) -> Option<&[u8]> {
    let (&len, rest) = body.split_first()?;
    rest.get(..len as usize)
}

fn put_command_name(dst: &mut BytesMut, name: &[u8]) {
    dst.put_u8(name.len() as u8);
    dst.put_slice(name);
}

fn strip_command_name<'a>(body: &'a [u8], name: &[u8]) -> Option<&'a [u8]> {
    if command_name(body)? != name {
        return None;
    }
    Some(&body[1 + name.len()..])
}

fn put_property(dst: &mut BytesMut, name: &str, value: &[u8]) {
    dst.put_u8(name.len() as u8);
    dst.put_slice(name.as_bytes());
    dst.put_u32(value.len() as u32);
    dst.put_slice(value);
}

/// What the remote side announced during the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerInfo {
    pub socket_type: SocketType,
    pub version: (u8, u8),
    pub identity: Option<Bytes>,
}

/// Run the greeting and READY exchange on a fresh connection.
///
/// Timeouts on the underlying stream surface as [`ZmtpError::Timeout`]
/// carrying `timeout`.
pub fn handshake<R: Read, W: Write>(
    reader: &mut FrameReader<R>,
    writer: &mut FrameWriter<W>,
    local: SocketType,
    as_server: bool,
    timeout: Duration,
) -> Result<PeerInfo> {
    run_handshake(reader, writer, local, as_server).map_err(|err| {
        if err.is_timeout() {
            ZmtpError::Timeout(timeout)
        } else {
            err
        }
    })
}

fn run_handshake<R: Read, W: Write>(
    reader: &mut FrameReader<R>,
    writer: &mut FrameWriter<W>,
    local: SocketType,
    as_server: bool,
) -> Result<PeerInfo> {
    writer.write_raw(&Greeting::null(as_server).encode())?;
    let greeting = Greeting::parse(&reader.read_raw(GREETING_SIZE)?)?;
    if greeting.mechanism != MECHANISM_NULL {
        let reason = format!("unsupported mechanism {}", greeting.mechanism);
        let _ = writer.write_frame(&ZmtpFrame::command(error_command(&reason)));
        return Err(ZmtpError::UnsupportedMechanism(greeting.mechanism));
    }

    let identity = local.sends_identity().then(Bytes::new);
    writer.write_frame(&ZmtpFrame::command(ReadyCommand::new(local, identity).encode()))?;

    let frame = reader.read_frame()?;
    if !frame.command {
        return Err(ZmtpError::Handshake(
            "expected READY command, got message frame".to_string(),
        ));
    }
    if let Some(reason) = parse_error_command(&frame.body) {
        return Err(ZmtpError::PeerRejected(reason));
    }
    let ready = ReadyCommand::parse(&frame.body)?;

    let peer_type = SocketType::from_wire(ready.socket_type.as_bytes())
        .filter(|peer| local.is_compatible_with(*peer));
    let Some(socket_type) = peer_type else {
        let _ = writer.write_frame(&ZmtpFrame::command(error_command("invalid socket type")));
        return Err(ZmtpError::IncompatibleSocketType {
            local,
            peer: ready.socket_type,
        });
    };

    if let Some(identity) = &ready.identity {
        if identity.len() > MAX_IDENTITY_LEN {
            return Err(ZmtpError::Handshake(format!(
                "identity too long: {} bytes",
                identity.len()
            )));
        }
    }

    debug!(
        local = %local,
        peer = %socket_type,
        version = %format_args!("{}.{}", greeting.major, greeting.minor),
        "zmtp handshake complete"
    );

    Ok(PeerInfo {
        socket_type,
        version: (greeting.major, greeting.minor),
        identity: ready.identity,
    })
}

#[cfg(all(test, unix))]
mod tests {
    use std::os::unix::net::UnixStream;
    use std::thread;

    use super::*;

    fn pair() -> (
        (FrameReader<UnixStream>, FrameWriter<UnixStream>),
        (FrameReader<UnixStream>, FrameWriter<UnixStream>),
    ) {
        let (a, b) = UnixStream::pair().expect("socket pair should be created");
        let a2 = a.try_clone().expect("stream should clone");
        let b2 = b.try_clone().expect("stream should clone");
        (
            (FrameReader::new(a), FrameWriter::new(a2)),
            (FrameReader::new(b), FrameWriter::new(b2)),
        )
    }

    #[test]
    fn greeting_layout() {
        let bytes = Greeting::null(true).encode();
        assert_eq!(bytes[0], 0xFF);
        assert_eq!(&bytes[1..9], &[0u8; 8]);
        assert_eq!(bytes[9], 0x7F);
        assert_eq!((bytes[10], bytes[11]), (3, 0));
        assert_eq!(&bytes[12..16], b"NULL");
        assert_eq!(&bytes[16..32], &[0u8; 16]);
        assert_eq!(bytes[32], 1);
        assert_eq!(&bytes[33..], &[0u8; 31]);
        assert_eq!(Greeting::parse(&bytes).unwrap(), Greeting::null(true));
    }

    #[test]
    fn greeting_rejects_bad_signature_and_old_versions() {
        let mut bytes = Greeting::null(false).encode();
        bytes[0] = 0x00;
        assert!(matches!(
            Greeting::parse(&bytes),
            Err(ZmtpError::InvalidGreeting(_))
        ));

        let mut bytes = Greeting::null(false).encode();
        bytes[10] = 2;
        assert!(matches!(
            Greeting::parse(&bytes),
            Err(ZmtpError::UnsupportedVersion { major: 2, minor: 0 })
        ));
    }

    #[test]
    fn newer_minor_versions_are_accepted() {
        let mut bytes = Greeting::null(false).encode();
        bytes[11] = 1;
        assert_eq!(Greeting::parse(&bytes).unwrap().minor, 1);
    }

    #[test]
    fn ready_command_roundtrip() {
        let ready = ReadyCommand::new(SocketType::Req, Some(Bytes::from_static(b"peer-1")));
        let body = ready.encode();
        assert_eq!(&body[..6], b"\x05READY");
        assert_eq!(&body[6..18], b"\x0bSocket-Type");
        assert_eq!(&body[18..22], &3u32.to_be_bytes());
        assert_eq!(ReadyCommand::parse(&body).unwrap(), ready);
    }

    #[test]
    fn truncated_ready_rejected() {
        let body = ReadyCommand::new(SocketType::Sub, None).encode();
        assert!(matches!(
            ReadyCommand::parse(&body[..body.len() - 1]),
            Err(ZmtpError::Handshake(_))
        ));
        assert!(ReadyCommand::parse(b"\x05READY").is_err());
    }

    #[test]
    fn error_command_roundtrip() {
        let body = error_command("nope");
        assert_eq!(body.as_ref(), b"\x05ERROR\x04nope");
        assert_eq!(parse_error_command(&body).as_deref(), Some("nope"));
        assert_eq!(parse_error_command(b"\x05READY"), None);
    }

    #[test]
    fn req_and_rep_complete_handshake() {
        let ((mut cr, mut cw), (mut sr, mut sw)) = pair();
        let server = thread::spawn(move || {
            handshake(&mut sr, &mut sw, SocketType::Rep, true, Duration::from_secs(1))
        });
        let client_peer = handshake(
            &mut cr,
            &mut cw,
            SocketType::Req,
            false,
            Duration::from_secs(1),
        )
        .expect("client handshake should succeed");
        let server_peer = server
            .join()
            .expect("server thread should not panic")
            .expect("server handshake should succeed");

        assert_eq!(client_peer.socket_type, SocketType::Rep);
        assert_eq!(client_peer.identity, None);
        assert_eq!(server_peer.socket_type, SocketType::Req);
        assert_eq!(server_peer.identity, Some(Bytes::new()));
        assert_eq!(server_peer.version, (3, 0));
    }

    #[test]
    fn incompatible_socket_types_fail_both_sides() {
        let ((mut cr, mut cw), (mut sr, mut sw)) = pair();
        let server = thread::spawn(move || {
            handshake(&mut sr, &mut sw, SocketType::Pub, true, Duration::from_secs(1))
        });
        let client = handshake(
            &mut cr,
            &mut cw,
            SocketType::Req,
            false,
            Duration::from_secs(1),
        );
        let server = server.join().expect("server thread should not panic");

        assert!(client.is_err());
        assert!(matches!(
            server,
            Err(ZmtpError::IncompatibleSocketType { .. }) | Err(ZmtpError::PeerRejected(_))
        ));
    }

    #[test]
    fn silent_peer_times_out() {
        let (a, _b) = UnixStream::pair().expect("socket pair should be created");
        a.set_read_timeout(Some(Duration::from_millis(50)))
            .expect("timeout should apply");
        let mut reader = FrameReader::new(a.try_clone().expect("stream should clone"));
        let mut writer = FrameWriter::new(a);

        let err = handshake(
            &mut reader,
            &mut writer,
            SocketType::Sub,
            false,
            Duration::from_millis(50),
        )
        .unwrap_err();
        assert!(matches!(err, ZmtpError::Timeout(_)));
    }
}
