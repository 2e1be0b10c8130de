//! ZMTP 3.0 framing and sockets for talking to Jupyter kernels.
//!
//! Implements just enough of the ZeroMQ wire protocol for kernel clients:
//! - Frame encoding with MORE/LONG/COMMAND flags
//! - Greeting and NULL-mechanism READY handshake
//! - REQ and SUB client sockets, REP and PUB listening sockets
//!
//! Everything is blocking and built on [`kernelwire_transport::KernelStream`].
//! With the `async` feature, [`ZmtpCodec`] frames tokio streams.

#[cfg(feature = "async")]
pub mod async_codec;
pub mod codec;
pub mod connection;
pub mod error;
pub mod handshake;
pub mod reader;
pub mod req;
pub mod server;
pub mod socket_type;
pub mod sub;
pub mod writer;

#[cfg(feature = "async")]
pub use async_codec::ZmtpCodec;
pub use codec::{
    decode_frame, encode_frame, ZmtpConfig, ZmtpFrame, DEFAULT_MAX_FRAME_SIZE, FLAG_COMMAND,
    FLAG_LONG, FLAG_MORE,
};
pub use connection::Connection;
pub use error::{Result, ZmtpError};
pub use handshake::{Greeting, PeerInfo, ReadyCommand};
pub use reader::FrameReader;
pub use req::ReqSocket;
pub use server::{PubSocket, RepSocket, Subscriber, ZmtpListener};
pub use socket_type::SocketType;
pub use sub::SubSocket;
pub use writer::FrameWriter;
