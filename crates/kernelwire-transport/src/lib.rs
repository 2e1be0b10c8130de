//! Byte-stream connections to Jupyter kernel endpoints.
//!
//! Provides a unified interface over the transports a kernel connection
//! file can name:
//! - `tcp`: TCP sockets (all platforms)
//! - `ipc`: Unix domain sockets (Linux/macOS)
//!
//! This is the lowest layer of kernelwire. Everything else builds on top of
//! the [`KernelStream`] type provided here.

pub mod endpoint;
pub mod error;
pub mod listener;
pub mod stream;

pub use endpoint::Endpoint;
pub use error::{Result, TransportError};
pub use listener::KernelListener;
pub use stream::KernelStream;
