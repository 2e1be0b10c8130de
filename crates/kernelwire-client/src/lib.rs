//! Jupyter kernel client runtime.
//!
//! [`Client`] sends requests over the shell channel and waits for each
//! reply, while a background thread drains the iopub channel and routes
//! broadcast output to per-request [`OutputStream`]s. A stream ends when
//! the kernel reports idle for its request, or when the client closes.
//!
//! ```no_run
//! use kernelwire_client::{Client, ConnectionInfo};
//! use kernelwire_message::ExecuteRequest;
//!
//! let info = ConnectionInfo::from_file("kernel-1234.json")?;
//! let client = Client::connect(&info)?;
//! let (reply, output) = client.execute(ExecuteRequest::new("2+2"))?;
//! for content in output {
//!     println!("{}", content.to_value());
//! }
//! println!("{}", reply.status.as_str());
//! # Ok::<(), kernelwire_client::ClientError>(())
//! ```

pub mod client;
pub mod config;
pub mod connection;
mod demux;
pub mod error;
pub mod routing;
pub mod transport;

pub use client::Client;
pub use config::{ClientConfig, OrphanPolicy};
pub use connection::{ConnectionInfo, HMAC_SHA256};
pub use error::{ClientError, DrainError, Result};
pub use routing::{Delivery, OutputStream, Router};
pub use transport::{BroadcastTransport, CommandTransport};
