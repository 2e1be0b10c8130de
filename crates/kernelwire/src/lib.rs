//! Jupyter kernel messaging in Rust.
//!
//! kernelwire talks to running Jupyter kernels without libzmq: it carries
//! its own ZMTP 3.0 implementation, the signed kernel message codec and a
//! client that routes broadcast output to the request that caused it.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP and Unix-domain byte streams to kernel endpoints
//! - [`zmtp`]: ZMTP framing, handshake and REQ/SUB/REP/PUB sockets
//! - [`message`]: Message envelope, HMAC signing and typed content
//! - [`client`]: Kernel client with per-request output streams (behind `client` feature)

/// Re-export transport types.
pub mod transport {
    pub use kernelwire_transport::*;
}

/// Re-export ZMTP types.
pub mod zmtp {
    pub use kernelwire_zmtp::*;
}

/// Re-export message types.
pub mod message {
    pub use kernelwire_message::*;
}

/// Re-export client types (requires `client` feature).
#[cfg(feature = "client")]
pub mod client {
    pub use kernelwire_client::*;
}
