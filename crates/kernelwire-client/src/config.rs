use std::sync::mpsc::Sender;
use std::time::Duration;

use kernelwire_zmtp::{ZmtpConfig, DEFAULT_MAX_FRAME_SIZE};

use crate::error::DrainError;

/// What to do with output for one of our `execute_request`s that has no
/// open stream and was not closed within [`ClientConfig::orphan_grace`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrphanPolicy {
    /// Stop the client: routing and kernel state have diverged.
    #[default]
    Fatal,
    /// Report the orphan and keep draining.
    Log,
}

/// Client tuning. `Default` suits a local kernel.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// `username` in every request header.
    pub username: String,
    /// Connect and handshake timeout for both channels.
    pub connect_timeout: Duration,
    /// Broadcast read timeout; bounds how long shutdown waits for the drain thread to notice.
    pub poll_interval: Duration,
    /// Messages buffered per output stream before the drain thread blocks.
    pub output_buffer: usize,
    pub orphan_policy: OrphanPolicy,
    /// How long a closed request id still absorbs late output.
    pub orphan_grace: Duration,
    /// How long `close` waits for the drain thread.
    pub shutdown_timeout: Duration,
    pub max_frame_size: usize,
    /// Receives every drain error, fatal or not.
    pub error_sink: Option<Sender<DrainError>>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            username: "kernelwire".to_string(),
            connect_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(100),
            output_buffer: 64,
            orphan_policy: OrphanPolicy::Fatal,
            orphan_grace: Duration::from_secs(5),
            shutdown_timeout: Duration::from_secs(2),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            error_sink: None,
        }
    }
}

impl ClientConfig {
    pub(crate) fn zmtp(&self) -> ZmtpConfig {
        ZmtpConfig {
            max_frame_size: self.max_frame_size,
            connect_timeout: self.connect_timeout,
            handshake_timeout: self.connect_timeout,
            ..ZmtpConfig::default()
        }
    }
}
