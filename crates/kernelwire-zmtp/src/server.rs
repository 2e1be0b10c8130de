//! Listening side: REP and PUB sockets for kernels and test fixtures.

use std::time::Duration;

use bytes::Bytes;
use kernelwire_transport::{Endpoint, KernelListener};
use tracing::{debug, warn};

use crate::codec::ZmtpConfig;
use crate::connection::Connection;
use crate::error::{Result, ZmtpError};
use crate::handshake::command_name;
use crate::socket_type::SocketType;
use crate::sub::{SUBSCRIBE, UNSUBSCRIBE};

/// Binds an endpoint and accepts ZMTP peers.
#[derive(Debug)]
pub struct ZmtpListener {
    listener: KernelListener,
    config: ZmtpConfig,
}

impl ZmtpListener {
    pub fn bind(endpoint: &Endpoint, config: ZmtpConfig) -> Result<Self> {
        let listener = KernelListener::bind(endpoint)?;
        Ok(Self { listener, config })
    }

    /// The bound endpoint (with the assigned port for `tcp://host:0`).
    pub fn endpoint(&self) -> &Endpoint {
        self.listener.endpoint()
    }

    /// Accept one REQ or DEALER peer.
    pub fn accept_rep(&self) -> Result<RepSocket> {
        let stream = self.listener.accept()?;
        let conn = Connection::establish(stream, SocketType::Rep, true, &self.config)?;
        Ok(RepSocket {
            conn,
            envelope: None,
        })
    }

    /// Accept one SUB peer and wait for its first subscription.
    pub fn accept_pub(&self) -> Result<Subscriber> {
        let stream = self.listener.accept()?;
        let conn = Connection::establish(stream, SocketType::Pub, true, &self.config)?;
        let mut subscriber = Subscriber {
            conn,
            prefixes: Vec::new(),
        };

        subscriber
            .conn
            .set_read_timeout(Some(self.config.handshake_timeout))?;
        subscriber
            .read_subscription()
            .map_err(|err| match err {
                err if err.is_timeout() => ZmtpError::Timeout(self.config.handshake_timeout),
                err => err,
            })?;
        subscriber.conn.set_read_timeout(self.config.read_timeout)?;
        Ok(subscriber)
    }
}

/// Server side of a request/reply pair.
#[derive(Debug)]
pub struct RepSocket {
    conn: Connection,
    envelope: Option<Vec<Bytes>>,
}

impl RepSocket {
    /// Receive the next request without its routing envelope.
    pub fn recv(&mut self) -> Result<Vec<Bytes>> {
        if self.envelope.is_some() {
            return Err(ZmtpError::InvalidState(
                "reply to the previous request first",
            ));
        }
        let mut parts = self.conn.recv_multipart()?;
        let Some(split) = parts.iter().position(|part| part.is_empty()) else {
            return Err(ZmtpError::MissingEnvelope);
        };
        let body = parts.split_off(split + 1);
        self.envelope = Some(parts);
        Ok(body)
    }

    /// Reply to the last request.
    pub fn send(&mut self, parts: &[Bytes]) -> Result<()> {
        let Some(mut framed) = self.envelope.take() else {
            return Err(ZmtpError::InvalidState("no request to reply to"));
        };
        framed.extend_from_slice(parts);
        self.conn.send_multipart(&framed)
    }

    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.conn.set_read_timeout(timeout)
    }

    pub fn close(&self) -> Result<()> {
        self.conn.shutdown()
    }
}

/// One connected subscriber and the prefixes it asked for.
#[derive(Debug)]
pub struct Subscriber {
    conn: Connection,
    prefixes: Vec<Bytes>,
}

impl Subscriber {
    fn read_subscription(&mut self) -> Result<()> {
        loop {
            let frame = self.conn.recv_frame()?;
            let body = frame.body;
            if frame.command {
                // ZMTP 3.1 peers subscribe with a command instead of a message
                match command_name(&body) {
                    Some(b"SUBSCRIBE") => {
                        self.prefixes.push(body.slice(1 + "SUBSCRIBE".len()..));
                        return Ok(());
                    }
                    Some(b"CANCEL") => {
                        let prefix = body.slice(1 + "CANCEL".len()..);
                        self.prefixes.retain(|p| *p != prefix);
                    }
                    _ => {}
                }
                continue;
            }

            match body.first() {
                Some(&SUBSCRIBE) => {
                    self.prefixes.push(body.slice(1..));
                    return Ok(());
                }
                Some(&UNSUBSCRIBE) => {
                    let prefix = body.slice(1..);
                    self.prefixes.retain(|p| *p != prefix);
                }
                _ => warn!("ignoring non-subscription message from subscriber"),
            }
        }
    }

    fn matches(&self, topic: &[u8]) -> bool {
        self.prefixes.iter().any(|prefix| topic.starts_with(prefix))
    }

    pub fn prefixes(&self) -> &[Bytes] {
        &self.prefixes
    }
}

/// Publisher fanning messages out to accepted subscribers.
///
/// Subscriptions are read once, when the subscriber is accepted.
#[derive(Debug, Default)]
pub struct PubSocket {
    subscribers: Vec<Subscriber>,
}

impl PubSocket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_subscriber(&mut self, subscriber: Subscriber) {
        self.subscribers.push(subscriber);
    }

    /// Send `parts` to every subscriber whose prefix matches the first frame.
    ///
    /// Subscribers whose connection fails are dropped. Returns the number
    /// of subscribers the message was delivered to.
    pub fn publish(&mut self, parts: &[Bytes]) -> Result<usize> {
        let Some(topic) = parts.first() else {
            return Err(ZmtpError::InvalidState("cannot publish an empty message"));
        };
        let topic = topic.clone();

        let mut delivered = 0;
        self.subscribers.retain_mut(|subscriber| {
            if !subscriber.matches(&topic) {
                return true;
            }
            match subscriber.conn.send_multipart(parts) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(err) => {
                    debug!(error = %err, "dropping subscriber");
                    false
                }
            }
        });
        Ok(delivered)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Shut down every subscriber connection.
    pub fn close(&mut self) {
        for subscriber in self.subscribers.drain(..) {
            let _ = subscriber.conn.shutdown();
        }
    }
}
