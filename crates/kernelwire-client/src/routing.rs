//! Request id to output stream correlation.
//!
//! The issuing side registers a stream before the request is sent; the
//! drain thread routes broadcast content to it and closes it when the
//! kernel reports idle for that request.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{
    self, Receiver, RecvTimeoutError, SyncSender, TryRecvError, TrySendError,
};
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use kernelwire_message::IoPubContent;
use tracing::debug;

use crate::error::{ClientError, Result};

const MAX_SEND_BACKOFF: Duration = Duration::from_millis(10);

/// Outcome of [`Router::route`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// No stream is registered for the parent id.
    NoRoute,
    /// The stream exists but its consumer dropped it.
    ConsumerGone,
    /// Shutdown began while waiting for buffer space.
    Aborted,
}

/// Concurrent table of open output streams.
#[derive(Debug)]
pub struct Router {
    routes: RwLock<HashMap<String, SyncSender<IoPubContent>>>,
    retired: Mutex<VecDeque<(String, Instant)>>,
    grace: Duration,
}

impl Router {
    /// `grace` is how long a closed id stays in [`Router::recently_closed`].
    pub fn new(grace: Duration) -> Self {
        Self {
            routes: RwLock::new(HashMap::new()),
            retired: Mutex::new(VecDeque::new()),
            grace,
        }
    }

    /// Open a stream for `command_id` holding up to `capacity` undelivered items.
    pub fn register(&self, command_id: &str, capacity: usize) -> Result<OutputStream> {
        let mut routes = self.routes.write().unwrap_or_else(PoisonError::into_inner);
        if routes.contains_key(command_id) {
            return Err(ClientError::DuplicateRequest(command_id.to_string()));
        }
        let (tx, rx) = mpsc::sync_channel(capacity);
        routes.insert(command_id.to_string(), tx);
        debug!(msg_id = command_id, open = routes.len(), "output stream registered");
        Ok(OutputStream {
            command_id: command_id.to_string(),
            rx,
        })
    }

    /// Push `content` to the stream of `parent_id`.
    ///
    /// Blocks while the stream's buffer is full, so a slow consumer holds
    /// back the whole broadcast feed. Gives up once `shutdown` is set.
    pub fn route(&self, parent_id: &str, content: IoPubContent, shutdown: &AtomicBool) -> Delivery {
        let tx = {
            let routes = self.routes.read().unwrap_or_else(PoisonError::into_inner);
            match routes.get(parent_id) {
                Some(tx) => tx.clone(),
                None => return Delivery::NoRoute,
            }
        };

        let mut pending = content;
        let mut backoff = Duration::from_micros(100);
        loop {
            match tx.try_send(pending) {
                Ok(()) => return Delivery::Delivered,
                Err(TrySendError::Disconnected(_)) => return Delivery::ConsumerGone,
                Err(TrySendError::Full(content)) => {
                    if shutdown.load(Ordering::Acquire) {
                        return Delivery::Aborted;
                    }
                    pending = content;
                    std::thread::sleep(backoff);
                    backoff = (backoff * 2).min(MAX_SEND_BACKOFF);
                }
            }
        }
    }

    /// Close and forget the stream of `command_id`. Returns whether one was open.
    ///
    /// The consumer still receives what was buffered, then end-of-stream.
    pub fn close_and_remove(&self, command_id: &str) -> bool {
        let removed = self
            .routes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(command_id)
            .is_some();
        if removed {
            self.retire(command_id);
            debug!(msg_id = command_id, "output stream closed");
        }
        removed
    }

    /// Close every open stream. Returns how many were open.
    pub fn close_all(&self) -> usize {
        let drained: Vec<String> = self
            .routes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(id, _)| id)
            .collect();
        for id in &drained {
            self.retire(id);
        }
        drained.len()
    }

    /// True if `command_id` was closed less than the grace period ago.
    pub fn recently_closed(&self, command_id: &str) -> bool {
        let mut retired = self.retired.lock().unwrap_or_else(PoisonError::into_inner);
        self.prune(&mut retired);
        retired.iter().any(|(id, _)| id == command_id)
    }

    pub fn is_open(&self, command_id: &str) -> bool {
        self.routes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(command_id)
    }

    pub fn len(&self) -> usize {
        self.routes.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn retire(&self, command_id: &str) {
        let mut retired = self.retired.lock().unwrap_or_else(PoisonError::into_inner);
        self.prune(&mut retired);
        retired.push_back((command_id.to_string(), Instant::now()));
    }

    // Entries are in insertion order, so expired ones sit at the front.
    fn prune(&self, retired: &mut VecDeque<(String, Instant)>) {
        while let Some((_, closed_at)) = retired.front() {
            if closed_at.elapsed() < self.grace {
                break;
            }
            retired.pop_front();
        }
    }
}

/// Broadcast output of one request, in the order the kernel emitted it.
///
/// Ends once the kernel goes idle for the request or the client closes.
#[derive(Debug)]
pub struct OutputStream {
    command_id: String,
    rx: Receiver<IoPubContent>,
}

impl OutputStream {
    /// `msg_id` of the request this stream belongs to.
    pub fn command_id(&self) -> &str {
        &self.command_id
    }

    /// Next item, or `None` once the stream has ended.
    pub fn recv(&self) -> Option<IoPubContent> {
        self.rx.recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> std::result::Result<IoPubContent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    pub fn try_recv(&self) -> std::result::Result<IoPubContent, TryRecvError> {
        self.rx.try_recv()
    }
}

impl Iterator for OutputStream {
    type Item = IoPubContent;

    fn next(&mut self) -> Option<Self::Item> {
        self.recv()
    }
}
