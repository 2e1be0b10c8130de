//! Per-message decision logic of the broadcast drain thread.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use bytes::Bytes;
use kernelwire_message::{ExecuteRequest, IoPubContent, RawMessage, Request, SigningKey};
use tracing::debug;

use crate::config::OrphanPolicy;
use crate::error::DrainError;
use crate::routing::{Delivery, Router};

/// What happened to one broadcast message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Disposition {
    /// Pushed to an output stream.
    Routed,
    /// The idle status closed the parent's stream.
    Closed,
    /// Not for any open stream; nothing to report.
    Dropped,
    /// Not routed; report and keep draining.
    Report(DrainError),
    /// Stop the client.
    Fatal(DrainError),
}

pub(crate) struct Demux {
    router: Arc<Router>,
    key: SigningKey,
    session: String,
    policy: OrphanPolicy,
}

impl Demux {
    pub(crate) fn new(router: Arc<Router>, key: SigningKey, session: String, policy: OrphanPolicy) -> Self {
        Self {
            router,
            key,
            session,
            policy,
        }
    }

    pub(crate) fn dispatch(&self, frames: &[Bytes], shutdown: &AtomicBool) -> Disposition {
        let raw = match RawMessage::decode(frames, &self.key) {
            Ok(raw) => raw,
            Err(err) => return Disposition::Fatal(DrainError::Decode(err.to_string())),
        };
        let msg_type = raw.msg_type();

        let content = match IoPubContent::parse(msg_type, &raw.content) {
            Ok(IoPubContent::Unknown { msg_type, .. }) => {
                return Disposition::Report(DrainError::UnknownMessageType {
                    msg_type,
                    parent_id: raw.parent_id().map(str::to_string),
                })
            }
            Ok(content) => content,
            Err(err) => {
                return Disposition::Report(DrainError::Content {
                    msg_type: msg_type.to_string(),
                    reason: err.to_string(),
                })
            }
        };

        let Some(parent) = raw.parent_header.as_ref() else {
            debug!(msg_type, "unparented broadcast dropped");
            return Disposition::Dropped;
        };
        let parent_id = parent.msg_id.as_str();

        if content.is_status() {
            if content.is_idle() && self.router.close_and_remove(parent_id) {
                return Disposition::Closed;
            }
            return Disposition::Dropped;
        }

        match self.router.route(parent_id, content, shutdown) {
            Delivery::Delivered => Disposition::Routed,
            Delivery::ConsumerGone | Delivery::Aborted => {
                debug!(msg_type, parent_id, "output discarded");
                Disposition::Dropped
            }
            Delivery::NoRoute => self.unrouted(&raw),
        }
    }

    // Output for an execute request of this session must have a listener,
    // unless its stream closed within the grace period.
    fn unrouted(&self, raw: &RawMessage) -> Disposition {
        let Some(parent) = raw.parent_header.as_ref() else {
            return Disposition::Dropped;
        };
        let ours = parent.session == self.session && parent.msg_type == ExecuteRequest::MSG_TYPE;
        if !ours || self.router.recently_closed(&parent.msg_id) {
            debug!(msg_type = raw.msg_type(), parent_id = %parent.msg_id, "unsolicited broadcast dropped");
            return Disposition::Dropped;
        }

        let orphan = DrainError::Orphaned {
            parent_id: parent.msg_id.clone(),
            parent_type: parent.msg_type.clone(),
            msg_type: raw.msg_type().to_string(),
        };
        match self.policy {
            OrphanPolicy::Fatal => Disposition::Fatal(orphan),
            OrphanPolicy::Log => Disposition::Report(orphan),
        }
    }
}
