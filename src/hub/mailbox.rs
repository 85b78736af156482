//! Receive side of a subscription
//!
//! A mailbox holds at most one undelivered message. The hub never waits for
//! it to drain: a message arriving while the slot is occupied is dropped for
//! this subscriber only.

use std::sync::Weak;

use bytes::Bytes;
use tokio::sync::mpsc::{self, error::TryRecvError};

use super::entry::SubscriberId;
use super::store::Hub;

/// Mailbox capacity, in messages
pub const MAILBOX_CAPACITY: usize = 1;

/// Single-slot live feed for one subscriber
///
/// Dropping the mailbox deregisters the subscriber.
pub struct Mailbox {
    id: SubscriberId,
    rx: mpsc::Receiver<Bytes>,
    hub: Weak<Hub>,
}

impl Mailbox {
    pub(super) fn new(id: SubscriberId, rx: mpsc::Receiver<Bytes>, hub: Weak<Hub>) -> Self {
        Self { id, rx, hub }
    }

    /// Identity to pass to [`Hub::unsubscribe`]
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next live message
    ///
    /// Returns `None` once the subscriber has been deregistered and any
    /// pending message has been read.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }

    /// Take the pending message, if any, without waiting
    pub fn try_recv(&mut self) -> Option<Bytes> {
        match self.rx.try_recv() {
            Ok(msg) => Some(msg),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }
}

impl std::fmt::Debug for Mailbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mailbox").field("id", &self.id).finish()
    }
}

impl Drop for Mailbox {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.unsubscribe(self.id);
        }
    }
}
