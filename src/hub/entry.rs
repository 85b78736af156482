//! Subscriber identity and per-subscriber registry state

use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;

/// Opaque identity of a subscriber
///
/// Allocated by the hub, never reused. Re-subscribing always yields a new id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(pub(super) u64);

impl SubscriberId {
    /// Raw numeric value, for logging
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Outcome of a single delivery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Delivery {
    /// Message placed in the mailbox
    Delivered,
    /// Mailbox still held an unread message; this one was discarded
    Dropped,
    /// The mailbox receiver is gone
    Closed,
}

/// Registry entry for a live subscriber
pub(super) struct SubscriberEntry {
    /// Write side of the subscriber's single-slot mailbox
    tx: mpsc::Sender<Bytes>,

    /// Cancelled when the entry leaves the registry, releasing the watcher task
    closed: CancellationToken,

    /// Messages placed in the mailbox
    delivered: u64,

    /// Messages discarded because the mailbox was full
    dropped: u64,

    /// When the subscriber registered
    subscribed_at: Instant,
}

impl SubscriberEntry {
    pub(super) fn new(tx: mpsc::Sender<Bytes>, closed: CancellationToken) -> Self {
        Self {
            tx,
            closed,
            delivered: 0,
            dropped: 0,
            subscribed_at: Instant::now(),
        }
    }

    /// Try to hand a message to the subscriber without waiting
    pub(super) fn offer(&mut self, msg: Bytes) -> Delivery {
        match self.tx.try_send(msg) {
            Ok(()) => {
                self.delivered += 1;
                Delivery::Delivered
            }
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                Delivery::Dropped
            }
            Err(TrySendError::Closed(_)) => Delivery::Closed,
        }
    }

    pub(super) fn stats(&self) -> SubscriberStats {
        SubscriberStats {
            delivered: self.delivered,
            dropped: self.dropped,
            age: self.subscribed_at.elapsed(),
        }
    }
}

impl Drop for SubscriberEntry {
    // Leaving the registry, by any path, releases the lifetime watcher
    fn drop(&mut self) {
        self.closed.cancel();
    }
}

/// Delivery statistics for one subscriber
#[derive(Debug, Clone)]
pub struct SubscriberStats {
    /// Messages placed in the mailbox
    pub delivered: u64,
    /// Messages skipped because the previous one was still unread
    pub dropped: u64,
    /// Time since the subscriber registered
    pub age: Duration,
}
