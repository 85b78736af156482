//! Fan-out hub implementation
//!
//! The hub owns the message history and the subscriber registry behind a
//! single lock. `push` appends and broadcasts under that lock; `subscribe`
//! snapshots and registers under it. Holding one lock for both is what makes
//! the replay/live seam gap-free and duplicate-free.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::history::HistoryBuffer;
use crate::stats::HubStats;

use super::config::HubConfig;
use super::entry::{Delivery, SubscriberEntry, SubscriberId, SubscriberStats};
use super::mailbox::{Mailbox, MAILBOX_CAPACITY};

/// State guarded by the hub lock
struct HubState {
    history: HistoryBuffer,
    subscribers: HashMap<SubscriberId, SubscriberEntry>,
    delivered: u64,
    dropped: u64,
}

/// History store plus subscriber fan-out
///
/// Construct one per feed and share it via `Arc`. None of the methods wait on
/// subscriber consumption; the only blocking anywhere is a consumer awaiting
/// its own [`Mailbox`].
pub struct Hub {
    state: Mutex<HubState>,

    /// Source of subscriber ids
    next_subscriber_id: AtomicU64,

    config: HubConfig,
}

impl Hub {
    /// Create a hub with default configuration
    pub fn new() -> Self {
        Self::with_config(HubConfig::default())
    }

    /// Create a hub with custom configuration
    pub fn with_config(config: HubConfig) -> Self {
        Self {
            state: Mutex::new(HubState {
                history: HistoryBuffer::with_capacity(config.history_capacity),
                subscribers: HashMap::new(),
                delivered: 0,
                dropped: 0,
            }),
            next_subscriber_id: AtomicU64::new(1),
            config,
        }
    }

    /// Get the hub configuration
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Record a message and offer it to every subscriber
    ///
    /// Delivery never waits: a subscriber whose mailbox still holds an unread
    /// message misses this one. Subscribers whose mailbox has gone away are
    /// removed from the registry.
    pub fn push(&self, msg: Bytes) {
        let mut state = self.state.lock();
        let HubState {
            history,
            subscribers,
            delivered,
            dropped,
        } = &mut *state;

        history.append(msg.clone());

        subscribers.retain(|id, entry| match entry.offer(msg.clone()) {
            Delivery::Delivered => {
                *delivered += 1;
                true
            }
            Delivery::Dropped => {
                *dropped += 1;
                tracing::trace!(subscriber = %id, "Mailbox full, message dropped");
                true
            }
            Delivery::Closed => {
                tracing::debug!(subscriber = %id, "Mailbox closed, subscriber removed");
                false
            }
        });
    }

    /// Subscribe for as long as `lifetime` is not cancelled
    ///
    /// Returns the catch-up snapshot (oldest first) and the live mailbox. Any
    /// message pushed concurrently lands in exactly one of the two.
    ///
    /// The lifetime is watched on the current Tokio runtime. Called from a
    /// thread without one, the subscriber is still registered but only leaves
    /// through [`Hub::unsubscribe`] or by dropping the mailbox.
    pub fn subscribe(self: &Arc<Self>, lifetime: CancellationToken) -> (Vec<Bytes>, Mailbox) {
        self.subscribe_until(lifetime.cancelled_owned())
    }

    /// Subscribe until `lifetime` completes
    ///
    /// The subscriber is also removed on [`Hub::unsubscribe`] or when the
    /// mailbox is dropped, whichever happens first.
    pub fn subscribe_until<F>(self: &Arc<Self>, lifetime: F) -> (Vec<Bytes>, Mailbox)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        // Resolved before touching the registry so nothing below can panic
        let runtime = Handle::try_current().ok();

        let id = SubscriberId(self.next_subscriber_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
        let closed = CancellationToken::new();

        let (catchup, subscribers) = {
            let mut state = self.state.lock();
            let catchup = state.history.snapshot();
            state
                .subscribers
                .insert(id, SubscriberEntry::new(tx, closed.clone()));
            (catchup, state.subscribers.len())
        };

        tracing::info!(
            subscriber = %id,
            subscribers = subscribers,
            catchup_messages = catchup.len(),
            "Subscriber added"
        );

        match runtime {
            Some(handle) => self.spawn_lifetime_watch(&handle, id, lifetime, closed),
            None => tracing::warn!(
                subscriber = %id,
                "No Tokio runtime, subscriber lifetime is not watched"
            ),
        }

        (catchup, Mailbox::new(id, rx, Arc::downgrade(self)))
    }

    /// Remove a subscriber
    ///
    /// No-op if it was already removed. Its mailbox yields any pending message
    /// and then `None`.
    pub fn unsubscribe(&self, id: SubscriberId) {
        let (removed, remaining) = {
            let mut state = self.state.lock();
            let removed = state.subscribers.remove(&id);
            (removed, state.subscribers.len())
        };

        if let Some(entry) = removed {
            let stats = entry.stats();
            tracing::debug!(
                subscriber = %id,
                subscribers = remaining,
                delivered = stats.delivered,
                dropped = stats.dropped,
                "Subscriber removed"
            );
        }
    }

    /// Deregister `id` once `lifetime` fires, unless it leaves the registry first
    fn spawn_lifetime_watch<F>(
        self: &Arc<Self>,
        runtime: &Handle,
        id: SubscriberId,
        lifetime: F,
        closed: CancellationToken,
    ) where
        F: Future<Output = ()> + Send + 'static,
    {
        let hub = Arc::downgrade(self);

        runtime.spawn(async move {
            tokio::select! {
                _ = lifetime => {
                    if let Some(hub) = hub.upgrade() {
                        tracing::debug!(subscriber = %id, "Subscriber lifetime ended");
                        hub.unsubscribe(id);
                    }
                }
                _ = closed.cancelled() => {}
            }
        });
    }

    /// Copy of the retained history, oldest first
    pub fn snapshot(&self) -> Vec<Bytes> {
        self.state.lock().history.snapshot()
    }

    /// Number of retained history messages
    pub fn len(&self) -> usize {
        self.state.lock().history.len()
    }

    /// Whether no history message is retained
    pub fn is_empty(&self) -> bool {
        self.state.lock().history.is_empty()
    }

    /// History capacity
    pub fn capacity(&self) -> usize {
        self.config.history_capacity
    }

    /// Number of registered subscribers
    pub fn subscriber_count(&self) -> usize {
        self.state.lock().subscribers.len()
    }

    /// Check whether a subscriber is still registered
    pub fn is_subscribed(&self, id: SubscriberId) -> bool {
        self.state.lock().subscribers.contains_key(&id)
    }

    /// Delivery statistics for one subscriber
    pub fn subscriber_stats(&self, id: SubscriberId) -> Option<SubscriberStats> {
        self.state.lock().subscribers.get(&id).map(SubscriberEntry::stats)
    }

    /// Point-in-time hub statistics
    pub fn stats(&self) -> HubStats {
        let state = self.state.lock();
        HubStats {
            subscribers: state.subscribers.len(),
            retained: state.history.len(),
            capacity: state.history.capacity(),
            pushed: state.history.total_appended(),
            delivered: state.delivered,
            dropped: state.dropped,
        }
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}
