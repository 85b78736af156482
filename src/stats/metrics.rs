//! Statistics for the hub and its network collaborators

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Point-in-time hub statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HubStats {
    /// Registered subscribers
    pub subscribers: usize,
    /// Messages currently retained for replay
    pub retained: usize,
    /// History capacity
    pub capacity: usize,
    /// Messages pushed since the hub was created
    pub pushed: u64,
    /// Live deliveries into mailboxes, summed over subscribers
    pub delivered: u64,
    /// Live deliveries skipped because a mailbox was full
    pub dropped: u64,
}

impl HubStats {
    /// Fraction of delivery attempts that were dropped, in percent
    pub fn drop_rate(&self) -> f64 {
        let attempts = self.delivered + self.dropped;
        if attempts > 0 {
            (self.dropped as f64 / attempts as f64) * 100.0
        } else {
            0.0
        }
    }
}

/// Per-connection statistics for a downstream feed session
#[derive(Debug, Clone)]
pub(crate) struct SessionStats {
    /// Messages replayed from history
    pub catchup_messages: u64,
    /// Live messages written
    pub live_messages: u64,
    /// Payload bytes written (excluding frame headers)
    pub bytes_sent: u64,
    /// Connection start time
    pub started_at: Instant,
}

impl SessionStats {
    pub(crate) fn new() -> Self {
        Self {
            catchup_messages: 0,
            live_messages: 0,
            bytes_sent: 0,
            started_at: Instant::now(),
        }
    }

    /// Get session duration
    pub(crate) fn duration(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// Server-wide statistics
#[derive(Debug, Clone, Default)]
pub struct ServerStats {
    /// Total connections accepted
    pub total_connections: u64,
    /// Current active connections
    pub active_connections: u64,
    /// Connections refused by the connection limit
    pub rejected_connections: u64,
    /// Total messages written to consumers
    pub messages_sent: u64,
    /// Total payload bytes written to consumers
    pub bytes_sent: u64,
    /// Uptime
    pub uptime: Duration,
}

/// Upstream ingest statistics
#[derive(Debug, Clone, Default)]
pub struct IngestStats {
    /// Connection attempts made to upstream
    pub connect_attempts: u64,
    /// Successful upstream connections
    pub connections: u64,
    /// Messages received and pushed into the hub
    pub messages_received: u64,
    /// Payload bytes received
    pub bytes_received: u64,
}

/// Lock-free counters shared between the feed server and its connections
#[derive(Debug)]
pub(crate) struct ServerCounters {
    total_connections: AtomicU64,
    active_connections: AtomicU64,
    rejected_connections: AtomicU64,
    messages_sent: AtomicU64,
    bytes_sent: AtomicU64,
    started_at: Instant,
}

impl ServerCounters {
    pub(crate) fn new() -> Self {
        Self {
            total_connections: AtomicU64::new(0),
            active_connections: AtomicU64::new(0),
            rejected_connections: AtomicU64::new(0),
            messages_sent: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    pub(crate) fn connection_opened(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn connection_rejected(&self) {
        self.rejected_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn message_sent(&self, bytes: usize) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> ServerStats {
        ServerStats {
            total_connections: self.total_connections.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            rejected_connections: self.rejected_connections.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            uptime: self.started_at.elapsed(),
        }
    }
}

/// Lock-free counters for the ingest client
#[derive(Debug, Default)]
pub(crate) struct IngestCounters {
    connect_attempts: AtomicU64,
    connections: AtomicU64,
    messages_received: AtomicU64,
    bytes_received: AtomicU64,
}

impl IngestCounters {
    pub(crate) fn connect_attempted(&self) {
        self.connect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn connected(&self) {
        self.connections.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn message_received(&self, bytes: usize) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> IngestStats {
        IngestStats {
            connect_attempts: self.connect_attempts.load(Ordering::Relaxed),
            connections: self.connections.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
        }
    }
}
