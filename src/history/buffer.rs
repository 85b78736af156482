//! Ring buffer of recent messages for late-joiner catch-up
//!
//! When a new consumer attaches to the feed, it first receives the most recent
//! messages retained here, oldest first, and only then live updates. The buffer
//! holds a fixed number of slots; once full, every append overwrites the oldest
//! retained message.

use bytes::Bytes;

/// Default number of retained messages
pub const DEFAULT_HISTORY_CAPACITY: usize = 1024;

/// Fixed-capacity circular store of the most recent messages
///
/// Mutation takes `&mut self`; shared access goes through the hub's lock so a
/// snapshot never observes a half-written slot.
#[derive(Debug)]
pub struct HistoryBuffer {
    /// Slots, written in place via `write`
    slots: Vec<Bytes>,
    /// Index of the next slot to write
    write: usize,
    /// Number of retained messages, saturates at capacity
    count: usize,
    /// Messages appended since construction (including evicted ones)
    total_appended: u64,
}

impl HistoryBuffer {
    /// Create a buffer with the default capacity (1024 messages)
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    /// Create a buffer retaining at most `capacity` messages
    ///
    /// A capacity of zero disables retention: appends are counted but discarded.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: vec![Bytes::new(); capacity],
            write: 0,
            count: 0,
            total_appended: 0,
        }
    }

    /// Append a message, evicting the oldest one if the buffer is full
    pub fn append(&mut self, msg: Bytes) {
        self.total_appended += 1;

        let capacity = self.slots.len();
        if capacity == 0 {
            return;
        }

        self.slots[self.write] = msg;
        self.write = (self.write + 1) % capacity;

        if self.count < capacity {
            self.count += 1;
        }
    }

    /// Copy out the retained messages, oldest to newest
    ///
    /// The returned vector is independent of the buffer; only the `Bytes`
    /// handles are cloned, not the payloads.
    pub fn snapshot(&self) -> Vec<Bytes> {
        let capacity = self.slots.len();
        let mut result = Vec::with_capacity(self.count);

        for i in 0..self.count {
            let index = (self.write + capacity - self.count + i) % capacity;
            result.push(self.slots[index].clone());
        }

        result
    }

    /// Number of retained messages
    pub fn len(&self) -> usize {
        self.count
    }

    /// Whether no message is retained
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Whether the next append will evict a message
    pub fn is_full(&self) -> bool {
        !self.slots.is_empty() && self.count == self.slots.len()
    }

    /// Maximum number of retained messages
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Messages appended over the buffer's lifetime
    pub fn total_appended(&self) -> u64 {
        self.total_appended
    }
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new()
    }
}
