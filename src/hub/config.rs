//! Hub configuration

use crate::history::DEFAULT_HISTORY_CAPACITY;

/// Configuration for a [`Hub`](super::Hub)
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Number of recent messages replayed to new subscribers (0 = no replay)
    pub history_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

impl HubConfig {
    /// Set the history capacity
    pub fn history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    /// Disable history replay entirely
    pub fn disable_history(mut self) -> Self {
        self.history_capacity = 0;
        self
    }
}
