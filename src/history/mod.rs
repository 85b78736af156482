//! Bounded message history
//!
//! Keeps the most recent messages of the feed so late joiners can catch up.

pub mod buffer;

pub use buffer::{HistoryBuffer, DEFAULT_HISTORY_CAPACITY};
