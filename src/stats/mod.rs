//! Statistics and metrics

pub mod metrics;

pub use metrics::{HubStats, IngestStats, ServerStats};
pub(crate) use metrics::{IngestCounters, ServerCounters, SessionStats};
