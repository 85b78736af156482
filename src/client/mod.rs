//! Upstream ingest client
//!
//! Dials the upstream message source, pushes every received message into the
//! hub, and reconnects whenever the upstream connection is lost.

pub mod config;
pub mod ingest;

pub use config::ClientConfig;
pub use ingest::{IngestClient, IngestEvent};
