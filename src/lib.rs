//! Replay-then-live fan-out relay
//!
//! `feed-relay` takes a single upstream stream of opaque messages and relays
//! it to any number of downstream consumers. The most recent messages are
//! retained so a consumer that attaches late first catches up on history and
//! then follows the live stream, with no gap and no duplicate at the seam.
//!
//! # Layout
//!
//! - [`history`]: fixed-capacity ring of recent messages
//! - [`hub`]: subscriber registry and non-blocking broadcast
//! - [`protocol`]: WebSocket and length-prefixed wire formats
//! - [`server`]: feed server for downstream consumers
//! - [`client`]: upstream ingest client with reconnect
//! - [`stats`]: diagnostic counters
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use bytes::Bytes;
//! use feed_relay::hub::{Hub, HubConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() {
//! let hub = Arc::new(Hub::with_config(HubConfig::default().history_capacity(3)));
//! for m in ["A", "B", "C", "D"] {
//!     hub.push(Bytes::from(m));
//! }
//!
//! let lifetime = CancellationToken::new();
//! let (catchup, mut mailbox) = hub.subscribe(lifetime.clone());
//! assert_eq!(catchup, vec!["B", "C", "D"]);
//!
//! hub.push(Bytes::from("E"));
//! assert_eq!(mailbox.recv().await, Some(Bytes::from("E")));
//!
//! // Cancelling the lifetime deregisters the subscriber
//! lifetime.cancel();
//! # }
//! ```

pub mod client;
pub mod error;
pub mod history;
pub mod hub;
pub mod protocol;
pub mod server;
pub mod stats;

pub use client::{ClientConfig, IngestClient};
pub use error::{Error, Result};
pub use hub::{Hub, HubConfig, Mailbox, SubscriberId};
pub use protocol::Transport;
pub use server::{FeedServer, ServerConfig};
