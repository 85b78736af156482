//! Subscriber fan-out with catch-up replay
//!
//! The hub records every message pushed by the ingest side and relays it to
//! every live subscriber. New subscribers get a snapshot of the retained
//! history plus a mailbox for live messages.
//!
//! # Architecture
//!
//! ```text
//!                         Arc<Hub>
//!               ┌──────────────────────────────┐
//!               │ Mutex<HubState {             │
//!               │   history: HistoryBuffer,    │
//!               │   subscribers: HashMap<Id,   │
//!               │     SubscriberEntry { tx }>, │
//!               │ }>                           │
//!               └──────────────┬───────────────┘
//!                              │
//!        ┌─────────────────────┼─────────────────────┐
//!        │                     │                     │
//!        ▼                     ▼                     ▼
//!    [Ingest]             [Subscriber]          [Subscriber]
//!    hub.push()           mailbox.recv()        mailbox.recv()
//!        │                     │                     │
//!        └──► append + try_send to each mailbox ──► feed
//! ```
//!
//! # Delivery policy
//!
//! Each mailbox holds one message. `push` uses `try_send`, so a subscriber
//! that has not read its previous message simply misses the new one. The
//! producer is never slowed down by a consumer. Per subscriber, messages
//! arrive in push order with possible gaps, never duplicated.
//!
//! # Lifecycle
//!
//! A subscriber leaves the registry on the first of: [`Hub::unsubscribe`],
//! its lifetime signal firing, or its [`Mailbox`] being dropped.

pub mod config;
pub mod entry;
pub mod mailbox;
pub mod store;

pub use config::HubConfig;
pub use entry::{SubscriberId, SubscriberStats};
pub use mailbox::{Mailbox, MAILBOX_CAPACITY};
pub use store::Hub;
