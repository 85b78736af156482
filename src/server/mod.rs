//! Downstream feed server
//!
//! Accepts consumer connections and streams the hub to each of them: first the
//! retained history, then live messages. Consumers upgrade to WebSocket on the
//! feed path (`/feed` by default) or, with [`Transport::Framed`], read
//! length-prefixed frames straight off the socket.
//!
//! [`Transport::Framed`]: crate::protocol::Transport::Framed

pub mod config;
pub mod connection;
pub mod listener;

pub use config::ServerConfig;
pub use connection::CloseReason;
pub use listener::FeedServer;
