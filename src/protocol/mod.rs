//! Wire formats for feed connections
//!
//! Messages are opaque to the relay, so the wire only has to delimit them.
//! Two transports are supported, on both the ingest side (upstream to relay)
//! and the feed side (relay to downstream consumers):
//!
//! - [`Transport::WebSocket`]: one data message per payload, text when the
//!   payload is UTF-8 and binary otherwise
//! - [`Transport::Framed`]: plain TCP with a length prefix per payload
//!
//! ```text
//! +----------------------+---------------------+
//! | length (u32, BE)     | payload             |
//! | 4 bytes              | `length` bytes      |
//! +----------------------+---------------------+
//! ```

pub mod constants;
pub mod frame;
pub mod transport;
pub mod websocket;

pub use constants::{DEFAULT_MAX_FRAME_SIZE, FRAME_HEADER_SIZE};
pub use frame::{decode_frame, encode_frame, write_frame, FrameReader};
pub use transport::Transport;
pub use websocket::DEFAULT_FEED_PATH;
