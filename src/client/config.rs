//! Ingest client configuration

use std::time::Duration;

use crate::protocol::{Transport, DEFAULT_MAX_FRAME_SIZE};

/// Default upstream endpoint
pub const DEFAULT_UPSTREAM_ADDR: &str = "ws://localhost:8000";

/// Ingest client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Upstream endpoint: a `ws://` URL for WebSocket, `host:port` for framed
    pub upstream_addr: String,

    /// Wire format spoken by the upstream
    pub transport: Transport,

    /// Wait between losing the upstream connection and dialing again
    pub reconnect_delay: Duration,

    /// Connection timeout, including the WebSocket handshake
    pub connect_timeout: Duration,

    /// Largest accepted upstream message
    pub max_frame_size: usize,

    /// Enable TCP_NODELAY
    pub tcp_nodelay: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            upstream_addr: DEFAULT_UPSTREAM_ADDR.to_string(),
            transport: Transport::WebSocket,
            reconnect_delay: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(10),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            tcp_nodelay: true,
        }
    }
}

impl ClientConfig {
    /// Create a config for the given upstream endpoint
    pub fn new(upstream_addr: impl Into<String>) -> Self {
        Self {
            upstream_addr: upstream_addr.into(),
            ..Default::default()
        }
    }

    /// Set the upstream transport
    pub fn transport(mut self, transport: Transport) -> Self {
        self.transport = transport;
        self
    }

    /// Set the reconnect delay
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Set the connection timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the maximum message size
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    /// Enable or disable TCP_NODELAY
    pub fn tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }
}
