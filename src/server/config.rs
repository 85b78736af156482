//! Feed server configuration

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use crate::protocol::{Transport, DEFAULT_FEED_PATH};

/// Default port for downstream consumers
pub const DEFAULT_FEED_PORT: u16 = 8100;

/// Feed server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Wire format spoken to consumers
    pub transport: Transport,

    /// Request path accepted for the WebSocket upgrade
    pub feed_path: String,

    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// Give up on a consumer whose WebSocket upgrade takes longer than this
    pub handshake_timeout: Duration,

    /// Give up on a consumer whose single message write takes longer than this
    pub write_timeout: Duration,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,

    /// Size of the buffer used to drain bytes sent by framed consumers
    pub read_buffer_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, DEFAULT_FEED_PORT)),
            transport: Transport::WebSocket,
            feed_path: DEFAULT_FEED_PATH.to_string(),
            max_connections: 0, // Unlimited
            handshake_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(10),
            tcp_nodelay: true, // Important for low latency
            read_buffer_size: 1024,
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the consumer transport
    pub fn transport(mut self, transport: Transport) -> Self {
        self.transport = transport;
        self
    }

    /// Set the WebSocket upgrade path
    pub fn feed_path(mut self, path: impl Into<String>) -> Self {
        self.feed_path = path.into();
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set handshake timeout
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set write timeout
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Enable or disable TCP_NODELAY
    pub fn tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }

    /// Set the drain buffer size for framed consumers
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.bind_addr.port(), 8100);
        assert_eq!(config.transport, Transport::WebSocket);
        assert_eq!(config.feed_path, "/feed");
        assert_eq!(config.max_connections, 0);
        assert_eq!(config.write_timeout, Duration::from_secs(10));
        assert!(config.tcp_nodelay);
        assert_eq!(config.read_buffer_size, 1024);
    }

    #[test]
    fn test_with_addr() {
        let addr: SocketAddr = "127.0.0.1:8101".parse().unwrap();
        let config = ServerConfig::with_addr(addr);

        assert_eq!(config.bind_addr.port(), 8101);
    }

    #[test]
    fn test_builder_chaining() {
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let config = ServerConfig::default()
            .bind(addr)
            .transport(Transport::Framed)
            .feed_path("/live")
            .max_connections(50)
            .handshake_timeout(Duration::from_secs(1))
            .write_timeout(Duration::from_secs(2))
            .tcp_nodelay(false)
            .read_buffer_size(64);

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.transport, Transport::Framed);
        assert_eq!(config.feed_path, "/live");
        assert_eq!(config.max_connections, 50);
        assert_eq!(config.handshake_timeout, Duration::from_secs(1));
        assert_eq!(config.write_timeout, Duration::from_secs(2));
        assert!(!config.tcp_nodelay);
        assert_eq!(config.read_buffer_size, 64);
    }
}
