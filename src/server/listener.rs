//! Feed server listener
//!
//! Handles the TCP accept loop and spawns one feed connection per consumer.
//! Each `serve` call owns a fresh shutdown token for the connections it
//! spawned, so a server can be served again after a shutdown.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::hub::Hub;
use crate::server::config::ServerConfig;
use crate::server::connection::Connection;
use crate::stats::{ServerCounters, ServerStats};

/// Downstream feed server
///
/// Every accepted connection receives the hub's retained history followed by
/// live messages, one WebSocket message (or length-prefixed frame) each.
pub struct FeedServer {
    config: ServerConfig,
    hub: Arc<Hub>,
    next_session_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
    counters: Arc<ServerCounters>,
}

impl FeedServer {
    /// Create a new server relaying from `hub`
    pub fn new(config: ServerConfig, hub: Arc<Hub>) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Self {
            config,
            hub,
            next_session_id: AtomicU64::new(1),
            connection_semaphore,
            counters: Arc::new(ServerCounters::new()),
        }
    }

    /// Get a reference to the hub
    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// Server-wide statistics
    pub fn stats(&self) -> ServerStats {
        self.counters.snapshot()
    }

    /// Run the server
    ///
    /// Returns an error if binding fails; otherwise serves forever.
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(
            addr = %self.config.bind_addr,
            transport = %self.config.transport,
            "Feed server listening"
        );

        let connections = CancellationToken::new();
        let _connections_guard = connections.clone().drop_guard();

        self.accept_loop(&listener, &connections).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(
            addr = %self.config.bind_addr,
            transport = %self.config.transport,
            "Feed server listening"
        );

        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` completes
    ///
    /// Open feed connections are closed on shutdown.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let connections = CancellationToken::new();

        let result = tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop(&listener, &connections) => result,
        };

        connections.cancel();

        result
    }

    async fn accept_loop(
        &self,
        listener: &TcpListener,
        connections: &CancellationToken,
    ) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr, connections);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    fn handle_connection(
        &self,
        socket: TcpStream,
        peer_addr: SocketAddr,
        connections: &CancellationToken,
    ) {
        // Check connection limit
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    self.counters.connection_rejected();
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            session_id = session_id,
            peer = %peer_addr,
            "New connection"
        );

        if let Err(e) = self.configure_socket(&socket) {
            tracing::error!(error = %e, "Failed to configure socket");
            return;
        }

        let connection = Connection::new(
            session_id,
            peer_addr,
            self.config.clone(),
            Arc::clone(&self.hub),
            Arc::clone(&self.counters),
            connections.clone(),
        );
        let counters = Arc::clone(&self.counters);

        counters.connection_opened();
        tokio::spawn(async move {
            let _permit = permit;

            match connection.run(socket).await {
                Ok(reason) => {
                    tracing::debug!(session_id = session_id, reason = ?reason, "Connection closed");
                }
                Err(e) if e.is_disconnect() => {
                    tracing::debug!(session_id = session_id, error = %e, "Consumer disconnected");
                }
                Err(e) => {
                    tracing::warn!(session_id = session_id, error = %e, "Connection error");
                }
            }

            counters.connection_closed();
        });
    }

    fn configure_socket(&self, socket: &TcpStream) -> std::io::Result<()> {
        if self.config.tcp_nodelay {
            socket.set_nodelay(true)?;
        }

        Ok(())
    }
}
