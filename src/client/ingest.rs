//! Upstream ingest loop
//!
//! High-level API for feeding the hub from an upstream WebSocket or framed
//! TCP source.

use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::{Message, WebSocketConfig};

use crate::error::{Error, Result};
use crate::hub::Hub;
use crate::protocol::{websocket, FrameReader, Transport};
use crate::stats::{IngestCounters, IngestStats};

use super::config::ClientConfig;

/// Events from the ingest client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestEvent {
    /// Connected to upstream
    Connected,

    /// Upstream closed the connection cleanly
    Closed,

    /// Connection attempt or read failed
    Error(String),
}

/// Upstream ingest client
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use feed_relay::client::{ClientConfig, IngestClient};
/// use feed_relay::hub::Hub;
///
/// # async fn example() {
/// let hub = Arc::new(Hub::new());
/// let config = ClientConfig::new("ws://localhost:8000");
/// let (client, mut events) = IngestClient::new(config, hub);
///
/// tokio::spawn(async move {
///     while let Some(event) = events.recv().await {
///         println!("Event: {:?}", event);
///     }
/// });
///
/// // Reconnects forever
/// client.run().await;
/// # }
/// ```
pub struct IngestClient {
    config: ClientConfig,
    hub: Arc<Hub>,
    event_tx: mpsc::Sender<IngestEvent>,
    counters: IngestCounters,
}

impl IngestClient {
    /// Create a new ingest client.
    ///
    /// Returns the client and a receiver for events. Events are dropped when
    /// the receiver falls behind; ingest never waits on it.
    pub fn new(config: ClientConfig, hub: Arc<Hub>) -> (Self, mpsc::Receiver<IngestEvent>) {
        let (tx, rx) = mpsc::channel(64);

        let client = Self {
            config,
            hub,
            event_tx: tx,
            counters: IngestCounters::default(),
        };

        (client, rx)
    }

    /// Upstream ingest statistics
    pub fn stats(&self) -> IngestStats {
        self.counters.snapshot()
    }

    /// Connect once and push messages until upstream goes away
    ///
    /// Returns `Ok(())` when upstream closes the connection cleanly.
    pub async fn run_once(&self) -> Result<()> {
        self.counters.connect_attempted();

        match self.config.transport {
            Transport::WebSocket => self.ingest_websocket().await,
            Transport::Framed => self.ingest_framed().await,
        }
    }

    async fn ingest_websocket(&self) -> Result<()> {
        let mut ws_config = WebSocketConfig::default();
        ws_config.max_message_size = Some(self.config.max_frame_size);
        ws_config.max_frame_size = Some(self.config.max_frame_size);

        let timeout = self.config.connect_timeout;
        let connect = tokio_tungstenite::connect_async_with_config(
            self.config.upstream_addr.as_str(),
            Some(ws_config),
            self.config.tcp_nodelay,
        );
        let (mut ws, _response) = tokio::time::timeout(timeout, connect)
            .await
            .map_err(|_| Error::Timeout(timeout))??;

        self.on_connected();

        while let Some(msg) = ws.next().await {
            match msg? {
                Message::Close(_) => break,
                msg => {
                    if let Some(payload) = websocket::into_payload(msg) {
                        self.accept(payload);
                    }
                }
            }
        }

        Ok(())
    }

    async fn ingest_framed(&self) -> Result<()> {
        let timeout = self.config.connect_timeout;
        let connect = TcpStream::connect(self.config.upstream_addr.as_str());
        let socket = tokio::time::timeout(timeout, connect)
            .await
            .map_err(|_| Error::Timeout(timeout))??;

        if self.config.tcp_nodelay {
            socket.set_nodelay(true)?;
        }

        self.on_connected();

        let mut reader = FrameReader::new(socket, self.config.max_frame_size);
        while let Some(msg) = reader.read_frame().await? {
            self.accept(msg);
        }

        Ok(())
    }

    fn on_connected(&self) {
        self.counters.connected();
        self.emit(IngestEvent::Connected);
        tracing::info!(
            upstream = %self.config.upstream_addr,
            transport = %self.config.transport,
            "Connected to upstream"
        );
    }

    fn accept(&self, msg: Bytes) {
        self.counters.message_received(msg.len());
        self.hub.push(msg);
    }

    /// Ingest forever, reconnecting after every failure or upstream close
    pub async fn run(&self) {
        loop {
            match self.run_once().await {
                Ok(()) => {
                    self.emit(IngestEvent::Closed);
                    tracing::error!(
                        upstream = %self.config.upstream_addr,
                        "Upstream ingest exited prematurely"
                    );
                }
                Err(e) => {
                    self.emit(IngestEvent::Error(e.to_string()));
                    tracing::error!(
                        upstream = %self.config.upstream_addr,
                        error = %e,
                        "Upstream ingest failed"
                    );
                }
            }

            tokio::time::sleep(self.config.reconnect_delay).await;
        }
    }

    /// Ingest until `shutdown` completes
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            _ = shutdown => {
                tracing::info!(upstream = %self.config.upstream_addr, "Ingest stopped");
            }
            _ = self.run() => {}
        }
    }

    fn emit(&self, event: IngestEvent) {
        let _ = self.event_tx.try_send(event);
    }
}
