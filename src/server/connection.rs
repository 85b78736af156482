//! Per-consumer feed connection
//!
//! Upgrades the socket when the transport asks for it, subscribes to the hub,
//! writes the catch-up snapshot, then streams live messages until the
//! consumer goes away or the server shuts down. Whatever ends the connection
//! cancels its lifetime token, which deregisters the subscriber from the hub.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::hub::Hub;
use crate::protocol::{websocket, write_frame, Transport};
use crate::stats::{ServerCounters, SessionStats};

use super::config::ServerConfig;

/// Why a feed connection ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The consumer closed its side of the connection
    PeerClosed,
    /// The server is shutting down
    Shutdown,
    /// The hub released the subscriber
    Unsubscribed,
}

/// Consumer end of a feed connection
enum Peer {
    Framed {
        reader: OwnedReadHalf,
        writer: OwnedWriteHalf,
        discard: Vec<u8>,
    },
    WebSocket(WebSocketStream<TcpStream>),
}

impl Peer {
    async fn send(&mut self, msg: &Bytes) -> Result<()> {
        match self {
            Peer::Framed { writer, .. } => write_frame(writer, msg).await,
            Peer::WebSocket(ws) => Ok(ws.send(websocket::to_message(msg)).await?),
        }
    }

    /// Resolves once the consumer hangs up
    ///
    /// Consumers are not expected to send anything; inbound data is discarded.
    async fn closed(&mut self) -> Result<()> {
        match self {
            Peer::Framed {
                reader, discard, ..
            } => loop {
                if reader.read(&mut discard[..]).await? == 0 {
                    return Ok(());
                }
            },
            Peer::WebSocket(ws) => loop {
                match ws.next().await {
                    None | Some(Ok(Message::Close(_))) => return Ok(()),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                }
            },
        }
    }

    async fn shutdown(&mut self) -> Result<()> {
        match self {
            Peer::Framed { writer, .. } => Ok(writer.shutdown().await?),
            Peer::WebSocket(ws) => Ok(ws.close(None).await?),
        }
    }
}

pub(super) struct Connection {
    session_id: u64,
    peer_addr: SocketAddr,
    config: ServerConfig,
    hub: Arc<Hub>,
    counters: Arc<ServerCounters>,
    shutdown: CancellationToken,
    stats: SessionStats,
}

impl Connection {
    pub(super) fn new(
        session_id: u64,
        peer_addr: SocketAddr,
        config: ServerConfig,
        hub: Arc<Hub>,
        counters: Arc<ServerCounters>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            session_id,
            peer_addr,
            config,
            hub,
            counters,
            shutdown,
            stats: SessionStats::new(),
        }
    }

    pub(super) async fn run(mut self, socket: TcpStream) -> Result<CloseReason> {
        let mut peer = self.open(socket).await?;

        let lifetime = self.shutdown.child_token();
        let _lifetime_guard = lifetime.clone().drop_guard();

        let (catchup, mut mailbox) = self.hub.subscribe(lifetime.clone());

        tracing::debug!(
            session_id = self.session_id,
            peer = %self.peer_addr,
            subscriber = %mailbox.id(),
            transport = %self.config.transport,
            catchup_messages = catchup.len(),
            "Feed started"
        );

        for msg in &catchup {
            self.send(&mut peer, msg).await?;
            self.stats.catchup_messages += 1;
        }

        let reason = loop {
            tokio::select! {
                _ = lifetime.cancelled() => break CloseReason::Shutdown,
                msg = mailbox.recv() => match msg {
                    Some(msg) => {
                        self.send(&mut peer, &msg).await?;
                        self.stats.live_messages += 1;
                    }
                    None => break CloseReason::Unsubscribed,
                },
                closed = peer.closed() => {
                    closed?;
                    break CloseReason::PeerClosed;
                }
            }
        };

        // Best effort: the consumer may already be gone
        let timeout = self.config.write_timeout;
        let _ = tokio::time::timeout(timeout, peer.shutdown()).await;

        tracing::debug!(
            session_id = self.session_id,
            peer = %self.peer_addr,
            reason = ?reason,
            catchup_messages = self.stats.catchup_messages,
            live_messages = self.stats.live_messages,
            bytes_sent = self.stats.bytes_sent,
            duration_ms = self.stats.duration().as_millis() as u64,
            "Feed ended"
        );

        Ok(reason)
    }

    async fn open(&self, socket: TcpStream) -> Result<Peer> {
        match self.config.transport {
            Transport::Framed => {
                let (reader, writer) = socket.into_split();
                Ok(Peer::Framed {
                    reader,
                    writer,
                    discard: vec![0u8; self.config.read_buffer_size.max(1)],
                })
            }
            Transport::WebSocket => {
                let feed_path = self.config.feed_path.clone();
                let check_path = move |req: &Request, resp: Response| {
                    if req.uri().path() == feed_path {
                        return Ok(resp);
                    }
                    let mut rejection = ErrorResponse::new(Some("Not found".to_string()));
                    *rejection.status_mut() = StatusCode::NOT_FOUND;
                    Err(rejection)
                };

                let timeout = self.config.handshake_timeout;
                let upgrade = tokio_tungstenite::accept_hdr_async(socket, check_path);
                let ws = tokio::time::timeout(timeout, upgrade)
                    .await
                    .map_err(|_| Error::Timeout(timeout))??;

                Ok(Peer::WebSocket(ws))
            }
        }
    }

    async fn send(&mut self, peer: &mut Peer, msg: &Bytes) -> Result<()> {
        let timeout = self.config.write_timeout;
        tokio::time::timeout(timeout, peer.send(msg))
            .await
            .map_err(|_| Error::Timeout(timeout))??;

        self.stats.bytes_sent += msg.len() as u64;
        self.counters.message_sent(msg.len());
        Ok(())
    }
}
