//! Relay server example
//!
//! Run with: cargo run --example relay_server [BIND_ADDR] [UPSTREAM_URL]
//!
//! Examples:
//!   cargo run --example relay_server                                  # 0.0.0.0:8100, upstream ws://localhost:8000
//!   cargo run --example relay_server 127.0.0.1:9100                   # custom feed address
//!   cargo run --example relay_server 0.0.0.0:8100 ws://10.0.0.5:8000  # custom upstream
//!
//! The relay dials the upstream WebSocket, keeps the last 1024 messages, and
//! streams history followed by live messages to every consumer that connects
//! to `ws://BIND_ADDR/feed`. Try it with the `feed_tail` example as a consumer.
//!
//! Set `RUST_LOG=feed_relay=debug` to see per-subscriber lifecycle events.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use feed_relay::client::config::DEFAULT_UPSTREAM_ADDR;
use feed_relay::client::{ClientConfig, IngestClient};
use feed_relay::hub::{Hub, HubConfig};
use feed_relay::server::{FeedServer, ServerConfig};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("feed_relay=info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let bind_addr: SocketAddr = args
        .next()
        .unwrap_or_else(|| "0.0.0.0:8100".to_string())
        .parse()?;
    let upstream_addr = args
        .next()
        .unwrap_or_else(|| DEFAULT_UPSTREAM_ADDR.to_string());

    let hub = Arc::new(Hub::with_config(HubConfig::default()));
    let shutdown = CancellationToken::new();

    let (ingest, mut events) = IngestClient::new(ClientConfig::new(upstream_addr), Arc::clone(&hub));
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            tracing::debug!(event = ?event, "Ingest event");
        }
    });

    let ingest_task = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { ingest.run_until(shutdown.cancelled_owned()).await })
    };

    let stats_task = {
        let hub = Arc::clone(&hub);
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(30));
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let stats = hub.stats();
                        tracing::info!(
                            subscribers = stats.subscribers,
                            retained = stats.retained,
                            pushed = stats.pushed,
                            dropped = stats.dropped,
                            drop_rate = %format!("{:.1}%", stats.drop_rate()),
                            "Hub stats"
                        );
                    }
                }
            }
        })
    };

    let server = FeedServer::new(ServerConfig::with_addr(bind_addr), hub);
    let signal = shutdown.clone();
    server
        .run_until(async move {
            let _ = tokio::signal::ctrl_c().await;
            signal.cancel();
        })
        .await?;

    shutdown.cancel();
    let _ = ingest_task.await;
    let _ = stats_task.await;

    let stats = server.stats();
    println!(
        "Served {} connections, {} messages, {} bytes",
        stats.total_connections, stats.messages_sent, stats.bytes_sent
    );

    Ok(())
}
