//! End-to-end relay tests over loopback TCP
//!
//! upstream ──messages──► IngestClient ──push──► Hub ──► FeedServer ──messages──► consumer

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use feed_relay::client::{ClientConfig, IngestClient, IngestEvent};
use feed_relay::hub::{Hub, HubConfig};
use feed_relay::protocol::{encode_frame, FrameReader, Transport, DEFAULT_MAX_FRAME_SIZE};
use feed_relay::server::{FeedServer, ServerConfig};
use futures_util::{SinkExt, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

const TIMEOUT: Duration = Duration::from_secs(5);

type Consumer = WebSocketStream<MaybeTlsStream<TcpStream>>;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Serve `server` on an ephemeral port until the returned token is cancelled
async fn serve(server: Arc<FeedServer>) -> (SocketAddr, CancellationToken) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            server
                .serve(listener, shutdown.cancelled_owned())
                .await
                .unwrap();
        });
    }

    (addr, shutdown)
}

/// Start a feed server on an ephemeral port
async fn start_server(
    hub: Arc<Hub>,
    config: ServerConfig,
) -> (Arc<FeedServer>, SocketAddr, CancellationToken) {
    let server = Arc::new(FeedServer::new(config, hub));
    let (addr, shutdown) = serve(Arc::clone(&server)).await;
    (server, addr, shutdown)
}

async fn connect(addr: SocketAddr) -> Consumer {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/feed", addr))
        .await
        .unwrap();
    ws
}

/// Next data message, or `None` once the relay closes the feed
async fn next_message(consumer: &mut Consumer) -> Option<Bytes> {
    loop {
        let msg = tokio::time::timeout(TIMEOUT, consumer.next())
            .await
            .expect("timed out waiting for message");
        match msg {
            None | Some(Ok(Message::Close(_))) => return None,
            Some(Ok(Message::Text(text))) => return Some(Bytes::from(text)),
            Some(Ok(Message::Binary(data))) => return Some(Bytes::from(data)),
            Some(Ok(_)) => {}
            Some(Err(e)) => panic!("consumer read failed: {}", e),
        }
    }
}

async fn next_frame(reader: &mut FrameReader<TcpStream>) -> Option<Bytes> {
    tokio::time::timeout(TIMEOUT, reader.read_frame())
        .await
        .expect("timed out waiting for frame")
        .unwrap()
}

async fn wait_until<F: Fn() -> bool>(condition: F) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(condition(), "condition not reached in time");
}

#[tokio::test]
async fn consumer_receives_history_then_live() {
    init_tracing();

    let hub = Arc::new(Hub::with_config(HubConfig::default().history_capacity(3)));
    for m in ["A", "B", "C", "D"] {
        hub.push(Bytes::from(m));
    }

    let (server, addr, shutdown) = start_server(Arc::clone(&hub), ServerConfig::default()).await;
    let mut consumer = connect(addr).await;

    assert_eq!(next_message(&mut consumer).await.unwrap(), "B");
    assert_eq!(next_message(&mut consumer).await.unwrap(), "C");
    assert_eq!(next_message(&mut consumer).await.unwrap(), "D");

    wait_until(|| hub.subscriber_count() == 1).await;
    hub.push(Bytes::from("E"));
    assert_eq!(next_message(&mut consumer).await.unwrap(), "E");

    wait_until(|| server.stats().messages_sent == 4).await;
    let stats = server.stats();
    assert_eq!(stats.total_connections, 1);
    assert_eq!(stats.active_connections, 1);
    assert_eq!(stats.bytes_sent, 4);

    shutdown.cancel();
    assert_eq!(next_message(&mut consumer).await, None);
    wait_until(|| hub.subscriber_count() == 0).await;
}

#[tokio::test]
async fn binary_payloads_arrive_as_binary_messages() {
    init_tracing();

    let hub = Arc::new(Hub::new());
    let (_server, addr, _shutdown) = start_server(Arc::clone(&hub), ServerConfig::default()).await;
    let mut consumer = connect(addr).await;
    wait_until(|| hub.subscriber_count() == 1).await;

    hub.push(Bytes::from_static(&[0xff, 0xfe, 0x00]));
    let msg = tokio::time::timeout(TIMEOUT, consumer.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(msg.is_binary());
    assert_eq!(msg.into_data(), vec![0xff, 0xfe, 0x00]);
}

#[tokio::test]
async fn consumer_disconnect_releases_subscriber() {
    init_tracing();

    let hub = Arc::new(Hub::new());
    let (server, addr, _shutdown) = start_server(Arc::clone(&hub), ServerConfig::default()).await;

    let mut consumer = connect(addr).await;
    wait_until(|| hub.subscriber_count() == 1).await;

    consumer.close(None).await.unwrap();
    drop(consumer);
    wait_until(|| hub.subscriber_count() == 0).await;
    wait_until(|| server.stats().active_connections == 0).await;

    // Pushing after the consumer left is still fine
    hub.push(Bytes::from("after"));
    assert_eq!(hub.len(), 1);
}

#[tokio::test]
async fn unknown_path_is_refused() {
    init_tracing();

    let hub = Arc::new(Hub::new());
    let (_server, addr, _shutdown) = start_server(Arc::clone(&hub), ServerConfig::default()).await;

    let result = tokio_tungstenite::connect_async(format!("ws://{}/other", addr)).await;
    assert!(result.is_err());
    assert_eq!(hub.subscriber_count(), 0);
}

#[tokio::test]
async fn connection_limit_rejects_extra_consumers() {
    init_tracing();

    let hub = Arc::new(Hub::new());
    let config = ServerConfig::default().max_connections(1);
    let (server, addr, _shutdown) = start_server(Arc::clone(&hub), config).await;

    let _first = connect(addr).await;
    wait_until(|| hub.subscriber_count() == 1).await;

    // The rejected socket is closed before the upgrade
    let second = tokio_tungstenite::connect_async(format!("ws://{}/feed", addr)).await;
    assert!(second.is_err());

    assert_eq!(server.stats().rejected_connections, 1);
    assert_eq!(hub.subscriber_count(), 1);
}

#[tokio::test]
async fn server_can_serve_again_after_shutdown() {
    init_tracing();

    let hub = Arc::new(Hub::new());
    hub.push(Bytes::from("kept"));
    let server = Arc::new(FeedServer::new(ServerConfig::default(), Arc::clone(&hub)));

    let (addr, shutdown) = serve(Arc::clone(&server)).await;
    let mut consumer = connect(addr).await;
    assert_eq!(next_message(&mut consumer).await.unwrap(), "kept");
    shutdown.cancel();
    assert_eq!(next_message(&mut consumer).await, None);

    // A second run must not inherit the first run's shutdown
    let (addr, _shutdown) = serve(Arc::clone(&server)).await;
    let mut consumer = connect(addr).await;
    assert_eq!(next_message(&mut consumer).await.unwrap(), "kept");

    wait_until(|| hub.subscriber_count() == 1).await;
    hub.push(Bytes::from("live"));
    assert_eq!(next_message(&mut consumer).await.unwrap(), "live");
    assert_eq!(server.stats().total_connections, 2);
}

#[tokio::test]
async fn ingest_relays_upstream_and_reconnects() {
    init_tracing();

    let upstream = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let upstream_addr = upstream.local_addr().unwrap();

    // Upstream serves two short sessions, closing after each
    tokio::spawn(async move {
        for session in [["u1", "u2"], ["u3", "u4"]] {
            let (socket, _) = upstream.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
            for payload in session {
                ws.send(Message::Text(payload.to_string().into()))
                    .await
                    .unwrap();
            }
            ws.close(None).await.unwrap();
        }
    });

    let hub = Arc::new(Hub::new());
    let config = ClientConfig::new(format!("ws://{}", upstream_addr))
        .reconnect_delay(Duration::from_millis(50));
    let (client, mut events) = IngestClient::new(config, Arc::clone(&hub));
    let client = Arc::new(client);

    let stop = CancellationToken::new();
    let ingest = {
        let client = Arc::clone(&client);
        let stop = stop.clone();
        tokio::spawn(async move { client.run_until(stop.cancelled_owned()).await })
    };

    wait_until(|| hub.len() == 4).await;
    assert_eq!(hub.snapshot(), vec!["u1", "u2", "u3", "u4"]);

    assert_eq!(events.recv().await, Some(IngestEvent::Connected));
    assert_eq!(events.recv().await, Some(IngestEvent::Closed));
    assert_eq!(events.recv().await, Some(IngestEvent::Connected));

    let stats = client.stats();
    assert!(stats.connections >= 2);
    assert_eq!(stats.messages_received, 4);

    stop.cancel();
    tokio::time::timeout(TIMEOUT, ingest).await.unwrap().unwrap();
}

#[tokio::test]
async fn full_pipeline() {
    init_tracing();

    let upstream = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let upstream_addr = upstream.local_addr().unwrap();
    let (payloads_tx, mut payloads_rx) = tokio::sync::mpsc::channel::<&'static str>(8);

    // Upstream forwards whatever the test hands it
    tokio::spawn(async move {
        let (socket, _) = upstream.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
        while let Some(payload) = payloads_rx.recv().await {
            ws.send(Message::Text(payload.to_string().into()))
                .await
                .unwrap();
        }
    });

    let hub = Arc::new(Hub::with_config(HubConfig::default().history_capacity(8)));
    let config = ClientConfig::new(format!("ws://{}", upstream_addr));
    let (client, _events) = IngestClient::new(config, Arc::clone(&hub));
    tokio::spawn(async move { client.run().await });

    payloads_tx.send(r#"{"post":1}"#).await.unwrap();
    wait_until(|| hub.len() == 1).await;

    let (_server, addr, shutdown) = start_server(Arc::clone(&hub), ServerConfig::default()).await;
    let mut consumer = connect(addr).await;
    assert_eq!(next_message(&mut consumer).await.unwrap(), r#"{"post":1}"#);

    wait_until(|| hub.subscriber_count() == 1).await;
    payloads_tx.send(r#"{"post":2}"#).await.unwrap();
    assert_eq!(next_message(&mut consumer).await.unwrap(), r#"{"post":2}"#);

    shutdown.cancel();
}

#[tokio::test]
async fn framed_pipeline() {
    init_tracing();

    let upstream = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let upstream_addr = upstream.local_addr().unwrap();
    let (payloads_tx, mut payloads_rx) = tokio::sync::mpsc::channel::<&'static str>(8);

    tokio::spawn(async move {
        let (mut socket, _) = upstream.accept().await.unwrap();
        while let Some(payload) = payloads_rx.recv().await {
            let mut wire = BytesMut::new();
            encode_frame(payload.as_bytes(), &mut wire);
            socket.write_all(&wire).await.unwrap();
        }
    });

    let hub = Arc::new(Hub::with_config(HubConfig::default().history_capacity(8)));
    let config = ClientConfig::new(upstream_addr.to_string()).transport(Transport::Framed);
    let (client, _events) = IngestClient::new(config, Arc::clone(&hub));
    tokio::spawn(async move { client.run().await });

    payloads_tx.send("early").await.unwrap();
    wait_until(|| hub.len() == 1).await;

    let config = ServerConfig::default().transport(Transport::Framed);
    let (_server, addr, shutdown) = start_server(Arc::clone(&hub), config).await;
    let socket = TcpStream::connect(addr).await.unwrap();
    let mut consumer = FrameReader::new(socket, DEFAULT_MAX_FRAME_SIZE);
    assert_eq!(next_frame(&mut consumer).await.unwrap(), "early");

    wait_until(|| hub.subscriber_count() == 1).await;
    payloads_tx.send("live").await.unwrap();
    assert_eq!(next_frame(&mut consumer).await.unwrap(), "live");

    shutdown.cancel();
    assert_eq!(next_frame(&mut consumer).await, None);
}
