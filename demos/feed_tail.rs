//! Feed consumer example
//!
//! Run with: cargo run --example feed_tail [FEED_URL]
//!
//! Connects to a relay (default ws://127.0.0.1:8100/feed) and prints one line
//! per received message: its index, size, and a short prefix of the payload.

use futures_util::StreamExt;
use tokio_tungstenite::tungstenite::protocol::Message;

const PREVIEW_LEN: usize = 48;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "ws://127.0.0.1:8100/feed".to_string());

    let (mut ws, _) = tokio_tungstenite::connect_async(url.as_str()).await?;
    println!("Connected to {}", url);

    let mut count = 0u64;

    while let Some(msg) = ws.next().await {
        let payload = match msg? {
            Message::Text(text) => text.as_bytes().to_vec(),
            Message::Binary(data) => data.to_vec(),
            Message::Close(_) => break,
            _ => continue,
        };

        count += 1;
        let preview = &payload[..payload.len().min(PREVIEW_LEN)];
        println!(
            "#{:<6} {:>7} bytes  {}",
            count,
            payload.len(),
            String::from_utf8_lossy(preview)
        );
    }

    println!("Relay closed the feed after {} messages", count);
    Ok(())
}
