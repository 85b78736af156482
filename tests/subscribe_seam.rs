//! Concurrency tests for the replay/live seam
//!
//! Subscribers attach while a producer thread is pushing. Every subscriber
//! must see a contiguous prefix of the stream in its snapshot, and the first
//! live message must be the one right after that prefix.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use feed_relay::hub::{Hub, HubConfig};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

const MESSAGES: u32 = 5_000;
const SUBSCRIBERS: u32 = 32;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn encode(n: u32) -> Bytes {
    Bytes::copy_from_slice(&n.to_be_bytes())
}

fn decode(msg: &Bytes) -> u32 {
    u32::from_be_bytes([msg[0], msg[1], msg[2], msg[3]])
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn snapshot_and_live_meet_without_gap_or_duplicate() {
    init_tracing();

    // History large enough that nothing is evicted: the snapshot is exactly
    // the prefix pushed before registration.
    let hub = Arc::new(Hub::with_config(
        HubConfig::default().history_capacity(MESSAGES as usize),
    ));

    let producer = {
        let hub = Arc::clone(&hub);
        tokio::task::spawn_blocking(move || {
            for i in 0..MESSAGES {
                hub.push(encode(i));
                if i % 64 == 0 {
                    std::thread::sleep(Duration::from_micros(200));
                }
            }
        })
    };

    let mut consumers = Vec::new();
    for n in 0..SUBSCRIBERS {
        let hub = Arc::clone(&hub);
        consumers.push(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_micros(300 * n as u64)).await;

            let (catchup, mut mailbox) = hub.subscribe(CancellationToken::new());

            let replayed: Vec<u32> = catchup.iter().map(decode).collect();
            let expected: Vec<u32> = (0..replayed.len() as u32).collect();
            assert_eq!(replayed, expected, "snapshot is not a contiguous prefix");

            let next = replayed.len() as u32;
            if next == MESSAGES {
                return;
            }

            // The mailbox is empty at registration, so the very next push
            // is always delivered.
            let first = tokio::time::timeout(Duration::from_secs(10), mailbox.recv())
                .await
                .expect("no live message after subscribe")
                .expect("mailbox closed");
            assert_eq!(decode(&first), next, "gap or duplicate at the seam");

            // Later deliveries may skip but never go backwards
            let mut last = next;
            while let Ok(Some(msg)) =
                tokio::time::timeout(Duration::from_millis(200), mailbox.recv()).await
            {
                let value = decode(&msg);
                assert!(value > last, "out of order: {} after {}", value, last);
                last = value;
                if value == MESSAGES - 1 {
                    break;
                }
            }
        }));
    }

    producer.await.unwrap();
    for consumer in consumers {
        consumer.await.unwrap();
    }

    // Every mailbox was dropped at the end of its task
    assert_eq!(hub.subscriber_count(), 0);
    assert_eq!(hub.stats().pushed, MESSAGES as u64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_subscribe_and_cancel_leaves_empty_registry() {
    init_tracing();

    let hub = Arc::new(Hub::with_config(HubConfig::default().history_capacity(16)));
    let stop = CancellationToken::new();

    let producer = {
        let hub = Arc::clone(&hub);
        let stop = stop.clone();
        tokio::spawn(async move {
            let mut i = 0u32;
            while !stop.is_cancelled() {
                hub.push(encode(i));
                i = i.wrapping_add(1);
                tokio::task::yield_now().await;
            }
        })
    };

    let mut tasks = Vec::new();
    let mut mailboxes = Vec::new();
    let mut tokens = Vec::new();
    for _ in 0..128 {
        let token = CancellationToken::new();
        let (_, mailbox) = hub.subscribe(token.clone());
        mailboxes.push(mailbox);
        tokens.push(token);
    }
    assert_eq!(hub.subscriber_count(), 128);

    for token in tokens {
        tasks.push(tokio::spawn(async move {
            tokio::task::yield_now().await;
            token.cancel();
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let mut remaining = hub.subscriber_count();
    for _ in 0..400 {
        if remaining == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
        remaining = hub.subscriber_count();
    }
    assert_eq!(remaining, 0);

    // Cancelled mailboxes end after at most one pending message
    for mut mailbox in mailboxes {
        let _ = mailbox.try_recv();
        assert_eq!(mailbox.recv().await, None);
    }

    stop.cancel();
    producer.await.unwrap();
}
