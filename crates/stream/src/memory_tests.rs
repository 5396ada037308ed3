// SPDX-License-Identifier: MIT

use super::*;
use asdlc_core::FakeClock;
use std::time::Duration;

fn wire(n: u64) -> HashMap<String, String> {
    HashMap::from([("seq".to_string(), n.to_string())])
}

#[tokio::test]
async fn publish_then_read_group_returns_in_order() {
    let client = InMemoryStreamClient::new();
    client.ensure_stream("s").await.unwrap();
    client.create_group("s", "g", "0").await.unwrap();
    client.publish("s", wire(1), 1000).await.unwrap();
    client.publish("s", wire(2), 1000).await.unwrap();

    let read = client.read_group("s", "g", "c1", 10, None).await.unwrap();
    assert_eq!(read.len(), 2);
    assert_eq!(read[0].1.get("seq").unwrap(), "1");
    assert_eq!(read[1].1.get("seq").unwrap(), "2");
}

#[tokio::test]
async fn create_group_twice_returns_false_second_time() {
    let client = InMemoryStreamClient::new();
    assert!(client.create_group("s", "g", "0").await.unwrap());
    assert!(!client.create_group("s", "g", "0").await.unwrap());
}

#[tokio::test]
async fn read_group_does_not_redeliver_acked_entries() {
    let client = InMemoryStreamClient::new();
    client.create_group("s", "g", "0").await.unwrap();
    let id = client.publish("s", wire(1), 1000).await.unwrap();

    let first = client.read_group("s", "g", "c1", 10, None).await.unwrap();
    assert_eq!(first.len(), 1);
    assert!(client.ack("s", "g", &id).await.unwrap());

    let second = client.read_group("s", "g", "c1", 10, None).await.unwrap();
    assert!(second.is_empty());
}

#[tokio::test]
async fn publish_trims_to_max_len() {
    let client = InMemoryStreamClient::new();
    for i in 0..5 {
        client.publish("s", wire(i), 3).await.unwrap();
    }
    let info = client.stream_info("s").await.unwrap();
    assert_eq!(info.length, 3);
}

#[tokio::test]
async fn pending_reflects_unacked_entries_and_idle_time() {
    let clock = FakeClock::new();
    let client = InMemoryStreamClient::with_clock(clock.clone());
    client.create_group("s", "g", "0").await.unwrap();
    client.publish("s", wire(1), 1000).await.unwrap();
    client.read_group("s", "g", "c1", 10, None).await.unwrap();

    clock.advance(Duration::from_millis(90_000));
    let pending = client.pending("s", "g", 100, None).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert!(pending[0].time_since_delivered_ms >= 90_000);
}

#[tokio::test]
async fn claim_respects_min_idle_threshold() {
    let clock = FakeClock::new();
    let client = InMemoryStreamClient::with_clock(clock.clone());
    client.create_group("s", "g", "0").await.unwrap();
    let id = client.publish("s", wire(1), 1000).await.unwrap();
    client.read_group("s", "g", "c1", 10, None).await.unwrap();

    let too_soon = client.claim("s", "g", "c2", 60_000, &[id.clone()]).await.unwrap();
    assert!(too_soon.is_empty());

    clock.advance(Duration::from_millis(60_000));
    let claimed = client.claim("s", "g", "c2", 60_000, &[id]).await.unwrap();
    assert_eq!(claimed.len(), 1);

    let pending = client.pending("s", "g", 100, Some("c2")).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].times_delivered, 2);
}

#[tokio::test]
async fn stream_info_soft_fails_to_zero_for_unknown_stream() {
    let client = InMemoryStreamClient::new();
    let info = client.stream_info("never-created").await.unwrap();
    assert_eq!(info, StreamInfo::default());
}
