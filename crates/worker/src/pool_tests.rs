// SPDX-License-Identifier: MIT

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use asdlc_core::{AgentContext, AgentHandler, AgentResult, Event, EventType, FakeClock, NewEvent, TenantScope};
use asdlc_idempotency::InMemoryIdempotencyTracker;
use asdlc_stream::{InMemoryStreamClient, StreamClient};

use super::*;
use crate::dispatcher::AgentDispatcher;

struct StubAgent {
    fail: bool,
}

#[async_trait]
impl AgentHandler for StubAgent {
    fn agent_type(&self) -> &str {
        "stub"
    }

    async fn execute(&self, _context: &AgentContext, _event_metadata: &HashMap<String, serde_json::Value>) -> AgentResult {
        if self.fail {
            AgentResult::failure("stub", None, "boom")
        } else {
            AgentResult::success("stub", None).with_artifact_paths(vec!["/x".to_string()])
        }
    }
}

fn started_event(session: &str, task: &str, agent_type: &str) -> Event {
    let mut metadata = HashMap::new();
    metadata.insert("agent_type".to_string(), serde_json::json!(agent_type));
    Event::new(
        EventType::AgentStarted,
        session,
        NewEvent {
            task_id: Some(task.to_string()),
            metadata,
            ..NewEvent::default()
        },
    )
    .unwrap()
}

fn small_pool_config() -> WorkerPoolConfig {
    WorkerPoolConfig {
        pool_size: 2,
        batch_size: 10,
        shutdown_timeout_seconds: 2,
        consumer_group: "test-handlers".to_string(),
        consumer_name: "worker-test".to_string(),
        ..WorkerPoolConfig::default()
    }
}

async fn build_pool(fail: bool) -> (Arc<WorkerPool>, Arc<InMemoryStreamClient<FakeClock>>) {
    let stream = Arc::new(InMemoryStreamClient::with_clock(FakeClock::new()));
    let tracker = Arc::new(InMemoryIdempotencyTracker::with_clock(FakeClock::new(), TenantScope::disabled(), 604_800));
    let mut dispatcher = AgentDispatcher::new();
    dispatcher.register(Arc::new(StubAgent { fail }));

    let pool = Arc::new(WorkerPool::new(
        stream.clone(),
        tracker,
        dispatcher,
        "asdlc:events",
        None,
        small_pool_config(),
    ));
    pool.ensure_group().await.unwrap();
    (pool, stream)
}

async fn wait_for_terminal(stream: &InMemoryStreamClient<FakeClock>, observer_group: &str) -> HashMap<String, String> {
    stream.create_group("asdlc:events", observer_group, "0").await.unwrap();
    for _ in 0..100 {
        let entries = stream
            .read_group("asdlc:events", observer_group, "observer", 10, None)
            .await
            .unwrap();
        for (_, wire) in entries {
            if wire.get("event_type").map(|s| s.as_str()) != Some("agent_started") {
                return wire;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("no terminal event observed in time");
}

#[tokio::test]
async fn happy_path_completes_and_acks() {
    let (pool, stream) = build_pool(false).await;
    stream
        .publish("asdlc:events", started_event("s1", "t1", "stub").to_wire(), 10_000)
        .await
        .unwrap();

    let runner = tokio::spawn({
        let pool = pool.clone();
        async move { pool.start().await }
    });

    let terminal = wait_for_terminal(&stream, "observer-happy").await;
    assert_eq!(terminal.get("event_type").unwrap(), "agent_completed");
    assert_eq!(terminal.get("session_id").unwrap(), "s1");
    assert_eq!(terminal.get("task_id").unwrap(), "t1");
    assert_eq!(terminal.get("artifact_paths").unwrap(), "/x");

    pool.stop();
    tokio::time::timeout(Duration::from_secs(2), runner).await.unwrap().unwrap();

    let stats = pool.stats();
    assert_eq!(stats.events_processed, 1);
    assert_eq!(stats.events_succeeded, 1);
    assert_eq!(stats.events_failed, 0);
    assert_eq!(stats.state, PoolState::Stopped);
}

#[tokio::test]
async fn duplicate_events_produce_exactly_one_terminal() {
    let (pool, stream) = build_pool(false).await;
    let event = started_event("s1", "t1", "stub");
    stream.publish("asdlc:events", event.to_wire(), 10_000).await.unwrap();
    stream.publish("asdlc:events", event.to_wire(), 10_000).await.unwrap();

    let runner = tokio::spawn({
        let pool = pool.clone();
        async move { pool.start().await }
    });

    wait_for_terminal(&stream, "observer-dup").await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    pool.stop();
    tokio::time::timeout(Duration::from_secs(2), runner).await.unwrap().unwrap();

    stream.create_group("asdlc:events", "observer-count", "0").await.unwrap();
    let all = stream
        .read_group("asdlc:events", "observer-count", "c", 100, None)
        .await
        .unwrap();
    let terminals = all
        .iter()
        .filter(|(_, wire)| wire.get("event_type").map(|s| s.as_str()) == Some("agent_completed"))
        .count();
    assert_eq!(terminals, 1);
    assert_eq!(pool.stats().events_processed, 1);
}

#[tokio::test]
async fn unknown_agent_type_emits_agent_error() {
    let (pool, stream) = build_pool(false).await;
    stream
        .publish("asdlc:events", started_event("s1", "t1", "ghost").to_wire(), 10_000)
        .await
        .unwrap();

    let runner = tokio::spawn({
        let pool = pool.clone();
        async move { pool.start().await }
    });

    let terminal = wait_for_terminal(&stream, "observer-unknown").await;
    assert_eq!(terminal.get("event_type").unwrap(), "agent_error");
    let metadata: serde_json::Value = serde_json::from_str(terminal.get("metadata").unwrap()).unwrap();
    assert!(metadata["error_message"].as_str().unwrap().contains("ghost"));

    pool.stop();
    tokio::time::timeout(Duration::from_secs(2), runner).await.unwrap().unwrap();

    let stats = pool.stats();
    assert_eq!(stats.events_failed, 1);
    assert_eq!(stats.events_succeeded, 0);
}

#[tokio::test]
async fn agent_failure_emits_agent_error_with_retry_flag() {
    let (pool, stream) = build_pool(true).await;
    stream
        .publish("asdlc:events", started_event("s1", "t1", "stub").to_wire(), 10_000)
        .await
        .unwrap();

    let runner = tokio::spawn({
        let pool = pool.clone();
        async move { pool.start().await }
    });

    let terminal = wait_for_terminal(&stream, "observer-fail").await;
    assert_eq!(terminal.get("event_type").unwrap(), "agent_error");

    pool.stop();
    tokio::time::timeout(Duration::from_secs(2), runner).await.unwrap().unwrap();
    assert_eq!(pool.stats().events_failed, 1);
}

#[tokio::test]
async fn starting_twice_is_a_no_op_warning() {
    let (pool, _stream) = build_pool(false).await;

    let runner = tokio::spawn({
        let pool = pool.clone();
        async move { pool.start().await }
    });
    tokio::time::sleep(Duration::from_millis(30)).await;

    // second start returns immediately without disturbing the running pool.
    pool.clone().start().await;
    assert_eq!(pool.stats().state, PoolState::Running);

    pool.stop();
    tokio::time::timeout(Duration::from_secs(2), runner).await.unwrap().unwrap();
    assert_eq!(pool.stats().state, PoolState::Stopped);
}
