// SPDX-License-Identifier: MIT

use super::*;
use asdlc_core::{EventType, NewEvent};
use std::time::Duration;

fn event(session: &str) -> Event {
    Event::new(EventType::AgentStarted, session, NewEvent::default()).unwrap()
}

#[tokio::test]
async fn mark_processed_then_is_processed_is_true() {
    let tracker = InMemoryIdempotencyTracker::new(TenantScope::disabled());
    let event = event("s1");
    tracker.mark_processed(&event, None).await.unwrap();
    assert!(tracker.is_processed(&event, None).await.unwrap());
}

#[tokio::test]
async fn check_and_mark_if_new_wins_once() {
    let tracker = InMemoryIdempotencyTracker::new(TenantScope::disabled());
    let event = event("s1");
    assert!(tracker.check_and_mark_if_new(&event, None).await.unwrap());
    assert!(!tracker.check_and_mark_if_new(&event, None).await.unwrap());
}

#[tokio::test]
async fn marker_expires_after_configured_ttl() {
    let clock = asdlc_core::FakeClock::new();
    let tracker = InMemoryIdempotencyTracker::with_clock(clock.clone(), TenantScope::disabled(), 60);
    let event = event("s1");
    tracker.mark_processed(&event, None).await.unwrap();
    assert!(tracker.is_processed(&event, None).await.unwrap());

    clock.advance(Duration::from_secs(61));
    assert!(!tracker.is_processed(&event, None).await.unwrap());
}

#[tokio::test]
async fn tenant_scoped_markers_are_isolated() {
    let tracker = InMemoryIdempotencyTracker::new(TenantScope::enabled(None));
    let acme = TenantId::new("acme").unwrap();
    let widgets = TenantId::new("widgets").unwrap();
    let event = event("s1");

    assert!(tracker.check_and_mark_if_new(&event, Some(&acme)).await.unwrap());
    assert!(tracker.check_and_mark_if_new(&event, Some(&widgets)).await.unwrap());
    assert!(!tracker.check_and_mark_if_new(&event, Some(&acme)).await.unwrap());
}
