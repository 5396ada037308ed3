// SPDX-License-Identifier: MIT

//! In-process `IdempotencyTracker`, TTL expiry driven by an injected `Clock`
//! so tests can assert exact expiry boundaries deterministically.

use std::collections::HashMap;

use async_trait::async_trait;
use asdlc_core::{Clock, Event, IdempotencyError, SystemClock, TenantId, TenantScope};
use parking_lot::Mutex;

use crate::tracker::{effective_key, IdempotencyTracker, DEFAULT_TTL_SECONDS};

struct Marker {
    event_id: String,
    expires_at_ms: u64,
}

/// In-memory `IdempotencyTracker`.
pub struct InMemoryIdempotencyTracker<C: Clock = SystemClock> {
    clock: C,
    ttl_seconds: u64,
    scope: TenantScope,
    markers: Mutex<HashMap<String, Marker>>,
}

impl InMemoryIdempotencyTracker<SystemClock> {
    pub fn new(scope: TenantScope) -> Self {
        Self::with_clock(SystemClock, scope, DEFAULT_TTL_SECONDS)
    }
}

impl<C: Clock> InMemoryIdempotencyTracker<C> {
    pub fn with_clock(clock: C, scope: TenantScope, ttl_seconds: u64) -> Self {
        Self {
            clock,
            ttl_seconds,
            scope,
            markers: Mutex::new(HashMap::new()),
        }
    }

    fn key_for(&self, event: &Event, tenant: Option<&TenantId>) -> String {
        self.scope.processed_marker_key(tenant, &effective_key(event))
    }

    fn is_live(&self, marker: &Marker, now_ms: u64) -> bool {
        now_ms < marker.expires_at_ms
    }
}

#[async_trait]
impl<C: Clock> IdempotencyTracker for InMemoryIdempotencyTracker<C> {
    async fn is_processed(&self, event: &Event, tenant: Option<&TenantId>) -> Result<bool, IdempotencyError> {
        let key = self.key_for(event, tenant);
        let now_ms = self.clock.epoch_ms();
        let markers = self.markers.lock();
        Ok(markers.get(&key).is_some_and(|m| self.is_live(m, now_ms)))
    }

    async fn mark_processed(&self, event: &Event, tenant: Option<&TenantId>) -> Result<(), IdempotencyError> {
        let key = self.key_for(event, tenant);
        let now_ms = self.clock.epoch_ms();
        let event_id = event.event_id.clone().unwrap_or_default();
        let mut markers = self.markers.lock();
        markers.insert(
            key,
            Marker {
                event_id,
                expires_at_ms: now_ms + self.ttl_seconds * 1000,
            },
        );
        Ok(())
    }

    async fn check_and_mark_if_new(&self, event: &Event, tenant: Option<&TenantId>) -> Result<bool, IdempotencyError> {
        let key = self.key_for(event, tenant);
        let now_ms = self.clock.epoch_ms();
        let event_id = event.event_id.clone().unwrap_or_default();

        let mut markers = self.markers.lock();
        if let Some(existing) = markers.get(&key) {
            if self.is_live(existing, now_ms) {
                return Ok(false);
            }
        }
        markers.insert(
            key,
            Marker {
                event_id,
                expires_at_ms: now_ms + self.ttl_seconds * 1000,
            },
        );
        Ok(true)
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
