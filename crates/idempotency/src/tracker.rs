// SPDX-License-Identifier: MIT

//! The `IdempotencyTracker` contract: deterministic-key deduplication with
//! TTL, tenant-aware key prefixing.

use async_trait::async_trait;
use asdlc_core::{idempotency_key_of, Event, IdempotencyError, TenantId};

/// Default TTL for processed markers: 7 days.
pub const DEFAULT_TTL_SECONDS: u64 = 604_800;

/// Resolve the idempotency key carried by an event, deriving one from its
/// identifying tuple if absent. Key generation must match the publisher's
/// derivation exactly.
pub fn effective_key(event: &Event) -> String {
    event.idempotency_key.clone().unwrap_or_else(|| {
        idempotency_key_of(
            event.event_type,
            &event.session_id,
            event.task_id.as_deref(),
            event.epic_id.as_deref(),
            None,
        )
    })
}

/// Tracks processed events to prevent duplicate handling across retries,
/// redeliveries, and concurrent consumers.
#[async_trait]
pub trait IdempotencyTracker: Send + Sync {
    /// Existence check on the derived key.
    async fn is_processed(&self, event: &Event, tenant: Option<&TenantId>) -> Result<bool, IdempotencyError>;

    /// Unconditional set with TTL. Used by the consumer after
    /// `HandlerResult.success`.
    async fn mark_processed(&self, event: &Event, tenant: Option<&TenantId>) -> Result<(), IdempotencyError>;

    /// Atomic set-if-absent with TTL; returns `true` iff this caller won the
    /// race. The worker pool uses this to avoid double-dispatch.
    async fn check_and_mark_if_new(&self, event: &Event, tenant: Option<&TenantId>) -> Result<bool, IdempotencyError>;
}

#[cfg(test)]
#[path = "tracker_tests.rs"]
mod tests;
