// SPDX-License-Identifier: MIT

//! The `StreamClient` contract: a thin adapter over a
//! Redis-Streams-compatible log.

use std::collections::HashMap;

use async_trait::async_trait;
use asdlc_core::{ConsumerGroupError, StreamError};

/// One entry observed via `pending`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntry {
    pub message_id: String,
    pub consumer: String,
    pub time_since_delivered_ms: u64,
    pub times_delivered: u64,
}

/// Soft-fail observability surface for a stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamInfo {
    pub length: u64,
    pub groups: u64,
}

/// Wire entries as returned by `read_group`/`claim`: `(event_id, wire-mapping)`.
pub type WireEntry = (String, HashMap<String, String>);

/// A thin contract over a Redis-Streams-compatible log.
///
/// The contract is satisfied by any log providing per-group cursors,
/// explicit ack, pending inspection, and stale-claim transfer. Adapters for
/// other backends must preserve the "claim returns reassigned data"
/// semantics.
#[async_trait]
pub trait StreamClient: Send + Sync {
    /// Create the stream if absent, by appending a sentinel entry under a
    /// length cap. A no-op (and `Ok`) if the stream already exists.
    async fn ensure_stream(&self, stream: &str) -> Result<(), StreamError>;

    /// Create a consumer group. Returns `true` if newly created, `false` if
    /// it already existed (BUSYGROUP-equivalent responses are success).
    async fn create_group(&self, stream: &str, group: &str, start_id: &str) -> Result<bool, ConsumerGroupError>;

    /// Append a wire mapping, trimming the stream to approximately `max_len`.
    /// Returns the assigned event id.
    async fn publish(&self, stream: &str, wire: HashMap<String, String>, max_len: usize) -> Result<String, StreamError>;

    /// Read up to `batch_size` undelivered entries (cursor `>`) for this
    /// `(group, consumer)`, optionally blocking up to `block_ms`.
    async fn read_group(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        batch_size: usize,
        block_ms: Option<u64>,
    ) -> Result<Vec<WireEntry>, StreamError>;

    /// Acknowledge an entry. Returns `true` if it was acknowledged.
    async fn ack(&self, stream: &str, group: &str, event_id: &str) -> Result<bool, StreamError>;

    /// List pending entries, optionally filtered to one consumer.
    async fn pending(
        &self,
        stream: &str,
        group: &str,
        max_count: usize,
        consumer_filter: Option<&str>,
    ) -> Result<Vec<PendingEntry>, StreamError>;

    /// Claim the given pending entry ids under `new_consumer`, provided they
    /// have been idle at least `min_idle_ms`. Returns only successfully
    /// claimed entries with their wire data.
    async fn claim(
        &self,
        stream: &str,
        group: &str,
        new_consumer: &str,
        min_idle_ms: u64,
        ids: &[String],
    ) -> Result<Vec<WireEntry>, StreamError>;

    /// Soft-fail stream metadata: a zeroed `StreamInfo` when the stream does
    /// not exist, rather than an error.
    async fn stream_info(&self, stream: &str) -> Result<StreamInfo, StreamError>;
}
