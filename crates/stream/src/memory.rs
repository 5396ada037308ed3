// SPDX-License-Identifier: MIT

//! In-process `StreamClient` backed by a `parking_lot::Mutex`-guarded store.
//! Used throughout this workspace's test suite and available to embedders
//! who want to exercise the substrate without a Redis instance.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use asdlc_core::{Clock, ConsumerGroupError, StreamError, SystemClock};
use parking_lot::Mutex;

use crate::client::{PendingEntry, StreamClient, StreamInfo, WireEntry};

#[derive(Debug, Clone)]
struct Entry {
    id: String,
    seq: u64,
    wire: HashMap<String, String>,
}

#[derive(Debug, Clone)]
struct PendingState {
    consumer: String,
    delivered_at_ms: u64,
    times_delivered: u64,
}

#[derive(Default)]
struct GroupState {
    last_delivered_seq: u64,
    pending: HashMap<String, PendingState>,
}

#[derive(Default)]
struct StreamState {
    entries: Vec<Entry>,
    groups: HashMap<String, GroupState>,
}

/// In-memory `StreamClient`. Generic over `Clock` so idle-duration
/// calculations (`pending`, `claim`) are deterministically testable with
/// `FakeClock`.
pub struct InMemoryStreamClient<C: Clock = SystemClock> {
    clock: C,
    seq: AtomicU64,
    streams: Mutex<HashMap<String, StreamState>>,
}

impl InMemoryStreamClient<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for InMemoryStreamClient<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> InMemoryStreamClient<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            clock,
            seq: AtomicU64::new(0),
            streams: Mutex::new(HashMap::new()),
        }
    }

    fn next_id(&self) -> (u64, String) {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        (seq, format!("{}-{seq}", self.clock.epoch_ms()))
    }
}

#[async_trait]
impl<C: Clock> StreamClient for InMemoryStreamClient<C> {
    async fn ensure_stream(&self, stream: &str) -> Result<(), StreamError> {
        let mut streams = self.streams.lock();
        streams.entry(stream.to_string()).or_default();
        Ok(())
    }

    async fn create_group(&self, stream: &str, group: &str, _start_id: &str) -> Result<bool, ConsumerGroupError> {
        let mut streams = self.streams.lock();
        let state = streams.entry(stream.to_string()).or_default();
        if state.groups.contains_key(group) {
            return Ok(false);
        }
        state.groups.insert(group.to_string(), GroupState::default());
        Ok(true)
    }

    async fn publish(&self, stream: &str, wire: HashMap<String, String>, max_len: usize) -> Result<String, StreamError> {
        let (seq, id) = self.next_id();
        let mut streams = self.streams.lock();
        let state = streams.entry(stream.to_string()).or_default();
        state.entries.push(Entry { id: id.clone(), seq, wire });
        if state.entries.len() > max_len {
            let overflow = state.entries.len() - max_len;
            state.entries.drain(0..overflow);
        }
        Ok(id)
    }

    async fn read_group(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        batch_size: usize,
        _block_ms: Option<u64>,
    ) -> Result<Vec<WireEntry>, StreamError> {
        let mut streams = self.streams.lock();
        let state = streams
            .get_mut(stream)
            .ok_or_else(|| StreamError::NoSuchStream(stream.to_string()))?;
        let now = self.clock.epoch_ms();

        let cursor = state.groups.entry(group.to_string()).or_default().last_delivered_seq;
        let new_entries: Vec<Entry> = state
            .entries
            .iter()
            .filter(|e| e.seq > cursor)
            .take(batch_size)
            .cloned()
            .collect();

        let group_state = state.groups.entry(group.to_string()).or_default();
        let mut out = Vec::with_capacity(new_entries.len());
        for entry in new_entries {
            group_state.last_delivered_seq = group_state.last_delivered_seq.max(entry.seq);
            group_state.pending.insert(
                entry.id.clone(),
                PendingState {
                    consumer: consumer.to_string(),
                    delivered_at_ms: now,
                    times_delivered: 1,
                },
            );
            out.push((entry.id, entry.wire));
        }
        Ok(out)
    }

    async fn ack(&self, stream: &str, group: &str, event_id: &str) -> Result<bool, StreamError> {
        let mut streams = self.streams.lock();
        let state = streams
            .get_mut(stream)
            .ok_or_else(|| StreamError::NoSuchStream(stream.to_string()))?;
        let Some(group_state) = state.groups.get_mut(group) else {
            return Ok(false);
        };
        Ok(group_state.pending.remove(event_id).is_some())
    }

    async fn pending(
        &self,
        stream: &str,
        group: &str,
        max_count: usize,
        consumer_filter: Option<&str>,
    ) -> Result<Vec<PendingEntry>, StreamError> {
        let streams = self.streams.lock();
        let Some(state) = streams.get(stream) else {
            return Ok(Vec::new());
        };
        let Some(group_state) = state.groups.get(group) else {
            return Ok(Vec::new());
        };
        let now = self.clock.epoch_ms();

        let mut out: Vec<PendingEntry> = group_state
            .pending
            .iter()
            .filter(|(_, p)| match consumer_filter {
                Some(c) => p.consumer == c,
                None => true,
            })
            .map(|(id, p)| PendingEntry {
                message_id: id.clone(),
                consumer: p.consumer.clone(),
                time_since_delivered_ms: now.saturating_sub(p.delivered_at_ms),
                times_delivered: p.times_delivered,
            })
            .collect();
        out.sort_by(|a, b| a.message_id.cmp(&b.message_id));
        out.truncate(max_count);
        Ok(out)
    }

    async fn claim(
        &self,
        stream: &str,
        group: &str,
        new_consumer: &str,
        min_idle_ms: u64,
        ids: &[String],
    ) -> Result<Vec<WireEntry>, StreamError> {
        let mut streams = self.streams.lock();
        let state = streams
            .get_mut(stream)
            .ok_or_else(|| StreamError::NoSuchStream(stream.to_string()))?;
        let now = self.clock.epoch_ms();

        let entries_by_id: HashMap<&str, &Entry> = state.entries.iter().map(|e| (e.id.as_str(), e)).collect();
        let mut claimed = Vec::new();

        let Some(group_state) = state.groups.get_mut(group) else {
            return Ok(Vec::new());
        };

        for id in ids {
            let Some(pending) = group_state.pending.get(id) else {
                continue;
            };
            if now.saturating_sub(pending.delivered_at_ms) < min_idle_ms {
                continue;
            }
            let Some(entry) = entries_by_id.get(id.as_str()) else {
                continue;
            };
            claimed.push((entry.id.clone(), entry.wire.clone()));
            group_state.pending.insert(
                id.clone(),
                PendingState {
                    consumer: new_consumer.to_string(),
                    delivered_at_ms: now,
                    times_delivered: pending.times_delivered + 1,
                },
            );
        }
        Ok(claimed)
    }

    async fn stream_info(&self, stream: &str) -> Result<StreamInfo, StreamError> {
        let streams = self.streams.lock();
        let Some(state) = streams.get(stream) else {
            return Ok(StreamInfo::default());
        };
        Ok(StreamInfo {
            length: state.entries.len() as u64,
            groups: state.groups.len() as u64,
        })
    }
}

/// Convenience alias for sharing one client across tasks.
pub type SharedInMemoryStreamClient<C = SystemClock> = Arc<InMemoryStreamClient<C>>;

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
