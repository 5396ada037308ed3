// SPDX-License-Identifier: MIT

//! The per-consumer-group event loop: reads a group, routes to a
//! handler, and acks on terminal outcomes. Shared by non-pool consumers and
//! by the worker pool's own recovery driver.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use asdlc_core::{ConsumerGroupError, Event, EventHandler, RecoveryResult, StreamError, TenantId};
use asdlc_idempotency::IdempotencyTracker;
use asdlc_stream::StreamClient;

/// Back-off applied after a `StreamError` in the main loop before retrying a read.
const STREAM_ERROR_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct EventConsumerConfig {
    pub stream_name: String,
    pub group_name: String,
    pub consumer_name: String,
    pub batch_size: usize,
    pub block_ms: Option<u64>,
    pub tenant: Option<TenantId>,
}

enum RouteOutcome {
    NotRouted,
    Duplicate,
    Processed,
    Failed,
}

/// Drives one `(stream, group, consumer)` loop: reads, filters by
/// `can_handle`, deduplicates, invokes the handler, and acks per the a–f
/// routing table.
pub struct EventConsumer {
    stream: Arc<dyn StreamClient>,
    handler: Arc<dyn EventHandler>,
    tracker: Arc<dyn IdempotencyTracker>,
    config: EventConsumerConfig,
    running: AtomicBool,
}

impl EventConsumer {
    pub fn new(
        stream: Arc<dyn StreamClient>,
        handler: Arc<dyn EventHandler>,
        tracker: Arc<dyn IdempotencyTracker>,
        config: EventConsumerConfig,
    ) -> Self {
        Self {
            stream,
            handler,
            tracker,
            config,
            running: AtomicBool::new(false),
        }
    }

    /// Create the stream and consumer group if absent. Idempotent.
    pub async fn ensure_group(&self) -> Result<bool, ConsumerGroupError> {
        self.stream
            .ensure_stream(&self.config.stream_name)
            .await
            .map_err(|err| ConsumerGroupError::Backend(err.to_string()))?;
        self.stream.create_group(&self.config.stream_name, &self.config.group_name, "0").await
    }

    /// Signal the loop started by `start` to stop after its current batch.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Read-dispatch-ack loop. Runs until `stop()` is called.
    #[tracing::instrument(skip(self), fields(group = %self.config.group_name, consumer = %self.config.consumer_name))]
    pub async fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
        while self.running.load(Ordering::SeqCst) {
            let batch = self
                .stream
                .read_group(
                    &self.config.stream_name,
                    &self.config.group_name,
                    &self.config.consumer_name,
                    self.config.batch_size,
                    self.config.block_ms,
                )
                .await;

            let entries = match batch {
                Ok(entries) => entries,
                Err(err) => {
                    tracing::warn!(error = %err, "stream read failed, backing off");
                    tokio::time::sleep(STREAM_ERROR_BACKOFF).await;
                    continue;
                }
            };

            if entries.is_empty() {
                // Real backends honour `block_ms` server-side; this yield
                // keeps an empty-batch poll from spinning the dispatcher.
                tokio::time::sleep(Duration::from_millis(20)).await;
                continue;
            }

            for (event_id, wire) in entries {
                self.route_one(&event_id, &wire).await;
            }
        }
    }

    /// Startup recovery: reclaim entries idle past `stale_idle_ms` and
    /// reprocess them under this consumer's name.
    pub async fn process_pending(&self, max_count: usize, stale_idle_ms: u64) -> Result<RecoveryResult, StreamError> {
        let pending = self
            .stream
            .pending(&self.config.stream_name, &self.config.group_name, max_count, None)
            .await?;

        let stale_ids: Vec<String> = pending
            .into_iter()
            .filter(|entry| entry.time_since_delivered_ms >= stale_idle_ms)
            .map(|entry| entry.message_id)
            .collect();

        if stale_ids.is_empty() {
            return Ok(RecoveryResult::default());
        }

        let claimed = self
            .stream
            .claim(
                &self.config.stream_name,
                &self.config.group_name,
                &self.config.consumer_name,
                stale_idle_ms,
                &stale_ids,
            )
            .await?;

        let mut result = RecoveryResult {
            claimed: claimed.len() as u64,
            ..RecoveryResult::default()
        };

        for (event_id, wire) in claimed {
            match self.route_one(&event_id, &wire).await {
                RouteOutcome::Processed => result.processed += 1,
                RouteOutcome::NotRouted | RouteOutcome::Duplicate => result.skipped += 1,
                RouteOutcome::Failed => result.failed += 1,
            }
        }

        tracing::info!(
            processed = result.processed,
            skipped = result.skipped,
            failed = result.failed,
            claimed = result.claimed,
            "process_pending recovery pass complete"
        );

        Ok(result)
    }

    async fn route_one(&self, event_id: &str, wire: &HashMap<String, String>) -> RouteOutcome {
        let event = match Event::from_wire(Some(event_id.to_string()), wire) {
            Ok(event) => event,
            Err(err) => {
                tracing::warn!(event_id, error = %err, "malformed wire entry, acking without processing");
                let _ = self.ack(event_id).await;
                return RouteOutcome::Failed;
            }
        };

        if !self.handler.can_handle(event.event_type) {
            let _ = self.ack(event_id).await;
            return RouteOutcome::NotRouted;
        }

        let tenant = event.tenant_id.as_ref().or(self.config.tenant.as_ref());
        match self.tracker.is_processed(&event, tenant).await {
            Ok(true) => {
                let _ = self.ack(event_id).await;
                return RouteOutcome::Duplicate;
            }
            Ok(false) => {}
            Err(err) => {
                tracing::warn!(event_id, error = %err, "idempotency check failed, leaving pending");
                return RouteOutcome::Failed;
            }
        }

        let handler = self.handler.clone();
        let dispatch_event = event.clone();
        let dispatch = tokio::spawn(async move { handler.handle(&dispatch_event).await });

        let result = match dispatch.await {
            Ok(result) => result,
            Err(join_err) => {
                tracing::warn!(event_id, error = %join_err, "handler panicked, acking without marking processed");
                let _ = self.ack(event_id).await;
                return RouteOutcome::Failed;
            }
        };

        if result.success {
            if let Err(err) = self.tracker.mark_processed(&event, tenant).await {
                tracing::warn!(event_id, error = %err, "failed to record processed marker");
            }
            let _ = self.ack(event_id).await;
            RouteOutcome::Processed
        } else if result.should_retry {
            tracing::info!(event_id, "handler requested retry, leaving entry pending");
            RouteOutcome::Failed
        } else {
            tracing::warn!(event_id, error = ?result.error_message, "permanent handler failure, acking without marking processed");
            let _ = self.ack(event_id).await;
            RouteOutcome::Failed
        }
    }

    async fn ack(&self, event_id: &str) -> Result<bool, StreamError> {
        self.stream.ack(&self.config.stream_name, &self.config.group_name, event_id).await
    }
}

#[cfg(test)]
#[path = "consumer_tests.rs"]
mod tests;
