// SPDX-License-Identifier: MIT

//! The bounded-concurrency worker pool: the specialised consumer for
//! `AGENT_STARTED` events.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use asdlc_core::{
    AgentContext, AgentNotFoundError, AgentResult, Event, EventType, NewEvent, StreamError, TenantId,
};
use asdlc_idempotency::IdempotencyTracker;
use asdlc_stream::StreamClient;
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::config::WorkerPoolConfig;
use crate::dispatcher::AgentDispatcher;

const TERMINAL_STREAM_MAX_LEN: usize = 10_000;
const READ_BLOCK_MS: u64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    Stopped,
    Running,
    ShuttingDown,
}

#[derive(Debug, Default)]
struct Stats {
    events_processed: AtomicU64,
    events_succeeded: AtomicU64,
    events_failed: AtomicU64,
    active_workers: AtomicU64,
}

/// Running counters exposed for observability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub events_processed: u64,
    pub events_succeeded: u64,
    pub events_failed: u64,
    pub active_workers: u64,
    pub concurrency_limit: u64,
    pub state: PoolState,
}

impl Default for PoolState {
    fn default() -> Self {
        PoolState::Stopped
    }
}

enum DispatchOutcome {
    Agent(AgentResult),
    NotFound(AgentNotFoundError),
    Panicked(JoinError),
}

pub struct WorkerPool {
    stream: Arc<dyn StreamClient>,
    tracker: Arc<dyn IdempotencyTracker>,
    dispatcher: AgentDispatcher,
    config: WorkerPoolConfig,
    stream_name: String,
    tenant: Option<TenantId>,
    semaphore: Arc<Semaphore>,
    state: Mutex<PoolState>,
    cancel: CancellationToken,
    stats: Stats,
}

impl WorkerPool {
    pub fn new(
        stream: Arc<dyn StreamClient>,
        tracker: Arc<dyn IdempotencyTracker>,
        dispatcher: AgentDispatcher,
        stream_name: impl Into<String>,
        tenant: Option<TenantId>,
        config: WorkerPoolConfig,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.pool_size));
        Self {
            stream,
            tracker,
            dispatcher,
            config,
            stream_name: stream_name.into(),
            tenant,
            semaphore,
            state: Mutex::new(PoolState::Stopped),
            cancel: CancellationToken::new(),
            stats: Stats::default(),
        }
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            events_processed: self.stats.events_processed.load(Ordering::SeqCst),
            events_succeeded: self.stats.events_succeeded.load(Ordering::SeqCst),
            events_failed: self.stats.events_failed.load(Ordering::SeqCst),
            active_workers: self.stats.active_workers.load(Ordering::SeqCst),
            concurrency_limit: self.config.pool_size as u64,
            state: *self.state.lock(),
        }
    }

    pub async fn ensure_group(&self) -> Result<bool, StreamError> {
        self.stream.ensure_stream(&self.stream_name).await?;
        self.stream
            .create_group(&self.stream_name, &self.config.consumer_group, "0")
            .await
            .map_err(|err| StreamError::Backend(err.to_string()))
    }

    /// Signal the running loop to stop accepting new batches. Does not
    /// itself wait for in-flight work; `start`'s caller observes completion
    /// by awaiting the task `start` was spawned on.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        if *state == PoolState::Running {
            *state = PoolState::ShuttingDown;
            self.cancel.cancel();
        } else {
            tracing::warn!(state = ?*state, "stop() called while pool is not running");
        }
    }

    /// Read-dispatch-ack loop over `AGENT_STARTED`, bounded to `pool_size`
    /// concurrent agent executions. Runs until `stop()` is called, then
    /// drains in-flight work up to `shutdown_timeout_seconds` before
    /// returning with `state == STOPPED`.
    #[tracing::instrument(skip(self), fields(group = %self.config.consumer_group, consumer = %self.config.consumer_name))]
    pub async fn start(self: Arc<Self>) {
        {
            let mut state = self.state.lock();
            if *state != PoolState::Stopped {
                tracing::warn!(state = ?*state, "start() called while pool already running");
                return;
            }
            *state = PoolState::Running;
        }

        let mut tasks: JoinSet<()> = JoinSet::new();

        while !self.cancel.is_cancelled() {
            let batch = self
                .stream
                .read_group(
                    &self.stream_name,
                    &self.config.consumer_group,
                    &self.config.consumer_name,
                    self.config.batch_size,
                    Some(READ_BLOCK_MS),
                )
                .await;

            let entries = match batch {
                Ok(entries) => entries,
                Err(err) => {
                    tracing::warn!(error = %err, "stream read failed, backing off");
                    tokio::time::sleep(Duration::from_secs(1)).await;
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
                if self.cancel.is_cancelled() {
                    break;
                }
                let Ok(permit) = self.semaphore.clone().acquire_owned().await else {
                    break;
                };
                let pool = self.clone();
                tasks.spawn(async move {
                    pool.stats.active_workers.fetch_add(1, Ordering::SeqCst);
                    pool.handle_event(event_id, wire).await;
                    pool.stats.active_workers.fetch_sub(1, Ordering::SeqCst);
                    drop(permit);
                });
            }
        }

        let grace = self.config.shutdown_timeout();
        let drain = async {
            while tasks.join_next().await.is_some() {}
        };
        if tokio::time::timeout(grace, drain).await.is_err() {
            tracing::warn!("shutdown grace period elapsed, aborting remaining in-flight tasks");
            tasks.abort_all();
            while tasks.join_next().await.is_some() {}
        }

        *self.state.lock() = PoolState::Stopped;
    }

    async fn handle_event(&self, event_id: String, wire: HashMap<String, String>) {
        self.stats.events_processed.fetch_add(1, Ordering::SeqCst);

        let event = match Event::from_wire(Some(event_id.clone()), &wire) {
            Ok(event) => event,
            Err(err) => {
                tracing::warn!(event_id, error = %err, "malformed agent_started entry, acking without processing");
                let _ = self.ack(&event_id).await;
                self.stats.events_failed.fetch_add(1, Ordering::SeqCst);
                return;
            }
        };

        let tenant = event.tenant_id.as_ref().or(self.tenant.as_ref());
        match self.tracker.check_and_mark_if_new(&event, tenant).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(event_id, "duplicate agent_started, acking without dispatch");
                let _ = self.ack(&event_id).await;
                self.stats.events_processed.fetch_sub(1, Ordering::SeqCst);
                return;
            }
            Err(err) => {
                tracing::warn!(event_id, error = %err, "idempotency check failed, leaving pending");
                return;
            }
        }

        let context = AgentContext {
            session_id: event.session_id.clone(),
            task_id: event.task_id.clone(),
            tenant_id: event.tenant_id.clone(),
            workspace_path: None,
            context_pack: None,
            metadata: event.metadata.clone(),
        };
        let metadata = event.metadata.clone();
        let dispatcher = self.dispatcher.clone();

        let dispatch = tokio::spawn(async move { dispatcher.dispatch(&context, &metadata).await });
        let outcome = match dispatch.await {
            Ok(Ok(result)) => DispatchOutcome::Agent(result),
            Ok(Err(not_found)) => DispatchOutcome::NotFound(not_found),
            Err(join_err) => DispatchOutcome::Panicked(join_err),
        };

        let success = self.emit_terminal(&event, outcome).await;
        let _ = self.ack(&event_id).await;

        if success {
            self.stats.events_succeeded.fetch_add(1, Ordering::SeqCst);
        } else {
            self.stats.events_failed.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Publish `AGENT_COMPLETED`/`AGENT_ERROR` inheriting correlators from the
    /// originating event. Returns whether the outcome was a success.
    async fn emit_terminal(&self, event: &Event, outcome: DispatchOutcome) -> bool {
        let (success, agent_type, error_message, should_retry, artifact_paths, mut metadata) = match outcome {
            DispatchOutcome::Agent(result) => (
                result.success,
                result.agent_type,
                result.error_message,
                result.should_retry,
                result.artifact_paths,
                result.metadata,
            ),
            DispatchOutcome::NotFound(err) => {
                let agent_type = err.agent_type.clone();
                (false, agent_type, Some(err.to_string()), false, Vec::new(), HashMap::new())
            }
            DispatchOutcome::Panicked(err) => (
                false,
                String::new(),
                Some(format!("agent handler panicked: {err}")),
                false,
                Vec::new(),
                HashMap::new(),
            ),
        };

        metadata.insert("agent_type".to_string(), serde_json::json!(agent_type));
        metadata.insert("success".to_string(), serde_json::json!(success));
        metadata.insert("should_retry".to_string(), serde_json::json!(should_retry));
        if let Some(msg) = &error_message {
            metadata.insert("error_message".to_string(), serde_json::json!(msg));
        }

        let terminal_type = if success { EventType::AgentCompleted } else { EventType::AgentError };
        let fields = NewEvent {
            task_id: event.task_id.clone(),
            epic_id: event.epic_id.clone(),
            git_sha: event.git_sha.clone(),
            artifact_paths,
            mode: event.mode,
            tenant_id: event.tenant_id.clone(),
            metadata,
            ..NewEvent::default()
        };

        match Event::new(terminal_type, event.session_id.clone(), fields) {
            Ok(terminal) => {
                if let Err(err) = self.stream.publish(&self.stream_name, terminal.to_wire(), TERMINAL_STREAM_MAX_LEN).await {
                    tracing::warn!(error = %err, "failed to publish terminal event");
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to construct terminal event");
            }
        }

        success
    }

    async fn ack(&self, event_id: &str) -> Result<bool, StreamError> {
        self.stream.ack(&self.stream_name, &self.config.consumer_group, event_id).await
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
