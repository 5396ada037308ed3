// SPDX-License-Identifier: MIT

//! The event model: a typed, immutable record with a stable wire form.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::EventError;
use crate::tenant::TenantId;

/// Closed set of event-type wire strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    SessionStarted,
    SessionCompleted,
    TaskCreated,
    TaskDispatched,
    TaskCompleted,
    TaskFailed,
    GateRequested,
    GateApproved,
    GateRejected,
    GateExpired,
    AgentStarted,
    AgentCompleted,
    AgentError,
    PatchCreated,
    PatchApplied,
    PatchRejected,
}

impl EventType {
    pub fn as_wire_str(&self) -> &'static str {
        match self {
            EventType::SessionStarted => "session_started",
            EventType::SessionCompleted => "session_completed",
            EventType::TaskCreated => "task_created",
            EventType::TaskDispatched => "task_dispatched",
            EventType::TaskCompleted => "task_completed",
            EventType::TaskFailed => "task_failed",
            EventType::GateRequested => "gate_requested",
            EventType::GateApproved => "gate_approved",
            EventType::GateRejected => "gate_rejected",
            EventType::GateExpired => "gate_expired",
            EventType::AgentStarted => "agent_started",
            EventType::AgentCompleted => "agent_completed",
            EventType::AgentError => "agent_error",
            EventType::PatchCreated => "patch_created",
            EventType::PatchApplied => "patch_applied",
            EventType::PatchRejected => "patch_rejected",
        }
    }

    pub fn from_wire_str(s: &str) -> Result<Self, EventError> {
        Ok(match s {
            "session_started" => EventType::SessionStarted,
            "session_completed" => EventType::SessionCompleted,
            "task_created" => EventType::TaskCreated,
            "task_dispatched" => EventType::TaskDispatched,
            "task_completed" => EventType::TaskCompleted,
            "task_failed" => EventType::TaskFailed,
            "gate_requested" => EventType::GateRequested,
            "gate_approved" => EventType::GateApproved,
            "gate_rejected" => EventType::GateRejected,
            "gate_expired" => EventType::GateExpired,
            "agent_started" => EventType::AgentStarted,
            "agent_completed" => EventType::AgentCompleted,
            "agent_error" => EventType::AgentError,
            "patch_created" => EventType::PatchCreated,
            "patch_applied" => EventType::PatchApplied,
            "patch_rejected" => EventType::PatchRejected,
            other => return Err(EventError::UnknownEventType(other.to_string())),
        })
    }
}

/// Execution mode carried by every event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Normal,
    Rlm,
}

impl Mode {
    pub fn as_wire_str(&self) -> &'static str {
        match self {
            Mode::Normal => "normal",
            Mode::Rlm => "rlm",
        }
    }

    pub fn from_wire_str(s: &str) -> Self {
        match s {
            "rlm" => Mode::Rlm,
            _ => Mode::Normal,
        }
    }
}

/// An immutable pipeline event.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub event_id: Option<String>,
    pub event_type: EventType,
    pub session_id: String,
    pub task_id: Option<String>,
    pub epic_id: Option<String>,
    pub git_sha: Option<String>,
    pub artifact_paths: Vec<String>,
    pub mode: Mode,
    pub tenant_id: Option<TenantId>,
    pub timestamp: DateTime<Utc>,
    pub idempotency_key: Option<String>,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Fields accepted by `Event::new`; optional fields default to empty/absent.
#[derive(Debug, Clone, Default)]
pub struct NewEvent {
    pub event_type: Option<EventType>,
    pub session_id: String,
    pub task_id: Option<String>,
    pub epic_id: Option<String>,
    pub git_sha: Option<String>,
    pub artifact_paths: Vec<String>,
    pub mode: Mode,
    pub tenant_id: Option<TenantId>,
    pub timestamp: Option<DateTime<Utc>>,
    pub idempotency_key: Option<String>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Event {
    /// Construct a new, not-yet-appended event (`event_id == None`).
    ///
    /// Validates `session_id` non-empty and derives `idempotency_key` when
    /// absent. Naive timestamps are promoted by the caller before reaching
    /// here; this constructor always stamps `Utc::now()` when none is given.
    pub fn new(event_type: EventType, session_id: impl Into<String>, fields: NewEvent) -> Result<Self, EventError> {
        let session_id = session_id.into();
        if session_id.is_empty() {
            return Err(EventError::EmptySessionId);
        }

        let timestamp = fields.timestamp.unwrap_or_else(Utc::now);
        let idempotency_key = fields.idempotency_key.or_else(|| {
            Some(idempotency_key_of(
                event_type,
                &session_id,
                fields.task_id.as_deref(),
                fields.epic_id.as_deref(),
                None,
            ))
        });

        Ok(Self {
            event_id: None,
            event_type,
            session_id,
            task_id: fields.task_id,
            epic_id: fields.epic_id,
            git_sha: fields.git_sha,
            artifact_paths: fields.artifact_paths,
            mode: fields.mode,
            tenant_id: fields.tenant_id,
            timestamp,
            idempotency_key,
            metadata: fields.metadata,
        })
    }

    /// Promote a naive (timezone-less) timestamp to UTC.
    pub fn promote_naive_timestamp(naive: NaiveDateTime) -> DateTime<Utc> {
        naive.and_utc()
    }

    /// Serialise to the stream wire form: a string→string mapping.
    pub fn to_wire(&self) -> HashMap<String, String> {
        let mut wire = HashMap::new();
        wire.insert("event_type".to_string(), self.event_type.as_wire_str().to_string());
        wire.insert("session_id".to_string(), self.session_id.clone());
        wire.insert("timestamp".to_string(), self.timestamp.to_rfc3339());
        wire.insert("mode".to_string(), self.mode.as_wire_str().to_string());

        if let Some(epic_id) = &self.epic_id {
            if !epic_id.is_empty() {
                wire.insert("epic_id".to_string(), epic_id.clone());
            }
        }
        if let Some(task_id) = &self.task_id {
            if !task_id.is_empty() {
                wire.insert("task_id".to_string(), task_id.clone());
            }
        }
        if let Some(git_sha) = &self.git_sha {
            if !git_sha.is_empty() {
                wire.insert("git_sha".to_string(), git_sha.clone());
            }
        }
        if let Some(tenant_id) = &self.tenant_id {
            wire.insert("tenant_id".to_string(), tenant_id.as_str().to_string());
        }
        if let Some(key) = &self.idempotency_key {
            if !key.is_empty() {
                wire.insert("idempotency_key".to_string(), key.clone());
            }
        }

        wire.insert("artifact_paths".to_string(), self.artifact_paths.join(","));

        // metadata is never absent on the wire, even when empty, so that
        // from_wire has a single well-defined parse path.
        let metadata_json = serde_json::to_string(&self.metadata).unwrap_or_else(|_| "{}".to_string());
        wire.insert("metadata".to_string(), metadata_json);

        wire
    }

    /// Parse a wire mapping back into an `Event`, assigning `event_id`.
    pub fn from_wire(event_id: Option<String>, wire: &HashMap<String, String>) -> Result<Self, EventError> {
        let event_type_str = wire.get("event_type").ok_or(EventError::MissingField("event_type"))?;
        let event_type = EventType::from_wire_str(event_type_str)?;

        let session_id = wire.get("session_id").ok_or(EventError::MissingField("session_id"))?.clone();

        let timestamp = match wire.get("timestamp") {
            Some(ts) if !ts.is_empty() => DateTime::parse_from_rfc3339(ts)?.with_timezone(&Utc),
            _ => Utc::now(),
        };

        let mode = wire.get("mode").map(|s| Mode::from_wire_str(s)).unwrap_or_default();

        let artifact_paths = match wire.get("artifact_paths") {
            Some(s) if !s.is_empty() => s.split(',').map(|p| p.to_string()).collect(),
            _ => Vec::new(),
        };

        let metadata = match wire.get("metadata") {
            Some(s) if !s.is_empty() => serde_json::from_str(s)?,
            _ => HashMap::new(),
        };

        let non_empty = |key: &str| wire.get(key).filter(|s| !s.is_empty()).cloned();

        Ok(Self {
            event_id,
            event_type,
            session_id,
            task_id: non_empty("task_id"),
            epic_id: non_empty("epic_id"),
            git_sha: non_empty("git_sha"),
            artifact_paths,
            mode,
            tenant_id: non_empty("tenant_id").and_then(|id| TenantId::new(id).ok()),
            timestamp,
            idempotency_key: non_empty("idempotency_key"),
            metadata,
        })
    }
}

/// Derive the deterministic idempotency key for an identifying tuple.
///
/// Components are joined with `:` in the fixed order
/// `(event_type, session_id, task_id, epic_id, extra)`; this order is part of
/// the wire contract and must not change.
pub fn idempotency_key_of(
    event_type: EventType,
    session_id: &str,
    task_id: Option<&str>,
    epic_id: Option<&str>,
    extra: Option<&str>,
) -> String {
    let mut parts = vec![event_type.as_wire_str().to_string(), session_id.to_string()];
    if let Some(task_id) = task_id {
        parts.push(task_id.to_string());
    }
    if let Some(epic_id) = epic_id {
        parts.push(epic_id.to_string());
    }
    if let Some(extra) = extra {
        parts.push(extra.to_string());
    }
    let joined = parts.join(":");

    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)[..32].to_string()
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
