// SPDX-License-Identifier: MIT

//! Data passed into and returned from an agent invocation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::tenant::TenantId;

/// Context built per-event by the worker pool and passed to an agent.
/// Not persisted.
#[derive(Debug, Clone)]
pub struct AgentContext {
    pub session_id: String,
    pub task_id: Option<String>,
    pub tenant_id: Option<TenantId>,
    pub workspace_path: Option<String>,
    pub context_pack: Option<serde_json::Value>,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Result returned by an agent. The worker pool lifts `success` into the
/// terminal event type (`AGENT_COMPLETED` / `AGENT_ERROR`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResult {
    pub agent_type: String,
    pub task_id: Option<String>,
    pub success: bool,
    #[serde(default)]
    pub artifact_paths: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Advisory only; the pool never infers retryability itself.
    #[serde(default)]
    pub should_retry: bool,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl AgentResult {
    pub fn success(agent_type: impl Into<String>, task_id: Option<String>) -> Self {
        Self {
            agent_type: agent_type.into(),
            task_id,
            success: true,
            artifact_paths: Vec::new(),
            error_message: None,
            should_retry: false,
            metadata: HashMap::new(),
        }
    }

    pub fn failure(agent_type: impl Into<String>, task_id: Option<String>, error_message: impl Into<String>) -> Self {
        Self {
            agent_type: agent_type.into(),
            task_id,
            success: false,
            artifact_paths: Vec::new(),
            error_message: Some(error_message.into()),
            should_retry: false,
            metadata: HashMap::new(),
        }
    }

    pub fn with_retry(mut self, should_retry: bool) -> Self {
        self.should_retry = should_retry;
        self
    }

    pub fn with_artifact_paths(mut self, artifact_paths: Vec<String>) -> Self {
        self.artifact_paths = artifact_paths;
        self
    }
}

/// Returned by the lower-level event handler (consumer-group wrapper). Used
/// to decide ack vs. leave-pending.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerResult {
    pub success: bool,
    #[serde(default)]
    pub should_retry: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default)]
    pub artifact_paths: Vec<String>,
}

impl HandlerResult {
    pub fn success() -> Self {
        Self {
            success: true,
            should_retry: false,
            error_message: None,
            artifact_paths: Vec::new(),
        }
    }

    pub fn retry(error_message: impl Into<String>) -> Self {
        Self {
            success: false,
            should_retry: true,
            error_message: Some(error_message.into()),
            artifact_paths: Vec::new(),
        }
    }

    pub fn permanent_failure(error_message: impl Into<String>) -> Self {
        Self {
            success: false,
            should_retry: false,
            error_message: Some(error_message.into()),
            artifact_paths: Vec::new(),
        }
    }
}

/// Accumulated outcome of a `process_pending` recovery pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryResult {
    pub processed: u64,
    pub skipped: u64,
    pub failed: u64,
    pub claimed: u64,
}

impl RecoveryResult {
    pub fn total(&self) -> u64 {
        self.processed + self.skipped + self.failed + self.claimed
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
