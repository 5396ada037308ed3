// SPDX-License-Identifier: MIT

//! The agent dispatcher: a registry mapping `agent_type` → handler.

use std::collections::HashMap;
use std::sync::Arc;

use asdlc_core::{AgentContext, AgentHandler, AgentNotFoundError, AgentResult};

/// Registry of agent handlers keyed by `agent_type`.
#[derive(Default, Clone)]
pub struct AgentDispatcher {
    handlers: HashMap<String, Arc<dyn AgentHandler>>,
}

impl AgentDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its own `agent_type()`.
    pub fn register(&mut self, handler: Arc<dyn AgentHandler>) {
        self.handlers.insert(handler.agent_type().to_string(), handler);
    }

    /// Reads `event_metadata["agent_type"]`, looks up the handler, and
    /// invokes it. Unknown type is a typed, non-retryable error.
    pub async fn dispatch(
        &self,
        context: &AgentContext,
        event_metadata: &HashMap<String, serde_json::Value>,
    ) -> Result<AgentResult, AgentNotFoundError> {
        let agent_type = event_metadata
            .get("agent_type")
            .and_then(|v| v.as_str())
            .unwrap_or_default();

        let handler = self
            .handlers
            .get(agent_type)
            .ok_or_else(|| AgentNotFoundError {
                agent_type: agent_type.to_string(),
            })?;

        Ok(handler.execute(context, event_metadata).await)
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
