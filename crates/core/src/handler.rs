// SPDX-License-Identifier: MIT

//! Capability traits implemented by the consumer-group handler and by
//! agents, kept as explicit interfaces rather than structural typing
//! (registration is by string key into a map).

use async_trait::async_trait;

use crate::context::{AgentContext, AgentResult, HandlerResult};
use crate::event::{Event, EventType};

/// A handler registered with an `EventConsumer`'s consumer group.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Whether this handler routes the given event type at all. Events this
    /// handler does not route are ack'd without invocation.
    fn can_handle(&self, event_type: EventType) -> bool;

    /// Process one event, returning the ack/retry decision.
    async fn handle(&self, event: &Event) -> HandlerResult;
}

/// A handler registered with the `AgentDispatcher` under an `agent_type` key.
#[async_trait]
pub trait AgentHandler: Send + Sync {
    /// The `agent_type` string this handler is registered under.
    fn agent_type(&self) -> &str;

    /// Execute the agent for the given context and event metadata.
    async fn execute(
        &self,
        context: &AgentContext,
        event_metadata: &std::collections::HashMap<String, serde_json::Value>,
    ) -> AgentResult;
}
