// SPDX-License-Identifier: MIT

//! Typed error taxonomy surfaced by the core, per the error handling design.

use thiserror::Error;

/// Errors raised by stream client operations (`publish`, `read_group`, `ack`,
/// `pending`, `claim`, `ensure_stream`, `stream_info`).
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("backing store error: {0}")]
    Backend(String),

    #[error("stream {0} does not exist")]
    NoSuchStream(String),

    #[error("malformed wire entry: {0}")]
    MalformedEntry(String),
}

/// Errors raised by consumer-group creation.
#[derive(Debug, Error)]
pub enum ConsumerGroupError {
    #[error("backing store error: {0}")]
    Backend(String),

    #[error("stream {0} does not exist")]
    NoSuchStream(String),
}

/// Raised by the agent dispatcher when `agent_type` has no registered handler.
#[derive(Debug, Error)]
#[error("no agent registered for agent_type {agent_type:?}")]
pub struct AgentNotFoundError {
    pub agent_type: String,
}

/// Errors raised while constructing or parsing an `Event`.
#[derive(Debug, Error)]
pub enum EventError {
    #[error("session_id must not be empty")]
    EmptySessionId,

    #[error("unknown event_type: {0:?}")]
    UnknownEventType(String),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("malformed metadata JSON: {0}")]
    InvalidMetadata(#[from] serde_json::Error),

    #[error("malformed timestamp: {0}")]
    InvalidTimestamp(#[from] chrono::ParseError),
}

/// Errors raised by idempotency tracker operations.
#[derive(Debug, Error)]
pub enum IdempotencyError {
    #[error("backing store error: {0}")]
    Backend(String),
}

/// Errors raised by a `HitlDispatcher`.
#[derive(Debug, Error)]
pub enum HitlError {
    #[error("gate dispatch failed: {0}")]
    Dispatch(String),
}
