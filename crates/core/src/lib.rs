// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! asdlc-core: event model, tenant keying, and shared contracts for the
//! aSDLC event-driven execution substrate.

pub mod clock;
pub mod context;
pub mod error;
pub mod event;
pub mod handler;
pub mod tenant;

pub use clock::{Clock, FakeClock, SystemClock};
pub use context::{AgentContext, AgentResult, HandlerResult, RecoveryResult};
pub use error::{AgentNotFoundError, ConsumerGroupError, EventError, HitlError, IdempotencyError, StreamError};
pub use event::{idempotency_key_of, Event, EventType, Mode, NewEvent};
pub use handler::{AgentHandler, EventHandler};
pub use tenant::{EmptyTenantId, TenantId, TenantScope, PROCESSED_MARKER_PREFIX, STREAM_BASE};
