// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! asdlc-worker: event consumer, bounded worker pool, agent dispatcher, and
//! the startup recovery driver for the aSDLC execution substrate.

pub mod config;
pub mod consumer;
pub mod dispatcher;
pub mod pool;

pub use config::{ConfigError, WorkerPoolConfig};
pub use consumer::{EventConsumer, EventConsumerConfig};
pub use dispatcher::AgentDispatcher;
pub use pool::{PoolStats, PoolState, WorkerPool};
