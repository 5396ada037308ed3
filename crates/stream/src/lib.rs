// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! asdlc-stream: the `StreamClient` contract over a Redis-Streams-compatible
//! event log, with a Redis-backed implementation and an in-memory fake.

mod client;
mod memory;
mod redis;

pub use client::{PendingEntry, StreamClient, StreamInfo, WireEntry};
pub use memory::{InMemoryStreamClient, SharedInMemoryStreamClient};
pub use redis::RedisStreamClient;
