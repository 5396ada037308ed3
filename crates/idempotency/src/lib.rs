// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! asdlc-idempotency: deterministic-key deduplication with TTL, tenant-aware.

mod memory;
mod redis;
mod tracker;

pub use memory::InMemoryIdempotencyTracker;
pub use redis::RedisIdempotencyTracker;
pub use tracker::{effective_key, IdempotencyTracker, DEFAULT_TTL_SECONDS};
