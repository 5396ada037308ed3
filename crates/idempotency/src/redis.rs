// SPDX-License-Identifier: MIT

//! Redis-backed `IdempotencyTracker`, grounded on
//! `original_source/src/infrastructure/redis_streams.py::IdempotencyTracker`.

use async_trait::async_trait;
use asdlc_core::{Event, IdempotencyError, TenantId, TenantScope};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::debug;

use crate::tracker::{effective_key, IdempotencyTracker, DEFAULT_TTL_SECONDS};

/// Redis-backed implementation of `IdempotencyTracker`.
pub struct RedisIdempotencyTracker {
    conn: ConnectionManager,
    ttl_seconds: u64,
    scope: TenantScope,
}

impl RedisIdempotencyTracker {
    pub async fn connect(url: &str, scope: TenantScope) -> Result<Self, IdempotencyError> {
        Self::connect_with_ttl(url, scope, DEFAULT_TTL_SECONDS).await
    }

    pub async fn connect_with_ttl(url: &str, scope: TenantScope, ttl_seconds: u64) -> Result<Self, IdempotencyError> {
        let client = redis::Client::open(url).map_err(|e| IdempotencyError::Backend(e.to_string()))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| IdempotencyError::Backend(e.to_string()))?;
        Ok(Self { conn, ttl_seconds, scope })
    }

    fn key_for(&self, event: &Event, tenant: Option<&TenantId>) -> String {
        self.scope.processed_marker_key(tenant, &effective_key(event))
    }
}

#[async_trait]
impl IdempotencyTracker for RedisIdempotencyTracker {
    async fn is_processed(&self, event: &Event, tenant: Option<&TenantId>) -> Result<bool, IdempotencyError> {
        let key = self.key_for(event, tenant);
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists(&key).await.map_err(|e| IdempotencyError::Backend(e.to_string()))?;
        Ok(exists)
    }

    async fn mark_processed(&self, event: &Event, tenant: Option<&TenantId>) -> Result<(), IdempotencyError> {
        let key = self.key_for(event, tenant);
        let event_id = event.event_id.clone().unwrap_or_default();
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(&key, event_id, self.ttl_seconds)
            .await
            .map_err(|e| IdempotencyError::Backend(e.to_string()))?;
        debug!(key, "marked event as processed");
        Ok(())
    }

    async fn check_and_mark_if_new(&self, event: &Event, tenant: Option<&TenantId>) -> Result<bool, IdempotencyError> {
        let key = self.key_for(event, tenant);
        let event_id = event.event_id.clone().unwrap_or_default();
        let mut conn = self.conn.clone();

        let won: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg(event_id)
            .arg("NX")
            .arg("EX")
            .arg(self.ttl_seconds)
            .query_async(&mut conn)
            .await
            .map_err(|e| IdempotencyError::Backend(e.to_string()))?;
        Ok(won.is_some())
    }
}
