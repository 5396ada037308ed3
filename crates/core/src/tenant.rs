// SPDX-License-Identifier: MIT

//! Tenant identity and key-prefixing discipline.
//!
//! The current tenant is always an explicit argument, never a thread-local
//! lookup: every call site that needs a key receives an `Option<&TenantId>`.

use std::fmt;

/// Suffix used for the event stream in both single- and multi-tenant mode.
pub const STREAM_BASE: &str = "asdlc:events";

/// Key prefix for processed-event markers, before any tenant prefix.
pub const PROCESSED_MARKER_PREFIX: &str = "asdlc:worker:processed:";

/// A validated, non-empty tenant identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(String);

/// Error returned when constructing an invalid `TenantId`.
#[derive(Debug, thiserror::Error)]
#[error("tenant id must not be empty")]
pub struct EmptyTenantId;

impl TenantId {
    pub fn new(id: impl Into<String>) -> Result<Self, EmptyTenantId> {
        let id = id.into();
        if id.is_empty() {
            return Err(EmptyTenantId);
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TenantId {
    type Error = EmptyTenantId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TenantId> for String {
    fn from(value: TenantId) -> Self {
        value.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether multi-tenant key prefixing is active, and which tenant to fall
/// back to when a call site has no current tenant in scope.
#[derive(Debug, Clone, Default)]
pub struct TenantScope {
    pub enabled: bool,
    pub default_tenant: Option<TenantId>,
}

impl TenantScope {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn enabled(default_tenant: Option<TenantId>) -> Self {
        Self {
            enabled: true,
            default_tenant,
        }
    }

    /// Resolve the effective tenant for a call that may or may not carry an
    /// explicit current tenant.
    fn resolve<'a>(&'a self, current: Option<&'a TenantId>) -> Option<&'a TenantId> {
        if !self.enabled {
            return None;
        }
        current.or(self.default_tenant.as_ref())
    }

    /// Prefix `base` with `tenant:{id}:` under this scope; returns `base`
    /// unprefixed when tenancy is disabled or no tenant could be resolved.
    pub fn key(&self, current: Option<&TenantId>, base: &str) -> String {
        match self.resolve(current) {
            Some(tenant) => format!("tenant:{}:{}", tenant.as_str(), base),
            None => base.to_string(),
        }
    }

    /// Stream name for the given current tenant, defaulting to `STREAM_BASE`.
    pub fn stream_name(&self, current: Option<&TenantId>) -> String {
        self.key(current, STREAM_BASE)
    }

    /// Processed-marker key for the given idempotency key and current tenant.
    pub fn processed_marker_key(&self, current: Option<&TenantId>, idempotency_key: &str) -> String {
        self.key(current, &format!("{PROCESSED_MARKER_PREFIX}{idempotency_key}"))
    }
}

#[cfg(test)]
#[path = "tenant_tests.rs"]
mod tests;
