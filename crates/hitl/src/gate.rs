// SPDX-License-Identifier: MIT

//! The boundary between the coordinator and whatever actually routes a gate
//! to a human (Slack, a review UI, a ticket queue). Out of scope here; we
//! only define the seam.

use async_trait::async_trait;
use asdlc_core::HitlError;
use parking_lot::Mutex;

use crate::evidence::EvidenceBundle;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GateRequestId(pub String);

impl std::fmt::Display for GateRequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[async_trait]
pub trait HitlDispatcher: Send + Sync {
    /// Submit a gate request with its evidence bundle, returning an opaque
    /// request id a reviewer's decision will later reference.
    async fn request_gate(&self, bundle: EvidenceBundle) -> Result<GateRequestId, HitlError>;
}

/// Always-errors dispatcher for deployments that run with `skip_hitl` and
/// never intend to reach a gate. Wired in so a coordinator always has a
/// dispatcher to hold without an `Option` in its field list.
#[derive(Debug, Default)]
pub struct NullHitlDispatcher;

#[async_trait]
impl HitlDispatcher for NullHitlDispatcher {
    async fn request_gate(&self, _bundle: EvidenceBundle) -> Result<GateRequestId, HitlError> {
        Err(HitlError::Dispatch("no gate dispatcher configured".to_string()))
    }
}

/// Test/inspection double: records every bundle it is asked to submit and
/// hands back sequential request ids.
#[derive(Debug, Default)]
pub struct RecordingHitlDispatcher {
    submitted: Mutex<Vec<EvidenceBundle>>,
}

impl RecordingHitlDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submitted(&self) -> Vec<EvidenceBundle> {
        self.submitted.lock().clone()
    }
}

#[async_trait]
impl HitlDispatcher for RecordingHitlDispatcher {
    async fn request_gate(&self, bundle: EvidenceBundle) -> Result<GateRequestId, HitlError> {
        let mut submitted = self.submitted.lock();
        let id = GateRequestId(format!("gate-req-{}", submitted.len() + 1));
        submitted.push(bundle);
        Ok(id)
    }
}

#[cfg(test)]
#[path = "gate_tests.rs"]
mod tests;
