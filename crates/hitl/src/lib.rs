// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! asdlc-hitl: the validation/deployment phase coordinator and the evidence
//! bundle / gate dispatch types it submits at HITL-5 and HITL-6.

pub mod coordinator;
pub mod evidence;
pub mod gate;

pub use asdlc_core::HitlError;
pub use coordinator::{DeploymentResult, RejectionResult, ValidationDeploymentCoordinator, ValidationResult};
pub use evidence::{EvidenceBundle, EvidenceItem, GateType};
pub use gate::{GateRequestId, HitlDispatcher, NullHitlDispatcher, RecordingHitlDispatcher};
