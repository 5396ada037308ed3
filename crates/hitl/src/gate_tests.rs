// SPDX-License-Identifier: MIT

use super::*;
use crate::evidence::GateType;

fn bundle() -> EvidenceBundle {
    EvidenceBundle {
        task_id: "task-1".to_string(),
        gate_type: GateType::Hitl5Validation,
        git_sha: None,
        items: Vec::new(),
        summary: "summary".to_string(),
    }
}

#[tokio::test]
async fn null_dispatcher_always_errors() {
    let dispatcher = NullHitlDispatcher;
    let err = dispatcher.request_gate(bundle()).await.unwrap_err();
    assert!(matches!(err, HitlError::Dispatch(_)));
}

#[tokio::test]
async fn recording_dispatcher_captures_bundles_and_issues_sequential_ids() {
    let dispatcher = RecordingHitlDispatcher::new();
    let first = dispatcher.request_gate(bundle()).await.unwrap();
    let second = dispatcher.request_gate(bundle()).await.unwrap();
    assert_ne!(first.to_string(), second.to_string());
    assert_eq!(dispatcher.submitted().len(), 2);
}
