// SPDX-License-Identifier: MIT

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use asdlc_core::AgentResult;
use serde_json::{json, Value};

use super::*;
use crate::gate::{NullHitlDispatcher, RecordingHitlDispatcher};

struct FixedAgent {
    agent_type: &'static str,
    result: AgentResult,
}

#[async_trait]
impl AgentHandler for FixedAgent {
    fn agent_type(&self) -> &str {
        self.agent_type
    }

    async fn execute(&self, _context: &AgentContext, _event_metadata: &HashMap<String, Value>) -> AgentResult {
        self.result.clone()
    }
}

fn agent(agent_type: &'static str, result: AgentResult) -> Arc<dyn AgentHandler> {
    Arc::new(FixedAgent { agent_type, result })
}

fn passing_report() -> Value {
    json!({"passed": true, "e2e_passed": 10, "e2e_failed": 0})
}

fn failing_report() -> Value {
    json!({"passed": false, "e2e_passed": 3, "e2e_failed": 2})
}

fn context() -> AgentContext {
    AgentContext {
        session_id: "s1".to_string(),
        task_id: Some("t1".to_string()),
        tenant_id: None,
        workspace_path: None,
        context_pack: None,
        metadata: HashMap::new(),
    }
}

fn coordinator_with(
    validation: AgentResult,
    security: AgentResult,
    release: AgentResult,
    deployment: AgentResult,
    monitor: AgentResult,
    hitl: Arc<dyn HitlDispatcher>,
) -> ValidationDeploymentCoordinator {
    ValidationDeploymentCoordinator::new(
        agent("validation", validation),
        agent("security", security),
        agent("release", release),
        agent("deployment", deployment),
        agent("monitor", monitor),
        hitl,
    )
}

fn noop_result(agent_type: &str) -> AgentResult {
    AgentResult::success(agent_type, None)
}

#[tokio::test]
async fn run_validation_submits_hitl5_gate_on_success() {
    let hitl = Arc::new(RecordingHitlDispatcher::new());
    let coordinator = coordinator_with(
        AgentResult::success("validation", None).tap(|r| r.metadata.insert("validation_report".to_string(), passing_report())),
        AgentResult::success("security", None).tap(|r| r.metadata.insert("security_report".to_string(), passing_report())),
        noop_result("release"),
        noop_result("deployment"),
        noop_result("monitor"),
        hitl.clone(),
    );

    let result = coordinator
        .run_validation(&context(), json!({"diff": "..."}), vec!["criterion 1".to_string()], false)
        .await;

    assert!(result.success);
    assert!(result.pending_hitl5);
    assert!(result.hitl5_request_id.is_some());
    assert!(result.failed_at.is_none());
    assert_eq!(hitl.submitted().len(), 1);
    let bundle = &hitl.submitted()[0];
    assert_eq!(bundle.gate_type, GateType::Hitl5Validation);
    assert!(bundle.summary.contains("e2e_passed"));
    assert!(bundle.summary.contains("e2e_failed"));
}

#[tokio::test]
async fn run_validation_skip_hitl_succeeds_without_gate() {
    let hitl = Arc::new(RecordingHitlDispatcher::new());
    let coordinator = coordinator_with(
        AgentResult::success("validation", None).tap(|r| r.metadata.insert("validation_report".to_string(), passing_report())),
        AgentResult::success("security", None).tap(|r| r.metadata.insert("security_report".to_string(), passing_report())),
        noop_result("release"),
        noop_result("deployment"),
        noop_result("monitor"),
        hitl.clone(),
    );

    let result = coordinator.run_validation(&context(), json!({}), vec![], true).await;

    assert!(result.success);
    assert!(!result.pending_hitl5);
    assert!(result.hitl5_request_id.is_none());
    assert_eq!(hitl.submitted().len(), 0);
}

#[tokio::test]
async fn run_validation_fails_when_validation_report_does_not_pass() {
    let hitl = Arc::new(NullHitlDispatcher);
    let coordinator = coordinator_with(
        AgentResult::success("validation", None).tap(|r| r.metadata.insert("validation_report".to_string(), failing_report())),
        noop_result("security"),
        noop_result("release"),
        noop_result("deployment"),
        noop_result("monitor"),
        hitl,
    );

    let result = coordinator.run_validation(&context(), json!({}), vec![], true).await;

    assert!(!result.success);
    assert_eq!(result.failed_at.as_deref(), Some("validation"));
}

#[tokio::test]
async fn run_validation_fails_when_security_agent_errors() {
    let hitl = Arc::new(NullHitlDispatcher);
    let coordinator = coordinator_with(
        AgentResult::success("validation", None).tap(|r| r.metadata.insert("validation_report".to_string(), passing_report())),
        AgentResult::failure("security", None, "scanner crashed"),
        noop_result("release"),
        noop_result("deployment"),
        noop_result("monitor"),
        hitl,
    );

    let result = coordinator.run_validation(&context(), json!({}), vec![], true).await;

    assert!(!result.success);
    assert_eq!(result.failed_at.as_deref(), Some("security"));
    assert_eq!(result.error.as_deref(), Some("scanner crashed"));
}

#[tokio::test]
async fn run_deployment_submits_hitl6_gate_on_success() {
    let hitl = Arc::new(RecordingHitlDispatcher::new());
    let coordinator = coordinator_with(
        noop_result("validation"),
        noop_result("security"),
        AgentResult::success("release", None).tap(|r| r.metadata.insert("release_manifest".to_string(), json!({"version": "1.0.0"}))),
        AgentResult::success("deployment", None).tap(|r| r.metadata.insert("deployment_plan".to_string(), json!({"strategy": "canary"}))),
        noop_result("monitor"),
        hitl.clone(),
    );

    let result = coordinator
        .run_deployment(&context(), passing_report(), passing_report(), "production", false)
        .await;

    assert!(result.success);
    assert!(result.pending_hitl6);
    assert!(result.hitl6_request_id.is_some());
    assert_eq!(hitl.submitted().len(), 1);
    assert_eq!(hitl.submitted()[0].gate_type, GateType::Hitl6Release);
}

#[tokio::test]
async fn run_deployment_skip_hitl_runs_monitor_and_succeeds() {
    let hitl = Arc::new(NullHitlDispatcher);
    let coordinator = coordinator_with(
        noop_result("validation"),
        noop_result("security"),
        AgentResult::success("release", None).tap(|r| r.metadata.insert("release_manifest".to_string(), json!({"version": "1.0.0"}))),
        AgentResult::success("deployment", None).tap(|r| r.metadata.insert("deployment_plan".to_string(), json!({"strategy": "canary"}))),
        AgentResult::success("monitor", None).tap(|r| r.metadata.insert("monitoring_config".to_string(), json!({"dashboards": ["latency"]}))),
        hitl,
    );

    let result = coordinator
        .run_deployment(&context(), passing_report(), passing_report(), "production", true)
        .await;

    assert!(result.success);
    assert!(!result.pending_hitl6);
    assert!(result.monitoring_config.is_some());
}

#[tokio::test]
async fn run_deployment_fails_when_release_manifest_is_missing() {
    let hitl = Arc::new(NullHitlDispatcher);
    let coordinator = coordinator_with(
        noop_result("validation"),
        noop_result("security"),
        noop_result("release"),
        noop_result("deployment"),
        noop_result("monitor"),
        hitl,
    );

    let result = coordinator
        .run_deployment(&context(), passing_report(), passing_report(), "production", true)
        .await;

    assert!(!result.success);
    assert_eq!(result.failed_at.as_deref(), Some("release"));
}

#[tokio::test]
async fn monitor_failure_is_non_fatal() {
    let hitl = Arc::new(NullHitlDispatcher);
    let coordinator = coordinator_with(
        noop_result("validation"),
        noop_result("security"),
        AgentResult::success("release", None).tap(|r| r.metadata.insert("release_manifest".to_string(), json!({"version": "1.0.0"}))),
        AgentResult::success("deployment", None).tap(|r| r.metadata.insert("deployment_plan".to_string(), json!({"strategy": "canary"}))),
        AgentResult::failure("monitor", None, "dashboard provisioning failed"),
        hitl,
    );

    let result = coordinator
        .run_deployment(&context(), passing_report(), passing_report(), "production", true)
        .await;

    assert!(result.success);
    assert!(result.monitoring_config.is_none());
}

#[tokio::test]
async fn continue_from_hitl6_approval_runs_monitor() {
    let hitl = Arc::new(NullHitlDispatcher);
    let coordinator = coordinator_with(
        noop_result("validation"),
        noop_result("security"),
        noop_result("release"),
        noop_result("deployment"),
        AgentResult::success("monitor", None).tap(|r| r.metadata.insert("monitoring_config".to_string(), json!({"dashboards": []}))),
        hitl,
    );

    let result = coordinator
        .continue_from_hitl6_approval(&context(), json!({"version": "1.0.0"}), json!({"strategy": "canary"}))
        .await;

    assert!(result.success);
    assert!(result.monitoring_config.is_some());
    assert!(!result.pending_hitl6);
}

#[test]
fn handle_rejection_reports_gate_and_feedback() {
    let hitl = Arc::new(NullHitlDispatcher);
    let coordinator = coordinator_with(
        noop_result("validation"),
        noop_result("security"),
        noop_result("release"),
        noop_result("deployment"),
        noop_result("monitor"),
        hitl,
    );

    let result = coordinator.handle_rejection(GateType::Hitl5Validation, "needs more coverage");

    assert!(!result.success);
    assert_eq!(result.rejection_reason, "rejected at hitl-5-validation");
    assert_eq!(result.feedback, "needs more coverage");
}

trait Tap: Sized {
    fn tap(mut self, f: impl FnOnce(&mut Self)) -> Self {
        f(&mut self);
        self
    }
}

impl Tap for AgentResult {}
