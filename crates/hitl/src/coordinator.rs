// SPDX-License-Identifier: MIT

//! The validation/deployment phase sequencer. Drives five injected
//! agents through a fixed order, extracts their reports from
//! `AgentResult.metadata`, and submits a gate between each phase and the
//! next unless `skip_hitl` is set. The individual agent implementations are
//! out of scope; this module only sequences and interprets their results.

use std::collections::HashMap;
use std::sync::Arc;

use asdlc_core::{AgentContext, AgentHandler};
use serde_json::Value;

use crate::evidence::{EvidenceBundle, EvidenceItem, GateType};
use crate::gate::HitlDispatcher;

#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub success: bool,
    pub validation_report: Option<Value>,
    pub security_report: Option<Value>,
    pub pending_hitl5: bool,
    pub hitl5_request_id: Option<String>,
    pub failed_at: Option<String>,
    pub error: Option<String>,
}

impl ValidationResult {
    fn failed(at: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            failed_at: Some(at.into()),
            error: Some(error.into()),
            ..Self::default()
        }
    }

    fn pending_approval(validation_report: Value, security_report: Value, request_id: impl Into<String>) -> Self {
        Self {
            success: true,
            validation_report: Some(validation_report),
            security_report: Some(security_report),
            pending_hitl5: true,
            hitl5_request_id: Some(request_id.into()),
            ..Self::default()
        }
    }

    fn succeeded(validation_report: Value, security_report: Value) -> Self {
        Self {
            success: true,
            validation_report: Some(validation_report),
            security_report: Some(security_report),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DeploymentResult {
    pub success: bool,
    pub release_manifest: Option<Value>,
    pub deployment_plan: Option<Value>,
    pub monitoring_config: Option<Value>,
    pub pending_hitl6: bool,
    pub hitl6_request_id: Option<String>,
    pub failed_at: Option<String>,
    pub error: Option<String>,
}

impl DeploymentResult {
    fn failed(at: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            failed_at: Some(at.into()),
            error: Some(error.into()),
            ..Self::default()
        }
    }

    fn pending_approval(release_manifest: Value, deployment_plan: Value, request_id: impl Into<String>) -> Self {
        Self {
            success: true,
            release_manifest: Some(release_manifest),
            deployment_plan: Some(deployment_plan),
            pending_hitl6: true,
            hitl6_request_id: Some(request_id.into()),
            ..Self::default()
        }
    }

    fn succeeded(release_manifest: Value, deployment_plan: Value, monitoring_config: Option<Value>) -> Self {
        Self {
            success: true,
            release_manifest: Some(release_manifest),
            deployment_plan: Some(deployment_plan),
            monitoring_config,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct RejectionResult {
    pub success: bool,
    pub rejection_reason: String,
    pub feedback: String,
}

fn report_passed(report: &Value) -> bool {
    report.get("passed").and_then(Value::as_bool).unwrap_or(false)
}

fn report_keys(report: &Value) -> String {
    match report.as_object() {
        Some(map) if !map.is_empty() => map.keys().cloned().collect::<Vec<_>>().join(", "),
        _ => "n/a".to_string(),
    }
}

fn status_label(report: &Value) -> &'static str {
    if report_passed(report) {
        "PASSED"
    } else {
        "FAILED"
    }
}

fn artifact_items(item_type: &str, paths: &[String]) -> Vec<EvidenceItem> {
    paths
        .iter()
        .map(|path| EvidenceItem::new(item_type, path.clone(), format!("Artifact produced by {item_type}")))
        .collect()
}

fn hitl5_summary(validation_report: &Value, security_report: &Value) -> String {
    format!(
        "## Validation & Security Review\n\n\
         **Validation status:** {}\n\
         **Security status:** {}\n\n\
         ### Validation report fields\n- {}\n\n\
         ### Security report fields\n- {}\n",
        status_label(validation_report),
        status_label(security_report),
        report_keys(validation_report),
        report_keys(security_report),
    )
}

fn hitl6_summary(release_manifest: &Value, deployment_plan: &Value) -> String {
    format!(
        "## Release & Deployment Review\n\n\
         ### Release manifest fields\n- {}\n\n\
         ### Deployment plan fields\n- {}\n",
        report_keys(release_manifest),
        report_keys(deployment_plan),
    )
}

/// Sequences validation -> security -> (gate) and release -> deployment ->
/// (gate) -> monitor, against whatever five `AgentHandler`s are injected.
pub struct ValidationDeploymentCoordinator {
    validation_agent: Arc<dyn AgentHandler>,
    security_agent: Arc<dyn AgentHandler>,
    release_agent: Arc<dyn AgentHandler>,
    deployment_agent: Arc<dyn AgentHandler>,
    monitor_agent: Arc<dyn AgentHandler>,
    hitl: Arc<dyn HitlDispatcher>,
}

impl ValidationDeploymentCoordinator {
    pub fn new(
        validation_agent: Arc<dyn AgentHandler>,
        security_agent: Arc<dyn AgentHandler>,
        release_agent: Arc<dyn AgentHandler>,
        deployment_agent: Arc<dyn AgentHandler>,
        monitor_agent: Arc<dyn AgentHandler>,
        hitl: Arc<dyn HitlDispatcher>,
    ) -> Self {
        Self {
            validation_agent,
            security_agent,
            release_agent,
            deployment_agent,
            monitor_agent,
            hitl,
        }
    }

    /// Run validation then security; submit a HITL-5 gate unless
    /// `skip_hitl`. A gate-submission failure is logged and treated as
    /// auto-approved rather than failing the phase.
    pub async fn run_validation(
        &self,
        context: &AgentContext,
        implementation: Value,
        acceptance_criteria: Vec<String>,
        skip_hitl: bool,
    ) -> ValidationResult {
        let mut metadata = HashMap::new();
        metadata.insert("implementation".to_string(), implementation);
        metadata.insert("acceptance_criteria".to_string(), serde_json::json!(acceptance_criteria));

        let validation_result = self.validation_agent.execute(context, &metadata).await;
        if !validation_result.success {
            return ValidationResult::failed(
                "validation",
                validation_result.error_message.unwrap_or_else(|| "validation agent failed".to_string()),
            );
        }
        let validation_report = match validation_result.metadata.get("validation_report") {
            Some(report) if report_passed(report) => report.clone(),
            Some(_) => return ValidationResult::failed("validation", "validation checks did not pass"),
            None => return ValidationResult::failed("validation", "validation agent returned no validation_report"),
        };

        let security_result = self.security_agent.execute(context, &metadata).await;
        if !security_result.success {
            return ValidationResult::failed(
                "security",
                security_result.error_message.unwrap_or_else(|| "security agent failed".to_string()),
            );
        }
        let security_report = match security_result.metadata.get("security_report") {
            Some(report) if report_passed(report) => report.clone(),
            Some(_) => return ValidationResult::failed("security", "security scan found blocking findings"),
            None => return ValidationResult::failed("security", "security agent returned no security_report"),
        };

        if !skip_hitl {
            let mut items = artifact_items("integration_tests", &validation_result.artifact_paths);
            items.extend(artifact_items("security_scan", &security_result.artifact_paths));
            let bundle = EvidenceBundle {
                task_id: context.task_id.clone().unwrap_or_default(),
                gate_type: GateType::Hitl5Validation,
                git_sha: context.metadata.get("git_sha").and_then(Value::as_str).map(str::to_string),
                items,
                summary: hitl5_summary(&validation_report, &security_report),
            };

            match self.hitl.request_gate(bundle).await {
                Ok(request_id) => {
                    return ValidationResult::pending_approval(validation_report, security_report, request_id.to_string());
                }
                Err(err) => {
                    tracing::warn!(error = %err, "failed to submit HITL-5 gate, proceeding without approval");
                }
            }
        }

        ValidationResult::succeeded(validation_report, security_report)
    }

    /// Run release then deployment; submit a HITL-6 gate unless
    /// `skip_hitl`, then run the monitor agent. Monitor failure is
    /// non-fatal: the phase still succeeds with `monitoring_config: None`.
    pub async fn run_deployment(
        &self,
        context: &AgentContext,
        validation_report: Value,
        security_report: Value,
        target_environment: &str,
        skip_hitl: bool,
    ) -> DeploymentResult {
        let mut release_metadata = HashMap::new();
        release_metadata.insert("validation_report".to_string(), validation_report);
        release_metadata.insert("security_report".to_string(), security_report);

        let release_result = self.release_agent.execute(context, &release_metadata).await;
        if !release_result.success {
            return DeploymentResult::failed(
                "release",
                release_result.error_message.unwrap_or_else(|| "release agent failed".to_string()),
            );
        }
        let release_manifest = match release_result.metadata.get("release_manifest") {
            Some(manifest) => manifest.clone(),
            None => return DeploymentResult::failed("release", "release agent returned no release_manifest"),
        };

        let mut deployment_metadata = HashMap::new();
        deployment_metadata.insert("release_manifest".to_string(), release_manifest.clone());
        deployment_metadata.insert("target_environment".to_string(), serde_json::json!(target_environment));

        let deployment_result = self.deployment_agent.execute(context, &deployment_metadata).await;
        if !deployment_result.success {
            return DeploymentResult::failed(
                "deployment",
                deployment_result.error_message.unwrap_or_else(|| "deployment agent failed".to_string()),
            );
        }
        let deployment_plan = match deployment_result.metadata.get("deployment_plan") {
            Some(plan) => plan.clone(),
            None => return DeploymentResult::failed("deployment", "deployment agent returned no deployment_plan"),
        };

        if !skip_hitl {
            let mut items = artifact_items("release_manifest", &release_result.artifact_paths);
            items.extend(artifact_items("deployment_plan", &deployment_result.artifact_paths));
            let bundle = EvidenceBundle {
                task_id: context.task_id.clone().unwrap_or_default(),
                gate_type: GateType::Hitl6Release,
                git_sha: context.metadata.get("git_sha").and_then(Value::as_str).map(str::to_string),
                items,
                summary: hitl6_summary(&release_manifest, &deployment_plan),
            };

            match self.hitl.request_gate(bundle).await {
                Ok(request_id) => {
                    return DeploymentResult::pending_approval(release_manifest, deployment_plan, request_id.to_string());
                }
                Err(err) => {
                    tracing::warn!(error = %err, "failed to submit HITL-6 gate, proceeding without approval");
                }
            }
        }

        self.run_monitor(context, release_manifest, deployment_plan).await
    }

    /// Resume after a HITL-6 approval: the only remaining step is the
    /// monitor agent.
    pub async fn continue_from_hitl6_approval(
        &self,
        context: &AgentContext,
        release_manifest: Value,
        deployment_plan: Value,
    ) -> DeploymentResult {
        self.run_monitor(context, release_manifest, deployment_plan).await
    }

    async fn run_monitor(&self, context: &AgentContext, release_manifest: Value, deployment_plan: Value) -> DeploymentResult {
        let mut metadata = HashMap::new();
        metadata.insert("release_manifest".to_string(), release_manifest.clone());
        metadata.insert("deployment_plan".to_string(), deployment_plan.clone());

        let monitor_result = self.monitor_agent.execute(context, &metadata).await;
        let monitoring_config = if monitor_result.success {
            monitor_result.metadata.get("monitoring_config").cloned()
        } else {
            tracing::warn!(
                task_id = ?context.task_id,
                error = ?monitor_result.error_message,
                "monitor agent failed, continuing deployment without a monitoring_config"
            );
            None
        };

        DeploymentResult::succeeded(release_manifest, deployment_plan, monitoring_config)
    }

    /// A rejection at either gate is always a hard stop: feed the
    /// reviewer's feedback back to whatever drives the retry.
    pub fn handle_rejection(&self, gate_type: GateType, feedback: impl Into<String>) -> RejectionResult {
        RejectionResult {
            success: false,
            rejection_reason: format!("rejected at {gate_type}"),
            feedback: feedback.into(),
        }
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
