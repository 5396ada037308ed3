// SPDX-License-Identifier: MIT

//! Evidence bundles submitted alongside a gate request. Content hashing is
//! out of scope; `content_hash` is carried as an opaque field that may be
//! empty.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateType {
    Hitl5Validation,
    Hitl6Release,
}

impl GateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateType::Hitl5Validation => "hitl-5-validation",
            GateType::Hitl6Release => "hitl-6-release",
        }
    }
}

impl std::fmt::Display for GateType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub item_type: String,
    pub path: String,
    pub description: String,
    #[serde(default)]
    pub content_hash: String,
}

impl EvidenceItem {
    pub fn new(item_type: impl Into<String>, path: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            item_type: item_type.into(),
            path: path.into(),
            description: description.into(),
            content_hash: String::new(),
        }
    }
}

/// What gets attached to a gate request: the artifacts a reviewer needs plus
/// a human-readable summary of what passed or failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceBundle {
    pub task_id: String,
    pub gate_type: GateType,
    #[serde(default)]
    pub git_sha: Option<String>,
    pub items: Vec<EvidenceItem>,
    pub summary: String,
}

#[cfg(test)]
#[path = "evidence_tests.rs"]
mod tests;
