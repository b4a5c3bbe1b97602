//! Hand-rolled validation of the wire payloads the planner and HTTP surface
//! accept (§6). No schema-description crate is used — validation mirrors the
//! straightforward field checks the rest of this codebase favors.

use serde::Deserialize;

use crate::error::{OrchestratorError, Result};
use crate::graph::RawTaskNode;

/// A goal submission accepted by the HTTP surface.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub goal: String,
    #[serde(default)]
    pub max_concurrency: Option<u32>,
    #[serde(default)]
    pub max_steps: Option<u32>,
}

impl Submission {
    pub fn validate(&self) -> Result<()> {
        if self.goal.trim().is_empty() {
            return Err(OrchestratorError::ValidationFailed(
                "goal must be a non-empty, trimmed string".to_string(),
            ));
        }
        if let Some(max_concurrency) = self.max_concurrency
            && max_concurrency < 1 {
                return Err(OrchestratorError::ValidationFailed(
                    "maxConcurrency must be >= 1".to_string(),
                ));
            }
        if let Some(max_steps) = self.max_steps
            && max_steps < 1 {
                return Err(OrchestratorError::ValidationFailed(
                    "maxSteps must be >= 1".to_string(),
                ));
            }
        Ok(())
    }
}

/// Raw shape of a planner LLM response, prior to `TaskGraph::create`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannerResponse {
    pub nodes: Vec<RawTaskNode>,
    #[serde(default)]
    pub synthesizer_prompt: Option<String>,
}

/// Validate the parsed planner response shape: non-empty node array, every
/// node has a non-empty `id` and `task`.
pub fn validate_planner_response(response: &PlannerResponse) -> Result<()> {
    if response.nodes.is_empty() {
        return Err(OrchestratorError::ValidationFailed(
            "planner response must contain at least one node".to_string(),
        ));
    }
    for node in &response.nodes {
        if node.id.trim().is_empty() {
            return Err(OrchestratorError::ValidationFailed(
                "every node must have a non-empty id".to_string(),
            ));
        }
        if node.task.trim().is_empty() {
            return Err(OrchestratorError::ValidationFailed(format!(
                "node '{}' must have a non-empty task description",
                node.id
            )));
        }
    }
    Ok(())
}
