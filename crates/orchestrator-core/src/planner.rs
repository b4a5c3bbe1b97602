//! Turns a free-form goal into a validated `TaskGraph` by calling an LLM
//! (either a registered planner agent, or a gateway client directly) and
//! parsing its JSON response.

use std::sync::Arc;

use tracing::instrument;
use uuid::Uuid;

use crate::error::{OrchestratorError, Result};
use crate::gateway::GatewayClient;
use crate::graph::{NodeConfig, TaskGraph, TaskNode, TaskStatus};
use crate::registry::{AgentAdapter, AgentRegistry};
use crate::validate::{self, PlannerResponse};

const SYSTEM_PROMPT: &str = "You are a planning assistant. Decompose the goal into a directed \
acyclic graph of subtasks and reply with JSON only: \
{\"nodes\":[{\"id\":\"...\",\"task\":\"...\",\"dependsOn\":[],\"assignTo\":null}],\"synthesizerPrompt\":null}.";

const MAX_RAW_RESPONSE_PREVIEW: usize = 500;

/// Source of the LLM call a planner dispatches to. Exactly one is needed to
/// call `plan`.
pub enum PlanSource {
    /// A full agent adapter, invoked with a synthetic planning node.
    Agent(Arc<dyn AgentAdapter>),
    /// A gateway client, invoked directly with a fresh session key.
    Gateway(Arc<dyn GatewayClient>),
}

pub struct Planner {
    source: PlanSource,
}

impl Planner {
    pub fn new(source: PlanSource) -> Self {
        Self { source }
    }

    /// Build a `Planner` that prefers dispatching through a registered
    /// planner agent (by name) and falls back to the gateway client.
    pub fn from_registry_or_gateway(
        registry: &AgentRegistry,
        planner_agent_name: Option<&str>,
        gateway: Option<Arc<dyn GatewayClient>>,
    ) -> Result<Self> {
        if let Some(name) = planner_agent_name
            && let Some(agent) = registry.pick(name) {
                return Ok(Self::new(PlanSource::Agent(agent)));
            }
        if let Some(gateway) = gateway {
            return Ok(Self::new(PlanSource::Gateway(gateway)));
        }
        Err(OrchestratorError::ConfigMissing(
            "planner requires either a registered planner agent or a gateway client".to_string(),
        ))
    }

    #[instrument(skip(self, registry), fields(goal = %goal))]
    pub async fn plan(&self, goal: &str, registry: &AgentRegistry) -> Result<TaskGraph> {
        let prompt = build_prompt(goal, registry);
        let raw = self.call_llm(&prompt).await?;
        let cleaned = strip_fences(&raw);

        let response: PlannerResponse = serde_json::from_str(cleaned).map_err(|err| {
            let preview: String = raw.chars().take(MAX_RAW_RESPONSE_PREVIEW).collect();
            tracing::warn!(error = %err, raw_preview = %preview, "planner response failed to parse");
            OrchestratorError::ParseFailed {
                message: format!("{err} (raw preview: {preview})"),
            }
        })?;

        validate::validate_planner_response(&response)?;

        TaskGraph::create(goal, response.nodes, response.synthesizer_prompt)
    }

    async fn call_llm(&self, prompt: &str) -> Result<String> {
        match &self.source {
            PlanSource::Agent(agent) => {
                let synthetic = TaskNode {
                    id: "__planner__".to_string(),
                    task: prompt.to_string(),
                    depends_on: vec![],
                    assign_to: None,
                    status: TaskStatus::Pending,
                    result: None,
                    config: NodeConfig::default(),
                };
                let result = agent.execute(&synthetic).await;
                if result.is_ok() {
                    Ok(result.output().to_string())
                } else {
                    Err(OrchestratorError::AgentExecutionFailed(
                        result.output().to_string(),
                    ))
                }
            }
            PlanSource::Gateway(gateway) => {
                let session_key = format!("plan-{}", Uuid::new_v4());
                gateway.chat(prompt, &session_key).await
            }
        }
    }
}

fn build_prompt(goal: &str, registry: &AgentRegistry) -> String {
    let mut prompt = format!("{SYSTEM_PROMPT}\n\nGoal: {goal}");
    if !registry.is_empty() {
        let names = registry.names().join(", ");
        prompt.push_str(&format!("\n\nAvailable agents: {names}"));
    }
    prompt
}

/// Strip a single optional leading ```` ``` ```` (with optional language tag)
/// and a single optional trailing ```` ``` ````, then trim whitespace.
fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(after_open) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let after_open = after_open
        .split_once('\n')
        .map(|(_, rest)| rest)
        .unwrap_or(after_open);
    after_open.strip_suffix("```").unwrap_or(after_open).trim()
}
