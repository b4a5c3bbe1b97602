//! Named lookup of agent adapters, plus a capability index.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{OrchestratorError, Result};
use crate::graph::{TaskNode, TaskResult};

/// A named worker capable of executing a task node. Never raises for normal
/// failure — encodes failure as `TaskResult::Error`. Unexpected panics/raises
/// are tolerated and wrapped by the executor.
#[async_trait]
pub trait AgentAdapter: Send + Sync {
    fn name(&self) -> &str;
    fn capabilities(&self) -> &[String];
    async fn execute(&self, node: &TaskNode) -> TaskResult;
}

/// Registration-ordered, immutable-after-setup lookup of agents.
#[derive(Default)]
pub struct AgentRegistry {
    by_name: HashMap<String, Arc<dyn AgentAdapter>>,
    order: Vec<String>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, agent: Arc<dyn AgentAdapter>) -> Result<()> {
        let name = agent.name().to_string();
        if self.by_name.contains_key(&name) {
            return Err(OrchestratorError::DuplicateRegistration(name));
        }
        self.order.push(name.clone());
        self.by_name.insert(name, agent);
        Ok(())
    }

    /// Resolve `selector`: exact name match first, else any adapter whose
    /// capabilities include it, else `None`.
    pub fn pick(&self, selector: &str) -> Option<Arc<dyn AgentAdapter>> {
        if let Some(agent) = self.by_name.get(selector) {
            return Some(agent.clone());
        }
        self.order.iter().find_map(|name| {
            let agent = &self.by_name[name];
            agent
                .capabilities()
                .iter()
                .any(|cap| cap == selector)
                .then(|| agent.clone())
        })
    }

    /// The first registered agent, used when a node has no `assign_to`.
    pub fn first(&self) -> Option<Arc<dyn AgentAdapter>> {
        self.order.first().map(|name| self.by_name[name].clone())
    }

    /// Stable registration-order listing.
    pub fn list(&self) -> Vec<Arc<dyn AgentAdapter>> {
        self.order.iter().map(|name| self.by_name[name].clone()).collect()
    }

    pub fn names(&self) -> &[String] {
        &self.order
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
