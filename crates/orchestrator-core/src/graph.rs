//! Task graph: the DAG data structure plus readiness, completion, and
//! failure-propagation predicates the executor drives against.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{OrchestratorError, Result};

/// Unique identifier for a task node within a single graph.
pub type TaskId = String;

/// Current lifecycle stage of a node. Once terminal, never revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Done,
    Failed,
    Skipped,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Skipped)
    }
}

/// The outcome of one node's execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskResult {
    Ok { output: String },
    Error { output: String },
}

impl TaskResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self::Ok {
            output: output.into(),
        }
    }

    pub fn error(output: impl Into<String>) -> Self {
        Self::Error {
            output: output.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }

    pub fn output(&self) -> &str {
        match self {
            Self::Ok { output } | Self::Error { output } => output,
        }
    }
}

/// Per-node overrides the planner or caller may attach.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub retries: u32,
}

/// Raw node shape accepted from the planner/LLM before graph construction
/// validates it. Field defaults mirror the wire payload in the spec (§6).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTaskNode {
    pub id: String,
    pub task: String,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub assign_to: Option<String>,
    #[serde(default)]
    pub config: NodeConfig,
}

/// One subtask in the graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskNode {
    pub id: TaskId,
    pub task: String,
    pub depends_on: Vec<TaskId>,
    pub assign_to: Option<String>,
    pub status: TaskStatus,
    pub result: Option<TaskResult>,
    pub config: NodeConfig,
}

impl TaskNode {
    fn from_raw(raw: RawTaskNode) -> Self {
        Self {
            id: raw.id,
            task: raw.task,
            depends_on: raw.depends_on,
            assign_to: raw.assign_to,
            status: TaskStatus::Pending,
            result: None,
            config: raw.config,
        }
    }
}

/// A planned goal plus its DAG of subtasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskGraph {
    pub goal: String,
    pub synthesizer_prompt: Option<String>,
    nodes: Vec<TaskNode>,
    /// id -> index into `nodes`, built once at construction.
    #[serde(skip)]
    index: HashMap<TaskId, usize>,
    /// id -> ids that depend on it, built once at construction.
    #[serde(skip)]
    dependents: HashMap<TaskId, Vec<TaskId>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisitColor {
    Visiting,
    Done,
}

impl TaskGraph {
    /// Validate and construct a graph from raw planner/LLM output.
    ///
    /// Enforces: unique ids, no dangling dependencies, acyclicity (DFS with
    /// a "visiting" color so any back-edge is reported by id).
    pub fn create(
        goal: impl Into<String>,
        raw_nodes: Vec<RawTaskNode>,
        synthesizer_prompt: Option<String>,
    ) -> Result<Self> {
        let mut index = HashMap::with_capacity(raw_nodes.len());
        for (i, raw) in raw_nodes.iter().enumerate() {
            if index.insert(raw.id.clone(), i).is_some() {
                return Err(OrchestratorError::GraphInvalid(format!(
                    "duplicate node id '{}'",
                    raw.id
                )));
            }
        }

        for raw in &raw_nodes {
            for dep in &raw.depends_on {
                if !index.contains_key(dep) {
                    return Err(OrchestratorError::GraphInvalid(format!(
                        "node '{}' depends on unknown node '{}'",
                        raw.id, dep
                    )));
                }
            }
        }

        let mut colors: HashMap<&str, VisitColor> = HashMap::new();
        for raw in &raw_nodes {
            detect_cycle(&raw.id, &raw_nodes, &index, &mut colors)?;
        }

        let mut dependents: HashMap<TaskId, Vec<TaskId>> = HashMap::new();
        for raw in &raw_nodes {
            for dep in &raw.depends_on {
                dependents.entry(dep.clone()).or_default().push(raw.id.clone());
            }
        }

        let nodes = raw_nodes.into_iter().map(TaskNode::from_raw).collect();

        Ok(Self {
            goal: goal.into(),
            synthesizer_prompt,
            nodes,
            index,
            dependents,
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[TaskNode] {
        &self.nodes
    }

    pub fn get(&self, id: &str) -> Option<&TaskNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut TaskNode> {
        self.index.get(id).copied().map(move |i| &mut self.nodes[i])
    }

    /// Nodes eligible to run: `pending` with every dependency `done`.
    /// Order is deterministic: the declaration order of the node sequence.
    pub fn ready_nodes(&self) -> Vec<&TaskNode> {
        self.nodes
            .iter()
            .filter(|node| {
                node.status == TaskStatus::Pending
                    && node.depends_on.iter().all(|dep| {
                        self.get(dep)
                            .map(|d| d.status == TaskStatus::Done)
                            .unwrap_or(false)
                    })
            })
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.nodes.iter().all(|n| n.status.is_terminal())
    }

    pub fn success(&self) -> bool {
        self.nodes.iter().all(|n| n.status == TaskStatus::Done)
    }

    pub fn set_status(&mut self, id: &str, status: TaskStatus) {
        if let Some(node) = self.get_mut(id) {
            node.status = status;
        }
    }

    pub fn set_result(&mut self, id: &str, status: TaskStatus, result: TaskResult) {
        if let Some(node) = self.get_mut(id) {
            node.status = status;
            node.result = Some(result);
        }
    }

    /// Transitively mark every still-`pending` node whose dependency closure
    /// contains `failed_id` as `skipped`. Already-`running` nodes are left
    /// alone; once marked, a descendant is never un-skipped.
    pub fn skip_downstream(&mut self, failed_id: &str) {
        let mut queue: Vec<TaskId> = self
            .dependents
            .get(failed_id)
            .cloned()
            .unwrap_or_default();
        let mut seen: HashSet<TaskId> = HashSet::new();

        while let Some(id) = queue.pop() {
            if !seen.insert(id.clone()) {
                continue;
            }
            let was_pending = self
                .get(&id)
                .map(|n| n.status == TaskStatus::Pending)
                .unwrap_or(false);
            if was_pending {
                self.set_status(&id, TaskStatus::Skipped);
                if let Some(next) = self.dependents.get(&id) {
                    queue.extend(next.iter().cloned());
                }
            }
        }
    }
}

fn detect_cycle<'a>(
    start: &'a str,
    raw_nodes: &'a [RawTaskNode],
    index: &HashMap<String, usize>,
    colors: &mut HashMap<&'a str, VisitColor>,
) -> Result<()> {
    if let Some(VisitColor::Done) = colors.get(start) {
        return Ok(());
    }
    colors.insert(start, VisitColor::Visiting);

    let node = &raw_nodes[index[start]];
    for dep in &node.depends_on {
        match colors.get(dep.as_str()) {
            Some(VisitColor::Visiting) => {
                return Err(OrchestratorError::GraphInvalid(format!(
                    "cycle detected at node '{}'",
                    dep
                )));
            }
            Some(VisitColor::Done) => continue,
            None => {
                let dep_ref: &'a str = raw_nodes[index[dep]].id.as_str();
                detect_cycle(dep_ref, raw_nodes, index, colors)?;
            }
        }
    }

    colors.insert(start, VisitColor::Done);
    Ok(())
}
