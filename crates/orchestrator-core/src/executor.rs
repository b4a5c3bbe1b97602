//! The concurrent ready-set scheduler: drives a `TaskGraph` to a terminal
//! state, dispatching ready nodes in bounded-size batches.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::task::JoinSet;
use tracing::instrument;

use crate::cache::{task_key, TaskCache};
use crate::graph::{TaskGraph, TaskId, TaskResult, TaskStatus};
use crate::rate_limit::RateLimiter;
use crate::registry::AgentRegistry;
use crate::retry::{retry_with_backoff, RetryConfig};

/// Cooperative cancellation token. Checked between dispatch batches only.
#[derive(Clone, Default)]
pub struct AbortSignal(Arc<AtomicBool>);

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trip(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_tripped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

type NodeStartCallback = Box<dyn Fn(&TaskId) + Send + Sync>;
type NodeEndCallback = Box<dyn Fn(&TaskId, &TaskResult) + Send + Sync>;

/// Per-call execution options.
#[derive(Default)]
pub struct ExecuteOptions {
    pub max_concurrency: Option<usize>,
    pub abort_signal: Option<AbortSignal>,
    pub on_node_start: Option<NodeStartCallback>,
    pub on_node_end: Option<NodeEndCallback>,
}

impl ExecuteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = Some(max_concurrency);
        self
    }

    pub fn with_abort_signal(mut self, signal: AbortSignal) -> Self {
        self.abort_signal = Some(signal);
        self
    }
}

/// Outcome of one `Executor::execute` call.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub duration_ms: u64,
    pub node_results: HashMap<TaskId, TaskResult>,
}

/// Process-wide collaborators the executor drives against. Constructed
/// explicitly (no hidden module globals) so tests can substitute fresh
/// instances per run.
pub struct Executor {
    registry: Arc<AgentRegistry>,
    cache: Arc<TaskCache>,
    rate_limiter: Arc<RateLimiter>,
    default_max_concurrency: usize,
    /// Defaults for the retry helper (§6 `retry.maxAttempts`/`baseDelayMs`/
    /// `maxDelayMs`), applied to every node-level retry wrap.
    default_retry: RetryConfig,
}

impl Executor {
    pub fn new(
        registry: Arc<AgentRegistry>,
        cache: Arc<TaskCache>,
        rate_limiter: Arc<RateLimiter>,
        default_max_concurrency: usize,
        default_retry: RetryConfig,
    ) -> Self {
        Self {
            registry,
            cache,
            rate_limiter,
            default_max_concurrency,
            default_retry,
        }
    }

    #[instrument(skip(self, graph, opts), fields(node_count = graph.len()))]
    pub async fn execute(&self, mut graph: TaskGraph, opts: ExecuteOptions) -> ExecutionResult {
        let start = Instant::now();
        let max_concurrency = opts.max_concurrency.unwrap_or(self.default_max_concurrency).max(1);

        loop {
            if graph.is_complete() {
                break;
            }

            if let Some(signal) = &opts.abort_signal
                && signal.is_tripped() {
                    tracing::warn!("abort signal tripped, skipping remaining pending nodes");
                    let pending_ids: Vec<TaskId> = graph
                        .nodes()
                        .iter()
                        .filter(|n| n.status == TaskStatus::Pending)
                        .map(|n| n.id.clone())
                        .collect();
                    for id in pending_ids {
                        graph.set_status(&id, TaskStatus::Skipped);
                    }
                    break;
                }

            let ready: Vec<TaskId> = graph
                .ready_nodes()
                .into_iter()
                .take(max_concurrency)
                .map(|n| n.id.clone())
                .collect();

            if ready.is_empty() {
                tracing::error!("deadlock: no ready nodes but graph is incomplete");
                break;
            }

            for id in &ready {
                graph.set_status(id, TaskStatus::Running);
                if let Some(cb) = &opts.on_node_start {
                    cb(id);
                }
            }

            // Each node runs on its own spawned task so a panicking agent adapter
            // cannot bring down the scheduling loop; a `JoinError` is folded
            // into an `AGENT_EXECUTION_FAILED`-flavored error result below.
            let mut joinset: JoinSet<TaskResult> = JoinSet::new();
            let mut task_ids: HashMap<tokio::task::Id, TaskId> = HashMap::new();
            for id in &ready {
                let node = graph.get(id).expect("ready node must exist").clone();
                let registry = self.registry.clone();
                let cache = self.cache.clone();
                let rate_limiter = self.rate_limiter.clone();
                let default_retry = self.default_retry;
                let handle = joinset.spawn(async move {
                    execute_node(&node, &registry, &cache, &rate_limiter, &default_retry).await
                });
                task_ids.insert(handle.id(), id.clone());
            }

            while let Some(joined) = joinset.join_next_with_id().await {
                let (id, result) = match joined {
                    Ok((task_id, result)) => {
                        (task_ids.remove(&task_id).expect("spawned task must be tracked"), result)
                    }
                    Err(join_err) => {
                        let id = task_ids
                            .remove(&join_err.id())
                            .expect("spawned task must be tracked");
                        tracing::error!(node_id = %id, error = %join_err, "agent adapter panicked");
                        (
                            id,
                            TaskResult::error(format!(
                                "agent execution failed unexpectedly: {join_err}"
                            )),
                        )
                    }
                };
                let status = if result.is_ok() {
                    TaskStatus::Done
                } else {
                    TaskStatus::Failed
                };
                graph.set_result(&id, status, result.clone());
                if status == TaskStatus::Failed {
                    graph.skip_downstream(&id);
                }
                if let Some(cb) = &opts.on_node_end {
                    cb(&id, &result);
                }
            }
        }

        let success = graph.success();
        let duration_ms = start.elapsed().as_millis() as u64;
        let node_results = graph
            .nodes()
            .iter()
            .filter_map(|n| n.result.clone().map(|r| (n.id.clone(), r)))
            .collect();

        tracing::info!(success, duration_ms, "graph execution finished");

        ExecutionResult {
            success,
            duration_ms,
            node_results,
        }
    }
}

/// Execute one node: resolve agent, consult cache, throttle, invoke (with
/// optional retry), memoize on success.
async fn execute_node(
    node: &crate::graph::TaskNode,
    registry: &AgentRegistry,
    cache: &TaskCache,
    rate_limiter: &RateLimiter,
    default_retry: &RetryConfig,
) -> TaskResult {
    let agent = match &node.assign_to {
        Some(selector) => registry.pick(selector),
        None => registry.first(),
    };

    let Some(agent) = agent else {
        return TaskResult::error(format!(
            "No agent available for node '{}' (assignTo: {:?})",
            node.id, node.assign_to
        ));
    };

    let cache_key = task_key(&node.task, agent.name());
    if cache.enabled()
        && let Some(cached) = cache.get(&cache_key) {
            tracing::debug!(node_id = %node.id, "cache hit");
            return TaskResult::ok(cached);
        }

    rate_limiter.acquire(agent.name()).await;

    // A node-level retry count always wins; absent one, fall back to the
    // configured default attempt budget (§6 `retry.maxAttempts`).
    let retries = if node.config.retries > 0 {
        node.config.retries
    } else {
        default_retry.max_attempts.saturating_sub(1)
    };

    let result = if retries > 0 {
        let retry_config = RetryConfig {
            max_attempts: retries + 1,
            base_delay_ms: default_retry.base_delay_ms,
            max_delay_ms: default_retry.max_delay_ms,
        };
        retry_with_backoff(retry_config, || async {
            let outcome = agent.execute(node).await;
            if outcome.is_ok() {
                Ok(outcome)
            } else {
                Err(outcome.output().to_string())
            }
        })
        .await
        .unwrap_or_else(TaskResult::error)
    } else {
        agent.execute(node).await
    };

    if result.is_ok() && cache.enabled() {
        cache.set(cache_key, result.output().to_string());
    }

    result
}
