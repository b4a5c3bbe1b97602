//! End-to-end scenarios against an in-process mock agent, exercising the
//! planner → graph → executor pipeline as a caller would.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use orchestrator_core::{
    AbortSignal, AgentAdapter, AgentRegistry, ExecuteOptions, Executor, NodeConfig, RateLimiter,
    RawTaskNode, RetryConfig, TaskCache, TaskGraph, TaskNode, TaskResult,
};

struct ScriptedAgent {
    name: String,
    script: Mutex<Vec<TaskResult>>,
    calls: AtomicU32,
}

impl ScriptedAgent {
    fn always_ok(name: &str, output: &str) -> Self {
        Self {
            name: name.to_string(),
            script: Mutex::new(vec![TaskResult::ok(output)]),
            calls: AtomicU32::new(0),
        }
    }

    fn scripted(name: &str, script: Vec<TaskResult>) -> Self {
        Self {
            name: name.to_string(),
            script: Mutex::new(script),
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl AgentAdapter for ScriptedAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> &[String] {
        &[]
    }

    async fn execute(&self, _node: &TaskNode) -> TaskResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut script = self.script.lock().unwrap();
        if script.len() > 1 {
            script.remove(0)
        } else {
            script[0].clone()
        }
    }
}

fn raw(id: &str, deps: &[&str]) -> RawTaskNode {
    RawTaskNode {
        id: id.to_string(),
        task: format!("task {id}"),
        depends_on: deps.iter().map(|d| d.to_string()).collect(),
        assign_to: None,
        config: NodeConfig::default(),
    }
}

fn executor(registry: AgentRegistry, max_concurrency: usize) -> Executor {
    Executor::new(
        Arc::new(registry),
        Arc::new(TaskCache::new(false, Duration::from_secs(60))),
        Arc::new(RateLimiter::new(false, 1, Duration::from_secs(1))),
        max_concurrency,
        RetryConfig {
            max_attempts: 1,
            base_delay_ms: 1,
            max_delay_ms: 2,
        },
    )
}

/// S1 — linear chain A -> B -> C, all succeed.
#[tokio::test]
async fn s1_linear_chain_succeeds_in_order() {
    let mut registry = AgentRegistry::new();
    registry
        .register(Arc::new(ScriptedAgent::always_ok("worker", "X")))
        .unwrap();

    let graph = TaskGraph::create(
        "goal",
        vec![raw("a", &[]), raw("b", &["a"]), raw("c", &["b"])],
        None,
    )
    .unwrap();

    let result = executor(registry, 2).execute(graph, ExecuteOptions::new()).await;

    assert!(result.success);
    assert_eq!(result.node_results.len(), 3);
    for id in ["a", "b", "c"] {
        assert_eq!(result.node_results[id].output(), "X");
    }
}

/// S2 — diamond A -> {B, C} -> D with maxConcurrency=2; all succeed.
#[tokio::test]
async fn s2_diamond_with_parallelism() {
    let mut registry = AgentRegistry::new();
    registry
        .register(Arc::new(ScriptedAgent::always_ok("worker", "X")))
        .unwrap();

    let graph = TaskGraph::create(
        "goal",
        vec![
            raw("a", &[]),
            raw("b", &["a"]),
            raw("c", &["a"]),
            raw("d", &["b", "c"]),
        ],
        None,
    )
    .unwrap();

    let result = executor(registry, 2).execute(graph, ExecuteOptions::new()).await;

    assert!(result.success);
    assert_eq!(result.node_results.len(), 4);
}

/// S3 — failure propagation: A fails, B/C/D (all downstream of A) are skipped.
#[tokio::test]
async fn s3_failure_propagation() {
    let mut registry = AgentRegistry::new();
    registry
        .register(Arc::new(ScriptedAgent::scripted(
            "worker",
            vec![TaskResult::error("boom")],
        )))
        .unwrap();

    let graph = TaskGraph::create(
        "goal",
        vec![raw("a", &[]), raw("b", &["a"]), raw("c", &["b"]), raw("d", &["a"])],
        None,
    )
    .unwrap();

    let result = executor(registry, 2).execute(graph, ExecuteOptions::new()).await;

    assert!(!result.success);
    assert!(result.node_results["a"].output().contains("boom"));
    assert!(!result.node_results["a"].is_ok());
}

/// S4 — cache hit: two nodes share (task, agent); the agent executes once.
#[tokio::test]
async fn s4_cache_hit_avoids_duplicate_agent_call() {
    let agent = Arc::new(ScriptedAgent::always_ok("worker", "cached"));
    let mut registry = AgentRegistry::new();
    registry.register(agent.clone()).unwrap();

    let executor = Executor::new(
        Arc::new(registry),
        Arc::new(TaskCache::new(true, Duration::from_secs(60))),
        Arc::new(RateLimiter::new(false, 1, Duration::from_secs(1))),
        2,
        RetryConfig {
            max_attempts: 1,
            base_delay_ms: 1,
            max_delay_ms: 2,
        },
    );

    let graph = TaskGraph::create(
        "goal",
        vec![
            RawTaskNode {
                id: "n1".to_string(),
                task: "shared task".to_string(),
                depends_on: vec![],
                assign_to: None,
                config: NodeConfig::default(),
            },
            RawTaskNode {
                id: "n2".to_string(),
                task: "shared task".to_string(),
                depends_on: vec![],
                assign_to: None,
                config: NodeConfig::default(),
            },
        ],
        None,
    )
    .unwrap();

    let result = executor.execute(graph, ExecuteOptions::new()).await;

    assert!(result.success);
    assert_eq!(agent.calls.load(Ordering::SeqCst), 1);
    assert_eq!(result.node_results["n1"].output(), "cached");
    assert_eq!(result.node_results["n2"].output(), "cached");
}

/// S5 — retry recovery: node configured with 2 retries fails twice, then succeeds.
#[tokio::test]
async fn s5_retry_recovers_after_two_failures() {
    let agent = Arc::new(ScriptedAgent::scripted(
        "worker",
        vec![
            TaskResult::error("fail-1"),
            TaskResult::error("fail-2"),
            TaskResult::ok("ok"),
        ],
    ));
    let mut registry = AgentRegistry::new();
    registry.register(agent.clone()).unwrap();

    let graph = TaskGraph::create(
        "goal",
        vec![RawTaskNode {
            id: "n1".to_string(),
            task: "flaky".to_string(),
            depends_on: vec![],
            assign_to: None,
            config: NodeConfig { retries: 2 },
        }],
        None,
    )
    .unwrap();

    let result = executor(registry, 2).execute(graph, ExecuteOptions::new()).await;

    assert!(result.success);
    assert_eq!(result.node_results["n1"].output(), "ok");
    assert_eq!(agent.calls.load(Ordering::SeqCst), 3);
}

/// S6 — cancellation: 10 independent nodes, maxConcurrency=2, signal tripped
/// after the first batch settles. Exactly the 2 dispatched nodes are `done`;
/// the remaining 8 (never dispatched) are `skipped`.
#[tokio::test]
async fn s6_cancellation_skips_pending_nodes() {
    let mut registry = AgentRegistry::new();
    registry
        .register(Arc::new(ScriptedAgent::always_ok("worker", "X")))
        .unwrap();

    let signal = AbortSignal::new();
    let completed = Arc::new(AtomicU32::new(0));

    let graph = TaskGraph::create(
        "goal",
        (0..10).map(|i| raw(&format!("n{i}"), &[])).collect(),
        None,
    )
    .unwrap();

    let mut opts = ExecuteOptions::new().with_abort_signal(signal.clone());
    let trip_signal = signal.clone();
    opts.on_node_end = Some(Box::new(move |_id, _result| {
        if completed.fetch_add(1, Ordering::SeqCst) + 1 == 2 {
            trip_signal.trip();
        }
    }));

    let result = executor(registry, 2).execute(graph, opts).await;

    assert!(!result.success);
    assert_eq!(result.node_results.len(), 2);
    assert!(result.node_results.values().all(TaskResult::is_ok));
}
