use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use clap::{Args, Parser, Subcommand, ValueEnum};
use orchestrator_core::{
    AgentAdapter, AgentRegistry, Config, ConfigLoader, ExecuteOptions, Executor, GatewayClient,
    MockGatewayClient, Planner, RateLimiter, RetryConfig, TaskCache, TaskNode, TaskResult,
    TelemetryOptions, init_telemetry,
};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "orchestrator-cli", version, about = "Task orchestrator interface")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Plan and execute a goal end to end.
    Run(RunArgs),
}

#[derive(Copy, Clone, Debug, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Free-form goal to decompose and execute.
    #[arg(value_name = "GOAL")]
    goal: String,

    /// Override the configured max concurrency for this run.
    #[arg(long)]
    max_concurrency: Option<usize>,

    /// Path to a TOML config file (see `ConfigLoader` resolution order).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Register a demo `EchoAgent` under `name=capability,capability2`.
    /// May be repeated; when none are given, a single `echo` agent is
    /// registered automatically.
    #[arg(long = "agent", value_name = "NAME=CAPS")]
    agents: Vec<String>,

    /// Output format (text or JSON).
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

/// Deterministic demo agent: echoes the task description back as output.
struct EchoAgent {
    name: String,
    capabilities: Vec<String>,
}

#[async_trait]
impl AgentAdapter for EchoAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    async fn execute(&self, node: &TaskNode) -> TaskResult {
        TaskResult::ok(format!("[{}] {}", self.name, node.task))
    }
}

fn parse_agent_spec(spec: &str) -> Result<EchoAgent> {
    let (name, caps) = spec
        .split_once('=')
        .ok_or_else(|| anyhow!("agent spec '{spec}' must be NAME=CAP,CAP..."))?;
    let capabilities = caps
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect();
    Ok(EchoAgent {
        name: name.trim().to_string(),
        capabilities,
    })
}

#[derive(Serialize)]
struct RunResponse {
    goal: String,
    success: bool,
    duration_ms: u64,
    node_results: serde_json::Value,
}

fn main() -> Result<()> {
    init_telemetry(TelemetryOptions::default()).map_err(|err| anyhow!(err.to_string()))?;

    let cli = Cli::parse();
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        match cli.command {
            Command::Run(args) => run_command(args).await,
        }
    })
}

async fn run_command(args: RunArgs) -> Result<()> {
    info!(goal = %args.goal, "planning and executing goal");

    let config = ConfigLoader::load(args.config.clone())?;
    let mut registry = AgentRegistry::new();

    if args.agents.is_empty() {
        registry.register(Arc::new(EchoAgent {
            name: "echo".to_string(),
            capabilities: vec!["general".to_string()],
        }))?;
    } else {
        for spec in &args.agents {
            registry.register(Arc::new(parse_agent_spec(spec)?))?;
        }
    }

    let gateway_client = build_gateway(&config);
    let planner = Planner::from_registry_or_gateway(&registry, None, Some(gateway_client))?;
    let graph = planner.plan(&args.goal, &registry).await?;

    let cache = Arc::new(TaskCache::new(
        config.cache.enabled,
        Duration::from_secs(config.cache.ttl_secs),
    ));
    let rate_limiter = Arc::new(RateLimiter::new(
        config.rate_limit.enabled,
        config.rate_limit.requests_per_interval,
        Duration::from_millis(config.rate_limit.interval_ms),
    ));
    let executor = Executor::new(
        Arc::new(registry),
        cache,
        rate_limiter,
        args.max_concurrency.unwrap_or(config.limits.max_concurrency),
        RetryConfig::from(&config.retry),
    );

    let result = executor.execute(graph, ExecuteOptions::new()).await;

    let response = RunResponse {
        goal: args.goal,
        success: result.success,
        duration_ms: result.duration_ms,
        node_results: serde_json::to_value(&result.node_results)?,
    };

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&response)?),
        OutputFormat::Text => {
            println!("goal: {}", response.goal);
            println!("success: {}", response.success);
            println!("duration_ms: {}", response.duration_ms);
            println!(
                "{}",
                serde_json::to_string_pretty(&response.node_results)?
            );
        }
    }

    if !result.success {
        warn!("run completed with at least one failed or skipped node");
    }

    Ok(())
}

fn build_gateway(config: &Config) -> Arc<dyn GatewayClient> {
    match config.gateway_api_key() {
        Ok(key) => Arc::new(orchestrator_core::HttpGatewayClient::new(
            config.gateway.base_url.clone(),
            config.gateway.model.clone(),
            key,
        )),
        Err(_) => {
            warn!("no gateway API key configured; using the mock gateway for planning");
            Arc::new(MockGatewayClient::new(
                r#"{"nodes":[{"id":"step-1","task":"placeholder task"}]}"#,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_agent_spec_with_multiple_capabilities() {
        let agent = parse_agent_spec("writer=prose,editing").unwrap();
        assert_eq!(agent.name, "writer");
        assert_eq!(agent.capabilities, vec!["prose", "editing"]);
    }

    #[test]
    fn rejects_spec_without_equals() {
        assert!(parse_agent_spec("writer").is_err());
    }
}
