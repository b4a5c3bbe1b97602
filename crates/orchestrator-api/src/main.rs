use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use orchestrator_core::{
    AgentAdapter, AgentRegistry, Config, ConfigLoader, ExecuteOptions, Executor, GatewayClient,
    HttpGatewayClient, MockGatewayClient, Planner, RateLimiter, RetryConfig, Submission, TaskCache,
    TaskGraph, TaskNode, TaskResult, TelemetryOptions, init_telemetry,
};
use serde::Serialize;
use tokio::{
    net::TcpListener,
    signal,
    sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError},
};
use tracing::{info, warn};

#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    registry: Arc<AgentRegistry>,
    gateway: Arc<dyn GatewayClient>,
    cache: Arc<TaskCache>,
    rate_limiter: Arc<RateLimiter>,
    run_permits: Arc<Semaphore>,
    max_runs: usize,
}

/// Deterministic demo agent so `/run` has something to dispatch to without
/// requiring a caller-registered agent fleet.
struct EchoAgent;

#[async_trait]
impl AgentAdapter for EchoAgent {
    fn name(&self) -> &str {
        "echo"
    }

    fn capabilities(&self) -> &[String] {
        &[]
    }

    async fn execute(&self, node: &TaskNode) -> TaskResult {
        TaskResult::ok(format!("[echo] {}", node.task))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_telemetry(TelemetryOptions::default())
        .map_err(|err| anyhow::anyhow!(err.to_string()))?;

    let addr: SocketAddr = std::env::var("ORCHESTRATOR_API_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        .parse()
        .expect("invalid ORCHESTRATOR_API_ADDR");

    let config = ConfigLoader::load(None)?;

    let mut registry = AgentRegistry::new();
    registry.register(Arc::new(EchoAgent))?;

    let gateway: Arc<dyn GatewayClient> = match config.gateway_api_key() {
        Ok(key) => Arc::new(HttpGatewayClient::new(
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
    };

    let run_limit = config.limits.max_concurrency.max(1);

    let state = AppState {
        config: Arc::new(config.clone()),
        registry: Arc::new(registry),
        gateway,
        cache: Arc::new(TaskCache::new(
            config.cache.enabled,
            Duration::from_secs(config.cache.ttl_secs),
        )),
        rate_limiter: Arc::new(RateLimiter::new(
            config.rate_limit.enabled,
            config.rate_limit.requests_per_interval,
            Duration::from_millis(config.rate_limit.interval_ms),
        )),
        run_permits: Arc::new(Semaphore::new(run_limit)),
        max_runs: run_limit,
    };

    let app = Router::new()
        .route("/health", get(handle_health))
        .route("/plan", post(handle_plan))
        .route("/run", post(handle_run))
        .with_state(state);

    info!("orchestrator API listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };
    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received, stopping server");
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    tag: &'static str,
}

#[derive(Debug)]
struct AppError {
    status: StatusCode,
    message: String,
    tag: &'static str,
}

impl AppError {
    fn new(status: StatusCode, message: impl Into<String>, tag: &'static str) -> Self {
        Self {
            status,
            message: message.into(),
            tag,
        }
    }
}

impl From<orchestrator_core::OrchestratorError> for AppError {
    fn from(error: orchestrator_core::OrchestratorError) -> Self {
        let tag = error.tag();
        let status = match tag {
            "VALIDATION_FAILED" | "PARSE_FAILED" | "GRAPH_INVALID" => StatusCode::BAD_REQUEST,
            "CONFIG_MISSING" | "MISSING_SECRET" | "INVALID_CONFIGURATION" => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::BAD_GATEWAY,
        };
        AppError::new(status, error.to_string(), tag)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.message,
            tag: self.tag,
        });
        (self.status, body).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, AppError>;

fn acquire_run_permit(state: &AppState) -> ApiResult<OwnedSemaphorePermit> {
    match state.run_permits.clone().try_acquire_owned() {
        Ok(permit) => Ok(permit),
        Err(TryAcquireError::NoPermits) => Err(AppError::new(
            StatusCode::TOO_MANY_REQUESTS,
            "run capacity reached; retry once a slot frees up",
            "CAPACITY_EXHAUSTED",
        )),
        Err(TryAcquireError::Closed) => Err(AppError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "executor unavailable",
            "EXECUTOR_UNAVAILABLE",
        )),
    }
}

#[derive(Debug, Serialize)]
struct CapacityReport {
    max_runs: usize,
    available_runs: usize,
    active_runs: usize,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    capacity: CapacityReport,
}

fn capacity_report(state: &AppState) -> CapacityReport {
    let available = state.run_permits.available_permits();
    let active = state.max_runs.saturating_sub(available);
    CapacityReport {
        max_runs: state.max_runs,
        available_runs: available,
        active_runs: active,
    }
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        capacity: capacity_report(&state),
    })
}

async fn plan_graph(state: &AppState, submission: &Submission) -> ApiResult<TaskGraph> {
    submission.validate().map_err(AppError::from)?;
    let planner =
        Planner::from_registry_or_gateway(&state.registry, None, Some(state.gateway.clone()))
            .map_err(AppError::from)?;
    planner
        .plan(&submission.goal, &state.registry)
        .await
        .map_err(AppError::from)
}

async fn handle_plan(
    State(state): State<AppState>,
    Json(submission): Json<Submission>,
) -> ApiResult<Json<TaskGraph>> {
    let graph = plan_graph(&state, &submission).await?;
    Ok(Json(graph))
}

#[derive(Debug, Serialize)]
struct RunResponse {
    success: bool,
    duration_ms: u64,
    node_results: serde_json::Value,
}

async fn handle_run(
    State(state): State<AppState>,
    Json(submission): Json<Submission>,
) -> ApiResult<Json<RunResponse>> {
    let _permit = acquire_run_permit(&state)?;

    let graph = plan_graph(&state, &submission).await?;

    let max_concurrency = submission
        .max_concurrency
        .map(|n| n as usize)
        .unwrap_or(state.config.limits.max_concurrency);

    let executor = Executor::new(
        state.registry.clone(),
        state.cache.clone(),
        state.rate_limiter.clone(),
        max_concurrency,
        RetryConfig::from(&state.config.retry),
    );

    let result = executor
        .execute(graph, ExecuteOptions::new().with_max_concurrency(max_concurrency))
        .await;

    Ok(Json(RunResponse {
        success: result.success,
        duration_ms: result.duration_ms,
        node_results: serde_json::to_value(&result.node_results)
            .map_err(|err| AppError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string(), "OTHER"))?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state(max_runs: usize) -> AppState {
        AppState {
            config: Arc::new(Config::default()),
            registry: Arc::new(AgentRegistry::new()),
            gateway: Arc::new(MockGatewayClient::new("{}")),
            cache: Arc::new(TaskCache::new(false, Duration::from_secs(60))),
            rate_limiter: Arc::new(RateLimiter::new(false, 1, Duration::from_secs(1))),
            run_permits: Arc::new(Semaphore::new(max_runs)),
            max_runs,
        }
    }

    #[test]
    fn capacity_limit_returns_429() {
        let state = test_state(1);
        let permit = acquire_run_permit(&state).expect("first permit should succeed");
        let err = acquire_run_permit(&state).expect_err("second permit should fail");
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        drop(permit);
    }

    #[tokio::test]
    async fn health_reports_capacity() {
        let state = test_state(3);
        let Json(health) = handle_health(State(state)).await;
        assert_eq!(health.capacity.max_runs, 3);
        assert_eq!(health.capacity.available_runs, 3);
    }

    #[tokio::test]
    async fn plan_rejects_blank_goal() {
        let state = test_state(3);
        let submission = Submission {
            goal: "   ".to_string(),
            max_concurrency: None,
            max_steps: None,
        };
        let err = plan_graph(&state, &submission).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }
}
