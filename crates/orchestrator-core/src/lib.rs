//! Core primitives for the task orchestrator.
//!
//! A free-form goal is planned into a `TaskGraph` by the [`planner`], then
//! driven to completion by the [`executor`] against a registry of
//! [`registry::AgentAdapter`]s, with a shared [`cache`] and [`rate_limit`]
//! guarding agent calls and a [`retry`] helper smoothing over transient
//! failures.

mod cache;
mod config;
mod error;
mod executor;
mod gateway;
mod graph;
mod planner;
mod rate_limit;
mod registry;
mod retry;
mod telemetry;
mod validate;

pub use cache::{task_key, CacheKey, TaskCache};
pub use config::{
    require_env, CacheConfig, Config, ConfigLoader, GatewayConfig, LimitsConfig, LoggingConfig,
    RateLimitConfig, RetryConfig as RetryDefaultsConfig, SecretValue,
};
pub use error::{OrchestratorError, Result};
pub use executor::{AbortSignal, ExecuteOptions, ExecutionResult, Executor};
pub use gateway::{GatewayClient, HttpGatewayClient, MockGatewayClient};
pub use graph::{NodeConfig, RawTaskNode, TaskGraph, TaskId, TaskNode, TaskResult, TaskStatus};
pub use planner::{PlanSource, Planner};
pub use rate_limit::RateLimiter;
pub use registry::{AgentAdapter, AgentRegistry};
pub use retry::{retry_with_backoff, RetryConfig};
pub use telemetry::{init_telemetry, TelemetryOptions};
pub use validate::{validate_planner_response, PlannerResponse, Submission};
