use std::path::PathBuf;

use thiserror::Error;

/// Tagged error taxonomy carried through the planner → graph → executor pipeline.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("failed to parse planner response: {message}")]
    ParseFailed { message: String },

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("duplicate agent registration: {0}")]
    DuplicateRegistration(String),

    #[error("invalid task graph: {0}")]
    GraphInvalid(String),

    #[error("gateway request timed out: {0}")]
    GatewayTimeout(String),

    #[error("gateway connection failed: {0}")]
    GatewayConnectionFailed(String),

    #[error("gateway protocol error: {0}")]
    GatewayProtocolError(String),

    #[error("agent execution failed unexpectedly: {0}")]
    AgentExecutionFailed(String),

    #[error("required configuration missing: {0}")]
    ConfigMissing(String),

    #[error("configuration error: {0}")]
    InvalidConfiguration(String),

    #[error("missing environment variable: {0}")]
    MissingSecret(String),

    #[error("I/O error while reading {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl OrchestratorError {
    pub fn config_io(path: PathBuf, source: std::io::Error) -> Self {
        Self::ConfigIo { path, source }
    }

    /// Short machine-readable tag, useful for logging and API error bodies.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::ParseFailed { .. } => "PARSE_FAILED",
            Self::ValidationFailed(_) => "VALIDATION_FAILED",
            Self::DuplicateRegistration(_) => "DUPLICATE_REGISTRATION",
            Self::GraphInvalid(_) => "GRAPH_INVALID",
            Self::GatewayTimeout(_) => "GATEWAY_TIMEOUT",
            Self::GatewayConnectionFailed(_) => "GATEWAY_CONNECTION_FAILED",
            Self::GatewayProtocolError(_) => "GATEWAY_PROTOCOL_ERROR",
            Self::AgentExecutionFailed(_) => "AGENT_EXECUTION_FAILED",
            Self::ConfigMissing(_) => "CONFIG_MISSING",
            Self::InvalidConfiguration(_) => "INVALID_CONFIGURATION",
            Self::MissingSecret(_) => "MISSING_SECRET",
            Self::ConfigIo { .. } => "CONFIG_IO",
            Self::Other(_) => "OTHER",
        }
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
