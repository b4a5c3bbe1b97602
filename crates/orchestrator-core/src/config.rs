use std::{
    env, fmt, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::error::OrchestratorError;

const DEFAULT_CONFIG_PATH: &str = "config.toml";
const CONFIG_PATH_ENV: &str = "ORCHESTRATOR_CONFIG";

/// Recognized top-level configuration, exposed to every component (§6).
#[derive(Debug, Clone, Deserialize)]
#[derive(Default)]
pub struct Config {
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}


impl Config {
    /// Resolve the configured gateway API key (from environment only).
    pub fn gateway_api_key(&self) -> Result<SecretValue, OrchestratorError> {
        require_env(&self.gateway.api_key_env)
    }
}

/// Loads configuration with the same guard rails the rest of the workspace
/// uses: explicit path, then env var, then a cwd default.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Resolution order:
    /// 1. Explicit `path` argument.
    /// 2. `ORCHESTRATOR_CONFIG` environment variable.
    /// 3. `config.toml` in the current working directory.
    ///
    /// Falls back to `Config::default()` if no file is found at the
    /// resolved default path and neither an explicit path nor the env var
    /// was given.
    pub fn load(path: Option<PathBuf>) -> Result<Config, OrchestratorError> {
        let explicit = path.is_some() || env::var(CONFIG_PATH_ENV).is_ok();
        let candidate = resolve_path(path)?;

        if !explicit && !candidate.exists() {
            return Ok(Config::default());
        }

        let raw = fs::read_to_string(&candidate)
            .map_err(|err| OrchestratorError::config_io(candidate.clone(), err))?;
        let config: Config = toml::from_str(&raw)
            .map_err(|err| OrchestratorError::InvalidConfiguration(err.to_string()))?;
        Ok(config)
    }
}

fn resolve_path(path: Option<PathBuf>) -> Result<PathBuf, OrchestratorError> {
    if let Some(path) = path {
        return Ok(path);
    }

    if let Ok(from_env) = env::var(CONFIG_PATH_ENV)
        && !from_env.trim().is_empty() {
            return Ok(PathBuf::from(from_env));
        }

    Ok(Path::new(DEFAULT_CONFIG_PATH).to_path_buf())
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "LimitsConfig::default_max_concurrency")]
    pub max_concurrency: usize,
}

impl LimitsConfig {
    const fn default_max_concurrency() -> usize {
        5
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_concurrency: Self::default_max_concurrency(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "CacheConfig::default_ttl_secs")]
    pub ttl_secs: u64,
}

impl CacheConfig {
    const fn default_ttl_secs() -> u64 {
        300
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ttl_secs: Self::default_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "RateLimitConfig::default_requests_per_interval")]
    pub requests_per_interval: u32,
    #[serde(default = "RateLimitConfig::default_interval_ms")]
    pub interval_ms: u64,
}

impl RateLimitConfig {
    const fn default_requests_per_interval() -> u32 {
        10
    }
    const fn default_interval_ms() -> u64 {
        1_000
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            requests_per_interval: Self::default_requests_per_interval(),
            interval_ms: Self::default_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "RetryConfig::default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "RetryConfig::default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "RetryConfig::default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl RetryConfig {
    const fn default_max_attempts() -> u32 {
        1
    }
    const fn default_base_delay_ms() -> u64 {
        500
    }
    const fn default_max_delay_ms() -> u64 {
        10_000
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: Self::default_max_attempts(),
            base_delay_ms: Self::default_base_delay_ms(),
            max_delay_ms: Self::default_max_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub api_key_env: String,
    #[serde(default = "GatewayConfig::default_base_url")]
    pub base_url: String,
    #[serde(default = "GatewayConfig::default_model")]
    pub model: String,
}

impl GatewayConfig {
    fn default_base_url() -> String {
        "https://api.openai.com/v1".to_string()
    }
    fn default_model() -> String {
        "gpt-4o-mini".to_string()
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_key_env: String::new(),
            base_url: Self::default_base_url(),
            model: Self::default_model(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

/// Wrapper around sensitive values to reduce accidental logging.
#[derive(Clone)]
pub struct SecretValue(String);

impl SecretValue {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "***redacted***")
    }
}

/// Require that a given environment variable is set and non-empty.
pub fn require_env(var: &str) -> Result<SecretValue, OrchestratorError> {
    match env::var(var) {
        Ok(value) if !value.trim().is_empty() => Ok(SecretValue(value)),
        _ => Err(OrchestratorError::MissingSecret(var.to_string())),
    }
}
