//! Client configuration management
//!
//! [`ClientConfig`] collects every tunable of the MCP client: where the
//! runtime's identity and credential live in AWS, how bearer tokens are cached
//! and refreshed, how session setup is retried and how the HTTP transport
//! times out. Values come from defaults, a TOML/YAML/JSON file, `AGENTCORE_*`
//! environment variables and finally command-line flags, in that order.
//!
//! Durations are written as (possibly fractional) seconds:
//!
//! ```toml
//! [aws]
//! region = "us-west-2"
//!
//! [token]
//! refresh_interval = 1800
//!
//! [session]
//! max_retries = 3
//! initial_delay = 2.0
//! backoff_multiplier = 1.5
//!
//! [transport]
//! url = "http://localhost:18000/mcp"
//! use_uuid_fixer = true
//! ```

use crate::auth::token_cache::{DEFAULT_CACHE_FILE, DEFAULT_NOMINAL_LIFETIME, DEFAULT_SAFETY_MARGIN};
use crate::auth::{DEFAULT_SECRET_ID, DEFAULT_SSM_PARAMETER};
use crate::mcp::refresh::DEFAULT_RECOVERY_PAUSE;
use crate::mcp::retry::RetryConfig;
use crate::mcp::transport::StreamableHttpConfig;
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path, time::Duration};
use thiserror::Error;

/// Local MCP server endpoint used when no URL is configured
pub const DEFAULT_LOCAL_URL: &str = "http://localhost:18000/mcp";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Environment variable parsing error: {0}")]
    EnvVarParse(String),
    #[error("File parsing error: {0}")]
    FileParse(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Main configuration structure for the MCP client
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ClientConfig {
    /// Where the runtime identity and bearer token are stored
    #[serde(default)]
    pub aws: AwsConfig,
    /// Bearer token caching and refresh
    #[serde(default)]
    pub token: TokenConfig,
    /// Session setup retry policy
    #[serde(default)]
    pub session: SessionConfig,
    /// Endpoint and HTTP transport settings
    #[serde(default)]
    pub transport: TransportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AwsConfig {
    /// AWS region; the SDK default chain decides when unset
    pub region: Option<String>,
    /// SSM parameter holding the runtime ARN
    pub ssm_parameter: String,
    /// Secrets Manager id holding `{"bearer_token": ...}`
    pub secret_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TokenConfig {
    /// Reuse a cached bearer token across runs
    pub use_cache: bool,
    pub cache_file: String,
    /// Background refresh period; zero disables the refresh task
    #[serde(with = "duration_seconds")]
    pub refresh_interval: Duration,
    /// Lifetime assumed for tokens without an `exp` claim
    #[serde(with = "duration_seconds")]
    pub nominal_lifetime: Duration,
    /// Subtracted from the nominal lifetime when caching such tokens
    #[serde(with = "duration_seconds")]
    pub safety_margin: Duration,
    /// Extra wait after a failed background refresh
    #[serde(with = "duration_seconds")]
    pub error_recovery_pause: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Retries after the first failed initialize or tools/list attempt
    pub max_retries: u32,
    #[serde(with = "duration_seconds")]
    pub initial_delay: Duration,
    pub backoff_multiplier: f64,
    #[serde(with = "duration_seconds")]
    pub max_delay: Duration,
    /// Token refreshes allowed per operation on authorization failures
    pub auth_max_retries: u32,
    /// Pause after a successful initialize
    #[serde(with = "duration_seconds")]
    pub settle_delay: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TransportConfig {
    /// MCP endpoint for local mode; remote mode derives it from the runtime ARN
    pub url: String,
    #[serde(with = "duration_seconds")]
    pub timeout: Duration,
    #[serde(with = "duration_seconds")]
    pub sse_read_timeout: Duration,
    /// Repair bare UUID literals in server responses
    pub use_uuid_fixer: bool,
    /// Send a session DELETE when connections close
    pub terminate_on_close: bool,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: None,
            ssm_parameter: DEFAULT_SSM_PARAMETER.to_string(),
            secret_id: DEFAULT_SECRET_ID.to_string(),
        }
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            use_cache: true,
            cache_file: DEFAULT_CACHE_FILE.to_string(),
            refresh_interval: Duration::from_secs(1800),
            nominal_lifetime: DEFAULT_NOMINAL_LIFETIME,
            safety_margin: DEFAULT_SAFETY_MARGIN,
            error_recovery_pause: DEFAULT_RECOVERY_PAUSE,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        let retry = RetryConfig::session_default();
        Self {
            max_retries: retry.max_attempts,
            initial_delay: retry.initial_delay,
            backoff_multiplier: retry.backoff_multiplier,
            max_delay: retry.max_delay,
            auth_max_retries: 2,
            settle_delay: Duration::from_secs(1),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        let http = StreamableHttpConfig::default();
        Self {
            url: DEFAULT_LOCAL_URL.to_string(),
            timeout: http.timeout,
            sse_read_timeout: http.sse_read_timeout,
            use_uuid_fixer: false,
            terminate_on_close: http.terminate_on_close,
        }
    }
}

impl SessionConfig {
    /// Backoff policy for initialize and tools/list
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_retries,
            initial_delay: self.initial_delay,
            max_delay: self.max_delay,
            backoff_multiplier: self.backoff_multiplier,
        }
    }
}

impl From<&TransportConfig> for StreamableHttpConfig {
    fn from(config: &TransportConfig) -> Self {
        Self {
            timeout: config.timeout,
            sse_read_timeout: config.sse_read_timeout,
            terminate_on_close: config.terminate_on_close,
        }
    }
}

impl ClientConfig {
    /// Load configuration from a file (supports TOML, YAML, JSON)
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let extension = path.extension().and_then(|s| s.to_str());

        match extension {
            Some("toml") => {
                toml::from_str(&content).map_err(|e| ConfigError::FileParse(e.to_string()))
            }
            Some("yaml") | Some("yml") => {
                serde_yaml::from_str(&content).map_err(|e| ConfigError::FileParse(e.to_string()))
            }
            Some("json") => {
                serde_json::from_str(&content).map_err(|e| ConfigError::FileParse(e.to_string()))
            }
            _ => Err(ConfigError::FileParse(
                "Unsupported file format. Use .toml, .yaml, .yml, or .json".to_string(),
            )),
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().merge_with_env()
    }

    /// Override values with any environment variables that are set
    pub fn merge_with_env(self) -> Result<Self, ConfigError> {
        self.merge_with_vars(|key| env::var(key).ok())
    }

    fn merge_with_vars(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(region) = lookup("AWS_REGION") {
            self.aws.region = Some(region);
        }
        if let Some(url) = lookup("AGENTCORE_MCP_URL") {
            self.transport.url = url;
        }
        if let Some(parameter) = lookup("AGENTCORE_SSM_PARAMETER") {
            self.aws.ssm_parameter = parameter;
        }
        if let Some(secret_id) = lookup("AGENTCORE_SECRET_ID") {
            self.aws.secret_id = secret_id;
        }
        if let Some(value) = lookup("AGENTCORE_USE_TOKEN_CACHE") {
            self.token.use_cache = parse_bool("AGENTCORE_USE_TOKEN_CACHE", &value)?;
        }
        if let Some(file) = lookup("AGENTCORE_TOKEN_CACHE_FILE") {
            self.token.cache_file = file;
        }
        if let Some(value) = lookup("AGENTCORE_TOKEN_REFRESH_INTERVAL") {
            self.token.refresh_interval = parse_seconds("AGENTCORE_TOKEN_REFRESH_INTERVAL", &value)?;
        }
        if let Some(value) = lookup("AGENTCORE_USE_UUID_FIXER") {
            self.transport.use_uuid_fixer = parse_bool("AGENTCORE_USE_UUID_FIXER", &value)?;
        }
        if let Some(value) = lookup("AGENTCORE_MAX_RETRIES") {
            self.session.max_retries = value
                .trim()
                .parse()
                .map_err(|e| ConfigError::EnvVarParse(format!("AGENTCORE_MAX_RETRIES: {}", e)))?;
        }
        if let Some(value) = lookup("AGENTCORE_TRANSPORT_TIMEOUT") {
            self.transport.timeout = parse_seconds("AGENTCORE_TRANSPORT_TIMEOUT", &value)?;
        }

        Ok(self)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.aws.ssm_parameter.is_empty() {
            return Err(ConfigError::Validation(
                "SSM parameter name cannot be empty".to_string(),
            ));
        }
        if self.aws.secret_id.is_empty() {
            return Err(ConfigError::Validation(
                "Secret id cannot be empty".to_string(),
            ));
        }
        if matches!(&self.aws.region, Some(region) if region.trim().is_empty()) {
            return Err(ConfigError::Validation(
                "AWS region cannot be empty when set".to_string(),
            ));
        }

        if self.token.use_cache && self.token.cache_file.is_empty() {
            return Err(ConfigError::Validation(
                "Token cache file is required when caching is enabled".to_string(),
            ));
        }
        if self.token.nominal_lifetime <= self.token.safety_margin {
            return Err(ConfigError::Validation(
                "Token nominal_lifetime must exceed safety_margin".to_string(),
            ));
        }

        if self.session.backoff_multiplier < 1.0 {
            return Err(ConfigError::Validation(
                "Backoff multiplier must be at least 1.0".to_string(),
            ));
        }

        url::Url::parse(&self.transport.url).map_err(|e| {
            ConfigError::Validation(format!("Invalid MCP URL {}: {}", self.transport.url, e))
        })?;
        if self.transport.timeout.is_zero() {
            return Err(ConfigError::Validation(
                "Transport timeout must be greater than 0".to_string(),
            ));
        }
        if self.transport.sse_read_timeout.is_zero() {
            return Err(ConfigError::Validation(
                "SSE read timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::EnvVarParse(format!(
            "{}: expected a boolean, got {:?}",
            name, other
        ))),
    }
}

fn parse_seconds(name: &str, value: &str) -> Result<Duration, ConfigError> {
    let secs: f64 = value
        .trim()
        .parse()
        .map_err(|e| ConfigError::EnvVarParse(format!("{}: {}", name, e)))?;
    Duration::try_from_secs_f64(secs)
        .map_err(|e| ConfigError::EnvVarParse(format!("{}: {}", name, e)))
}

/// Custom serialization for Duration as (fractional) seconds
mod duration_seconds {
    use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(de::Error::custom)
    }
}
