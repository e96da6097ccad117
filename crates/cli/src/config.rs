//! Configuration loading from toolbridge.toml.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use mcp::{ProviderConfig, SessionConfig};
use runtime::DEFAULT_MAX_ITERATIONS;
use serde::Deserialize;

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "toolbridge.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub provider: ToolProviderConfig,

    #[serde(default)]
    pub session: SessionSettings,
}

/// Model API settings.
#[derive(Debug, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Override for the API host, e.g. a local proxy.
    pub base_url: Option<String>,

    /// System prompt sent with every request.
    pub system: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            max_tokens: default_max_tokens(),
            base_url: None,
            system: None,
        }
    }
}

/// The tool provider process.
#[derive(Debug, Deserialize)]
pub struct ToolProviderConfig {
    /// Command line; split like a shell would.
    #[serde(default = "default_provider_command")]
    pub command: String,

    /// Extra arguments appended after the command line.
    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ToolProviderConfig {
    fn default() -> Self {
        Self {
            command: default_provider_command(),
            args: Vec::new(),
            env: BTreeMap::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ToolProviderConfig {
    /// Build the spawn description for the provider.
    pub fn to_provider(&self) -> Result<ProviderConfig, ConfigError> {
        let provider = ProviderConfig::from_command_line("provider", &self.command)
            .map_err(|e| ConfigError::Invalid(format!("provider.command: {e}")))?
            .with_args(self.args.iter().cloned());
        Ok(self
            .env
            .iter()
            .fold(provider, |provider, (key, value)| provider.with_env(key, value)))
    }

    pub fn session(&self) -> SessionConfig {
        SessionConfig::default().with_timeout(Duration::from_secs(self.timeout_secs))
    }
}

/// Orchestration loop settings.
#[derive(Debug, Deserialize)]
pub struct SessionSettings {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
        }
    }
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_max_tokens() -> u32 {
    runtime::providers::DEFAULT_MAX_TOKENS
}

fn default_provider_command() -> String {
    "clock-provider".to_string()
}

fn default_timeout_secs() -> u64 {
    mcp::DEFAULT_TIMEOUT.as_secs()
}

fn default_max_iterations() -> usize {
    DEFAULT_MAX_ITERATIONS
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given, else the default file if present, else defaults.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::load(DEFAULT_CONFIG_FILE),
            None => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.backend.model.trim().is_empty() {
            return Err(ConfigError::Invalid("backend.model is empty".into()));
        }
        if self.backend.max_tokens == 0 {
            return Err(ConfigError::Invalid("backend.max_tokens must be positive".into()));
        }
        if self.provider.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "provider.timeout_secs must be positive".into(),
            ));
        }
        if self.session.max_iterations == 0 {
            return Err(ConfigError::Invalid(
                "session.max_iterations must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}
