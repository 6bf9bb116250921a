//! Configuration loading from quarry.toml and the environment.
//!
//! Precedence, lowest first: built-in defaults, `quarry.toml`, environment
//! (`ANTHROPIC_API_KEY`, `QUARRY_MODEL`, `QUARRY_CALL_BUDGET`), command-line
//! flags.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use runtime::{
    DEFAULT_CALL_BUDGET, DEFAULT_CALL_TIMEOUT, DEFAULT_MODEL, HistoryPolicy, ServerCommand,
    SessionConfig,
};
use serde::Deserialize;

/// Default config file, looked up in the working directory.
pub const CONFIG_FILE: &str = "quarry.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub model: ModelConfig,
    pub server: ServerConfig,
    pub session: SessionSection,
}

/// Language model settings.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
    /// Model to use.
    pub name: String,
    pub max_tokens: u32,
    /// HTTP timeout for one model call.
    pub timeout_secs: u64,
    pub system: Option<String>,
    /// Anthropic API key. Usually supplied through `ANTHROPIC_API_KEY`.
    pub api_key: Option<String>,
    /// Messages endpoint override.
    pub url: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_MODEL.to_string(),
            max_tokens: 1000,
            timeout_secs: 60,
            system: None,
            api_key: None,
            url: None,
        }
    }
}

/// How to launch the tool server.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub command: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    /// Limit on one tool call. Must stay above the server's statement
    /// timeout (`CLICKHOUSE_TIMEOUT_SECS`, 30 s by default).
    pub call_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            command: "quarry-server".to_string(),
            args: Vec::new(),
            env: BTreeMap::new(),
            call_timeout_secs: DEFAULT_CALL_TIMEOUT.as_secs(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionSection {
    pub call_budget: u32,
    pub history: HistoryPolicy,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            call_budget: DEFAULT_CALL_BUDGET,
            history: HistoryPolicy::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Load an explicitly named file, or `quarry.toml` if it exists, or
    /// fall back to defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::load(path),
            None if Path::new(CONFIG_FILE).exists() => Self::load(CONFIG_FILE),
            None => Ok(Self::default()),
        }
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply environment overrides; empty values count as unset.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get("ANTHROPIC_API_KEY") {
            self.model.api_key = Some(key);
        }
        if let Some(model) = get("QUARRY_MODEL") {
            self.model.name = model;
        }
        if let Some(raw) = get("QUARRY_CALL_BUDGET") {
            self.session.call_budget =
                raw.trim()
                    .parse()
                    .map_err(|e: std::num::ParseIntError| ConfigError::InvalidValue {
                        key: "QUARRY_CALL_BUDGET",
                        value: raw.clone(),
                        reason: e.to_string(),
                    })?;
        }
        Ok(())
    }

    /// The API key, which must be set one way or another.
    pub fn api_key(&self) -> Result<&str, ConfigError> {
        self.model
            .api_key
            .as_deref()
            .ok_or(ConfigError::MissingApiKey)
    }

    pub fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.model.timeout_secs)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.server.call_timeout_secs)
    }

    pub fn session(&self) -> SessionConfig {
        SessionConfig {
            call_budget: self.session.call_budget,
            history: self.session.history,
        }
    }

    /// Launch command for the tool server. The child logs at `warn` unless
    /// told otherwise, since its stderr shares the terminal.
    pub fn server_command(&self, inherited_rust_log: bool) -> ServerCommand {
        let mut command = ServerCommand::new(&self.server.command);
        command.args = self.server.args.clone();
        command.env = self.server.env.clone();
        if !inherited_rust_log && !command.env.contains_key("RUST_LOG") {
            command.env.insert("RUST_LOG".into(), "warn".into());
        }
        command
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid {key}={value:?}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("API key not configured: set ANTHROPIC_API_KEY or model.api_key")]
    MissingApiKey,
}
