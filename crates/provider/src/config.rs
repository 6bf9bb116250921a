//! Server configuration from the process environment.
//!
//! - `CLICKHOUSE_HOST`: host name or full `http(s)://` URL (default `localhost`)
//! - `CLICKHOUSE_PORT`: HTTP interface port (default `8123`)
//! - `CLICKHOUSE_USER` / `CLICKHOUSE_PASSWORD`: credentials (default `default` / empty)
//! - `CLICKHOUSE_DATABASE`: database to run statements in (engine default if unset)
//! - `CLICKHOUSE_TIMEOUT_SECS`: per-statement HTTP timeout (default `30`)
//! - `QUARRY_IMPORT_DIR`: directory the engine reads `file()` sources from (default `user_files`)

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 8123;
const DEFAULT_USER: &str = "default";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_IMPORT_DIR: &str = "user_files";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {key}={value:?}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Connection settings for the ClickHouse HTTP interface.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: Option<String>,
    pub timeout: Duration,
}

impl DatabaseConfig {
    /// Base URL of the HTTP interface.
    pub fn url(&self) -> String {
        if self.host.starts_with("http://") || self.host.starts_with("https://") {
            return self.host.trim_end_matches('/').to_string() + "/";
        }
        format!("http://{}:{}/", self.host, self.port)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            user: DEFAULT_USER.to_string(),
            password: String::new(),
            database: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Everything the tool server needs at startup.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub database: DatabaseConfig,
    pub import_dir: PathBuf,
}

impl ProviderConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = DatabaseConfig::default();

        let port = match get("CLICKHOUSE_PORT") {
            Some(v) => parse(&v, "CLICKHOUSE_PORT")?,
            None => defaults.port,
        };
        let timeout = match get("CLICKHOUSE_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(parse(&v, "CLICKHOUSE_TIMEOUT_SECS")?),
            None => defaults.timeout,
        };

        Ok(Self {
            database: DatabaseConfig {
                host: get("CLICKHOUSE_HOST").unwrap_or(defaults.host),
                port,
                user: get("CLICKHOUSE_USER").unwrap_or(defaults.user),
                password: lookup("CLICKHOUSE_PASSWORD").unwrap_or_default(),
                database: get("CLICKHOUSE_DATABASE"),
                timeout,
            },
            import_dir: get("QUARRY_IMPORT_DIR")
                .unwrap_or_else(|| DEFAULT_IMPORT_DIR.to_string())
                .into(),
        })
    }
}

fn parse<T>(value: &str, key: &'static str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidValue {
            key,
            value: value.to_string(),
            reason: e.to_string(),
        })
}
