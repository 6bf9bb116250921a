//! ClickHouse access over its HTTP interface.
//!
//! Statements are POSTed as the request body. Output is requested in the
//! `JSON` format, so a row set arrives as `{"meta": [...], "data": [...]}`;
//! statements without output (DDL) return an empty body.

use std::future::Future;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::DatabaseConfig;

const EXCEPTION_CODE_HEADER: &str = "x-clickhouse-exception-code";

/// Errors from the database layer.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DatabaseError {
    #[error("network: {0}")]
    Network(String),

    /// The engine rejected the statement; `message` is its own error text.
    #[error("{message}")]
    Engine { code: Option<u32>, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("invalid database config: {0}")]
    Config(String),
}

/// Column metadata of a row set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
}

/// Row set returned by a statement. Empty for statements without output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rows {
    pub columns: Vec<Column>,
    pub rows: Vec<Map<String, Value>>,
}

impl Rows {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

/// A database the tools can run statements against.
pub trait Database: Send + Sync {
    fn query(&self, sql: &str) -> impl Future<Output = Result<Rows, DatabaseError>> + Send;
}

#[derive(Debug, Deserialize)]
struct JsonOutput {
    #[serde(default)]
    meta: Vec<Column>,
    #[serde(default)]
    data: Vec<Map<String, Value>>,
}

/// ClickHouse HTTP client.
pub struct ClickHouse {
    client: reqwest::Client,
    endpoint: Url,
    user: String,
    password: String,
}

impl ClickHouse {
    pub fn new(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| DatabaseError::Config(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint(config)?,
            user: config.user.clone(),
            password: config.password.clone(),
        })
    }

    /// Check that the server is reachable and accepts our credentials.
    pub async fn ping(&self) -> Result<(), DatabaseError> {
        self.query("SELECT 1").await.map(|_| ())
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl std::fmt::Display for ClickHouse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "clickhouse({}, user={})", self.endpoint, self.user)
    }
}

impl Database for ClickHouse {
    async fn query(&self, sql: &str) -> Result<Rows, DatabaseError> {
        tracing::debug!(sql, "executing statement");

        let response = self
            .client
            .post(self.endpoint.clone())
            .header("X-ClickHouse-User", &self.user)
            .header("X-ClickHouse-Key", &self.password)
            .body(sql.to_string())
            .send()
            .await
            .map_err(|e| DatabaseError::Network(e.to_string()))?;

        let status = response.status();
        let code = response
            .headers()
            .get(EXCEPTION_CODE_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok());
        let body = response
            .text()
            .await
            .map_err(|e| DatabaseError::Network(e.to_string()))?;

        if !status.is_success() {
            tracing::debug!(%status, ?code, "statement rejected");
            return Err(engine_error(status, code, &body));
        }

        parse_output(&body)
    }
}

fn endpoint(config: &DatabaseConfig) -> Result<Url, DatabaseError> {
    let mut url = Url::parse(&config.url())
        .map_err(|e| DatabaseError::Config(format!("{}: {e}", config.url())))?;
    {
        let mut pairs = url.query_pairs_mut();
        pairs
            .append_pair("default_format", "JSON")
            .append_pair("mutations_sync", "1")
            .append_pair("output_format_json_quote_64bit_integers", "0");
        if let Some(database) = &config.database {
            pairs.append_pair("database", database);
        }
    }
    Ok(url)
}

fn engine_error(status: reqwest::StatusCode, code: Option<u32>, body: &str) -> DatabaseError {
    let message = body.trim();
    let message = if message.is_empty() {
        format!("server returned {status}")
    } else {
        message.to_string()
    };
    DatabaseError::Engine { code, message }
}

fn parse_output(body: &str) -> Result<Rows, DatabaseError> {
    if body.trim().is_empty() {
        return Ok(Rows::default());
    }
    let output: JsonOutput =
        serde_json::from_str(body).map_err(|e| DatabaseError::InvalidResponse(e.to_string()))?;
    Ok(Rows {
        columns: output.meta,
        rows: output.data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_carries_settings() {
        let config = DatabaseConfig {
            database: Some("sales".into()),
            ..DatabaseConfig::default()
        };
        let url = endpoint(&config).unwrap();
        assert_eq!(url.host_str(), Some("localhost"));
        assert_eq!(url.port(), Some(8123));
        let query = url.query().unwrap();
        assert!(query.contains("default_format=JSON"));
        assert!(query.contains("mutations_sync=1"));
        assert!(query.contains("database=sales"));
    }

    #[test]
    fn endpoint_rejects_garbage_host() {
        let config = DatabaseConfig {
            host: "http://".into(),
            ..DatabaseConfig::default()
        };
        assert!(matches!(endpoint(&config), Err(DatabaseError::Config(_))));
    }

    #[test]
    fn parses_json_output() {
        let body = r#"{
            "meta": [{"name": "id", "type": "UInt64"}, {"name": "city", "type": "String"}],
            "data": [{"id": 1, "city": "Oslo"}, {"id": 2, "city": "Lima"}],
            "rows": 2,
            "statistics": {"elapsed": 0.001, "rows_read": 2, "bytes_read": 32}
        }"#;
        let rows = parse_output(body).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows.columns[1].name, "city");
        assert_eq!(rows.columns[0].data_type, "UInt64");
        assert_eq!(rows.rows[1]["city"], "Lima");
    }

    #[test]
    fn empty_body_is_empty_row_set() {
        assert!(parse_output("\n").unwrap().is_empty());
    }

    #[test]
    fn non_json_body_is_invalid() {
        assert!(matches!(
            parse_output("1\n"),
            Err(DatabaseError::InvalidResponse(_))
        ));
    }

    #[test]
    fn engine_error_keeps_server_text() {
        let err = engine_error(
            reqwest::StatusCode::NOT_FOUND,
            Some(60),
            "Code: 60. DB::Exception: Table default.orders does not exist.\n",
        );
        assert_eq!(
            err.to_string(),
            "Code: 60. DB::Exception: Table default.orders does not exist."
        );
        assert!(matches!(err, DatabaseError::Engine { code: Some(60), .. }));
    }

    #[test]
    fn engine_error_without_body_names_status() {
        let err = engine_error(reqwest::StatusCode::BAD_GATEWAY, None, "");
        assert!(err.to_string().contains("502"));
    }
}
