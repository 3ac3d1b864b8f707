//! Configuration schema (pci.toml)
//!
//! Every section is optional. Connection settings can also come from the
//! environment (`PG_HOST`, `PG_PORT`, `PG_USER`, `PG_PASSWORD`, `PG_DBNAME`,
//! `PG_SSLMODE`), which takes precedence over the file.

use crate::catalog::{CatalogError, FeatureCatalog};
use crate::scoring::AggregationPolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// TLS negotiation for the probe session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SslMode {
    /// Plain TCP only
    Disable,

    /// Try TLS, fall back to plain TCP
    Prefer,

    /// TLS only
    Require,
}

impl Default for SslMode {
    fn default() -> Self {
        Self::Require
    }
}

impl std::str::FromStr for SslMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "disable" => Ok(Self::Disable),
            "prefer" => Ok(Self::Prefer),
            "require" => Ok(Self::Require),
            _ => Err(ConfigError::InvalidValue {
                key: "sslmode".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for SslMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disable => write!(f, "disable"),
            Self::Prefer => write!(f, "prefer"),
            Self::Require => write!(f, "require"),
        }
    }
}

/// Target database connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
    pub sslmode: SslMode,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: "password".to_string(),
            dbname: "testdb".to_string(),
            sslmode: SslMode::Require,
        }
    }
}

impl ConnectionConfig {
    /// Override settings from `PG_*` variables found by `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("PG_HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("PG_PORT") {
            self.port = port.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "PG_PORT".to_string(),
                value: port.clone(),
            })?;
        }
        if let Some(user) = lookup("PG_USER") {
            self.user = user;
        }
        if let Some(password) = lookup("PG_PASSWORD") {
            self.password = password;
        }
        if let Some(dbname) = lookup("PG_DBNAME") {
            self.dbname = dbname;
        }
        if let Some(sslmode) = lookup("PG_SSLMODE") {
            self.sslmode = sslmode.parse()?;
        }
        Ok(())
    }

    /// libpq-style key/value connection string
    pub fn to_connection_string(&self) -> String {
        format!(
            "host={} port={} user={} password={} dbname={}",
            quote_conn_value(&self.host),
            self.port,
            quote_conn_value(&self.user),
            quote_conn_value(&self.password),
            quote_conn_value(&self.dbname),
        )
    }

    /// Connection target without credentials, for logs
    pub fn describe(&self) -> String {
        format!("{}@{}:{}/{}", self.user, self.host, self.port, self.dbname)
    }
}

fn quote_conn_value(value: &str) -> String {
    if !value.is_empty() && !value.contains(|c: char| c.is_whitespace() || c == '\'' || c == '\\') {
        return value.to_string();
    }
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{}'", escaped)
}

/// Scoring settings
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Aggregation policy (penalty or normalized)
    pub policy: AggregationPolicy,

    /// Override the points deducted per failed probe
    #[serde(skip_serializing_if = "Option::is_none")]
    pub penalty_per_failure: Option<f64>,

    /// Override category weights
    pub weights: HashMap<String, f64>,
}

impl ScoringConfig {
    /// Build the catalogue with overrides applied
    pub fn build_catalog(&self) -> Result<FeatureCatalog, CatalogError> {
        let mut catalog = FeatureCatalog::standard().with_weights(&self.weights)?;
        if let Some(penalty) = self.penalty_per_failure {
            catalog = catalog.with_penalty(penalty)?;
        }
        Ok(catalog)
    }
}

/// Probe run settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Schema dropped and recreated at the start of every run
    pub scratch_schema: String,

    /// Where the JSON report is written
    pub report: PathBuf,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            scratch_schema: "pci_test".to_string(),
            report: PathBuf::from("pci_report.json"),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub connection: ConnectionConfig,

    #[serde(default)]
    pub scoring: ScoringConfig,

    #[serde(default)]
    pub run: RunConfig,
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Self::from_toml(&contents)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Apply `PG_*` overrides from the process environment
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        self.connection.apply_env(|key| std::env::var(key).ok())?;
        Ok(self)
    }

    /// Check values that end up inside SQL text
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_plain_identifier(&self.run.scratch_schema) {
            return Err(ConfigError::InvalidValue {
                key: "run.scratch_schema".to_string(),
                value: self.run.scratch_schema.clone(),
            });
        }
        Ok(())
    }
}

/// Lowercase SQL identifier that needs no quoting
pub fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {}
        _ => return false,
    }
    name.len() <= 63 && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },
}
