//! Database session trait consumed by probes

use pci_core::FailureKind;
use std::str::FromStr;

/// One result row, every column as text (or NULL)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    values: Vec<Option<String>>,
}

impl Row {
    pub fn new(values: Vec<Option<String>>) -> Self {
        Self { values }
    }

    /// Build a row of non-null text values
    pub fn from_texts<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: values.into_iter().map(|v| Some(v.into())).collect(),
        }
    }

    /// Text value of a column, `None` if NULL or out of range
    pub fn text(&self, idx: usize) -> Option<&str> {
        self.values.get(idx)?.as_deref()
    }

    /// Parse a column into `T`, `None` if NULL, out of range or unparsable
    pub fn parse<T: FromStr>(&self, idx: usize) -> Option<T> {
        self.text(idx)?.trim().parse().ok()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Errors reported by a session
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Syntax error: {0}")]
    Syntax(String),

    #[error("Undefined function: {0}")]
    UndefinedFunction(String),

    #[error("Feature not supported: {0}")]
    FeatureNotSupported(String),

    #[error("Database error{}: {message}", sqlstate_suffix(.code))]
    Other {
        /// SQLSTATE, when the server sent one
        code: Option<String>,
        message: String,
    },

    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    #[error("Connection failed: {0}")]
    Connect(String),
}

fn sqlstate_suffix(code: &Option<String>) -> String {
    code.as_ref().map(|c| format!(" [{}]", c)).unwrap_or_default()
}

impl SessionError {
    /// Fatal errors end the whole run instead of classifying one probe
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ConnectionLost(_) | Self::Connect(_))
    }

    /// Diagnostic kind recorded when this error stops a probe
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Syntax(_) => FailureKind::SyntaxError,
            Self::UndefinedFunction(_) => FailureKind::UndefinedFunction,
            Self::FeatureNotSupported(_) => FailureKind::FeatureNotSupported,
            Self::Other { .. } | Self::ConnectionLost(_) | Self::Connect(_) => FailureKind::OtherError,
        }
    }
}

/// A live database session running in autocommit mode
///
/// Statements commit independently; a failed statement never rolls back
/// earlier ones.
#[async_trait::async_trait]
pub trait SqlSession: Send + Sync {
    /// Get the session name (e.g., "PostgreSQL")
    fn name(&self) -> &'static str;

    /// Execute one or more `;`-separated statements, discarding results
    async fn execute(&self, sql: &str) -> Result<(), SessionError>;

    /// Run a query and return its first row, if any
    async fn fetch_one(&self, sql: &str) -> Result<Option<Row>, SessionError>;
}
