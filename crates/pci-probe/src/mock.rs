//! Mock session for testing
//!
//! This session never touches a database. Statements are matched against
//! scripted rules (substring match, first rule wins) and every call is
//! recorded. It's useful for:
//! - Unit testing the classification policy of each probe
//! - Testing the runner's containment of probe failures
//! - Simulating databases that reject specific features
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pci_probe::{MockSession, SessionError, Row};
//!
//! let session = MockSession::new()
//!     .fail_on("LANGUAGE plpgsql", SessionError::FeatureNotSupported("plpgsql".into()))
//!     .respond_with("pg_available_extensions", Row::from_texts(["1"]));
//! ```
//!
//! Statements without a matching rule succeed; queries without a matching
//! rule return no row.

use crate::session::{Row, SessionError, SqlSession};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Scripted reaction to a statement
#[derive(Debug, Clone)]
enum Response {
    Fail(SessionError),
    Row(Row),
    NoRow,
}

#[derive(Debug, Clone)]
struct Rule {
    pattern: String,
    response: Response,
}

/// Mock session for testing
///
/// Clones share the statement log.
#[derive(Debug, Clone, Default)]
pub struct MockSession {
    rules: Vec<Rule>,

    /// Every statement seen, in order
    log: Arc<RwLock<Vec<String>>>,
}

impl MockSession {
    /// Create a session that accepts everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail any statement containing `pattern`
    pub fn fail_on(mut self, pattern: impl Into<String>, error: SessionError) -> Self {
        self.rules.push(Rule {
            pattern: pattern.into(),
            response: Response::Fail(error),
        });
        self
    }

    /// Return `row` from any query containing `pattern`
    pub fn respond_with(mut self, pattern: impl Into<String>, row: Row) -> Self {
        self.rules.push(Rule {
            pattern: pattern.into(),
            response: Response::Row(row),
        });
        self
    }

    /// Return no row from any query containing `pattern`
    pub fn respond_empty(mut self, pattern: impl Into<String>) -> Self {
        self.rules.push(Rule {
            pattern: pattern.into(),
            response: Response::NoRow,
        });
        self
    }

    /// All statements seen so far
    pub async fn statements(&self) -> Vec<String> {
        self.log.read().await.clone()
    }

    /// Whether any recorded statement contains `pattern`
    pub async fn saw(&self, pattern: &str) -> bool {
        self.log.read().await.iter().any(|s| s.contains(pattern))
    }

    async fn lookup(&self, sql: &str) -> Option<Response> {
        self.log.write().await.push(sql.to_string());
        self.rules
            .iter()
            .find(|rule| sql.contains(&rule.pattern))
            .map(|rule| rule.response.clone())
    }
}

#[async_trait::async_trait]
impl SqlSession for MockSession {
    fn name(&self) -> &'static str {
        "Mock"
    }

    async fn execute(&self, sql: &str) -> Result<(), SessionError> {
        match self.lookup(sql).await {
            Some(Response::Fail(error)) => Err(error),
            _ => Ok(()),
        }
    }

    async fn fetch_one(&self, sql: &str) -> Result<Option<Row>, SessionError> {
        match self.lookup(sql).await {
            Some(Response::Fail(error)) => Err(error),
            Some(Response::Row(row)) => Ok(Some(row)),
            Some(Response::NoRow) | None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn accepts_unscripted_statements() {
        let session = MockSession::new();
        assert!(session.execute("CREATE TABLE t (id INT)").await.is_ok());
        assert_eq!(session.fetch_one("SELECT 1").await.unwrap(), None);
        assert_eq!(session.statements().await.len(), 2);
    }

    #[tokio::test]
    async fn first_matching_rule_wins() {
        let session = MockSession::new()
            .fail_on("VECTOR", SessionError::Syntax("type vector".into()))
            .respond_with("VECTOR", Row::from_texts(["unreachable"]));

        let err = session.fetch_one("CREATE TABLE v (e VECTOR(3))").await.unwrap_err();
        assert_eq!(err, SessionError::Syntax("type vector".into()));
    }

    #[tokio::test]
    async fn scripted_rows() {
        let session = MockSession::new()
            .respond_with("server_version", Row::from_texts(["16.2"]))
            .respond_empty("pg_publication");

        let row = session.fetch_one("SHOW server_version").await.unwrap().unwrap();
        assert_eq!(row.text(0), Some("16.2"));
        assert_eq!(session.fetch_one("SELECT * FROM pg_publication").await.unwrap(), None);
    }

    #[tokio::test]
    async fn clones_share_the_log() {
        let session = MockSession::new();
        let clone = session.clone();
        clone.execute("SELECT 1").await.unwrap();
        assert!(session.saw("SELECT 1").await);
    }
}
