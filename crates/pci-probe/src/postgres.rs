//! PostgreSQL session using tokio-postgres
//!
//! Statements go through the simple query protocol, so a single `execute`
//! call may carry several `;`-separated statements and every value comes
//! back as text. There is no surrounding transaction: each statement
//! commits on its own unless the probe opens a block with `BEGIN`.
//!
//! ## TLS
//!
//! `sslmode` follows libpq semantics:
//! - `disable` - plain TCP
//! - `prefer` - TLS if the server offers it
//! - `require` - TLS only, without verifying the server certificate
//!
//! ## Usage
//!
//! ```rust,ignore
//! let config = ConnectionConfig::default();
//! let session = PostgresSession::connect(&config).await?;
//! session.execute("CREATE TABLE t (id INT)").await?;
//! ```

use crate::session::{Row, SessionError, SqlSession};
use pci_core::{ConnectionConfig, SslMode};

#[cfg(feature = "postgres")]
use tokio_postgres::{error::SqlState, Client, Config as PgConfig, NoTls, SimpleQueryMessage};

#[cfg(feature = "postgres")]
use postgres_native_tls::MakeTlsConnector;

#[cfg(feature = "postgres")]
use native_tls::TlsConnector;

/// PostgreSQL probe session
pub struct PostgresSession {
    /// PostgreSQL client (only available with postgres feature)
    #[cfg(feature = "postgres")]
    client: Client,

    /// Connection target without credentials
    target: String,
}

impl PostgresSession {
    /// Connect using the given settings
    #[cfg(feature = "postgres")]
    pub async fn connect(config: &ConnectionConfig) -> Result<Self, SessionError> {
        let target = config.describe();

        let mut pg_config: PgConfig = config
            .to_connection_string()
            .parse()
            .map_err(|e| SessionError::Connect(format!("Invalid connection settings: {}", e)))?;

        let client = match config.sslmode {
            SslMode::Disable => {
                pg_config.ssl_mode(tokio_postgres::config::SslMode::Disable);
                Self::connect_plain(&pg_config, &target).await?
            }
            SslMode::Prefer => {
                pg_config.ssl_mode(tokio_postgres::config::SslMode::Prefer);
                Self::connect_tls(&pg_config, &target).await?
            }
            SslMode::Require => {
                pg_config.ssl_mode(tokio_postgres::config::SslMode::Require);
                Self::connect_tls(&pg_config, &target).await?
            }
        };

        tracing::info!(target = %target, sslmode = %config.sslmode, "connected to database");

        Ok(Self { client, target })
    }

    /// Connect without postgres feature (returns error)
    #[cfg(not(feature = "postgres"))]
    pub async fn connect(_config: &ConnectionConfig) -> Result<Self, SessionError> {
        Err(SessionError::Connect(
            "PostgreSQL support not compiled. Rebuild with: cargo build --features postgres".to_string()
        ))
    }

    #[cfg(feature = "postgres")]
    async fn connect_plain(pg_config: &PgConfig, target: &str) -> Result<Client, SessionError> {
        let (client, connection) = pg_config
            .connect(NoTls)
            .await
            .map_err(|e| SessionError::Connect(format!("Failed to connect to {}: {}", target, e)))?;

        // Spawn connection handler in background
        let target = target.to_string();
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(target = %target, error = %e, "PostgreSQL connection error");
            }
        });

        Ok(client)
    }

    #[cfg(feature = "postgres")]
    async fn connect_tls(pg_config: &PgConfig, target: &str) -> Result<Client, SessionError> {
        // sslmode=require does not verify the server certificate
        let connector = TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true)
            .build()
            .map_err(|e| SessionError::Connect(format!("Failed to create TLS connector: {}", e)))?;

        let tls = MakeTlsConnector::new(connector);

        let (client, connection) = pg_config
            .connect(tls)
            .await
            .map_err(|e| SessionError::Connect(format!("Failed to connect to {} with TLS: {}", target, e)))?;

        // Spawn connection handler in background
        let target = target.to_string();
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(target = %target, error = %e, "PostgreSQL TLS connection error");
            }
        });

        Ok(client)
    }

    /// Connection target without credentials
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Server version as reported by `SHOW server_version`
    pub async fn server_version(&self) -> Result<Option<String>, SessionError> {
        let row = self.fetch_one("SHOW server_version").await?;
        Ok(row.and_then(|r| r.text(0).map(str::to_string)))
    }
}

/// Map a driver error onto the session error taxonomy
#[cfg(feature = "postgres")]
fn map_error(err: tokio_postgres::Error) -> SessionError {
    if err.is_closed() {
        return SessionError::ConnectionLost(err.to_string());
    }

    let Some(db) = err.as_db_error() else {
        return SessionError::Other {
            code: None,
            message: err.to_string(),
        };
    };

    let message = db.message().to_string();
    let code = db.code();

    if *code == SqlState::SYNTAX_ERROR {
        SessionError::Syntax(message)
    } else if *code == SqlState::UNDEFINED_FUNCTION {
        SessionError::UndefinedFunction(message)
    } else if *code == SqlState::FEATURE_NOT_SUPPORTED {
        SessionError::FeatureNotSupported(message)
    } else if *code == SqlState::ADMIN_SHUTDOWN || *code == SqlState::CRASH_SHUTDOWN {
        SessionError::ConnectionLost(message)
    } else {
        SessionError::Other {
            code: Some(code.code().to_string()),
            message,
        }
    }
}

#[async_trait::async_trait]
impl SqlSession for PostgresSession {
    fn name(&self) -> &'static str {
        "PostgreSQL"
    }

    #[cfg(feature = "postgres")]
    async fn execute(&self, sql: &str) -> Result<(), SessionError> {
        self.client.batch_execute(sql).await.map_err(map_error)
    }

    #[cfg(not(feature = "postgres"))]
    async fn execute(&self, _sql: &str) -> Result<(), SessionError> {
        Err(SessionError::Connect(
            "PostgreSQL support not compiled. Rebuild with: cargo build --features postgres".to_string()
        ))
    }

    #[cfg(feature = "postgres")]
    async fn fetch_one(&self, sql: &str) -> Result<Option<Row>, SessionError> {
        let messages = self.client.simple_query(sql).await.map_err(map_error)?;

        let row = messages.into_iter().find_map(|message| match message {
            SimpleQueryMessage::Row(row) => Some(Row::new(
                (0..row.len()).map(|i| row.get(i).map(str::to_string)).collect(),
            )),
            _ => None,
        });

        Ok(row)
    }

    #[cfg(not(feature = "postgres"))]
    async fn fetch_one(&self, _sql: &str) -> Result<Option<Row>, SessionError> {
        Err(SessionError::Connect(
            "PostgreSQL support not compiled. Rebuild with: cargo build --features postgres".to_string()
        ))
    }
}
