//! Probes that read system catalogues instead of exercising a feature

use crate::probe::{Probe, ProbeContext, ProbeError, Progress};
use crate::probes::sql::{quote_ident, quote_literal};
use pci_core::Classification;

/// `full` if the server ships the named extension, `no` otherwise
///
/// Only `pg_available_extensions` is consulted; nothing is installed.
#[derive(Debug, Clone)]
pub struct ExtensionAvailableProbe {
    extension: &'static str,
}

impl ExtensionAvailableProbe {
    pub fn new(extension: &'static str) -> Self {
        Self { extension }
    }
}

#[async_trait::async_trait]
impl Probe for ExtensionAvailableProbe {
    async fn run(&self, ctx: &ProbeContext<'_>, _progress: &mut Progress) -> Result<Classification, ProbeError> {
        let sql = format!(
            "SELECT coalesce((SELECT 1 FROM pg_available_extensions WHERE name = {}), 0)",
            quote_literal(self.extension)
        );

        let available = ctx
            .session
            .fetch_one(&sql)
            .await?
            .and_then(|row| row.parse::<i64>(0))
            .unwrap_or(0);

        tracing::debug!(extension = self.extension, available, "checked extension availability");

        Ok(if available != 0 {
            Classification::Full
        } else {
            Classification::No
        })
    }
}

/// A column type shipped by an extension must be usable in a table
///
/// The extension may already be installed in any schema, so the type is
/// qualified with the schema `pg_extension` reports for it.
#[derive(Debug, Clone)]
pub struct ExtensionTypeProbe {
    extension: &'static str,
    table: &'static str,
    column: &'static str,
    column_type: &'static str,
}

impl ExtensionTypeProbe {
    pub fn new(extension: &'static str, table: &'static str, column: &'static str, column_type: &'static str) -> Self {
        Self {
            extension,
            table,
            column,
            column_type,
        }
    }
}

#[async_trait::async_trait]
impl Probe for ExtensionTypeProbe {
    async fn run(&self, ctx: &ProbeContext<'_>, _progress: &mut Progress) -> Result<Classification, ProbeError> {
        ctx.session
            .execute(&format!("CREATE EXTENSION IF NOT EXISTS {}", self.extension))
            .await?;

        let sql = format!(
            "SELECT n.nspname FROM pg_extension e \
             JOIN pg_namespace n ON n.oid = e.extnamespace \
             WHERE e.extname = {}",
            quote_literal(self.extension)
        );
        let schema = ctx
            .session
            .fetch_one(&sql)
            .await?
            .and_then(|row| row.text(0).map(str::to_string))
            .ok_or_else(|| {
                ProbeError::assertion(format!("{} missing from pg_extension after CREATE EXTENSION", self.extension))
            })?;

        tracing::debug!(extension = self.extension, schema = %schema, "resolved extension schema");

        ctx.session
            .execute(&format!(
                "CREATE TABLE {} ({} {}.{})",
                self.table,
                self.column,
                quote_ident(&schema),
                self.column_type
            ))
            .await?;

        Ok(Classification::Full)
    }
}

/// Streaming replication is configured when WAL carries replica data and
/// at least one WAL sender is allowed
#[derive(Debug, Clone, Default)]
pub struct StreamingReplicationProbe;

const REPLICATION_SETTINGS: &str = "SELECT \
     (SELECT setting FROM pg_settings WHERE name = 'wal_level'), \
     (SELECT setting FROM pg_settings WHERE name = 'max_wal_senders')";

#[async_trait::async_trait]
impl Probe for StreamingReplicationProbe {
    async fn run(&self, ctx: &ProbeContext<'_>, _progress: &mut Progress) -> Result<Classification, ProbeError> {
        let Some(row) = ctx.session.fetch_one(REPLICATION_SETTINGS).await? else {
            return Ok(Classification::No);
        };

        let wal_level = row.text(0).unwrap_or_default().trim();
        let max_wal_senders = row.parse::<i64>(1).unwrap_or(0);

        tracing::debug!(wal_level, max_wal_senders, "read replication settings");

        if matches!(wal_level, "replica" | "logical") && max_wal_senders > 0 {
            Ok(Classification::Full)
        } else {
            Ok(Classification::No)
        }
    }
}

/// Logical replication: a row-filtered publication must be readable back
/// from `pg_publication`
#[derive(Debug, Clone, Default)]
pub struct PublicationProbe;

const PUBLICATION: &str = "test_pub";

#[async_trait::async_trait]
impl Probe for PublicationProbe {
    async fn run(&self, ctx: &ProbeContext<'_>, _progress: &mut Progress) -> Result<Classification, ProbeError> {
        // Publications are database-wide, so a previous run may have left one
        ctx.session.execute("DROP PUBLICATION IF EXISTS test_pub").await?;
        ctx.session
            .execute("CREATE TABLE test_replication (id INT PRIMARY KEY, value TEXT)")
            .await?;
        ctx.session
            .execute("CREATE PUBLICATION test_pub FOR TABLE test_replication WHERE (id > 10 AND value <> 'UNKNOWN')")
            .await?;

        let row = ctx
            .session
            .fetch_one(
                "SELECT pubname, puballtables, pubinsert, pubupdate, pubdelete \
                 FROM pg_publication WHERE pubname = 'test_pub'",
            )
            .await?;

        match row {
            Some(row) if row.text(0) == Some(PUBLICATION) => {
                ctx.session.execute("DROP PUBLICATION test_pub").await?;
                Ok(Classification::Full)
            }
            Some(row) => Err(ProbeError::assertion(format!(
                "Publication read back as {:?} instead of {}",
                row.text(0),
                PUBLICATION
            ))),
            None => Err(ProbeError::assertion("Publication test_pub not found in pg_publication")),
        }
    }
}
