//! Probes that check observed behavior, not just statement acceptance
//!
//! A statement the server accepts can still behave differently from
//! PostgreSQL. These probes inspect a plan, a WAL delta or a function result
//! and raise [`ProbeError::Assertion`] when the evidence contradicts the
//! expected behavior.

use crate::probe::{Probe, ProbeContext, ProbeError, Progress};
use crate::probes::sql::{is_lsn, quote_ident, quote_literal};
use pci_core::Classification;
use serde_json::Value;

/// Range partitioning with plan-time pruning
#[derive(Debug, Clone, Default)]
pub struct PartitionPruningProbe;

const PARTITIONED_TABLE: &str = "CREATE TABLE test_part (id INT) PARTITION BY RANGE (id); \
     CREATE TABLE test_part1 PARTITION OF test_part FOR VALUES FROM (1) TO (100); \
     CREATE TABLE test_part2 PARTITION OF test_part FOR VALUES FROM (101) TO (200); \
     ANALYZE test_part";

/// Collect every `"Relation Name"` mentioned in an `EXPLAIN (FORMAT JSON)` plan
pub fn plan_relations(plan: &Value) -> Vec<String> {
    let mut found = Vec::new();
    collect_relations(plan, &mut found);
    found
}

fn collect_relations(node: &Value, found: &mut Vec<String>) {
    match node {
        Value::Object(map) => {
            for (key, value) in map {
                match (key.as_str(), value) {
                    ("Relation Name", Value::String(name)) => found.push(name.clone()),
                    _ => collect_relations(value, found),
                }
            }
        }
        Value::Array(items) => items.iter().for_each(|item| collect_relations(item, found)),
        _ => {}
    }
}

#[async_trait::async_trait]
impl Probe for PartitionPruningProbe {
    async fn run(&self, ctx: &ProbeContext<'_>, _progress: &mut Progress) -> Result<Classification, ProbeError> {
        ctx.session.execute(PARTITIONED_TABLE).await?;

        let row = ctx
            .session
            .fetch_one("EXPLAIN (FORMAT JSON) SELECT * FROM test_part WHERE id = 150")
            .await?
            .ok_or_else(|| ProbeError::assertion("EXPLAIN returned no plan"))?;

        let text = row
            .text(0)
            .ok_or_else(|| ProbeError::assertion("EXPLAIN returned a NULL plan"))?;

        let plan: Value = serde_json::from_str(text)
            .map_err(|e| ProbeError::assertion(format!("EXPLAIN output is not JSON: {}", e)))?;

        let relations = plan_relations(&plan);
        tracing::debug!(?relations, "partitions in plan");

        let scans_part2 = relations.iter().any(|r| r == "test_part2");
        let scans_part1 = relations.iter().any(|r| r == "test_part1");

        if scans_part2 && !scans_part1 {
            Ok(Classification::Full)
        } else {
            Err(ProbeError::assertion(format!(
                "Partition pruning failed: plan scans {:?} for id = 150",
                relations
            )))
        }
    }
}

/// Unlogged tables must not write their contents to WAL
#[derive(Debug, Clone)]
pub struct UnloggedWalProbe {
    /// Maximum WAL bytes tolerated for the bulk insert
    threshold: f64,
}

/// WAL bytes tolerated while inserting 10 000 rows into an unlogged table
pub const UNLOGGED_WAL_THRESHOLD: f64 = 50_000.0;

impl Default for UnloggedWalProbe {
    fn default() -> Self {
        Self {
            threshold: UNLOGGED_WAL_THRESHOLD,
        }
    }
}

#[async_trait::async_trait]
impl Probe for UnloggedWalProbe {
    async fn run(&self, ctx: &ProbeContext<'_>, _progress: &mut Progress) -> Result<Classification, ProbeError> {
        ctx.session
            .execute(
                "DROP TABLE IF EXISTS unlogged_pci_demo; \
                 CREATE UNLOGGED TABLE unlogged_pci_demo (n INT PRIMARY KEY, flag CHAR, text TEXT)",
            )
            .await?;

        let before = ctx
            .session
            .fetch_one("SELECT pg_current_wal_lsn()")
            .await?
            .and_then(|row| row.text(0).map(|t| t.trim().to_string()))
            .ok_or_else(|| ProbeError::assertion("pg_current_wal_lsn() returned nothing"))?;

        if !is_lsn(&before) {
            return Err(ProbeError::assertion(format!("Unexpected WAL position: {}", before)));
        }

        ctx.session
            .execute(
                "INSERT INTO unlogged_pci_demo \
                 SELECT g, 'N', lpad('x', g, 'x') FROM generate_series(1, 10000) AS g",
            )
            .await?;

        let sql = format!(
            "SELECT pg_wal_lsn_diff(pg_current_wal_lsn(), {}::pg_lsn)",
            quote_literal(&before)
        );
        let delta = ctx
            .session
            .fetch_one(&sql)
            .await?
            .and_then(|row| row.parse::<f64>(0))
            .ok_or_else(|| ProbeError::assertion("pg_wal_lsn_diff() returned nothing"))?;

        tracing::debug!(wal_bytes = delta, threshold = self.threshold, "WAL generated by unlogged insert");

        if delta < self.threshold {
            Ok(Classification::Full)
        } else {
            Err(ProbeError::assertion(format!(
                "Unlogged table generated {} bytes of WAL (limit {})",
                delta, self.threshold
            )))
        }
    }
}

/// C-language function loaded from a server library, wrapped in SQL
///
/// Builds an immutable wrapper around the `unaccent` dictionary inside the
/// scratch schema and checks its output. Everything it creates is dropped
/// again, including the extension when this probe installed it.
#[derive(Debug, Clone, Default)]
pub struct UnaccentProbe;

const UNACCENT_INPUT: &str = "Crème Brûlée";
const UNACCENT_EXPECTED: &str = "Creme Brulee";

impl UnaccentProbe {
    async fn exercise(&self, ctx: &ProbeContext<'_>) -> Result<Classification, ProbeError> {
        let schema = quote_ident(ctx.scratch_schema);

        ctx.session.execute("CREATE EXTENSION IF NOT EXISTS unaccent").await?;

        let dict_schema = ctx
            .session
            .fetch_one(
                "SELECT n.nspname FROM pg_ts_dict d \
                 JOIN pg_namespace n ON n.oid = d.dictnamespace \
                 WHERE d.dictname = 'unaccent'",
            )
            .await?
            .and_then(|row| row.text(0).map(str::to_string))
            .ok_or_else(|| ProbeError::assertion("unaccent dictionary not found after CREATE EXTENSION"))?;

        let dictionary = format!("{}.unaccent", quote_ident(&dict_schema));

        ctx.session
            .execute(&format!(
                "CREATE OR REPLACE FUNCTION {}.immutable_unaccent(regdictionary, text) \
                 RETURNS text LANGUAGE c IMMUTABLE PARALLEL SAFE STRICT AS \
                 '$libdir/unaccent', 'unaccent_dict'",
                schema
            ))
            .await?;

        ctx.session
            .execute(&format!(
                "CREATE OR REPLACE FUNCTION {schema}.f_unaccent(text) \
                 RETURNS text LANGUAGE sql IMMUTABLE PARALLEL SAFE STRICT AS \
                 $func$ SELECT {schema}.immutable_unaccent(regdictionary {}, $1) $func$",
                quote_literal(&dictionary),
                schema = schema
            ))
            .await?;

        let output = ctx
            .session
            .fetch_one(&format!("SELECT {}.f_unaccent({})", schema, quote_literal(UNACCENT_INPUT)))
            .await?
            .and_then(|row| row.text(0).map(|t| t.trim().to_string()));

        match output.as_deref() {
            Some(UNACCENT_EXPECTED) => Ok(Classification::Full),
            other => Err(ProbeError::assertion(format!(
                "f_unaccent({:?}) returned {:?}, expected {:?}",
                UNACCENT_INPUT, other, UNACCENT_EXPECTED
            ))),
        }
    }

    async fn cleanup(&self, ctx: &ProbeContext<'_>, drop_extension: bool) {
        let schema = quote_ident(ctx.scratch_schema);
        let mut statements = vec![
            format!("DROP FUNCTION IF EXISTS {}.f_unaccent(text)", schema),
            format!("DROP FUNCTION IF EXISTS {}.immutable_unaccent(regdictionary, text)", schema),
        ];
        if drop_extension {
            statements.push("DROP EXTENSION IF EXISTS unaccent".to_string());
        }

        for statement in statements {
            if let Err(e) = ctx.session.execute(&statement).await {
                tracing::debug!(statement = %statement, error = %e, "cleanup statement failed");
            }
        }
    }
}

#[async_trait::async_trait]
impl Probe for UnaccentProbe {
    async fn run(&self, ctx: &ProbeContext<'_>, _progress: &mut Progress) -> Result<Classification, ProbeError> {
        let preinstalled = ctx
            .session
            .fetch_one("SELECT 1 FROM pg_extension WHERE extname = 'unaccent'")
            .await?
            .is_some();

        let result = self.exercise(ctx).await;

        // Nothing to clean up over a dead connection
        if !matches!(&result, Err(ProbeError::Session(e)) if e.is_fatal()) {
            self.cleanup(ctx, !preinstalled).await;
        }

        result
    }
}
