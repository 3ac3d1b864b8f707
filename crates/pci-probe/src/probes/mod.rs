//! Probe registry and the standard probe set
//!
//! Probes are looked up by `(category, sub-feature)`. The standard registry
//! covers every entry of [`FeatureCatalog::standard`](pci_core::FeatureCatalog::standard).
//!
//! Probes run in catalogue order on one session, and some rely on tables
//! created by earlier ones (`test_primitive`, `test_jsonb`, `test_fts`).

pub mod assertions;
pub mod sql;
pub mod statements;
pub mod structural;

pub use assertions::{plan_relations, PartitionPruningProbe, UnaccentProbe, UnloggedWalProbe, UNLOGGED_WAL_THRESHOLD};
pub use statements::{StagedProbe, StatementProbe};
pub use structural::{ExtensionAvailableProbe, ExtensionTypeProbe, PublicationProbe, StreamingReplicationProbe};

use crate::probe::Probe;
use pci_core::catalog::categories;
use std::collections::HashMap;

/// Probes keyed by (category, sub-feature)
#[derive(Default)]
pub struct ProbeRegistry {
    probes: HashMap<(String, String), Box<dyn Probe>>,
}

impl ProbeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a probe, replacing any previous one for the same entry
    pub fn register(&mut self, category: &str, sub_feature: &str, probe: impl Probe + 'static) -> &mut Self {
        self.probes
            .insert((category.to_string(), sub_feature.to_string()), Box::new(probe));
        self
    }

    /// Look up the probe for an entry
    pub fn get(&self, category: &str, sub_feature: &str) -> Option<&dyn Probe> {
        self.probes
            .get(&(category.to_string(), sub_feature.to_string()))
            .map(|probe| probe.as_ref())
    }

    pub fn contains(&self, category: &str, sub_feature: &str) -> bool {
        self.get(category, sub_feature).is_some()
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }

    /// Probes for the standard catalogue
    pub fn standard() -> Self {
        use categories::*;

        let mut registry = Self::new();

        registry
            .register(DATA_TYPES, "Primitive Types", StatementProbe::single("CREATE TABLE test_primitive (id INT, name TEXT)"))
            .register(DATA_TYPES, "Complex Types", StatementProbe::single("CREATE TYPE test_complex AS (x INT, y TEXT)"))
            .register(DATA_TYPES, "JSONB", StatementProbe::single("CREATE TABLE test_jsonb (data JSONB)"))
            .register(
                DATA_TYPES,
                "Geospatial Types",
                ExtensionTypeProbe::new("postgis", "test_geo", "geom", "geometry"),
            )
            .register(
                DATA_TYPES,
                "Custom Types",
                StatementProbe::single("CREATE TYPE mood AS ENUM ('happy', 'sad', 'neutral')"),
            )
            .register(DATA_TYPES, "Full-Text Search", StatementProbe::single("CREATE TABLE test_fts (content TSVECTOR)"))
            .register(
                DATA_TYPES,
                "Vector",
                ExtensionTypeProbe::new("vector", "test_vector", "embedding", "vector(3)"),
            );

        registry
            .register(
                DDL_FEATURES,
                "Schemas",
                StatementProbe::new([
                    "DROP SCHEMA IF EXISTS test_schema CASCADE",
                    "CREATE SCHEMA test_schema",
                    "DROP SCHEMA test_schema",
                ]),
            )
            .register(DDL_FEATURES, "Sequences", StatementProbe::single("CREATE SEQUENCE test_seq START 1"))
            .register(DDL_FEATURES, "Views", StatementProbe::single("CREATE VIEW test_view AS SELECT 1 AS col"))
            .register(
                DDL_FEATURES,
                "Materialized Views",
                StatementProbe::single("CREATE MATERIALIZED VIEW test_matview AS SELECT 1 AS col"),
            );

        registry
            .register(SQL_FEATURES, "CTEs", StatementProbe::single("WITH cte AS (SELECT 1 AS val) SELECT * FROM cte"))
            .register(
                SQL_FEATURES,
                "Upsert",
                StatementProbe::new([
                    "CREATE TABLE test_upsert (id INT PRIMARY KEY, data TEXT)",
                    "INSERT INTO test_upsert VALUES (1, 'test') ON CONFLICT (id) DO UPDATE SET data = 'updated'",
                ]),
            )
            .register(
                SQL_FEATURES,
                "Window Functions",
                StatementProbe::single("SELECT ROW_NUMBER() OVER (PARTITION BY 1 ORDER BY 1)"),
            )
            .register(
                SQL_FEATURES,
                "Subqueries",
                StatementProbe::single("SELECT * FROM (SELECT 1) AS sub WHERE 1 = (SELECT 1)"),
            );

        registry
            .register(
                PROCEDURAL_FEATURES,
                "Stored Procedures",
                StatementProbe::new([
                    "CREATE PROCEDURE test_proc() LANGUAGE SQL AS $$ SELECT 1; $$",
                    "CALL test_proc()",
                ]),
            )
            .register(
                PROCEDURAL_FEATURES,
                "Functions",
                StagedProbe::new([
                    "DROP FUNCTION IF EXISTS test_func(); \
                     CREATE FUNCTION test_func() RETURNS INT LANGUAGE SQL AS $$ SELECT 1; $$; \
                     SELECT test_func()",
                    "DROP FUNCTION IF EXISTS test_func_plpgsql(); \
                     CREATE FUNCTION test_func_plpgsql() RETURNS void LANGUAGE plpgsql AS $$ BEGIN NULL; END; $$; \
                     SELECT test_func_plpgsql()",
                ]),
            )
            .register(
                PROCEDURAL_FEATURES,
                "Triggers",
                StatementProbe::new([
                    "CREATE TABLE test_trig (id INT)",
                    "CREATE FUNCTION test_trigger() RETURNS TRIGGER LANGUAGE plpgsql AS $$ BEGIN RETURN NEW; END; $$",
                    "CREATE TRIGGER trg BEFORE INSERT ON test_trig FOR EACH ROW EXECUTE FUNCTION test_trigger()",
                ]),
            );

        registry
            .register(
                PERFORMANCE,
                "Index Types",
                StagedProbe::new([
                    "CREATE INDEX test_btree ON test_primitive USING btree (id)",
                    "CREATE INDEX test_gin ON test_jsonb USING gin (data)",
                    "CREATE INDEX test_gist ON test_fts USING gist (content)",
                    "CREATE INDEX test_hash ON test_primitive USING hash (id)",
                ]),
            )
            .register(PERFORMANCE, "Partitioning", PartitionPruningProbe)
            .register(
                PERFORMANCE,
                "Parallel Query Execution",
                StatementProbe::new([
                    "SET max_parallel_workers = 4",
                    "SET max_parallel_workers_per_gather = 4",
                    "SELECT COUNT(*) FROM generate_series(1, 50000) AS t(id)",
                ]),
            )
            .register(PERFORMANCE, "Unlogged Table", UnloggedWalProbe::default());

        registry
            .register(
                CONSTRAINTS,
                "Foreign Key",
                StatementProbe::new([
                    "CREATE TABLE parent (id INT PRIMARY KEY)",
                    "CREATE TABLE child (parent_id INT, CONSTRAINT fk_parent FOREIGN KEY (parent_id) REFERENCES parent (id))",
                ]),
            )
            .register(CONSTRAINTS, "Check", StatementProbe::single("CREATE TABLE test_check (id INT CHECK (id > 0))"))
            .register(CONSTRAINTS, "Not Null", StatementProbe::single("CREATE TABLE test_notnull (id INT NOT NULL)"))
            .register(CONSTRAINTS, "Unique", StatementProbe::single("CREATE TABLE test_unique (id INT UNIQUE)"))
            .register(
                CONSTRAINTS,
                "Exclusion",
                StatementProbe::new([
                    "CREATE EXTENSION IF NOT EXISTS btree_gist",
                    "CREATE TABLE test_exclusion (id INT, t TEXT, ts TSTZRANGE, \
                     EXCLUDE USING gist ((CASE WHEN t = 'A' THEN true END) WITH =, ts WITH &&))",
                ]),
            );

        registry
            .register(EXTENSIONS, "Extension Support", ExtensionAvailableProbe::new("pg_trgm"))
            .register(EXTENSIONS, "Foreign Data Wrappers", ExtensionAvailableProbe::new("postgres_fdw"));

        registry
            .register(
                SECURITY,
                "Role Management",
                StatementProbe::new(["DROP ROLE IF EXISTS test_role", "CREATE ROLE test_role", "DROP ROLE test_role"]),
            )
            .register(
                SECURITY,
                "GRANT/REVOKE Privileges",
                StagedProbe::new([
                    "GRANT SELECT ON test_primitive TO PUBLIC",
                    "REVOKE SELECT ON test_primitive FROM PUBLIC",
                ]),
            )
            .register(
                SECURITY,
                "Row-Level Security",
                StatementProbe::single("ALTER TABLE test_primitive ENABLE ROW LEVEL SECURITY"),
            );

        registry
            .register(REPLICATION, "Streaming Replication", StreamingReplicationProbe)
            .register(REPLICATION, "Logical Replication", PublicationProbe);

        registry
            .register(
                TRANSACTION_FEATURES,
                "ACID Compliance",
                StatementProbe::single("BEGIN; INSERT INTO test_primitive VALUES (1, 'test'); ROLLBACK"),
            )
            .register(
                TRANSACTION_FEATURES,
                "Isolation Levels",
                StatementProbe::single(
                    "BEGIN; SET TRANSACTION ISOLATION LEVEL SERIALIZABLE; \
                     SET TRANSACTION ISOLATION LEVEL READ COMMITTED; ROLLBACK",
                ),
            )
            .register(
                TRANSACTION_FEATURES,
                "Nested Transactions",
                StatementProbe::single("BEGIN; SAVEPOINT sp; RELEASE SAVEPOINT sp; COMMIT"),
            )
            .register(
                TRANSACTION_FEATURES,
                "Row-Level Locking",
                StatementProbe::single("SELECT * FROM test_primitive FOR UPDATE"),
            );

        registry
            .register(
                MISCELLANEOUS,
                "pg_stat_statements",
                StatementProbe::new([
                    "CREATE EXTENSION IF NOT EXISTS pg_stat_statements",
                    "SELECT count(*) FROM pg_stat_statements",
                ]),
            )
            .register(
                MISCELLANEOUS,
                "pg_walinspect",
                StatementProbe::single("CREATE EXTENSION IF NOT EXISTS pg_walinspect"),
            )
            .register(MISCELLANEOUS, "External Programming Language", UnaccentProbe);

        registry
    }
}

impl std::fmt::Debug for ProbeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<_> = self.probes.keys().collect();
        keys.sort();
        f.debug_struct("ProbeRegistry").field("probes", &keys).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSession;
    use crate::probe::{evaluate, ProbeContext};
    use crate::session::SessionError;
    use pci_core::{Classification, FeatureCatalog};

    #[test]
    fn standard_registry_covers_standard_catalog() {
        let catalog = FeatureCatalog::standard();
        let registry = ProbeRegistry::standard();

        for (category, sub_feature) in catalog.probe_keys() {
            assert!(
                registry.contains(category, sub_feature),
                "no probe for {} / {}",
                category,
                sub_feature
            );
        }
        assert_eq!(registry.len(), catalog.probe_count());
    }

    #[test]
    fn register_replaces() {
        let mut registry = ProbeRegistry::new();
        registry.register("x", "y", StatementProbe::single("SELECT 1"));
        registry.register("x", "y", StatementProbe::single("SELECT 2"));
        assert_eq!(registry.len(), 1);
        assert!(registry.get("x", "z").is_none());
    }

    #[tokio::test]
    async fn sql_function_without_plpgsql_is_partial() {
        let registry = ProbeRegistry::standard();
        let probe = registry.get(categories::PROCEDURAL_FEATURES, "Functions").unwrap();
        let session = MockSession::new().fail_on(
            "LANGUAGE plpgsql",
            SessionError::FeatureNotSupported("language plpgsql is not supported".into()),
        );

        let outcome = evaluate(probe, &ProbeContext::new(&session, "pci_test")).await.unwrap();
        assert_eq!(outcome.classification, Classification::Partial);
    }

    #[tokio::test]
    async fn nested_transaction_probe_commits() {
        let registry = ProbeRegistry::standard();
        let probe = registry.get(categories::TRANSACTION_FEATURES, "Nested Transactions").unwrap();
        let session = MockSession::new();

        evaluate(probe, &ProbeContext::new(&session, "pci_test")).await.unwrap();
        assert!(session.saw("COMMIT").await);
    }
}
