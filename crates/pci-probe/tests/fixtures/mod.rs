//! Scripted database profiles for probe integration tests
//!
//! Each profile is a [`MockSession`] that answers the standard probe set the
//! way a particular kind of server would.

use pci_probe::{MockSession, Row, SessionError};
use serde_json::json;

/// `EXPLAIN (FORMAT JSON)` output scanning the given partitions
pub fn explain_plan(partitions: &[&str]) -> Row {
    let scans: Vec<_> = partitions
        .iter()
        .map(|p| json!({"Node Type": "Seq Scan", "Parent Relationship": "Member", "Relation Name": p, "Alias": p}))
        .collect();

    let plan = json!([{
        "Plan": {
            "Node Type": "Append",
            "Parallel Aware": false,
            "Plans": scans
        }
    }]);

    Row::from_texts([plan.to_string()])
}

/// Answers every catalogue query the structural and assertion probes issue,
/// with the given plan for the partitioning probe
fn with_catalog_answers(session: MockSession, plan: Row, extensions_available: bool, wal_level: &str) -> MockSession {
    let available = if extensions_available { "1" } else { "0" };
    let senders = if wal_level == "minimal" { "0" } else { "10" };

    session
        .respond_with("pg_wal_lsn_diff", Row::from_texts(["2048"]))
        .respond_with("pg_current_wal_lsn()", Row::from_texts(["0/3000148"]))
        .respond_with("pg_available_extensions", Row::from_texts([available]))
        .respond_with("FROM pg_settings", Row::from_texts([wal_level, senders]))
        .respond_with(
            "FROM pg_publication",
            Row::from_texts(["test_pub", "f", "t", "t", "t"]),
        )
        .respond_with("EXPLAIN", plan)
        .respond_with("ON n.oid = e.extnamespace", Row::from_texts(["public"]))
        .respond_empty("FROM pg_extension")
        .respond_with("FROM pg_ts_dict", Row::from_texts(["public"]))
        .respond_with("f_unaccent('Crème Brûlée')", Row::from_texts(["Creme Brulee"]))
}

/// A stock PostgreSQL server with every probed extension installed
pub fn vanilla_postgres() -> MockSession {
    with_catalog_answers(MockSession::new(), explain_plan(&["test_part2"]), true, "replica")
}

/// A managed service with a reduced language and extension set
///
/// Rejects PL/pgSQL, C functions, PostGIS, pgvector, row-filtered
/// publications and pg_stat_statements, and ships no optional extensions.
pub fn restricted_service() -> MockSession {
    let session = MockSession::new()
        .fail_on(
            "LANGUAGE plpgsql",
            SessionError::FeatureNotSupported("language \"plpgsql\" is not supported".into()),
        )
        .fail_on(
            "LANGUAGE c",
            SessionError::Other {
                code: Some("42501".into()),
                message: "permission denied for language c".into(),
            },
        )
        .fail_on(
            "EXISTS postgis",
            SessionError::FeatureNotSupported("extension \"postgis\" is not available".into()),
        )
        .fail_on(
            "EXISTS vector",
            SessionError::FeatureNotSupported("extension \"vector\" is not available".into()),
        )
        .fail_on(
            "CREATE PUBLICATION",
            SessionError::Syntax("syntax error at or near \"WHERE\"".into()),
        )
        .fail_on(
            "pg_stat_statements",
            SessionError::Other {
                code: Some("55000".into()),
                message: "pg_stat_statements must be loaded via shared_preload_libraries".into(),
            },
        );

    with_catalog_answers(session, explain_plan(&["test_part2"]), false, "minimal")
}

/// A server that accepts partitioned tables but never prunes partitions
pub fn without_partition_pruning() -> MockSession {
    with_catalog_answers(
        MockSession::new(),
        explain_plan(&["test_part1", "test_part2"]),
        true,
        "replica",
    )
}
