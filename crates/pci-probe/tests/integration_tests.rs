//! Integration tests for the standard probe set
//!
//! These tests run the full standard registry against scripted sessions
//! (see `fixtures`). Tests that need a live server are marked with
//! `#[ignore]` and can be run with `cargo test -- --ignored`.
//!
//! ## Running Tests
//!
//! ```bash
//! # Run all non-ignored tests (no database required)
//! cargo test -p pci-probe --test integration_tests
//!
//! # Run against a live server
//! PG_HOST=localhost \
//! PG_PORT=5432 \
//! PG_USER=postgres \
//! PG_PASSWORD=password \
//! PG_DBNAME=testdb \
//! PG_SSLMODE=disable \
//! cargo test -p pci-probe --test integration_tests -- --ignored
//! ```

mod fixtures;

use pci_core::{
    AggregationPolicy, Classification, FailedProbe, FailureKind, FeatureCatalog, PciReport, ScoringEngine,
};
use pci_probe::{MockSession, ProbeRegistry, ProbeRunner, RunError, RunResults, SessionError};
use pretty_assertions::assert_eq;

// =============================================================================
// Helper Functions
// =============================================================================

/// Check if live database settings are available
fn has_postgres_credentials() -> bool {
    std::env::var("PG_HOST").is_ok()
}

async fn run_standard(session: &MockSession) -> Result<RunResults, RunError> {
    let catalog = FeatureCatalog::standard();
    let registry = ProbeRegistry::standard();
    let runner = ProbeRunner::new(&catalog, &registry, "pci_test")?;
    runner.run_all(session).await
}

// =============================================================================
// Standard Run Tests (No database required)
// =============================================================================

#[tokio::test]
async fn test_vanilla_postgres_scores_100() {
    let session = fixtures::vanilla_postgres();
    let results = run_standard(&session).await.unwrap();

    assert!(results.diagnostics.is_empty(), "{:?}", results.diagnostics);

    let catalog = FeatureCatalog::standard();
    let card = ScoringEngine::new(&catalog, AggregationPolicy::Penalty)
        .score(&results.matrix)
        .unwrap();

    assert_eq!(card.pci_score, 100.0);
    assert!(card.failed.is_empty());
}

#[tokio::test]
async fn test_run_starts_with_scratch_schema_reset() {
    let session = fixtures::vanilla_postgres();
    run_standard(&session).await.unwrap();

    let statements = session.statements().await;
    assert_eq!(
        statements[0],
        "DROP SCHEMA IF EXISTS pci_test CASCADE; CREATE SCHEMA pci_test; SET search_path TO pci_test"
    );
    assert_eq!(statements[1], "CREATE TABLE test_primitive (id INT, name TEXT)");
    // No probe failed, so the runner never had to roll back
    assert!(!statements.iter().any(|s| s == "ROLLBACK"));
}

#[tokio::test]
async fn test_extension_types_qualified_with_installed_schema() {
    let session = fixtures::vanilla_postgres();
    run_standard(&session).await.unwrap();

    assert!(session.saw("CREATE TABLE test_geo (geom \"public\".geometry)").await);
    assert!(session.saw("CREATE TABLE test_vector (embedding \"public\".vector(3))").await);
}

#[tokio::test]
async fn test_restricted_service_classification() {
    let session = fixtures::restricted_service();
    let results = run_standard(&session).await.unwrap();
    let matrix = &results.matrix;

    assert_eq!(matrix.get("procedural_features", "Functions"), Some(Classification::Partial));
    assert_eq!(matrix.get("procedural_features", "Stored Procedures"), Some(Classification::Full));
    assert_eq!(matrix.get("procedural_features", "Triggers"), Some(Classification::No));
    assert_eq!(matrix.get("data_types", "Vector"), Some(Classification::No));
    assert_eq!(matrix.get("extensions", "Extension Support"), Some(Classification::No));
    assert_eq!(matrix.get("replication", "Streaming Replication"), Some(Classification::No));
    assert_eq!(matrix.get("replication", "Logical Replication"), Some(Classification::No));
    assert_eq!(matrix.get("miscellaneous", "pg_walinspect"), Some(Classification::Full));
    assert_eq!(
        matrix.get("miscellaneous", "External Programming Language"),
        Some(Classification::No)
    );

    // Rejected statements are contained: nothing here is a correctness anomaly
    assert_eq!(results.anomaly_count(), 0);
}

#[tokio::test]
async fn test_restricted_service_score() {
    let session = fixtures::restricted_service();
    let results = run_standard(&session).await.unwrap();
    let catalog = FeatureCatalog::standard();

    let card = ScoringEngine::new(&catalog, AggregationPolicy::Penalty)
        .score(&results.matrix)
        .unwrap();

    assert_eq!(card.failed.len(), 9);
    assert_eq!(card.failed[0], FailedProbe::new("data_types", "Geospatial Types"));
    assert_eq!(
        card.failed.last(),
        Some(&FailedProbe::new("miscellaneous", "External Programming Language"))
    );
    assert_eq!(card.pci_score, 50.67);

    let normalized = ScoringEngine::new(&catalog, AggregationPolicy::Normalized)
        .score(&results.matrix)
        .unwrap();
    assert_eq!(normalized.pci_score, 64.17);
}

#[tokio::test]
async fn test_restricted_service_diagnostics() {
    let session = fixtures::restricted_service();
    let results = run_standard(&session).await.unwrap();

    let functions = results
        .diagnostics
        .iter()
        .find(|d| d.sub_feature == "Functions")
        .unwrap();
    assert_eq!(functions.classification, Classification::Partial);
    assert_eq!(functions.kind, FailureKind::FeatureNotSupported);

    let publication = results
        .diagnostics
        .iter()
        .find(|d| d.sub_feature == "Logical Replication")
        .unwrap();
    assert_eq!(publication.kind, FailureKind::SyntaxError);

    // Structural probes that find nothing are plain `no`, not failures
    assert!(!results.diagnostics.iter().any(|d| d.sub_feature == "Extension Support"));
}

#[tokio::test]
async fn test_missing_partition_pruning_is_an_anomaly() {
    let session = fixtures::without_partition_pruning();
    let results = run_standard(&session).await.unwrap();

    assert_eq!(results.matrix.get("performance", "Partitioning"), Some(Classification::No));
    assert_eq!(results.anomaly_count(), 1);

    // Later probes still run
    assert_eq!(results.matrix.get("performance", "Unlogged Table"), Some(Classification::Full));

    let catalog = FeatureCatalog::standard();
    let card = ScoringEngine::new(&catalog, AggregationPolicy::default())
        .score(&results.matrix)
        .unwrap();
    let report = PciReport::new(card, results.matrix).with_diagnostics(results.diagnostics);

    assert!(report.has_anomalies());
    // 100 - 10/4 - 1.5
    assert_eq!(report.pci_score, 96.0);
}

#[tokio::test]
async fn test_lost_connection_aborts_run() {
    let session = fixtures::vanilla_postgres()
        .fail_on("test_matview", SessionError::ConnectionLost("server closed the connection unexpectedly".into()));

    let err = run_standard(&session).await.unwrap_err();
    assert!(matches!(err, RunError::Session(SessionError::ConnectionLost(_))));
    assert!(!session.saw("WITH cte").await);
}

// =============================================================================
// PostgreSQL Integration Tests (require a server)
// =============================================================================

#[tokio::test]
#[ignore]
async fn test_postgres_standard_run() {
    if !has_postgres_credentials() {
        eprintln!("Skipping PostgreSQL test: no server configured");
        eprintln!("Set PG_HOST, PG_PORT, PG_USER, PG_PASSWORD and PG_DBNAME");
        return;
    }

    #[cfg(feature = "postgres")]
    {
        use pci_core::ConnectionConfig;
        use pci_probe::PostgresSession;

        let mut config = ConnectionConfig::default();
        config
            .apply_env(|key| std::env::var(key).ok())
            .expect("Invalid PG_* settings");

        let session = PostgresSession::connect(&config)
            .await
            .expect("Failed to connect");

        let version = session.server_version().await.expect("SHOW server_version failed");
        println!("Connected to {} (server {:?})", session.target(), version);

        let catalog = FeatureCatalog::standard();
        let registry = ProbeRegistry::standard();
        let runner = ProbeRunner::new(&catalog, &registry, "pci_test").unwrap();
        let results = runner.run_all(&session).await.expect("Probe run failed");

        results.matrix.validate(&catalog).expect("Incomplete result matrix");

        let card = ScoringEngine::new(&catalog, AggregationPolicy::Penalty)
            .score(&results.matrix)
            .unwrap();
        assert!((0.0..=100.0).contains(&card.pci_score));
        println!("PCI score: {:.2}%", card.pci_score);
        for diagnostic in &results.diagnostics {
            println!("  {} / {}: {}", diagnostic.category, diagnostic.sub_feature, diagnostic.message);
        }
    }

    #[cfg(not(feature = "postgres"))]
    {
        eprintln!("PostgreSQL feature not enabled. Rebuild with --features postgres");
    }
}
