use assert_cmd::Command;
use pci_core::{Classification, FeatureCatalog, ResultMatrix};
use predicates::str::contains;
use std::path::Path;
use tempfile::TempDir;

/// `pci` running in an empty directory with no PG_* settings
fn cmd(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("pci").unwrap();
    cmd.current_dir(dir);
    for key in ["PG_HOST", "PG_PORT", "PG_USER", "PG_PASSWORD", "PG_DBNAME", "PG_SSLMODE", "RUST_LOG"] {
        cmd.env_remove(key);
    }
    cmd
}

fn write_matrix(dir: &Path, name: &str, classification: Classification) -> std::path::PathBuf {
    let matrix = ResultMatrix::uniform(&FeatureCatalog::standard(), classification);
    let path = dir.join(name);
    std::fs::write(&path, serde_json::to_string_pretty(&matrix).unwrap()).unwrap();
    path
}

#[test]
fn catalog_lists_categories() {
    let dir = TempDir::new().unwrap();
    cmd(dir.path())
        .arg("catalog")
        .assert()
        .success()
        .stdout(contains("procedural_features"))
        .stdout(contains("Probes: 41"))
        .stdout(contains("Penalty per failure: 1.5"));
}

#[test]
fn score_full_matrix() {
    let dir = TempDir::new().unwrap();
    let input = write_matrix(dir.path(), "features.json", Classification::Full);
    let output = dir.path().join("pci.txt");

    cmd(dir.path())
        .arg("score")
        .arg(&input)
        .arg(&output)
        .assert()
        .success()
        .stdout(contains("PCI Score: 100.00%"));

    let sheet = std::fs::read_to_string(&output).unwrap();
    assert!(sheet.starts_with("PostgreSQL Compatibility Index (PCI) Score: 100.00%\n{"));
    assert!(sheet.contains("\"Primitive Types\": \"full\""));
}

#[test]
fn score_all_no_is_zero() {
    let dir = TempDir::new().unwrap();
    let input = write_matrix(dir.path(), "features.json", Classification::No);

    cmd(dir.path())
        .args(["score", "--policy", "normalized"])
        .arg(&input)
        .arg(dir.path().join("out.txt"))
        .assert()
        .success()
        .stdout(contains("PCI Score: 0.00%"));
}

#[test]
fn score_accepts_saved_report() {
    let dir = TempDir::new().unwrap();
    let details = ResultMatrix::uniform(&FeatureCatalog::standard(), Classification::Partial);
    let report = serde_json::json!({
        "version": {"major": 1, "minor": 0},
        "pci_score": 0.0,
        "details": details,
    });
    let input = dir.path().join("pci_report.json");
    std::fs::write(&input, report.to_string()).unwrap();

    // Every entry partial: 50 points under the default penalty policy
    cmd(dir.path())
        .arg("score")
        .arg(&input)
        .arg(dir.path().join("out.txt"))
        .assert()
        .success()
        .stdout(contains("PCI Score: 50.00%"));
}

#[test]
fn score_rejects_incomplete_matrix() {
    let dir = TempDir::new().unwrap();
    let mut matrix = ResultMatrix::uniform(&FeatureCatalog::standard(), Classification::Full);
    matrix.remove("security", "Row-Level Security");
    let input = dir.path().join("features.json");
    std::fs::write(&input, serde_json::to_string(&matrix).unwrap()).unwrap();
    let output = dir.path().join("out.txt");

    cmd(dir.path())
        .arg("score")
        .arg(&input)
        .arg(&output)
        .assert()
        .failure()
        .stderr(contains("Missing sub-feature: Row-Level Security in category: security"));

    assert!(!output.exists());
}

#[test]
fn score_rejects_unknown_support_level() {
    let dir = TempDir::new().unwrap();
    let input = write_matrix(dir.path(), "features.json", Classification::Full);
    let text = std::fs::read_to_string(&input)
        .unwrap()
        .replacen("\"full\"", "\"maybe\"", 1);
    std::fs::write(&input, text).unwrap();

    cmd(dir.path())
        .arg("score")
        .arg(&input)
        .arg(dir.path().join("out.txt"))
        .assert()
        .failure()
        .stderr(contains("Invalid support level 'maybe'"));
}

#[test]
fn invalid_config_is_reported() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("pci.toml"), "[run]\nscratch_schema = \"Robert'); DROP\"\n").unwrap();

    cmd(dir.path())
        .arg("catalog")
        .assert()
        .failure()
        .stderr(contains("pci.toml"));
}

#[test]
fn negative_penalty_is_rejected() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("pci.toml"), "[scoring]\npenalty_per_failure = -5.0\n").unwrap();
    let input = write_matrix(dir.path(), "features.json", Classification::No);
    let output = dir.path().join("out.txt");

    cmd(dir.path())
        .arg("score")
        .arg(&input)
        .arg(&output)
        .assert()
        .failure()
        .stderr(contains("Invalid penalty per failure: -5"));

    assert!(!output.exists());
}

#[test]
fn run_fails_without_server() {
    let dir = TempDir::new().unwrap();

    cmd(dir.path())
        .args(["run", "--output", "report.json"])
        .env("PG_HOST", "127.0.0.1")
        .env("PG_PORT", "1")
        .env("PG_SSLMODE", "disable")
        .assert()
        .failure()
        .stderr(contains("Failed to connect"));

    assert!(!dir.path().join("report.json").exists());
}
