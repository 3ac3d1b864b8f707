//! Report schema (stable v1)
//!
//! This schema is STABLE and VERSIONED.
//! Breaking changes require a new version.

use crate::diagnostic::{ProbeDiagnostic, Severity};
use crate::matrix::{FailedProbe, ResultMatrix};
use crate::scoring::{AggregationPolicy, CategoryScore, ScoreCard};
use serde::{Deserialize, Serialize};

/// Report schema version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportVersion {
    /// Major version (breaking changes)
    pub major: u32,

    /// Minor version (backward-compatible additions)
    pub minor: u32,
}

impl ReportVersion {
    /// Current report schema version
    pub const CURRENT: ReportVersion = ReportVersion { major: 1, minor: 0 };
}

impl std::fmt::Display for ReportVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Compatibility report (pci_report.json v1)
///
/// `pci_score` and `details` are the stable core every consumer relies on;
/// `details` mirrors the feature catalogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PciReport {
    /// Schema version
    pub version: ReportVersion,

    /// Timestamp (ISO 8601)
    pub timestamp: String,

    /// Aggregation policy that produced the score
    pub policy: AggregationPolicy,

    pub pci_score: f64,

    /// Result matrix
    pub details: ResultMatrix,

    /// Probes classified `no`
    #[serde(default)]
    pub failed: Vec<FailedProbe>,

    /// Per-category breakdown
    #[serde(default)]
    pub categories: Vec<CategoryScore>,

    /// Why probes ended below `full`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<ProbeDiagnostic>,

    /// Metadata (target database, server version, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl PciReport {
    /// Create a report from a score card and the matrix it was computed from
    pub fn new(card: ScoreCard, details: ResultMatrix) -> Self {
        Self {
            version: ReportVersion::CURRENT,
            timestamp: chrono::Utc::now().to_rfc3339(),
            policy: card.policy,
            pci_score: card.pci_score,
            details,
            failed: card.failed,
            categories: card.categories,
            diagnostics: Vec::new(),
            metadata: None,
        }
    }

    /// Attach probe diagnostics
    pub fn with_diagnostics(mut self, diagnostics: Vec<ProbeDiagnostic>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Attach metadata
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Check if any probe hit a correctness anomaly
    pub fn has_anomalies(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity == Severity::Error)
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Save to file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let json = self.to_json()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, json)
    }
}

/// Render the standalone scorer output: a score line followed by the input document
pub fn render_score_sheet(pci_score: f64, document: &serde_json::Value) -> Result<String, serde_json::Error> {
    let body = serde_json::to_string_pretty(document)?;
    Ok(format!(
        "PostgreSQL Compatibility Index (PCI) Score: {:.2}%\n{}\n",
        pci_score, body
    ))
}
