//! PCI Core
//!
//! Feature catalogue, classifications, result matrices and the
//! Compatibility Index scoring engine. No I/O besides report and config files.
//! Never rename catalogue keys or classification names - they are the report format.

pub mod catalog;
pub mod classification;
pub mod config;
pub mod diagnostic;
pub mod matrix;
pub mod report;
pub mod scoring;

pub use catalog::{CatalogError, Category, FeatureCatalog};
pub use classification::Classification;
pub use config::{Config, ConfigError, ConnectionConfig, RunConfig, ScoringConfig, SslMode};
pub use diagnostic::{FailureKind, ProbeDiagnostic, Severity};
pub use matrix::{FailedProbe, ResultMatrix, ValidationError};
pub use report::{render_score_sheet, PciReport, ReportVersion};
pub use scoring::{AggregationPolicy, CategoryScore, InvalidPolicy, ScoreCard, ScoringEngine};
