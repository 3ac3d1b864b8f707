//! Probe diagnostics
//!
//! IMPORTANT: failure kinds are versioned and stable.
//! NEVER rename or remove kinds - they are part of the report format.
//! Add new kinds with new names only.

use crate::classification::Classification;
use serde::{Deserialize, Serialize};

/// Why a probe stopped before reaching `full`
///
/// These kinds are STABLE and VERSIONED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    /// The database rejected the statement syntax
    SyntaxError,

    /// A called function does not exist
    UndefinedFunction,

    /// The database reported the feature as not supported
    FeatureNotSupported,

    /// Any other database error
    OtherError,

    /// Statements ran, but the observed behavior contradicts PostgreSQL
    AssertionFailure,

    /// No probe is registered for the catalogue entry
    NoProbe,
}

impl FailureKind {
    /// Get the kind as a stable string identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SyntaxError => "SYNTAX_ERROR",
            Self::UndefinedFunction => "UNDEFINED_FUNCTION",
            Self::FeatureNotSupported => "FEATURE_NOT_SUPPORTED",
            Self::OtherError => "OTHER_ERROR",
            Self::AssertionFailure => "ASSERTION_FAILURE",
            Self::NoProbe => "NO_PROBE",
        }
    }

    /// Expected negative signals are informational; anomalies are errors
    pub fn severity(&self) -> Severity {
        match self {
            Self::SyntaxError | Self::UndefinedFunction | Self::FeatureNotSupported => Severity::Info,
            Self::OtherError | Self::NoProbe => Severity::Warn,
            Self::AssertionFailure => Severity::Error,
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Expected negative signal (unsupported syntax or feature)
    Info,

    /// Unexpected database error
    Warn,

    /// Correctness anomaly
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A probe that ended below `full`, with the reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeDiagnostic {
    pub category: String,

    pub sub_feature: String,

    /// Classification the probe ended with
    pub classification: Classification,

    pub kind: FailureKind,

    pub severity: Severity,

    /// Database or assertion message
    pub message: String,
}

impl ProbeDiagnostic {
    pub fn new(
        category: impl Into<String>,
        sub_feature: impl Into<String>,
        classification: Classification,
        kind: FailureKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category: category.into(),
            sub_feature: sub_feature.into(),
            classification,
            kind,
            severity: kind.severity(),
            message: message.into(),
        }
    }
}
