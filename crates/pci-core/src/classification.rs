//! Probe classifications and their support scores
//!
//! IMPORTANT: the serialized names (`full`, `partial`, `no`) are the wire
//! format of every persisted report. Never rename them.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Verdict produced by a probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    /// The feature is not supported, or no evidence was found
    No,

    /// A basic form of the feature works, a richer form does not
    Partial,

    /// The feature works as in PostgreSQL
    Full,
}

impl Classification {
    /// All classifications, least permissive first
    pub const ALL: [Classification; 3] = [Self::No, Self::Partial, Self::Full];

    /// Get the classification as its stable string identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::No => "no",
            Self::Partial => "partial",
            Self::Full => "full",
        }
    }

    /// Support score used by the scoring engine
    pub fn support_score(&self) -> f64 {
        match self {
            Self::Full => 1.0,
            Self::Partial => 0.5,
            Self::No => 0.0,
        }
    }

    /// Whether this classification counts as a failed probe
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::No)
    }
}

impl Default for Classification {
    fn default() -> Self {
        Self::No
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when a string is not one of `full`, `partial`, `no`
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid support level '{0}', use 'full', 'partial', or 'no'")]
pub struct InvalidClassification(pub String);

impl FromStr for Classification {
    type Err = InvalidClassification;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(Self::Full),
            "partial" => Ok(Self::Partial),
            "no" => Ok(Self::No),
            other => Err(InvalidClassification(other.to_string())),
        }
    }
}
