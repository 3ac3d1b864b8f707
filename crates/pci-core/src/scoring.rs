//! Compatibility Index scoring engine
//!
//! Reduces a complete result matrix to a single score in `[0, 100]`.
//!
//! Two aggregation policies exist and they are not numerically equivalent:
//!
//! - [`AggregationPolicy::Penalty`]: sum of weighted category percentages,
//!   minus a fixed penalty per failed probe, clamped to `[0, 100]`.
//! - [`AggregationPolicy::Normalized`]: sum of weighted category percentages
//!   divided by the total positive weight, as a percentage. No penalty.
//!
//! An engine applies exactly one of them.

use crate::catalog::FeatureCatalog;
use crate::matrix::{FailedProbe, ResultMatrix, ValidationError};
use serde::{Deserialize, Serialize};

/// How category scores are combined into the final score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationPolicy {
    /// Raw weighted total minus `failures × penalty_per_failure`
    Penalty,

    /// Weighted total as a percentage of the total weight
    Normalized,
}

impl Default for AggregationPolicy {
    fn default() -> Self {
        Self::Penalty
    }
}

impl std::fmt::Display for AggregationPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Penalty => write!(f, "penalty"),
            Self::Normalized => write!(f, "normalized"),
        }
    }
}

/// Error returned when a string names no aggregation policy
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid aggregation policy '{0}', use 'penalty' or 'normalized'")]
pub struct InvalidPolicy(pub String);

impl std::str::FromStr for AggregationPolicy {
    type Err = InvalidPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "penalty" => Ok(Self::Penalty),
            "normalized" => Ok(Self::Normalized),
            _ => Err(InvalidPolicy(s.to_string())),
        }
    }
}

/// Per-category breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub category: String,

    /// Sum of support scores
    pub score: f64,

    /// `score / number of sub-features`, in `[0, 1]`
    pub percentage: f64,

    pub weight: f64,

    /// `percentage × weight`
    pub weighted: f64,
}

/// Result of scoring a matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreCard {
    pub policy: AggregationPolicy,

    /// Final score, clamped to `[0, 100]` and rounded to two decimals
    pub pci_score: f64,

    /// Sum of weighted category percentages, before penalty and clamping
    pub raw_total: f64,

    /// Points deducted for failures (always 0 under the normalized policy)
    pub penalty: f64,

    /// Probes classified `no`, in catalogue order
    pub failed: Vec<FailedProbe>,

    pub categories: Vec<CategoryScore>,
}

/// Scores result matrices against one catalogue
#[derive(Debug, Clone, Copy)]
pub struct ScoringEngine<'a> {
    catalog: &'a FeatureCatalog,
    policy: AggregationPolicy,
}

impl<'a> ScoringEngine<'a> {
    pub fn new(catalog: &'a FeatureCatalog, policy: AggregationPolicy) -> Self {
        Self { catalog, policy }
    }

    pub fn policy(&self) -> AggregationPolicy {
        self.policy
    }

    /// Score a result matrix
    ///
    /// Fails without producing a score if any catalogue entry is missing.
    pub fn score(&self, matrix: &ResultMatrix) -> Result<ScoreCard, ValidationError> {
        matrix.validate(self.catalog)?;

        let mut raw_total = 0.0;
        let mut failed = Vec::new();
        let mut categories = Vec::with_capacity(self.catalog.entries().len());

        for category in self.catalog.entries() {
            let mut score = 0.0;
            for sub_feature in &category.sub_features {
                // validate() guarantees presence
                let Some(classification) = matrix.get(&category.name, sub_feature) else {
                    continue;
                };
                score += classification.support_score();
                if classification.is_failure() {
                    failed.push(FailedProbe::new(category.name.clone(), sub_feature.clone()));
                }
            }

            let percentage = score / category.sub_features.len() as f64;
            let weighted = percentage * category.weight;
            raw_total += weighted;

            categories.push(CategoryScore {
                category: category.name.clone(),
                score,
                percentage,
                weight: category.weight,
                weighted,
            });
        }

        let (adjusted, penalty) = match self.policy {
            AggregationPolicy::Penalty => {
                let penalty = failed.len() as f64 * self.catalog.penalty_per_failure();
                (raw_total - penalty, penalty)
            }
            AggregationPolicy::Normalized => {
                let total_weight = self.catalog.total_weight();
                if total_weight > 0.0 {
                    (raw_total / total_weight * 100.0, 0.0)
                } else {
                    (0.0, 0.0)
                }
            }
        };

        Ok(ScoreCard {
            policy: self.policy,
            pci_score: round2(adjusted.clamp(0.0, 100.0)),
            raw_total,
            penalty,
            failed,
            categories,
        })
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
