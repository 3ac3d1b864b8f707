//! Feature catalogue: categories, sub-features, weights and the failure penalty
//!
//! The catalogue is built once at startup and never mutated afterwards. The
//! probe runner and the scoring engine both borrow it read-only.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Stable category keys of the standard catalogue
///
/// These keys are the wire format of the `details` section of a report.
pub mod categories {
    pub const DATA_TYPES: &str = "data_types";
    pub const DDL_FEATURES: &str = "ddl_features";
    pub const SQL_FEATURES: &str = "sql_features";
    pub const PROCEDURAL_FEATURES: &str = "procedural_features";
    pub const PERFORMANCE: &str = "performance";
    pub const CONSTRAINTS: &str = "constraints";
    pub const EXTENSIONS: &str = "extensions";
    pub const SECURITY: &str = "security";
    pub const REPLICATION: &str = "replication";
    pub const TRANSACTION_FEATURES: &str = "transaction_features";
    pub const MISCELLANEOUS: &str = "miscellaneous";
}

/// Points deducted per failed probe in the standard catalogue
pub const STANDARD_PENALTY_PER_FAILURE: f64 = 1.5;

/// A named group of sub-features sharing one weight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    /// Category key (e.g. "data_types")
    pub name: String,

    /// Sub-feature names, in probe order
    pub sub_features: Vec<String>,

    /// Aggregation weight
    pub weight: f64,
}

/// Errors raised when building or querying a catalogue
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CatalogError {
    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("Unknown sub-feature: {sub_feature} in category: {category}")]
    UnknownSubFeature { category: String, sub_feature: String },

    #[error("Duplicate category: {0}")]
    DuplicateCategory(String),

    #[error("Duplicate sub-feature: {sub_feature} in category: {category}")]
    DuplicateSubFeature { category: String, sub_feature: String },

    #[error("Category {0} has no sub-features")]
    EmptyCategory(String),

    #[error("Invalid weight {weight} for category {category}")]
    InvalidWeight { category: String, weight: f64 },

    #[error("Invalid penalty per failure: {0} (must be finite and non-negative)")]
    InvalidPenalty(f64),
}

fn check_penalty(penalty: f64) -> Result<f64, CatalogError> {
    if penalty.is_finite() && penalty >= 0.0 {
        Ok(penalty)
    } else {
        Err(CatalogError::InvalidPenalty(penalty))
    }
}

/// Immutable catalogue of probed features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCatalog {
    categories: Vec<Category>,
    penalty_per_failure: f64,
}

impl FeatureCatalog {
    /// Start building a custom catalogue
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    /// The standard PostgreSQL compatibility catalogue
    pub fn standard() -> Self {
        use categories::*;

        let table: [(&str, &[&str], f64); 11] = [
            (
                DATA_TYPES,
                &[
                    "Primitive Types",
                    "Complex Types",
                    "JSONB",
                    "Geospatial Types",
                    "Custom Types",
                    "Full-Text Search",
                    "Vector",
                ],
                7.0,
            ),
            (DDL_FEATURES, &["Schemas", "Sequences", "Views", "Materialized Views"], 5.0),
            (SQL_FEATURES, &["CTEs", "Upsert", "Window Functions", "Subqueries"], 6.0),
            (PROCEDURAL_FEATURES, &["Stored Procedures", "Functions", "Triggers"], 15.0),
            (
                PERFORMANCE,
                &["Index Types", "Partitioning", "Parallel Query Execution", "Unlogged Table"],
                10.0,
            ),
            (CONSTRAINTS, &["Foreign Key", "Check", "Not Null", "Unique", "Exclusion"], 10.0),
            (EXTENSIONS, &["Extension Support", "Foreign Data Wrappers"], 15.0),
            (
                SECURITY,
                &["Role Management", "GRANT/REVOKE Privileges", "Row-Level Security"],
                5.0,
            ),
            (REPLICATION, &["Streaming Replication", "Logical Replication"], 10.0),
            (
                TRANSACTION_FEATURES,
                &["ACID Compliance", "Isolation Levels", "Nested Transactions", "Row-Level Locking"],
                15.0,
            ),
            (
                MISCELLANEOUS,
                &["pg_stat_statements", "pg_walinspect", "External Programming Language"],
                2.0,
            ),
        ];

        Self {
            categories: table
                .iter()
                .map(|(name, subs, weight)| Category {
                    name: name.to_string(),
                    sub_features: subs.iter().map(|s| s.to_string()).collect(),
                    weight: *weight,
                })
                .collect(),
            penalty_per_failure: STANDARD_PENALTY_PER_FAILURE,
        }
    }

    /// Return a copy with some category weights replaced
    ///
    /// Every key must name an existing category.
    pub fn with_weights(mut self, overrides: &HashMap<String, f64>) -> Result<Self, CatalogError> {
        for (name, weight) in overrides {
            if !weight.is_finite() {
                return Err(CatalogError::InvalidWeight {
                    category: name.clone(),
                    weight: *weight,
                });
            }
            let category = self
                .categories
                .iter_mut()
                .find(|c| &c.name == name)
                .ok_or_else(|| CatalogError::UnknownCategory(name.clone()))?;
            category.weight = *weight;
        }
        Ok(self)
    }

    /// Return a copy with a different penalty per failed probe
    pub fn with_penalty(mut self, penalty_per_failure: f64) -> Result<Self, CatalogError> {
        self.penalty_per_failure = check_penalty(penalty_per_failure)?;
        Ok(self)
    }

    /// Category names in catalogue order
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|c| c.name.as_str())
    }

    /// All categories with their sub-features and weights
    pub fn entries(&self) -> &[Category] {
        &self.categories
    }

    /// Look up a category
    pub fn category(&self, name: &str) -> Result<&Category, CatalogError> {
        self.categories
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| CatalogError::UnknownCategory(name.to_string()))
    }

    /// Sub-feature names of a category, in order
    pub fn subfeatures(&self, category: &str) -> Result<&[String], CatalogError> {
        self.category(category).map(|c| c.sub_features.as_slice())
    }

    /// Weight of a category
    pub fn weight(&self, category: &str) -> Result<f64, CatalogError> {
        self.category(category).map(|c| c.weight)
    }

    /// Sum of all positive category weights
    pub fn total_weight(&self) -> f64 {
        self.categories
            .iter()
            .map(|c| c.weight)
            .filter(|w| *w > 0.0)
            .sum()
    }

    pub fn penalty_per_failure(&self) -> f64 {
        self.penalty_per_failure
    }

    pub fn contains(&self, category: &str, sub_feature: &str) -> bool {
        self.ensure_contains(category, sub_feature).is_ok()
    }

    /// Check that a (category, sub-feature) pair exists
    pub fn ensure_contains(&self, category: &str, sub_feature: &str) -> Result<(), CatalogError> {
        let subs = self.subfeatures(category)?;
        if subs.iter().any(|s| s == sub_feature) {
            Ok(())
        } else {
            Err(CatalogError::UnknownSubFeature {
                category: category.to_string(),
                sub_feature: sub_feature.to_string(),
            })
        }
    }

    /// Every (category, sub-feature) pair in catalogue order
    pub fn probe_keys(&self) -> impl Iterator<Item = (&str, &str)> {
        self.categories.iter().flat_map(|c| {
            c.sub_features
                .iter()
                .map(move |s| (c.name.as_str(), s.as_str()))
        })
    }

    /// Total number of sub-features
    pub fn probe_count(&self) -> usize {
        self.categories.iter().map(|c| c.sub_features.len()).sum()
    }
}

impl Default for FeatureCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

/// Builder for custom catalogues
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    categories: Vec<Category>,
    penalty_per_failure: f64,
}

impl CatalogBuilder {
    /// Append a category
    pub fn category<I, S>(mut self, name: impl Into<String>, sub_features: I, weight: f64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories.push(Category {
            name: name.into(),
            sub_features: sub_features.into_iter().map(Into::into).collect(),
            weight,
        });
        self
    }

    pub fn penalty_per_failure(mut self, penalty: f64) -> Self {
        self.penalty_per_failure = penalty;
        self
    }

    /// Validate uniqueness and build the catalogue
    pub fn build(self) -> Result<FeatureCatalog, CatalogError> {
        check_penalty(self.penalty_per_failure)?;
        let mut seen = HashSet::new();
        for category in &self.categories {
            if !seen.insert(category.name.as_str()) {
                return Err(CatalogError::DuplicateCategory(category.name.clone()));
            }
            if category.sub_features.is_empty() {
                return Err(CatalogError::EmptyCategory(category.name.clone()));
            }
            if !category.weight.is_finite() {
                return Err(CatalogError::InvalidWeight {
                    category: category.name.clone(),
                    weight: category.weight,
                });
            }
            let mut subs = HashSet::new();
            for sub in &category.sub_features {
                if !subs.insert(sub.as_str()) {
                    return Err(CatalogError::DuplicateSubFeature {
                        category: category.name.clone(),
                        sub_feature: sub.clone(),
                    });
                }
            }
        }

        Ok(FeatureCatalog {
            categories: self.categories,
            penalty_per_failure: self.penalty_per_failure,
        })
    }
}
