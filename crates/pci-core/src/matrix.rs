//! Result matrix: category → sub-feature → classification

use crate::catalog::FeatureCatalog;
use crate::classification::Classification;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use indexmap::IndexMap;

/// Errors raised when a result matrix does not match the catalogue
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Missing category: {0}")]
    MissingCategory(String),

    #[error("Missing sub-feature: {sub_feature} in category: {category}")]
    MissingSubFeature { category: String, sub_feature: String },

    #[error("Invalid support level '{value}' for {sub_feature} in category: {category}. Use 'full', 'partial', or 'no'.")]
    InvalidSupportLevel {
        category: String,
        sub_feature: String,
        value: String,
    },

    #[error("Expected a JSON object for {0}")]
    NotAnObject(String),
}

/// A (category, sub-feature) pair classified `no`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FailedProbe {
    pub category: String,
    pub sub_feature: String,
}

impl FailedProbe {
    pub fn new(category: impl Into<String>, sub_feature: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            sub_feature: sub_feature.into(),
        }
    }
}

impl std::fmt::Display for FailedProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} / {}", self.category, self.sub_feature)
    }
}

/// Classifications of every probed sub-feature, grouped by category
///
/// Entries keep insertion order, which is catalogue order for matrices built
/// by the runner and document order for matrices read from JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultMatrix {
    entries: IndexMap<String, IndexMap<String, Classification>>,
}

impl ResultMatrix {
    /// Create an empty matrix
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a matrix with every catalogue entry set to one classification
    pub fn uniform(catalog: &FeatureCatalog, classification: Classification) -> Self {
        let mut matrix = Self::new();
        for (category, sub_feature) in catalog.probe_keys() {
            matrix.insert(category, sub_feature, classification);
        }
        matrix
    }

    /// Record a classification, replacing any previous one
    pub fn insert(
        &mut self,
        category: impl Into<String>,
        sub_feature: impl Into<String>,
        classification: Classification,
    ) {
        self.entries
            .entry(category.into())
            .or_default()
            .insert(sub_feature.into(), classification);
    }

    /// Remove an entry, returning its classification
    pub fn remove(&mut self, category: &str, sub_feature: &str) -> Option<Classification> {
        self.entries.get_mut(category)?.shift_remove(sub_feature)
    }

    pub fn get(&self, category: &str, sub_feature: &str) -> Option<Classification> {
        self.entries.get(category)?.get(sub_feature).copied()
    }

    /// Entries of one category
    pub fn category(&self, category: &str) -> Option<&IndexMap<String, Classification>> {
        self.entries.get(category)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.values().all(|subs| subs.is_empty())
    }

    /// Number of recorded classifications
    pub fn len(&self) -> usize {
        self.entries.values().map(|subs| subs.len()).sum()
    }

    /// Check that every catalogue entry is present
    pub fn validate(&self, catalog: &FeatureCatalog) -> Result<(), ValidationError> {
        for category in catalog.entries() {
            let subs = self
                .entries
                .get(&category.name)
                .ok_or_else(|| ValidationError::MissingCategory(category.name.clone()))?;

            for sub_feature in &category.sub_features {
                if !subs.contains_key(sub_feature) {
                    return Err(ValidationError::MissingSubFeature {
                        category: category.name.clone(),
                        sub_feature: sub_feature.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Read a matrix from a JSON document, validating it against the catalogue
    ///
    /// Categories and sub-features that are not in the catalogue are ignored.
    pub fn from_document(document: &Value, catalog: &FeatureCatalog) -> Result<Self, ValidationError> {
        let root = document
            .as_object()
            .ok_or_else(|| ValidationError::NotAnObject("result matrix".to_string()))?;

        let mut matrix = Self::new();

        for category in catalog.entries() {
            let subs = root
                .get(&category.name)
                .ok_or_else(|| ValidationError::MissingCategory(category.name.clone()))?
                .as_object()
                .ok_or_else(|| ValidationError::NotAnObject(format!("category {}", category.name)))?;

            for sub_feature in &category.sub_features {
                let value = subs.get(sub_feature).ok_or_else(|| ValidationError::MissingSubFeature {
                    category: category.name.clone(),
                    sub_feature: sub_feature.clone(),
                })?;

                let classification = value
                    .as_str()
                    .and_then(|s| s.parse::<Classification>().ok())
                    .ok_or_else(|| ValidationError::InvalidSupportLevel {
                        category: category.name.clone(),
                        sub_feature: sub_feature.clone(),
                        value: match value {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        },
                    })?;

                matrix.insert(category.name.clone(), sub_feature.clone(), classification);
            }
        }

        Ok(matrix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn small_catalog() -> FeatureCatalog {
        FeatureCatalog::builder()
            .category("ddl", ["Views"], 5.0)
            .category("security", ["Role Management"], 5.0)
            .penalty_per_failure(1.5)
            .build()
            .unwrap()
    }

    #[test]
    fn uniform_matrix_is_complete() {
        let catalog = FeatureCatalog::standard();
        let matrix = ResultMatrix::uniform(&catalog, Classification::Partial);
        assert_eq!(matrix.len(), catalog.probe_count());
        assert!(matrix.validate(&catalog).is_ok());
    }

    #[test]
    fn validate_reports_missing_entries() {
        let catalog = small_catalog();
        let mut matrix = ResultMatrix::new();
        matrix.insert("ddl", "Views", Classification::Full);
        assert_eq!(
            matrix.validate(&catalog),
            Err(ValidationError::MissingCategory("security".to_string()))
        );

        matrix.insert("security", "Row-Level Security", Classification::Full);
        assert_eq!(
            matrix.validate(&catalog),
            Err(ValidationError::MissingSubFeature {
                category: "security".to_string(),
                sub_feature: "Role Management".to_string(),
            })
        );
    }

    #[test]
    fn from_document_accepts_valid_matrix() {
        let catalog = small_catalog();
        let doc = json!({
            "ddl": {"Views": "full"},
            "security": {"Role Management": "no"},
            "notifications": {"LISTEN/NOTIFY": "maybe"}
        });
        let matrix = ResultMatrix::from_document(&doc, &catalog).unwrap();
        assert_eq!(matrix.get("ddl", "Views"), Some(Classification::Full));
        assert_eq!(matrix.get("security", "Role Management"), Some(Classification::No));
        assert_eq!(matrix.get("notifications", "LISTEN/NOTIFY"), None);
    }

    #[test]
    fn from_document_rejects_invalid_values() {
        let catalog = small_catalog();
        let doc = json!({
            "ddl": {"Views": "yes"},
            "security": {"Role Management": "no"}
        });
        let err = ResultMatrix::from_document(&doc, &catalog).unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidSupportLevel {
                category: "ddl".to_string(),
                sub_feature: "Views".to_string(),
                value: "yes".to_string(),
            }
        );

        let numeric = json!({
            "ddl": {"Views": 1},
            "security": {"Role Management": "no"}
        });
        assert!(matches!(
            ResultMatrix::from_document(&numeric, &catalog),
            Err(ValidationError::InvalidSupportLevel { value, .. }) if value == "1"
        ));
    }

    #[test]
    fn from_document_rejects_wrong_shapes() {
        let catalog = small_catalog();
        assert!(matches!(
            ResultMatrix::from_document(&json!([1, 2]), &catalog),
            Err(ValidationError::NotAnObject(_))
        ));
        assert!(matches!(
            ResultMatrix::from_document(&json!({"ddl": "full", "security": {}}), &catalog),
            Err(ValidationError::NotAnObject(_))
        ));
        assert_eq!(
            ResultMatrix::from_document(&json!({"ddl": {"Views": "full"}}), &catalog),
            Err(ValidationError::MissingCategory("security".to_string()))
        );
    }

    #[test]
    fn serializes_as_nested_object() {
        let mut matrix = ResultMatrix::new();
        matrix.insert("ddl", "Views", Classification::Partial);
        let value = serde_json::to_value(&matrix).unwrap();
        assert_eq!(value, json!({"ddl": {"Views": "partial"}}));
    }
}
