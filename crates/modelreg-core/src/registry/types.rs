//! Catalog data types.

use crate::config::RegistryConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lifecycle status of a registered model.
///
/// The set is open: any string that is not one of the known values is kept
/// verbatim in [`ModelStatus::Custom`] and written back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ModelStatus {
    #[default]
    Registered,
    Staging,
    Production,
    Archived,
    Failed,
    Custom(String),
}

impl ModelStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ModelStatus::Registered => "registered",
            ModelStatus::Staging => "staging",
            ModelStatus::Production => "production",
            ModelStatus::Archived => "archived",
            ModelStatus::Failed => "failed",
            ModelStatus::Custom(s) => s,
        }
    }

    /// Parse a status string. Never fails; unknown values become `Custom`.
    pub fn parse(s: &str) -> Self {
        match s {
            "registered" => ModelStatus::Registered,
            "staging" => ModelStatus::Staging,
            "production" => ModelStatus::Production,
            "archived" => ModelStatus::Archived,
            "failed" => ModelStatus::Failed,
            other => ModelStatus::Custom(other.to_string()),
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, ModelStatus::Production)
    }
}

impl From<String> for ModelStatus {
    fn from(s: String) -> Self {
        match ModelStatus::parse(&s) {
            ModelStatus::Custom(_) => ModelStatus::Custom(s),
            known => known,
        }
    }
}

impl From<&str> for ModelStatus {
    fn from(s: &str) -> Self {
        ModelStatus::parse(s)
    }
}

impl From<ModelStatus> for String {
    fn from(status: ModelStatus) -> Self {
        match status {
            ModelStatus::Custom(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for ModelStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One registered model artifact.
///
/// Only `status` changes after registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRecord {
    pub id: String,
    pub path: String,
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    /// ISO-8601 timestamp taken at registration.
    pub created_at: String,
    #[serde(default)]
    pub status: ModelStatus,
}

impl ModelRecord {
    /// Numeric part of a `model_<n>` id.
    pub fn sequence(&self) -> Option<u64> {
        parse_sequence(&self.id)
    }
}

/// The whole persisted state: models in insertion order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub models: Vec<ModelRecord>,
}

impl Catalog {
    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn find(&self, id: &str) -> Option<&ModelRecord> {
        self.models.iter().find(|m| m.id == id)
    }

    pub(crate) fn find_mut(&mut self, id: &str) -> Option<&mut ModelRecord> {
        self.models.iter_mut().find(|m| m.id == id)
    }

    /// Next free id sequence number.
    ///
    /// One past the highest `model_<n>` already present, so ids stay unique
    /// even in a catalog whose length no longer matches its highest id.
    pub fn next_sequence(&self) -> u64 {
        let highest = self
            .models
            .iter()
            .filter_map(ModelRecord::sequence)
            .max()
            .unwrap_or(0);
        highest.max(self.models.len() as u64) + 1
    }
}

/// Format an id from its sequence number.
pub fn model_id(sequence: u64) -> String {
    format!("{}{}", RegistryConfig::ID_PREFIX, sequence)
}

fn parse_sequence(id: &str) -> Option<u64> {
    id.strip_prefix(RegistryConfig::ID_PREFIX)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, status: ModelStatus) -> ModelRecord {
        ModelRecord {
            id: id.to_string(),
            path: format!("/models/{id}.joblib"),
            metrics: BTreeMap::new(),
            version: "1.0.0".to_string(),
            tags: BTreeMap::new(),
            created_at: "2024-01-01T00:00:00+00:00".to_string(),
            status,
        }
    }

    #[test]
    fn test_status_known_and_custom() {
        assert_eq!(ModelStatus::parse("production"), ModelStatus::Production);
        assert_eq!(ModelStatus::parse("staging"), ModelStatus::Staging);
        assert_eq!(
            ModelStatus::parse("shadow"),
            ModelStatus::Custom("shadow".to_string())
        );
        // Case is preserved, not normalized.
        assert_eq!(
            ModelStatus::parse("Production"),
            ModelStatus::Custom("Production".to_string())
        );
        assert_eq!(ModelStatus::Custom("canary".into()).to_string(), "canary");
    }

    #[test]
    fn test_status_serializes_as_plain_string() {
        let json = serde_json::to_string(&ModelStatus::Archived).unwrap();
        assert_eq!(json, "\"archived\"");

        let custom: ModelStatus = serde_json::from_str("\"canary\"").unwrap();
        assert_eq!(custom, ModelStatus::Custom("canary".to_string()));
        assert_eq!(serde_json::to_string(&custom).unwrap(), "\"canary\"");
    }

    #[test]
    fn test_record_uses_snake_case_fields() {
        let value = serde_json::to_value(record("model_1", ModelStatus::Registered)).unwrap();
        assert!(value.get("created_at").is_some());
        assert_eq!(value["status"], "registered");
    }

    #[test]
    fn test_record_defaults_for_sparse_entries() {
        let json = r#"{"id":"model_1","path":"/m.joblib","created_at":"2024-01-01T10:00:00"}"#;
        let parsed: ModelRecord = serde_json::from_str(json).unwrap();
        assert!(parsed.metrics.is_empty());
        assert!(parsed.tags.is_empty());
        assert_eq!(parsed.status, ModelStatus::Registered);
    }

    #[test]
    fn test_next_sequence() {
        let mut catalog = Catalog::default();
        assert_eq!(catalog.next_sequence(), 1);

        catalog.models.push(record("model_1", ModelStatus::Registered));
        catalog.models.push(record("model_2", ModelStatus::Registered));
        assert_eq!(catalog.next_sequence(), 3);

        // A gap left by a hand-edited file must not cause reuse.
        catalog.models.remove(0);
        assert_eq!(catalog.next_sequence(), 3);

        catalog.models.push(record("imported", ModelStatus::Registered));
        assert_eq!(catalog.next_sequence(), 3);
    }

    #[test]
    fn test_model_id_format() {
        assert_eq!(model_id(7), "model_7");
        assert_eq!(record("model_42", ModelStatus::Failed).sequence(), Some(42));
        assert_eq!(record("other_1", ModelStatus::Failed).sequence(), None);
    }
}
