//! Kubernetes deployment manifests for registered models.
//!
//! Pure data transformation: reads a record's path and version plus
//! caller-supplied resources and emits an `apps/v1` Deployment. Never
//! touches the registry.

use crate::config::DeploymentDefaults;
use crate::registry::ModelRecord;
use crate::{RegistryError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Target environment of a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Some(Environment::Development),
            "staging" => Some(Environment::Staging),
            "production" | "prod" => Some(Environment::Production),
            _ => None,
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Container resources, e.g. `requests -> {cpu: 500m, memory: 512Mi}`.
pub type Resources = BTreeMap<String, BTreeMap<String, String>>;

/// Everything needed to render a deployment for one model version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentConfig {
    pub model_path: String,
    pub version: String,
    pub environment: Environment,
    #[serde(default = "default_replicas")]
    pub replicas: u32,
    #[serde(default)]
    pub resources: Resources,
    /// Recorded in the config for downstream tooling. [`render_deployment`]
    /// does not emit an autoscaler, so this flag has no effect on the manifest.
    #[serde(default)]
    pub autoscaling_enabled: bool,
    /// Recorded in the config only; the rendered manifest is the same either
    /// way.
    #[serde(default = "default_monitoring")]
    pub monitoring_enabled: bool,
}

fn default_replicas() -> u32 {
    DeploymentDefaults::MIN_REPLICAS
}

fn default_monitoring() -> bool {
    true
}

impl DeploymentConfig {
    /// Config for a registered model with one replica and no resources.
    pub fn from_record(record: &ModelRecord, environment: Environment) -> Self {
        Self {
            model_path: record.path.clone(),
            version: record.version.clone(),
            environment,
            replicas: default_replicas(),
            resources: Resources::new(),
            autoscaling_enabled: false,
            monitoring_enabled: default_monitoring(),
        }
    }

    pub fn replicas(mut self, replicas: u32) -> Self {
        self.replicas = replicas;
        self
    }

    /// Set one resource entry, e.g. `("limits", "memory", "1Gi")`.
    pub fn resource(
        mut self,
        section: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.resources
            .entry(section.into())
            .or_default()
            .insert(name.into(), value.into());
        self
    }

    pub fn autoscaling(mut self, enable: bool) -> Self {
        self.autoscaling_enabled = enable;
        self
    }

    pub fn monitoring(mut self, enable: bool) -> Self {
        self.monitoring_enabled = enable;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let range = DeploymentDefaults::MIN_REPLICAS..=DeploymentDefaults::MAX_REPLICAS;
        if !range.contains(&self.replicas) {
            return Err(RegistryError::Validation {
                field: "replicas".to_string(),
                message: format!(
                    "{} is outside {}..={}",
                    self.replicas,
                    DeploymentDefaults::MIN_REPLICAS,
                    DeploymentDefaults::MAX_REPLICAS
                ),
            });
        }
        if self.version.trim().is_empty() {
            return Err(RegistryError::Validation {
                field: "version".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if self.model_path.trim().is_empty() {
            return Err(RegistryError::Validation {
                field: "model_path".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Render the Deployment manifest for `config`.
pub fn render_deployment(config: &DeploymentConfig) -> Result<Value> {
    config.validate()?;

    let labels = json!({
        "app": DeploymentDefaults::APP_LABEL,
        "version": config.version,
    });

    Ok(json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": { "name": format!("model-{}", config.version) },
        "spec": {
            "replicas": config.replicas,
            "selector": { "matchLabels": labels },
            "template": {
                "metadata": { "labels": labels },
                "spec": {
                    "containers": [{
                        "name": DeploymentDefaults::CONTAINER_NAME,
                        "image": format!("{}:{}", DeploymentDefaults::IMAGE_REPOSITORY, config.version),
                        "resources": config.resources,
                        "env": [
                            { "name": "MODEL_PATH", "value": config.model_path },
                            { "name": "ENVIRONMENT", "value": config.environment.as_str() },
                        ],
                    }],
                },
            },
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ModelStatus;

    fn record() -> ModelRecord {
        ModelRecord {
            id: "model_3".to_string(),
            path: "/app/models/grocery_membership_model.joblib".to_string(),
            metrics: BTreeMap::new(),
            version: "v1.2.3".to_string(),
            tags: BTreeMap::new(),
            created_at: "2024-01-01T00:00:00+00:00".to_string(),
            status: ModelStatus::Production,
        }
    }

    #[test]
    fn test_render_deployment_shape() {
        let config = DeploymentConfig::from_record(&record(), Environment::Production)
            .replicas(3)
            .resource("requests", "cpu", "500m")
            .resource("requests", "memory", "512Mi")
            .resource("limits", "cpu", "1")
            .resource("limits", "memory", "1Gi");

        let manifest = render_deployment(&config).unwrap();
        assert_eq!(manifest["kind"], "Deployment");
        assert_eq!(manifest["metadata"]["name"], "model-v1.2.3");
        assert_eq!(manifest["spec"]["replicas"], 3);
        assert_eq!(manifest["spec"]["selector"]["matchLabels"]["app"], "membership-model");
        assert_eq!(
            manifest["spec"]["template"]["metadata"]["labels"]["version"],
            "v1.2.3"
        );

        let container = &manifest["spec"]["template"]["spec"]["containers"][0];
        assert_eq!(container["name"], "model-api");
        assert_eq!(
            container["image"],
            "${DOCKER_REGISTRY}/grocery-membership:v1.2.3"
        );
        assert_eq!(container["resources"]["limits"]["memory"], "1Gi");
        assert_eq!(container["env"][0]["name"], "MODEL_PATH");
        assert_eq!(
            container["env"][0]["value"],
            "/app/models/grocery_membership_model.joblib"
        );
        assert_eq!(container["env"][1]["value"], "production");
    }

    #[test]
    fn test_replica_bounds() {
        let base = DeploymentConfig::from_record(&record(), Environment::Staging);
        assert!(base.clone().replicas(1).validate().is_ok());
        assert!(base.clone().replicas(10).validate().is_ok());
        assert!(matches!(
            render_deployment(&base.clone().replicas(0)),
            Err(RegistryError::Validation { ref field, .. }) if field == "replicas"
        ));
        assert!(base.replicas(11).validate().is_err());
    }

    #[test]
    fn test_flags_do_not_change_manifest() {
        let base = DeploymentConfig::from_record(&record(), Environment::Staging);
        let plain = render_deployment(&base.clone().autoscaling(false).monitoring(true)).unwrap();
        let flagged = render_deployment(&base.autoscaling(true).monitoring(false)).unwrap();
        assert_eq!(plain, flagged);
    }

    #[test]
    fn test_config_defaults_from_json() {
        let config: DeploymentConfig = serde_json::from_str(
            r#"{"model_path": "/m.joblib", "version": "1.0.0", "environment": "staging"}"#,
        )
        .unwrap();
        assert_eq!(config.replicas, 1);
        assert!(config.monitoring_enabled);
        assert!(!config.autoscaling_enabled);
        assert_eq!(config.environment, Environment::Staging);

        let bad = serde_json::from_str::<DeploymentConfig>(
            r#"{"model_path": "/m", "version": "1", "environment": "qa"}"#,
        );
        assert!(bad.is_err());
    }

    #[test]
    fn test_environment_parse() {
        assert_eq!(Environment::from_str("prod"), Some(Environment::Production));
        assert_eq!(Environment::from_str("Development"), Some(Environment::Development));
        assert_eq!(Environment::from_str("qa"), None);
        assert_eq!(Environment::Staging.to_string(), "staging");
    }
}
