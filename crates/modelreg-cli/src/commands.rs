//! Command handlers.
//!
//! Each handler returns the JSON value printed by `main`.

use crate::{Args, Command};
use anyhow::{anyhow, bail, Context, Result};
use clap::Args as ClapArgs;
use modelreg_core::{
    render_deployment, CorruptStatePolicy, DeploymentConfig, Environment, ModelRecord,
    ModelRegistry, ModelStatus, RegisterModel, StatusPolicy,
};
use serde_json::{json, Value};
use tracing::info;

#[derive(ClapArgs, Debug)]
pub struct ManifestArgs {
    /// Model id
    pub id: String,
    /// development, staging or production
    #[arg(long, value_parser = parse_environment)]
    pub environment: Environment,
    #[arg(long, default_value_t = 1)]
    pub replicas: u32,
    #[arg(long)]
    pub cpu_request: Option<String>,
    #[arg(long)]
    pub memory_request: Option<String>,
    #[arg(long)]
    pub cpu_limit: Option<String>,
    #[arg(long)]
    pub memory_limit: Option<String>,
    #[arg(long)]
    pub autoscaling: bool,
    #[arg(long)]
    pub no_monitoring: bool,
}

pub fn parse_metric(s: &str) -> std::result::Result<(String, f64), String> {
    let (name, value) = split_pair(s)?;
    let value = value
        .parse::<f64>()
        .map_err(|e| format!("invalid metric value '{}': {}", value, e))?;
    if !value.is_finite() {
        return Err(format!("metric '{}' must be a finite number", name));
    }
    Ok((name.to_string(), value))
}

pub fn parse_tag(s: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = split_pair(s)?;
    Ok((key.to_string(), value.to_string()))
}

fn parse_environment(s: &str) -> std::result::Result<Environment, String> {
    Environment::from_str(s)
        .ok_or_else(|| format!("unknown environment '{}' (development|staging|production)", s))
}

fn split_pair(s: &str) -> std::result::Result<(&str, &str), String> {
    match s.split_once('=') {
        Some((k, v)) if !k.trim().is_empty() => Ok((k.trim(), v.trim())),
        _ => Err(format!("expected key=value, got '{}'", s)),
    }
}

fn open(args: &Args, status_policy: StatusPolicy) -> Result<ModelRegistry> {
    let policy = if args.reset_corrupt {
        CorruptStatePolicy::Reset
    } else {
        CorruptStatePolicy::Fail
    };
    ModelRegistry::builder(&args.registry_dir)
        .corrupt_state_policy(policy)
        .status_policy(status_policy)
        .build()
        .with_context(|| format!("Failed to open registry at {}", args.registry_dir.display()))
}

fn found(record: Option<ModelRecord>, what: &str) -> Result<Value> {
    match record {
        Some(record) => Ok(serde_json::to_value(record)?),
        None => bail!("{} not found", what),
    }
}

pub fn run(args: &Args) -> Result<Value> {
    match &args.command {
        Command::List { status } => {
            let registry = open(args, StatusPolicy::Permissive)?;
            let filter = status.as_deref().map(ModelStatus::from);
            Ok(serde_json::to_value(registry.list_models(filter.as_ref()))?)
        }
        Command::Show { id } => {
            let registry = open(args, StatusPolicy::Permissive)?;
            found(registry.get_by_id(id), &format!("Model {}", id))
        }
        Command::Latest => {
            let registry = open(args, StatusPolicy::Permissive)?;
            found(registry.get_latest(), "Latest model")
        }
        Command::Production => {
            let registry = open(args, StatusPolicy::Permissive)?;
            found(registry.production(), "Production model")
        }
        Command::Register {
            path,
            metrics,
            tags,
            version,
            status,
        } => {
            let registry = open(args, StatusPolicy::Permissive)?;
            let mut request = RegisterModel::new(path.clone(), metrics.iter().cloned())
                .tags(tags.iter().cloned())
                .status(status.as_str());
            if let Some(version) = version {
                request = request.version(version.clone());
            }
            let id = registry.register(request)?;
            info!("Registered {}", id);
            Ok(json!({ "id": id }))
        }
        Command::SetStatus { id, status, strict } => {
            let policy = if *strict {
                StatusPolicy::SingleProduction
            } else {
                StatusPolicy::Permissive
            };
            let registry = open(args, policy)?;
            if !registry.set_status(id, status.as_str())? {
                bail!("Model {} not found", id);
            }
            found(registry.get_by_id(id), &format!("Model {}", id))
        }
        Command::Rollback { id } => {
            let registry = open(args, StatusPolicy::Permissive)?;
            if !registry.rollback(id)? {
                bail!("Model {} not found", id);
            }
            Ok(serde_json::to_value(
                registry.list_models(Some(&ModelStatus::Production)),
            )?)
        }
        Command::Manifest(manifest) => {
            let registry = open(args, StatusPolicy::Permissive)?;
            let record = registry
                .get_by_id(&manifest.id)
                .ok_or_else(|| anyhow!("Model {} not found", manifest.id))?;
            Ok(render_deployment(&manifest_config(&record, manifest))?)
        }
    }
}

fn manifest_config(record: &ModelRecord, args: &ManifestArgs) -> DeploymentConfig {
    let mut config = DeploymentConfig::from_record(record, args.environment)
        .replicas(args.replicas)
        .autoscaling(args.autoscaling)
        .monitoring(!args.no_monitoring);

    let entries = [
        ("requests", "cpu", &args.cpu_request),
        ("requests", "memory", &args.memory_request),
        ("limits", "cpu", &args.cpu_limit),
        ("limits", "memory", &args.memory_limit),
    ];
    for (section, name, value) in entries {
        if let Some(value) = value {
            config = config.resource(section, name, value.as_str());
        }
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_metric() {
        assert_eq!(
            parse_metric("accuracy_test=0.91").unwrap(),
            ("accuracy_test".to_string(), 0.91)
        );
        assert!(parse_metric("accuracy").is_err());
        assert!(parse_metric("accuracy=high").is_err());
        assert!(parse_metric("=0.5").is_err());
    }

    #[test]
    fn test_parse_metric_rejects_non_finite() {
        for raw in ["loss=NaN", "loss=inf", "loss=-infinity"] {
            let err = parse_metric(raw).unwrap_err();
            assert!(err.contains("finite"), "{raw}: {err}");
        }
    }

    #[test]
    fn test_parse_tag_keeps_extra_equals() {
        assert_eq!(
            parse_tag("query=a=b").unwrap(),
            ("query".to_string(), "a=b".to_string())
        );
    }

    #[test]
    fn test_parse_environment() {
        assert_eq!(parse_environment("prod").unwrap(), Environment::Production);
        assert!(parse_environment("qa").is_err());
    }
}
