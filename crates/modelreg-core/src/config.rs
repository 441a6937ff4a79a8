//! Centralized configuration for the model registry.
//!
//! File names, defaults and the policies that decide how the registry
//! reacts to corrupt state and to status writes.

/// On-disk layout and defaults.
pub struct RegistryConfig;

impl RegistryConfig {
    pub const DEFAULT_REGISTRY_DIR: &'static str = "model_registry";
    pub const METADATA_FILENAME: &'static str = "metadata.json";
    pub const LOCK_FILENAME: &'static str = "metadata.lock";
    pub const BACKUP_EXTENSION: &'static str = "json.bak";
    pub const CORRUPT_EXTENSION: &'static str = "json.corrupt";
    pub const ID_PREFIX: &'static str = "model_";
    pub const DEFAULT_VERSION_PREFIX: &'static str = "1.0.";
    pub const ENV_REGISTRY_DIR: &'static str = "MODELREG_DIR";
}

/// Deployment manifest limits and labels.
pub struct DeploymentDefaults;

impl DeploymentDefaults {
    pub const APP_LABEL: &'static str = "membership-model";
    pub const CONTAINER_NAME: &'static str = "model-api";
    pub const IMAGE_REPOSITORY: &'static str = "${DOCKER_REGISTRY}/grocery-membership";
    pub const MIN_REPLICAS: u32 = 1;
    pub const MAX_REPLICAS: u32 = 10;
}

/// What to do when the metadata file exists but cannot be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CorruptStatePolicy {
    /// Refuse to open the registry so an operator can look at the file.
    #[default]
    Fail,
    /// Move the file aside and start from an empty catalog.
    ///
    /// Trades the existing history for availability. Every reset is logged
    /// at `warn` level with the path of the preserved copy.
    Reset,
}

impl CorruptStatePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CorruptStatePolicy::Fail => "fail",
            CorruptStatePolicy::Reset => "reset",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "fail" => Some(CorruptStatePolicy::Fail),
            "reset" => Some(CorruptStatePolicy::Reset),
            _ => None,
        }
    }
}

impl std::fmt::Display for CorruptStatePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How `set_status` treats writes that would add a second production model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusPolicy {
    /// Overwrite unconditionally. Two records can end up in production;
    /// only `rollback` restores a single one.
    #[default]
    Permissive,
    /// Reject writes that would leave more than one production record.
    SingleProduction,
}

/// Runtime options for opening a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryOptions {
    pub corrupt_state_policy: CorruptStatePolicy,
    pub status_policy: StatusPolicy,
    /// Copy the previous metadata file to `metadata.json.bak` on every save.
    pub keep_backup: bool,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            corrupt_state_policy: CorruptStatePolicy::Fail,
            status_policy: StatusPolicy::Permissive,
            keep_backup: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corrupt_policy_roundtrip() {
        for policy in [CorruptStatePolicy::Fail, CorruptStatePolicy::Reset] {
            let parsed = CorruptStatePolicy::from_str(policy.as_str()).expect("Should parse");
            assert_eq!(policy, parsed);
        }
        assert_eq!(CorruptStatePolicy::from_str("RESET"), Some(CorruptStatePolicy::Reset));
        assert_eq!(CorruptStatePolicy::from_str("ignore"), None);
    }

    #[test]
    fn test_defaults() {
        let options = RegistryOptions::default();
        assert_eq!(options.corrupt_state_policy, CorruptStatePolicy::Fail);
        assert_eq!(options.status_policy, StatusPolicy::Permissive);
        assert!(options.keep_backup);
        assert!(DeploymentDefaults::MIN_REPLICAS <= DeploymentDefaults::MAX_REPLICAS);
    }
}
