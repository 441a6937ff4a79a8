//! The model registry: catalog operations over a [`MetadataStore`].

use crate::config::{CorruptStatePolicy, RegistryConfig, RegistryOptions, StatusPolicy};
use crate::metadata::{FileMetadataStore, InMemoryStore, MetadataStore};
use crate::registry::types::{model_id, Catalog, ModelRecord, ModelStatus};
use crate::{RegistryError, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard};
use tracing::{debug, info, warn};

/// Input for [`ModelRegistry::register`].
///
/// # Example
///
/// ```rust,ignore
/// let request = RegisterModel::new("/models/rf.joblib", [("accuracy_test", 0.91)])
///     .version("1.2.0")
///     .tag("env", "staging");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RegisterModel {
    path: String,
    metrics: BTreeMap<String, f64>,
    version: Option<String>,
    tags: BTreeMap<String, String>,
    status: ModelStatus,
}

impl RegisterModel {
    pub fn new<K, I>(path: impl Into<String>, metrics: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, f64)>,
    {
        Self {
            path: path.into(),
            metrics: metrics.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            version: None,
            tags: BTreeMap::new(),
            status: ModelStatus::Registered,
        }
    }

    /// Explicit version. Defaults to `1.0.<number of models already registered>`.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn tags<K, V, I>(mut self, tags: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        self.tags
            .extend(tags.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn status(mut self, status: impl Into<ModelStatus>) -> Self {
        self.status = status.into();
        self
    }
}

/// Result of a mutation closure: whether the catalog must be persisted.
enum Outcome<T> {
    Changed(T),
    Unchanged(T),
}

/// Durable catalog of model artifacts.
///
/// Every mutating call runs as one critical section: take the in-process
/// write lock, take the store lease, reload from the store, apply the change
/// to a working copy, save it, then publish it as the in-memory catalog. A
/// failed save leaves the in-memory catalog as it was before the call.
///
/// Reads are served from the in-memory catalog. Another process's writes
/// become visible after the next mutation or [`ModelRegistry::reload`].
pub struct ModelRegistry {
    store: Box<dyn MetadataStore>,
    catalog: RwLock<Catalog>,
    status_policy: StatusPolicy,
    registry_dir: Option<PathBuf>,
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("registry_dir", &self.registry_dir)
            .field("status_policy", &self.status_policy)
            .finish_non_exhaustive()
    }
}

impl ModelRegistry {
    /// Open the file-backed registry in `registry_dir` with default options.
    ///
    /// Creates the directory if needed and loads the catalog.
    pub fn open(registry_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::builder(registry_dir).build()
    }

    /// Create a builder for a file-backed registry.
    pub fn builder(registry_dir: impl Into<PathBuf>) -> ModelRegistryBuilder {
        ModelRegistryBuilder::new(registry_dir)
    }

    /// Build a registry over any store.
    pub fn with_store(store: impl MetadataStore + 'static, status_policy: StatusPolicy) -> Result<Self> {
        Self::from_parts(Box::new(store), status_policy, None)
    }

    /// Registry that lives only in memory.
    pub fn in_memory() -> Self {
        Self {
            store: Box::new(InMemoryStore::new()),
            catalog: RwLock::new(Catalog::default()),
            status_policy: StatusPolicy::default(),
            registry_dir: None,
        }
    }

    fn from_parts(
        store: Box<dyn MetadataStore>,
        status_policy: StatusPolicy,
        registry_dir: Option<PathBuf>,
    ) -> Result<Self> {
        let catalog = store.load()?;
        debug!("Registry opened with {} models", catalog.len());
        Ok(Self {
            store,
            catalog: RwLock::new(catalog),
            status_policy,
            registry_dir,
        })
    }

    /// Directory holding the metadata file, for file-backed registries.
    pub fn registry_dir(&self) -> Option<&Path> {
        self.registry_dir.as_deref()
    }

    pub fn status_policy(&self) -> StatusPolicy {
        self.status_policy
    }

    // ========================================
    // Reads
    // ========================================

    // The catalog is only replaced after a successful save, so a poisoned
    // lock still guards a consistent value.
    fn read(&self) -> RwLockReadGuard<'_, Catalog> {
        self.catalog.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up a record by id.
    pub fn get_by_id(&self, id: &str) -> Option<ModelRecord> {
        self.read().find(id).cloned()
    }

    /// Version string of a record.
    pub fn get_model_version(&self, id: &str) -> Option<String> {
        self.read().find(id).map(|m| m.version.clone())
    }

    /// All records in insertion order, optionally filtered by status.
    pub fn list_models(&self, status: Option<&ModelStatus>) -> Vec<ModelRecord> {
        self.read()
            .models
            .iter()
            .filter(|m| status.map_or(true, |s| &m.status == s))
            .cloned()
            .collect()
    }

    /// The most recently registered record.
    ///
    /// This is insertion order only. It is not the highest version and not
    /// the production record; use [`ModelRegistry::production`] for that.
    pub fn get_latest(&self) -> Option<ModelRecord> {
        self.read().models.last().cloned()
    }

    /// The first record whose status is `production`.
    pub fn production(&self) -> Option<ModelRecord> {
        self.read()
            .models
            .iter()
            .find(|m| m.status.is_production())
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Snapshot of the whole catalog.
    pub fn catalog(&self) -> Catalog {
        self.read().clone()
    }

    /// Replace the in-memory catalog with what the store holds now.
    pub fn reload(&self) -> Result<()> {
        let mut guard = self
            .catalog
            .write()
            .map_err(|_| RegistryError::Lock("Failed to acquire write lock for reload".to_string()))?;
        *guard = self.store.load()?;
        debug!("Reloaded registry with {} models", guard.len());
        Ok(())
    }

    // ========================================
    // Mutations
    // ========================================

    fn write_cycle<T>(
        &self,
        operation: &str,
        apply: impl FnOnce(&mut Catalog) -> Result<Outcome<T>>,
    ) -> Result<T> {
        let mut guard = self.catalog.write().map_err(|_| {
            RegistryError::Lock(format!("Failed to acquire write lock for {}", operation))
        })?;
        let _lease = self.store.acquire()?;

        let mut working = self.store.load()?;
        match apply(&mut working)? {
            Outcome::Changed(value) => {
                if let Err(e) = self.store.save(&working) {
                    warn!("{} not persisted: {}", operation, e);
                    return Err(e);
                }
                *guard = working;
                Ok(value)
            }
            Outcome::Unchanged(value) => {
                *guard = working;
                Ok(value)
            }
        }
    }

    /// Register a new model and return its id.
    pub fn register(&self, request: RegisterModel) -> Result<String> {
        if request.path.trim().is_empty() {
            return Err(RegistryError::Validation {
                field: "path".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        // JSON has no encoding for NaN or infinity; such a record would make
        // the saved file unloadable.
        if let Some((name, value)) = request.metrics.iter().find(|(_, v)| !v.is_finite()) {
            return Err(RegistryError::Validation {
                field: "metrics".to_string(),
                message: format!("{} must be a finite number, got {}", name, value),
            });
        }

        self.write_cycle("register", |catalog| {
            let id = model_id(catalog.next_sequence());
            let version = request.version.unwrap_or_else(|| {
                format!("{}{}", RegistryConfig::DEFAULT_VERSION_PREFIX, catalog.len())
            });

            info!(
                "Registering {} (version {}, status {}) at {}",
                id, version, request.status, request.path
            );

            catalog.models.push(ModelRecord {
                id: id.clone(),
                path: request.path,
                metrics: request.metrics,
                version,
                tags: request.tags,
                created_at: chrono::Utc::now().to_rfc3339(),
                status: request.status,
            });
            Ok(Outcome::Changed(id))
        })
    }

    /// Overwrite a record's status.
    ///
    /// Returns `false` when the id is unknown. Under
    /// [`StatusPolicy::Permissive`] nothing else is checked, so this can
    /// leave two records in production.
    pub fn set_status(&self, id: &str, status: impl Into<ModelStatus>) -> Result<bool> {
        let status = status.into();
        let policy = self.status_policy;

        self.write_cycle("set_status", |catalog| {
            if catalog.find(id).is_none() {
                debug!("set_status: {} not found", id);
                return Ok(Outcome::Unchanged(false));
            }

            if policy == StatusPolicy::SingleProduction && status.is_production() {
                let others: Vec<&str> = catalog
                    .models
                    .iter()
                    .filter(|m| m.id != id && m.status.is_production())
                    .map(|m| m.id.as_str())
                    .collect();
                if !others.is_empty() {
                    return Err(RegistryError::InvariantViolation {
                        message: format!(
                            "promoting {} would leave multiple production models (already: {}); use rollback",
                            id,
                            others.join(", ")
                        ),
                    });
                }
            }

            let Some(record) = catalog.find_mut(id) else {
                return Ok(Outcome::Unchanged(false));
            };
            info!("Status of {}: {} -> {}", id, record.status, status);
            record.status = status;
            Ok(Outcome::Changed(true))
        })
    }

    /// Make `target_id` the only production model.
    ///
    /// Every current production record becomes `archived` and the target
    /// becomes `production`, persisted in a single save. Unknown ids return
    /// `false` without touching the store.
    pub fn rollback(&self, target_id: &str) -> Result<bool> {
        self.write_cycle("rollback", |catalog| {
            if catalog.find(target_id).is_none() {
                debug!("rollback: {} not found", target_id);
                return Ok(Outcome::Unchanged(false));
            }

            for record in catalog.models.iter_mut() {
                if record.status.is_production() && record.id != target_id {
                    info!("Archiving {} (version {})", record.id, record.version);
                    record.status = ModelStatus::Archived;
                }
            }

            if let Some(target) = catalog.find_mut(target_id) {
                info!("Promoting {} (version {}) to production", target.id, target.version);
                target.status = ModelStatus::Production;
            }
            Ok(Outcome::Changed(true))
        })
    }
}

/// Builder for a file-backed [`ModelRegistry`].
///
/// # Example
///
/// ```rust,ignore
/// let registry = ModelRegistry::builder("./model_registry")
///     .corrupt_state_policy(CorruptStatePolicy::Reset)
///     .status_policy(StatusPolicy::SingleProduction)
///     .build()?;
/// ```
#[derive(Debug, Clone)]
pub struct ModelRegistryBuilder {
    registry_dir: PathBuf,
    options: RegistryOptions,
}

impl ModelRegistryBuilder {
    pub fn new(registry_dir: impl Into<PathBuf>) -> Self {
        Self {
            registry_dir: registry_dir.into(),
            options: RegistryOptions::default(),
        }
    }

    /// Default: [`CorruptStatePolicy::Fail`]
    pub fn corrupt_state_policy(mut self, policy: CorruptStatePolicy) -> Self {
        self.options.corrupt_state_policy = policy;
        self
    }

    /// Default: [`StatusPolicy::Permissive`]
    pub fn status_policy(mut self, policy: StatusPolicy) -> Self {
        self.options.status_policy = policy;
        self
    }

    /// Default: `true`
    pub fn keep_backup(mut self, enable: bool) -> Self {
        self.options.keep_backup = enable;
        self
    }

    pub fn options(mut self, options: RegistryOptions) -> Self {
        self.options = options;
        self
    }

    pub fn build(self) -> Result<ModelRegistry> {
        let store = FileMetadataStore::open(&self.registry_dir)?
            .with_corrupt_state_policy(self.options.corrupt_state_policy)
            .with_backup(self.options.keep_backup);
        info!(
            "Opening model registry at {} (corrupt state policy: {})",
            self.registry_dir.display(),
            self.options.corrupt_state_policy
        );
        ModelRegistry::from_parts(
            Box::new(store),
            self.options.status_policy,
            Some(self.registry_dir),
        )
    }
}
