//! Whole-catalog persistence.
//!
//! [`MetadataStore`] is the seam between the registry and storage. The
//! file-backed store keeps `metadata.json` in the registry directory; the
//! in-memory store backs tests and embedded use.

use crate::config::{CorruptStatePolicy, RegistryConfig};
use crate::metadata::atomic::{atomic_read_json, atomic_write_json, ensure_dir};
use crate::registry::Catalog;
use crate::{RegistryError, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Storage backend for the catalog.
pub trait MetadataStore: Send + Sync {
    /// Load the full catalog. A store with nothing saved yet yields an
    /// empty catalog.
    fn load(&self) -> Result<Catalog>;

    /// Replace the persisted catalog. Either the whole catalog is written or
    /// nothing is.
    fn save(&self, catalog: &Catalog) -> Result<()>;

    /// Exclusive access for a read-modify-write cycle across processes.
    ///
    /// The lease is released when dropped.
    fn acquire(&self) -> Result<StoreLease> {
        Ok(StoreLease::none())
    }
}

/// Held for the duration of a mutation; releases the store lock on drop.
#[derive(Debug)]
pub struct StoreLease {
    file: Option<File>,
}

impl StoreLease {
    fn none() -> Self {
        Self { file: None }
    }
}

impl Drop for StoreLease {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            if let Err(e) = FileExt::unlock(&file) {
                warn!("Failed to release registry lock: {}", e);
            }
        }
    }
}

/// Catalog stored as `metadata.json` under a registry directory.
#[derive(Debug, Clone)]
pub struct FileMetadataStore {
    registry_dir: PathBuf,
    corrupt_state_policy: CorruptStatePolicy,
    keep_backup: bool,
}

impl FileMetadataStore {
    /// Open a store, creating the registry directory if it is missing.
    pub fn open(registry_dir: impl Into<PathBuf>) -> Result<Self> {
        let registry_dir = registry_dir.into();
        ensure_dir(&registry_dir)?;
        Ok(Self {
            registry_dir,
            corrupt_state_policy: CorruptStatePolicy::default(),
            keep_backup: true,
        })
    }

    pub fn with_corrupt_state_policy(mut self, policy: CorruptStatePolicy) -> Self {
        self.corrupt_state_policy = policy;
        self
    }

    pub fn with_backup(mut self, keep_backup: bool) -> Self {
        self.keep_backup = keep_backup;
        self
    }

    pub fn registry_dir(&self) -> &Path {
        &self.registry_dir
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.registry_dir.join(RegistryConfig::METADATA_FILENAME)
    }

    fn lock_path(&self) -> PathBuf {
        self.registry_dir.join(RegistryConfig::LOCK_FILENAME)
    }

    /// First unused quarantine name: `metadata.json.corrupt`, then
    /// `metadata.json.corrupt.1`, `.2`, ...
    fn quarantine_path(path: &Path) -> PathBuf {
        let base = path.with_extension(RegistryConfig::CORRUPT_EXTENSION);
        if !base.exists() {
            return base;
        }
        let mut n: u64 = 1;
        loop {
            let candidate =
                path.with_extension(format!("{}.{}", RegistryConfig::CORRUPT_EXTENSION, n));
            if !candidate.exists() {
                return candidate;
            }
            n += 1;
        }
    }

    /// Move an unreadable metadata file aside so the next save does not
    /// destroy it. Earlier quarantined copies are never overwritten.
    fn quarantine(&self, path: &Path, reason: &str) -> Result<()> {
        let corrupt_path = Self::quarantine_path(path);
        fs::rename(path, &corrupt_path).map_err(|e| {
            RegistryError::persistence(
                format!("Failed to move corrupt metadata to {}", corrupt_path.display()),
                path,
                e,
            )
        })?;
        warn!(
            "Registry metadata {} could not be parsed ({}); starting from an empty catalog. \
             Previous contents preserved at {}",
            path.display(),
            reason,
            corrupt_path.display()
        );
        Ok(())
    }
}

impl MetadataStore for FileMetadataStore {
    fn load(&self) -> Result<Catalog> {
        ensure_dir(&self.registry_dir)?;
        let path = self.metadata_path();
        debug!("Loading registry catalog from {}", path.display());

        match atomic_read_json::<Catalog>(&path) {
            Ok(Some(catalog)) => Ok(catalog),
            Ok(None) => Ok(Catalog::default()),
            Err(RegistryError::CorruptState { message, .. })
                if self.corrupt_state_policy == CorruptStatePolicy::Reset =>
            {
                self.quarantine(&path, &message)?;
                Ok(Catalog::default())
            }
            Err(e) => Err(e),
        }
    }

    fn save(&self, catalog: &Catalog) -> Result<()> {
        ensure_dir(&self.registry_dir)?;
        let path = self.metadata_path();
        debug!(
            "Saving {} models to {}",
            catalog.models.len(),
            path.display()
        );
        atomic_write_json(&path, catalog, self.keep_backup)
    }

    fn acquire(&self) -> Result<StoreLease> {
        ensure_dir(&self.registry_dir)?;
        let lock_path = self.lock_path();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| {
                RegistryError::persistence(
                    format!("Failed to open lock file {}", lock_path.display()),
                    &lock_path,
                    e,
                )
            })?;

        file.lock_exclusive().map_err(|e| {
            RegistryError::persistence(
                format!("Failed to lock {}", lock_path.display()),
                &lock_path,
                e,
            )
        })?;

        Ok(StoreLease { file: Some(file) })
    }
}

/// Catalog held in memory only.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    catalog: Mutex<Catalog>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing catalog.
    pub fn with_catalog(catalog: Catalog) -> Self {
        Self {
            catalog: Mutex::new(catalog),
        }
    }
}

impl MetadataStore for InMemoryStore {
    fn load(&self) -> Result<Catalog> {
        self.catalog
            .lock()
            .map(|c| c.clone())
            .map_err(|_| RegistryError::Lock("In-memory store lock poisoned".to_string()))
    }

    fn save(&self, catalog: &Catalog) -> Result<()> {
        let mut stored = self
            .catalog
            .lock()
            .map_err(|_| RegistryError::Lock("In-memory store lock poisoned".to_string()))?;
        *stored = catalog.clone();
        Ok(())
    }
}
