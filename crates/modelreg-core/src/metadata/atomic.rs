//! Atomic file operations for the registry's JSON persistence.
//!
//! Writes go through a sibling temp file:
//! 1. Serialize and write to `<name>.<pid>.<tid>.tmp` in the same directory
//! 2. fsync the temp file
//! 3. Optionally copy the current file to a `.bak` sibling
//! 4. Rename the temp file over the target
//!
//! A crash at any point leaves either the old file or the new one, never a
//! truncated mix.

use crate::config::RegistryConfig;
use crate::{RegistryError, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::process;
use std::thread;
use tracing::{debug, warn};

/// Read and parse a JSON file.
///
/// Returns `None` if the file doesn't exist. A file that exists but does not
/// parse is reported as [`RegistryError::CorruptState`].
pub fn atomic_read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(RegistryError::persistence(
                format!("Failed to read {}", path.display()),
                path,
                e,
            ))
        }
    };

    let data: T = serde_json::from_str(&contents).map_err(|e| RegistryError::CorruptState {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    Ok(Some(data))
}

/// Write data to a JSON file atomically.
pub fn atomic_write_json<T: Serialize>(path: &Path, data: &T, keep_backup: bool) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }

    let temp_path = path.with_extension(format!("json.{}.{}.tmp", process::id(), thread_id()));

    let serialized = serde_json::to_string_pretty(data).map_err(|e| RegistryError::Json {
        message: format!("Failed to serialize {}: {}", path.display(), e),
        source: Some(e),
    })?;

    if let Err(e) = write_synced(&temp_path, serialized.as_bytes()) {
        // Best effort: a stray temp file is harmless but untidy.
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }

    if keep_backup && path.exists() {
        let backup_path = path.with_extension(RegistryConfig::BACKUP_EXTENSION);
        if let Err(e) = fs::copy(path, &backup_path) {
            warn!("Failed to create backup {}: {}", backup_path.display(), e);
        } else {
            debug!("Created backup: {}", backup_path.display());
        }
    }

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        RegistryError::persistence(
            format!("Failed to rename {} to {}", temp_path.display(), path.display()),
            path,
            e,
        )
    })?;

    debug!("Atomically wrote {}", path.display());
    Ok(())
}

/// Create a directory and its parents if missing.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(dir).map_err(|e| {
        RegistryError::persistence(format!("Failed to create directory {}", dir.display()), dir, e)
    })
}

fn write_synced(temp_path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(temp_path)
        .map_err(|e| {
            RegistryError::persistence(
                format!("Failed to create temp file {}", temp_path.display()),
                temp_path,
                e,
            )
        })?;

    file.write_all(bytes).map_err(|e| {
        RegistryError::persistence(
            format!("Failed to write temp file {}", temp_path.display()),
            temp_path,
            e,
        )
    })?;

    file.sync_all().map_err(|e| {
        RegistryError::persistence(
            format!("Failed to sync temp file {}", temp_path.display()),
            temp_path,
            e,
        )
    })
}

/// Numeric identifier for the current thread, used in temp file names.
fn thread_id() -> u64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut hasher = DefaultHasher::new();
    thread::current().id().hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use tempfile::TempDir;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct TestData {
        name: String,
        value: i32,
    }

    #[test]
    fn test_atomic_write_and_read() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("metadata.json");

        let data = TestData {
            name: "test".to_string(),
            value: 42,
        };

        atomic_write_json(&path, &data, false).unwrap();
        assert!(path.exists());

        let read_data: Option<TestData> = atomic_read_json(&path).unwrap();
        assert_eq!(read_data, Some(data));
    }

    #[test]
    fn test_atomic_write_creates_backup() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("metadata.json");

        let first = TestData {
            name: "first".to_string(),
            value: 1,
        };
        let second = TestData {
            name: "second".to_string(),
            value: 2,
        };

        atomic_write_json(&path, &first, true).unwrap();
        atomic_write_json(&path, &second, true).unwrap();

        let backup_path = path.with_extension("json.bak");
        let backup: Option<TestData> = atomic_read_json(&backup_path).unwrap();
        assert_eq!(backup, Some(first));

        let current: Option<TestData> = atomic_read_json(&path).unwrap();
        assert_eq!(current, Some(second));
    }

    #[test]
    fn test_atomic_write_leaves_no_temp_files() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("metadata.json");

        for value in 0..3 {
            let data = TestData {
                name: "loop".to_string(),
                value,
            };
            atomic_write_json(&path, &data, false).unwrap();
        }

        let leftovers: Vec<_> = fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_atomic_read_nonexistent() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nonexistent.json");

        let result: Option<TestData> = atomic_read_json(&path).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_atomic_read_garbage_is_corrupt_state() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("metadata.json");
        fs::write(&path, "{ not json").unwrap();

        let result: Result<Option<TestData>> = atomic_read_json(&path);
        assert!(matches!(result, Err(RegistryError::CorruptState { .. })));
    }

    #[test]
    fn test_atomic_write_creates_directories() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("dir").join("metadata.json");

        let data = TestData {
            name: "nested".to_string(),
            value: 99,
        };

        atomic_write_json(&path, &data, false).unwrap();
        assert!(path.exists());
    }
}
