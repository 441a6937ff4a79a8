//! Catalog persistence.
//!
//! This module provides:
//! - Atomic JSON file operations
//! - The [`MetadataStore`] seam with file-backed and in-memory stores
//! - Cross-process write leases on the registry directory

mod atomic;
mod store;

pub use atomic::{atomic_read_json, atomic_write_json, ensure_dir};
pub use store::{FileMetadataStore, InMemoryStore, MetadataStore, StoreLease};
