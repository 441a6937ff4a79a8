//! The model version registry.
//!
//! - **Catalog types**: [`ModelRecord`], [`ModelStatus`], [`Catalog`]
//! - **Registry**: registration, lookup, status changes and rollback over a
//!   [`MetadataStore`](crate::metadata::MetadataStore)
//!
//! # Location
//!
//! A file-backed registry keeps everything in one directory:
//! - `metadata.json`: the catalog
//! - `metadata.json.bak`: the catalog before the last save
//! - `metadata.lock`: advisory lock serializing writers across processes

mod model_registry;
mod types;

pub use model_registry::{ModelRegistry, ModelRegistryBuilder, RegisterModel};
pub use types::{model_id, Catalog, ModelRecord, ModelStatus};
