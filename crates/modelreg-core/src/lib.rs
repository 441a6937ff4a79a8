//! modelreg core - durable catalog of trained model artifacts.
//!
//! The registry records where each trained model lives, its metrics, a
//! version string and a lifecycle status, and decides which version is
//! live through promotion and rollback. It does not load or validate the
//! artifacts themselves.
//!
//! # Example
//!
//! ```rust,ignore
//! use modelreg_core::{ModelRegistry, ModelStatus, RegisterModel};
//!
//! fn main() -> modelreg_core::Result<()> {
//!     let registry = ModelRegistry::open("model_registry")?;
//!
//!     let id = registry.register(
//!         RegisterModel::new("/models/rf.joblib", [("accuracy_test", 0.91)])
//!             .version("1.1.0")
//!             .tag("env", "staging"),
//!     )?;
//!
//!     registry.rollback(&id)?;
//!     let live = registry.list_models(Some(&ModelStatus::Production));
//!     println!("{} production model(s)", live.len());
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod deployment;
pub mod error;
pub mod metadata;
pub mod registry;

// Re-export commonly used types
pub use config::{CorruptStatePolicy, RegistryConfig, RegistryOptions, StatusPolicy};
pub use deployment::{render_deployment, DeploymentConfig, Environment};
pub use error::{RegistryError, Result};
pub use metadata::{FileMetadataStore, InMemoryStore, MetadataStore};
pub use registry::{
    Catalog, ModelRecord, ModelRegistry, ModelRegistryBuilder, ModelStatus, RegisterModel,
};
