//! modelreg - operator CLI for the model version registry.
//!
//! Lists, registers, promotes and rolls back model versions, and renders
//! deployment manifests. Results are printed to stdout as JSON; logs go to
//! stderr.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use modelreg_core::RegistryConfig;
use std::path::PathBuf;
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "modelreg")]
#[command(about = "Manage the model version registry")]
struct Args {
    /// Registry directory holding metadata.json
    #[arg(
        long,
        global = true,
        env = RegistryConfig::ENV_REGISTRY_DIR,
        default_value = RegistryConfig::DEFAULT_REGISTRY_DIR
    )]
    registry_dir: PathBuf,

    /// Start from an empty catalog if metadata.json is unreadable (the file
    /// is kept as metadata.json.corrupt)
    #[arg(long, global = true)]
    reset_corrupt: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List registered models
    List {
        /// Only models with this status
        #[arg(long)]
        status: Option<String>,
    },
    /// Show one model
    Show { id: String },
    /// Show the most recently registered model (not necessarily production)
    Latest,
    /// Show the current production model
    Production,
    /// Register a trained artifact
    Register {
        /// Artifact path
        path: String,
        /// Metric as name=value, repeatable
        #[arg(long = "metric", value_parser = commands::parse_metric)]
        metrics: Vec<(String, f64)>,
        /// Tag as key=value, repeatable
        #[arg(long = "tag", value_parser = commands::parse_tag)]
        tags: Vec<(String, String)>,
        /// Version string (defaults to 1.0.<index>)
        #[arg(long)]
        version: Option<String>,
        /// Initial status
        #[arg(long, default_value = "registered")]
        status: String,
    },
    /// Overwrite a model's status
    SetStatus {
        id: String,
        status: String,
        /// Refuse to create a second production model
        #[arg(long)]
        strict: bool,
    },
    /// Make a model the only production model
    Rollback { id: String },
    /// Render a Kubernetes Deployment for a model
    Manifest(commands::ManifestArgs),
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    debug!("Registry directory: {}", args.registry_dir.display());

    let output = commands::run(&args)?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
