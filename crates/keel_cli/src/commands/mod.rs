//! CLI command definitions.
//!
//! Each subcommand maps to one lifecycle of the orchestrator.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use keel_core::{ExtensionCatalog, Orchestrator};
use keel_manifest::{AccountConfig, AccountConfigLoader, Manifest, ManifestError, ManifestReader};

pub mod check;
pub mod delete;
pub mod deploy;

/// keel - deploy applications described by a manifest
#[derive(Parser)]
#[command(name = "keel")]
#[command(version, about = "keel - infrastructure deployment orchestrator")]
#[command(long_about = r#"
keel reads an application manifest (keel.yml) describing services grouped into
environments, and deploys each environment in dependency order.

COMMANDS:
  check   → Validate the manifest and every service configuration
  deploy  → Deploy one or more environments
  delete  → Delete an environment

EXIT CODES:
  0 - Success
  1 - Validation, check or deploy failure
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check the manifest for errors without deploying
    Check(check::CheckArgs),

    /// Deploy environments of the application
    Deploy(deploy::DeployArgs),

    /// Delete an environment of the application
    Delete(delete::DeleteArgs),
}

/// Extensions available to manifests.
///
/// The standard library is always loaded by the registry; extensions linked into
/// this binary are added here by name.
pub fn extension_catalog() -> ExtensionCatalog {
    ExtensionCatalog::new()
}

/// Read and structurally validate a manifest, listing every problem on failure.
pub fn load_manifest(path: &Path) -> Result<Manifest> {
    match ManifestReader::read_file(path) {
        Ok(manifest) => Ok(manifest),
        Err(ManifestError::Invalid(errors)) => anyhow::bail!(
            "The following errors were found in your manifest:\n  {}",
            errors.join("\n  ")
        ),
        Err(e) => Err(e).with_context(|| format!("Failed to read manifest {}", path.display())),
    }
}

/// Load account configuration from a file path or a base64-encoded document.
pub fn load_account_config(param: &str) -> Result<Arc<AccountConfig>> {
    let config = AccountConfigLoader::load(param).context("Failed to load account config")?;
    Ok(Arc::new(config))
}

/// Build the orchestrator with the extensions the manifest declares.
pub async fn orchestrator(manifest: &Manifest) -> Result<Orchestrator> {
    Orchestrator::for_manifest(manifest, &extension_catalog())
        .await
        .context("Failed to load extensions")
}

/// Split a comma-separated environment list.
pub fn parse_environments(arg: &str) -> Vec<String> {
    arg.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
