//! Check command - Validate a manifest without deploying.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use tracing::info;

use keel_manifest::{AccountConfig, DEFAULT_MANIFEST_FILE};

use super::{load_account_config, load_manifest, orchestrator};

#[derive(Args)]
pub struct CheckArgs {
    /// Path to the manifest
    #[arg(long, default_value = DEFAULT_MANIFEST_FILE)]
    pub file: PathBuf,

    /// Account config file or base64-encoded document, used for required tags
    #[arg(short = 'c', long)]
    pub account_config: Option<String>,
}

pub async fn execute(args: CheckArgs) -> Result<()> {
    info!("Checking manifest {}", args.file.display());

    let manifest = load_manifest(&args.file)?;
    let account = match &args.account_config {
        Some(param) => load_account_config(param)?,
        None => Arc::new(AccountConfig::default()),
    };

    let orchestrator = orchestrator(&manifest).await?;
    let errors = orchestrator.check(&manifest, account)?;

    if errors.is_empty() {
        println!("No errors were found when checking the manifest");
        return Ok(());
    }

    println!("The following errors were found in your manifest:");
    for error in &errors {
        println!("  - {}", error);
    }
    anyhow::bail!("{} error(s) found while checking the manifest", errors.len())
}
