//! Delete command - Delete an environment.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::{error, info};

use keel_manifest::DEFAULT_MANIFEST_FILE;

use super::{load_account_config, load_manifest, orchestrator};

#[derive(Args)]
pub struct DeleteArgs {
    /// Path to the manifest
    #[arg(long, default_value = DEFAULT_MANIFEST_FILE)]
    pub file: PathBuf,

    /// Account config file or base64-encoded document
    #[arg(short = 'c', long)]
    pub account_config: String,

    /// Environment to delete
    #[arg(short = 'e', long)]
    pub environment: String,

    /// Skip the confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,
}

pub async fn execute(args: DeleteArgs) -> Result<()> {
    let manifest = load_manifest(&args.file)?;
    let account = load_account_config(&args.account_config)?;

    if !args.yes && !confirm(&manifest.name, &args.environment)? {
        println!("Aborted deleting environment '{}'", args.environment);
        return Ok(());
    }

    info!(
        "Deleting environment '{}' of application '{}'",
        args.environment, manifest.name
    );

    let orchestrator = orchestrator(&manifest).await?;
    let result = orchestrator
        .delete(&manifest, account, &args.environment)
        .await?;

    if !result.is_success() {
        error!(
            "Environment '{}' failed to delete: {}",
            result.environment_name, result.message
        );
        anyhow::bail!("Failed to delete environment '{}'", result.environment_name);
    }

    println!(
        "Environment '{}' deleted in {} ms",
        result.environment_name, result.duration_ms
    );
    Ok(())
}

fn confirm(app_name: &str, environment: &str) -> Result<bool> {
    println!(
        "WARNING: This will delete every resource of environment '{}' in application '{}'.",
        environment, app_name
    );
    let answer: String = dialoguer::Input::new()
        .with_prompt("Type 'yes' to continue")
        .allow_empty(true)
        .interact_text()
        .context("Failed to read confirmation")?;
    Ok(is_confirmation(&answer))
}

fn is_confirmation(answer: &str) -> bool {
    answer.trim() == "yes"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_confirmation() {
        assert!(is_confirmation("yes"));
        assert!(is_confirmation(" yes\n"));
        assert!(!is_confirmation("y"));
        assert!(!is_confirmation("YES please"));
    }
}
