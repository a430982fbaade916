//! Deploy command - Deploy environments of an application.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tracing::{error, info};

use keel_core::DeployOptions;
use keel_manifest::{parse_tag_args, DEFAULT_MANIFEST_FILE};

use super::{load_account_config, load_manifest, orchestrator, parse_environments};

#[derive(Args)]
pub struct DeployArgs {
    /// Path to the manifest
    #[arg(long, default_value = DEFAULT_MANIFEST_FILE)]
    pub file: PathBuf,

    /// Account config file or base64-encoded document
    #[arg(short = 'c', long)]
    pub account_config: String,

    /// Comma-separated environments to deploy
    #[arg(short = 'e', long)]
    pub environments: String,

    /// Deploy version; generated when omitted
    #[arg(short = 'v', long)]
    pub deploy_version: Option<String>,

    /// Application tags overriding the manifest (key=value,...)
    #[arg(short = 't', long)]
    pub tags: Option<String>,
}

pub async fn execute(args: DeployArgs) -> Result<()> {
    let manifest = load_manifest(&args.file)?;
    let account = load_account_config(&args.account_config)?;
    let environments = parse_environments(&args.environments);
    if environments.is_empty() {
        anyhow::bail!("At least one environment must be given with -e");
    }

    let mut options = DeployOptions::new();
    if let Some(version) = &args.deploy_version {
        options = options.with_deploy_version(version);
    }
    if let Some(tags) = &args.tags {
        options = options.with_tags(parse_tag_args(tags)?);
    }

    info!(
        "Deploying environments {} of application '{}'",
        environments.join(", "),
        manifest.name
    );

    let orchestrator = orchestrator(&manifest).await?;
    let results = orchestrator
        .deploy(&manifest, account, &environments, &options)
        .await?;

    let mut failed = Vec::new();
    for result in &results {
        if result.is_success() {
            println!(
                "Environment '{}' deployed in {} ms",
                result.environment_name, result.duration_ms
            );
        } else {
            error!(
                "Environment '{}' failed to deploy: {}",
                result.environment_name, result.message
            );
            failed.push(result.environment_name.as_str());
        }
    }

    if !failed.is_empty() {
        anyhow::bail!("Failed to deploy environments: {}", failed.join(", "));
    }
    Ok(())
}
