//! `draftflow init` command - Write a configuration file for a repository.

use std::path::Path;

use anyhow::{Context, Result, bail};
use draftflow_core::Config;
use draftflow_core::config::{HostConfig, WorkflowConfig};

use crate::output;

/// Run the init command.
pub fn run(
    config: &Path,
    owner: String,
    repo: String,
    base_branch: Option<String>,
    api_url: Option<String>,
    force: bool,
) -> Result<()> {
    if owner.trim().is_empty() || repo.trim().is_empty() {
        bail!("Both --owner and --repo must be non-empty");
    }

    if config.exists() && !force {
        output::warn(&format!(
            "{} already exists - pass --force to overwrite it",
            config.display()
        ));
        return Ok(());
    }

    let workflow = WorkflowConfig {
        base_branch: base_branch.unwrap_or_else(|| WorkflowConfig::default().base_branch),
        ..WorkflowConfig::default()
    };
    let settings = Config {
        workflow,
        host: HostConfig {
            api_url,
            owner,
            repo,
        },
    };

    settings
        .save(config)
        .with_context(|| format!("Failed to write config to {}", config.display()))?;

    output::success(&format!("Wrote {}", config.display()));
    output::info(&format!(
        "Drafts of {}/{} will target {}",
        settings.host.owner, settings.host.repo, settings.workflow.base_branch
    ));
    Ok(())
}
