//! `draftflow publish` command - Merge a draft into the base branch.

use std::path::Path;

use anyhow::{Context, Result};

use super::utils::{Session, parse_key};
use crate::output;

/// Run the publish command.
pub fn run(config: &Path, key: &str) -> Result<()> {
    let key = parse_key(key)?;
    let session = Session::open(config)?;
    let workflow = session.workflow();

    session
        .rt
        .block_on(workflow.publish(&key))
        .with_context(|| format!("Failed to publish {key}"))?;

    output::success(&format!(
        "Published {key} to {}",
        session.config.workflow.base_branch
    ));
    Ok(())
}
