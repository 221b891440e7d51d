//! `draftflow delete` command - Delete a file from a branch.

use std::path::Path;

use anyhow::{Context, Result};

use super::utils::Session;
use crate::output;

/// Run the delete command.
pub fn run(config: &Path, path: &str, branch: Option<&str>, message: Option<&str>) -> Result<()> {
    let session = Session::open(config)?;
    let workflow = session.workflow();
    let message = message.map_or_else(|| format!("Delete {path}"), str::to_string);

    let sha = session
        .rt
        .block_on(workflow.delete_file(path, &message, branch))
        .with_context(|| format!("Failed to delete {path}"))?;

    let branch = branch.unwrap_or(&session.config.workflow.base_branch);
    output::success(&format!("Deleted {path} from {branch}"));
    output::essential(sha.as_str());
    Ok(())
}
