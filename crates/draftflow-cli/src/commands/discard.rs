//! `draftflow discard` command - Abandon a draft.

use std::path::Path;

use anyhow::Result;

use super::utils::{Session, parse_key};
use crate::output;

/// Run the discard command. Discarding an unknown draft is not an error.
pub fn run(config: &Path, key: &str) -> Result<()> {
    let key = parse_key(key)?;
    let session = Session::open(config)?;
    let workflow = session.workflow();

    session.rt.block_on(workflow.discard(&key))?;
    output::success(&format!("Discarded {key}"));
    Ok(())
}
