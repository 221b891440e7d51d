//! `draftflow list` command - List unpublished drafts.

use std::path::Path;

use anyhow::Result;
use draftflow_core::MetadataRecord;
use serde::Serialize;

use super::utils::Session;
use crate::output;

#[derive(Serialize)]
struct JsonOutput {
    drafts: Vec<MetadataRecord>,
}

/// Run the list command.
pub fn run(config: &Path, json: bool) -> Result<()> {
    let session = Session::open(config)?;
    let workflow = session.workflow();

    let drafts = session.rt.block_on(async {
        let mut drafts = Vec::new();
        for key in workflow.list_unpublished().await? {
            match workflow.metadata().retrieve(&key).await? {
                Some(record) => drafts.push(record),
                None => tracing::warn!(%key, "open review without metadata"),
            }
        }
        anyhow::Ok(drafts)
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&JsonOutput { drafts })?);
        return Ok(());
    }

    if drafts.is_empty() {
        output::info("No unpublished drafts.");
        return Ok(());
    }

    for record in &drafts {
        let title = record.title.as_deref().unwrap_or(&record.objects.entry.path);
        output::essential(&format!(
            "{} {} {} {title}",
            output::review_ref(record.review.number, record.status),
            output::status_label(record.status),
            record.key,
        ));
    }
    Ok(())
}
