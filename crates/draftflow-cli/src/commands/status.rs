//! `draftflow status` command - Display and change a draft's workflow state.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use draftflow_core::{Draft, MetadataRecord, WorkflowStatus};
use draftflow_host::CommitStatus;
use serde::Serialize;

use super::utils::{Session, parse_key};
use crate::output;

/// Run the status command.
pub fn run(config: &Path, key: &str, json: bool) -> Result<()> {
    let key = parse_key(key)?;
    let session = Session::open(config)?;
    let workflow = session.workflow();

    let draft = session
        .rt
        .block_on(workflow.read_draft(&key))
        .with_context(|| format!("Failed to read draft {key}"))?;
    let checks = session
        .rt
        .block_on(workflow.draft_statuses(&key))
        .with_context(|| format!("Failed to read checks for {key}"))?;

    if json {
        let out = JsonOutput {
            record: &draft.record,
            is_modification: draft.is_modification,
            checks: &checks,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print_draft(&draft, &checks);
    }

    Ok(())
}

/// Run the set-status command.
pub fn run_set(config: &Path, key: &str, status: WorkflowStatus) -> Result<()> {
    let key = parse_key(key)?;
    let session = Session::open(config)?;
    let workflow = session.workflow();

    let record = session.rt.block_on(workflow.set_status(&key, status))?;
    output::success(&format!(
        "{key} is now {}",
        output::status_label(record.status)
    ));

    Ok(())
}

fn print_draft(draft: &Draft, checks: &[CommitStatus]) {
    let record = &draft.record;

    output::info(&format!(
        "{} {} {}",
        record.key,
        output::review_ref(record.review.number, record.status),
        output::status_label(record.status)
    ));
    output::hr();
    if let Some(title) = &record.title {
        output::detail(&format!("  title:      {title}"));
    }
    if let Some(collection) = &record.collection {
        output::detail(&format!("  collection: {collection}"));
    }
    output::detail(&format!("  branch:     {}", record.branch));
    output::detail(&format!(
        "  entry:      {}{}",
        record.objects.entry.path,
        if draft.is_modification { "" } else { " (new)" }
    ));
    for file in &draft.files {
        output::detail(&format!("  file:       {}", file.path));
    }
    output::detail(&format!(
        "  updated:    {}",
        record.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M")
    ));
    for check in checks {
        let link = check
            .target_url
            .as_deref()
            .map(|url| format!(" {url}"))
            .unwrap_or_default();
        output::detail(&format!(
            "  check:      {} {}{link}",
            check.context,
            output::check_label(check.state)
        ));
    }
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    #[serde(flatten)]
    record: &'a MetadataRecord,
    is_modification: bool,
    checks: &'a [CommitStatus],
}
