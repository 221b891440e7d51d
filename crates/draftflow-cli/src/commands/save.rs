//! `draftflow save` command - Persist an entry as a draft.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use draftflow_core::{EntryChange, FileItem, PersistOptions};

use super::SaveArgs;
use super::utils::{Session, parse_key};
use crate::output;

/// Run the save command.
pub fn run(config: &Path, args: &SaveArgs) -> Result<()> {
    let key = parse_key(&args.key)?;

    let entry = match (&args.content, &args.from) {
        (Some(text), _) => FileItem::text(&args.entry, text.as_str()),
        (None, Some(local)) => {
            let text = fs::read_to_string(local)
                .with_context(|| format!("Failed to read {}", local.display()))?;
            FileItem::text(&args.entry, text)
        }
        (None, None) => bail!("Provide the entry with --content or --from"),
    };

    let mut change = EntryChange::new(key.clone(), entry);
    for attachment in &args.attachments {
        change = change.with_file(read_attachment(attachment)?);
    }
    change.title.clone_from(&args.title);
    change.description.clone_from(&args.description);
    change.collection.clone_from(&args.collection);
    change.user.clone_from(&args.user);

    let message = args
        .message
        .clone()
        .unwrap_or_else(|| format!("Update {}", args.entry));

    let session = Session::open(config)?;
    let workflow = session.workflow();

    if args.direct {
        let commit = session
            .rt
            .block_on(workflow.persist_direct(&change, &message))?;
        output::success(&format!(
            "Committed {} to {}",
            args.entry, session.config.workflow.base_branch
        ));
        output::essential(commit.sha.as_str());
        return Ok(());
    }

    let mut options = PersistOptions::new(message);
    options.status = args.status;
    let saved = session.rt.block_on(workflow.persist(&change, &options))?;

    let review = output::review_ref(saved.record.review.number, saved.record.status);
    if saved.opened {
        output::success(&format!("Opened draft {key} as {review}"));
    } else {
        output::success(&format!("Updated draft {key} ({review})"));
    }
    output::detail(&format!("  branch: {}", saved.record.branch));
    output::essential(saved.record.review.head.as_str());

    Ok(())
}

/// Read an attachment given as `REPO_PATH=LOCAL_PATH`.
fn read_attachment(attachment: &str) -> Result<FileItem> {
    let Some((repo_path, local)) = attachment.split_once('=') else {
        bail!("Invalid attachment '{attachment}' - expected REPO_PATH=LOCAL_PATH");
    };
    if repo_path.is_empty() || local.is_empty() {
        bail!("Invalid attachment '{attachment}' - expected REPO_PATH=LOCAL_PATH");
    }

    let bytes = fs::read(local).with_context(|| format!("Failed to read attachment {local}"))?;
    Ok(FileItem::binary(repo_path, bytes))
}
