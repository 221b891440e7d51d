//! Command definitions and dispatch targets.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use draftflow_core::WorkflowStatus;

pub mod delete;
pub mod discard;
pub mod init;
pub mod list;
pub mod publish;
pub mod save;
pub mod status;
pub mod utils;

/// draftflow - editorial workflow for content stored in a Git repository.
///
/// Drafts live on `cms/<key>` branches with an open review request each;
/// publishing merges the review into the base branch.
#[derive(Debug, Parser)]
#[command(name = "draftflow", version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true, default_value = "draftflow.toml")]
    pub config: PathBuf,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress informational output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Write a configuration file for a repository.
    Init {
        /// Repository owner.
        #[arg(long)]
        owner: String,

        /// Repository name.
        #[arg(long)]
        repo: String,

        /// Branch that reviews target.
        #[arg(long)]
        base_branch: Option<String>,

        /// API URL of a self-hosted instance.
        #[arg(long)]
        api_url: Option<String>,

        /// Overwrite an existing configuration file.
        #[arg(long)]
        force: bool,
    },

    /// Save an entry as a draft, opening a review on first save.
    Save(SaveArgs),

    /// Show the workflow state of a draft.
    Status {
        /// Content key of the entry.
        key: String,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Move a draft to another workflow status.
    #[command(name = "set-status")]
    SetStatus {
        /// Content key of the entry.
        key: String,

        /// New status: draft, pending_review or pending_publish.
        status: WorkflowStatus,
    },

    /// Merge a draft into the base branch.
    Publish {
        /// Content key of the entry.
        key: String,
    },

    /// Close a draft's review and delete its branch.
    Discard {
        /// Content key of the entry.
        key: String,
    },

    /// Delete a file from a branch with a single commit.
    Delete {
        /// Repository path of the file.
        path: String,

        /// Branch to delete from (the base branch by default).
        #[arg(long)]
        branch: Option<String>,

        /// Commit message.
        #[arg(short, long)]
        message: Option<String>,
    },

    /// List drafts with an open review.
    #[command(alias = "ls")]
    List {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Args)]
pub struct SaveArgs {
    /// Content key of the entry.
    pub key: String,

    /// Repository path of the entry file.
    #[arg(long)]
    pub entry: String,

    /// Read the entry content from a local file.
    #[arg(long, conflicts_with = "content", required_unless_present = "content")]
    pub from: Option<PathBuf>,

    /// Entry content given inline.
    #[arg(long)]
    pub content: Option<String>,

    /// Attach a media file as `REPO_PATH=LOCAL_PATH`. Repeatable.
    #[arg(long = "attach", value_name = "REPO_PATH=LOCAL_PATH")]
    pub attachments: Vec<String>,

    /// Commit message.
    #[arg(short, long)]
    pub message: Option<String>,

    /// Entry title recorded in the draft's metadata.
    #[arg(long)]
    pub title: Option<String>,

    /// Entry description.
    #[arg(long)]
    pub description: Option<String>,

    /// Collection the entry belongs to.
    #[arg(long)]
    pub collection: Option<String>,

    /// User recorded as the draft's author.
    #[arg(long)]
    pub user: Option<String>,

    /// Status to record instead of the configured initial status.
    #[arg(long)]
    pub status: Option<WorkflowStatus>,

    /// Commit straight onto the base branch without opening a draft.
    #[arg(long, conflicts_with = "status")]
    pub direct: bool,
}
