//! # draftflow-core
//!
//! Core library for draftflow, an editorial workflow engine over a
//! Git-like content host.
//!
//! # Architecture
//!
//! - [`tree`]: composes changed files into nested trees and persists them
//!   as patches over existing host trees
//! - [`rebase`]: replays a review branch's commits onto a moved base
//! - [`metadata`] and [`cache`]: per-entry tracking records on the metadata
//!   branch, fronted by a time-bounded cache
//! - [`workflow`]: the controller that opens, updates, publishes and
//!   discards drafts
//!
//! Everything is generic over [`draftflow_host::HostApi`].

pub mod branch_name;
pub mod cache;
pub mod config;
pub mod error;
pub mod metadata;
pub mod rebase;
pub mod tree;
pub mod workflow;

#[cfg(test)]
mod test_mocks;

pub use branch_name::{BranchName, CMS_BRANCH_PREFIX, ContentKey, METADATA_BRANCH};
pub use cache::MetadataCache;
pub use config::Config;
pub use error::{Error, Result};
pub use metadata::{MetadataRecord, MetadataStore, TrackedFile, WorkflowStatus};
pub use rebase::RebaseEngine;
pub use tree::{FileContent, FileItem, FileTree, TreeBuilder, compose_tree};
pub use workflow::{Draft, EditorialWorkflow, EntryChange, PersistOptions, SavedDraft};
