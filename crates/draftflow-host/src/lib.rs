//! # draftflow-host
//!
//! Host API abstraction for draftflow. The [`HostApi`] trait exposes the
//! ref, tree, blob, commit, branch and review-request primitives the
//! editorial workflow is built on; [`HttpHost`] implements it against a
//! GitHub-compatible REST API.
//!
//! # Security
//!
//! Authentication tokens are stored using `SecretString` which automatically
//! zeroizes memory when dropped, reducing credential exposure in memory dumps.

mod auth;
mod client;
mod error;
mod traits;
mod types;

pub use auth::Auth;
pub use client::HttpHost;
pub use error::{Error, Result};
// Re-export SecretString for constructing Auth::Token
pub use secrecy::SecretString;
pub use traits::HostApi;
pub use types::{
    BlobCommit, BlobLocator, Branch, ChangeKind, Commit, CommitStatus, CreateCommit, CreateReview,
    EntryKind, FileMode, MergeMethod, MergeResult, MergeReview, ObjectId, RefInfo, Review,
    ReviewState, Signature, StatusState, Tree, TreeEntry, branch_ref,
};
