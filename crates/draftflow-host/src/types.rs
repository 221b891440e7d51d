//! Host API types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Content address of a blob, tree or commit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    /// Wrap a host-provided address.
    #[must_use]
    pub fn new(sha: impl Into<String>) -> Self {
        Self(sha.into())
    }

    /// Get the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjectId {
    fn from(sha: &str) -> Self {
        Self(sha.to_string())
    }
}

impl From<String> for ObjectId {
    fn from(sha: String) -> Self {
        Self(sha)
    }
}

impl PartialEq<str> for ObjectId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ObjectId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Build the ref name for a branch (`heads/<name>`).
#[must_use]
pub fn branch_ref(branch: &str) -> String {
    format!("heads/{branch}")
}

/// A named ref and the object it points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefInfo {
    /// Ref name without the `refs/` prefix (e.g. `heads/main`).
    pub name: String,

    /// Object the ref points at.
    pub sha: ObjectId,
}

impl RefInfo {
    /// Branch name if this is a `heads/` ref.
    #[must_use]
    pub fn branch_name(&self) -> Option<&str> {
        self.name
            .strip_prefix("refs/")
            .unwrap_or(&self.name)
            .strip_prefix("heads/")
    }
}

/// Author or committer identity attached to a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub name: String,
    pub email: String,
    pub date: DateTime<Utc>,
}

/// An immutable commit on the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    /// Commit address.
    pub sha: ObjectId,

    /// Full commit message.
    pub message: String,

    /// Parent addresses, first parent first.
    pub parents: Vec<ObjectId>,

    /// Root tree address.
    pub tree: ObjectId,

    pub author: Signature,

    pub committer: Signature,
}

impl Commit {
    /// The first parent, if any.
    #[must_use]
    pub fn first_parent(&self) -> Option<&ObjectId> {
        self.parents.first()
    }
}

/// Request to create a commit.
#[derive(Debug, Clone, Serialize)]
pub struct CreateCommit {
    pub message: String,

    pub tree: ObjectId,

    pub parents: Vec<ObjectId>,

    /// Author (host default when `None`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<Signature>,

    /// Committer (host default when `None`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub committer: Option<Signature>,
}

/// A branch and its head commit.
#[derive(Debug, Clone)]
pub struct Branch {
    pub name: String,
    pub commit: Commit,
}

/// Git file mode of a tree entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileMode {
    /// Regular file.
    #[default]
    #[serde(rename = "100644")]
    File,
    /// Executable file.
    #[serde(rename = "100755")]
    Executable,
    /// Symbolic link.
    #[serde(rename = "120000")]
    Symlink,
    /// Subdirectory.
    #[serde(rename = "040000")]
    Directory,
    /// Submodule commit.
    #[serde(rename = "160000")]
    Submodule,
}

/// Kind of object a tree entry points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Blob,
    Tree,
    Commit,
}

/// One entry of a tree object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    /// Entry name relative to its tree.
    pub path: String,

    pub mode: FileMode,

    #[serde(rename = "type")]
    pub kind: EntryKind,

    pub sha: ObjectId,
}

impl TreeEntry {
    /// A regular-file blob entry.
    #[must_use]
    pub fn blob(path: impl Into<String>, sha: ObjectId) -> Self {
        Self {
            path: path.into(),
            mode: FileMode::File,
            kind: EntryKind::Blob,
            sha,
        }
    }

    /// A subtree entry.
    #[must_use]
    pub fn tree(path: impl Into<String>, sha: ObjectId) -> Self {
        Self {
            path: path.into(),
            mode: FileMode::Directory,
            kind: EntryKind::Tree,
            sha,
        }
    }

    /// Whether this entry is a subtree.
    #[must_use]
    pub fn is_tree(&self) -> bool {
        self.kind == EntryKind::Tree
    }
}

/// A tree object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tree {
    /// Tree address. Empty for the implicit empty tree.
    pub sha: ObjectId,

    #[serde(rename = "tree")]
    pub entries: Vec<TreeEntry>,
}

impl Tree {
    /// Find an entry by name.
    #[must_use]
    pub fn entry(&self, name: &str) -> Option<&TreeEntry> {
        self.entries.iter().find(|e| e.path == name)
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self(String::new())
    }
}

/// How to locate a blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobLocator {
    /// By content address.
    Sha(ObjectId),
    /// By path at the tip of a branch.
    Path { branch: String, path: String },
}

/// Kind of change made by a single-blob commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Add,
    Edit,
    Delete,
}

/// Request to commit a single blob directly onto a branch.
///
/// The branch is created when it does not exist yet.
#[derive(Debug, Clone)]
pub struct BlobCommit {
    pub branch: String,
    pub path: String,
    /// Ignored for [`ChangeKind::Delete`].
    pub content: Vec<u8>,
    pub message: String,
    pub change: ChangeKind,
}

/// State of a review request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewState {
    /// Review is open.
    Open,
    /// Review was closed without merging.
    Closed,
    /// Review was merged.
    Merged,
}

/// A review request (pull request) between two branches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    /// Review number.
    pub number: u64,

    pub title: String,

    pub state: ReviewState,

    /// Source branch name.
    pub head_branch: String,

    /// Source branch head commit.
    pub head_sha: ObjectId,

    /// Target branch name.
    pub base_branch: String,

    pub html_url: String,
}

/// Request to open a review.
#[derive(Debug, Clone, Serialize)]
pub struct CreateReview {
    pub title: String,
    pub body: String,
    /// Source branch.
    pub head: String,
    /// Target branch.
    pub base: String,
}

/// Method used to merge a review.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMethod {
    /// Create a merge commit.
    #[default]
    Merge,
    /// Squash all commits into one.
    Squash,
    /// Rebase commits onto base.
    Rebase,
}

/// Request to merge a review.
#[derive(Debug, Clone, Serialize)]
pub struct MergeReview {
    /// Commit message (for squash/merge).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_message: Option<String>,

    /// Expected head; the host refuses the merge if the head moved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<ObjectId>,

    pub merge_method: MergeMethod,
}

/// Result of merging a review.
#[derive(Debug, Clone, Deserialize)]
pub struct MergeResult {
    /// Address of the merge commit.
    pub sha: ObjectId,

    pub merged: bool,

    pub message: String,
}

/// Outcome reported by a commit status check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusState {
    Pending,
    Success,
    Failure,
    Error,
}

/// A status reported against a commit, such as a deploy preview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitStatus {
    /// Label identifying the reporter (`deploy/preview`).
    pub context: String,

    pub state: StatusState,

    #[serde(default)]
    pub target_url: Option<String>,

    #[serde(default)]
    pub description: Option<String>,
}
