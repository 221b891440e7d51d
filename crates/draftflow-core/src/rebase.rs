//! Rebase engine: re-parents a linear run of review commits onto a new base.
//!
//! Review branches only ever receive commits that rewrite the tracked
//! files of one entry, so a rebase does not need a three-way merge. Each
//! commit's tracked blobs are patched onto the previous result, oldest
//! first, keeping the original message, author and committer.

use draftflow_host::{Commit, CreateCommit, HostApi};

use crate::error::{Error, Result};
use crate::tree::{FileItem, FileTree, TreeBuilder};

/// Rebases the commits of one review branch.
pub struct RebaseEngine<'a, H: HostApi> {
    host: &'a H,
    branch: &'a str,
}

impl<'a, H: HostApi> RebaseEngine<'a, H> {
    /// Create a rebase engine for `branch`.
    #[must_use]
    pub const fn new(host: &'a H, branch: &'a str) -> Self {
        Self { host, branch }
    }

    /// Rebase commits that each touch the single file `tracked_path`.
    ///
    /// # Errors
    /// Returns [`Error::UnexpectedBranchState`] if a commit lacks the file.
    pub async fn rebase_single_file_commits(
        &self,
        base: &Commit,
        commits: &[Commit],
        tracked_path: &str,
    ) -> Result<Commit> {
        self.rebase_tracked_commits(base, commits, &[tracked_path.to_string()])
            .await
    }

    /// Rebase `commits` (oldest first) onto `base`, carrying `paths`.
    ///
    /// An empty run yields `base`. A run whose first commit already sits on
    /// `base` is returned unchanged without touching the host. A path missing
    /// from a commit is skipped for that commit.
    ///
    /// # Errors
    /// Returns [`Error::UnexpectedBranchState`] if a commit contains none of
    /// the tracked paths, or the host error.
    pub async fn rebase_tracked_commits(
        &self,
        base: &Commit,
        commits: &[Commit],
        paths: &[String],
    ) -> Result<Commit> {
        let (Some(first), Some(last)) = (commits.first(), commits.last()) else {
            return Ok(base.clone());
        };
        if first.first_parent() == Some(&base.sha) {
            tracing::debug!(branch = self.branch, "already based on {}", base.sha);
            return Ok(last.clone());
        }

        let builder = TreeBuilder::new(self.host);
        let mut parent = base.clone();

        for commit in commits {
            let mut overlay = FileTree::new();
            for path in paths {
                match builder.find_entry(&commit.tree, path).await? {
                    Some(entry) if !entry.is_tree() => {
                        overlay.insert(FileItem::stored(path.as_str(), entry.sha))?;
                    }
                    _ => {}
                }
            }
            if overlay.is_empty() {
                return Err(Error::UnexpectedBranchState {
                    branch: self.branch.to_string(),
                    reason: format!("commit {} does not contain any tracked file", commit.sha),
                });
            }

            let tree = builder.merge_tree(Some(&parent.tree), "", &overlay).await?;
            parent = self
                .host
                .create_commit(CreateCommit {
                    message: commit.message.clone(),
                    tree: tree.sha,
                    parents: vec![parent.sha.clone()],
                    author: Some(commit.author.clone()),
                    committer: Some(commit.committer.clone()),
                })
                .await?;
            tracing::debug!(branch = self.branch, from = %commit.sha, to = %parent.sha, "rebased commit");
        }

        Ok(parent)
    }
}

/// Check that `expected_head` is, or directly follows, the last listed commit.
///
/// Returns the commit list with `expected_head` appended when it is not
/// listed yet. An empty listing yields just `expected_head`.
///
/// # Errors
/// Returns [`Error::UnexpectedBranchState`] when the listing does not end
/// at or right before `expected_head`.
pub fn assert_head_reachable(
    branch: &str,
    mut commits: Vec<Commit>,
    expected_head: &Commit,
) -> Result<Vec<Commit>> {
    let Some(last) = commits.last() else {
        return Ok(vec![expected_head.clone()]);
    };

    if expected_head.first_parent() == Some(&last.sha) {
        commits.push(expected_head.clone());
        Ok(commits)
    } else if expected_head.sha == last.sha {
        Ok(commits)
    } else {
        Err(Error::UnexpectedBranchState {
            branch: branch.to_string(),
            reason: format!(
                "head {} does not follow the last listed commit {}",
                expected_head.sha, last.sha
            ),
        })
    }
}
