//! In-memory host for testing the workflow without a network.
//!
//! Objects are named by counters rather than content hashes, which is
//! enough for the workflow: it never derives addresses itself.

#![allow(clippy::unwrap_used)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use chrono::{TimeZone, Utc};
use draftflow_host::{
    BlobCommit, BlobLocator, Branch, ChangeKind, Commit, CommitStatus, CreateCommit, CreateReview,
    Error as HostError, FileMode, HostApi, MergeResult, MergeReview, ObjectId, RefInfo,
    Result as HostResult, Review, ReviewState, Signature, Tree, TreeEntry, branch_ref,
};

use crate::branch_name::{BranchName, ContentKey};
use crate::metadata::{MetadataRecord, ReviewRef, TrackedFile, TrackedObjects, WorkflowStatus};

/// A fixed signature for test commits.
pub fn signature(name: &str) -> Signature {
    Signature {
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase()),
        date: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
    }
}

/// A minimal record for `key` tracking `posts/<key>.md`.
pub fn sample_record(key: &str) -> MetadataRecord {
    let key = ContentKey::new(key).unwrap();
    MetadataRecord {
        branch: BranchName::for_entry(&key),
        objects: TrackedObjects {
            entry: TrackedFile {
                path: format!("posts/{key}.md"),
                sha: ObjectId::from("blob-entry"),
            },
            files: Vec::new(),
        },
        key,
        status: WorkflowStatus::PendingReview,
        review: ReviewRef {
            number: 1,
            head: ObjectId::from("commit-head"),
        },
        user: None,
        collection: Some("posts".into()),
        title: Some("Sample".into()),
        description: None,
        timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
    }
}

#[derive(Default)]
struct State {
    next_id: u64,
    blobs: HashMap<ObjectId, Vec<u8>>,
    trees: HashMap<ObjectId, Tree>,
    commits: HashMap<ObjectId, Commit>,
    /// Ref name (`heads/<branch>`) to commit.
    refs: BTreeMap<String, ObjectId>,
    reviews: BTreeMap<u64, Review>,
    statuses: HashMap<ObjectId, Vec<CommitStatus>>,
    merge_rejected: bool,
    /// Single-blob commits that fail with `NotFound` before any succeed.
    failing_blob_commits: usize,
    auto_delete_merged: bool,
    last_change: Option<ChangeKind>,
}

impl State {
    fn next(&mut self, kind: &str) -> ObjectId {
        self.next_id += 1;
        ObjectId::new(format!("{kind}-{}", self.next_id))
    }

    fn tree(&self, sha: &ObjectId) -> HostResult<Tree> {
        self.trees
            .get(sha)
            .cloned()
            .ok_or_else(|| HostError::NotFound(format!("tree {sha}")))
    }

    fn commit(&self, sha: &ObjectId) -> HostResult<Commit> {
        self.commits
            .get(sha)
            .cloned()
            .ok_or_else(|| HostError::NotFound(format!("commit {sha}")))
    }

    fn head(&self, branch: &str) -> HostResult<ObjectId> {
        self.refs
            .get(&branch_ref(branch))
            .cloned()
            .ok_or_else(|| HostError::NotFound(format!("branch {branch}")))
    }

    fn store_tree(&mut self, mut entries: Vec<TreeEntry>) -> ObjectId {
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        let sha = self.next("tree");
        self.trees.insert(sha.clone(), Tree {
            sha: sha.clone(),
            entries,
        });
        sha
    }

    /// Write (or delete, with `leaf = None`) a nested path under `base`.
    fn write_path(
        &mut self,
        base: Option<&ObjectId>,
        segments: &[&str],
        leaf: Option<TreeEntry>,
    ) -> HostResult<ObjectId> {
        let mut entries = match base {
            Some(sha) => self.tree(sha)?.entries,
            None => Vec::new(),
        };
        let Some((name, rest)) = segments.split_first() else {
            return Err(HostError::InvalidContent("empty path".into()));
        };
        let existing = entries.iter().position(|e| e.path == *name);

        if rest.is_empty() {
            match (leaf, existing) {
                (Some(mut entry), Some(i)) => {
                    entry.path = (*name).to_string();
                    entries[i] = entry;
                }
                (Some(mut entry), None) => {
                    entry.path = (*name).to_string();
                    entries.push(entry);
                }
                (None, Some(i)) => {
                    entries.remove(i);
                }
                (None, None) => return Err(HostError::NotFound(format!("path {name}"))),
            }
        } else {
            let sub_base = existing
                .map(|i| &entries[i])
                .filter(|e| e.is_tree())
                .map(|e| e.sha.clone());
            let sub = self.write_path(sub_base.as_ref(), rest, leaf)?;
            let entry = TreeEntry::tree(*name, sub);
            match existing {
                Some(i) => entries[i] = entry,
                None => entries.push(entry),
            }
        }

        Ok(self.store_tree(entries))
    }

    fn read_path(&self, tree: &ObjectId, path: &str) -> HostResult<Vec<u8>> {
        let missing = || HostError::NotFound(format!("file {path}"));
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let (name, dirs) = segments.split_last().ok_or_else(missing)?;

        let mut current = self.tree(tree)?;
        for dir in dirs {
            let next = current
                .entry(dir)
                .filter(|e| e.is_tree())
                .ok_or_else(missing)?
                .sha
                .clone();
            current = self.tree(&next)?;
        }
        let entry = current.entry(name).filter(|e| !e.is_tree()).ok_or_else(missing)?;
        self.blobs.get(&entry.sha).cloned().ok_or_else(missing)
    }

    fn make_commit(&mut self, request: CreateCommit) -> Commit {
        let sha = self.next("commit");
        let author = request.author.unwrap_or_else(|| signature("Host"));
        let commit = Commit {
            sha: sha.clone(),
            message: request.message,
            parents: request.parents,
            tree: request.tree,
            committer: request.committer.unwrap_or_else(|| author.clone()),
            author,
        };
        self.commits.insert(sha, commit.clone());
        commit
    }

    fn ancestors(&self, sha: &ObjectId) -> HashSet<ObjectId> {
        let mut seen = HashSet::new();
        let mut stack = vec![sha.clone()];
        while let Some(next) = stack.pop() {
            if seen.insert(next.clone()) {
                if let Some(commit) = self.commits.get(&next) {
                    stack.extend(commit.parents.iter().cloned());
                }
            }
        }
        seen
    }

    /// Commit one file change directly onto `branch`, creating it if needed.
    fn commit_blob(&mut self, commit: BlobCommit, author: Option<Signature>) -> HostResult<ObjectId> {
        let parent = self.refs.get(&branch_ref(&commit.branch)).cloned();
        let base_tree = match &parent {
            Some(sha) => Some(self.commit(sha)?.tree),
            None => None,
        };

        let leaf = match commit.change {
            ChangeKind::Delete => None,
            ChangeKind::Add | ChangeKind::Edit => {
                let blob = self.next("blob");
                self.blobs.insert(blob.clone(), commit.content);
                Some(TreeEntry::blob("", blob))
            }
        };
        let segments: Vec<&str> = commit.path.split('/').filter(|s| !s.is_empty()).collect();
        let tree = self.write_path(base_tree.as_ref(), &segments, leaf)?;

        let created = self.make_commit(CreateCommit {
            message: commit.message,
            tree,
            parents: parent.into_iter().collect(),
            author: author.clone(),
            committer: author,
        });
        self.refs.insert(branch_ref(&commit.branch), created.sha.clone());
        self.last_change = Some(commit.change);
        Ok(created.sha)
    }
}

/// In-memory [`HostApi`] with call counters.
#[derive(Default)]
pub struct MockHost {
    state: Mutex<State>,
    calls: Mutex<HashMap<&'static str, usize>>,
}

impl MockHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    fn record(&self, op: &'static str) {
        *self.calls.lock().unwrap().entry(op).or_default() += 1;
    }

    /// Number of times a host operation was called.
    pub fn calls(&self, op: &str) -> usize {
        self.calls.lock().unwrap().get(op).copied().unwrap_or(0)
    }

    /// Seed a branch with one commit containing `files`.
    pub fn with_branch(self, name: &str, files: &[(&str, &str)]) -> Self {
        {
            let mut state = self.state();
            let mut tree: Option<ObjectId> = None;
            for (path, content) in files {
                let blob = state.next("blob");
                state.blobs.insert(blob.clone(), content.as_bytes().to_vec());
                let segments: Vec<&str> = path.split('/').collect();
                tree = Some(
                    state
                        .write_path(tree.as_ref(), &segments, Some(TreeEntry::blob("", blob)))
                        .unwrap(),
                );
            }
            let tree = tree.unwrap_or_else(|| state.store_tree(Vec::new()));
            let commit = state.make_commit(CreateCommit {
                message: "Initial commit".into(),
                tree,
                parents: Vec::new(),
                author: None,
                committer: None,
            });
            state.refs.insert(branch_ref(name), commit.sha);
        }
        self
    }

    /// Refuse every review merge.
    pub fn with_merge_rejected(self) -> Self {
        self.state().merge_rejected = true;
        self
    }

    /// Delete a review's branch when it is merged.
    pub fn with_auto_delete_merged(self) -> Self {
        self.state().auto_delete_merged = true;
        self
    }

    /// Make the next single-blob commit fail as if its branch vanished.
    pub fn fail_next_blob_commit(&self) {
        self.state().failing_blob_commits += 1;
    }

    /// Report `statuses` against a commit.
    pub fn set_statuses(&self, sha: &ObjectId, statuses: Vec<CommitStatus>) {
        self.state().statuses.insert(sha.clone(), statuses);
    }

    /// Commit a file straight onto a branch.
    pub fn commit_file(&self, branch: &str, path: &str, content: &str) -> ObjectId {
        self.commit_file_as(branch, path, content, signature("Host"))
    }

    /// Commit a file straight onto a branch with a given author.
    pub fn commit_file_as(
        &self,
        branch: &str,
        path: &str,
        content: &str,
        author: Signature,
    ) -> ObjectId {
        let mut state = self.state();
        let exists = state
            .head(branch)
            .and_then(|head| state.commit(&head))
            .is_ok_and(|commit| state.read_path(&commit.tree, path).is_ok());
        state
            .commit_blob(
                BlobCommit {
                    branch: branch.to_string(),
                    path: path.to_string(),
                    content: content.as_bytes().to_vec(),
                    message: format!("Write {path}"),
                    change: if exists {
                        ChangeKind::Edit
                    } else {
                        ChangeKind::Add
                    },
                },
                Some(author),
            )
            .unwrap()
    }

    /// Point a new branch at `sha`.
    pub fn create_branch_at(&self, name: &str, sha: &ObjectId) {
        self.state().refs.insert(branch_ref(name), sha.clone());
    }

    /// Delete a branch behind the workflow's back.
    pub fn remove_branch(&self, name: &str) {
        self.state().refs.remove(&branch_ref(name));
    }

    pub fn branch_head(&self, name: &str) -> Option<ObjectId> {
        self.state().head(name).ok()
    }

    pub fn branch_commit(&self, name: &str) -> Option<Commit> {
        let state = self.state();
        state.head(name).and_then(|sha| state.commit(&sha)).ok()
    }

    pub fn branch_tree(&self, name: &str) -> Option<ObjectId> {
        self.branch_commit(name).map(|c| c.tree)
    }

    pub fn commit(&self, sha: &ObjectId) -> Option<Commit> {
        self.state().commit(sha).ok()
    }

    /// Read a file from a tree as UTF-8.
    pub fn read_file(&self, tree: &ObjectId, path: &str) -> Option<String> {
        let bytes = self.state().read_path(tree, path).ok()?;
        String::from_utf8(bytes).ok()
    }

    /// Read a file at the tip of a branch as UTF-8.
    pub fn file_on_branch(&self, branch: &str, path: &str) -> Option<String> {
        let tree = self.branch_tree(branch)?;
        self.read_file(&tree, path)
    }

    /// First-parent history of `branch` after `since`, oldest first.
    pub fn history_since(&self, branch: &str, since: &ObjectId) -> Vec<Commit> {
        let state = self.state();
        let mut out = Vec::new();
        let mut cursor = state.head(branch).ok();
        while let Some(sha) = cursor {
            if sha == *since {
                break;
            }
            let Ok(commit) = state.commit(&sha) else {
                break;
            };
            cursor = commit.first_parent().cloned();
            out.push(commit);
        }
        out.reverse();
        out
    }

    /// Change a file's mode in place at the tip of a branch.
    pub fn set_mode(&self, branch: &str, path: &str, mode: FileMode) {
        let mut state = self.state();
        let mut tree_sha = state.commit(&state.head(branch).unwrap()).unwrap().tree;
        let segments: Vec<&str> = path.split('/').collect();
        let (name, dirs) = segments.split_last().unwrap();
        for dir in dirs {
            tree_sha = state.tree(&tree_sha).unwrap().entry(dir).unwrap().sha.clone();
        }
        let tree = state.trees.get_mut(&tree_sha).unwrap();
        let entry = tree.entries.iter_mut().find(|e| e.path == *name).unwrap();
        entry.mode = mode;
    }

    pub fn review(&self, number: u64) -> Option<Review> {
        self.state().reviews.get(&number).cloned()
    }

    pub fn set_review_state(&self, number: u64, review_state: ReviewState) {
        if let Some(review) = self.state().reviews.get_mut(&number) {
            review.state = review_state;
        }
    }

    /// Change kind of the last single-blob commit.
    pub fn last_change(&self) -> Option<ChangeKind> {
        self.state().last_change
    }
}

impl HostApi for MockHost {
    async fn get_ref(&self, ref_name: &str) -> HostResult<Option<RefInfo>> {
        self.record("get_ref");
        Ok(self.state().refs.get(ref_name).map(|sha| RefInfo {
            name: ref_name.to_string(),
            sha: sha.clone(),
        }))
    }

    async fn create_ref(&self, ref_name: &str, sha: &ObjectId) -> HostResult<RefInfo> {
        self.record("create_ref");
        let mut state = self.state();
        if state.refs.contains_key(ref_name) {
            return Err(HostError::ApiError {
                status: 422,
                message: "Reference already exists".into(),
            });
        }
        state.refs.insert(ref_name.to_string(), sha.clone());
        Ok(RefInfo {
            name: ref_name.to_string(),
            sha: sha.clone(),
        })
    }

    async fn update_ref(&self, ref_name: &str, sha: &ObjectId, force: bool) -> HostResult<RefInfo> {
        self.record("update_ref");
        let mut state = self.state();
        let current = state
            .refs
            .get(ref_name)
            .cloned()
            .ok_or_else(|| HostError::NotFound(ref_name.to_string()))?;
        if !force && !state.ancestors(sha).contains(&current) {
            return Err(HostError::ApiError {
                status: 422,
                message: "Update is not a fast forward".into(),
            });
        }
        state.refs.insert(ref_name.to_string(), sha.clone());
        Ok(RefInfo {
            name: ref_name.to_string(),
            sha: sha.clone(),
        })
    }

    async fn delete_ref(&self, ref_name: &str) -> HostResult<()> {
        self.record("delete_ref");
        self.state()
            .refs
            .remove(ref_name)
            .map(|_| ())
            .ok_or_else(|| HostError::NotFound(ref_name.to_string()))
    }

    async fn list_branches(&self, prefix: &str) -> HostResult<Vec<RefInfo>> {
        self.record("list_branches");
        let wanted = branch_ref(prefix);
        Ok(self
            .state()
            .refs
            .iter()
            .filter(|(name, _)| name.starts_with(&wanted))
            .map(|(name, sha)| RefInfo {
                name: name.clone(),
                sha: sha.clone(),
            })
            .collect())
    }

    async fn get_tree(&self, sha: &ObjectId) -> HostResult<Tree> {
        self.record("get_tree");
        self.state().tree(sha)
    }

    async fn create_tree(&self, base: Option<&ObjectId>, entries: Vec<TreeEntry>) -> HostResult<Tree> {
        self.record("create_tree");
        let mut state = self.state();
        let mut current = base.cloned();
        for entry in entries {
            let path = entry.path.clone();
            let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
            current = Some(state.write_path(current.as_ref(), &segments, Some(entry))?);
        }
        let sha = match current {
            Some(sha) => sha,
            None => state.store_tree(Vec::new()),
        };
        state.tree(&sha)
    }

    async fn get_blob(&self, locator: &BlobLocator) -> HostResult<Vec<u8>> {
        self.record("get_blob");
        let state = self.state();
        match locator {
            BlobLocator::Sha(sha) => state
                .blobs
                .get(sha)
                .cloned()
                .ok_or_else(|| HostError::NotFound(format!("blob {sha}"))),
            BlobLocator::Path { branch, path } => {
                let commit = state.commit(&state.head(branch)?)?;
                state.read_path(&commit.tree, path)
            }
        }
    }

    async fn create_blob(&self, content: &[u8]) -> HostResult<ObjectId> {
        self.record("create_blob");
        let mut state = self.state();
        let sha = state.next("blob");
        state.blobs.insert(sha.clone(), content.to_vec());
        Ok(sha)
    }

    async fn create_blob_commit(&self, commit: BlobCommit) -> HostResult<ObjectId> {
        self.record("create_blob_commit");
        let mut state = self.state();
        if state.failing_blob_commits > 0 {
            state.failing_blob_commits -= 1;
            return Err(HostError::NotFound(branch_ref(&commit.branch)));
        }
        state.commit_blob(commit, None)
    }

    async fn get_statuses(&self, sha: &ObjectId) -> HostResult<Vec<CommitStatus>> {
        self.record("get_statuses");
        Ok(self.state().statuses.get(sha).cloned().unwrap_or_default())
    }

    async fn get_commit(&self, sha: &ObjectId) -> HostResult<Commit> {
        self.record("get_commit");
        self.state().commit(sha)
    }

    async fn create_commit(&self, commit: CreateCommit) -> HostResult<Commit> {
        self.record("create_commit");
        let mut state = self.state();
        state.tree(&commit.tree)?;
        Ok(state.make_commit(commit))
    }

    async fn get_branch(&self, name: &str) -> HostResult<Branch> {
        self.record("get_branch");
        let state = self.state();
        let commit = state.commit(&state.head(name)?)?;
        Ok(Branch {
            name: name.to_string(),
            commit,
        })
    }

    async fn create_branch(&self, name: &str, sha: &ObjectId) -> HostResult<RefInfo> {
        self.record("create_branch");
        self.create_ref(&branch_ref(name), sha).await
    }

    async fn create_review(&self, review: CreateReview) -> HostResult<Review> {
        self.record("create_review");
        let mut state = self.state();
        let head_sha = state.head(&review.head)?;
        state.head(&review.base)?;

        let number = state.reviews.keys().next_back().map_or(1, |n| n + 1);
        let created = Review {
            number,
            title: review.title,
            state: ReviewState::Open,
            head_branch: review.head,
            head_sha,
            base_branch: review.base,
            html_url: format!("https://host.example/reviews/{number}"),
        };
        state.reviews.insert(number, created.clone());
        Ok(created)
    }

    async fn get_review(&self, number: u64) -> HostResult<Review> {
        self.record("get_review");
        self.state()
            .reviews
            .get(&number)
            .cloned()
            .ok_or_else(|| HostError::NotFound(format!("review {number}")))
    }

    async fn find_open_review(&self, head: &str, base: &str) -> HostResult<Option<Review>> {
        self.record("find_open_review");
        let state = self.state();
        Ok(state
            .reviews
            .values()
            .find(|r| r.state == ReviewState::Open && r.head_branch == head && r.base_branch == base)
            .cloned())
    }

    async fn get_review_commits(&self, number: u64) -> HostResult<Vec<Commit>> {
        self.record("get_review_commits");
        let state = self.state();
        let review = state
            .reviews
            .get(&number)
            .ok_or_else(|| HostError::NotFound(format!("review {number}")))?;
        let merged_into_base = state.ancestors(&state.head(&review.base_branch)?);

        let mut commits = Vec::new();
        let mut cursor = Some(state.head(&review.head_branch)?);
        while let Some(sha) = cursor {
            if merged_into_base.contains(&sha) {
                break;
            }
            let commit = state.commit(&sha)?;
            cursor = commit.first_parent().cloned();
            commits.push(commit);
        }
        commits.reverse();
        Ok(commits)
    }

    async fn merge_review(&self, number: u64, merge: MergeReview) -> HostResult<MergeResult> {
        self.record("merge_review");
        let mut state = self.state();
        if state.merge_rejected {
            return Err(HostError::MergeConflict {
                number,
                message: "Pull Request is not mergeable".into(),
            });
        }

        let review = state
            .reviews
            .get(&number)
            .cloned()
            .ok_or_else(|| HostError::NotFound(format!("review {number}")))?;
        if review.state != ReviewState::Open {
            return Err(HostError::MergeConflict {
                number,
                message: "Pull Request is not mergeable".into(),
            });
        }
        let head = state.head(&review.head_branch)?;
        if merge.sha.as_ref().is_some_and(|expected| *expected != head) {
            return Err(HostError::ApiError {
                status: 409,
                message: "Head branch was modified".into(),
            });
        }

        let base = state.head(&review.base_branch)?;
        let tree = state.commit(&head)?.tree;
        let merged = state.make_commit(CreateCommit {
            message: merge
                .commit_message
                .unwrap_or_else(|| format!("Merge review #{number}")),
            tree,
            parents: vec![base, head],
            author: None,
            committer: None,
        });
        state
            .refs
            .insert(branch_ref(&review.base_branch), merged.sha.clone());
        if state.auto_delete_merged {
            state.refs.remove(&branch_ref(&review.head_branch));
        }
        if let Some(r) = state.reviews.get_mut(&number) {
            r.state = ReviewState::Merged;
        }

        Ok(MergeResult {
            sha: merged.sha,
            merged: true,
            message: "Pull Request successfully merged".into(),
        })
    }

    async fn close_review(&self, number: u64) -> HostResult<()> {
        self.record("close_review");
        let mut state = self.state();
        let review = state
            .reviews
            .get_mut(&number)
            .ok_or_else(|| HostError::NotFound(format!("review {number}")))?;
        review.state = ReviewState::Closed;
        Ok(())
    }
}

#[test]
fn test_mock_write_and_read_nested_path() {
    let host = MockHost::new().with_branch("main", &[("a/b/c.md", "deep"), ("a/top.md", "top")]);
    assert_eq!(host.file_on_branch("main", "a/b/c.md").unwrap(), "deep");
    assert_eq!(host.file_on_branch("main", "a/top.md").unwrap(), "top");
    assert!(host.file_on_branch("main", "a/b").is_none());
}
