//! Editorial workflow controller.
//!
//! Drives an entry through `draft -> pending_review -> pending_publish ->
//! published`, or to deletion. Each draft lives on its own `cms/<key>`
//! branch with an open review against the base branch, and is tracked by a
//! record in the [`MetadataStore`].

use std::collections::BTreeMap;

use chrono::Utc;
use draftflow_host::{
    BlobCommit, BlobLocator, ChangeKind, Commit, CommitStatus, CreateCommit, CreateReview, HostApi,
    MergeReview, ObjectId, ReviewState, Signature, branch_ref,
};

use crate::branch_name::{
    BranchName, CMS_BRANCH_PREFIX, ContentKey, METADATA_BRANCH, is_cms_branch,
};
use crate::cache::MetadataCache;
use crate::config::{AuthorConfig, WorkflowConfig};
use crate::error::{Error, Result};
use crate::metadata::{
    MetadataRecord, MetadataStore, ReviewRef, TrackedFile, TrackedObjects, WorkflowStatus,
};
use crate::rebase::{RebaseEngine, assert_head_reachable};
use crate::tree::{FileContent, FileItem, FileTree, TreeBuilder, compose_tree};

/// A content change to persist: the entry document plus attached files.
#[derive(Debug, Clone)]
pub struct EntryChange {
    pub key: ContentKey,

    /// The entry document (e.g. `posts/hello.md`).
    pub entry: FileItem,

    /// Attached files such as images.
    pub files: Vec<FileItem>,

    pub collection: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub user: Option<String>,
}

impl EntryChange {
    /// A change with just an entry document.
    #[must_use]
    pub const fn new(key: ContentKey, entry: FileItem) -> Self {
        Self {
            key,
            entry,
            files: Vec::new(),
            collection: None,
            title: None,
            description: None,
            user: None,
        }
    }

    /// Attach a file.
    #[must_use]
    pub fn with_file(mut self, file: FileItem) -> Self {
        self.files.push(file);
        self
    }
}

/// Options for [`EditorialWorkflow::persist`].
#[derive(Debug, Clone)]
pub struct PersistOptions {
    /// Message of the commit; also the title of a newly opened review.
    pub commit_message: String,

    /// Status of a newly opened draft (configured default when `None`).
    pub status: Option<WorkflowStatus>,
}

impl PersistOptions {
    #[must_use]
    pub fn new(commit_message: impl Into<String>) -> Self {
        Self {
            commit_message: commit_message.into(),
            status: None,
        }
    }
}

/// Result of persisting a change.
#[derive(Debug, Clone)]
pub struct SavedDraft {
    pub record: MetadataRecord,

    /// Whether this persist opened the draft (rather than updating it).
    pub opened: bool,
}

/// An unpublished entry read back from its review branch.
#[derive(Debug, Clone)]
pub struct Draft {
    pub record: MetadataRecord,
    pub entry_content: FileContent,
    pub files: Vec<TrackedFile>,

    /// Whether the entry already exists on the base branch.
    pub is_modification: bool,
}

/// Editorial workflow over a host.
pub struct EditorialWorkflow<'a, H: HostApi> {
    host: &'a H,
    config: WorkflowConfig,
    metadata: MetadataStore<'a, H>,
}

impl<'a, H: HostApi> EditorialWorkflow<'a, H> {
    /// Create a workflow controller with its own metadata cache.
    #[must_use]
    pub fn new(host: &'a H, config: WorkflowConfig) -> Self {
        let cache = MetadataCache::new(config.cache_ttl());
        Self {
            host,
            metadata: MetadataStore::new(host, cache),
            config,
        }
    }

    /// The metadata store backing this workflow.
    #[must_use]
    pub const fn metadata(&self) -> &MetadataStore<'a, H> {
        &self.metadata
    }

    /// The workflow settings.
    #[must_use]
    pub const fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    fn signature(&self) -> Option<Signature> {
        self.config.author.as_ref().map(AuthorConfig::signature)
    }

    async fn require_record(&self, key: &ContentKey) -> Result<MetadataRecord> {
        let record = self
            .metadata
            .retrieve(key)
            .await?
            .ok_or_else(|| Error::NotUnderWorkflow(key.to_string()))?;
        check_owned(&record)?;
        Ok(record)
    }

    /// Open a draft for a new entry, or update the existing one.
    ///
    /// # Errors
    /// Returns an error if the change cannot be composed or a host call fails.
    pub async fn persist(&self, change: &EntryChange, options: &PersistOptions) -> Result<SavedDraft> {
        match self.metadata.retrieve(&change.key).await? {
            None => {
                let record = self.open(change, options).await?;
                Ok(SavedDraft {
                    record,
                    opened: true,
                })
            }
            Some(record) => {
                let record = self.update(record, change, options).await?;
                Ok(SavedDraft {
                    record,
                    opened: false,
                })
            }
        }
    }

    /// Upload `overlay`, patch it onto `parent`'s tree and commit.
    async fn commit_overlay(
        &self,
        parent: &Commit,
        overlay: &mut FileTree,
        message: &str,
    ) -> Result<Commit> {
        let builder = TreeBuilder::new(self.host);
        builder.upload_pending(overlay).await?;
        let tree = builder.merge_tree(Some(&parent.tree), "", overlay).await?;

        let commit = self
            .host
            .create_commit(CreateCommit {
                message: message.to_string(),
                tree: tree.sha,
                parents: vec![parent.sha.clone()],
                author: self.signature(),
                committer: self.signature(),
            })
            .await?;
        tracing::debug!(sha = %commit.sha, parent = %parent.sha, "created commit");
        Ok(commit)
    }

    async fn open(&self, change: &EntryChange, options: &PersistOptions) -> Result<MetadataRecord> {
        let status = options.status.unwrap_or(self.config.initial_status);
        if status == WorkflowStatus::Published {
            return Err(Error::InvalidStatus(
                "a new draft cannot start as published".into(),
            ));
        }

        let key = &change.key;
        let branch = BranchName::for_entry(key);
        let base = self.host.get_branch(&self.config.base_branch).await?;

        let mut overlay = compose_change(change)?;
        let commit = self
            .commit_overlay(&base.commit, &mut overlay, &options.commit_message)
            .await?;
        let objects = tracked_objects(&overlay, change)?;

        self.host.create_branch(&branch, &commit.sha).await?;
        let review = self
            .host
            .create_review(CreateReview {
                title: options.commit_message.clone(),
                body: self.config.review_body.clone(),
                head: branch.to_string(),
                base: self.config.base_branch.clone(),
            })
            .await?;
        tracing::info!(%key, review = review.number, "opened draft");

        let record = MetadataRecord {
            key: key.clone(),
            status,
            review: ReviewRef {
                number: review.number,
                head: commit.sha,
            },
            user: change.user.clone(),
            collection: change.collection.clone(),
            branch,
            title: change.title.clone(),
            description: change.description.clone(),
            objects,
            timestamp: Utc::now(),
        };
        self.metadata.store(key, &record).await?;
        Ok(record)
    }

    async fn update(
        &self,
        mut record: MetadataRecord,
        change: &EntryChange,
        options: &PersistOptions,
    ) -> Result<MetadataRecord> {
        let key = &change.key;
        let head = self.host.get_branch(&record.branch).await?;

        let mut overlay = compose_change(change)?;
        let commit = self
            .commit_overlay(&head.commit, &mut overlay, &options.commit_message)
            .await?;
        let objects = tracked_objects(&overlay, change)?;

        // Union by path; the newer address wins
        let mut files: BTreeMap<String, ObjectId> = record
            .objects
            .files
            .drain(..)
            .map(|f| (f.path, f.sha))
            .collect();
        files.extend(objects.files.into_iter().map(|f| (f.path, f.sha)));
        record.objects = TrackedObjects {
            entry: objects.entry,
            files: files
                .into_iter()
                .map(|(path, sha)| TrackedFile { path, sha })
                .collect(),
        };
        record.title.clone_from(&change.title);
        record.description.clone_from(&change.description);
        record.review.head = commit.sha.clone();
        record.timestamp = Utc::now();

        if self.config.asset_store {
            self.metadata.store(key, &record).await?;
            self.update_branch(&record.branch, &commit.sha, false).await?;
        } else {
            self.rebase_review(&mut record, &commit).await?;
        }
        tracing::info!(%key, head = %record.review.head, "updated draft");
        Ok(record)
    }

    /// Rebase the review branch so it stays on top of the base branch.
    async fn rebase_review(&self, record: &mut MetadataRecord, new_head: &Commit) -> Result<()> {
        let base = self.host.get_branch(&self.config.base_branch).await?;
        let listed = self.host.get_review_commits(record.review.number).await?;
        let commits = assert_head_reachable(&record.branch, listed, new_head)?;

        let rebased = RebaseEngine::new(self.host, &record.branch)
            .rebase_tracked_commits(&base.commit, &commits, &record.objects.paths())
            .await?;

        record.review.head = rebased.sha.clone();
        record.timestamp = Utc::now();
        self.metadata.store(&record.key, record).await?;
        self.update_branch(&record.branch, &rebased.sha, true).await
    }

    /// Change the status of a draft. No tree or commit activity.
    ///
    /// # Errors
    /// Returns [`Error::InvalidStatus`] for [`WorkflowStatus::Published`]
    /// (use [`Self::publish`]) and [`Error::NotUnderWorkflow`] for an
    /// unknown key.
    pub async fn set_status(&self, key: &ContentKey, status: WorkflowStatus) -> Result<MetadataRecord> {
        if status == WorkflowStatus::Published {
            return Err(Error::InvalidStatus(
                "entries are published with publish, not a status change".into(),
            ));
        }

        let mut record = self.require_record(key).await?;
        record.status = status;
        record.timestamp = Utc::now();
        self.metadata.store(key, &record).await?;
        tracing::info!(%key, %status, "status changed");
        Ok(record)
    }

    /// Merge a draft into the base branch and stop tracking it.
    ///
    /// A merge refused by the host falls back to committing the tracked
    /// files directly onto the base branch, unless the review turns out to
    /// be merged already (a publish retried after a failed cleanup).
    ///
    /// # Errors
    /// Returns [`Error::NotUnderWorkflow`] for an unknown key, or the host error.
    pub async fn publish(&self, key: &ContentKey) -> Result<()> {
        let record = self.require_record(key).await?;
        let number = record.review.number;

        let merged = self
            .host
            .merge_review(
                number,
                MergeReview {
                    commit_message: Some(self.config.merge_message.clone()),
                    sha: Some(record.review.head.clone()),
                    merge_method: self.config.merge_method,
                },
            )
            .await;

        match merged {
            Ok(result) => {
                tracing::info!(%key, sha = %result.sha, "merged review #{number}");
            }
            Err(e) if e.is_merge_conflict() => {
                let review = self.host.get_review(number).await?;
                if review.state == ReviewState::Merged {
                    tracing::info!(%key, "review #{number} already merged");
                } else {
                    tracing::warn!(%key, "review #{number} cannot be merged, force merging");
                    self.force_merge(&record).await?;
                }
            }
            Err(e) => return Err(e.into()),
        }

        // Hosts may delete merged branches on their own
        tolerate_not_found(self.host.delete_ref(&branch_ref(&record.branch)).await)?;
        self.metadata.remove(key).await
    }

    /// Commit every tracked file onto the base branch and close the review.
    async fn force_merge(&self, record: &MetadataRecord) -> Result<()> {
        let base = self.host.get_branch(&self.config.base_branch).await?;

        let tracked: Vec<&TrackedFile> = std::iter::once(&record.objects.entry)
            .chain(&record.objects.files)
            .collect();
        let mut overlay = compose_tree(
            tracked
                .iter()
                .map(|f| FileItem::stored(f.path.as_str(), f.sha.clone())),
        )?;

        let listing: Vec<String> = tracked.iter().map(|f| format!("- {}", f.path)).collect();
        let message = format!(
            "Automatically generated. Force merged {}\n\nFiles:\n{}",
            record.key,
            listing.join("\n")
        );

        let commit = self
            .commit_overlay(&base.commit, &mut overlay, &message)
            .await?;
        // The commit sits directly on the base tip, so no force is needed
        self.update_branch(&self.config.base_branch, &commit.sha, false)
            .await?;
        self.host.close_review(record.review.number).await?;
        tracing::info!(key = %record.key, sha = %commit.sha, "force merged");
        Ok(())
    }

    /// Close a draft's review, delete its branch and drop its record.
    ///
    /// Anything already gone is skipped, so discarding twice succeeds.
    ///
    /// # Errors
    /// Returns the host error for failures other than absence.
    pub async fn discard(&self, key: &ContentKey) -> Result<()> {
        let Some(record) = self.metadata.retrieve(key).await? else {
            tracing::debug!(%key, "nothing to discard");
            return Ok(());
        };
        check_owned(&record)?;

        tolerate_not_found(self.host.close_review(record.review.number).await)?;
        tolerate_not_found(self.host.delete_ref(&branch_ref(&record.branch)).await)?;
        self.metadata.remove(key).await?;
        tracing::info!(%key, "discarded draft");
        Ok(())
    }

    /// Read a draft's entry from its review branch.
    ///
    /// # Errors
    /// Returns [`Error::NotUnderWorkflow`] for an unknown key, or the host error.
    pub async fn read_draft(&self, key: &ContentKey) -> Result<Draft> {
        let record = self.require_record(key).await?;
        let entry_path = record.objects.entry.path.clone();

        let bytes = self
            .host
            .get_blob(&BlobLocator::Path {
                branch: record.branch.to_string(),
                path: entry_path.clone(),
            })
            .await?;
        let entry_content =
            String::from_utf8(bytes).map_or_else(|e| FileContent::Binary(e.into_bytes()), FileContent::Text);

        let base = self.host.get_branch(&self.config.base_branch).await?;
        let is_modification = TreeBuilder::new(self.host)
            .find_entry(&base.commit.tree, &entry_path)
            .await?
            .is_some();

        Ok(Draft {
            files: record.objects.files.clone(),
            record,
            entry_content,
            is_modification,
        })
    }

    /// Statuses reported against a draft's review head, such as deploy previews.
    ///
    /// # Errors
    /// Returns [`Error::NotUnderWorkflow`] for an unknown key, or the host error.
    pub async fn draft_statuses(&self, key: &ContentKey) -> Result<Vec<CommitStatus>> {
        let record = self.require_record(key).await?;
        Ok(self.host.get_statuses(&record.review.head).await?)
    }

    /// Commit a change straight onto the base branch, bypassing review.
    ///
    /// The entry is not put under workflow and no record is written.
    ///
    /// # Errors
    /// Returns [`Error::InvalidStatus`] if the entry has an open draft, or the
    /// host error (a base branch that moved mid-way fails the fast-forward).
    pub async fn persist_direct(&self, change: &EntryChange, message: &str) -> Result<Commit> {
        if self.metadata.retrieve(&change.key).await?.is_some() {
            return Err(Error::InvalidStatus(format!(
                "'{}' has an open draft - publish or discard it first",
                change.key
            )));
        }

        let base = self.host.get_branch(&self.config.base_branch).await?;
        let mut overlay = compose_change(change)?;
        let commit = self
            .commit_overlay(&base.commit, &mut overlay, message)
            .await?;
        self.update_branch(&self.config.base_branch, &commit.sha, false)
            .await?;

        tracing::info!(key = %change.key, sha = %commit.sha, "committed directly");
        Ok(commit)
    }

    /// Delete one file from a branch (the base branch when `None`).
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] if the file is not on the branch,
    /// [`Error::Configuration`] for the metadata branch, or the host error.
    pub async fn delete_file(
        &self,
        path: &str,
        message: &str,
        branch: Option<&str>,
    ) -> Result<ObjectId> {
        let branch = branch.unwrap_or(&self.config.base_branch);
        if branch == METADATA_BRANCH {
            return Err(Error::Configuration(format!(
                "refusing to delete from '{METADATA_BRANCH}': records are removed with discard"
            )));
        }

        let head = self.host.get_branch(branch).await?;
        if TreeBuilder::new(self.host)
            .find_entry(&head.commit.tree, path)
            .await?
            .is_none_or(|entry| entry.is_tree())
        {
            return Err(Error::NotFound(format!("{path} on {branch}")));
        }

        let sha = self
            .host
            .create_blob_commit(BlobCommit {
                branch: branch.to_string(),
                path: path.to_string(),
                content: Vec::new(),
                message: message.to_string(),
                change: ChangeKind::Delete,
            })
            .await?;
        tracing::info!(branch, path, %sha, "deleted file");
        Ok(sha)
    }

    /// Keys of drafts whose branch has an open review.
    ///
    /// # Errors
    /// Returns the host error.
    pub async fn list_unpublished(&self) -> Result<Vec<ContentKey>> {
        let refs = self.host.list_branches(CMS_BRANCH_PREFIX).await?;

        let mut keys = Vec::new();
        for info in refs {
            let Some(key) = info
                .branch_name()
                .and_then(|name| BranchName::new(name).ok())
                .and_then(|branch| branch.content_key())
            else {
                continue;
            };
            let branch = BranchName::for_entry(&key);
            if self
                .host
                .find_open_review(&branch, &self.config.base_branch)
                .await?
                .is_some()
            {
                keys.push(key);
            }
        }

        keys.sort();
        Ok(keys)
    }

    /// Move a branch to `sha`.
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] when forcing a branch the workflow
    /// does not own, before any host call.
    pub async fn update_branch(&self, name: &str, sha: &ObjectId, force: bool) -> Result<()> {
        if force && !is_cms_branch(name) {
            return Err(Error::Configuration(format!(
                "refusing to force-update '{name}': only {CMS_BRANCH_PREFIX} branches may be force-updated"
            )));
        }

        self.host.update_ref(&branch_ref(name), sha, force).await?;
        tracing::debug!(branch = name, %sha, force, "updated branch");
        Ok(())
    }
}

fn compose_change(change: &EntryChange) -> Result<FileTree> {
    compose_tree(std::iter::once(&change.entry).chain(&change.files).cloned())
}

/// Addresses of the change's files after upload.
fn tracked_objects(overlay: &FileTree, change: &EntryChange) -> Result<TrackedObjects> {
    let address = |item: &FileItem| -> Result<TrackedFile> {
        let sha = overlay
            .files()
            .into_iter()
            .find(|f| f.path == item.path)
            .and_then(|f| f.content_address.clone())
            .or_else(|| item.content_address.clone())
            .ok_or_else(|| Error::MissingContentAddress(item.path.clone()))?;
        Ok(TrackedFile {
            path: item.path.clone(),
            sha,
        })
    };

    let entry = address(&change.entry)?;
    let mut files = change
        .files
        .iter()
        .map(address)
        .collect::<Result<Vec<_>>>()?;
    files.sort_by(|a, b| a.path.cmp(&b.path));

    Ok(TrackedObjects { entry, files })
}

/// Records only ever name `cms/` branches; anything else is not ours to touch.
fn check_owned(record: &MetadataRecord) -> Result<()> {
    if record.branch.is_cms() {
        return Ok(());
    }
    Err(Error::UnexpectedBranchState {
        branch: record.branch.to_string(),
        reason: format!("record for '{}' does not name a {CMS_BRANCH_PREFIX} branch", record.key),
    })
}

fn tolerate_not_found(result: draftflow_host::Result<()>) -> Result<()> {
    match result {
        Err(e) if e.is_not_found() => {
            tracing::warn!("ignoring missing object: {e}");
            Ok(())
        }
        other => other.map_err(Error::from),
    }
}
