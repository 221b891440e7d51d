//! Metadata store: one JSON record per entry under workflow, kept on the
//! metadata branch and fronted by a [`MetadataCache`].

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use draftflow_host::{BlobCommit, BlobLocator, ChangeKind, HostApi, ObjectId, branch_ref};
use serde::{Deserialize, Serialize};

use crate::branch_name::{BranchName, ContentKey, METADATA_BRANCH};
use crate::cache::MetadataCache;
use crate::error::{Error, Result};

/// Placeholder committed when the metadata branch is created.
const METADATA_README: &str = "# draftflow metadata\n\n\
This branch is managed by draftflow. Each file tracks one entry under editorial workflow.\n";

/// Status of an entry under editorial workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Draft,
    PendingReview,
    PendingPublish,
    Published,
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Draft => "draft",
            Self::PendingReview => "pending_review",
            Self::PendingPublish => "pending_publish",
            Self::Published => "published",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for WorkflowStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "draft" => Ok(Self::Draft),
            "pending_review" => Ok(Self::PendingReview),
            "pending_publish" => Ok(Self::PendingPublish),
            "published" => Ok(Self::Published),
            other => Err(Error::InvalidStatus(format!("unknown status '{other}'"))),
        }
    }
}

/// Review request backing a draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRef {
    pub number: u64,
    /// Head commit of the review branch as last written by the workflow.
    pub head: ObjectId,
}

/// A tracked file and the blob it was last written as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedFile {
    pub path: String,
    pub sha: ObjectId,
}

/// Objects written by the workflow for one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedObjects {
    /// The entry document itself.
    pub entry: TrackedFile,

    /// Attached files (media), sorted by path.
    #[serde(default)]
    pub files: Vec<TrackedFile>,
}

impl TrackedObjects {
    /// Paths of the entry and every attached file.
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        std::iter::once(&self.entry)
            .chain(&self.files)
            .map(|f| f.path.clone())
            .collect()
    }
}

/// Tracking record of an entry under editorial workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub key: ContentKey,

    pub status: WorkflowStatus,

    pub review: ReviewRef,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,

    /// Review branch (`cms/<key>`).
    pub branch: BranchName,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub objects: TrackedObjects,

    /// Last time the record was written.
    pub timestamp: DateTime<Utc>,
}

/// Reads and writes metadata records on [`METADATA_BRANCH`].
pub struct MetadataStore<'a, H: HostApi> {
    host: &'a H,
    cache: MetadataCache,
    branch_ready: AtomicBool,
}

impl<'a, H: HostApi> MetadataStore<'a, H> {
    /// Create a store that owns `cache`.
    #[must_use]
    pub const fn new(host: &'a H, cache: MetadataCache) -> Self {
        Self {
            host,
            cache,
            branch_ready: AtomicBool::new(false),
        }
    }

    /// The cache fronting this store.
    #[must_use]
    pub const fn cache(&self) -> &MetadataCache {
        &self.cache
    }

    fn locator(key: &ContentKey) -> BlobLocator {
        BlobLocator::Path {
            branch: METADATA_BRANCH.to_string(),
            path: key.metadata_path(),
        }
    }

    /// Create the metadata branch if it does not exist yet.
    async fn ensure_branch(&self) -> Result<()> {
        if self.branch_ready.load(Ordering::Acquire) {
            return Ok(());
        }

        if self.host.get_ref(&branch_ref(METADATA_BRANCH)).await?.is_none() {
            tracing::info!(branch = METADATA_BRANCH, "creating metadata branch");
            self.host
                .create_blob_commit(BlobCommit {
                    branch: METADATA_BRANCH.to_string(),
                    path: "README.md".to_string(),
                    content: METADATA_README.as_bytes().to_vec(),
                    message: "Initialize editorial workflow metadata".to_string(),
                    change: ChangeKind::Add,
                })
                .await?;
        }

        self.branch_ready.store(true, Ordering::Release);
        Ok(())
    }

    /// Whether a record file exists for `key`.
    async fn exists(&self, key: &ContentKey) -> Result<bool> {
        if self.cache.get(key).is_some() {
            return Ok(true);
        }
        match self.host.get_blob(&Self::locator(key)).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Write the record for `key` and refresh the cache.
    ///
    /// A metadata branch deleted since it was last seen is recreated and the
    /// write retried once.
    ///
    /// # Errors
    /// Returns the host or serialization error.
    pub async fn store(&self, key: &ContentKey, record: &MetadataRecord) -> Result<()> {
        let content = serde_json::to_vec_pretty(record)?;

        match self.write_record(key, &content).await {
            Err(e) if e.is_not_found() => {
                tracing::warn!(%key, "metadata branch went missing ({e}), recreating");
                self.branch_ready.store(false, Ordering::Release);
                self.cache.invalidate(key);
                self.write_record(key, &content).await?;
            }
            result => result?,
        }
        tracing::debug!(%key, status = %record.status, "stored metadata");

        self.cache.insert(key, record.clone());
        Ok(())
    }

    async fn write_record(&self, key: &ContentKey, content: &[u8]) -> Result<()> {
        self.ensure_branch().await?;

        let change = if self.exists(key).await? {
            ChangeKind::Edit
        } else {
            ChangeKind::Add
        };
        let verb = if change == ChangeKind::Add {
            "Create"
        } else {
            "Update"
        };

        self.host
            .create_blob_commit(BlobCommit {
                branch: METADATA_BRANCH.to_string(),
                path: key.metadata_path(),
                content: content.to_vec(),
                message: format!("{verb} {key} metadata"),
                change,
            })
            .await?;
        Ok(())
    }

    /// Read the record for `key`, or `None` if the entry is not under workflow.
    ///
    /// # Errors
    /// Returns the host error, or a JSON error for a corrupt record.
    pub async fn retrieve(&self, key: &ContentKey) -> Result<Option<MetadataRecord>> {
        if let Some(record) = self.cache.get(key) {
            tracing::debug!(%key, "metadata cache hit");
            return Ok(Some(record));
        }

        let bytes = match self.host.get_blob(&Self::locator(key)).await {
            Ok(bytes) => bytes,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let record: MetadataRecord = serde_json::from_slice(&bytes)?;

        self.cache.insert(key, record.clone());
        Ok(Some(record))
    }

    /// Delete the record for `key`. A missing record is not an error.
    ///
    /// # Errors
    /// Returns the host error.
    pub async fn remove(&self, key: &ContentKey) -> Result<()> {
        self.cache.invalidate(key);

        let result = self
            .host
            .create_blob_commit(BlobCommit {
                branch: METADATA_BRANCH.to_string(),
                path: key.metadata_path(),
                content: Vec::new(),
                message: format!("Delete {key} metadata"),
                change: ChangeKind::Delete,
            })
            .await;

        match result {
            Ok(_) => {
                tracing::debug!(%key, "removed metadata");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                // Either the record or the whole branch is gone
                self.branch_ready.store(false, Ordering::Release);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
