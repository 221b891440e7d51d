//! Tree builder: turns a flat list of changed files into a nested tree and
//! persists it as a patch over an existing host tree.
//!
//! Composition is purely local and deterministic. Persistence is bottom-up:
//! every subtree is created before the tree that references it, and entries
//! of the base tree that the overlay does not mention are carried over.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use draftflow_host::{EntryKind, FileMode, HostApi, ObjectId, Tree, TreeEntry};
use futures::future::{BoxFuture, FutureExt, try_join_all};

use crate::error::{Error, Result};

/// Content of a changed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContent {
    Text(String),
    Binary(Vec<u8>),
}

impl FileContent {
    /// Raw bytes to store as a blob.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(bytes) => bytes,
        }
    }
}

/// A changed file destined for a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileItem {
    /// Repository-relative path, `/`-separated.
    pub path: String,

    pub content: FileContent,

    /// Blob address, once the content has been stored.
    pub content_address: Option<ObjectId>,

    /// Whether the blob was already placed by an earlier persist.
    ///
    /// Uploaded files are skipped by [`compose_tree`].
    pub uploaded: bool,
}

impl FileItem {
    /// A text file that still needs uploading.
    #[must_use]
    pub fn text(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: FileContent::Text(content.into()),
            content_address: None,
            uploaded: false,
        }
    }

    /// A binary file that still needs uploading.
    #[must_use]
    pub fn binary(path: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            content: FileContent::Binary(content),
            content_address: None,
            uploaded: false,
        }
    }

    /// A file whose blob already exists on the host.
    #[must_use]
    pub fn stored(path: impl Into<String>, sha: ObjectId) -> Self {
        Self {
            path: path.into(),
            content: FileContent::Binary(Vec::new()),
            content_address: Some(sha),
            uploaded: false,
        }
    }
}

/// A node of a [`FileTree`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeNode {
    Leaf(FileItem),
    Subtree(FileTree),
}

/// Nested, ordered mapping from path segment to file or directory.
///
/// Holds exactly one [`FileItem`] per full path; directories carry no
/// content of their own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileTree {
    nodes: BTreeMap<String, TreeNode>,
}

impl FileTree {
    /// Create an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the tree has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Look up a direct child by segment name.
    #[must_use]
    pub fn get(&self, segment: &str) -> Option<&TreeNode> {
        self.nodes.get(segment)
    }

    /// Iterate direct children in segment order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &TreeNode)> {
        self.nodes.iter()
    }

    /// Insert a file at its path, creating intermediate directories.
    ///
    /// # Errors
    /// Returns [`Error::InvalidPath`] if the path is empty, already holds a
    /// file, or passes through (or lands on) a node of the other kind.
    pub fn insert(&mut self, item: FileItem) -> Result<()> {
        let path = item.path.clone();
        let invalid = |reason: &str| Error::InvalidPath {
            path: path.clone(),
            reason: reason.to_string(),
        };

        let segments: Vec<String> = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        let Some((name, dirs)) = segments.split_last() else {
            return Err(invalid("path has no segments"));
        };

        let mut node = self;
        for dir in dirs {
            let child = node
                .nodes
                .entry(dir.clone())
                .or_insert_with(|| TreeNode::Subtree(Self::new()));
            node = match child {
                TreeNode::Subtree(subtree) => subtree,
                TreeNode::Leaf(_) => return Err(invalid("a parent directory is a file")),
            };
        }

        match node.nodes.entry(name.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(TreeNode::Leaf(item));
                Ok(())
            }
            Entry::Occupied(existing) => Err(match existing.get() {
                TreeNode::Leaf(_) => invalid("duplicate path"),
                TreeNode::Subtree(_) => invalid("path is a directory"),
            }),
        }
    }

    /// All files in path order.
    #[must_use]
    pub fn files(&self) -> Vec<&FileItem> {
        let mut out = Vec::new();
        for node in self.nodes.values() {
            match node {
                TreeNode::Leaf(item) => out.push(item),
                TreeNode::Subtree(subtree) => out.extend(subtree.files()),
            }
        }
        out
    }

    fn files_mut<'a>(&'a mut self, out: &mut Vec<&'a mut FileItem>) {
        for node in self.nodes.values_mut() {
            match node {
                TreeNode::Leaf(item) => out.push(item),
                TreeNode::Subtree(subtree) => subtree.files_mut(out),
            }
        }
    }
}

/// Compose changed files into a nested tree.
///
/// Files already marked `uploaded` are skipped. The result does not depend
/// on input order.
///
/// # Errors
/// Returns [`Error::InvalidPath`] for empty or conflicting paths.
pub fn compose_tree(files: impl IntoIterator<Item = FileItem>) -> Result<FileTree> {
    let mut tree = FileTree::new();
    for item in files.into_iter().filter(|f| !f.uploaded) {
        tree.insert(item)?;
    }
    Ok(tree)
}

/// A tree persisted on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedTree {
    /// Path of the tree relative to the root (empty for the root).
    pub path: String,

    /// Address of the new tree.
    pub sha: ObjectId,

    /// Tree it was patched over.
    pub parent: Option<ObjectId>,
}

fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

/// Persists [`FileTree`]s against a host.
pub struct TreeBuilder<'a, H: HostApi> {
    host: &'a H,
}

impl<'a, H: HostApi> TreeBuilder<'a, H> {
    /// Create a new tree builder.
    #[must_use]
    pub const fn new(host: &'a H) -> Self {
        Self { host }
    }

    /// Store every file without a content address, concurrently.
    ///
    /// # Errors
    /// Returns the first host failure; files stored before it keep their address.
    pub async fn upload_pending(&self, tree: &mut FileTree) -> Result<()> {
        let mut files = Vec::new();
        tree.files_mut(&mut files);

        let uploads = files
            .into_iter()
            .filter(|item| item.content_address.is_none())
            .map(|item| async move {
                let sha = self.host.create_blob(item.content.as_bytes()).await?;
                tracing::debug!(path = %item.path, %sha, "stored blob");
                item.content_address = Some(sha);
                item.uploaded = true;
                Ok::<_, Error>(())
            });

        try_join_all(uploads).await?;
        Ok(())
    }

    /// Patch `overlay` onto the tree `base` and persist the result.
    ///
    /// Overlay files replace base entries of the same name (keeping the base
    /// mode when that entry was a blob), overlay directories recurse into the
    /// matching base subtree, and base entries the overlay does not mention
    /// are retained. A missing base is treated as the empty tree.
    ///
    /// # Errors
    /// Returns [`Error::MissingContentAddress`] for a file that was never
    /// uploaded, or the host error. Nothing is rolled back; orphaned trees are
    /// harmless and the whole persist can be retried.
    pub fn merge_tree<'b>(
        &'b self,
        base: Option<&'b ObjectId>,
        path: &'b str,
        overlay: &'b FileTree,
    ) -> BoxFuture<'b, Result<PersistedTree>> {
        async move {
            let base_tree = match base {
                Some(sha) => self.host.get_tree(sha).await?,
                None => Tree::default(),
            };

            let mut entries = Vec::new();
            for (name, node) in overlay.iter() {
                let existing = base_tree.entry(name);
                match node {
                    TreeNode::Leaf(item) => {
                        let sha = item
                            .content_address
                            .clone()
                            .ok_or_else(|| Error::MissingContentAddress(item.path.clone()))?;
                        let mode = existing
                            .filter(|e| e.kind == EntryKind::Blob)
                            .map_or(FileMode::File, |e| e.mode);
                        entries.push(TreeEntry {
                            path: name.clone(),
                            mode,
                            kind: EntryKind::Blob,
                            sha,
                        });
                    }
                    TreeNode::Subtree(subtree) => {
                        let sub_base = existing.filter(|e| e.is_tree()).map(|e| e.sha.clone());
                        let child_path = join_path(path, name);
                        let persisted = self
                            .merge_tree(sub_base.as_ref(), &child_path, subtree)
                            .await?;
                        entries.push(TreeEntry::tree(name.clone(), persisted.sha));
                    }
                }
            }

            let tree = self.host.create_tree(base, entries).await?;
            tracing::debug!(path, sha = %tree.sha, "persisted tree");

            Ok(PersistedTree {
                path: path.to_string(),
                sha: tree.sha,
                parent: base.cloned(),
            })
        }
        .boxed()
    }

    /// Find the entry at a `/`-separated path inside the tree `root`.
    ///
    /// # Errors
    /// Returns the host error if a tree on the way cannot be read.
    pub async fn find_entry(&self, root: &ObjectId, path: &str) -> Result<Option<TreeEntry>> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let Some((name, dirs)) = segments.split_last() else {
            return Ok(None);
        };

        let mut tree = self.host.get_tree(root).await?;
        for dir in dirs {
            let next = match tree.entry(dir) {
                Some(entry) if entry.is_tree() => entry.sha.clone(),
                _ => return Ok(None),
            };
            tree = self.host.get_tree(&next).await?;
        }

        Ok(tree.entry(name).cloned())
    }
}
