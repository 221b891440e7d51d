//! Trait abstraction for host operations.
//!
//! This module defines the `HostApi` trait which abstracts the source-control
//! host, enabling dependency injection and testability.

use crate::{
    BlobCommit, BlobLocator, Branch, Commit, CommitStatus, CreateCommit, CreateReview, MergeResult,
    MergeReview, ObjectId, RefInfo, Result, Review, Tree, TreeEntry,
};

/// Trait for source-control host operations.
///
/// This trait abstracts host API calls, allowing for:
/// - Dependency injection in the workflow engine
/// - Mock implementations for testing
/// - Alternative providers behind the same workflow
///
/// Ref names are given without the `refs/` prefix (`heads/main`); use
/// [`crate::branch_ref`] to build one from a branch name. Absence is reported
/// as [`crate::Error::NotFound`] unless the return type is an `Option`.
pub trait HostApi: Send + Sync {
    // === Ref Operations ===

    /// Get a ref, or `None` if it does not exist.
    fn get_ref(
        &self,
        ref_name: &str,
    ) -> impl std::future::Future<Output = Result<Option<RefInfo>>> + Send;

    /// Create a ref pointing at `sha`.
    fn create_ref(
        &self,
        ref_name: &str,
        sha: &ObjectId,
    ) -> impl std::future::Future<Output = Result<RefInfo>> + Send;

    /// Move a ref to `sha`. Without `force` the move must be a fast-forward.
    fn update_ref(
        &self,
        ref_name: &str,
        sha: &ObjectId,
        force: bool,
    ) -> impl std::future::Future<Output = Result<RefInfo>> + Send;

    /// Delete a ref.
    fn delete_ref(&self, ref_name: &str) -> impl std::future::Future<Output = Result<()>> + Send;

    /// List branch refs whose name starts with `prefix`.
    fn list_branches(
        &self,
        prefix: &str,
    ) -> impl std::future::Future<Output = Result<Vec<RefInfo>>> + Send;

    // === Tree Operations ===

    /// Get a tree by address (non-recursive).
    fn get_tree(&self, sha: &ObjectId) -> impl std::future::Future<Output = Result<Tree>> + Send;

    /// Create a tree from `entries` applied over `base` (patch semantics).
    fn create_tree(
        &self,
        base: Option<&ObjectId>,
        entries: Vec<TreeEntry>,
    ) -> impl std::future::Future<Output = Result<Tree>> + Send;

    // === Blob Operations ===

    /// Read blob content.
    fn get_blob(
        &self,
        locator: &BlobLocator,
    ) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;

    /// Store blob content and return its address.
    fn create_blob(
        &self,
        content: &[u8],
    ) -> impl std::future::Future<Output = Result<ObjectId>> + Send;

    /// Commit a single blob change onto a branch, returning the new commit address.
    fn create_blob_commit(
        &self,
        commit: BlobCommit,
    ) -> impl std::future::Future<Output = Result<ObjectId>> + Send;

    // === Commit Operations ===

    /// Statuses reported against a commit, latest per context.
    fn get_statuses(
        &self,
        sha: &ObjectId,
    ) -> impl std::future::Future<Output = Result<Vec<CommitStatus>>> + Send;

    /// Get a commit by address.
    fn get_commit(&self, sha: &ObjectId)
    -> impl std::future::Future<Output = Result<Commit>> + Send;

    /// Create a commit.
    fn create_commit(
        &self,
        commit: CreateCommit,
    ) -> impl std::future::Future<Output = Result<Commit>> + Send;

    // === Branch Operations ===

    /// Get a branch and its head commit.
    fn get_branch(&self, name: &str) -> impl std::future::Future<Output = Result<Branch>> + Send;

    /// Create a branch at `sha`.
    fn create_branch(
        &self,
        name: &str,
        sha: &ObjectId,
    ) -> impl std::future::Future<Output = Result<RefInfo>> + Send;

    // === Review Operations ===

    /// Open a review request.
    fn create_review(
        &self,
        review: CreateReview,
    ) -> impl std::future::Future<Output = Result<Review>> + Send;

    /// Get a review by number, whatever its state.
    fn get_review(
        &self,
        number: u64,
    ) -> impl std::future::Future<Output = Result<Review>> + Send;

    /// Find the open review from `head` into `base`.
    ///
    /// Returns `None` if no open review exists for the branch.
    fn find_open_review(
        &self,
        head: &str,
        base: &str,
    ) -> impl std::future::Future<Output = Result<Option<Review>>> + Send;

    /// List the commits of a review, oldest first.
    fn get_review_commits(
        &self,
        number: u64,
    ) -> impl std::future::Future<Output = Result<Vec<Commit>>> + Send;

    /// Merge a review. A refused merge is [`crate::Error::MergeConflict`].
    fn merge_review(
        &self,
        number: u64,
        merge: MergeReview,
    ) -> impl std::future::Future<Output = Result<MergeResult>> + Send;

    /// Close a review without merging.
    fn close_review(&self, number: u64) -> impl std::future::Future<Output = Result<()>> + Send;
}
