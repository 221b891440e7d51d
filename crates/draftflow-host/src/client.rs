//! REST host client for GitHub-compatible git-data and pulls APIs.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::{DeserializeOwned, IgnoredAny};

use crate::auth::Auth;
use crate::error::{Error, Result};
use crate::traits::HostApi;
use crate::types::{
    BlobCommit, BlobLocator, Branch, ChangeKind, Commit, CommitStatus, CreateCommit, CreateReview,
    EntryKind, FileMode, MergeResult, MergeReview, ObjectId, RefInfo, Review, ReviewState,
    Signature, Tree, TreeEntry, branch_ref,
};

/// Media type asking the host for raw file bytes instead of JSON.
const RAW_MEDIA_TYPE: &str = "application/vnd.github.raw";

/// Body text of the 422 returned when deleting a ref that does not exist.
const MISSING_REF_MESSAGE: &str = "Reference does not exist";

// === Internal API response types (shared across methods) ===

#[derive(serde::Deserialize)]
struct ApiObject {
    sha: ObjectId,
}

/// A ref as returned by the git refs endpoints.
#[derive(serde::Deserialize)]
struct ApiRef {
    #[serde(rename = "ref")]
    ref_name: String,
    object: ApiObject,
}

impl ApiRef {
    fn into_ref_info(self) -> RefInfo {
        let name = self
            .ref_name
            .strip_prefix("refs/")
            .unwrap_or(&self.ref_name)
            .to_string();
        RefInfo {
            name,
            sha: self.object.sha,
        }
    }
}

/// A commit as returned by the git commits endpoint (flat shape).
#[derive(serde::Deserialize)]
struct ApiGitCommit {
    sha: ObjectId,
    message: String,
    tree: ApiObject,
    parents: Vec<ApiObject>,
    author: Signature,
    committer: Signature,
}

impl ApiGitCommit {
    fn into_commit(self) -> Commit {
        Commit {
            sha: self.sha,
            message: self.message,
            parents: self.parents.into_iter().map(|p| p.sha).collect(),
            tree: self.tree.sha,
            author: self.author,
            committer: self.committer,
        }
    }
}

/// A commit as returned by the branches and pulls endpoints, where the
/// commit data is nested under `commit` and the address sits outside it.
#[derive(serde::Deserialize)]
struct ApiNestedCommit {
    sha: ObjectId,
    commit: ApiCommitData,
    parents: Vec<ApiObject>,
}

#[derive(serde::Deserialize)]
struct ApiCommitData {
    message: String,
    tree: ApiObject,
    author: Signature,
    committer: Signature,
}

impl ApiNestedCommit {
    /// Flatten into the same shape as [`ApiGitCommit`].
    fn into_commit(self) -> Commit {
        Commit {
            sha: self.sha,
            message: self.commit.message,
            parents: self.parents.into_iter().map(|p| p.sha).collect(),
            tree: self.commit.tree.sha,
            author: self.commit.author,
            committer: self.commit.committer,
        }
    }
}

/// Combined status for a commit; only the individual statuses are kept.
#[derive(serde::Deserialize)]
struct ApiCombinedStatus {
    statuses: Vec<CommitStatus>,
}

#[derive(serde::Deserialize)]
struct ApiBranch {
    name: String,
    commit: ApiNestedCommit,
}

/// Internal representation of a pull request.
#[derive(serde::Deserialize)]
struct ApiPullRequest {
    number: u64,
    title: String,
    state: String,
    #[serde(default)]
    merged: bool,
    html_url: String,
    head: ApiPullRef,
    base: ApiPullRef,
}

#[derive(serde::Deserialize)]
struct ApiPullRef {
    #[serde(rename = "ref")]
    ref_name: String,
    #[serde(default)]
    sha: Option<ObjectId>,
}

impl ApiPullRequest {
    fn into_review(self) -> Review {
        // Merged pull requests are reported as state="closed" + merged=true
        let state = if self.merged {
            ReviewState::Merged
        } else {
            match self.state.as_str() {
                "open" => ReviewState::Open,
                _ => ReviewState::Closed,
            }
        };

        Review {
            number: self.number,
            title: self.title,
            state,
            head_branch: self.head.ref_name,
            head_sha: self.head.sha.unwrap_or_default(),
            base_branch: self.base.ref_name,
            html_url: self.html_url,
        }
    }
}

// === Request bodies ===

#[derive(serde::Serialize)]
struct ApiCreateRef<'a> {
    #[serde(rename = "ref")]
    ref_name: String,
    sha: &'a ObjectId,
}

#[derive(serde::Serialize)]
struct ApiUpdateRef<'a> {
    sha: &'a ObjectId,
    force: bool,
}

/// Tree entry as sent to the host; a `null` sha deletes the path.
#[derive(serde::Serialize)]
struct ApiTreeEntry {
    path: String,
    mode: FileMode,
    #[serde(rename = "type")]
    kind: EntryKind,
    sha: Option<ObjectId>,
}

impl From<TreeEntry> for ApiTreeEntry {
    fn from(entry: TreeEntry) -> Self {
        Self {
            path: entry.path,
            mode: entry.mode,
            kind: entry.kind,
            sha: Some(entry.sha),
        }
    }
}

#[derive(serde::Serialize)]
struct ApiCreateTree<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    base_tree: Option<&'a ObjectId>,
    tree: Vec<ApiTreeEntry>,
}

#[derive(serde::Serialize)]
struct ApiCreateBlob {
    content: String,
    encoding: &'static str,
}

#[derive(serde::Serialize)]
struct ApiCloseReview {
    state: &'static str,
}

/// Host client for GitHub-compatible REST APIs.
pub struct HttpHost {
    client: Client,
    base_url: String,
    owner: String,
    repo: String,
    /// Token stored as `SecretString` for automatic zeroization on drop.
    token: SecretString,
}

impl HttpHost {
    /// Default API URL.
    pub const DEFAULT_API_URL: &'static str = "https://api.github.com";

    /// Create a new host client for `owner/repo`.
    ///
    /// # Errors
    /// Returns error if authentication fails.
    pub fn new(auth: &Auth, owner: impl Into<String>, repo: impl Into<String>) -> Result<Self> {
        Self::with_base_url(auth, Self::DEFAULT_API_URL, owner, repo)
    }

    /// Create a new host client with a custom API URL (for self-hosted instances).
    ///
    /// # Errors
    /// Returns error if authentication fails.
    pub fn with_base_url(
        auth: &Auth,
        base_url: impl Into<String>,
        owner: impl Into<String>,
        repo: impl Into<String>,
    ) -> Result<Self> {
        let token = auth.resolve()?;

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static("draftflow"));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );

        let client = Client::builder().default_headers(headers).build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            owner: owner.into(),
            repo: repo.into(),
            token,
        })
    }

    /// Build a repository-scoped path.
    fn repo_path(&self, suffix: &str) -> String {
        format!("/repos/{}/{}{suffix}", self.owner, self.repo)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header(
            AUTHORIZATION,
            format!("Bearer {}", self.token.expose_secret()),
        )
    }

    /// Make a GET request.
    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.get_with_query(path, &[]).await
    }

    /// Make a GET request with query parameters.
    async fn get_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(%url, "GET");
        let response = self
            .authorized(self.client.get(&url))
            .query(query)
            .send()
            .await?;

        Self::handle_response(path, response).await
    }

    /// Make a GET request for raw bytes.
    async fn get_raw(&self, path: &str, query: &[(&str, &str)]) -> Result<Vec<u8>> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(%url, "GET raw");
        let response = self
            .authorized(self.client.get(&url))
            .header(ACCEPT, RAW_MEDIA_TYPE)
            .query(query)
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(response.bytes().await?.to_vec());
        }
        Err(Self::error_for(path, response).await)
    }

    /// Make a POST request.
    async fn post<T: DeserializeOwned, B: serde::Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(%url, "POST");
        let response = self
            .authorized(self.client.post(&url))
            .json(body)
            .send()
            .await?;

        Self::handle_response(path, response).await
    }

    /// Make a PATCH request.
    async fn patch<T: DeserializeOwned, B: serde::Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(%url, "PATCH");
        let response = self
            .authorized(self.client.patch(&url))
            .json(body)
            .send()
            .await?;

        Self::handle_response(path, response).await
    }

    /// Make a DELETE request.
    async fn delete(&self, path: &str) -> Result<()> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(%url, "DELETE");
        let response = self.authorized(self.client.delete(&url)).send().await?;

        if response.status().is_success() {
            return Ok(());
        }
        Err(Self::error_for(path, response).await)
    }

    /// Handle API response.
    async fn handle_response<T: DeserializeOwned>(path: &str, response: Response) -> Result<T> {
        if response.status().is_success() {
            let body = response.json().await?;
            return Ok(body);
        }
        Err(Self::error_for(path, response).await)
    }

    /// Map an unsuccessful response to an error.
    async fn error_for(path: &str, response: Response) -> Error {
        let status = response.status();
        match status.as_u16() {
            401 => Error::AuthenticationFailed,
            403 if response
                .headers()
                .get("x-ratelimit-remaining")
                .is_some_and(|v| v == "0") =>
            {
                Error::RateLimited
            }
            404 => Error::NotFound(path.to_string()),
            status_code => {
                let text = response.text().await.unwrap_or_default();
                Error::ApiError {
                    status: status_code,
                    message: text,
                }
            }
        }
    }
}

impl std::fmt::Debug for HttpHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpHost")
            .field("base_url", &self.base_url)
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("token", &"[redacted]")
            .finish_non_exhaustive()
    }
}

// === Trait Implementation ===

impl HostApi for HttpHost {
    async fn get_ref(&self, ref_name: &str) -> Result<Option<RefInfo>> {
        match self
            .get::<ApiRef>(&self.repo_path(&format!("/git/ref/{ref_name}")))
            .await
        {
            Ok(api_ref) => Ok(Some(api_ref.into_ref_info())),
            Err(Error::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create_ref(&self, ref_name: &str, sha: &ObjectId) -> Result<RefInfo> {
        let body = ApiCreateRef {
            ref_name: format!("refs/{ref_name}"),
            sha,
        };
        let api_ref: ApiRef = self.post(&self.repo_path("/git/refs"), &body).await?;
        Ok(api_ref.into_ref_info())
    }

    async fn update_ref(&self, ref_name: &str, sha: &ObjectId, force: bool) -> Result<RefInfo> {
        let body = ApiUpdateRef { sha, force };
        let api_ref: ApiRef = self
            .patch(&self.repo_path(&format!("/git/refs/{ref_name}")), &body)
            .await?;
        Ok(api_ref.into_ref_info())
    }

    async fn delete_ref(&self, ref_name: &str) -> Result<()> {
        let path = self.repo_path(&format!("/git/refs/{ref_name}"));
        match self.delete(&path).await {
            // GitHub answers a delete of a missing ref with 422, not 404
            Err(Error::ApiError { status: 422, message })
                if message.contains(MISSING_REF_MESSAGE) =>
            {
                Err(Error::NotFound(path))
            }
            result => result,
        }
    }

    async fn list_branches(&self, prefix: &str) -> Result<Vec<RefInfo>> {
        let refs: Vec<ApiRef> = self
            .get(&self.repo_path(&format!("/git/matching-refs/heads/{prefix}")))
            .await?;
        Ok(refs.into_iter().map(ApiRef::into_ref_info).collect())
    }

    async fn get_tree(&self, sha: &ObjectId) -> Result<Tree> {
        self.get(&self.repo_path(&format!("/git/trees/{sha}")))
            .await
    }

    async fn create_tree(&self, base: Option<&ObjectId>, entries: Vec<TreeEntry>) -> Result<Tree> {
        let body = ApiCreateTree {
            base_tree: base,
            tree: entries.into_iter().map(ApiTreeEntry::from).collect(),
        };
        self.post(&self.repo_path("/git/trees"), &body).await
    }

    async fn get_blob(&self, locator: &BlobLocator) -> Result<Vec<u8>> {
        match locator {
            BlobLocator::Sha(sha) => {
                self.get_raw(&self.repo_path(&format!("/git/blobs/{sha}")), &[])
                    .await
            }
            BlobLocator::Path { branch, path } => {
                self.get_raw(
                    &self.repo_path(&format!("/contents/{}", path.trim_start_matches('/'))),
                    &[("ref", branch.as_str())],
                )
                .await
            }
        }
    }

    async fn create_blob(&self, content: &[u8]) -> Result<ObjectId> {
        let body = ApiCreateBlob {
            content: BASE64.encode(content),
            encoding: "base64",
        };
        let created: ApiObject = self.post(&self.repo_path("/git/blobs"), &body).await?;
        Ok(created.sha)
    }

    async fn create_blob_commit(&self, commit: BlobCommit) -> Result<ObjectId> {
        let ref_name = branch_ref(&commit.branch);
        let tip = self.get_ref(&ref_name).await?;
        let parent = match &tip {
            Some(r) => Some(self.get_commit(&r.sha).await?),
            None => None,
        };

        let sha = match commit.change {
            ChangeKind::Delete => None,
            ChangeKind::Add | ChangeKind::Edit => Some(self.create_blob(&commit.content).await?),
        };
        let body = ApiCreateTree {
            base_tree: parent.as_ref().map(|c| &c.tree),
            tree: vec![ApiTreeEntry {
                path: commit.path.trim_start_matches('/').to_string(),
                mode: FileMode::File,
                kind: EntryKind::Blob,
                sha,
            }],
        };
        let tree: Tree = self.post(&self.repo_path("/git/trees"), &body).await?;

        let created = self
            .create_commit(CreateCommit {
                message: commit.message,
                tree: tree.sha,
                parents: parent.map(|c| vec![c.sha]).unwrap_or_default(),
                author: None,
                committer: None,
            })
            .await?;

        if tip.is_some() {
            self.update_ref(&ref_name, &created.sha, false).await?;
        } else {
            self.create_ref(&ref_name, &created.sha).await?;
        }
        Ok(created.sha)
    }

    async fn get_statuses(&self, sha: &ObjectId) -> Result<Vec<CommitStatus>> {
        let combined: ApiCombinedStatus = self
            .get(&self.repo_path(&format!("/commits/{sha}/status")))
            .await?;
        Ok(combined.statuses)
    }

    async fn get_commit(&self, sha: &ObjectId) -> Result<Commit> {
        let commit: ApiGitCommit = self
            .get(&self.repo_path(&format!("/git/commits/{sha}")))
            .await?;
        Ok(commit.into_commit())
    }

    async fn create_commit(&self, commit: CreateCommit) -> Result<Commit> {
        let created: ApiGitCommit = self.post(&self.repo_path("/git/commits"), &commit).await?;
        Ok(created.into_commit())
    }

    async fn get_branch(&self, name: &str) -> Result<Branch> {
        let branch: ApiBranch = self
            .get(&self.repo_path(&format!("/branches/{name}")))
            .await?;
        Ok(Branch {
            name: branch.name,
            commit: branch.commit.into_commit(),
        })
    }

    async fn create_branch(&self, name: &str, sha: &ObjectId) -> Result<RefInfo> {
        self.create_ref(&branch_ref(name), sha).await
    }

    async fn create_review(&self, review: CreateReview) -> Result<Review> {
        let pr: ApiPullRequest = self.post(&self.repo_path("/pulls"), &review).await?;
        Ok(pr.into_review())
    }

    async fn get_review(&self, number: u64) -> Result<Review> {
        let pr: ApiPullRequest = self
            .get(&self.repo_path(&format!("/pulls/{number}")))
            .await?;
        Ok(pr.into_review())
    }

    async fn find_open_review(&self, head: &str, base: &str) -> Result<Option<Review>> {
        let head_filter = format!("{}:{head}", self.owner);
        let prs: Vec<ApiPullRequest> = self
            .get_with_query(
                &self.repo_path("/pulls"),
                &[
                    ("head", head_filter.as_str()),
                    ("base", base),
                    ("state", "open"),
                ],
            )
            .await?;

        // The head filter is a prefix match, so the ref must be compared exactly
        Ok(prs
            .into_iter()
            .find(|pr| pr.head.ref_name == head)
            .map(ApiPullRequest::into_review))
    }

    async fn get_review_commits(&self, number: u64) -> Result<Vec<Commit>> {
        let commits: Vec<ApiNestedCommit> = self
            .get(&self.repo_path(&format!("/pulls/{number}/commits")))
            .await?;
        Ok(commits.into_iter().map(ApiNestedCommit::into_commit).collect())
    }

    async fn merge_review(&self, number: u64, merge: MergeReview) -> Result<MergeResult> {
        let path = self.repo_path(&format!("/pulls/{number}/merge"));
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(%url, "PUT");
        let response = self
            .authorized(self.client.put(&url))
            .json(&merge)
            .send()
            .await?;

        if response.status() == StatusCode::METHOD_NOT_ALLOWED {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::MergeConflict { number, message });
        }
        Self::handle_response(&path, response).await
    }

    async fn close_review(&self, number: u64) -> Result<()> {
        let _: IgnoredAny = self
            .patch(
                &self.repo_path(&format!("/pulls/{number}")),
                &ApiCloseReview { state: "closed" },
            )
            .await?;
        Ok(())
    }
}
