//! Configuration management for draftflow.

use std::fs;
use std::path::Path;
use std::time::Duration;

use draftflow_host::{MergeMethod, Signature};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::metadata::WorkflowStatus;

/// draftflow configuration, usually loaded from `draftflow.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Editorial workflow settings.
    #[serde(default)]
    pub workflow: WorkflowConfig,

    /// Host connection settings.
    #[serde(default)]
    pub host: HostConfig,
}

impl Config {
    /// Load config from a TOML file.
    ///
    /// # Errors
    /// Returns error if file can't be read or parsed, or if the workflow
    /// settings are invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.workflow.validate()?;
        Ok(config)
    }

    /// Save config to a TOML file.
    ///
    /// # Errors
    /// Returns error if serialization or write fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| std::io::Error::other(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }
}

/// Editorial workflow settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Branch that reviews target and publishing lands on.
    #[serde(default = "default_base_branch")]
    pub base_branch: String,

    /// Status recorded when a draft is first opened.
    #[serde(default = "default_initial_status")]
    pub initial_status: WorkflowStatus,

    /// How reviews are merged on publish.
    #[serde(default)]
    pub merge_method: MergeMethod,

    /// Whether attached files live in an external asset store.
    ///
    /// When set, updates fast-forward the review branch instead of rebasing it.
    #[serde(default)]
    pub asset_store: bool,

    /// Lifetime of cached metadata records, in seconds.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Body of newly opened reviews.
    #[serde(default = "default_review_body")]
    pub review_body: String,

    /// Commit message of the merge made on publish.
    #[serde(default = "default_merge_message")]
    pub merge_message: String,

    /// Author recorded on workflow commits (host default when unset).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<AuthorConfig>,
}

impl WorkflowConfig {
    /// Metadata cache lifetime.
    #[must_use]
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Check settings that deserialize fine but cannot be honoured.
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] if drafts would open as published.
    pub fn validate(&self) -> Result<()> {
        if self.initial_status == WorkflowStatus::Published {
            return Err(Error::Configuration(
                "workflow.initial_status cannot be published - entries are published with publish"
                    .into(),
            ));
        }
        Ok(())
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            base_branch: default_base_branch(),
            initial_status: default_initial_status(),
            merge_method: MergeMethod::default(),
            asset_store: false,
            cache_ttl_secs: default_cache_ttl_secs(),
            review_body: default_review_body(),
            merge_message: default_merge_message(),
            author: None,
        }
    }
}

fn default_base_branch() -> String {
    "main".into()
}

const fn default_initial_status() -> WorkflowStatus {
    WorkflowStatus::PendingReview
}

const fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_review_body() -> String {
    "Automatically generated by draftflow".into()
}

fn default_merge_message() -> String {
    "Automatically generated. Merged by draftflow.".into()
}

/// Commit author identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorConfig {
    pub name: String,
    pub email: String,
}

impl AuthorConfig {
    /// Signature for a commit made now.
    #[must_use]
    pub fn signature(&self) -> Signature {
        Signature {
            name: self.name.clone(),
            email: self.email.clone(),
            date: chrono::Utc::now(),
        }
    }
}

/// Host connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HostConfig {
    /// Custom API URL for self-hosted instances.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Repository owner.
    #[serde(default)]
    pub owner: String,

    /// Repository name.
    #[serde(default)]
    pub repo: String,
}
