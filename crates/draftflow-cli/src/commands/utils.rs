use std::path::Path;

use anyhow::{Context, Result, bail};
use draftflow_core::config::Config;
use draftflow_core::{ContentKey, EditorialWorkflow};
use draftflow_host::{Auth, HttpHost};
use tokio::runtime::Runtime;

/// Loaded configuration plus an authenticated host client.
pub struct Session {
    pub config: Config,
    pub host: HttpHost,
    pub rt: Runtime,
}

impl Session {
    /// Load config from `path` and connect to the configured repository.
    pub fn open(path: &Path) -> Result<Self> {
        let config = Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?;

        if config.host.owner.is_empty() || config.host.repo.is_empty() {
            bail!(
                "Repository not configured - set [host] owner and repo in {}",
                path.display()
            );
        }

        let auth = Auth::for_api_url(config.host.api_url.as_deref());
        let host = match &config.host.api_url {
            Some(url) => HttpHost::with_base_url(&auth, url, &config.host.owner, &config.host.repo),
            None => HttpHost::new(&auth, &config.host.owner, &config.host.repo),
        }
        .context("Failed to authenticate with the content host")?;

        let rt = Runtime::new()?;
        tracing::debug!(owner = %config.host.owner, repo = %config.host.repo, "session opened");

        Ok(Self { config, host, rt })
    }

    /// Workflow controller over this session's host.
    pub fn workflow(&self) -> EditorialWorkflow<'_, HttpHost> {
        EditorialWorkflow::new(&self.host, self.config.workflow.clone())
    }
}

/// Parse a content key given on the command line.
pub fn parse_key(key: &str) -> Result<ContentKey> {
    ContentKey::new(key).with_context(|| format!("Invalid content key '{key}'"))
}
