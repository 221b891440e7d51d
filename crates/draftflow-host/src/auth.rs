//! Token resolution for the host API.

use std::process::Command;

use secrecy::SecretString;

use crate::error::{Error, Result};

/// Environment variables checked, in order, by [`Auth::for_api_url`].
const TOKEN_VARS: [&str; 2] = ["DRAFTFLOW_TOKEN", "GITHUB_TOKEN"];

/// Where the API token comes from.
#[derive(Debug, Clone)]
pub enum Auth {
    /// Ask `gh auth token`, optionally for a self-hosted hostname.
    GhCli { hostname: Option<String> },

    /// Read the named environment variable.
    EnvVar(String),

    /// A token supplied directly.
    Token(SecretString),
}

impl Auth {
    /// Pick the first token source that is available.
    ///
    /// Checks `DRAFTFLOW_TOKEN`, then `GITHUB_TOKEN`, then falls back to gh,
    /// asking it for the host behind `api_url` when that is self-hosted.
    #[must_use]
    pub fn for_api_url(api_url: Option<&str>) -> Self {
        if let Some(var) = TOKEN_VARS.iter().find(|var| env_token(var).is_some()) {
            return Self::EnvVar((*var).to_string());
        }
        Self::GhCli {
            hostname: api_url.and_then(gh_hostname),
        }
    }

    /// Resolve to a token.
    ///
    /// # Errors
    /// Returns [`Error::NoToken`] if the source yields nothing.
    pub fn resolve(&self) -> Result<SecretString> {
        match self {
            Self::GhCli { hostname } => gh_token(hostname.as_deref()),
            Self::EnvVar(var) => env_token(var).ok_or(Error::NoToken),
            Self::Token(token) => Ok(token.clone()),
        }
    }
}

fn env_token(var: &str) -> Option<SecretString> {
    std::env::var(var)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(SecretString::from)
}

/// Hostname gh knows a self-hosted API URL by; `None` for the public API.
fn gh_hostname(api_url: &str) -> Option<String> {
    let rest = api_url.split_once("://").map_or(api_url, |(_, rest)| rest);
    let host = rest.split('/').next().unwrap_or_default();

    match host {
        "" | "api.github.com" | "github.com" => None,
        host => Some(host.to_string()),
    }
}

fn gh_token(hostname: Option<&str>) -> Result<SecretString> {
    let mut cmd = Command::new("gh");
    cmd.args(["auth", "token"]);
    if let Some(hostname) = hostname {
        cmd.args(["--hostname", hostname]);
    }

    let output = cmd.output()?;
    if !output.status.success() {
        return Err(Error::NoToken);
    }

    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if token.is_empty() {
        return Err(Error::NoToken);
    }
    Ok(SecretString::from(token))
}
