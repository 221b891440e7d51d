//! Branch and content key naming.
//!
//! Provides a [`BranchName`] type that enforces git branch name rules
//! and rejects path traversal and shell metacharacters, plus the naming
//! scheme tying a [`ContentKey`] to its review branch and metadata file.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;

/// Reserved prefix of branches owned (and force-updatable) by the workflow.
pub const CMS_BRANCH_PREFIX: &str = "cms/";

/// Branch holding one metadata document per entry under workflow.
pub const METADATA_BRANCH: &str = "meta/_draftflow";

/// Whether `branch` is owned by the workflow.
#[must_use]
pub fn is_cms_branch(branch: &str) -> bool {
    branch.starts_with(CMS_BRANCH_PREFIX)
}

/// A validated git branch name.
///
/// # Examples
///
/// ```
/// use draftflow_core::BranchName;
///
/// let name = BranchName::new("cms/post-1").unwrap();
/// assert!(name.is_cms());
///
/// assert!(BranchName::new("../etc/passwd").is_err());
/// assert!(BranchName::new("name;rm -rf").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BranchName(String);

impl BranchName {
    /// Create a new validated branch name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBranchName`] if the name violates git's
    /// branch naming rules or contains dangerous characters.
    pub fn new(name: impl Into<String>) -> Result<Self, Error> {
        let name = name.into();
        validate_branch_name(&name)?;
        Ok(Self(name))
    }

    /// The review branch for a content key (`cms/<key>`).
    #[must_use]
    pub fn for_entry(key: &ContentKey) -> Self {
        // A valid key always yields a valid branch name
        Self(format!("{CMS_BRANCH_PREFIX}{key}"))
    }

    /// Get the branch name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this branch is owned by the workflow.
    #[must_use]
    pub fn is_cms(&self) -> bool {
        is_cms_branch(&self.0)
    }

    /// The content key of a workflow branch.
    #[must_use]
    pub fn content_key(&self) -> Option<ContentKey> {
        self.0
            .strip_prefix(CMS_BRANCH_PREFIX)
            .and_then(|key| ContentKey::new(key).ok())
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::ops::Deref for BranchName {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for BranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for BranchName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for BranchName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Identifier of an entry under editorial workflow (e.g. `posts-hello-world`).
///
/// Keys name both the review branch and the metadata file, so they are
/// restricted to a single safe path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentKey(String);

impl ContentKey {
    /// Create a new validated content key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidContentKey`] if the key is empty, contains a
    /// `/`, starts with `.` or is not a valid branch component.
    pub fn new(key: impl Into<String>) -> Result<Self, Error> {
        let key = key.into();
        let invalid = |reason: &str| Error::InvalidContentKey {
            key: key.clone(),
            reason: reason.to_string(),
        };

        if key.is_empty() {
            return Err(invalid("key cannot be empty"));
        }
        if key.contains('/') {
            return Err(invalid("key cannot contain '/'"));
        }
        if key.starts_with('.') {
            return Err(invalid("key cannot start with '.'"));
        }
        if let Err(Error::InvalidBranchName { reason, .. }) =
            validate_branch_name(&format!("{CMS_BRANCH_PREFIX}{key}"))
        {
            return Err(invalid(&reason.replace("branch name", "key")));
        }

        Ok(Self(key))
    }

    /// Get the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path of this key's metadata document on [`METADATA_BRANCH`].
    #[must_use]
    pub fn metadata_path(&self) -> String {
        format!("{}.json", self.0)
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<&str> for ContentKey {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl Serialize for ContentKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ContentKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}

impl Serialize for BranchName {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for BranchName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}

/// Validate a branch name against git rules and security constraints.
fn validate_branch_name(name: &str) -> Result<(), Error> {
    let invalid = |reason: String| Error::InvalidBranchName {
        name: name.to_string(),
        reason,
    };

    if name.is_empty() {
        return Err(invalid("branch name cannot be empty".into()));
    }
    if name == "@" {
        return Err(invalid("branch name cannot be '@'".into()));
    }
    if name.starts_with('.') || name.ends_with('.') {
        return Err(invalid("branch name cannot start or end with '.'".into()));
    }
    // git's rule is case-sensitive
    #[allow(clippy::case_sensitive_file_extension_comparisons)]
    if name.ends_with(".lock") {
        return Err(invalid("branch name cannot end with '.lock'".into()));
    }
    if name.starts_with('/') || name.ends_with('/') {
        return Err(invalid("branch name cannot start or end with '/'".into()));
    }

    for sequence in ["..", "//", "@{", "/."] {
        if name.contains(sequence) {
            return Err(invalid(format!("branch name cannot contain '{sequence}'")));
        }
    }

    if let Some(c) = name.chars().find(char::is_ascii_control) {
        return Err(invalid(format!(
            "branch name cannot contain control character {:#04x}",
            u32::from(c)
        )));
    }

    // Git-forbidden characters first, then shell metacharacters
    if let Some(c) = name.chars().find(|c| " ~^:?*[".contains(*c)) {
        return Err(invalid(format!("branch name cannot contain '{c}'")));
    }
    if let Some(c) = name.chars().find(|c| "$;|&><`\\\"'(){}!".contains(*c)) {
        return Err(invalid(format!(
            "branch name cannot contain shell metacharacter '{c}'"
        )));
    }

    Ok(())
}
