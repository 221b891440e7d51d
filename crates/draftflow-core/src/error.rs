//! Error types for draftflow-core.

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in draftflow-core operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A host call failed for a reason other than absence or a refused merge.
    #[error("host unavailable: {0}")]
    HostUnavailable(draftflow_host::Error),

    /// The host reported that a ref, blob, file or review does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// No metadata record exists for the content key.
    #[error("entry '{0}' is not under editorial workflow")]
    NotUnderWorkflow(String),

    /// A branch's history does not have the expected shape.
    #[error("unexpected state on branch '{branch}': {reason}")]
    UnexpectedBranchState { branch: String, reason: String },

    /// An operation was refused by local configuration or policy.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The host refused to merge a review.
    #[error("review #{0} cannot be merged")]
    MergeConflict(u64),

    /// Invalid branch name.
    #[error("invalid branch name '{name}': {reason}")]
    InvalidBranchName {
        /// The invalid name.
        name: String,
        /// Why the name is invalid.
        reason: String,
    },

    /// Invalid content key.
    #[error("invalid content key '{key}': {reason}")]
    InvalidContentKey { key: String, reason: String },

    /// A file path cannot be placed in a tree.
    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// A tree leaf was persisted before its blob was uploaded.
    #[error("file '{0}' has no content address - upload it first")]
    MissingContentAddress(String),

    /// The requested status transition is not allowed.
    #[error("invalid status transition: {0}")]
    InvalidStatus(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error.
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Whether this error means the addressed thing does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<draftflow_host::Error> for Error {
    fn from(err: draftflow_host::Error) -> Self {
        match err {
            draftflow_host::Error::NotFound(what) => Self::NotFound(what),
            draftflow_host::Error::MergeConflict { number, .. } => Self::MergeConflict(number),
            other => Self::HostUnavailable(other),
        }
    }
}
