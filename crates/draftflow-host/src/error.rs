//! Error types for draftflow-host.

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during host API operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Authentication failed or token missing.
    #[error("host authentication failed - set DRAFTFLOW_TOKEN or run `gh auth login`")]
    AuthenticationFailed,

    /// Token not found.
    #[error("no host token found - set DRAFTFLOW_TOKEN or GITHUB_TOKEN")]
    NoToken,

    /// API rate limit exceeded.
    #[error("host API rate limit exceeded - wait and try again")]
    RateLimited,

    /// The requested object, ref, file or review does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The host refused to merge a review request.
    #[error("review #{number} cannot be merged: {message}")]
    MergeConflict { number: u64, message: String },

    /// API error with status code.
    #[error("host API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    /// The host returned content that could not be decoded.
    #[error("invalid content from host: {0}")]
    InvalidContent(String),

    /// Network error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("failed to parse host response: {0}")]
    Parse(#[from] serde_json::Error),

    /// IO error (e.g., reading gh CLI token).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error means the addressed thing does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether this error is a rejected merge.
    #[must_use]
    pub const fn is_merge_conflict(&self) -> bool {
        matches!(self, Self::MergeConflict { .. })
    }
}
