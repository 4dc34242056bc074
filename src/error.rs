use std::path::PathBuf;

use thiserror::Error;

/// Unified error type for release-tool operations
#[derive(Error, Debug)]
pub enum ReleaseToolError {
    #[error("Version control unavailable: {0}")]
    VcsUnavailable(String),

    #[error("no commits found {0}")]
    NoCommitsFound(String),

    #[error("current HEAD is not tagged with a version for release line '{line}'")]
    HeadNotTagged { line: String },

    #[error("Push of '{refname}' rejected: {reason}")]
    PushRejected { refname: String, reason: String },

    #[error("failed to copy directory contents: directory does not exist: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("Failed to write archive: {0}")]
    ArchiveWrite(String),

    #[error("Failed to push image: {0}")]
    RegistryPush(String),

    #[error("Malformed image reference '{reference}': {reason}")]
    MalformedReference { reference: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for Results in release-tool
pub type Result<T> = std::result::Result<T, ReleaseToolError>;

impl From<git2::Error> for ReleaseToolError {
    fn from(err: git2::Error) -> Self {
        ReleaseToolError::VcsUnavailable(err.message().to_string())
    }
}

impl ReleaseToolError {
    /// Create a version-control error with context
    pub fn vcs(msg: impl Into<String>) -> Self {
        ReleaseToolError::VcsUnavailable(msg.into())
    }

    /// Create a "no commits" error; the message continues "no commits found ..."
    pub fn no_commits(msg: impl Into<String>) -> Self {
        ReleaseToolError::NoCommitsFound(msg.into())
    }

    pub fn head_not_tagged(line: impl Into<String>) -> Self {
        ReleaseToolError::HeadNotTagged { line: line.into() }
    }

    pub fn push_rejected(refname: impl Into<String>, reason: impl Into<String>) -> Self {
        ReleaseToolError::PushRejected {
            refname: refname.into(),
            reason: reason.into(),
        }
    }

    /// Create an archive error with context
    pub fn archive(msg: impl Into<String>) -> Self {
        ReleaseToolError::ArchiveWrite(msg.into())
    }

    /// Create a registry error with context
    pub fn registry(msg: impl Into<String>) -> Self {
        ReleaseToolError::RegistryPush(msg.into())
    }

    pub fn malformed_reference(reference: impl Into<String>, reason: impl Into<String>) -> Self {
        ReleaseToolError::MalformedReference {
            reference: reference.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error with context
    pub fn config(msg: impl Into<String>) -> Self {
        ReleaseToolError::Config(msg.into())
    }
}
