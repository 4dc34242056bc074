use std::fmt;
use std::path::PathBuf;

/// Warnings raised when a repository is missing or has no usable history.
/// These are non-fatal issues that should be reported to the user.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundaryWarning {
    /// The packaged directory is not inside a git repository
    NotARepository { path: PathBuf },
    /// The repository exists but HEAD has no commits
    UnbornHead { path: PathBuf },
    /// No version tag is reachable from HEAD
    UntaggedHistory { line: Option<String> },
}

impl fmt::Display for BoundaryWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundaryWarning::NotARepository { path } => write!(
                f,
                "'{}' is not inside a git repository, using version 0.0.0",
                path.display()
            ),
            BoundaryWarning::UnbornHead { path } => write!(
                f,
                "Repository at '{}' has no commits yet, using version 0.0.0",
                path.display()
            ),
            BoundaryWarning::UntaggedHistory { line: Some(line) } => write!(
                f,
                "No '{}/v*' tag is reachable from HEAD, using version 0.0.0",
                line
            ),
            BoundaryWarning::UntaggedHistory { line: None } => write!(
                f,
                "No version tag is reachable from HEAD, using version 0.0.0"
            ),
        }
    }
}
