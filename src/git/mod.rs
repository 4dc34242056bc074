//! Git operations abstraction layer
//!
//! Release logic depends on two capability traits rather than on a concrete
//! repository:
//!
//! - [RepoQuery]: read-only history queries (current commit, tags, remote
//!   branch listing)
//! - [RefPublisher]: the mutations a release performs (create branch or tag,
//!   push a ref)
//!
//! Implementations:
//!
//! - [repository::Git2Repository]: a real implementation using the `git2` crate
//! - [mock::MockRepository]: an in-memory implementation for testing
//!
//! ```rust
//! # use release_tool::git::RepoQuery;
//! # fn example<R: RepoQuery>(repo: &R) -> release_tool::Result<()> {
//! let head = repo.current_commit()?;
//! let tags = repo.tags_reachable_from(head)?;
//! # Ok(())
//! # }
//! ```

pub mod mock;
pub mod repository;

pub use mock::MockRepository;
pub use repository::Git2Repository;

use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::error::Result;
use git2::Oid;

/// A branch as advertised by a remote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteBranch {
    /// Short branch name, without `refs/heads/`
    pub name: String,
    /// The commit the branch points at on the remote
    pub commit: Oid,
}

/// Read-only queries against the version-control history
///
/// No method touches local branches or tags. Implementations map their underlying
/// failures to [crate::error::ReleaseToolError::VcsUnavailable], and an empty
/// history (unborn HEAD) to
/// [crate::error::ReleaseToolError::NoCommitsFound].
pub trait RepoQuery {
    /// The commit HEAD resolves to
    fn current_commit(&self) -> Result<Oid>;

    /// The short name of the checked-out branch, or `HEAD` when detached
    fn current_branch_name(&self) -> Result<String>;

    /// All tag names whose target commit is exactly `commit`
    fn tags_pointing_at(&self, commit: Oid) -> Result<BTreeSet<String>>;

    /// All tag names whose target commit is `commit` or one of its ancestors
    fn tags_reachable_from(&self, commit: Oid) -> Result<BTreeSet<String>>;

    /// Every branch on `remote`, ordered by name
    ///
    /// This contacts the remote. An empty remote yields an empty list; the
    /// git2 implementation refreshes `refs/remotes/<remote>/*` on the way.
    fn remote_branches(&self, remote: &str) -> Result<Vec<RemoteBranch>>;

    /// The newest commit reachable from HEAD that changes any of `paths`
    ///
    /// Paths are relative to the repository root. Returns `Ok(None)` when
    /// no commit touches them.
    fn last_commit_touching(&self, paths: &[PathBuf]) -> Result<Option<Oid>>;
}

/// Ref mutations performed when publishing a release
pub trait RefPublisher {
    /// Create a local branch at `commit`
    ///
    /// Succeeds without change when the branch already points at `commit`;
    /// fails when it exists elsewhere.
    fn create_branch(&self, name: &str, commit: Oid) -> Result<()>;

    /// Create a lightweight tag at `commit`, replacing an existing one when
    /// `force` is set
    fn create_tag(&self, name: &str, commit: Oid, force: bool) -> Result<()>;

    /// Push a fully qualified local ref (`refs/heads/..` or `refs/tags/..`)
    /// to the same name on `remote`
    ///
    /// Without `force` a non-fast-forward update is rejected with
    /// [crate::error::ReleaseToolError::PushRejected].
    fn push_ref(&self, remote: &str, refname: &str, force: bool) -> Result<()>;
}
