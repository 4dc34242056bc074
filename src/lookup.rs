use tracing::debug;

use crate::domain::{ReleaseLine, Version};
use crate::error::{ReleaseToolError, Result};
use crate::git::RepoQuery;

/// Reports the release version attached to the exact HEAD commit
pub struct VersionLookup<'a, R> {
    repo: &'a R,
    line: ReleaseLine,
}

impl<'a, R: RepoQuery> VersionLookup<'a, R> {
    pub fn new(repo: &'a R, line: ReleaseLine) -> Self {
        VersionLookup { repo, line }
    }

    /// The version of the line's tag on HEAD
    ///
    /// Tags on ancestors do not count. When several tags of the line point at
    /// HEAD the greatest version wins.
    pub fn version_at_head(&self) -> Result<Version> {
        let head = self.repo.current_commit()?;
        let tags = self.repo.tags_pointing_at(head)?;
        debug!(commit = %head, ?tags, "tags at HEAD");

        tags.iter()
            .filter_map(|tag| self.line.parse_tag(tag))
            .max()
            .ok_or_else(|| ReleaseToolError::head_not_tagged(self.line.name()))
    }
}
