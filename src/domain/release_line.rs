use std::fmt;

use crate::domain::Version;
use crate::error::{ReleaseToolError, Result};

/// A named family of versions, e.g. `service-a`.
///
/// The line namespaces both tag names (`<line>/vX.Y.Z`) and release branch
/// names (`release-<line>-X.Y`). Versions of different lines are never
/// compared against each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReleaseLine {
    name: String,
}

impl ReleaseLine {
    /// Create a release line, rejecting names that cannot form valid refs.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(ReleaseToolError::config(format!(
                "Invalid release line name: '{}'",
                name
            )));
        }

        let line = ReleaseLine { name };
        let sample = Version::default();
        let tag_ref = format!("refs/tags/{}", line.tag_name(&sample));
        let branch_ref = format!("refs/heads/{}", line.branch_name(&sample));
        if !git2::Reference::is_valid_name(&tag_ref) || !git2::Reference::is_valid_name(&branch_ref)
        {
            return Err(ReleaseToolError::config(format!(
                "Release line '{}' does not produce valid ref names",
                line.name
            )));
        }

        Ok(line)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tag name for a version, e.g. `service-a/v1.2.3`.
    pub fn tag_name(&self, version: &Version) -> String {
        format!("{}{}", self.tag_prefix(), version)
    }

    /// Release branch name for a version's series, e.g. `release-service-a-1.2`.
    pub fn branch_name(&self, version: &Version) -> String {
        format!("{}{}.{}", self.branch_prefix(), version.major, version.minor)
    }

    /// Parse a tag name of this line. Anything else yields `None`.
    ///
    /// Accepts both short names and `refs/tags/` qualified names.
    pub fn parse_tag(&self, tag: &str) -> Option<Version> {
        let short = tag.strip_prefix("refs/tags/").unwrap_or(tag);
        Version::parse_triple(short.strip_prefix(&self.tag_prefix())?)
    }

    /// Parse a release branch name of this line; patch is always zero.
    ///
    /// Accepts both short names and `refs/heads/` qualified names.
    pub fn parse_branch(&self, branch: &str) -> Option<Version> {
        let short = branch.strip_prefix("refs/heads/").unwrap_or(branch);
        Version::parse_pair(short.strip_prefix(&self.branch_prefix())?)
    }

    fn tag_prefix(&self) -> String {
        format!("{}/v", self.name)
    }

    fn branch_prefix(&self) -> String {
        format!("release-{}-", self.name)
    }
}

impl fmt::Display for ReleaseLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
