use crate::error::{ReleaseToolError, Result};
use std::fmt;

/// Semantic version representation
///
/// Ordering is major, then minor, then patch, each compared numerically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Version {
    /// Create a new version
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Version {
            major,
            minor,
            patch,
        }
    }

    /// Parse a plain `X.Y.Z` version, optionally prefixed with `v` or `V`.
    ///
    /// Used for user-supplied versions; tag and branch names go through
    /// [`crate::domain::ReleaseLine`] which is stricter about the prefix.
    pub fn parse(input: &str) -> Result<Self> {
        let clean = input
            .strip_prefix('v')
            .or_else(|| input.strip_prefix('V'))
            .unwrap_or(input);

        Self::parse_triple(clean).ok_or_else(|| {
            ReleaseToolError::config(format!(
                "Invalid version format: '{}' - expected X.Y.Z",
                input
            ))
        })
    }

    /// Parse exactly `X.Y.Z` with decimal components and nothing else.
    pub(crate) fn parse_triple(s: &str) -> Option<Self> {
        let mut parts = s.split('.');
        let major = parse_component(parts.next()?)?;
        let minor = parse_component(parts.next()?)?;
        let patch = parse_component(parts.next()?)?;
        if parts.next().is_some() {
            return None;
        }
        Some(Version::new(major, minor, patch))
    }

    /// Parse exactly `X.Y`; patch is implicitly zero.
    pub(crate) fn parse_pair(s: &str) -> Option<Self> {
        let (major, minor) = s.split_once('.')?;
        Some(Version::new(
            parse_component(major)?,
            parse_component(minor)?,
            0,
        ))
    }

    /// Bump version according to bump type
    ///
    /// Fails instead of wrapping when the bumped component would overflow.
    pub fn bump(&self, bump_type: &VersionBump) -> Result<Self> {
        let bumped = match bump_type {
            VersionBump::Minor => self.minor.checked_add(1).map(|minor| Version {
                major: self.major,
                minor,
                patch: 0,
            }),
            VersionBump::Patch => self.patch.checked_add(1).map(|patch| Version {
                major: self.major,
                minor: self.minor,
                patch,
            }),
        };

        bumped.ok_or_else(|| {
            ReleaseToolError::config(format!(
                "Cannot bump version {}: {:?} component overflows",
                self, bump_type
            ))
        })
    }

    /// True when both versions share major and minor.
    pub fn same_series(&self, other: &Version) -> bool {
        self.major == other.major && self.minor == other.minor
    }
}

fn parse_component(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl From<&semver::Version> for Version {
    fn from(v: &semver::Version) -> Self {
        Version::new(v.major, v.minor, v.patch)
    }
}

/// Version bump type decision
///
/// Majors are never bumped automatically; a new major line starts from a
/// manually created tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionBump {
    Minor,
    Patch,
}
