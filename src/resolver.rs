//! Turns tag and branch listings into semantic versions.
//!
//! Every resolver is parse-or-skip: candidates that do not follow the naming
//! convention are ignored, so unrelated tags and branches can live in the
//! same repository.

use tracing::trace;

use crate::domain::{ReleaseLine, Version};

/// Resolves versions of a single release line
#[derive(Debug, Clone, Copy)]
pub struct VersionResolver<'a> {
    line: &'a ReleaseLine,
}

impl<'a> VersionResolver<'a> {
    pub fn new(line: &'a ReleaseLine) -> Self {
        VersionResolver { line }
    }

    /// Greatest version among tag (`<line>/vX.Y.Z`) and release branch
    /// (`release-<line>-X.Y`) names, or `0.0.0` when none match.
    pub fn latest_version<I, S>(&self, candidates: I) -> Version
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        candidates
            .into_iter()
            .filter_map(|candidate| {
                let candidate = candidate.as_ref();
                let parsed = self
                    .line
                    .parse_tag(candidate)
                    .or_else(|| self.line.parse_branch(candidate));
                if parsed.is_none() {
                    trace!(candidate, line = %self.line, "skipping non-conforming name");
                }
                parsed
            })
            .max()
            .unwrap_or_default()
    }

    /// Greatest tagged version within the `X.Y` series of `series`.
    ///
    /// Branch names are not considered: a release branch carries no patch.
    pub fn latest_in_series<I, S>(&self, series: &Version, candidates: I) -> Option<Version>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        candidates
            .into_iter()
            .filter_map(|candidate| self.line.parse_tag(candidate.as_ref()))
            .filter(|version| version.same_series(series))
            .max()
    }
}

/// Greatest plain semantic version tag (`vX.Y.Z` or `X.Y.Z`), ignoring
/// pre-releases and anything that is not a version.
///
/// Used when packaging without a release line.
pub fn latest_bare_version<I, S>(candidates: I) -> Option<Version>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    candidates
        .into_iter()
        .filter_map(|candidate| {
            let candidate = candidate.as_ref();
            let text = candidate.strip_prefix('v').unwrap_or(candidate);
            semver::Version::parse(text).ok()
        })
        .filter(|version| version.pre.is_empty())
        .max()
        .map(|version| Version::from(&version))
}
