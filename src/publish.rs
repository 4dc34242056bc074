//! Release publishing state machine.
//!
//! The state is taken from the checked-out branch when the command runs:
//!
//! - on `release-<line>-X.Y` the next patch of the `X.Y` series is tagged and
//!   the branch itself is pushed
//! - anywhere else a new `release-<line>-X.(Y+1)` branch is cut at the
//!   release commit, pushed without force, and tagged `X.(Y+1).0`
//!
//! Tags are always moved and pushed with force; branches never are.

use std::io::Write;
use std::path::PathBuf;

use git2::Oid;
use tracing::{debug, info};

use crate::domain::{BranchContext, ReleaseLine, ReleaseState, Version, VersionBump};
use crate::error::{ReleaseToolError, Result};
use crate::git::{RefPublisher, RepoQuery};
use crate::resolver::VersionResolver;
use crate::ui;

/// Everything a publish run is about to do, computed without side effects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleasePlan {
    pub state: ReleaseState,
    /// The commit the tag (and a new branch) will point at
    pub commit: Oid,
    pub version: Version,
    pub tag: String,
    pub branch: String,
}

impl ReleasePlan {
    /// True when the run cuts a new release branch
    pub fn creates_branch(&self) -> bool {
        self.state == ReleaseState::OnMainline
    }
}

/// Publishes the next version of a release line
pub struct ReleasePublisher<'a, R> {
    repo: &'a R,
    line: ReleaseLine,
    remote: String,
    paths: Vec<PathBuf>,
}

impl<'a, R: RepoQuery + RefPublisher> ReleasePublisher<'a, R> {
    pub fn new(repo: &'a R, line: ReleaseLine, remote: impl Into<String>) -> Self {
        ReleasePublisher {
            repo,
            line,
            remote: remote.into(),
            paths: Vec::new(),
        }
    }

    /// Release the newest commit touching `paths` instead of HEAD
    pub fn with_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.paths = paths;
        self
    }

    /// Decide the next version and ref names without touching any ref
    pub fn plan(&self) -> Result<ReleasePlan> {
        let commit = self.release_commit()?;
        let branch = BranchContext::new(self.repo.current_branch_name()?, &self.line);
        let resolver = VersionResolver::new(&self.line);
        let reachable = self.repo.tags_reachable_from(commit)?;

        let (version, branch_name) = match branch.state {
            ReleaseState::OnReleaseBranch { series } => {
                // Tags already on the release commit are not "prior" releases,
                // so re-running on an unchanged commit re-publishes the same tag.
                let own = self.repo.tags_pointing_at(commit)?;
                let prior = reachable.iter().filter(|tag| !own.contains(*tag));
                let version = match resolver.latest_in_series(&series, prior) {
                    Some(latest) => latest.bump(&VersionBump::Patch)?,
                    None => series,
                };
                (version, branch.name.clone())
            }
            ReleaseState::OnMainline => {
                let remote_branches = self.repo.remote_branches(&self.remote)?;
                let candidates = reachable
                    .iter()
                    .map(String::as_str)
                    .chain(remote_branches.iter().map(|b| b.name.as_str()));
                let latest = resolver.latest_version(candidates);
                let version = latest.bump(&VersionBump::Minor)?;
                (version, self.line.branch_name(&version))
            }
        };

        let plan = ReleasePlan {
            state: branch.state,
            commit,
            version,
            tag: self.line.tag_name(&version),
            branch: branch_name,
        };
        debug!(?plan, "planned release");
        Ok(plan)
    }

    /// Plan and carry out the release, writing contract output to `out`
    ///
    /// Each line is written as soon as its push succeeds, so a failure
    /// leaves the completed steps visible.
    pub fn publish<W: Write>(&self, out: &mut W) -> Result<ReleasePlan> {
        let plan = self.plan()?;
        let branch_ref = format!("refs/heads/{}", plan.branch);

        if plan.creates_branch() {
            self.repo.create_branch(&plan.branch, plan.commit)?;
            self.repo.push_ref(&self.remote, &branch_ref, false)?;
            ui::write_success(out, &format!("Pushed new release branch: {}", plan.branch))?;
        } else {
            self.repo.push_ref(&self.remote, &branch_ref, false)?;
            ui::write_success(out, &format!("Pushed release branch: {}", plan.branch))?;
        }

        self.repo.create_tag(&plan.tag, plan.commit, true)?;
        self.repo
            .push_ref(&self.remote, &format!("refs/tags/{}", plan.tag), true)?;
        ui::write_success(out, &format!("Created and pushed tag: {}", plan.tag))?;

        info!(line = %self.line, version = %plan.version, "published release");
        Ok(plan)
    }

    fn release_commit(&self) -> Result<Oid> {
        if self.paths.is_empty() {
            return self.repo.current_commit();
        }

        self.repo
            .last_commit_touching(&self.paths)?
            .ok_or_else(|| {
                let paths: Vec<String> = self
                    .paths
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect();
                ReleaseToolError::no_commits(format!(
                    "for the specified paths: {}",
                    paths.join(", ")
                ))
            })
    }
}
