use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use git2::{
    AutotagOption, BranchType, Cred, CredentialType, DiffOptions, ErrorClass, ErrorCode,
    FetchOptions, FetchPrune, Oid, PushOptions, RemoteCallbacks, Repository as Git2Repo, Sort,
};
use tracing::{debug, info};

use crate::error::{ReleaseToolError, Result};
use crate::git::{RefPublisher, RemoteBranch, RepoQuery};

/// Credential attempts before giving up; libgit2 re-invokes the callback on
/// every failed attempt.
const MAX_CREDENTIAL_ATTEMPTS: usize = 4;

/// Wrapper around git2::Repository with our trait interface
pub struct Git2Repository {
    repo: Git2Repo,
}

impl Git2Repository {
    /// Discover the repository containing `path`
    pub fn discover<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let repo = Git2Repo::discover(path).map_err(|e| {
            ReleaseToolError::vcs(format!(
                "Not in a git repository ({}): {}",
                path.display(),
                e.message()
            ))
        })?;
        debug!(path = %repo.path().display(), "opened repository");

        Ok(Git2Repository { repo })
    }

    /// Create from existing git2::Repository
    pub fn from_git2(repo: Git2Repo) -> Self {
        Git2Repository { repo }
    }

    /// Every tag paired with the commit it peels to.
    ///
    /// Handles both lightweight and annotated tags; tags of non-commit
    /// objects are skipped.
    fn tag_targets(&self) -> Result<Vec<(String, Oid)>> {
        let names = self.repo.tag_names(None)?;
        let mut targets = Vec::new();

        for name in names.iter().flatten() {
            let reference = self.repo.find_reference(&format!("refs/tags/{}", name))?;
            match reference.peel_to_commit() {
                Ok(commit) => targets.push((name.to_string(), commit.id())),
                Err(e) => debug!(tag = name, error = %e, "skipping tag without commit target"),
            }
        }

        Ok(targets)
    }

    fn find_remote(&self, remote_name: &str) -> Result<git2::Remote<'_>> {
        self.repo
            .find_remote(remote_name)
            .map_err(|_| ReleaseToolError::vcs(format!("Remote '{}' not found", remote_name)))
    }
}

/// Build remote callbacks that authenticate via SSH keys from ~/.ssh/, the
/// SSH agent, git credential helpers, or default credentials.
fn remote_callbacks<'a>() -> RemoteCallbacks<'a> {
    let mut callbacks = RemoteCallbacks::new();
    let mut attempts = 0usize;

    callbacks.credentials(move |url, username_from_url, allowed_types| {
        attempts += 1;
        if attempts > MAX_CREDENTIAL_ATTEMPTS {
            return Err(git2::Error::from_str(&format!(
                "authentication failed for {}",
                url
            )));
        }

        let username = username_from_url.unwrap_or("git");

        if allowed_types.contains(CredentialType::SSH_KEY) {
            if let Some(home) = dirs::home_dir() {
                for key in ["id_ed25519", "id_rsa", "id_ecdsa"] {
                    let path = home.join(".ssh").join(key);
                    if path.exists() {
                        if let Ok(cred) = Cred::ssh_key(username, None, &path, None) {
                            return Ok(cred);
                        }
                    }
                }
            }

            if let Ok(cred) = Cred::ssh_key_from_agent(username) {
                return Ok(cred);
            }
        }

        if allowed_types.contains(CredentialType::USER_PASS_PLAINTEXT) {
            if let Ok(config) = git2::Config::open_default() {
                if let Ok(cred) = Cred::credential_helper(&config, url, username_from_url) {
                    return Ok(cred);
                }
            }
        }

        Cred::default()
    });

    callbacks
}

impl RepoQuery for Git2Repository {
    fn current_commit(&self) -> Result<Oid> {
        let head = self.repo.head().map_err(|e| match e.code() {
            ErrorCode::UnbornBranch | ErrorCode::NotFound => {
                ReleaseToolError::no_commits("in repository: HEAD has no history")
            }
            _ => e.into(),
        })?;

        let commit = head.peel_to_commit()?;
        Ok(commit.id())
    }

    fn current_branch_name(&self) -> Result<String> {
        let head = self.repo.head().map_err(|e| match e.code() {
            ErrorCode::UnbornBranch | ErrorCode::NotFound => {
                ReleaseToolError::no_commits("in repository: HEAD has no history")
            }
            _ => e.into(),
        })?;

        if head.is_branch() {
            let name = head
                .shorthand()
                .ok_or_else(|| ReleaseToolError::vcs("Branch name is not valid UTF-8"))?;
            Ok(name.to_string())
        } else {
            Ok("HEAD".to_string())
        }
    }

    fn tags_pointing_at(&self, commit: Oid) -> Result<BTreeSet<String>> {
        Ok(self
            .tag_targets()?
            .into_iter()
            .filter(|(_, target)| *target == commit)
            .map(|(name, _)| name)
            .collect())
    }

    fn tags_reachable_from(&self, commit: Oid) -> Result<BTreeSet<String>> {
        let mut reachable = BTreeSet::new();

        for (name, target) in self.tag_targets()? {
            if target == commit || self.repo.graph_descendant_of(commit, target)? {
                reachable.insert(name);
            }
        }

        debug!(commit = %commit, count = reachable.len(), "collected reachable tags");
        Ok(reachable)
    }

    fn remote_branches(&self, remote_name: &str) -> Result<Vec<RemoteBranch>> {
        let mut remote = self.find_remote(remote_name)?;
        let refspec = format!("+refs/heads/*:refs/remotes/{}/*", remote_name);

        let mut fetch_options = FetchOptions::new();
        fetch_options
            .remote_callbacks(remote_callbacks())
            .prune(FetchPrune::On)
            .download_tags(AutotagOption::None);

        remote
            .fetch(&[refspec.as_str()], Some(&mut fetch_options), None)
            .map_err(|e| {
                ReleaseToolError::vcs(format!(
                    "Failed to fetch from remote '{}': {}",
                    remote_name,
                    e.message()
                ))
            })?;

        let prefix = format!("{}/", remote_name);
        let mut branches = Vec::new();
        for entry in self.repo.branches(Some(BranchType::Remote))? {
            let (branch, _) = entry?;
            let Some(name) = branch.name()?.and_then(|n| n.strip_prefix(&prefix)) else {
                continue;
            };
            if name == "HEAD" {
                continue;
            }
            if let Some(commit) = branch.get().target() {
                branches.push(RemoteBranch {
                    name: name.to_string(),
                    commit,
                });
            }
        }

        branches.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(remote = remote_name, count = branches.len(), "listed remote branches");
        Ok(branches)
    }

    fn last_commit_touching(&self, paths: &[PathBuf]) -> Result<Option<Oid>> {
        let head = self.current_commit()?;

        let mut revwalk = self.repo.revwalk()?;
        revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)?;
        revwalk.push(head)?;

        let mut options = DiffOptions::new();
        for path in paths {
            options.pathspec(path.as_path());
        }

        for oid in revwalk {
            let oid = oid?;
            let commit = self.repo.find_commit(oid)?;
            let tree = commit.tree()?;
            let parent_tree = if commit.parent_count() > 0 {
                Some(commit.parent(0)?.tree()?)
            } else {
                None
            };

            let diff =
                self.repo
                    .diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), Some(&mut options))?;
            if diff.deltas().len() > 0 {
                return Ok(Some(oid));
            }
        }

        Ok(None)
    }
}

impl RefPublisher for Git2Repository {
    fn create_branch(&self, name: &str, commit: Oid) -> Result<()> {
        match self.repo.find_branch(name, BranchType::Local) {
            Ok(existing) => {
                if existing.get().target() == Some(commit) {
                    return Ok(());
                }
                Err(ReleaseToolError::push_rejected(
                    format!("refs/heads/{}", name),
                    "local branch already exists at a different commit",
                ))
            }
            Err(e) if e.code() == ErrorCode::NotFound => {
                let target = self.repo.find_commit(commit)?;
                self.repo.branch(name, &target, false)?;
                debug!(branch = name, commit = %commit, "created local branch");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn create_tag(&self, name: &str, commit: Oid, force: bool) -> Result<()> {
        let object = self.repo.find_object(commit, None)?;
        self.repo.tag_lightweight(name, &object, force)?;
        debug!(tag = name, commit = %commit, force, "created tag");
        Ok(())
    }

    fn push_ref(&self, remote_name: &str, refname: &str, force: bool) -> Result<()> {
        let mut remote = self.find_remote(remote_name)?;
        let refspec = format!("{}{}:{}", if force { "+" } else { "" }, refname, refname);
        info!(remote = remote_name, refspec = %refspec, "pushing");

        let mut rejection: Option<String> = None;
        let pushed = {
            let mut callbacks = remote_callbacks();
            callbacks.push_update_reference(|_refname, status| {
                if let Some(status) = status {
                    rejection = Some(status.to_string());
                }
                Ok(())
            });

            let mut push_options = PushOptions::new();
            push_options.remote_callbacks(callbacks);
            remote.push(&[refspec.as_str()], Some(&mut push_options))
        };

        if let Err(e) = pushed {
            return Err(match e.class() {
                ErrorClass::Net | ErrorClass::Ssh | ErrorClass::Http | ErrorClass::Ssl => {
                    ReleaseToolError::vcs(format!("Network error during push: {}", e.message()))
                }
                _ => ReleaseToolError::push_rejected(refname, e.message()),
            });
        }

        match rejection {
            Some(reason) => Err(ReleaseToolError::push_rejected(refname, reason)),
            None => Ok(()),
        }
    }
}
