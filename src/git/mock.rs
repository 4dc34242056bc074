use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::path::PathBuf;

use git2::Oid;

use crate::error::{ReleaseToolError, Result};
use crate::git::{RefPublisher, RemoteBranch, RepoQuery};

/// A push recorded by [MockRepository]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushRecord {
    pub remote: String,
    pub refname: String,
    pub commit: Oid,
    pub force: bool,
}

/// Mock repository for testing without actual git operations
///
/// Holds a commit graph, local and remote refs, and records every push.
/// Mutations go through `&self` like the real implementation.
pub struct MockRepository {
    parents: HashMap<Oid, Vec<Oid>>,
    touched: HashMap<Oid, Vec<PathBuf>>,
    head: Option<Oid>,
    branch: String,
    tags: RefCell<BTreeMap<String, Oid>>,
    local_branches: RefCell<BTreeMap<String, Oid>>,
    remote_refs: RefCell<BTreeMap<String, Oid>>,
    pushes: RefCell<Vec<PushRecord>>,
    rejected: HashSet<String>,
}

impl MockRepository {
    /// Create a new empty mock repository with an unborn `main` branch
    pub fn new() -> Self {
        MockRepository {
            parents: HashMap::new(),
            touched: HashMap::new(),
            head: None,
            branch: "main".to_string(),
            tags: RefCell::new(BTreeMap::new()),
            local_branches: RefCell::new(BTreeMap::new()),
            remote_refs: RefCell::new(BTreeMap::new()),
            pushes: RefCell::new(Vec::new()),
            rejected: HashSet::new(),
        }
    }

    /// Add a commit with its parents
    pub fn add_commit(&mut self, oid: Oid, parents: &[Oid]) {
        self.parents.insert(oid, parents.to_vec());
    }

    /// Add a commit that changes the given paths
    pub fn add_commit_touching(&mut self, oid: Oid, parents: &[Oid], paths: &[&str]) {
        self.add_commit(oid, parents);
        self.touched
            .insert(oid, paths.iter().map(PathBuf::from).collect());
    }

    /// Check out `branch` at `oid`
    pub fn set_head(&mut self, oid: Oid, branch: impl Into<String>) {
        let branch = branch.into();
        self.local_branches.get_mut().insert(branch.clone(), oid);
        self.branch = branch;
        self.head = Some(oid);
    }

    /// Detach HEAD at `oid`
    pub fn detach_head(&mut self, oid: Oid) {
        self.branch = "HEAD".to_string();
        self.head = Some(oid);
    }

    /// Add a tag pointing to an OID
    pub fn add_tag(&mut self, name: impl Into<String>, oid: Oid) {
        self.tags.get_mut().insert(name.into(), oid);
    }

    /// Add a branch that only exists on the remote
    pub fn add_remote_branch(&mut self, name: &str, oid: Oid) {
        self.remote_refs
            .get_mut()
            .insert(format!("refs/heads/{}", name), oid);
    }

    /// Make every push of `refname` fail as if the remote refused it
    pub fn reject_push(&mut self, refname: impl Into<String>) {
        self.rejected.insert(refname.into());
    }

    /// Pushes performed so far, in order
    pub fn pushes(&self) -> Vec<PushRecord> {
        self.pushes.borrow().clone()
    }

    /// Where a local tag points
    pub fn tag_target(&self, name: &str) -> Option<Oid> {
        self.tags.borrow().get(name).copied()
    }

    /// Where a fully qualified ref points on the remote
    pub fn remote_ref(&self, refname: &str) -> Option<Oid> {
        self.remote_refs.borrow().get(refname).copied()
    }

    fn is_ancestor_or_equal(&self, ancestor: Oid, descendant: Oid) -> bool {
        self.ancestry(descendant).contains(&ancestor)
    }

    /// `start` followed by its ancestors, breadth first
    fn ancestry(&self, start: Oid) -> Vec<Oid> {
        let mut seen = HashSet::new();
        let mut order = Vec::new();
        let mut queue = VecDeque::from([start]);

        while let Some(oid) = queue.pop_front() {
            if !seen.insert(oid) {
                continue;
            }
            order.push(oid);
            if let Some(parents) = self.parents.get(&oid) {
                queue.extend(parents.iter().copied());
            }
        }

        order
    }

    fn resolve_local(&self, refname: &str) -> Option<Oid> {
        if let Some(tag) = refname.strip_prefix("refs/tags/") {
            return self.tags.borrow().get(tag).copied();
        }
        refname
            .strip_prefix("refs/heads/")
            .and_then(|branch| self.local_branches.borrow().get(branch).copied())
    }
}

impl Default for MockRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl RepoQuery for MockRepository {
    fn current_commit(&self) -> Result<Oid> {
        self.head
            .ok_or_else(|| ReleaseToolError::no_commits("in repository: HEAD has no history"))
    }

    fn current_branch_name(&self) -> Result<String> {
        self.current_commit()?;
        Ok(self.branch.clone())
    }

    fn tags_pointing_at(&self, commit: Oid) -> Result<BTreeSet<String>> {
        Ok(self
            .tags
            .borrow()
            .iter()
            .filter(|(_, target)| **target == commit)
            .map(|(name, _)| name.clone())
            .collect())
    }

    fn tags_reachable_from(&self, commit: Oid) -> Result<BTreeSet<String>> {
        let ancestry: HashSet<Oid> = self.ancestry(commit).into_iter().collect();
        Ok(self
            .tags
            .borrow()
            .iter()
            .filter(|(_, target)| ancestry.contains(target))
            .map(|(name, _)| name.clone())
            .collect())
    }

    fn remote_branches(&self, _remote: &str) -> Result<Vec<RemoteBranch>> {
        Ok(self
            .remote_refs
            .borrow()
            .iter()
            .filter_map(|(refname, oid)| {
                refname.strip_prefix("refs/heads/").map(|name| RemoteBranch {
                    name: name.to_string(),
                    commit: *oid,
                })
            })
            .collect())
    }

    fn last_commit_touching(&self, paths: &[PathBuf]) -> Result<Option<Oid>> {
        let head = self.current_commit()?;
        Ok(self.ancestry(head).into_iter().find(|oid| {
            self.touched.get(oid).is_some_and(|changed| {
                changed
                    .iter()
                    .any(|file| paths.iter().any(|path| file.starts_with(path)))
            })
        }))
    }
}

impl RefPublisher for MockRepository {
    fn create_branch(&self, name: &str, commit: Oid) -> Result<()> {
        let mut branches = self.local_branches.borrow_mut();
        match branches.get(name).copied() {
            Some(existing) if existing != commit => Err(ReleaseToolError::push_rejected(
                format!("refs/heads/{}", name),
                "local branch already exists at a different commit",
            )),
            _ => {
                branches.insert(name.to_string(), commit);
                Ok(())
            }
        }
    }

    fn create_tag(&self, name: &str, commit: Oid, force: bool) -> Result<()> {
        let mut tags = self.tags.borrow_mut();
        if !force && tags.contains_key(name) {
            return Err(ReleaseToolError::vcs(format!("tag '{}' already exists", name)));
        }
        tags.insert(name.to_string(), commit);
        Ok(())
    }

    fn push_ref(&self, remote: &str, refname: &str, force: bool) -> Result<()> {
        if self.rejected.contains(refname) {
            return Err(ReleaseToolError::push_rejected(refname, "rejected by remote"));
        }

        let commit = self.resolve_local(refname).ok_or_else(|| {
            ReleaseToolError::push_rejected(refname, "no such local reference")
        })?;

        if !force {
            if let Some(existing) = self.remote_ref(refname) {
                if !self.is_ancestor_or_equal(existing, commit) {
                    return Err(ReleaseToolError::push_rejected(
                        refname,
                        "cannot push non-fastforwardable reference",
                    ));
                }
            }
        }

        self.remote_refs
            .borrow_mut()
            .insert(refname.to_string(), commit);
        self.pushes.borrow_mut().push(PushRecord {
            remote: remote.to_string(),
            refname: refname.to_string(),
            commit,
            force,
        });
        Ok(())
    }
}
