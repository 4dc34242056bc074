// tests/common/mod.rs
#![allow(dead_code)]

use std::fs;
use std::path::Path;

use git2::{build::CheckoutBuilder, Oid, Repository, RepositoryInitOptions, Signature};
use tempfile::TempDir;

/// A working repository with a bare `origin` remote, both in temp dirs
pub struct Fixture {
    pub remote_dir: TempDir,
    pub work_dir: TempDir,
    pub repo: Repository,
}

impl Fixture {
    pub fn new() -> Self {
        let remote_dir = TempDir::new().unwrap();
        Repository::init_bare(remote_dir.path()).unwrap();

        let work_dir = TempDir::new().unwrap();
        let mut options = RepositoryInitOptions::new();
        options.initial_head("main");
        let repo = Repository::init_opts(work_dir.path(), &options).unwrap();
        repo.remote("origin", remote_dir.path().to_str().unwrap())
            .unwrap();

        Fixture {
            remote_dir,
            work_dir,
            repo,
        }
    }

    pub fn path(&self) -> &Path {
        self.work_dir.path()
    }

    /// Write `file` and commit it on the checked-out branch
    pub fn commit(&self, file: &str, contents: &str, message: &str) -> Oid {
        let full = self.path().join(file);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&full, contents).unwrap();

        let mut index = self.repo.index().unwrap();
        index.add_path(Path::new(file)).unwrap();
        index.write().unwrap();
        let tree = self.repo.find_tree(index.write_tree().unwrap()).unwrap();

        let sig = Signature::now("Release Test", "release@example.com").unwrap();
        let parents = match self.repo.head() {
            Ok(head) => vec![head.peel_to_commit().unwrap()],
            Err(_) => Vec::new(),
        };
        let parent_refs: Vec<&git2::Commit> = parents.iter().collect();

        self.repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parent_refs)
            .unwrap()
    }

    pub fn tag(&self, name: &str, commit: Oid) {
        let object = self.repo.find_object(commit, None).unwrap();
        self.repo.tag_lightweight(name, &object, false).unwrap();
    }

    /// Check out `branch`, creating it at `at` when given
    pub fn checkout(&self, branch: &str, at: Option<Oid>) {
        if let Some(oid) = at {
            let commit = self.repo.find_commit(oid).unwrap();
            self.repo.branch(branch, &commit, true).unwrap();
        }
        self.repo
            .set_head(&format!("refs/heads/{}", branch))
            .unwrap();
        self.repo
            .checkout_head(Some(CheckoutBuilder::new().force()))
            .unwrap();
    }

    /// Push a local ref to origin outside the tool under test
    pub fn push(&self, refname: &str) {
        let mut remote = self.repo.find_remote("origin").unwrap();
        remote
            .push(&[format!("{}:{}", refname, refname).as_str()], None)
            .unwrap();
    }

    /// Where `refname` points on origin
    pub fn remote_ref(&self, refname: &str) -> Option<Oid> {
        let remote = Repository::open_bare(self.remote_dir.path()).unwrap();
        remote.refname_to_id(refname).ok()
    }

    /// Where a local tag points
    pub fn local_tag(&self, name: &str) -> Option<Oid> {
        self.repo
            .refname_to_id(&format!("refs/tags/{}", name))
            .ok()
    }
}
