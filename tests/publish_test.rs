// tests/publish_test.rs
mod common;

use std::path::PathBuf;

use common::Fixture;
use release_tool::cli::{run_publish, PublishArgs};
use release_tool::config::Config;
use release_tool::domain::{ReleaseState, Version};
use release_tool::publish::ReleasePlan;
use release_tool::{ReleaseToolError, Result};

fn publish(fixture: &Fixture, name: &str, paths: &[&str]) -> (Result<ReleasePlan>, String) {
    let args = PublishArgs {
        name: name.to_string(),
        paths: paths.iter().map(PathBuf::from).collect(),
        remote: None,
        repo_path: fixture.path().to_path_buf(),
    };
    let mut out = Vec::new();
    let result = run_publish(&args, &Config::default(), &mut out);
    (result, String::from_utf8(out).unwrap())
}

#[test]
fn test_first_release_from_mainline() {
    let fixture = Fixture::new();
    let head = fixture.commit("README.md", "hello", "initial");

    let (result, output) = publish(&fixture, "rel-a", &[]);
    let plan = result.unwrap();

    assert_eq!(plan.version, Version::new(0, 1, 0));
    assert_eq!(plan.state, ReleaseState::OnMainline);
    assert!(output.contains("Pushed new release branch: release-rel-a-0.1"));
    assert!(output.contains("Created and pushed tag: rel-a/v0.1.0"));

    assert_eq!(fixture.remote_ref("refs/heads/release-rel-a-0.1"), Some(head));
    assert_eq!(fixture.remote_ref("refs/tags/rel-a/v0.1.0"), Some(head));
}

#[test]
fn test_existing_remote_branch_advances_minor() {
    let fixture = Fixture::new();
    let first = fixture.commit("a.txt", "1", "first");
    let branch = fixture.repo.find_commit(first).unwrap();
    fixture
        .repo
        .branch("release-rel-d-0.1", &branch, false)
        .unwrap();
    fixture.push("refs/heads/release-rel-d-0.1");
    let head = fixture.commit("a.txt", "2", "second");

    let (result, output) = publish(&fixture, "rel-d", &[]);
    let plan = result.unwrap();

    assert_eq!(plan.branch, "release-rel-d-0.2");
    assert_eq!(plan.tag, "rel-d/v0.2.0");
    assert!(output.contains("Pushed new release branch: release-rel-d-0.2"));
    assert_eq!(fixture.remote_ref("refs/heads/release-rel-d-0.2"), Some(head));
    assert_eq!(fixture.remote_ref("refs/tags/rel-d/v0.2.0"), Some(head));
    assert_eq!(fixture.remote_ref("refs/heads/release-rel-d-0.1"), Some(first));
}

#[test]
fn test_patch_release_on_release_branch() {
    let fixture = Fixture::new();
    fixture.commit("a.txt", "1", "first");
    publish(&fixture, "test", &[]).0.unwrap();
    let second = fixture.commit("a.txt", "2", "second");
    let plan = publish(&fixture, "test", &[]).0.unwrap();
    assert_eq!(plan.branch, "release-test-0.2");
    assert_eq!(plan.tag, "test/v0.2.0");

    fixture.checkout("release-test-0.2", None);
    let fix = fixture.commit("a.txt", "3", "fix on release branch");

    let (result, output) = publish(&fixture, "test", &[]);
    let plan = result.unwrap();

    assert_eq!(
        plan.state,
        ReleaseState::OnReleaseBranch {
            series: Version::new(0, 2, 0)
        }
    );
    assert_eq!(plan.tag, "test/v0.2.1");
    assert!(output.contains("Pushed release branch: release-test-0.2"));
    assert!(!output.contains("Pushed new release branch"));
    assert!(output.contains("Created and pushed tag: test/v0.2.1"));

    assert_eq!(fixture.remote_ref("refs/tags/test/v0.2.1"), Some(fix));
    assert_eq!(fixture.remote_ref("refs/tags/test/v0.2.0"), Some(second));
    assert_eq!(fixture.remote_ref("refs/heads/release-test-0.2"), Some(fix));
    assert_eq!(fixture.remote_ref("refs/heads/release-test-0.3"), None);
}

#[test]
fn test_republish_on_unchanged_release_branch_is_idempotent() {
    let fixture = Fixture::new();
    fixture.commit("a.txt", "1", "first");
    publish(&fixture, "svc", &[]).0.unwrap();
    fixture.checkout("release-svc-0.1", None);
    let fix = fixture.commit("a.txt", "2", "fix");

    let first = publish(&fixture, "svc", &[]).0.unwrap();
    let second = publish(&fixture, "svc", &[]).0.unwrap();

    assert_eq!(first.tag, "svc/v0.1.1");
    assert_eq!(second.tag, "svc/v0.1.1");
    assert_eq!(fixture.remote_ref("refs/tags/svc/v0.1.1"), Some(fix));
    assert_eq!(fixture.remote_ref("refs/tags/svc/v0.1.2"), None);
}

#[test]
fn test_release_lines_are_independent() {
    let fixture = Fixture::new();
    fixture.commit("a.txt", "1", "first");
    publish(&fixture, "alpha", &[]).0.unwrap();
    fixture.commit("a.txt", "2", "second");
    publish(&fixture, "alpha", &[]).0.unwrap();

    let plan = publish(&fixture, "beta", &[]).0.unwrap();
    assert_eq!(plan.tag, "beta/v0.1.0");
}

#[test]
fn test_path_scoped_release_uses_last_touching_commit() {
    let fixture = Fixture::new();
    let service = fixture.commit("svc/main.rs", "fn main() {}", "service change");
    let head = fixture.commit("docs/notes.md", "notes", "docs change");

    let (result, _) = publish(&fixture, "svc", &["svc"]);
    let plan = result.unwrap();

    assert_eq!(plan.commit, service);
    assert_ne!(plan.commit, head);
    assert_eq!(fixture.remote_ref("refs/tags/svc/v0.1.0"), Some(service));
    assert_eq!(fixture.remote_ref("refs/heads/release-svc-0.1"), Some(service));
}

#[test]
fn test_untouched_paths_report_no_commits() {
    let fixture = Fixture::new();
    fixture.commit("a.txt", "1", "first");

    let (result, output) = publish(&fixture, "svc", &["does-not-exist"]);
    let err = result.unwrap_err();

    assert!(matches!(err, ReleaseToolError::NoCommitsFound(_)));
    assert!(err.to_string().contains("does-not-exist"));
    assert!(output.is_empty());
    assert_eq!(fixture.remote_ref("refs/heads/release-svc-0.1"), None);
}

#[test]
fn test_empty_repository_reports_no_commits() {
    let fixture = Fixture::new();

    let (result, _) = publish(&fixture, "svc", &[]);
    assert!(matches!(result, Err(ReleaseToolError::NoCommitsFound(_))));
}

#[test]
fn test_unknown_remote_is_vcs_error() {
    let fixture = Fixture::new();
    fixture.commit("a.txt", "1", "first");
    let args = PublishArgs {
        name: "svc".to_string(),
        paths: Vec::new(),
        remote: Some("upstream".to_string()),
        repo_path: fixture.path().to_path_buf(),
    };

    let err = run_publish(&args, &Config::default(), &mut Vec::new()).unwrap_err();
    assert!(matches!(err, ReleaseToolError::VcsUnavailable(_)));
    assert!(err.to_string().contains("upstream"));
}

#[test]
fn test_stale_local_tag_is_moved_to_release_commit() {
    let fixture = Fixture::new();
    let base = fixture.commit("a.txt", "1", "first");
    fixture.tag("mv/v0.1.0", base);
    fixture.checkout("side", Some(base));
    let side = fixture.commit("b.txt", "side", "unrelated");
    fixture.tag("mv/v0.1.1", side);
    fixture.checkout("release-mv-0.1", Some(base));
    let head = fixture.commit("a.txt", "2", "fix");

    let plan = publish(&fixture, "mv", &[]).0.unwrap();

    assert_eq!(plan.tag, "mv/v0.1.1");
    assert_eq!(fixture.local_tag("mv/v0.1.1"), Some(head));
    assert_eq!(fixture.remote_ref("refs/tags/mv/v0.1.1"), Some(head));
}

#[test]
fn test_mainline_publish_against_never_pushed_remote() {
    let fixture = Fixture::new();
    let head = fixture.commit("a.txt", "1", "first");
    assert_eq!(fixture.remote_ref("refs/heads/main"), None);

    let (result, _) = publish(&fixture, "fresh", &[]);
    assert_eq!(result.unwrap().tag, "fresh/v0.1.0");
    assert_eq!(fixture.remote_ref("refs/heads/release-fresh-0.1"), Some(head));

    // Without the local tag only the pushed branch can advance the minor.
    let next = fixture.commit("a.txt", "2", "second");
    fixture.repo.tag_delete("fresh/v0.1.0").unwrap();
    let plan = publish(&fixture, "fresh", &[]).0.unwrap();
    assert_eq!(plan.branch, "release-fresh-0.2");
    assert_eq!(fixture.remote_ref("refs/tags/fresh/v0.2.0"), Some(next));
}

#[test]
fn test_diverged_remote_release_branch_is_rejected_without_tagging() {
    let fixture = Fixture::new();
    let base = fixture.commit("a.txt", "1", "first");
    publish(&fixture, "x", &[]).0.unwrap();

    fixture.checkout("release-x-0.1", None);
    let theirs = fixture.commit("a.txt", "theirs", "fix pushed elsewhere");
    fixture.push("refs/heads/release-x-0.1");

    fixture.checkout("main", None);
    fixture.checkout("release-x-0.1", Some(base));
    fixture.commit("a.txt", "ours", "local fix");

    let (result, output) = publish(&fixture, "x", &[]);
    let err = result.unwrap_err();

    assert!(matches!(err, ReleaseToolError::PushRejected { .. }));
    assert!(err.to_string().contains("release-x-0.1"));
    assert!(output.is_empty());
    assert_eq!(fixture.remote_ref("refs/heads/release-x-0.1"), Some(theirs));
    assert_eq!(fixture.remote_ref("refs/tags/x/v0.1.1"), None);
}
