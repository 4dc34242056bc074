//! Command workflows
//!
//! Each workflow takes plain argument structs rather than clap types, so it
//! can be driven programmatically and from tests. Contract output goes to the
//! supplied writer.

use std::io::Write;
use std::path::PathBuf;

use tracing::debug;

use crate::config::Config;
use crate::domain::{ReleaseLine, Version};
use crate::error::Result;
use crate::git::Git2Repository;
use crate::lookup::VersionLookup;
use crate::oci::{Registry, RegistryClient};
use crate::package::{ArtifactPackager, PackageOutcome, PackageRequest};
use crate::publish::{ReleasePlan, ReleasePublisher};
use crate::ui;

/// Arguments for the publish workflow
#[derive(Debug, Clone, PartialEq)]
pub struct PublishArgs {
    /// Release line name
    pub name: String,

    /// Restrict the release commit to history touching these paths
    pub paths: Vec<PathBuf>,

    /// Remote overriding the configured one
    pub remote: Option<String>,

    /// Any path inside the repository
    pub repo_path: PathBuf,
}

/// Arguments for the version workflow
#[derive(Debug, Clone, PartialEq)]
pub struct VersionArgs {
    pub name: String,
    pub repo_path: PathBuf,
}

/// Arguments for the oci workflow
#[derive(Debug, Clone, PartialEq)]
pub struct OciArgs {
    pub image: String,
    pub directory: PathBuf,

    /// Resolve from this release line's tags instead of plain version tags
    pub line: Option<String>,

    /// Explicit version, skipping resolution
    pub version: Option<String>,

    pub insecure: bool,
}

/// Publish the next release of a line from the repository at `repo_path`
pub fn run_publish<W: Write>(args: &PublishArgs, config: &Config, out: &mut W) -> Result<ReleasePlan> {
    let line = ReleaseLine::new(&args.name)?;
    let remote = args
        .remote
        .clone()
        .unwrap_or_else(|| config.git.remote.clone());
    debug!(%line, %remote, paths = ?args.paths, "publish");

    let repo = Git2Repository::discover(&args.repo_path)?;
    ReleasePublisher::new(&repo, line, remote)
        .with_paths(args.paths.clone())
        .publish(out)
}

/// Print the version tagged on HEAD for a line
pub fn run_version<W: Write>(args: &VersionArgs, out: &mut W) -> Result<Version> {
    let line = ReleaseLine::new(&args.name)?;
    let repo = Git2Repository::discover(&args.repo_path)?;

    let version = VersionLookup::new(&repo, line).version_at_head()?;
    ui::write_plain(out, &version.to_string())?;
    Ok(version)
}

/// Package a directory and push it to its registry over HTTP
pub fn run_oci<W: Write>(args: &OciArgs, config: &Config, out: &mut W) -> Result<PackageOutcome> {
    let client = RegistryClient::new(config.registry_options(args.insecure))?;
    run_oci_with(&client, args, out)
}

/// Package a directory and push it to `registry`
pub fn run_oci_with<G: Registry, W: Write>(
    registry: &G,
    args: &OciArgs,
    out: &mut W,
) -> Result<PackageOutcome> {
    let request = PackageRequest {
        image: args.image.clone(),
        directory: args.directory.clone(),
        line: args.line.as_deref().map(ReleaseLine::new).transpose()?,
        version: args.version.as_deref().map(Version::parse).transpose()?,
    };

    ArtifactPackager::new(registry).package(&request, out)
}
