//! Directory-to-image packaging.
//!
//! The directory's contents become the single layer of an otherwise empty
//! image, with every `$(version)` token replaced by the version resolved from
//! the surrounding repository. The image is pushed under the requested tag
//! and then under the version.

pub mod archive;

pub use archive::{build_layer, LayerArchive, VERSION_PLACEHOLDER};

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::boundary::BoundaryWarning;
use crate::domain::{ReleaseLine, Version};
use crate::error::{ReleaseToolError, Result};
use crate::git::{Git2Repository, RepoQuery};
use crate::oci::{BlobSource, Image, ImageReference, Registry};
use crate::resolver::latest_bare_version;
use crate::ui;

#[derive(Debug, Clone)]
pub struct PackageRequest {
    /// Destination reference as given by the caller
    pub image: String,
    pub directory: PathBuf,
    /// Only `<line>/vX.Y.Z` tags count when set; plain `vX.Y.Z` tags otherwise
    pub line: Option<ReleaseLine>,
    /// Skip resolution and use this version
    pub version: Option<Version>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageOutcome {
    pub version: Version,
    /// References pushed, in push order
    pub references: Vec<ImageReference>,
    pub manifest_digest: String,
}

pub struct ArtifactPackager<'a, G> {
    registry: &'a G,
}

impl<'a, G: Registry> ArtifactPackager<'a, G> {
    pub fn new(registry: &'a G) -> Self {
        ArtifactPackager { registry }
    }

    pub fn package<W: Write>(&self, request: &PackageRequest, out: &mut W) -> Result<PackageOutcome> {
        let directory = std::path::absolute(&request.directory)?;
        if !directory.is_dir() {
            return Err(ReleaseToolError::DirectoryNotFound(directory));
        }
        let reference = ImageReference::parse(&request.image)?;

        let version = match request.version {
            Some(version) => version,
            None => resolve_version(&directory, request.line.as_ref(), out)?,
        };
        info!(%version, directory = %directory.display(), "packaging directory");

        let layer = build_layer(&directory, &version)?;
        let image = Image::single_layer(
            layer.descriptor(),
            layer.diff_id().to_string(),
            BlobSource::File(layer.path().to_path_buf()),
        )?;

        let versioned = reference.with_tag(&version.to_string())?;
        self.push(&image, &reference, out)?;
        let manifest_digest = self.push(&image, &versioned, out)?;
        ui::write_success(
            out,
            &format!("Successfully published directory as OCI image: {}", request.image),
        )?;

        Ok(PackageOutcome {
            version,
            references: vec![reference, versioned],
            manifest_digest,
        })
    }

    fn push<W: Write>(&self, image: &Image, target: &ImageReference, out: &mut W) -> Result<String> {
        let digest = self.registry.push(image, target)?;
        ui::write_status(out, &format!("Pushed image: {}", target))?;
        Ok(digest)
    }
}

/// Greatest version tag reachable from HEAD
///
/// With a line only that line's tags count, otherwise plain semantic version
/// tags. `Ok(None)` when nothing matches.
pub fn latest_reachable_version<R: RepoQuery>(
    repo: &R,
    line: Option<&ReleaseLine>,
) -> Result<Option<Version>> {
    let head = repo.current_commit()?;
    let tags = repo.tags_reachable_from(head)?;

    Ok(match line {
        Some(line) => tags.iter().filter_map(|tag| line.parse_tag(tag)).max(),
        None => latest_bare_version(&tags),
    })
}

/// Version for a directory's repository, falling back to `0.0.0` with a
/// warning when there is no usable history
fn resolve_version<W: Write>(
    directory: &Path,
    line: Option<&ReleaseLine>,
    out: &mut W,
) -> Result<Version> {
    let warning = match Git2Repository::discover(directory) {
        Err(e) => {
            debug!(error = %e, "no repository for packaged directory");
            BoundaryWarning::NotARepository {
                path: directory.to_path_buf(),
            }
        }
        Ok(repo) => match latest_reachable_version(&repo, line) {
            Ok(Some(version)) => return Ok(version),
            Ok(None) => BoundaryWarning::UntaggedHistory {
                line: line.map(|l| l.name().to_string()),
            },
            Err(ReleaseToolError::NoCommitsFound(_)) => BoundaryWarning::UnbornHead {
                path: directory.to_path_buf(),
            },
            Err(e) => return Err(e),
        },
    };

    ui::write_boundary_warning(out, &warning)?;
    Ok(Version::default())
}
