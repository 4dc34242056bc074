//! Deterministic tar.gz layer construction with version substitution.

use std::fs::{self, File, Metadata};
use std::io::{self, Write};
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;
use regex::bytes::{NoExpand, Regex};
use tar::{Builder, EntryType, Header};
use tempfile::NamedTempFile;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::domain::Version;
use crate::error::{ReleaseToolError, Result};
use crate::oci::image::{Descriptor, LAYER_MEDIA_TYPE};
use crate::oci::DigestWriter;

/// Token replaced with the resolved version in every packaged file
pub const VERSION_PLACEHOLDER: &str = "$(version)";

/// A compressed layer in a scratch file, removed when dropped
#[derive(Debug)]
pub struct LayerArchive {
    file: NamedTempFile,
    digest: String,
    size: u64,
    diff_id: String,
}

impl LayerArchive {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Digest of the compressed stream
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Size of the compressed stream in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Digest of the uncompressed tar stream
    pub fn diff_id(&self) -> &str {
        &self.diff_id
    }

    pub fn descriptor(&self) -> Descriptor {
        Descriptor {
            media_type: LAYER_MEDIA_TYPE.to_string(),
            digest: self.digest.clone(),
            size: self.size,
        }
    }
}

/// Replaces [`VERSION_PLACEHOLDER`] in file contents
struct Substitution {
    pattern: Regex,
    replacement: Vec<u8>,
}

impl Substitution {
    fn new(version: &Version) -> Result<Self> {
        let pattern = Regex::new(&regex::escape(VERSION_PLACEHOLDER))
            .map_err(|e| ReleaseToolError::archive(format!("Invalid placeholder pattern: {}", e)))?;
        Ok(Substitution {
            pattern,
            replacement: version.to_string().into_bytes(),
        })
    }

    fn apply(&self, contents: &[u8]) -> Vec<u8> {
        self.pattern
            .replace_all(contents, NoExpand(&self.replacement))
            .into_owned()
    }
}

/// Archive `root`'s contents as a gzip-compressed tar layer
///
/// Entries are relative to `root` and emitted in file-name order at every
/// level. Timestamps and ownership are zeroed so identical trees produce
/// identical digests.
pub fn build_layer(root: &Path, version: &Version) -> Result<LayerArchive> {
    let substitution = Substitution::new(version)?;

    let file = tempfile::Builder::new()
        .prefix("oci-")
        .suffix(".tar.gz")
        .tempfile()
        .map_err(|e| ReleaseToolError::archive(format!("Failed to create scratch file: {}", e)))?;
    let out = file
        .reopen()
        .map_err(|e| ReleaseToolError::archive(format!("Failed to open scratch file: {}", e)))?;

    let encoder = GzEncoder::new(out, Compression::default());
    let mut builder = Builder::new(DigestWriter::new(encoder));

    for entry in WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| ReleaseToolError::archive(e.to_string()))?;
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| ReleaseToolError::archive(e.to_string()))?;
        let metadata = entry
            .metadata()
            .map_err(|e| ReleaseToolError::archive(e.to_string()))?;

        append_entry(&mut builder, entry.path(), relative, &metadata, &substitution)?;
    }

    let tar_stream = builder
        .into_inner()
        .map_err(|e| ReleaseToolError::archive(format!("Failed to finish tar stream: {}", e)))?;
    let (encoder, diff_id, _) = tar_stream.finish();
    let mut out = encoder
        .finish()
        .map_err(|e| ReleaseToolError::archive(format!("Failed to finish compression: {}", e)))?;
    out.flush()?;

    let (digest, size) = digest_file(file.path())?;
    debug!(%digest, size, %diff_id, "built layer");

    Ok(LayerArchive {
        file,
        digest,
        size,
        diff_id,
    })
}

fn append_entry<W: Write>(
    builder: &mut Builder<W>,
    path: &Path,
    relative: &Path,
    metadata: &Metadata,
    substitution: &Substitution,
) -> Result<()> {
    let failed = |e: io::Error| ReleaseToolError::archive(format!("{}: {}", relative.display(), e));

    let mut header = Header::new_gnu();
    header.set_mtime(0);
    header.set_uid(0);
    header.set_gid(0);
    header.set_mode(permission_bits(metadata));

    let file_type = metadata.file_type();
    if file_type.is_dir() {
        header.set_entry_type(EntryType::Directory);
        header.set_size(0);
        builder
            .append_data(&mut header, relative, io::empty())
            .map_err(failed)
    } else if file_type.is_file() {
        let contents = fs::read(path).map_err(failed)?;
        let rewritten = substitution.apply(&contents);
        header.set_entry_type(EntryType::Regular);
        header.set_size(rewritten.len() as u64);
        builder
            .append_data(&mut header, relative, rewritten.as_slice())
            .map_err(failed)
    } else if file_type.is_symlink() {
        let target = fs::read_link(path).map_err(failed)?;
        header.set_entry_type(EntryType::Symlink);
        header.set_size(0);
        builder
            .append_link(&mut header, relative, &target)
            .map_err(failed)
    } else {
        warn!(path = %relative.display(), "skipping special file");
        Ok(())
    }
}

#[cfg(unix)]
fn permission_bits(metadata: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn permission_bits(metadata: &Metadata) -> u32 {
    if metadata.is_dir() {
        0o755
    } else if metadata.permissions().readonly() {
        0o444
    } else {
        0o644
    }
}

fn digest_file(path: &Path) -> Result<(String, u64)> {
    let mut input = File::open(path)
        .map_err(|e| ReleaseToolError::archive(format!("Failed to reopen layer: {}", e)))?;
    let mut sink = DigestWriter::new(io::sink());
    io::copy(&mut input, &mut sink)
        .map_err(|e| ReleaseToolError::archive(format!("Failed to hash layer: {}", e)))?;
    let (_, digest, size) = sink.finish();
    Ok((digest, size))
}
