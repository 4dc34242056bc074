use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::{ReleaseToolError, Result};
use crate::oci::client::Registry;
use crate::oci::image::{Image, Manifest};
use crate::oci::reference::ImageReference;
use crate::oci::sha256_digest;

/// In-process registry holding manifests and blobs, used to exercise the
/// packaging pipeline without a network
#[derive(Default)]
pub struct MemoryRegistry {
    manifests: RefCell<BTreeMap<String, Vec<u8>>>,
    blobs: RefCell<HashMap<String, Vec<u8>>>,
    failing_tags: HashSet<String>,
    pushes: RefCell<Vec<String>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every push to `tag` fail
    pub fn fail_push_to(mut self, tag: &str) -> Self {
        self.failing_tags.insert(tag.to_string());
        self
    }

    /// References pushed successfully, in order
    pub fn pushes(&self) -> Vec<String> {
        self.pushes.borrow().clone()
    }

    pub fn manifest_digest(&self, reference: &ImageReference) -> Option<String> {
        self.manifests
            .borrow()
            .get(&reference.to_string())
            .map(|bytes| sha256_digest(bytes))
    }
}

impl Registry for MemoryRegistry {
    fn push(&self, image: &Image, reference: &ImageReference) -> Result<String> {
        if self.failing_tags.contains(reference.tag()) {
            return Err(ReleaseToolError::registry(format!(
                "{}: push refused by registry",
                reference
            )));
        }

        for blob in image.blobs() {
            let bytes = blob.source.read()?;
            let digest = sha256_digest(&bytes);
            if digest != blob.descriptor.digest || bytes.len() as u64 != blob.descriptor.size {
                return Err(ReleaseToolError::registry(format!(
                    "blob {} does not match its descriptor",
                    blob.descriptor.digest
                )));
            }
            self.blobs.borrow_mut().insert(digest, bytes);
        }

        let bytes = image.manifest_bytes().to_vec();
        let digest = sha256_digest(&bytes);
        self.manifests
            .borrow_mut()
            .insert(reference.to_string(), bytes);
        self.pushes.borrow_mut().push(reference.to_string());
        Ok(digest)
    }

    fn fetch_manifest(&self, reference: &ImageReference) -> Result<Manifest> {
        let manifests = self.manifests.borrow();
        let bytes = manifests
            .get(&reference.to_string())
            .ok_or_else(|| ReleaseToolError::registry(format!("{}: manifest unknown", reference)))?;
        serde_json::from_slice(bytes)
            .map_err(|e| ReleaseToolError::registry(format!("invalid manifest: {}", e)))
    }

    fn fetch_blob(&self, _reference: &ImageReference, digest: &str) -> Result<Vec<u8>> {
        self.blobs
            .borrow()
            .get(digest)
            .cloned()
            .ok_or_else(|| ReleaseToolError::registry(format!("blob {} unknown", digest)))
    }
}
