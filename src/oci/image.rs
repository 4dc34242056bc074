use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{ReleaseToolError, Result};
use crate::oci::sha256_digest;

pub const MANIFEST_MEDIA_TYPE: &str = "application/vnd.oci.image.manifest.v1+json";
pub const CONFIG_MEDIA_TYPE: &str = "application/vnd.oci.image.config.v1+json";
pub const LAYER_MEDIA_TYPE: &str = "application/vnd.oci.image.layer.v1.tar+gzip";

/// Content descriptor as it appears in a manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    pub media_type: String,
    pub digest: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub schema_version: u32,
    pub media_type: String,
    pub config: Descriptor,
    pub layers: Vec<Descriptor>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub architecture: String,
    pub os: String,
    pub config: serde_json::Map<String, serde_json::Value>,
    pub rootfs: RootFs,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootFs {
    #[serde(rename = "type")]
    pub kind: String,
    pub diff_ids: Vec<String>,
}

/// Where a blob's bytes live until they are uploaded
#[derive(Debug, Clone)]
pub enum BlobSource {
    Bytes(Vec<u8>),
    File(PathBuf),
}

impl BlobSource {
    pub fn read(&self) -> Result<Vec<u8>> {
        match self {
            BlobSource::Bytes(bytes) => Ok(bytes.clone()),
            BlobSource::File(path) => fs::read(path).map_err(|e| {
                ReleaseToolError::registry(format!(
                    "Failed to read blob {}: {}",
                    path.display(),
                    e
                ))
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Blob {
    pub descriptor: Descriptor,
    pub source: BlobSource,
}

/// An image with an empty base: one config blob and its layers
#[derive(Debug, Clone)]
pub struct Image {
    manifest: Manifest,
    manifest_bytes: Vec<u8>,
    config: Blob,
    layers: Vec<Blob>,
}

impl Image {
    /// Build an image whose only content is a single compressed layer
    ///
    /// `diff_id` is the digest of the uncompressed layer, recorded in the
    /// config's root filesystem.
    pub fn single_layer(layer: Descriptor, diff_id: String, source: BlobSource) -> Result<Self> {
        let config = ConfigFile {
            rootfs: RootFs {
                kind: "layers".to_string(),
                diff_ids: vec![diff_id],
            },
            ..ConfigFile::default()
        };
        let config_bytes = serde_json::to_vec(&config)
            .map_err(|e| ReleaseToolError::registry(format!("Failed to encode config: {}", e)))?;
        let config = Blob {
            descriptor: Descriptor {
                media_type: CONFIG_MEDIA_TYPE.to_string(),
                digest: sha256_digest(&config_bytes),
                size: config_bytes.len() as u64,
            },
            source: BlobSource::Bytes(config_bytes),
        };

        let manifest = Manifest {
            schema_version: 2,
            media_type: MANIFEST_MEDIA_TYPE.to_string(),
            config: config.descriptor.clone(),
            layers: vec![layer.clone()],
        };
        let manifest_bytes = serde_json::to_vec(&manifest)
            .map_err(|e| ReleaseToolError::registry(format!("Failed to encode manifest: {}", e)))?;

        Ok(Image {
            manifest,
            manifest_bytes,
            config,
            layers: vec![Blob {
                descriptor: layer,
                source,
            }],
        })
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Serialized manifest, exactly as pushed
    pub fn manifest_bytes(&self) -> &[u8] {
        &self.manifest_bytes
    }

    pub fn digest(&self) -> String {
        sha256_digest(&self.manifest_bytes)
    }

    /// Layers first, config last, in upload order
    pub fn blobs(&self) -> impl Iterator<Item = &Blob> {
        self.layers.iter().chain(std::iter::once(&self.config))
    }
}
