//! Minimal OCI image support: references, single-layer images, and a
//! registry client speaking the distribution API.

pub mod client;
pub mod image;
pub mod memory;
pub mod reference;

pub use client::{Credentials, Registry, RegistryClient, RegistryOptions};
pub use image::{Blob, BlobSource, Descriptor, Image, Manifest};
pub use memory::MemoryRegistry;
pub use reference::ImageReference;

use std::io::{self, Write};

use sha2::{Digest, Sha256};

/// `sha256:<hex>` digest of a byte slice
pub fn sha256_digest(bytes: &[u8]) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(bytes)))
}

/// Writer adapter that hashes everything passing through it
pub struct DigestWriter<W> {
    inner: W,
    hasher: Sha256,
    written: u64,
}

impl<W: Write> DigestWriter<W> {
    pub fn new(inner: W) -> Self {
        DigestWriter {
            inner,
            hasher: Sha256::new(),
            written: 0,
        }
    }

    /// Return the inner writer, the `sha256:<hex>` digest and the byte count
    pub fn finish(self) -> (W, String, u64) {
        let digest = format!("sha256:{}", hex::encode(self.hasher.finalize()));
        (self.inner, digest, self.written)
    }
}

impl<W: Write> Write for DigestWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
