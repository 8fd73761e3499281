//! Scoped temporary payloads
//!
//! An [`Artifact`] is the local copy of one remote file while it moves through
//! the pipeline. It is backed by a named temporary file that is deleted as soon
//! as the artifact is dropped, so nothing accumulates between iterations.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// A transient local file holding a downloaded or decrypted payload
#[derive(Debug)]
pub struct Artifact {
    file: NamedTempFile,
}

impl Artifact {
    /// Creates an empty artifact in the system temporary directory
    ///
    /// # Arguments
    /// * `prefix` - Filename prefix, useful when inspecting a stuck temp dir
    /// * `suffix` - Filename suffix, e.g. `.download`
    pub fn create(prefix: &str, suffix: &str) -> io::Result<Self> {
        let file = tempfile::Builder::new()
            .prefix(prefix)
            .suffix(suffix)
            .tempfile()?;
        Ok(Artifact { file })
    }

    /// Creates an artifact holding the given bytes
    pub fn from_bytes(bytes: &[u8]) -> io::Result<Self> {
        let mut artifact = Artifact::create("artifact", ".bin")?;
        artifact.writer().write_all(bytes)?;
        artifact.writer().flush()?;
        Ok(artifact)
    }

    /// Path of the backing file, valid for as long as the artifact lives
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Write handle positioned wherever the last write left it
    pub fn writer(&mut self) -> &mut File {
        self.file.as_file_mut()
    }

    /// Fresh read handle positioned at the start of the payload
    pub fn reader(&self) -> io::Result<File> {
        self.file.reopen()
    }

    /// Size of the payload in bytes
    pub fn len(&self) -> io::Result<u64> {
        Ok(self.file.as_file().metadata()?.len())
    }

    pub fn is_empty(&self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Reads the whole payload into memory
    pub fn read_to_vec(&self) -> io::Result<Vec<u8>> {
        let mut data = Vec::new();
        self.reader()?.read_to_end(&mut data)?;
        Ok(data)
    }
}
