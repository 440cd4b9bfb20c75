//! Atomic artifact writes
//!
//! Content goes to a temporary file in the destination directory and is
//! renamed over the target, so a reader never sees a half-written artifact.
//! Unchanged content is not rewritten, which keeps mtimes stable and lets
//! incremental builds skip recompiling generated sources.

use crate::error::{GenerationError, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteStatus {
    Written,
    Unchanged,
}

/// Safe file writer with atomic replace
#[derive(Debug, Clone)]
pub struct SafeCodeWriter {
    /// Skip the write when the file already holds identical bytes
    pub skip_unchanged: bool,
}

impl SafeCodeWriter {
    pub fn new() -> Self {
        Self {
            skip_unchanged: true,
        }
    }

    pub fn write(&self, path: &Path, content: &str) -> Result<WriteStatus> {
        if self.skip_unchanged && is_unchanged(path, content)? {
            tracing::debug!(path = %path.display(), "content unchanged, skipping write");
            return Ok(WriteStatus::Unchanged);
        }

        self.check_permissions(path)?;
        self.atomic_write(path, content)?;
        tracing::debug!(path = %path.display(), bytes = content.len(), "artifact written");
        Ok(WriteStatus::Written)
    }

    fn check_permissions(&self, path: &Path) -> Result<()> {
        if let Ok(metadata) = fs::metadata(path)
            && metadata.permissions().readonly()
        {
            return Err(GenerationError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "file is read-only"),
            ));
        }
        Ok(())
    }

    fn atomic_write(&self, path: &Path, content: &str) -> Result<()> {
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent).map_err(|e| GenerationError::io(parent, e))?;

        let mut temp_file = NamedTempFile::new_in(parent).map_err(|e| GenerationError::io(parent, e))?;
        if let Err(e) = temp_file.write_all(content.as_bytes()) {
            return Err(GenerationError::io(temp_file.path(), e));
        }
        if let Err(e) = temp_file.flush() {
            return Err(GenerationError::io(temp_file.path(), e));
        }

        temp_file
            .persist(path)
            .map_err(|e| GenerationError::io(path, e.error))?;
        Ok(())
    }
}

impl Default for SafeCodeWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn is_unchanged(path: &Path, content: &str) -> Result<bool> {
    match fs::read(path) {
        Ok(existing) => Ok(existing == content.as_bytes()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(GenerationError::io(path, e)),
    }
}

/// Compute SHA-256 hash of string
pub fn compute_string_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
