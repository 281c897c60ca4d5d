//! Code generation fingerprint
//!
//! BLAKE3 over the source revision and every file below the proto roots.
//! Paths are hashed relative to their root and visited in sorted order, so
//! the digest depends only on content, not on directory iteration order.

use crate::error::{ChainError, Result};
use crate::revision::SourceRevision;
use std::fmt;
use std::path::{Path, PathBuf};

/// Digest of everything code generation reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint(blake3::Hash);

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_hex()[..16])
    }
}

/// Fingerprint `roots` (missing roots are recorded as absent)
///
/// # Errors
/// `ChainError::Io` if a present file or directory cannot be read.
pub(crate) fn compute(revision: &SourceRevision, roots: &[PathBuf]) -> Result<Fingerprint> {
    let mut hasher = blake3::Hasher::new();
    field(&mut hasher, revision.hash.as_bytes());
    field(&mut hasher, revision.tag.as_bytes());

    for root in roots {
        field(&mut hasher, root.to_string_lossy().as_bytes());
        if !root.is_dir() {
            field(&mut hasher, b"absent");
            continue;
        }

        let mut files = Vec::new();
        collect_files(root, &mut files)?;
        files.sort();

        for file in files {
            let content = std::fs::read(&file).map_err(|e| ChainError::io(&file, e))?;
            let relative = file.strip_prefix(root).unwrap_or(&file);
            field(&mut hasher, relative.to_string_lossy().as_bytes());
            field(&mut hasher, &content);
        }
    }

    Ok(Fingerprint(hasher.finalize()))
}

/// [`compute`] on the blocking thread pool
///
/// # Errors
/// As [`compute`]; `ChainError::Cancelled` if the runtime is shutting down.
pub(crate) async fn scan(revision: SourceRevision, roots: Vec<PathBuf>) -> Result<Fingerprint> {
    match tokio::task::spawn_blocking(move || compute(&revision, &roots)).await {
        Ok(result) => result,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(_) => Err(ChainError::Cancelled),
    }
}

// Length-prefixed so adjacent fields cannot run together.
fn field(hasher: &mut blake3::Hasher, bytes: &[u8]) {
    hasher.update(&(bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries = std::fs::read_dir(dir).map_err(|e| ChainError::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| ChainError::io(dir, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| ChainError::io(&path, e))?;
        if file_type.is_dir() {
            collect_files(&path, out)?;
        } else if file_type.is_file() {
            out.push(path);
        }
    }
    Ok(())
}
