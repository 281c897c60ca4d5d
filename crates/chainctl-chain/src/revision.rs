//! Source revision probing
//!
//! The revision is captured once when the coordinator is built and feeds the
//! code generation fingerprint. A project without version control history has
//! an empty revision; that is not an error.

use crate::error::SourceError;
use std::fmt;
use std::path::Path;
use std::process::Command;

/// Commit and tag of the source tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SourceRevision {
    /// Commit hash, empty without history
    pub hash: String,
    /// Tag pointing at the commit, empty if none
    pub tag: String,
}

impl SourceRevision {
    /// Whether no history was found
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hash.is_empty()
    }
}

/// Reads the current revision of a project directory
pub trait RevisionSource: Send + Sync + fmt::Debug {
    /// Current revision of `path`
    ///
    /// # Errors
    /// Any failure other than "no repository / no history".
    fn current(&self, path: &Path) -> Result<SourceRevision, SourceError>;
}

/// Revision read through the `git` command line
///
/// Only a repository rooted at the project directory counts. A project nested
/// inside some other repository, or one git refuses to read, gets an empty
/// revision.
#[derive(Debug, Clone, Default)]
pub struct GitRevision;

const NO_HISTORY_MARKERS: &[&str] = &[
    "not a git repository",
    "unknown revision",
    "ambiguous argument 'HEAD'",
    "does not have any commits",
];

impl RevisionSource for GitRevision {
    fn current(&self, path: &Path) -> Result<SourceRevision, SourceError> {
        match read_revision(path) {
            Ok(Some(revision)) => Ok(revision),
            Ok(None) => {
                tracing::debug!(path = %path.display(), "no version control history");
                Ok(SourceRevision::default())
            }
            Err(message) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %message,
                    "cannot read source revision, fingerprinting without it"
                );
                Ok(SourceRevision::default())
            }
        }
    }
}

fn read_revision(path: &Path) -> Result<Option<SourceRevision>, String> {
    let GitOutcome::Ok(toplevel) = git(path, &["rev-parse", "--show-toplevel"])? else {
        return Ok(None);
    };
    if !same_dir(Path::new(&toplevel), path) {
        tracing::debug!(
            path = %path.display(),
            repository = %toplevel,
            "project lives inside an enclosing repository"
        );
        return Ok(None);
    }

    let GitOutcome::Ok(hash) = git(path, &["rev-parse", "HEAD"])? else {
        return Ok(None);
    };
    let tag = match git(path, &["describe", "--tags", "--exact-match", "HEAD"]) {
        Ok(GitOutcome::Ok(tag)) => tag,
        _ => String::new(),
    };

    Ok(Some(SourceRevision { hash, tag }))
}

fn same_dir(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

enum GitOutcome {
    Ok(String),
    NoHistory,
}

fn git(path: &Path, args: &[&str]) -> Result<GitOutcome, String> {
    let output = match Command::new("git").arg("-C").arg(path).args(args).output() {
        Ok(output) => output,
        // Without git there is no history to read.
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(GitOutcome::NoHistory),
        Err(e) => return Err(e.to_string()),
    };

    if output.status.success() {
        return Ok(GitOutcome::Ok(
            String::from_utf8_lossy(&output.stdout).trim().to_string(),
        ));
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    if NO_HISTORY_MARKERS.iter().any(|m| stderr.contains(m)) {
        return Ok(GitOutcome::NoHistory);
    }
    Err(stderr.trim().to_string())
}

/// Fixed revision, for tests
#[derive(Debug, Clone, Default)]
pub struct StaticRevision(pub SourceRevision);

impl RevisionSource for StaticRevision {
    fn current(&self, _path: &Path) -> Result<SourceRevision, SourceError> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn directory_without_repository_is_empty() {
        let dir = TempDir::new().unwrap();
        let rev = GitRevision.current(dir.path()).unwrap();
        assert!(rev.is_empty());
        assert!(rev.tag.is_empty());
    }

    fn git_in(dir: &Path, args: &[&str]) -> bool {
        Command::new("git")
            .arg("-C")
            .arg(dir)
            .args(["-c", "user.name=chainctl", "-c", "user.email=chainctl@example.com"])
            .args(args)
            .output()
            .is_ok_and(|o| o.status.success())
    }

    #[test]
    fn only_repository_at_project_root_counts() {
        let dir = TempDir::new().unwrap();
        if !git_in(dir.path(), &["init", "-q"])
            || !git_in(dir.path(), &["commit", "-q", "--allow-empty", "-m", "init"])
        {
            return;
        }
        let nested = dir.path().join("apps/mars");
        std::fs::create_dir_all(&nested).unwrap();

        let root = GitRevision.current(dir.path()).unwrap();
        assert_eq!(root.hash.len(), 40);

        let inner = GitRevision.current(&nested).unwrap();
        assert!(inner.is_empty());
    }

    #[test]
    fn static_revision_returns_value() {
        let fixed = StaticRevision(SourceRevision {
            hash: "abc".into(),
            tag: "v1.0.0".into(),
        });
        let rev = fixed.current(Path::new("/")).unwrap();
        assert_eq!(rev.hash, "abc");
        assert!(!rev.is_empty());
    }
}
