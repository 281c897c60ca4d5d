//! Binary path lookup

use crate::env::Environment;
use std::path::{Path, PathBuf};

/// Best-effort absolute path for a binary name
///
/// Absolute paths are returned as-is and relative paths with a separator are
/// joined onto `root`. Bare names are looked up in `PATH`, then in the Go
/// binary directories. If nothing matches, the name is returned unchanged.
#[must_use]
pub fn try_resolve_abs_path(binary: &str, root: &Path, env: &Environment) -> PathBuf {
    let path = Path::new(binary);
    if path.is_absolute() {
        return path.to_path_buf();
    }
    if path.components().count() > 1 {
        return root.join(path);
    }

    env.search_path()
        .into_iter()
        .chain(env.go_bin_dirs())
        .map(|dir| dir.join(binary))
        .find(|candidate| is_executable(candidate))
        .unwrap_or_else(|| path.to_path_buf())
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
