//! Application source descriptor

use crate::error::SourceError;
use crate::gomod::GoMod;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Name of the Go module file at the project root
pub const GO_MOD: &str = "go.mod";

/// A chain application's source directory
///
/// Derived once from `go.mod`:
/// - `name` is the last module path element, ignoring a `/vN` major suffix
/// - the node binary is `<name>d`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct App {
    path: PathBuf,
    module_path: String,
    name: String,
}

impl App {
    /// Describe the application at `path`
    ///
    /// # Errors
    /// - `SourceError::MissingModule` if there is no `go.mod`
    /// - `SourceError::NoModulePath` if it has no `module` line
    /// - `SourceError::Io` if the path cannot be resolved
    pub fn at(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let path = path.canonicalize().map_err(|source| SourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let go_mod = path.join(GO_MOD);
        let content = match std::fs::read_to_string(&go_mod) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(SourceError::MissingModule { path });
            }
            Err(source) => {
                return Err(SourceError::Io {
                    path: go_mod,
                    source,
                })
            }
        };

        let module_path = GoMod::parse(&content)
            .module
            .ok_or(SourceError::NoModulePath { path: go_mod })?;
        let name = name_from_module(&module_path).to_string();

        Ok(Self {
            path,
            module_path,
            name,
        })
    }

    /// Absolute project directory
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Go module path
    #[inline]
    #[must_use]
    pub fn module_path(&self) -> &str {
        &self.module_path
    }

    /// Short application name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Default node binary name
    #[must_use]
    pub fn binary_name(&self) -> String {
        format!("{}d", self.name)
    }
}

fn name_from_module(module: &str) -> &str {
    let mut elements = module.rsplit('/').filter(|e| !e.is_empty());
    let last = elements.next().unwrap_or(module);
    if is_major_suffix(last) {
        elements.next().unwrap_or(last)
    } else {
        last
    }
}

fn is_major_suffix(element: &str) -> bool {
    element
        .strip_prefix('v')
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}
