//! Environment snapshot
//!
//! Resolution reads environment variables through an [`Environment`] value
//! instead of the process environment, so tests and embedders can supply
//! their own.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Overrides the node RPC address when set and non-empty
pub const RPC_ADDRESS_VAR: &str = "RPC_ADDRESS";

static VAR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
        .expect("variable pattern compiles")
});

/// Immutable set of environment variables
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: BTreeMap<String, String>,
}

impl Environment {
    /// Snapshot of the current process environment
    #[must_use]
    pub fn capture() -> Self {
        Self {
            vars: std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
                .collect(),
        }
    }

    /// Empty environment
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Set a variable
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    /// Remove a variable
    #[must_use]
    pub fn without(mut self, key: &str) -> Self {
        self.vars.remove(key);
        self
    }

    /// Value of a variable, treating empty as unset
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Expand `$VAR` and `${VAR}`; unknown variables expand to nothing
    #[must_use]
    pub fn expand(&self, input: &str) -> String {
        VAR_PATTERN
            .replace_all(input, |caps: &Captures<'_>| {
                let name = caps
                    .get(1)
                    .or_else(|| caps.get(2))
                    .map_or("", |m| m.as_str());
                self.get(name).unwrap_or_default().to_string()
            })
            .into_owned()
    }

    /// Entries of `PATH`
    #[must_use]
    pub fn search_path(&self) -> Vec<PathBuf> {
        self.get("PATH")
            .map(|p| std::env::split_paths(p).collect())
            .unwrap_or_default()
    }

    /// Directories where `go install` places binaries, in lookup order
    #[must_use]
    pub fn go_bin_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = Vec::new();
        if let Some(gobin) = self.get("GOBIN") {
            dirs.push(PathBuf::from(gobin));
        }
        if let Some(gopath) = self.get("GOPATH") {
            dirs.extend(std::env::split_paths(gopath).map(|p| p.join("bin")));
        }
        if let Some(home) = self.get("HOME") {
            dirs.push(PathBuf::from(home).join("go").join("bin"));
        }
        dirs
    }
}
