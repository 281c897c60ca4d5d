//! Error types for chain configuration
//!
//! Distinguishes the cases callers must treat differently:
//! - a config file that does not exist (callers fall back to defaults)
//! - a config file that exists but cannot be read or parsed
//! - a parsed config that violates a structural invariant
//! - a free-form override holding a value of the wrong type

use std::path::PathBuf;

/// Errors raised while locating, reading, or interpreting configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// No config file in the searched directory
    #[error("no config file found in {dir}")]
    NotFound {
        /// Directory that was searched
        dir: PathBuf,
    },

    /// IO error while reading a config file
    #[error("io error reading {path}: {source}")]
    Read {
        /// Config file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// YAML syntax or schema error in the chain config
    #[error("cannot parse {path}: {source}")]
    Parse {
        /// Config file
        path: PathBuf,
        /// YAML error
        #[source]
        source: serde_yaml::Error,
    },

    /// TOML syntax or schema error in a node-side client file
    #[error("cannot parse client config {path}: {source}")]
    ClientParse {
        /// Client file
        path: PathBuf,
        /// TOML error
        #[source]
        source: toml::de::Error,
    },

    /// The config declares no validator
    #[error("config {path} must declare at least one validator")]
    NoValidators {
        /// Config file
        path: PathBuf,
    },

    /// A free-form override is present but has the wrong shape
    #[error("invalid value for '{field}': expected {expected}")]
    InvalidValue {
        /// Dotted path of the offending field
        field: String,
        /// Description of the expected shape
        expected: &'static str,
    },
}

impl ConfigError {
    /// Create IO error for path
    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    /// Create wrong-type error for a dotted field path
    pub fn invalid_value(field: impl Into<String>, expected: &'static str) -> Self {
        Self::InvalidValue {
            field: field.into(),
            expected,
        }
    }

    /// Whether the error only says "there is no file"
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result alias for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;
