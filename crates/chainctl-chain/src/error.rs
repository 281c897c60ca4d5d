//! Error types for the chain coordinator
//!
//! One top-level [`ChainError`] with a sub-enum per failure family:
//! - [`SourceError`]: the project directory is not a Go module
//! - [`VersionError`]: the SDK version is missing or unsupported
//! - [`ProcessError`]: node or tool processes failed to start or exit cleanly
//! - [`GenerationError`]: code generation or the Go toolchain failed

use crate::version::Family;
use chainctl_config::ConfigError;
use std::path::PathBuf;

/// Errors describing the application source directory
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// No `go.mod` at the project root
    #[error("no go.mod found in {path}")]
    MissingModule {
        /// Project root that was searched
        path: PathBuf,
    },

    /// `go.mod` has no `module` directive
    #[error("{path} declares no module path")]
    NoModulePath {
        /// The `go.mod` file
        path: PathBuf,
    },

    /// IO error while inspecting the project
    #[error("io error at {path}: {source}")]
    Io {
        /// Path being read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while classifying the SDK version
#[derive(Debug, thiserror::Error)]
pub enum VersionError {
    /// No `go.mod` to read the dependency from
    #[error("no go.mod found in {path}")]
    MissingModule {
        /// Project root that was searched
        path: PathBuf,
    },

    /// IO error reading `go.mod`
    #[error("io error reading {path}: {source}")]
    Io {
        /// The `go.mod` file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The module does not depend on the Cosmos SDK
    #[error("{path} does not depend on the Cosmos SDK")]
    SdkNotFound {
        /// The `go.mod` file
        path: PathBuf,
    },

    /// No plugin is registered for the detected family
    #[error("Cosmos SDK {raw} ({family}) is not supported, only Stargate (v0.40+) chains are")]
    Unsupported {
        /// Version string as declared
        raw: String,
        /// Family it classified as
        family: Family,
    },
}

/// Errors raised by child processes
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// The process could not be started
    #[error("failed to start {program}: {source}")]
    Spawn {
        /// Program name
        program: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The process ran but reported failure
    #[error("{program} exited with {}: {stderr}", .code.map_or_else(|| "signal".to_string(), |c| c.to_string()))]
    Exit {
        /// Program name
        program: String,
        /// Exit code, `None` if killed by a signal
        code: Option<i32>,
        /// Captured standard error, trimmed
        stderr: String,
    },

    /// Waiting on or signalling the process failed
    #[error("io error on {program}: {source}")]
    Io {
        /// Program name
        program: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by code generation and toolchain steps
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// A generation or toolchain stage failed
    #[error("{stage} failed: {message}")]
    Failed {
        /// Stage name
        stage: &'static str,
        /// What went wrong
        message: String,
    },

    /// A stage's tool could not be run at all
    #[error("{stage}: {source}")]
    Process {
        /// Stage name
        stage: &'static str,
        /// Process failure
        #[source]
        source: ProcessError,
    },

    /// The stage was cancelled before completion
    #[error("{stage} cancelled")]
    Cancelled {
        /// Stage name
        stage: &'static str,
    },
}

impl GenerationError {
    /// Create failure for stage
    pub fn failed(stage: &'static str, message: impl Into<String>) -> Self {
        Self::Failed {
            stage,
            message: message.into(),
        }
    }
}

/// Top-level coordinator error
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// Source directory problem
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Version classification failed
    #[error(transparent)]
    Classification(#[from] VersionError),

    /// Config present but invalid
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    /// A configured address cannot be normalized
    #[error("invalid {field} address '{address}': {reason}")]
    InvalidAddress {
        /// Which address (`rpc`, `p2p`, ...)
        field: &'static str,
        /// Address as configured
        address: String,
        /// Why it was rejected
        reason: String,
    },

    /// A configured keyring backend is not recognized
    #[error("invalid keyring backend '{value}' from {origin}")]
    InvalidKeyringBackend {
        /// Value as configured
        value: String,
        /// Source that supplied it
        origin: &'static str,
    },

    /// A fallback file exists but cannot be used
    #[error("cannot resolve {field} from {path}: {source}")]
    ResolutionFallbackExhausted {
        /// Field being resolved
        field: &'static str,
        /// Fallback file
        path: PathBuf,
        /// Why the file could not be used
        #[source]
        source: ConfigError,
    },

    /// No source produced a value and there was no fallback
    #[error("cannot resolve {field}: no source produced a value")]
    Unresolved {
        /// Field being resolved
        field: &'static str,
    },

    /// Child process failure
    #[error(transparent)]
    Process(#[from] ProcessError),

    /// Code generation or toolchain failure
    #[error(transparent)]
    Generation(#[from] GenerationError),

    /// Source watcher failure
    #[error("cannot watch sources: {0}")]
    Watch(#[from] notify::Error),

    /// IO error outside of child processes
    #[error("io error at {path}: {source}")]
    Io {
        /// Path being accessed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Operation cancelled by the caller
    #[error("operation cancelled")]
    Cancelled,
}

impl ChainError {
    /// Create IO error for path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the error stems from configuration content
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_)
                | Self::InvalidAddress { .. }
                | Self::InvalidKeyringBackend { .. }
                | Self::ResolutionFallbackExhausted { .. }
        )
    }

    /// Whether the error is a cancellation rather than a failure
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Cancelled | Self::Generation(GenerationError::Cancelled { .. })
        )
    }
}

/// Result alias for coordinator operations
pub type Result<T> = std::result::Result<T, ChainError>;
