//! Coordinator construction options

use crate::codegen::{CacheStorage, CodeGenerator, Toolchain};
use crate::env::Environment;
use crate::keyring::KeyringBackend;
use crate::revision::RevisionSource;
use crate::runner::OutputSink;
use crate::serve::ServeEvent;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// Child process output handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Node output is discarded
    #[default]
    Quiet,
    /// Node output is forwarded to the output sink, labeled by app name
    Verbose,
}

/// Options for [`Chain::new`](crate::Chain::new)
///
/// Every setting is optional. Empty strings count as "not set" so callers can
/// pass CLI flags through without filtering them first.
#[derive(Debug, Clone, Default)]
pub struct ChainOptions {
    pub(crate) chain_id: Option<String>,
    pub(crate) home: Option<String>,
    pub(crate) keyring_backend: Option<KeyringBackend>,
    pub(crate) config_file: Option<PathBuf>,
    pub(crate) third_party_codegen: bool,
    pub(crate) check_dependencies: bool,
    pub(crate) print_generated_paths: bool,
    pub(crate) verbosity: Verbosity,
    pub(crate) environment: Option<Environment>,
    pub(crate) output: Option<Arc<dyn OutputSink>>,
    pub(crate) events: Option<UnboundedSender<ServeEvent>>,
    pub(crate) revision_source: Option<Arc<dyn RevisionSource>>,
    pub(crate) generator: Option<Arc<dyn CodeGenerator>>,
    pub(crate) toolchain: Option<Arc<dyn Toolchain>>,
    pub(crate) cache: Option<CacheStorage>,
}

impl ChainOptions {
    /// Default options
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the chain ID
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.chain_id = Some(id.into()).filter(|s| !s.is_empty());
        self
    }

    /// Override the node home directory
    #[must_use]
    pub fn with_home(mut self, home: impl Into<String>) -> Self {
        self.home = Some(home.into()).filter(|s| !s.is_empty());
        self
    }

    /// Override the keyring backend
    #[must_use]
    pub fn with_keyring_backend(mut self, backend: KeyringBackend) -> Self {
        self.keyring_backend = Some(backend);
        self
    }

    /// Read config from this file instead of the project default
    #[must_use]
    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        self.config_file = (!path.as_os_str().is_empty()).then_some(path);
        self
    }

    /// Also generate code for third-party proto modules
    #[must_use]
    pub fn enable_third_party_codegen(mut self) -> Self {
        self.third_party_codegen = true;
        self
    }

    /// Verify Go dependencies before generating code
    #[must_use]
    pub fn check_dependencies(mut self) -> Self {
        self.check_dependencies = true;
        self
    }

    /// Log the paths written by code generation
    #[must_use]
    pub fn print_generated_paths(mut self) -> Self {
        self.print_generated_paths = true;
        self
    }

    /// Set child output handling
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Shorthand for [`Verbosity::Verbose`]
    #[must_use]
    pub fn verbose(self) -> Self {
        self.with_verbosity(Verbosity::Verbose)
    }

    /// Use this environment instead of the process environment
    #[must_use]
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = Some(environment);
        self
    }

    /// Destination for verbose child output
    #[must_use]
    pub fn with_output(mut self, sink: Arc<dyn OutputSink>) -> Self {
        self.output = Some(sink);
        self
    }

    /// Receive serve lifecycle events
    #[must_use]
    pub fn with_events(mut self, events: UnboundedSender<ServeEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Replace the source revision reader
    #[must_use]
    pub fn with_revision_source(mut self, source: Arc<dyn RevisionSource>) -> Self {
        self.revision_source = Some(source);
        self
    }

    /// Replace the code generator
    #[must_use]
    pub fn with_generator(mut self, generator: Arc<dyn CodeGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Replace the Go toolchain
    #[must_use]
    pub fn with_toolchain(mut self, toolchain: Arc<dyn Toolchain>) -> Self {
        self.toolchain = Some(toolchain);
        self
    }

    /// Use this generation cache
    #[must_use]
    pub fn with_cache(mut self, cache: CacheStorage) -> Self {
        self.cache = Some(cache);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_strings_are_unset() {
        let opts = ChainOptions::new().with_id("").with_home("").with_config_file("");
        assert!(opts.chain_id.is_none());
        assert!(opts.home.is_none());
        assert!(opts.config_file.is_none());
    }

    #[test]
    fn builder_sets_values() {
        let opts = ChainOptions::new()
            .with_id("mars-1")
            .with_keyring_backend(KeyringBackend::File)
            .enable_third_party_codegen()
            .verbose();
        assert_eq!(opts.chain_id.as_deref(), Some("mars-1"));
        assert_eq!(opts.keyring_backend, Some(KeyringBackend::File));
        assert!(opts.third_party_codegen);
        assert!(!opts.check_dependencies);
        assert_eq!(opts.verbosity, Verbosity::Verbose);
    }
}
