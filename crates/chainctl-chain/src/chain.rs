//! The chain coordinator
//!
//! A [`Chain`] is built once per source tree. Construction classifies the SDK
//! version and binds the matching plugin; everything else (config, resolved
//! settings, runners) is computed on demand and never cached.

use crate::app::App;
use crate::cascade::{non_empty, Cascade, Resolved};
use crate::chaincmd::{ChainCmd, ChainCmdSettings};
use crate::env::{Environment, RPC_ADDRESS_VAR};
use crate::error::{ChainError, Result};
use crate::exec::try_resolve_abs_path;
use crate::keyring::KeyringBackend;
use crate::options::{ChainOptions, Verbosity};
use crate::plugin::{self, Plugin};
use crate::revision::{GitRevision, RevisionSource, SourceRevision};
use crate::runner::{LabeledOutput, Runner, StdioSink};
use crate::serve::ServeState;
use crate::version::{self, Version};
use chainctl_config::{locate_default, parse_file, ClientToml, Config};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Lifecycle coordinator for one chain application
#[derive(Debug)]
pub struct Chain {
    pub(crate) app: App,
    pub(crate) version: Version,
    pub(crate) source_revision: SourceRevision,
    pub(crate) plugin: Arc<dyn Plugin>,
    pub(crate) options: ChainOptions,
    pub(crate) env: Environment,
    pub(crate) serve: ServeState,
}

impl Chain {
    /// Coordinator for the application at `path`
    ///
    /// # Errors
    /// - `ChainError::Source` if `path` is not a Go module
    /// - `ChainError::Classification` if the SDK version is missing or not
    ///   Stargate
    pub fn new(path: impl AsRef<Path>, options: ChainOptions) -> Result<Self> {
        let app = App::at(path)?;
        let env = options
            .environment
            .clone()
            .unwrap_or_else(Environment::capture);

        let revisions: Arc<dyn RevisionSource> = options
            .revision_source
            .clone()
            .unwrap_or_else(|| Arc::new(GitRevision));
        let source_revision = revisions.current(app.path())?;

        let version = version::detect(app.path())?;
        let plugin = plugin::pick(&version)?;

        tracing::info!(
            app = app.name(),
            sdk = version.raw(),
            plugin = plugin.name(),
            revision = %source_revision.hash,
            "chain coordinator ready"
        );

        let serve = ServeState::new(options.events.clone());
        Ok(Self {
            app,
            version,
            source_revision,
            plugin,
            options,
            env,
            serve,
        })
    }

    /// Application source descriptor
    #[inline]
    #[must_use]
    pub fn app(&self) -> &App {
        &self.app
    }

    /// Detected SDK version
    #[inline]
    #[must_use]
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Source revision captured at construction
    #[inline]
    #[must_use]
    pub fn source_revision(&self) -> &SourceRevision {
        &self.source_revision
    }

    /// Bound plugin
    #[inline]
    #[must_use]
    pub fn plugin(&self) -> &dyn Plugin {
        self.plugin.as_ref()
    }

    /// Environment snapshot used for resolution
    #[inline]
    #[must_use]
    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// Replace the home override
    pub fn set_home(&mut self, home: impl Into<String>) {
        self.options.home = non_empty(home.into());
    }

    /// Config file in effect; `None` means the built-in default config
    ///
    /// An explicit config file is used as given, so a relative path is
    /// relative to the working directory, not the project.
    ///
    /// # Errors
    /// `ChainError::Configuration` if the project directory cannot be inspected.
    pub fn config_path(&self) -> Result<Option<PathBuf>> {
        if let Some(path) = &self.options.config_file {
            return Ok(Some(path.clone()));
        }
        match locate_default(self.app.path()) {
            Ok(path) => Ok(Some(path)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Load the chain config, falling back to the default config
    ///
    /// Read from disk on every call.
    ///
    /// # Errors
    /// `ChainError::Configuration` if the config exists but is invalid.
    pub fn config(&self) -> Result<Config> {
        match self.config_path()? {
            Some(path) => Ok(parse_file(path)?),
            None => {
                tracing::trace!(app = self.app.name(), "no config file, using defaults");
                Ok(Config::default())
            }
        }
    }

    /// Chain ID: option, genesis `chain_id`, app name
    ///
    /// # Errors
    /// `ChainError::Configuration` if the config is invalid or `chain_id` is
    /// not a string.
    pub fn id(&self) -> Result<String> {
        self.resolve_id().map(|r| r.value)
    }

    fn resolve_id(&self) -> Result<Resolved<String>> {
        let resolved = Cascade::new("chain id")
            .value("option", self.options.chain_id.clone())
            .source("genesis", || Ok(self.config()?.genesis_chain_id()?.and_then(non_empty)))
            .value("app name", Some(self.app.name().to_string()))
            .resolve()?;
        tracing::debug!(value = %resolved.value, source = resolved.source, "resolved chain id");
        Ok(resolved)
    }

    /// Chain ID used when joining a network
    #[must_use]
    pub fn network_chain_id(&self) -> String {
        format!("{}-1", self.app.name())
    }

    /// Node home: option, validator home, plugin default; env-expanded
    ///
    /// # Errors
    /// `ChainError::Configuration` if the config is invalid.
    pub fn home(&self) -> Result<PathBuf> {
        let resolved = Cascade::new("home")
            .value("option", self.options.home.clone())
            .source("validator", || {
                Ok(non_empty(self.config()?.first_validator().home.clone()))
            })
            .value("plugin default", Some(self.plugin.home(&self.app)))
            .resolve()?
            .map(|raw| self.env.expand(&raw));
        tracing::debug!(value = %resolved.value, source = resolved.source, "resolved home");
        Ok(PathBuf::from(resolved.value))
    }

    /// Keyring backend
    ///
    /// Sources in order: option, validator `keyring-backend`, validator
    /// `client.keyring-backend`, `<home>/config/client.toml`, `test`.
    ///
    /// # Errors
    /// - `ChainError::Configuration` if the config is invalid
    /// - `ChainError::InvalidKeyringBackend` for unknown names
    /// - `ChainError::ResolutionFallbackExhausted` if `client.toml` exists but
    ///   cannot be read or parsed
    pub fn keyring_backend(&self) -> Result<KeyringBackend> {
        let loaded = once_cell::unsync::OnceCell::<Config>::new();
        let config = || loaded.get_or_try_init(|| self.config());

        let resolved = Cascade::new("keyring backend")
            .value("option", self.options.keyring_backend)
            .source("validator", || {
                let raw = config()?.first_validator().keyring_backend.clone();
                parse_backend(non_empty(raw), "validator keyring-backend")
            })
            .source("validator client", || {
                let raw = config()?.first_validator().client_keyring_backend()?;
                parse_backend(raw.and_then(non_empty), "validator client.keyring-backend")
            })
            .source("client.toml", || {
                let path = self.client_toml_path()?;
                let client = ClientToml::load(&path).map_err(|source| {
                    ChainError::ResolutionFallbackExhausted {
                        field: "keyring backend",
                        path: path.clone(),
                        source,
                    }
                })?;
                let raw = client.as_ref().and_then(ClientToml::keyring_backend);
                parse_backend(raw.map(str::to_string), "client.toml")
            })
            .value("default", Some(KeyringBackend::default()))
            .resolve()?;

        tracing::debug!(value = %resolved.value, source = resolved.source, "resolved keyring backend");
        Ok(resolved.value)
    }

    /// Binary name: `build.binary` or `<name>d`
    ///
    /// # Errors
    /// `ChainError::Configuration` if the config is invalid.
    pub fn binary(&self) -> Result<String> {
        let resolved = Cascade::new("binary")
            .source("build.binary", || Ok(non_empty(self.config()?.build.binary)))
            .value("app default", Some(self.app.binary_name()))
            .resolve()?;
        tracing::debug!(value = %resolved.value, source = resolved.source, "resolved binary");
        Ok(resolved.value)
    }

    /// Absolute path of the node binary when it can be found
    ///
    /// # Errors
    /// Same as [`binary`](Self::binary).
    pub fn binary_path(&self) -> Result<PathBuf> {
        let binary = self.binary()?;
        Ok(try_resolve_abs_path(&binary, self.app.path(), &self.env))
    }

    /// Unnormalized RPC address: `RPC_ADDRESS`, then validator servers
    ///
    /// # Errors
    /// `ChainError::Configuration` if the config or an override is invalid.
    pub fn rpc_public_address(&self) -> Result<String> {
        let resolved = Cascade::new("rpc address")
            .value("env", self.env.get(RPC_ADDRESS_VAR).map(str::to_string))
            .source("validator servers", || {
                Ok(Some(self.config()?.first_validator().servers()?.rpc))
            })
            .resolve()?;
        tracing::debug!(value = %resolved.value, source = resolved.source, "resolved rpc address");
        Ok(resolved.value)
    }

    /// RPC address normalized to `tcp://host:port`
    ///
    /// # Errors
    /// - as [`rpc_public_address`](Self::rpc_public_address)
    /// - `ChainError::InvalidAddress` if the address is malformed
    pub fn node_address(&self) -> Result<String> {
        crate::addr::tcp("rpc", &self.rpc_public_address()?)
    }

    /// Build the command runner from freshly resolved settings
    ///
    /// # Errors
    /// Any resolution error, in resolution order.
    pub fn commands(&self) -> Result<Runner> {
        let chain_id = self.id()?;
        let home = self.home()?;
        let binary = self.binary_path()?;
        let keyring_backend = self.keyring_backend()?;
        let node_address = self.node_address()?;

        let cmd = ChainCmd::new(ChainCmdSettings {
            binary,
            chain_id,
            home,
            version: self.version.clone(),
            node_address,
            keyring_backend,
            conventions: self.plugin.conventions().clone(),
        });

        let output = match self.options.verbosity {
            Verbosity::Quiet => None,
            Verbosity::Verbose => {
                let sink = self
                    .options
                    .output
                    .clone()
                    .unwrap_or_else(|| Arc::new(StdioSink));
                Some(LabeledOutput::new(&self.app.binary_name(), sink))
            }
        };

        Ok(Runner::new(cmd, output))
    }

    /// `<home>/config/genesis.json`
    ///
    /// # Errors
    /// Same as [`home`](Self::home).
    pub fn genesis_path(&self) -> Result<PathBuf> {
        Ok(self.home()?.join("config").join("genesis.json"))
    }

    /// `<home>/config/gentx/gentx.json`
    ///
    /// # Errors
    /// Same as [`home`](Self::home).
    pub fn gentx_path(&self) -> Result<PathBuf> {
        Ok(self.gentxs_path()?.join("gentx.json"))
    }

    /// `<home>/config/gentx`
    ///
    /// # Errors
    /// Same as [`home`](Self::home).
    pub fn gentxs_path(&self) -> Result<PathBuf> {
        Ok(self.home()?.join("config").join("gentx"))
    }

    /// `<home>/config/app.toml`
    ///
    /// # Errors
    /// Same as [`home`](Self::home).
    pub fn app_toml_path(&self) -> Result<PathBuf> {
        Ok(self.home()?.join("config").join("app.toml"))
    }

    /// `<home>/config/config.toml`
    ///
    /// # Errors
    /// Same as [`home`](Self::home).
    pub fn config_toml_path(&self) -> Result<PathBuf> {
        Ok(self.home()?.join("config").join("config.toml"))
    }

    /// `<home>/config/client.toml`
    ///
    /// # Errors
    /// Same as [`home`](Self::home).
    pub fn client_toml_path(&self) -> Result<PathBuf> {
        Ok(self.home()?.join("config").join("client.toml"))
    }
}

fn parse_backend(raw: Option<String>, origin: &'static str) -> Result<Option<KeyringBackend>> {
    raw.map(|value| {
        value
            .parse()
            .map_err(|_| ChainError::InvalidKeyringBackend { value, origin })
    })
    .transpose()
}
