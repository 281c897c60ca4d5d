//! Node command builder
//!
//! [`ChainCmd`] carries the resolved settings of one chain and renders node
//! invocations as [`Step`]s. It never runs anything itself.

use crate::keyring::KeyringBackend;
use crate::plugin::CommandConventions;
use crate::version::Version;
use std::fmt;
use std::path::{Path, PathBuf};

/// A single program invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Program to run
    pub program: PathBuf,
    /// Arguments
    pub args: Vec<String>,
    /// Extra environment variables
    pub envs: Vec<(String, String)>,
    /// Working directory
    pub current_dir: Option<PathBuf>,
}

impl Step {
    /// Step without arguments
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            current_dir: None,
        }
    }

    /// Append arguments
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Append an environment variable
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Set the working directory
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Program name for messages
    #[must_use]
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map_or_else(|| self.program.display().to_string(), |n| n.to_string_lossy().into_owned())
    }

    /// Build a tokio command
    #[must_use]
    pub fn to_command(&self) -> tokio::process::Command {
        let mut command = tokio::process::Command::new(&self.program);
        command.args(&self.args);
        command.envs(self.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }
        command
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Resolved node command settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainCmd {
    binary: PathBuf,
    chain_id: String,
    home: PathBuf,
    version: Version,
    node_address: String,
    keyring_backend: KeyringBackend,
    conventions: CommandConventions,
}

/// Fields for [`ChainCmd::new`]
#[derive(Debug, Clone)]
pub struct ChainCmdSettings {
    /// Absolute binary path, or bare name if unresolved
    pub binary: PathBuf,
    /// Chain ID
    pub chain_id: String,
    /// Node home
    pub home: PathBuf,
    /// SDK version
    pub version: Version,
    /// Normalized RPC address
    pub node_address: String,
    /// Keyring backend
    pub keyring_backend: KeyringBackend,
    /// Plugin conventions
    pub conventions: CommandConventions,
}

impl ChainCmd {
    /// Create from resolved settings
    #[must_use]
    pub fn new(settings: ChainCmdSettings) -> Self {
        Self {
            binary: settings.binary,
            chain_id: settings.chain_id,
            home: settings.home,
            version: settings.version,
            node_address: settings.node_address,
            keyring_backend: settings.keyring_backend,
            conventions: settings.conventions,
        }
    }

    /// Node binary
    #[inline]
    #[must_use]
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Chain ID
    #[inline]
    #[must_use]
    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    /// Node home
    #[inline]
    #[must_use]
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// SDK version
    #[inline]
    #[must_use]
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Node RPC address
    #[inline]
    #[must_use]
    pub fn node_address(&self) -> &str {
        &self.node_address
    }

    /// Keyring backend
    #[inline]
    #[must_use]
    pub fn keyring_backend(&self) -> KeyringBackend {
        self.keyring_backend
    }

    fn step(&self, subcommand: &[&str]) -> Step {
        Step::new(&self.binary).args(subcommand.iter().copied())
    }

    fn home_args(&self) -> [String; 2] {
        [
            self.conventions.home_flag.to_string(),
            self.home.display().to_string(),
        ]
    }

    fn chain_id_args(&self) -> [String; 2] {
        [
            self.conventions.chain_id_flag.to_string(),
            self.chain_id.clone(),
        ]
    }

    fn keyring_args(&self) -> [String; 2] {
        [
            self.conventions.keyring_backend_flag.to_string(),
            self.keyring_backend.to_string(),
        ]
    }

    /// `start`
    #[must_use]
    pub fn start(&self, extra: &[&str]) -> Step {
        self.step(self.conventions.start)
            .args(self.home_args())
            .args(extra.iter().copied())
    }

    /// `init <moniker>`
    #[must_use]
    pub fn init(&self, moniker: &str) -> Step {
        self.step(self.conventions.init)
            .args([moniker])
            .args(self.chain_id_args())
            .args(self.home_args())
    }

    /// `keys add <name>`
    #[must_use]
    pub fn add_key(&self, name: &str) -> Step {
        self.step(self.conventions.keys)
            .args(["add", name, self.conventions.output_flag, "json"])
            .args(self.keyring_args())
            .args(self.home_args())
    }

    /// `keys list`
    #[must_use]
    pub fn list_keys(&self) -> Step {
        self.step(self.conventions.keys)
            .args(["list", self.conventions.output_flag, "json"])
            .args(self.keyring_args())
            .args(self.home_args())
    }

    /// `status` against the node address
    #[must_use]
    pub fn status(&self) -> Step {
        self.step(self.conventions.status)
            .args([self.conventions.node_flag, self.node_address.as_str()])
    }

    /// `export`
    #[must_use]
    pub fn export(&self) -> Step {
        self.step(self.conventions.export).args(self.home_args())
    }

    /// `add-genesis-account <address> <coins>`
    #[must_use]
    pub fn add_genesis_account(&self, address: &str, coins: &str) -> Step {
        self.step(self.conventions.add_genesis_account)
            .args([address, coins])
            .args(self.keyring_args())
            .args(self.home_args())
    }

    /// `gentx <key> <amount>`
    #[must_use]
    pub fn gentx(&self, key: &str, amount: &str) -> Step {
        self.step(self.conventions.gentx)
            .args([key, amount])
            .args(self.chain_id_args())
            .args(self.keyring_args())
            .args(self.home_args())
    }

    /// `collect-gentxs`
    #[must_use]
    pub fn collect_gentxs(&self) -> Step {
        self.step(self.conventions.collect_gentxs)
            .args(self.home_args())
    }

    /// `validate-genesis`
    #[must_use]
    pub fn validate_genesis(&self) -> Step {
        self.step(self.conventions.validate_genesis)
            .args(self.home_args())
    }
}
