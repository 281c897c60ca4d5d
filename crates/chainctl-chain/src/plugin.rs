//! Version-specific plugins
//!
//! A plugin supplies what differs between SDK families: the default home
//! directory and the node's command/flag conventions. Plugins are looked up
//! in a family-keyed table; a family without an entry is unsupported.

use crate::app::App;
use crate::error::VersionError;
use crate::version::{Family, Version};
use std::fmt;
use std::sync::Arc;

/// Flag names and subcommands of a node binary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandConventions {
    /// Home directory flag
    pub home_flag: &'static str,
    /// Chain ID flag
    pub chain_id_flag: &'static str,
    /// Node RPC address flag
    pub node_flag: &'static str,
    /// Keyring backend flag
    pub keyring_backend_flag: &'static str,
    /// Output format flag
    pub output_flag: &'static str,
    /// Start the node
    pub start: &'static [&'static str],
    /// Initialize the home directory
    pub init: &'static [&'static str],
    /// Keys subcommand prefix
    pub keys: &'static [&'static str],
    /// Node status
    pub status: &'static [&'static str],
    /// Export state
    pub export: &'static [&'static str],
    /// Add a genesis account
    pub add_genesis_account: &'static [&'static str],
    /// Create a genesis transaction
    pub gentx: &'static [&'static str],
    /// Collect genesis transactions
    pub collect_gentxs: &'static [&'static str],
    /// Validate the genesis file
    pub validate_genesis: &'static [&'static str],
}

/// Stargate node conventions
pub const STARGATE_CONVENTIONS: CommandConventions = CommandConventions {
    home_flag: "--home",
    chain_id_flag: "--chain-id",
    node_flag: "--node",
    keyring_backend_flag: "--keyring-backend",
    output_flag: "--output",
    start: &["start"],
    init: &["init"],
    keys: &["keys"],
    status: &["status"],
    export: &["export"],
    add_genesis_account: &["add-genesis-account"],
    gentx: &["gentx"],
    collect_gentxs: &["collect-gentxs"],
    validate_genesis: &["validate-genesis"],
};

/// Behavior that varies with the SDK family
pub trait Plugin: Send + Sync + fmt::Debug {
    /// Plugin name
    fn name(&self) -> &'static str;

    /// Family served by this plugin
    fn family(&self) -> Family;

    /// Default home directory, before environment expansion
    fn home(&self, app: &App) -> String;

    /// Node command conventions
    fn conventions(&self) -> &CommandConventions;
}

/// Plugin for Stargate (v0.40+) chains
#[derive(Debug, Clone, Default)]
pub struct StargatePlugin;

impl Plugin for StargatePlugin {
    fn name(&self) -> &'static str {
        "stargate"
    }

    fn family(&self) -> Family {
        Family::Stargate
    }

    fn home(&self, app: &App) -> String {
        format!("$HOME/.{}", app.name())
    }

    fn conventions(&self) -> &CommandConventions {
        &STARGATE_CONVENTIONS
    }
}

struct PluginEntry {
    family: Family,
    build: fn() -> Arc<dyn Plugin>,
}

const REGISTRY: &[PluginEntry] = &[PluginEntry {
    family: Family::Stargate,
    build: || Arc::new(StargatePlugin),
}];

/// Families with a registered plugin
pub fn supported_families() -> impl Iterator<Item = Family> {
    REGISTRY.iter().map(|entry| entry.family)
}

/// Plugin for a classified version
///
/// # Errors
/// `VersionError::Unsupported` if no plugin serves the version's family.
pub fn pick(version: &Version) -> Result<Arc<dyn Plugin>, VersionError> {
    REGISTRY
        .iter()
        .find(|entry| entry.family == version.family())
        .map(|entry| (entry.build)())
        .ok_or_else(|| VersionError::Unsupported {
            raw: version.raw().to_string(),
            family: version.family(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stargate_is_picked() {
        let plugin = pick(&Version::classify("v0.45.4")).unwrap();
        assert_eq!(plugin.name(), "stargate");
        assert_eq!(plugin.family(), Family::Stargate);
        assert_eq!(plugin.conventions().start, &["start"]);
    }

    #[test]
    fn launchpad_and_unrecognized_are_refused() {
        for raw in ["v0.39.1", "master"] {
            let err = pick(&Version::classify(raw)).unwrap_err();
            assert!(matches!(err, VersionError::Unsupported { .. }), "{raw}");
        }
    }

    #[test]
    fn only_stargate_registered() {
        assert_eq!(supported_families().collect::<Vec<_>>(), vec![Family::Stargate]);
    }
}
