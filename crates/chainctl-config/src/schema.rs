//! Chain config schema
//!
//! Mirrors the YAML layout of `config.yml`:
//!
//! ```yaml
//! accounts:
//!   - name: alice
//!     coins: ["20000token", "200000000stake"]
//! validators:
//!   - name: alice
//!     bonded: "100000000stake"
//!     home: "$HOME/.mars"
//!     keyring-backend: os
//!     config:
//!       rpc: { laddr: "tcp://0.0.0.0:26658" }
//! build:
//!   binary: marsd
//!   proto:
//!     path: proto
//!     third_party_paths: [third_party/proto]
//! genesis:
//!   chain_id: mars-1
//! ```

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;

/// Free-form map used for overrides the schema does not model
pub type FreeForm = BTreeMap<String, Value>;

/// Key under a validator's `client` map holding the keyring backend
pub const CLIENT_KEYRING_BACKEND_KEY: &str = "keyring-backend";

/// Key under `genesis` holding the chain ID
pub const GENESIS_CHAIN_ID_KEY: &str = "chain_id";

/// Default TypeScript client output directory
pub const DEFAULT_TS_CLIENT_PATH: &str = "ts-client";

/// Default proto directory
pub const DEFAULT_PROTO_PATH: &str = "proto";

/// Parsed chain configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Genesis accounts
    #[serde(default)]
    pub accounts: Vec<Account>,
    /// Validators, in declaration order. Never empty.
    pub validators: Vec<ValidatorConfig>,
    /// Build settings
    #[serde(default)]
    pub build: Build,
    /// Generated client settings
    #[serde(default)]
    pub client: Client,
    /// Faucet settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub faucet: Option<Faucet>,
    /// Raw genesis overrides
    #[serde(default)]
    pub genesis: FreeForm,
}

impl Config {
    /// The validator consulted for node-local lookups
    ///
    /// # Panics
    /// If the config has no validator. Parsed and default configs always
    /// have one; an empty list means the value was built by hand in violation
    /// of the invariant.
    #[inline]
    #[must_use]
    pub fn first_validator(&self) -> &ValidatorConfig {
        self.validators
            .first()
            .expect("chain config invariant violated: no validator declared")
    }

    /// Chain ID pinned in genesis overrides
    ///
    /// Returns `Ok(None)` when the key is absent.
    ///
    /// # Errors
    /// `ConfigError::InvalidValue` if the key holds a non-string.
    pub fn genesis_chain_id(&self) -> Result<Option<String>> {
        match self.genesis.get(GENESIS_CHAIN_ID_KEY) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(id)) => Ok(Some(id.clone())),
            Some(_) => Err(ConfigError::invalid_value(
                format!("genesis.{GENESIS_CHAIN_ID_KEY}"),
                "a string",
            )),
        }
    }

    /// TypeScript client output directory, as written in the config
    #[must_use]
    pub fn ts_client_path(&self) -> &str {
        if self.client.typescript.path.is_empty() {
            DEFAULT_TS_CLIENT_PATH
        } else {
            &self.client.typescript.path
        }
    }

    /// Whether any TypeScript-based client generation is requested
    #[inline]
    #[must_use]
    pub fn wants_ts_client(&self) -> bool {
        !self.client.typescript.path.is_empty() || !self.client.vuex.path.is_empty()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            accounts: vec![
                Account::new("alice", ["20000token", "200000000stake"]),
                Account::new("bob", ["10000token", "100000000stake"]),
            ],
            validators: vec![ValidatorConfig {
                name: "alice".to_string(),
                bonded: "100000000stake".to_string(),
                ..ValidatorConfig::default()
            }],
            build: Build::default(),
            client: Client {
                openapi: ClientPath::new("docs/static/openapi.yml"),
                ..Client::default()
            },
            faucet: None,
            genesis: FreeForm::new(),
        }
    }
}

/// Genesis account
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Key name
    pub name: String,
    /// Initial balances
    #[serde(default)]
    pub coins: Vec<String>,
    /// Optional mnemonic used to recover the key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mnemonic: Option<String>,
}

impl Account {
    /// Create account with coins
    #[must_use]
    pub fn new<const N: usize>(name: &str, coins: [&str; N]) -> Self {
        Self {
            name: name.to_string(),
            coins: coins.iter().map(ToString::to_string).collect(),
            mnemonic: None,
        }
    }
}

/// Faucet settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Faucet {
    /// Key name of the funding account
    pub name: String,
    /// Coins handed out per request
    #[serde(default)]
    pub coins: Vec<String>,
    /// Listening port
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

/// Build settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Build {
    /// Binary name override
    #[serde(default)]
    pub binary: String,
    /// Path of the main package, relative to the app root
    #[serde(default)]
    pub main: String,
    /// Proto settings
    #[serde(default)]
    pub proto: Proto,
}

/// Proto source settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proto {
    /// App proto directory, relative to the app root
    #[serde(default = "default_proto_path")]
    pub path: String,
    /// Extra include directories for third-party protos
    #[serde(default = "default_third_party_paths")]
    pub third_party_paths: Vec<String>,
}

impl Default for Proto {
    fn default() -> Self {
        Self {
            path: default_proto_path(),
            third_party_paths: default_third_party_paths(),
        }
    }
}

fn default_proto_path() -> String {
    DEFAULT_PROTO_PATH.to_string()
}

fn default_third_party_paths() -> Vec<String> {
    vec!["third_party/proto".to_string(), "proto_vendor".to_string()]
}

/// Generated client settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    /// TypeScript client
    #[serde(default)]
    pub typescript: ClientPath,
    /// Vuex stores
    #[serde(default)]
    pub vuex: ClientPath,
    /// OpenAPI spec
    #[serde(default)]
    pub openapi: ClientPath,
}

/// Output location of a generated client
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientPath {
    /// Output path; empty disables the target
    #[serde(default)]
    pub path: String,
}

impl ClientPath {
    /// Create client path
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

/// Validator settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ValidatorConfig {
    /// Key name of the validator
    #[serde(default)]
    pub name: String,
    /// Self-delegation
    #[serde(default)]
    pub bonded: String,
    /// Node home override
    #[serde(default)]
    pub home: String,
    /// Keyring backend override
    #[serde(default)]
    pub keyring_backend: String,
    /// Overrides for the node's `client.toml`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<FreeForm>,
    /// Overrides for the node's `app.toml`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<FreeForm>,
    /// Overrides for the node's `config.toml`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<FreeForm>,
}

impl ValidatorConfig {
    /// Keyring backend from the `client` overrides
    ///
    /// # Errors
    /// `ConfigError::InvalidValue` if the key holds a non-string.
    pub fn client_keyring_backend(&self) -> Result<Option<String>> {
        let Some(client) = &self.client else {
            return Ok(None);
        };
        match client.get(CLIENT_KEYRING_BACKEND_KEY) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(backend)) => Ok(Some(backend.clone())),
            Some(_) => Err(ConfigError::invalid_value(
                format!("client.{CLIENT_KEYRING_BACKEND_KEY}"),
                "a string",
            )),
        }
    }

    /// Server addresses, defaults overlaid with `app`/`config` overrides
    ///
    /// # Errors
    /// `ConfigError::InvalidValue` if an override holds a non-string.
    pub fn servers(&self) -> Result<Servers> {
        let mut servers = Servers::default();

        let overlays: [(&Option<FreeForm>, &str, &str, &mut String); 6] = [
            (&self.config, "rpc", "laddr", &mut servers.rpc),
            (&self.config, "p2p", "laddr", &mut servers.p2p),
            (&self.config, "rpc", "pprof_laddr", &mut servers.prof),
            (&self.app, "grpc", "address", &mut servers.grpc),
            (&self.app, "grpc-web", "address", &mut servers.grpc_web),
            (&self.app, "api", "address", &mut servers.api),
        ];

        for (map, section, key, slot) in overlays {
            if let Some(address) = lookup_string(map.as_ref(), section, key)? {
                *slot = address;
            }
        }

        Ok(servers)
    }
}

/// Resolve `section.key` inside a free-form map
fn lookup_string(map: Option<&FreeForm>, section: &str, key: &str) -> Result<Option<String>> {
    let Some(map) = map else {
        return Ok(None);
    };
    let Some(section_value) = map.get(section) else {
        return Ok(None);
    };
    let Value::Mapping(entries) = section_value else {
        return Err(ConfigError::invalid_value(section, "a mapping"));
    };
    match entries.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ConfigError::invalid_value(
            format!("{section}.{key}"),
            "a string",
        )),
    }
}

/// Listening addresses of a validator node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Servers {
    /// Tendermint RPC
    pub rpc: String,
    /// P2P
    pub p2p: String,
    /// pprof
    pub prof: String,
    /// gRPC
    pub grpc: String,
    /// gRPC-web
    pub grpc_web: String,
    /// REST API
    pub api: String,
}

impl Default for Servers {
    fn default() -> Self {
        Self {
            rpc: "0.0.0.0:26657".to_string(),
            p2p: "0.0.0.0:26656".to_string(),
            prof: "0.0.0.0:6060".to_string(),
            grpc: "0.0.0.0:9090".to_string(),
            grpc_web: "0.0.0.0:9091".to_string(),
            api: "0.0.0.0:1317".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator_from(yaml: &str) -> ValidatorConfig {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn default_config_has_one_validator() {
        let config = Config::default();
        assert_eq!(config.validators.len(), 1);
        assert_eq!(config.first_validator().name, "alice");
        assert_eq!(config.build.proto.path, "proto");
    }

    #[test]
    fn servers_default_without_overrides() {
        let servers = ValidatorConfig::default().servers().unwrap();
        assert_eq!(servers, Servers::default());
    }

    #[test]
    fn servers_pick_up_overrides() {
        let validator = validator_from(
            r#"
name: alice
config:
  rpc:
    laddr: "tcp://127.0.0.1:36657"
app:
  api:
    address: "127.0.0.1:1318"
"#,
        );
        let servers = validator.servers().unwrap();
        assert_eq!(servers.rpc, "tcp://127.0.0.1:36657");
        assert_eq!(servers.api, "127.0.0.1:1318");
        assert_eq!(servers.grpc, "0.0.0.0:9090");
    }

    #[test]
    fn servers_reject_wrong_typed_override() {
        let validator = validator_from(
            r"
config:
  rpc:
    laddr: 26657
",
        );
        let err = validator.servers().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "rpc.laddr"));
    }

    #[test]
    fn client_keyring_backend_lookup() {
        let validator = validator_from("client:\n  keyring-backend: file\n");
        assert_eq!(
            validator.client_keyring_backend().unwrap().as_deref(),
            Some("file")
        );

        let validator = validator_from("client:\n  keyring-backend: [a]\n");
        assert!(validator.client_keyring_backend().is_err());

        assert_eq!(ValidatorConfig::default().client_keyring_backend().unwrap(), None);
    }

    #[test]
    fn genesis_chain_id_lookup() {
        let mut config = Config::default();
        assert_eq!(config.genesis_chain_id().unwrap(), None);

        config
            .genesis
            .insert("chain_id".into(), Value::String("mars-7".into()));
        assert_eq!(config.genesis_chain_id().unwrap().as_deref(), Some("mars-7"));

        config.genesis.insert("chain_id".into(), Value::Bool(true));
        assert!(config.genesis_chain_id().is_err());
    }

    #[test]
    fn ts_client_path_defaults() {
        let mut config = Config::default();
        assert_eq!(config.ts_client_path(), DEFAULT_TS_CLIENT_PATH);
        assert!(!config.wants_ts_client());

        config.client.vuex = ClientPath::new("vue/src/store");
        assert!(config.wants_ts_client());

        config.client.typescript = ClientPath::new("web/client");
        assert_eq!(config.ts_client_path(), "web/client");
    }
}
