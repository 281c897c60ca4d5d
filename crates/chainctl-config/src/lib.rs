//! chainctl Config - chain configuration store
//!
//! Typed view of a chain's `config.yml` and of the node-side `client.toml`:
//! - [`Config`] and [`ValidatorConfig`]: the parsed schema with defaults
//! - [`locate_default`] / [`parse_file`]: finding and reading the config
//! - [`ClientToml`]: the client file written by the node on init
//!
//! Nothing here caches. Every call reads the filesystem again so edits made
//! while a node is being served are seen on the next lookup.
//!
//! # Example
//!
//! ```rust,ignore
//! use chainctl_config::{locate_default, parse_file};
//!
//! let path = locate_default("./mars")?;
//! let config = parse_file(path)?;
//! let rpc = config.first_validator().servers()?.rpc;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod client;
mod error;
mod loader;
mod schema;

pub use client::ClientToml;
pub use error::{ConfigError, Result};
pub use loader::{locate_default, parse_file, parse_str, DEFAULT_FILE_NAMES};
pub use schema::{
    Account, Build, Client, ClientPath, Config, Faucet, FreeForm, Proto, Servers,
    ValidatorConfig, CLIENT_KEYRING_BACKEND_KEY, DEFAULT_PROTO_PATH, DEFAULT_TS_CLIENT_PATH,
    GENESIS_CHAIN_ID_KEY,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
