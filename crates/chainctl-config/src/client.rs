//! Node-side `client.toml`
//!
//! Written by the node binary on `init` under `<home>/config/client.toml`.
//! Loaded independently of the chain config: a missing file is normal before
//! the first init, a malformed one is reported.

use crate::error::{ConfigError, Result};
use serde::Deserialize;
use std::io::ErrorKind;
use std::path::Path;

/// Subset of `client.toml` read by chainctl
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ClientToml {
    /// Keyring backend
    #[serde(default)]
    pub keyring_backend: String,
    /// Chain ID
    #[serde(default)]
    pub chain_id: String,
    /// Node RPC endpoint
    #[serde(default)]
    pub node: String,
    /// Output format
    #[serde(default)]
    pub output: String,
    /// Broadcast mode
    #[serde(default)]
    pub broadcast_mode: String,
}

impl ClientToml {
    /// Load `client.toml`; `Ok(None)` if the file does not exist
    ///
    /// # Errors
    /// - `ConfigError::Read` for IO failures other than "not found"
    /// - `ConfigError::ClientParse` for malformed TOML
    pub fn load(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ConfigError::read(path, e)),
        };

        toml::from_str(&content)
            .map(Some)
            .map_err(|source| ConfigError::ClientParse {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Keyring backend, if set
    #[inline]
    #[must_use]
    pub fn keyring_backend(&self) -> Option<&str> {
        Some(self.keyring_backend.as_str()).filter(|b| !b.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        let loaded = ClientToml::load(dir.path().join("client.toml")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn reads_keyring_backend() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("client.toml");
        std::fs::write(
            &path,
            "chain-id = \"mars\"\nkeyring-backend = \"file\"\nnode = \"tcp://localhost:26657\"\n",
        )
        .unwrap();

        let loaded = ClientToml::load(&path).unwrap().unwrap();
        assert_eq!(loaded.keyring_backend(), Some("file"));
        assert_eq!(loaded.chain_id, "mars");
    }

    #[test]
    fn empty_backend_is_unset() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("client.toml");
        std::fs::write(&path, "keyring-backend = \"\"\n").unwrap();

        let loaded = ClientToml::load(&path).unwrap().unwrap();
        assert_eq!(loaded.keyring_backend(), None);
    }

    #[test]
    fn malformed_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("client.toml");
        std::fs::write(&path, "keyring-backend = \n").unwrap();

        let err = ClientToml::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ClientParse { .. }));
    }
}
