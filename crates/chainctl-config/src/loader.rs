//! Locating and parsing `config.yml`

use crate::error::{ConfigError, Result};
use crate::schema::Config;
use std::path::{Path, PathBuf};

/// File names tried by [`locate_default`], in priority order
pub const DEFAULT_FILE_NAMES: &[&str] = &["config.yml", "config.yaml"];

/// Find the default config file inside `dir`
///
/// # Errors
/// `ConfigError::NotFound` when none of [`DEFAULT_FILE_NAMES`] exists.
pub fn locate_default(dir: impl AsRef<Path>) -> Result<PathBuf> {
    let dir = dir.as_ref();
    DEFAULT_FILE_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| ConfigError::NotFound {
            dir: dir.to_path_buf(),
        })
}

/// Read and parse a config file
///
/// # Errors
/// - `ConfigError::Read` if the file cannot be read
/// - `ConfigError::Parse` on YAML/schema errors
/// - `ConfigError::NoValidators` if no validator is declared
pub fn parse_file(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read(path, e))?;
    parse_str(&content, path)
}

/// Parse config content; `origin` is only used in error messages
///
/// # Errors
/// Same as [`parse_file`], minus IO.
pub fn parse_str(content: &str, origin: impl AsRef<Path>) -> Result<Config> {
    let origin = origin.as_ref();
    let config: Config = serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
        path: origin.to_path_buf(),
        source,
    })?;

    if config.validators.is_empty() {
        return Err(ConfigError::NoValidators {
            path: origin.to_path_buf(),
        });
    }

    tracing::trace!(path = %origin.display(), validators = config.validators.len(), "parsed chain config");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const MINIMAL: &str = "validators:\n  - name: alice\n    bonded: 100000000stake\n";

    #[test]
    fn locate_prefers_yml() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("config.yaml"), MINIMAL).unwrap();
        std::fs::write(dir.path().join("config.yml"), MINIMAL).unwrap();

        let found = locate_default(dir.path()).unwrap();
        assert_eq!(found, dir.path().join("config.yml"));
    }

    #[test]
    fn locate_falls_back_to_yaml() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("config.yaml"), MINIMAL).unwrap();

        let found = locate_default(dir.path()).unwrap();
        assert_eq!(found, dir.path().join("config.yaml"));
    }

    #[test]
    fn locate_reports_missing() {
        let dir = TempDir::new().unwrap();
        let err = locate_default(dir.path()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn parse_fills_defaults() {
        let config = parse_str(MINIMAL, "config.yml").unwrap();
        assert_eq!(config.first_validator().bonded, "100000000stake");
        assert_eq!(config.build.proto.path, "proto");
        assert!(config.build.binary.is_empty());
        assert!(config.accounts.is_empty());
    }

    #[test]
    fn parse_rejects_empty_validators() {
        let err = parse_str("validators: []\n", "config.yml").unwrap_err();
        assert!(matches!(err, ConfigError::NoValidators { .. }));
    }

    #[test]
    fn parse_rejects_malformed_yaml() {
        let err = parse_str("validators: [\n", "config.yml").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn parse_file_reports_io() {
        let dir = TempDir::new().unwrap();
        let err = parse_file(dir.path().join("absent.yml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
