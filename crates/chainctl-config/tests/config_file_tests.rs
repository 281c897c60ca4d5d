//! Config file tests
//!
//! Reads a complete `config.yml` from disk the way the coordinator does.

use chainctl_config::{locate_default, parse_file, ClientToml, ConfigError};
use tempfile::TempDir;

const FULL: &str = r#"
accounts:
  - name: alice
    coins: ["20000token", "200000000stake"]
  - name: bob
    coins: ["10000token", "100000000stake"]
validators:
  - name: alice
    bonded: "100000000stake"
    home: "$HOME/.mars-custom"
    keyring-backend: os
    client:
      keyring-backend: file
    app:
      grpc:
        address: "0.0.0.0:9092"
    config:
      rpc:
        laddr: "tcp://0.0.0.0:26659"
  - name: bob
    bonded: "50000000stake"
build:
  binary: marsd-dev
  proto:
    path: api/proto
    third_party_paths: [vendor/proto]
client:
  typescript:
    path: web/src/client
  openapi:
    path: docs/openapi.yml
faucet:
  name: bob
  coins: ["5token"]
  port: 4500
genesis:
  chain_id: mars-local
  app_state:
    staking:
      params:
        bond_denom: stake
"#;

#[test]
fn full_config_round_trips_from_disk() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("config.yml"), FULL).unwrap();

    let path = locate_default(dir.path()).unwrap();
    let config = parse_file(&path).unwrap();

    assert_eq!(config.validators.len(), 2);
    let first = config.first_validator();
    assert_eq!(first.home, "$HOME/.mars-custom");
    assert_eq!(first.keyring_backend, "os");
    assert_eq!(first.client_keyring_backend().unwrap().as_deref(), Some("file"));

    let servers = first.servers().unwrap();
    assert_eq!(servers.rpc, "tcp://0.0.0.0:26659");
    assert_eq!(servers.grpc, "0.0.0.0:9092");
    assert_eq!(servers.api, "0.0.0.0:1317");

    assert_eq!(config.build.binary, "marsd-dev");
    assert_eq!(config.build.proto.path, "api/proto");
    assert_eq!(config.build.proto.third_party_paths, vec!["vendor/proto"]);
    assert_eq!(config.ts_client_path(), "web/src/client");
    assert_eq!(config.faucet.as_ref().and_then(|f| f.port), Some(4500));
    assert_eq!(config.genesis_chain_id().unwrap().as_deref(), Some("mars-local"));
}

#[test]
fn edits_are_seen_on_next_parse() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.yml");
    std::fs::write(&path, "validators:\n  - name: alice\n").unwrap();
    assert!(parse_file(&path).unwrap().build.binary.is_empty());

    std::fs::write(&path, "validators:\n  - name: alice\nbuild:\n  binary: other\n").unwrap();
    assert_eq!(parse_file(&path).unwrap().build.binary, "other");
}

#[test]
fn client_file_absence_and_corruption_are_distinct() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config").join("client.toml");
    assert!(ClientToml::load(&path).unwrap().is_none());

    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "[[[").unwrap();
    assert!(matches!(
        ClientToml::load(&path),
        Err(ConfigError::ClientParse { .. })
    ));
}
