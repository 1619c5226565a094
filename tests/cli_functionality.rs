//! Integration tests for CLI functionality
//!
//! These tests verify that argument parsing and configuration discovery work
//! together. Unit tests for individual functions live in the module files.

use clap::Parser;
use cstation::cli::{Args, ConfigDiscovery, ExecutionMode, Query, StationConfig};
use cstation::station::{Operation, ResourceDescriptor};
use serial_test::serial;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Runs `f` with the process working directory set to `dir`.
fn in_dir<T>(dir: &Path, f: impl FnOnce() -> T) -> T {
    let previous = env::current_dir().unwrap();
    env::set_current_dir(dir).unwrap();
    let result = f();
    env::set_current_dir(previous).unwrap();
    result
}

#[test]
#[serial]
fn test_local_config_file_is_discovered() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(
        temp_dir.path().join("cstation.toml"),
        "host_url = \"http://nas.local:8080\"\n[poll]\ninterval_ms = 250\n",
    )
    .unwrap();

    let (found, config) = in_dir(temp_dir.path(), || {
        (
            ConfigDiscovery::find_config_file(),
            ConfigDiscovery::discover_config().unwrap(),
        )
    });

    assert_eq!(
        found.unwrap().file_name().unwrap(),
        PathBuf::from("cstation.toml").as_os_str()
    );
    assert_eq!(config.host_url, "http://nas.local:8080");
    assert_eq!(config.poll.interval_ms, 250);
}

#[test]
#[serial]
fn test_hidden_dir_config_is_discovered() {
    let temp_dir = TempDir::new().unwrap();
    let hidden = temp_dir.path().join(".cstation");
    fs::create_dir_all(&hidden).unwrap();
    fs::write(hidden.join("config.toml"), "request_timeout_secs = 3\n").unwrap();

    let config = in_dir(temp_dir.path(), || ConfigDiscovery::discover_config().unwrap());
    assert_eq!(config.request_timeout_secs, 3);
}

#[test]
#[serial]
fn test_flags_override_discovered_file() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(
        temp_dir.path().join("cstation.toml"),
        "host_url = \"http://from-file:1\"\n",
    )
    .unwrap();

    let args = Args::try_parse_from([
        "cstation",
        "--host",
        "http://from-flag:2",
        "--timeout-secs",
        "30",
        "overview",
    ])
    .unwrap();

    let config = in_dir(temp_dir.path(), || {
        ConfigDiscovery::load(args.global.config.as_deref(), args.global.overrides()).unwrap()
    });

    assert_eq!(config.host_url, "http://from-flag:2");
    assert_eq!(
        config.poll_policy().timeout,
        Some(std::time::Duration::from_secs(30))
    );
}

#[test]
fn test_explicit_config_flag() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("station.toml");
    StationConfig {
        host_url: "http://explicit:9".to_string(),
        ..Default::default()
    }
    .to_toml_file(&config_path)
    .unwrap();

    let args = Args::try_parse_from([
        "cstation",
        "volume",
        "list",
        "--config",
        config_path.to_str().unwrap(),
    ])
    .unwrap();
    assert!(matches!(
        args.mode().unwrap(),
        ExecutionMode::Query(Query::Volumes)
    ));

    let config =
        ConfigDiscovery::load(args.global.config.as_deref(), Default::default()).unwrap();
    assert_eq!(config.host_url, "http://explicit:9");
    assert!(config.build_client().is_ok());
}

#[test]
fn test_app_lifecycle_commands() {
    let start = Args::try_parse_from(["cstation", "app", "start", "blog"]).unwrap();
    let stop = Args::try_parse_from(["cstation", "app", "stop", "blog"]).unwrap();
    let delete =
        Args::try_parse_from(["cstation", "app", "delete", "blog", "--remove-volumes"]).unwrap();

    for (args, expected) in [
        (start, Operation::Start),
        (stop, Operation::Stop),
        (
            delete,
            Operation::Delete {
                remove_volumes: true,
            },
        ),
    ] {
        match args.mode().unwrap() {
            ExecutionMode::Reconcile(request) => {
                assert_eq!(request.operation, expected);
                assert!(matches!(
                    request.descriptor,
                    ResourceDescriptor::Application(ref name) if name == "blog"
                ));
            }
            other => panic!("Expected Reconcile mode, got {:?}", other),
        }
    }
}

#[test]
fn test_unknown_subcommand_rejected() {
    assert!(Args::try_parse_from(["cstation", "volume", "recreate", "v1"]).is_err());
    assert!(Args::try_parse_from(["cstation", "container", "restart", "abc"]).is_err());
}
