use cstation::cli::{ConfigOverrides, StationConfig};
use std::time::Duration;
use tempfile::NamedTempFile;

#[test]
fn test_config_file_operations() {
    let original_config = StationConfig {
        host_url: "https://nas.example:8443".to_string(),
        token: Some("NAS_SID=secret".to_string()),
        ..Default::default()
    };

    let temp_file = NamedTempFile::new().expect("Should be able to create temporary file");
    let temp_path = temp_file.path();

    original_config
        .to_toml_file(temp_path)
        .expect("Should be able to save config to file");

    let loaded_config =
        StationConfig::from_toml_file(temp_path).expect("Should be able to load config from file");

    assert_eq!(original_config, loaded_config);
    assert_eq!(
        loaded_config.credential().map(|c| c.bearer().to_string()),
        Some("secret".to_string())
    );
}

#[test]
fn test_full_toml_document() {
    let toml_content = r#"
host_url = "http://192.168.1.20:8080"
request_timeout_secs = 30
token = "NAS_SID=abc"

[poll]
interval_ms = 1000
timeout_secs = 0
"#;

    let config: StationConfig = toml::from_str(toml_content).expect("Should parse full config");

    assert_eq!(config.host_url, "http://192.168.1.20:8080");
    assert_eq!(config.request_timeout(), Duration::from_secs(30));

    let policy = config.poll_policy();
    assert_eq!(policy.interval, Duration::from_secs(1));
    assert_eq!(policy.timeout, None, "0 should disable the deadline");
}

#[test]
fn test_invalid_toml_handling() {
    let temp_file = NamedTempFile::new().unwrap();
    std::fs::write(temp_file.path(), "host_url = [unterminated").unwrap();

    let result = StationConfig::from_toml_file(temp_file.path());
    assert!(result.is_err(), "Should fail to parse invalid TOML");
}

#[test]
fn test_wrong_field_type_rejected() {
    let result: Result<StationConfig, _> = toml::from_str("request_timeout_secs = \"ten\"");
    assert!(result.is_err());
}

#[test]
fn test_missing_file_is_error() {
    assert!(StationConfig::from_toml_file("/nonexistent/cstation.toml").is_err());
}

#[test]
fn test_overrides_leave_unset_values_alone() {
    let config = StationConfig::default().with_overrides(ConfigOverrides::default());
    assert_eq!(config, StationConfig::default());
}
