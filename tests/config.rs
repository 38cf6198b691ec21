use std::fs;
use std::time::Duration;

use assert_matches::assert_matches;

use nigeria_geodata::config::{
    Config, ConfigLoader, DEFAULT_BOUNDARY_NAME_FIELD, DEFAULT_CATALOG_URL, DEFAULT_TIMEOUT_SECS,
};
use nigeria_geodata::error::GeodataError;

#[test]
fn explicit_config_file_is_loaded() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("ngeo.json");
    fs::write(
        &path,
        r#"{"catalog_url": "http://localhost:9000/services", "timeout_secs": 15, "preview_dir": "/tmp/ngeo-previews"}"#,
    )
    .unwrap();

    let resolved = ConfigLoader::resolve(path.to_str()).unwrap();
    assert_eq!(resolved.catalog_url, "http://localhost:9000/services");
    assert_eq!(resolved.timeout, Duration::from_secs(15));
    assert_eq!(resolved.boundary_name_field, DEFAULT_BOUNDARY_NAME_FIELD);
    assert_eq!(resolved.preview_dir.as_str(), "/tmp/ngeo-previews");
}

#[test]
fn missing_explicit_config_is_read_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("absent.json");
    let err = ConfigLoader::resolve(path.to_str()).unwrap_err();
    assert_matches!(err, GeodataError::ConfigRead(_));
}

#[test]
fn malformed_config_is_parse_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("ngeo.json");
    fs::write(&path, "{ catalog_url: ").unwrap();
    let err = ConfigLoader::resolve(path.to_str()).unwrap_err();
    assert_matches!(err, GeodataError::ConfigParse(_));
}

#[test]
fn empty_config_uses_defaults() {
    let config = Config {
        preview_dir: Some("previews".to_string()),
        ..Config::default()
    };
    let resolved = ConfigLoader::resolve_config(config).unwrap();
    assert_eq!(resolved.catalog_url, DEFAULT_CATALOG_URL);
    assert_eq!(resolved.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    assert_eq!(resolved.boundary_name_field, "statename");
}
