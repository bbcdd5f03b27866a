//! Configuration loading tests

use sori::config::Config;
use std::io::Write;

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_load_full_toml_file() {
    let default = Config::default();
    let toml = toml::to_string(&default).unwrap();
    let file = write_config(&toml);

    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.llm.model, default.llm.model);
    assert_eq!(config.storage.bucket, "sori-audio");
    assert_eq!(config.dispatch.poll_interval_secs, 60);
    assert!(config.notify.url.is_none());
    config.validate().unwrap();
}

#[test]
fn test_file_values_override_defaults() {
    let mut config = Config::default();
    config.llm.model = String::from("llama3.1:8b");
    config.database.sqlite_path = "/tmp/sori-test.db".into();
    config.notify.url = Some(String::from("https://hooks.test/run"));

    let file = write_config(&toml::to_string(&config).unwrap());
    let loaded = Config::from_file(file.path()).unwrap();

    assert_eq!(loaded.llm.model, "llama3.1:8b");
    assert_eq!(
        loaded.database.sqlite_path,
        std::path::PathBuf::from("/tmp/sori-test.db")
    );
    assert_eq!(loaded.notify.url.as_deref(), Some("https://hooks.test/run"));
}

#[test]
fn test_missing_file_is_error() {
    let err = Config::from_file(std::path::Path::new("/nonexistent/sori.toml")).unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}

#[test]
fn test_malformed_toml_is_error() {
    let file = write_config("llm = \"not a table\"");
    let err = Config::from_file(file.path()).unwrap_err();
    assert!(err.to_string().contains("Failed to parse TOML"));
}

#[test]
fn test_validate_rejects_bad_values() {
    let mut config = Config::default();
    config.llm.temperature = 2.0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.storage.bucket = String::new();
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.notify.url = Some(String::from("ftp://wrong"));
    assert!(config.validate().is_err());
}
