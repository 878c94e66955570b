//! Tests for bootstrap config resolution and graceful degradation
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate VERDICT_CONFIG are marked with #[serial].

use serde::Deserialize;
use serial_test::serial;
use std::env;
use std::fs;
use verdict_common::config::{load_toml_file, ConfigResolver, ConfigSource, LoggingConfig};
use verdict_common::Error;

#[derive(Debug, Default, Deserialize, PartialEq)]
struct SampleConfig {
    base_url: Option<String>,
    refresh_secs: Option<u64>,
    #[serde(default)]
    logging: LoggingConfig,
}

#[test]
#[serial]
fn test_cli_path_takes_precedence_over_env() {
    let dir = tempfile::tempdir().unwrap();
    let cli_path = dir.path().join("cli.toml");
    env::set_var("VERDICT_CONFIG", dir.path().join("env.toml"));

    let resolver = ConfigResolver::new("verdict-feed");
    let (path, source) = resolver.resolve(Some(&cli_path)).unwrap();

    assert_eq!(path, cli_path);
    assert_eq!(source, ConfigSource::CommandLine);

    env::remove_var("VERDICT_CONFIG");
}

#[test]
#[serial]
fn test_env_var_path_used_without_cli() {
    let dir = tempfile::tempdir().unwrap();
    let env_path = dir.path().join("env.toml");
    env::set_var("VERDICT_CONFIG", &env_path);

    let resolver = ConfigResolver::new("verdict-feed");
    let (path, source) = resolver.resolve(None).unwrap();

    assert_eq!(path, env_path);
    assert_eq!(source, ConfigSource::Environment);

    env::remove_var("VERDICT_CONFIG");
}

#[test]
#[serial]
fn test_load_parses_file_from_env() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        "base_url = \"http://localhost/output\"\nrefresh_secs = 42\n\n[logging]\nlevel = \"debug\"\n",
    )
    .unwrap();
    env::set_var("VERDICT_CONFIG", &path);

    let resolver = ConfigResolver::new("verdict-feed");
    let (config, loaded_from): (SampleConfig, _) = resolver.load(None).unwrap();

    assert_eq!(loaded_from, Some(path));
    assert_eq!(config.base_url.as_deref(), Some("http://localhost/output"));
    assert_eq!(config.refresh_secs, Some(42));
    assert_eq!(config.logging.level, "debug");
    assert!(config.logging.file.is_none());

    env::remove_var("VERDICT_CONFIG");
}

#[test]
#[serial]
fn test_missing_explicit_file_is_an_error() {
    env::remove_var("VERDICT_CONFIG");
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");

    let resolver = ConfigResolver::new("verdict-feed");
    let result: verdict_common::Result<(SampleConfig, _)> = resolver.load(Some(&missing));

    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_invalid_toml_reports_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    fs::write(&path, "refresh_secs = \"not a number\"\n").unwrap();

    let result: verdict_common::Result<SampleConfig> = load_toml_file(&path);
    match result {
        Err(Error::Config(msg)) => assert!(msg.contains("broken.toml")),
        other => panic!("expected config error, got {:?}", other),
    }
}

#[test]
fn test_logging_section_defaults_when_absent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("minimal.toml");
    fs::write(&path, "refresh_secs = 5\n").unwrap();

    let config: SampleConfig = load_toml_file(&path).unwrap();
    assert_eq!(config.logging, LoggingConfig::default());
}
