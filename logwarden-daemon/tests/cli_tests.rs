//! CLI parsing and configuration resolution tests.
//!
//! Covers flag parsing, missing-file fallback, and the
//! CLI > environment > file > default precedence.

use std::env;
use std::path::PathBuf;

use clap::Parser;
use serial_test::serial;

use logwarden_core::LogwardenConfig;
use logwarden_daemon::cli::DaemonCli;

fn parse(args: &[&str]) -> DaemonCli {
    let mut argv = vec!["logwarden-daemon"];
    argv.extend_from_slice(args);
    DaemonCli::try_parse_from(argv).expect("arguments should parse")
}

fn write_config(dir: &tempfile::TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("logwarden.toml");
    std::fs::write(&path, content).expect("write config");
    path
}

#[test]
fn test_parse_platform_and_tag() {
    // Given/When: platform and tag flags
    let cli = parse(&["--platform", "android", "--tag", "MyApp"]);

    // Then: defaults apply to everything else
    assert_eq!(cli.platform.as_deref(), Some("android"));
    assert_eq!(cli.tag.as_deref(), Some("MyApp"));
    assert_eq!(cli.config, PathBuf::from("logwarden.toml"));
    assert!(cli.log_level.is_none());
    assert!(!cli.validate);
}

#[test]
fn test_platform_required_unless_validating() {
    let missing = DaemonCli::try_parse_from(["logwarden-daemon"]);
    assert!(missing.is_err(), "--platform must be required for a run");

    let cli = parse(&["--validate", "-c", "/tmp/x.toml"]);
    assert!(cli.validate);
    assert!(cli.platform.is_none());
}

#[tokio::test]
#[serial]
async fn test_missing_config_file_falls_back_to_defaults() {
    // Given: a path that does not exist
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    let cli = parse(&["--platform", "ios", "-c", path.to_str().unwrap()]);

    // When
    let config = cli.resolve_config().await.expect("defaults should be used");

    // Then
    let defaults = LogwardenConfig::default();
    assert_eq!(config.general.log_level, defaults.general.log_level);
    assert_eq!(config.collector.idle_flush_ms, 500);
    assert_eq!(config.behaviors.config_path, "config.json");
}

#[tokio::test]
#[serial]
async fn test_file_values_are_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        r#"
[general]
log_level = "debug"
log_format = "pretty"

[collector]
idle_flush_ms = 250
tag_filter_command = "ggrep"

[behaviors]
config_path = "behaviors.yml"
case_insensitive = false
"#,
    );
    let cli = parse(&["--platform", "android", "-c", path.to_str().unwrap()]);

    let config = cli.resolve_config().await.unwrap();

    assert_eq!(config.general.log_level, "debug");
    assert_eq!(config.general.log_format, "pretty");
    assert_eq!(config.collector.idle_flush_ms, 250);
    assert_eq!(config.collector.tag_filter_command, "ggrep");
    assert_eq!(config.behaviors.config_path, "behaviors.yml");
    assert!(!config.behaviors.case_insensitive);
}

#[tokio::test]
#[serial]
async fn test_cli_flags_override_env_and_file() {
    // Given: file says info, env says debug, CLI says warn
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "[general]\nlog_level = \"info\"\n");
    // SAFETY: serialized test, cleaned up below
    unsafe {
        env::set_var("LOGWARDEN_GENERAL_LOG_LEVEL", "debug");
    }
    let cli = parse(&[
        "--platform",
        "android",
        "-c",
        path.to_str().unwrap(),
        "--log-level",
        "warn",
        "--behaviors",
        "rules.json",
    ]);

    // When
    let result = cli.resolve_config().await;

    // SAFETY: Test cleanup
    unsafe {
        env::remove_var("LOGWARDEN_GENERAL_LOG_LEVEL");
    }

    // Then: CLI wins
    let config = result.unwrap();
    assert_eq!(config.general.log_level, "warn");
    assert_eq!(config.behaviors.config_path, "rules.json");
}

#[tokio::test]
#[serial]
async fn test_env_overrides_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "[collector]\nstop_timeout_secs = 9\n");
    // SAFETY: serialized test, cleaned up below
    unsafe {
        env::set_var("LOGWARDEN_COLLECTOR_STOP_TIMEOUT_SECS", "3");
    }
    let cli = parse(&["--platform", "android", "-c", path.to_str().unwrap()]);

    let result = cli.resolve_config().await;

    // SAFETY: Test cleanup
    unsafe {
        env::remove_var("LOGWARDEN_COLLECTOR_STOP_TIMEOUT_SECS");
    }

    assert_eq!(result.unwrap().collector.stop_timeout_secs, 3);
}

#[tokio::test]
#[serial]
async fn test_invalid_override_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    let cli = parse(&[
        "--platform",
        "android",
        "-c",
        path.to_str().unwrap(),
        "--log-format",
        "xml",
    ]);

    let err = cli.resolve_config().await.unwrap_err();
    assert!(err.to_string().contains("invalid configuration"), "{err}");
}

#[tokio::test]
#[serial]
async fn test_malformed_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "[general\nlog_level = ");
    let cli = parse(&["--validate", "-c", path.to_str().unwrap()]);

    let err = cli.resolve_config().await.unwrap_err();
    assert!(err.to_string().contains("failed to load config"), "{err}");
}

#[test]
fn test_round_trip_default_config_through_toml() {
    // Default config serialized with `toml` must parse back.
    let rendered = toml::to_string(&LogwardenConfig::default()).expect("serialize");
    let parsed = LogwardenConfig::parse(&rendered).expect("parse");
    assert_eq!(parsed.collector.max_entry_bytes, 1024 * 1024);
}
