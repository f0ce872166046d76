//! logwarden.toml 통합 설정 테스트
//!
//! - logwarden.toml.example 파싱 테스트
//! - 부분 설정 (일부 섹션만) 로딩 테스트
//! - 환경변수 우선순위 테스트
//! - 잘못된 형식 에러 테스트

use logwarden_core::config::LogwardenConfig;
use logwarden_core::error::{ConfigError, LogwardenError};
use serial_test::serial;

// =============================================================================
// logwarden.toml.example 파싱 테스트
// =============================================================================

#[test]
fn example_config_parses_successfully() {
    let content = include_str!("../../../logwarden.toml.example");
    let config = LogwardenConfig::parse(content).expect("example config should parse");

    assert_eq!(config.general.log_level, "info");
    assert_eq!(config.general.log_format, "json");
    assert_eq!(config.behaviors.config_path, "config.json");
}

#[test]
fn example_config_passes_validation() {
    let content = include_str!("../../../logwarden.toml.example");
    let config = LogwardenConfig::parse(content).expect("should parse");
    config
        .validate()
        .expect("example config should pass validation");
}

#[test]
fn example_config_matches_defaults() {
    let content = include_str!("../../../logwarden.toml.example");
    let config = LogwardenConfig::parse(content).expect("should parse");
    let defaults = LogwardenConfig::default();

    assert_eq!(config.collector.tools_dir, defaults.collector.tools_dir);
    assert_eq!(config.collector.idle_flush_ms, defaults.collector.idle_flush_ms);
    assert_eq!(config.collector.read_poll_ms, defaults.collector.read_poll_ms);
    assert_eq!(
        config.collector.stop_timeout_secs,
        defaults.collector.stop_timeout_secs
    );
    assert_eq!(
        config.collector.max_entry_bytes,
        defaults.collector.max_entry_bytes
    );
    assert_eq!(
        config.behaviors.case_insensitive,
        defaults.behaviors.case_insensitive
    );
}

// =============================================================================
// 부분 설정 테스트
// =============================================================================

#[test]
fn collector_only_section_keeps_other_defaults() {
    let config = LogwardenConfig::parse("[collector]\ntools_dir = \"/opt/sdk\"\n").unwrap();
    assert_eq!(config.collector.tools_dir, "/opt/sdk");
    assert_eq!(config.general.log_level, "info");
    assert!(config.behaviors.case_insensitive);
}

#[test]
fn unknown_field_type_is_parse_error() {
    let result = LogwardenConfig::parse("[collector]\nidle_flush_ms = \"fast\"\n");
    assert!(matches!(
        result,
        Err(LogwardenError::Config(ConfigError::ParseFailed { .. }))
    ));
}

// =============================================================================
// load(): 파일 + 환경변수 + 검증
// =============================================================================

#[tokio::test]
#[serial]
async fn load_applies_env_over_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("logwarden.toml");
    std::fs::write(&path, "[general]\nlog_level = \"debug\"\n").unwrap();

    // SAFETY: serial 테스트로 실행되므로 환경변수 조작이 안전합니다.
    unsafe { std::env::set_var("LOGWARDEN_GENERAL_LOG_LEVEL", "warn") };
    let config = LogwardenConfig::load(&path).await;
    unsafe { std::env::remove_var("LOGWARDEN_GENERAL_LOG_LEVEL") };

    assert_eq!(config.unwrap().general.log_level, "warn");
}

#[tokio::test]
#[serial]
async fn load_rejects_invalid_env_value() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("logwarden.toml");
    std::fs::write(&path, "").unwrap();

    // SAFETY: serial 테스트로 실행되므로 환경변수 조작이 안전합니다.
    unsafe { std::env::set_var("LOGWARDEN_GENERAL_LOG_FORMAT", "xml") };
    let result = LogwardenConfig::load(&path).await;
    unsafe { std::env::remove_var("LOGWARDEN_GENERAL_LOG_FORMAT") };

    let err = result.unwrap_err();
    assert!(err.to_string().contains("log_format"));
}

#[tokio::test]
async fn load_missing_file_is_file_not_found() {
    let result = LogwardenConfig::load("/definitely/not/here/logwarden.toml").await;
    assert!(matches!(
        result,
        Err(LogwardenError::Config(ConfigError::FileNotFound { .. }))
    ));
}
