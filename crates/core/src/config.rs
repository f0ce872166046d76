//! 설정 관리: logwarden.toml 파싱 및 런타임 설정
//!
//! [`LogwardenConfig`]는 모든 크레이트의 설정을 담는 최상위 구조체입니다.
//! 행동 정의 자체는 별도의 파일(`[behaviors] config_path`)에 있으며
//! 로그 파이프라인의 설정 저장소가 읽습니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`LOGWARDEN_COLLECTOR_TOOLS_DIR=./tools` 형식)
//! 3. 설정 파일 (`logwarden.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), logwarden_core::error::LogwardenError> {
//! use logwarden_core::config::LogwardenConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = LogwardenConfig::load("logwarden.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = LogwardenConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, LogwardenError};

/// logwarden 통합 설정
///
/// `logwarden.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogwardenConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 소스 프로세스 및 스트림 재조립 설정
    #[serde(default)]
    pub collector: CollectorConfig,
    /// 행동 정의 파일 설정
    #[serde(default)]
    pub behaviors: BehaviorsConfig,
}

impl LogwardenConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LogwardenError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, LogwardenError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LogwardenError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                LogwardenError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, LogwardenError> {
        toml::from_str(toml_str).map_err(|e| {
            LogwardenError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `LOGWARDEN_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "LOGWARDEN_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "LOGWARDEN_GENERAL_LOG_FORMAT");

        // Collector
        override_string(
            &mut self.collector.tools_dir,
            "LOGWARDEN_COLLECTOR_TOOLS_DIR",
        );
        override_u64(
            &mut self.collector.idle_flush_ms,
            "LOGWARDEN_COLLECTOR_IDLE_FLUSH_MS",
        );
        override_u64(
            &mut self.collector.read_poll_ms,
            "LOGWARDEN_COLLECTOR_READ_POLL_MS",
        );
        override_u64(
            &mut self.collector.stop_timeout_secs,
            "LOGWARDEN_COLLECTOR_STOP_TIMEOUT_SECS",
        );
        override_u64(
            &mut self.collector.drain_timeout_ms,
            "LOGWARDEN_COLLECTOR_DRAIN_TIMEOUT_MS",
        );
        override_u64(
            &mut self.collector.probe_timeout_secs,
            "LOGWARDEN_COLLECTOR_PROBE_TIMEOUT_SECS",
        );
        override_string(
            &mut self.collector.tag_filter_command,
            "LOGWARDEN_COLLECTOR_TAG_FILTER_COMMAND",
        );
        override_usize(
            &mut self.collector.max_entry_bytes,
            "LOGWARDEN_COLLECTOR_MAX_ENTRY_BYTES",
        );

        // Behaviors
        override_string(
            &mut self.behaviors.config_path,
            "LOGWARDEN_BEHAVIORS_CONFIG_PATH",
        );
        override_bool(
            &mut self.behaviors.case_insensitive,
            "LOGWARDEN_BEHAVIORS_CASE_INSENSITIVE",
        );
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogwardenError> {
        // log_level 검증
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        // log_format 검증
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        self.collector.validate()?;

        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// 소스 프로세스 및 스트림 재조립 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// 번들 도구 디렉토리 (시스템 PATH보다 먼저 검색)
    pub tools_dir: String,
    /// 열린 버퍼가 이 시간(밀리초) 이상 유휴 상태면 플러시
    pub idle_flush_ms: u64,
    /// 스트림 읽기 폴링 타임아웃 (밀리초)
    pub read_poll_ms: u64,
    /// graceful 종료 대기 시간 (초), 이후 강제 종료
    pub stop_timeout_secs: u64,
    /// stop 시 리더 워커 드레인 대기 시간 (밀리초)
    pub drain_timeout_ms: u64,
    /// 도구 존재 확인(probe) 타임아웃 (초)
    pub probe_timeout_secs: u64,
    /// 태그 필터 단계로 사용할 명령
    pub tag_filter_command: String,
    /// 단일 논리 엔트리 최대 크기 (바이트)
    pub max_entry_bytes: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            tools_dir: "tools".to_owned(),
            idle_flush_ms: 500,
            read_poll_ms: 100,
            stop_timeout_secs: 5,
            drain_timeout_ms: 2_000,
            probe_timeout_secs: 5,
            tag_filter_command: "grep".to_owned(),
            max_entry_bytes: 1024 * 1024, // 1MB
        }
    }
}

impl CollectorConfig {
    /// 수집기 설정값을 검증합니다.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("collector.idle_flush_ms", self.idle_flush_ms),
            ("collector.read_poll_ms", self.read_poll_ms),
            ("collector.stop_timeout_secs", self.stop_timeout_secs),
            ("collector.drain_timeout_ms", self.drain_timeout_ms),
            ("collector.probe_timeout_secs", self.probe_timeout_secs),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_owned(),
                    reason: "must be greater than 0".to_owned(),
                });
            }
        }

        // 폴링 주기가 유휴 타임아웃보다 길면 유휴 플러시 지연 상한이 무의미해짐
        if self.read_poll_ms > self.idle_flush_ms {
            return Err(ConfigError::InvalidValue {
                field: "collector.read_poll_ms".to_owned(),
                reason: format!(
                    "must not exceed collector.idle_flush_ms ({})",
                    self.idle_flush_ms
                ),
            });
        }

        if self.tag_filter_command.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "collector.tag_filter_command".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        if self.max_entry_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                field: "collector.max_entry_bytes".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        Ok(())
    }
}

/// 행동 정의 파일 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorsConfig {
    /// 행동 정의 파일 경로 (.yml/.yaml/.json)
    pub config_path: String,
    /// 행동/추출기 정규식을 대소문자 무시로 컴파일할지 여부
    pub case_insensitive: bool,
}

impl Default for BehaviorsConfig {
    fn default() -> Self {
        Self {
            config_path: "config.json".to_owned(),
            case_insensitive: true,
        }
    }
}

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}
