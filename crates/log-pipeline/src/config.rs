//! 로그 파이프라인 설정
//!
//! [`PipelineConfig`]는 core의 [`CollectorConfig`](logwarden_core::config::CollectorConfig)와
//! [`BehaviorsConfig`](logwarden_core::config::BehaviorsConfig)를 합쳐
//! 파이프라인이 실제로 사용하는 형태(`Duration`, `PathBuf`)로 제공합니다.
//!
//! # 사용 예시
//! ```ignore
//! use logwarden_core::config::LogwardenConfig;
//! use logwarden_log_pipeline::config::PipelineConfig;
//!
//! let core_config = LogwardenConfig::default();
//! let config = PipelineConfig::from_core(&core_config);
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use logwarden_core::config::LogwardenConfig;

use crate::error::LogPipelineError;

/// 로그 파이프라인 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// 번들 도구 디렉토리
    pub tools_dir: PathBuf,
    /// 유휴 버퍼 플러시 임계값 (밀리초)
    pub idle_flush_ms: u64,
    /// 스트림 읽기 폴링 주기 (밀리초)
    pub read_poll_ms: u64,
    /// graceful 종료 대기 (초)
    pub stop_timeout_secs: u64,
    /// 리더 워커 드레인 대기 (밀리초)
    pub drain_timeout_ms: u64,
    /// 도구 존재 확인 타임아웃 (초)
    pub probe_timeout_secs: u64,
    /// 태그 필터 명령
    pub tag_filter_command: String,
    /// 단일 논리 엔트리 최대 크기 (바이트)
    pub max_entry_bytes: usize,

    // --- 행동 정의 ---
    /// 행동 정의 파일 경로
    pub behaviors_path: PathBuf,
    /// 패턴 대소문자 무시 여부
    pub case_insensitive: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_core(&LogwardenConfig::default())
    }
}

impl PipelineConfig {
    /// core 설정에서 파이프라인 설정을 생성합니다.
    pub fn from_core(core: &LogwardenConfig) -> Self {
        let collector = &core.collector;
        Self {
            tools_dir: PathBuf::from(&collector.tools_dir),
            idle_flush_ms: collector.idle_flush_ms,
            read_poll_ms: collector.read_poll_ms,
            stop_timeout_secs: collector.stop_timeout_secs,
            drain_timeout_ms: collector.drain_timeout_ms,
            probe_timeout_secs: collector.probe_timeout_secs,
            tag_filter_command: collector.tag_filter_command.clone(),
            max_entry_bytes: collector.max_entry_bytes,
            behaviors_path: PathBuf::from(&core.behaviors.config_path),
            case_insensitive: core.behaviors.case_insensitive,
        }
    }

    /// 유휴 플러시 임계값
    pub fn idle_flush(&self) -> Duration {
        Duration::from_millis(self.idle_flush_ms)
    }

    /// 읽기 폴링 주기
    pub fn read_poll(&self) -> Duration {
        Duration::from_millis(self.read_poll_ms)
    }

    /// 프로세스 종료 대기 시간
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }

    /// 워커 드레인 대기 시간
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }

    /// 도구 존재 확인 타임아웃
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogPipelineError> {
        const MAX_IDLE_FLUSH_MS: u64 = 60_000;
        const MAX_STOP_TIMEOUT_SECS: u64 = 300;

        if self.idle_flush_ms == 0 || self.idle_flush_ms > MAX_IDLE_FLUSH_MS {
            return Err(LogPipelineError::Config {
                field: "idle_flush_ms".to_owned(),
                reason: format!("must be 1-{MAX_IDLE_FLUSH_MS}"),
            });
        }

        if self.read_poll_ms == 0 || self.read_poll_ms > self.idle_flush_ms {
            return Err(LogPipelineError::Config {
                field: "read_poll_ms".to_owned(),
                reason: format!("must be 1-{} (idle_flush_ms)", self.idle_flush_ms),
            });
        }

        if self.stop_timeout_secs == 0 || self.stop_timeout_secs > MAX_STOP_TIMEOUT_SECS {
            return Err(LogPipelineError::Config {
                field: "stop_timeout_secs".to_owned(),
                reason: format!("must be 1-{MAX_STOP_TIMEOUT_SECS}"),
            });
        }

        if self.drain_timeout_ms == 0 {
            return Err(LogPipelineError::Config {
                field: "drain_timeout_ms".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.probe_timeout_secs == 0 {
            return Err(LogPipelineError::Config {
                field: "probe_timeout_secs".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.tag_filter_command.trim().is_empty() {
            return Err(LogPipelineError::Config {
                field: "tag_filter_command".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        if self.max_entry_bytes == 0 {
            return Err(LogPipelineError::Config {
                field: "max_entry_bytes".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        Ok(())
    }
}

/// 파이프라인 설정 빌더
#[derive(Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 번들 도구 디렉토리를 설정합니다.
    pub fn tools_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.tools_dir = dir.into();
        self
    }

    /// 유휴 플러시 임계값(밀리초)을 설정합니다.
    pub fn idle_flush_ms(mut self, ms: u64) -> Self {
        self.config.idle_flush_ms = ms;
        self
    }

    /// 읽기 폴링 주기(밀리초)를 설정합니다.
    pub fn read_poll_ms(mut self, ms: u64) -> Self {
        self.config.read_poll_ms = ms;
        self
    }

    /// 프로세스 종료 대기(초)를 설정합니다.
    pub fn stop_timeout_secs(mut self, secs: u64) -> Self {
        self.config.stop_timeout_secs = secs;
        self
    }

    /// 워커 드레인 대기(밀리초)를 설정합니다.
    pub fn drain_timeout_ms(mut self, ms: u64) -> Self {
        self.config.drain_timeout_ms = ms;
        self
    }

    /// 태그 필터 명령을 설정합니다.
    pub fn tag_filter_command(mut self, command: impl Into<String>) -> Self {
        self.config.tag_filter_command = command.into();
        self
    }

    /// 단일 엔트리 최대 크기를 설정합니다.
    pub fn max_entry_bytes(mut self, bytes: usize) -> Self {
        self.config.max_entry_bytes = bytes;
        self
    }

    /// 행동 정의 파일 경로를 설정합니다.
    pub fn behaviors_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.behaviors_path = path.into();
        self
    }

    /// 패턴 대소문자 무시 여부를 설정합니다.
    pub fn case_insensitive(mut self, enabled: bool) -> Self {
        self.config.case_insensitive = enabled;
        self
    }

    /// 설정을 검증하고 `PipelineConfig`를 생성합니다.
    pub fn build(self) -> Result<PipelineConfig, LogPipelineError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        PipelineConfig::default().validate().unwrap();
    }

    #[test]
    fn from_core_preserves_values() {
        let mut core = LogwardenConfig::default();
        core.collector.tools_dir = "/opt/sdk/tools".to_owned();
        core.collector.idle_flush_ms = 750;
        core.behaviors.config_path = "behaviors.yml".to_owned();
        core.behaviors.case_insensitive = false;

        let config = PipelineConfig::from_core(&core);
        assert_eq!(config.tools_dir, PathBuf::from("/opt/sdk/tools"));
        assert_eq!(config.idle_flush(), Duration::from_millis(750));
        assert_eq!(config.behaviors_path, PathBuf::from("behaviors.yml"));
        assert!(!config.case_insensitive);
    }

    #[test]
    fn duration_accessors() {
        let config = PipelineConfig::default();
        assert_eq!(config.read_poll(), Duration::from_millis(100));
        assert_eq!(config.stop_timeout(), Duration::from_secs(5));
        assert_eq!(config.drain_timeout(), Duration::from_millis(2_000));
        assert_eq!(config.probe_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn validate_rejects_zero_idle_flush() {
        let config = PipelineConfig {
            idle_flush_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_poll_longer_than_idle() {
        let result = PipelineConfigBuilder::new()
            .idle_flush_ms(100)
            .read_poll_ms(200)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn builder_creates_valid_config() {
        let config = PipelineConfigBuilder::new()
            .idle_flush_ms(200)
            .read_poll_ms(20)
            .tag_filter_command("/usr/bin/grep")
            .behaviors_path("/custom/behaviors.json")
            .build()
            .unwrap();
        assert_eq!(config.idle_flush_ms, 200);
        assert_eq!(config.tag_filter_command, "/usr/bin/grep");
        assert_eq!(config.behaviors_path, PathBuf::from("/custom/behaviors.json"));
    }

    #[test]
    fn builder_rejects_empty_filter_command() {
        let result = PipelineConfigBuilder::new().tag_filter_command("").build();
        assert!(result.is_err());
    }
}
