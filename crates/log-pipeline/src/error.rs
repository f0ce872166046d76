//! 로그 파이프라인 에러 타입
//!
//! [`LogPipelineError`]는 로그 파이프라인 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<LogPipelineError> for LogwardenError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.
//!
//! 엔트리 단위로 발생하는 오류(정규식 컴파일, 타입 변환, 제약 위반)는
//! 여기로 올라오지 않습니다. 해당 규칙만 격리되어 진단 알림으로 보고됩니다.

use logwarden_core::error::{ConfigError, LogwardenError, PipelineError};

/// 로그 파이프라인 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum LogPipelineError {
    /// 행동 정의 파일 로딩 실패
    #[error("behavior config load error: {path}: {reason}")]
    BehaviorLoad {
        /// 파일 경로 (문자열 입력이면 출처 이름)
        path: String,
        /// 로딩 실패 사유
        reason: String,
    },

    /// 행동 정의 유효성 검증 실패
    #[error("behavior validation error: '{behavior}': {reason}")]
    BehaviorValidation {
        /// 문제가 된 행동 이름
        behavior: String,
        /// 검증 실패 사유
        reason: String,
    },

    /// 정규식 컴파일 실패
    #[error("invalid regex pattern in {owner}: {pattern} - {reason}")]
    PatternCompile {
        /// 패턴 소유자 (`behavior "x"` 또는 `extractor "x.y"`)
        owner: String,
        /// 원본 패턴
        pattern: String,
        /// 컴파일 에러 내용
        reason: String,
    },

    /// JSON Schema 컴파일 실패
    #[error("invalid json schema in {owner}: {reason}")]
    SchemaCompile {
        /// 스키마 소유자
        owner: String,
        /// 컴파일 에러 내용
        reason: String,
    },

    /// 외부 프로세스 실행 실패
    #[error("process error: {command}: {reason}")]
    Process {
        /// 실행하려던 명령
        command: String,
        /// 에러 사유
        reason: String,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 세션 제어 에러 (AlreadyRunning, ToolUnavailable 등)
    #[error(transparent)]
    Session(#[from] PipelineError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LogPipelineError> for LogwardenError {
    fn from(err: LogPipelineError) -> Self {
        match err {
            LogPipelineError::Session(e) => LogwardenError::Pipeline(e),
            LogPipelineError::Io(e) => LogwardenError::Io(e),
            LogPipelineError::BehaviorValidation { behavior, reason } => {
                LogwardenError::Config(ConfigError::InvalidValue {
                    field: format!("behaviors[{behavior}]"),
                    reason,
                })
            }
            LogPipelineError::BehaviorLoad { path, reason } => {
                LogwardenError::Config(ConfigError::InvalidValue {
                    field: "behaviors".to_owned(),
                    reason: format!("{path}: {reason}"),
                })
            }
            LogPipelineError::Config { field, reason } => {
                LogwardenError::Config(ConfigError::InvalidValue { field, reason })
            }
            other => LogwardenError::Pipeline(PipelineError::InitFailed(other.to_string())),
        }
    }
}
