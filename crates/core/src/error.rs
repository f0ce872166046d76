//! 에러 타입: 도메인별 에러 정의

/// logwarden 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum LogwardenError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 파이프라인 처리 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 파이프라인 처리 에러
///
/// `start()` 호출을 거부하는 자원 획득 실패는 모두 여기에 속합니다.
/// 이 에러들이 반환될 때 부분적으로 생성된 상태는 남지 않습니다.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 이미 수집 세션이 실행 중
    #[error("a logging process is already running")]
    AlreadyRunning,

    /// 알 수 없는 플랫폼 식별자
    #[error("unsupported platform: '{0}'")]
    UnsupportedPlatform(String),

    /// 플랫폼 도구를 찾을 수 없거나 존재 확인에 실패
    #[error("command \"{command}\" not found. {guidance}")]
    ToolUnavailable { command: String, guidance: String },

    /// 파이프라인 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),
}
