//! 소스 프로세스 관리: 외부 로그 생산자와 필터 단계
//!
//! # 구성
//! - [`platform`]: 플랫폼별 명령, 도구 탐색, 엔트리 시작 패턴
//! - [`process`]: 프로세스 생성/종료와 세션 소유
//!
//! # 아키텍처
//! ```text
//! producer (adb/idevicesyslog/hdc) --stdout--> [grep --line-buffered -i -e tag] --stdout--> reassembler
//!        \--stderr--> "ERROR: ..."               \--stderr--> "Grep ERROR: ..."
//! ```
//! 각 바이트 스트림은 별도의 tokio 태스크가 읽습니다.

pub mod platform;
pub mod process;

pub use platform::{PlatformSpec, ResolvedTool, ToolOrigin, resolve_executable};
pub use process::{ProcessSession, SessionStreams, Termination, terminate};

use std::borrow::Cow;
use std::fmt;

use bytes::Bytes;
use tokio::time::Instant;

/// 스트림 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// 생산자 표준출력 (필터가 없을 때 본 스트림)
    ProducerStdout,
    /// 생산자 표준에러
    ProducerStderr,
    /// 필터 표준출력 (필터가 있을 때 본 스트림)
    FilterStdout,
    /// 필터 표준에러
    FilterStderr,
}

impl StreamKind {
    /// 진단 스트림인지 확인합니다.
    pub fn is_diagnostic(&self) -> bool {
        matches!(self, Self::ProducerStderr | Self::FilterStderr)
    }

    /// 진단 메시지 접두어
    pub fn diagnostic_prefix(&self) -> &'static str {
        match self {
            Self::FilterStderr => "Grep ERROR: ",
            _ => "ERROR: ",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ProducerStdout => "producer.stdout",
            Self::ProducerStderr => "producer.stderr",
            Self::FilterStdout => "filter.stdout",
            Self::FilterStderr => "filter.stderr",
        };
        f.write_str(name)
    }
}

/// 스트림에서 읽은 원시 줄
///
/// 워커가 생성하고 재조립기가 소비하는 중간 데이터 형식입니다.
#[derive(Debug, Clone)]
pub struct RawLine {
    /// 원시 바이트 (줄바꿈 포함 가능)
    pub data: Bytes,
    /// 읽어 온 스트림
    pub stream: StreamKind,
    /// 수신 시각
    pub received_at: Instant,
}

impl RawLine {
    /// 새 원시 줄을 생성합니다.
    pub fn new(data: impl Into<Bytes>, stream: StreamKind) -> Self {
        Self {
            data: data.into(),
            stream,
            received_at: Instant::now(),
        }
    }

    /// 손실 허용 UTF-8 디코딩 후 줄 끝(CR/LF)을 제거합니다.
    ///
    /// 잘못된 바이트는 U+FFFD로 대체됩니다.
    pub fn decode(&self) -> Cow<'_, str> {
        let mut end = self.data.len();
        while end > 0 && matches!(self.data[end - 1], b'\n' | b'\r') {
            end -= 1;
        }
        String::from_utf8_lossy(&self.data[..end])
    }
}
