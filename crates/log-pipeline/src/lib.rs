#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`source`]: 플랫폼 도구 탐색, 생산자/필터 프로세스 생성과 종료
//! - [`reassembler`]: 원시 줄을 논리 엔트리로 묶는 재조립기와 스트림 워커
//! - [`rule`]: 행동 정의 로딩, 매칭, 필드 추출과 검증, 설정 스냅샷 저장소
//! - [`temporal`]: 순서 그룹과 완료 그룹 추적
//! - [`pipeline`]: 제어 표면과 엔트리 전달 경로
//! - [`config`]: 파이프라인 설정 (core 설정 확장)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! ProcessSession -> StreamWorker/Reassembler -> BehaviorMatcher -> TemporalTracker
//!       |                    |                        |                  |
//!  adb/idevicesyslog    idle flush              regex + extract    order/completion
//!  hdc (+ grep)         final flush             coerce + validate   groups
//! ```

pub mod config;
pub mod error;
pub mod pipeline;
pub mod reassembler;
pub mod rule;
pub mod source;
pub mod temporal;

// --- 주요 타입 re-export ---

// 파이프라인
pub use pipeline::{LogPipeline, LogPipelineBuilder};

// 설정
pub use config::{PipelineConfig, PipelineConfigBuilder};

// 에러
pub use error::LogPipelineError;

// 재조립
pub use reassembler::{Reassembler, StreamEnd, StreamWorker, WorkerReport};

// 행동 규칙
pub use rule::{
    BehaviorConfig, BehaviorLoader, BehaviorMatch, BehaviorMatcher, ConfigSnapshot, ConfigStore,
    EventGroupConfig, OrderPolicy,
};

// 소스 프로세스
pub use source::{PlatformSpec, ProcessSession, RawLine, StreamKind};

// 시간 제약
pub use temporal::{GroupProgress, TemporalTracker};
