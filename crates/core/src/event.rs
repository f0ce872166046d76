//! 알림 모델: 이벤트 싱크로 전달되는 개별 통지
//!
//! 엔진은 관찰자에게 직접 의존하지 않습니다. 모든 결과는 [`Notification`]으로
//! 표현되어 [`EventSink`](crate::pipeline::EventSink)로 전달되고,
//! 전송 방식(웹소켓, 표준출력 등)은 싱크 구현이 결정합니다.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{BehaviorDefinition, ExtractionResult};

/// 진단 메시지에 사용하는 플랫폼 태그
pub const SYSTEM_PLATFORM: &str = "system";

/// 이벤트 싱크로 전달되는 통지
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// 재조립된 원본 엔트리
    Log {
        /// 소스 플랫폼
        platform: String,
        /// 엔트리 원문
        message: String,
    },

    /// 시스템 진단 (상태 변화, 격리된 오류 등)
    Diagnostic {
        /// 항상 [`SYSTEM_PLATFORM`]
        platform: String,
        /// 진단 내용
        message: String,
    },

    /// 행동 매칭
    BehaviorTriggered {
        /// 매칭된 행동 정의
        behavior: BehaviorDefinition,
        /// 매칭된 엔트리 원문
        entry_text: String,
        /// 추출기 이름별 추출 결과
        extractions: BTreeMap<String, ExtractionResult>,
        /// 소스 플랫폼
        platform: String,
    },

    /// 순서 그룹 위반
    OrderViolation {
        /// 방금 발생한 행동
        firing_behavior: String,
        /// 아직 발생하지 않은 선행 행동 (그룹 순서상 첫 번째)
        missing_predecessor: String,
        /// 위반된 순서 그룹 (기대 순서)
        group: Vec<String>,
        /// 리셋 이후 누적된 발생 이력
        current_order: Vec<String>,
    },

    /// 완료 그룹 충족
    GroupCompleted {
        /// 그룹 식별자
        group_id: String,
        /// 그룹 표시 이름
        group_name: String,
        /// 그룹 구성원
        members: Vec<String>,
    },

    /// 실행 종료 시 미완료 그룹
    GroupIncomplete {
        /// 그룹 식별자
        group_id: String,
        /// 그룹 표시 이름
        group_name: String,
        /// 아직 발생하지 않은 구성원
        missing_members: Vec<String>,
        /// 이미 발생한 구성원
        triggered_members: Vec<String>,
    },

    /// 수집 실행 상태 변화
    RunStatus {
        /// 실행 중 여부
        active: bool,
    },
}

impl Notification {
    /// 원본 엔트리 통지를 생성합니다.
    pub fn log(platform: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Log {
            platform: platform.into(),
            message: message.into(),
        }
    }

    /// 시스템 진단 통지를 생성합니다.
    pub fn diagnostic(message: impl Into<String>) -> Self {
        Self::Diagnostic {
            platform: SYSTEM_PLATFORM.to_owned(),
            message: message.into(),
        }
    }

    /// 실행 상태 통지를 생성합니다.
    pub fn run_status(active: bool) -> Self {
        Self::RunStatus { active }
    }

    /// 통지 종류 이름 (로깅 및 라우팅에 사용)
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Log { .. } => "log",
            Self::Diagnostic { .. } => "diagnostic",
            Self::BehaviorTriggered { .. } => "behavior_triggered",
            Self::OrderViolation { .. } => "order_violation",
            Self::GroupCompleted { .. } => "group_completed",
            Self::GroupIncomplete { .. } => "group_incomplete",
            Self::RunStatus { .. } => "run_status",
        }
    }

    /// 진단 통지인 경우 메시지를 반환합니다.
    pub fn diagnostic_message(&self) -> Option<&str> {
        match self {
            Self::Diagnostic { message, .. } => Some(message),
            _ => None,
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Log { platform, message } | Self::Diagnostic { platform, message } => {
                write!(f, "[{platform}] {message}")
            }
            Self::BehaviorTriggered {
                behavior, platform, ..
            } => write!(f, "[{platform}] behavior triggered: {}", behavior.name),
            Self::OrderViolation {
                firing_behavior,
                missing_predecessor,
                ..
            } => write!(
                f,
                "order violation: '{firing_behavior}' fired before '{missing_predecessor}'"
            ),
            Self::GroupCompleted { group_name, .. } => {
                write!(f, "event group completed: {group_name}")
            }
            Self::GroupIncomplete {
                group_name,
                missing_members,
                ..
            } => write!(
                f,
                "event group incomplete: {group_name} (missing: {})",
                missing_members.join(", ")
            ),
            Self::RunStatus { active } => write!(f, "run active={active}"),
        }
    }
}

/// 타임스탬프가 붙은 통지: 외부 전송용 직렬화 형식
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEnvelope {
    /// 통지 생성 시각
    pub timestamp: DateTime<Utc>,
    /// 통지 본문
    #[serde(flatten)]
    pub notification: Notification,
}

impl NotificationEnvelope {
    /// 현재 시각으로 봉투를 만듭니다.
    pub fn now(notification: Notification) -> Self {
        Self {
            timestamp: Utc::now(),
            notification,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_uses_system_platform() {
        let n = Notification::diagnostic("hello");
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["type"], "diagnostic");
        assert_eq!(json["platform"], SYSTEM_PLATFORM);
        assert_eq!(n.diagnostic_message(), Some("hello"));
    }

    #[test]
    fn run_status_serializes_with_tag() {
        let json = serde_json::to_string(&Notification::run_status(false)).unwrap();
        assert_eq!(json, r#"{"type":"run_status","active":false}"#);
    }

    #[test]
    fn envelope_flattens_notification() {
        let env = NotificationEnvelope::now(Notification::log("android", "line"));
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["type"], "log");
        assert_eq!(json["message"], "line");
        assert!(json.get("timestamp").is_some());
    }

    #[test]
    fn display_order_violation() {
        let n = Notification::OrderViolation {
            firing_behavior: "B".to_owned(),
            missing_predecessor: "A".to_owned(),
            group: vec!["A".to_owned(), "B".to_owned()],
            current_order: vec!["B".to_owned()],
        };
        assert_eq!(n.to_string(), "order violation: 'B' fired before 'A'");
        assert_eq!(n.kind(), "order_violation");
    }
}
