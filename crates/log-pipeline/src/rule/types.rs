//! 행동 설정 데이터 타입
//!
//! 행동 정의 파일(YAML 또는 JSON)에서 역직렬화되는 구조체들을 정의합니다.
//! 개별 행동/추출기 정의는 알림에 그대로 실려야 하므로 core에 있고,
//! 여기서는 파일 전체의 구조와 시간 정책 형식을 다룹니다.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

pub use logwarden_core::types::{BehaviorDefinition, ExtractorDefinition, ValidationRules};

use crate::error::LogPipelineError;

/// 행동 정의 파일 전체
///
/// # 스키마 (YAML)
/// ```yaml
/// behaviors:
///   - name: app_start
///     pattern: "Application started"
///   - name: login
///     pattern: "user_behavior: (\\{.*\\})"
///     data_type: json
/// event_order:
///   - [app_start, login, logout]
///   - [purchase_begin, purchase_end]
/// event_groups:
///   - name: session
///     events: [login, logout]
///   - [app_start, app_stop]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BehaviorConfig {
    /// 행동 정의 목록 (정의 순서대로 평가)
    #[serde(default)]
    pub behaviors: Vec<BehaviorDefinition>,
    /// 발생 순서 정책
    #[serde(default, alias = "eventOrder")]
    pub event_order: OrderPolicy,
    /// 완료 그룹 목록
    #[serde(default, alias = "eventGroups")]
    pub event_groups: Vec<EventGroupConfig>,
}

impl BehaviorConfig {
    /// 행동 정의들의 유효성을 검증합니다.
    ///
    /// 정의 자체의 구조만 검사합니다. 정규식 컴파일 실패는 검증 에러가 아니라
    /// 해당 행동만 격리되는 로드 진단으로 처리됩니다.
    pub fn validate(&self) -> Result<(), LogPipelineError> {
        let mut seen = HashSet::new();
        for behavior in &self.behaviors {
            behavior
                .validate()
                .map_err(|e| LogPipelineError::BehaviorValidation {
                    behavior: behavior.name.clone(),
                    reason: e.to_string(),
                })?;

            if !seen.insert(behavior.name.as_str()) {
                return Err(LogPipelineError::BehaviorValidation {
                    behavior: behavior.name.clone(),
                    reason: "duplicate behavior name".to_owned(),
                });
            }
        }

        for (idx, group) in self.event_groups.iter().enumerate() {
            if group.events().is_empty() {
                return Err(LogPipelineError::BehaviorValidation {
                    behavior: format!("event_groups[{idx}]"),
                    reason: "event group must list at least one behavior".to_owned(),
                });
            }
        }

        Ok(())
    }

    /// 순서 정책을 그룹 목록으로 정규화합니다.
    pub fn order_groups(&self) -> Vec<OrderGroup> {
        self.event_order.normalize()
    }

    /// 완료 그룹 설정을 식별자와 표시 이름이 채워진 형태로 정규화합니다.
    pub fn event_group_specs(&self) -> Vec<EventGroupSpec> {
        self.event_groups
            .iter()
            .enumerate()
            .map(|(idx, group)| group.to_spec(idx))
            .collect()
    }
}

/// 발생 순서 정책
///
/// 평평한 목록(`[a, b, c]`)과 목록의 목록(`[[a, b], [c, d]]`)을 모두 받습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OrderPolicy {
    /// 그룹 목록
    Grouped(Vec<Vec<String>>),
    /// 그룹 없는 이름 목록
    Flat(Vec<String>),
}

impl Default for OrderPolicy {
    fn default() -> Self {
        Self::Grouped(Vec::new())
    }
}

impl OrderPolicy {
    /// 그룹 목록으로 정규화합니다.
    ///
    /// 평평한 목록은 이름마다 하나의 단일 원소 그룹이 됩니다.
    /// 빈 그룹은 버립니다.
    pub fn normalize(&self) -> Vec<OrderGroup> {
        match self {
            Self::Grouped(groups) => groups
                .iter()
                .filter(|g| !g.is_empty())
                .map(|g| OrderGroup(g.clone()))
                .collect(),
            Self::Flat(names) => names.iter().map(|n| OrderGroup(vec![n.clone()])).collect(),
        }
    }
}

/// 정규화된 순서 그룹: 기대 발생 순서대로 나열된 행동 이름
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderGroup(pub Vec<String>);

impl OrderGroup {
    /// 그룹 구성원
    pub fn members(&self) -> &[String] {
        &self.0
    }

    /// 행동의 그룹 내 위치
    pub fn position(&self, behavior: &str) -> Option<usize> {
        self.0.iter().position(|m| m == behavior)
    }
}

/// 완료 그룹 설정 항목
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventGroupConfig {
    /// `{ name?, events }` 형식
    Named {
        /// 표시 이름 (없으면 자동 생성)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        /// 필요한 행동 이름
        events: Vec<String>,
    },
    /// 이름 없는 행동 목록
    Bare(Vec<String>),
}

impl EventGroupConfig {
    /// 그룹에 나열된 행동 이름
    pub fn events(&self) -> &[String] {
        match self {
            Self::Named { events, .. } | Self::Bare(events) => events,
        }
    }

    fn to_spec(&self, idx: usize) -> EventGroupSpec {
        let number = idx + 1;
        let name = match self {
            Self::Named {
                name: Some(name), ..
            } if !name.trim().is_empty() => name.clone(),
            _ => format!("Group {number}"),
        };

        // 중복 이름은 한 번만 요구
        let mut members: Vec<String> = Vec::new();
        for event in self.events() {
            if !members.contains(event) {
                members.push(event.clone());
            }
        }

        EventGroupSpec {
            id: format!("group_{number}"),
            name,
            members,
        }
    }
}

/// 정규화된 완료 그룹
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventGroupSpec {
    /// 그룹 식별자 (`group_1`부터)
    pub id: String,
    /// 표시 이름
    pub name: String,
    /// 필요한 행동 이름 (중복 제거, 설정 순서 유지)
    pub members: Vec<String>,
}
