//! 시간 제약 추적기: 발생 순서와 완료 그룹 정책
//!
//! [`TemporalTracker`]는 한 수집 실행 동안의 상태([`RunState`])를 소유합니다.
//! 순서 그룹과 완료 그룹은 서로 독립적인 상태 기계이며, 같은 행동이
//! 양쪽에 속해도 서로의 판정에 영향을 주지 않습니다.
//!
//! 상태는 명시적인 [`TemporalTracker::reset`]으로만 지워집니다.
//! 수집 시작이 암묵적으로 리셋하지 않으므로 여러 실행에 걸친 순서도 추적됩니다.

use std::collections::{HashMap, HashSet};

use metrics::counter;
use parking_lot::Mutex;

use logwarden_core::event::Notification;
use logwarden_core::metrics as m;

use crate::rule::{ConfigSnapshot, EventGroupSpec, OrderGroup};

/// 완료 그룹 진행 상태
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupProgress {
    /// 그룹 식별자
    pub id: String,
    /// 표시 이름
    pub name: String,
    /// 필요한 행동
    pub members: Vec<String>,
    /// 이미 발생한 행동 (발생 순서)
    pub triggered: Vec<String>,
    /// 완료 여부
    pub completed: bool,
}

impl GroupProgress {
    fn new(spec: &EventGroupSpec) -> Self {
        Self {
            id: spec.id.clone(),
            name: spec.name.clone(),
            members: spec.members.clone(),
            triggered: Vec::new(),
            completed: false,
        }
    }

    /// 아직 발생하지 않은 구성원 (설정 순서)
    pub fn missing(&self) -> Vec<String> {
        self.members
            .iter()
            .filter(|m| !self.triggered.contains(m))
            .cloned()
            .collect()
    }

    fn clear(&mut self) {
        self.triggered.clear();
        self.completed = false;
    }
}

/// 실행 상태
#[derive(Debug, Default)]
pub struct RunState {
    history: Vec<String>,
    fired: HashSet<String>,
    groups: Vec<GroupProgress>,
    synced_generation: Option<u64>,
}

impl RunState {
    /// 스냅샷의 완료 그룹 구성과 상태를 맞춥니다.
    ///
    /// 같은 식별자와 구성원을 가진 그룹은 진행 상태를 유지합니다.
    fn sync_groups(&mut self, snapshot: &ConfigSnapshot) {
        if self.synced_generation == Some(snapshot.generation()) {
            return;
        }

        let mut previous: HashMap<String, GroupProgress> = self
            .groups
            .drain(..)
            .map(|g| (g.id.clone(), g))
            .collect();

        self.groups = snapshot
            .event_groups()
            .iter()
            .map(|spec| match previous.remove(&spec.id) {
                Some(mut kept) if kept.members == spec.members => {
                    kept.name = spec.name.clone();
                    kept
                }
                _ => GroupProgress::new(spec),
            })
            .collect();

        self.synced_generation = Some(snapshot.generation());
    }

    /// 순서 그룹에서 아직 발생하지 않은 첫 번째 선행 행동을 찾습니다.
    fn first_missing_predecessor<'g>(
        &self,
        behavior: &str,
        groups: &'g [OrderGroup],
    ) -> Option<(&'g OrderGroup, &'g str)> {
        groups.iter().find_map(|group| {
            let pos = group.position(behavior)?;
            group.members()[..pos]
                .iter()
                .find(|m| !self.fired.contains(m.as_str()))
                .map(|missing| (group, missing.as_str()))
        })
    }
}

/// 시간 제약 추적기
#[derive(Debug, Default)]
pub struct TemporalTracker {
    state: Mutex<RunState>,
}

impl TemporalTracker {
    /// 새 추적기를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 행동 발생을 기록하고 그에 따른 알림을 반환합니다.
    ///
    /// 순서 위반은 발생 한 번당 최대 하나(첫 번째로 누락된 선행 행동)만 보고합니다.
    /// 완료 그룹은 구성원이 모두 모이는 순간 정확히 한 번 완료됩니다.
    pub fn record(&self, behavior: &str, snapshot: &ConfigSnapshot) -> Vec<Notification> {
        let mut state = self.state.lock();
        state.sync_groups(snapshot);

        let mut notifications = Vec::new();

        let violation = state
            .first_missing_predecessor(behavior, snapshot.order_groups())
            .map(|(group, missing)| (group.members().to_vec(), missing.to_owned()));

        state.history.push(behavior.to_owned());
        state.fired.insert(behavior.to_owned());

        if let Some((group, missing_predecessor)) = violation {
            tracing::info!(
                behavior,
                missing = %missing_predecessor,
                "event order violation"
            );
            counter!(m::ORDER_VIOLATIONS_TOTAL).increment(1);
            notifications.push(Notification::OrderViolation {
                firing_behavior: behavior.to_owned(),
                missing_predecessor,
                group,
                current_order: state.history.clone(),
            });
        }

        for group in state.groups.iter_mut() {
            if group.completed || !group.members.iter().any(|m| m == behavior) {
                continue;
            }
            if !group.triggered.iter().any(|t| t == behavior) {
                group.triggered.push(behavior.to_owned());
            }
            if group.triggered.len() == group.members.len() {
                group.completed = true;
                tracing::info!(group = %group.id, name = %group.name, "event group completed");
                counter!(m::GROUPS_COMPLETED_TOTAL).increment(1);
                notifications.push(Notification::GroupCompleted {
                    group_id: group.id.clone(),
                    group_name: group.name.clone(),
                    members: group.members.clone(),
                });
            }
        }

        notifications
    }

    /// 실행 종료 시 미완료 그룹마다 알림을 만듭니다.
    ///
    /// 상태는 지우지 않습니다.
    pub fn finish_run(&self, snapshot: &ConfigSnapshot) -> Vec<Notification> {
        let mut state = self.state.lock();
        state.sync_groups(snapshot);

        state
            .groups
            .iter()
            .filter(|g| !g.completed)
            .map(|g| Notification::GroupIncomplete {
                group_id: g.id.clone(),
                group_name: g.name.clone(),
                missing_members: g.missing(),
                triggered_members: g.triggered.clone(),
            })
            .collect()
    }

    /// 발생 이력과 모든 그룹 진행 상태를 한 번에 지웁니다.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.history.clear();
        state.fired.clear();
        for group in state.groups.iter_mut() {
            group.clear();
        }
        tracing::info!("temporal state reset");
    }

    /// 리셋 이후 발생 이력
    pub fn history(&self) -> Vec<String> {
        self.state.lock().history.clone()
    }

    /// 완료 그룹 진행 상태
    pub fn group_progress(&self) -> Vec<GroupProgress> {
        self.state.lock().groups.clone()
    }
}
