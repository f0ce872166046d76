//! 행동 규칙 엔진: 설정 저장소, 매칭, 필드 추출
//!
//! 행동 정의 파일을 로드하여 정규식과 스키마를 한 번 컴파일한
//! 불변 스냅샷([`ConfigSnapshot`])을 만들고, [`ConfigStore`]가 이를
//! 원자적으로 교체합니다. 매칭 중인 워커는 항상 하나의 일관된 스냅샷을 봅니다.
//!
//! # 아키텍처
//! - [`ConfigStore`]: 스냅샷 보관 및 로드/교체/저장
//! - [`loader`]: YAML/JSON 파일 로딩
//! - [`matcher`]: 행동 매칭과 추출기 실행
//! - [`extractor`]: 타입 변환과 제약 검증
//! - [`types`]: 설정 파일 데이터 구조

pub mod extractor;
pub mod loader;
pub mod matcher;
pub mod types;

pub use loader::{BehaviorLoader, ConfigFormat};
pub use matcher::{BehaviorMatch, BehaviorMatcher, CompiledBehavior, MATCH_KEY};
pub use types::{BehaviorConfig, EventGroupConfig, EventGroupSpec, OrderGroup, OrderPolicy};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;

use crate::error::LogPipelineError;

/// 컴파일된 설정 스냅샷
///
/// 생성 후 변경되지 않습니다. 설정이 바뀌면 새 스냅샷이 만들어집니다.
#[derive(Debug)]
pub struct ConfigSnapshot {
    config: BehaviorConfig,
    matcher: BehaviorMatcher,
    order_groups: Vec<OrderGroup>,
    event_groups: Vec<EventGroupSpec>,
    diagnostics: Vec<String>,
    generation: u64,
}

impl ConfigSnapshot {
    /// 설정을 컴파일하여 스냅샷을 만듭니다.
    ///
    /// 정규식/스키마 컴파일 실패는 격리되어 `diagnostics`에 남습니다.
    pub fn compile(config: BehaviorConfig, case_insensitive: bool, generation: u64) -> Self {
        let (matcher, diagnostics) = BehaviorMatcher::compile(&config.behaviors, case_insensitive);
        let order_groups = config.order_groups();
        let event_groups = config.event_group_specs();
        Self {
            config,
            matcher,
            order_groups,
            event_groups,
            diagnostics,
            generation,
        }
    }

    /// 빈 스냅샷
    pub fn empty(generation: u64) -> Self {
        Self::compile(BehaviorConfig::default(), true, generation)
    }

    /// 원본 설정
    pub fn config(&self) -> &BehaviorConfig {
        &self.config
    }

    /// 컴파일된 매처
    pub fn matcher(&self) -> &BehaviorMatcher {
        &self.matcher
    }

    /// 정규화된 순서 그룹
    pub fn order_groups(&self) -> &[OrderGroup] {
        &self.order_groups
    }

    /// 정규화된 완료 그룹
    pub fn event_groups(&self) -> &[EventGroupSpec] {
        &self.event_groups
    }

    /// 컴파일 중 격리된 오류 메시지
    pub fn diagnostics(&self) -> &[String] {
        &self.diagnostics
    }

    /// 스냅샷 세대 번호 (교체될 때마다 증가)
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// 설정 저장소: 원자적으로 교체되는 불변 스냅샷
pub struct ConfigStore {
    current: ArcSwap<ConfigSnapshot>,
    path: Option<PathBuf>,
    case_insensitive: bool,
    generation: AtomicU64,
}

impl ConfigStore {
    /// 빈 설정으로 저장소를 만듭니다.
    pub fn new(case_insensitive: bool) -> Self {
        Self {
            current: ArcSwap::from_pointee(ConfigSnapshot::empty(0)),
            path: None,
            case_insensitive,
            generation: AtomicU64::new(0),
        }
    }

    /// 행동 정의 파일 경로를 지정합니다.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// 행동 정의 파일 경로
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// 현재 스냅샷
    pub fn snapshot(&self) -> Arc<ConfigSnapshot> {
        self.current.load_full()
    }

    /// 현재 설정의 복사본
    pub fn current_config(&self) -> BehaviorConfig {
        self.current.load().config().clone()
    }

    fn install(&self, config: BehaviorConfig) -> Arc<ConfigSnapshot> {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let snapshot = Arc::new(ConfigSnapshot::compile(
            config,
            self.case_insensitive,
            generation,
        ));
        self.current.store(Arc::clone(&snapshot));
        tracing::debug!(
            generation,
            behaviors = snapshot.matcher().len(),
            "installed config snapshot"
        );
        snapshot
    }

    /// 설정을 통째로 교체합니다.
    ///
    /// 검증에 실패하면 기존 스냅샷을 유지하고 에러를 반환합니다.
    /// 성공하면 격리된 컴파일 오류 목록을 반환합니다.
    pub fn replace(&self, config: BehaviorConfig) -> Result<Vec<String>, LogPipelineError> {
        config.validate()?;
        let snapshot = self.install(config);
        Ok(snapshot.diagnostics().to_vec())
    }

    /// 설정된 경로에서 로드합니다. 경로가 없으면 빈 설정을 사용합니다.
    ///
    /// 실패하지 않습니다. 진단 메시지 목록을 반환합니다.
    pub async fn load(&self) -> Vec<String> {
        match self.path.clone() {
            Some(path) => self.reload_from_file(&path).await,
            None => {
                self.install(BehaviorConfig::default());
                Vec::new()
            }
        }
    }

    /// 파일에서 설정을 다시 읽습니다.
    ///
    /// 파일이 없거나 잘못되었으면 빈 행동 집합으로 대체하고
    /// 그 사유를 진단 메시지로 반환합니다.
    pub async fn reload_from_file(&self, path: &Path) -> Vec<String> {
        match BehaviorLoader::load_file(path).await {
            Ok(config) => {
                let snapshot = self.install(config);
                snapshot.diagnostics().to_vec()
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "falling back to empty behavior set");
                self.install(BehaviorConfig::default());
                vec![format!("Error reading or parsing behavior config: {e}")]
            }
        }
    }

    /// 현재 설정을 파일에 저장합니다.
    pub async fn persist(&self, path: &Path) -> Result<(), LogPipelineError> {
        BehaviorLoader::save_file(path, &self.current_config()).await
    }
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStore")
            .field("path", &self.path)
            .field("generation", &self.current.load().generation())
            .finish()
    }
}
