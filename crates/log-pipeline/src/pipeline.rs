//! 파이프라인 오케스트레이션 -- 수집/재조립/매칭/시간 제약의 전체 흐름을 관리합니다.
//!
//! [`LogPipeline`]은 제어 표면(start/stop/리셋/설정 교체)을 제공하고,
//! 모든 결과를 주입된 [`EventSink`]로 내보냅니다.
//!
//! # 내부 아키텍처
//! ```text
//! ProcessSession --stdout--> StreamWorker(Reassembler) --dispatch_entry--> Log 알림
//!                                                              |-> BehaviorMatcher -> BehaviorTriggered
//!                                                              \-> TemporalTracker -> OrderViolation/GroupCompleted
//!                --stderr--> StreamWorker(passthrough) --> Diagnostic 알림
//! ```
//!
//! 세션 슬롯은 `tokio::sync::Mutex`로 보호됩니다. `start`와 `stop`은 슬롯을
//! 잡은 채로 진행되므로 두 호출이 겹쳐도 반쯤 만들어진 세션이 보이지 않습니다.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use metrics::counter;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, warn};
use uuid::Uuid;

use logwarden_core::error::{LogwardenError, PipelineError};
use logwarden_core::event::Notification;
use logwarden_core::metrics as m;
use logwarden_core::pipeline::{ChannelSink, EventSink, HealthStatus};
use logwarden_core::types::{LogEntry, Platform};

use crate::config::PipelineConfig;
use crate::error::LogPipelineError;
use crate::reassembler::{Reassembler, StreamEnd, StreamWorker, WorkerReport};
use crate::rule::{BehaviorConfig, BehaviorLoader, ConfigSnapshot, ConfigStore};
use crate::source::{PlatformSpec, ProcessSession, SessionStreams, Termination, resolve_executable};
use crate::temporal::TemporalTracker;

/// 실행 중인 수집 세션
struct RunningSession {
    run_id: Uuid,
    platform: Platform,
    process: ProcessSession,
    cancel: CancellationToken,
    workers: Vec<JoinHandle<WorkerReport>>,
}

/// 워커 태스크와 공유하는 상태
struct Shared {
    config: PipelineConfig,
    sink: Arc<dyn EventSink>,
    store: ConfigStore,
    tracker: TemporalTracker,
    active: AtomicBool,
    session: Mutex<Option<RunningSession>>,
}

impl Shared {
    fn emit(&self, notification: Notification) {
        self.sink.emit(notification);
    }

    fn diagnose(&self, message: impl Into<String>) {
        let message = message.into();
        counter!(m::DIAGNOSTICS_TOTAL).increment(1);
        debug!(message = %message, "diagnostic");
        self.emit(Notification::diagnostic(message));
    }

    /// 활성 플래그를 내리고, 실제로 바뀌었으면 상태 알림을 보냅니다.
    fn deactivate(&self) -> bool {
        let was_active = self.active.swap(false, Ordering::SeqCst);
        if was_active {
            self.emit(Notification::run_status(false));
        }
        was_active
    }

    fn dispatch_entry(&self, entry: LogEntry) {
        let platform = entry.platform.as_str();
        counter!(m::ENTRIES_REASSEMBLED_TOTAL, m::LABEL_PLATFORM => platform).increment(1);
        self.emit(Notification::log(platform, entry.text.clone()));

        let snapshot = self.store.snapshot();
        for matched in snapshot.matcher().evaluate(&entry.text) {
            let name = matched.behavior.name.clone();
            counter!(m::BEHAVIORS_TRIGGERED_TOTAL, m::LABEL_BEHAVIOR => name.clone()).increment(1);

            let failures = matched.failed_extractions();
            if failures > 0 {
                counter!(m::EXTRACTION_FAILURES_TOTAL).increment(failures as u64);
                debug!(behavior = %name, failures, "extraction failures recorded");
            }

            self.emit(Notification::BehaviorTriggered {
                behavior: matched.behavior,
                entry_text: entry.text.clone(),
                extractions: matched.extractions,
                platform: platform.to_owned(),
            });

            for notification in self.tracker.record(&name, &snapshot) {
                self.emit(notification);
            }
        }
    }

    fn finish_run(&self) {
        let snapshot = self.store.snapshot();
        for notification in self.tracker.finish_run(&snapshot) {
            self.emit(notification);
        }
    }

    /// 워커에 취소 신호를 보내고 드레인 시간 안에서 종료를 기다립니다.
    async fn drain(&self, session: &mut RunningSession) {
        session.cancel.cancel();
        let deadline = Instant::now() + self.config.drain_timeout();

        for handle in session.workers.drain(..) {
            let abort = handle.abort_handle();
            let remaining = deadline.saturating_duration_since(Instant::now());
            match timeout(remaining, handle).await {
                Ok(Ok(report)) => {
                    debug!(stream = %report.stream, end = ?report.end, entries = report.entries, "worker drained");
                }
                Ok(Err(e)) => warn!(error = %e, "stream worker task failed"),
                Err(_) => {
                    warn!("stream worker did not drain in time, aborting");
                    abort.abort();
                }
            }
        }
    }

    fn report_termination(&self, result: &Termination) {
        if result.escalated {
            self.diagnose(format!(
                "Process did not exit within {}s after terminate; forced kill.",
                self.config.stop_timeout_secs
            ));
        }
    }

    /// 엔트리 스트림이 스스로 끝났을 때 세션을 정리합니다.
    ///
    /// 그 사이 `stop`이나 새 `start`가 있었다면 아무것도 하지 않습니다.
    async fn end_of_stream(self: Arc<Self>, run_id: Uuid) {
        let mut slot = self.session.lock().await;
        if !slot.as_ref().is_some_and(|s| s.run_id == run_id) {
            return;
        }
        let Some(mut session) = slot.take() else {
            return;
        };

        info!(%run_id, platform = %session.platform, "log stream ended");
        self.deactivate();
        self.drain(&mut session).await;

        let result = session.process.shutdown(self.config.stop_timeout()).await;
        self.report_termination(&result);
        self.finish_run();
        self.diagnose(format!(
            "{} log collection stopped. Exit code: {}",
            session.platform,
            result.code_display()
        ));
    }
}

/// 로그 파이프라인 -- 한 번에 하나의 수집 세션을 운영합니다.
///
/// # 사용 예시
/// ```ignore
/// use logwarden_log_pipeline::LogPipelineBuilder;
///
/// let (pipeline, rx) = LogPipelineBuilder::new().config(config).build()?;
/// pipeline.load_config().await;
/// pipeline.start("android", Some("MyApp")).await?;
/// // ...
/// pipeline.stop().await;
/// ```
pub struct LogPipeline {
    shared: Arc<Shared>,
}

impl LogPipeline {
    /// 수집 세션을 시작합니다.
    ///
    /// # Errors
    /// - `AlreadyRunning`: 이미 세션이 실행 중 (기존 세션은 그대로 유지)
    /// - `UnsupportedPlatform`: 알 수 없는 플랫폼 식별자
    /// - `ToolUnavailable`: 플랫폼 도구를 찾지 못했거나 존재 확인 실패
    ///
    /// 실패 시 부분적으로 만들어진 프로세스나 태스크는 남지 않습니다.
    pub async fn start(&self, platform_id: &str, tag: Option<&str>) -> Result<(), LogwardenError> {
        let mut slot = self.shared.session.lock().await;
        if slot.is_some() {
            warn!(platform = platform_id, "start rejected: a session is already running");
            return Err(PipelineError::AlreadyRunning.into());
        }

        match launch(&self.shared, platform_id, tag).await {
            Ok(session) => {
                *slot = Some(session);
                Ok(())
            }
            Err(e) => {
                warn!(platform = platform_id, error = %e, "failed to start log collection");
                self.shared.diagnose(start_failure_message(&e));
                Err(e.into())
            }
        }
    }

    /// 수집 세션을 종료합니다.
    ///
    /// 실행 중이 아니어도 안전하게 호출할 수 있습니다.
    /// 활성 플래그를 먼저 내리고, 워커 드레인 후 필터와 생산자를 차례로 종료합니다.
    pub async fn stop(&self) {
        self.shared.deactivate();

        let mut slot = self.shared.session.lock().await;
        let Some(mut session) = slot.take() else {
            debug!("stop requested with no running session");
            return;
        };
        // 슬롯을 기다리는 동안 시작된 세션일 수 있음
        self.shared.deactivate();

        info!(run_id = %session.run_id, platform = %session.platform, "stopping log collection");
        self.shared.drain(&mut session).await;

        let result = session
            .process
            .shutdown(self.shared.config.stop_timeout())
            .await;
        debug!(exit_code = ?result.code, escalated = result.escalated, "producer stopped");
        self.shared.report_termination(&result);

        self.shared.finish_run();
        self.shared.diagnose("Logging process stopped.");
    }

    /// 발생 이력과 그룹 완료 상태를 지웁니다.
    pub fn reset_temporal_state(&self) {
        self.shared.tracker.reset();
    }

    /// 리셋 이후 발생한 행동 이력
    pub fn temporal_history(&self) -> Vec<String> {
        self.shared.tracker.history()
    }

    /// 현재 행동 설정
    pub fn config(&self) -> BehaviorConfig {
        self.shared.store.current_config()
    }

    /// 현재 컴파일된 설정 스냅샷
    pub fn snapshot(&self) -> Arc<ConfigSnapshot> {
        self.shared.store.snapshot()
    }

    /// 행동 설정을 교체합니다.
    ///
    /// 파일 경로가 있으면 먼저 저장한 뒤 메모리의 스냅샷을 교체합니다.
    /// 검증이나 저장에 실패하면 기존 설정이 유지됩니다.
    pub async fn replace_config(&self, config: BehaviorConfig) -> Result<(), LogwardenError> {
        match apply_config(&self.shared, config).await {
            Ok(diagnostics) => {
                for message in diagnostics {
                    self.shared.diagnose(message);
                }
                info!("behavior configuration replaced");
                self.shared.diagnose("Configuration updated successfully.");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "behavior configuration rejected");
                self.shared
                    .diagnose(format!("Error updating configuration: {e}"));
                Err(e.into())
            }
        }
    }

    /// 행동 설정 파일을 읽어 들입니다.
    ///
    /// 읽기 실패는 빈 행동 집합과 진단 메시지로 처리됩니다.
    /// 파일 경로 없이 만든 파이프라인에서는 아무것도 하지 않습니다.
    pub async fn load_config(&self) {
        let Some(path) = self.shared.store.path().map(|p| p.to_path_buf()) else {
            return;
        };
        for message in self.shared.store.reload_from_file(&path).await {
            self.shared.diagnose(message);
        }
        let snapshot = self.shared.store.snapshot();
        info!(
            path = %path.display(),
            behaviors = snapshot.matcher().len(),
            enabled = snapshot.matcher().enabled_count(),
            "behavior configuration loaded"
        );
    }

    /// 행동 설정 파일을 다시 읽고 완료 메시지를 보냅니다.
    pub async fn reload_config(&self) {
        self.load_config().await;
        self.shared.diagnose("Configuration reloaded successfully.");
    }

    /// 수집 세션이 활성 상태인지 확인합니다.
    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::SeqCst)
    }

    /// 실행 중인 세션의 로그 생산자 PID. 세션이 없거나 이미 회수되었으면 `None`.
    pub async fn producer_pid(&self) -> Option<u32> {
        let slot = self.shared.session.lock().await;
        slot.as_ref().and_then(|session| session.process.producer_pid())
    }

    /// 파이프라인 상태를 점검합니다.
    pub async fn health_check(&self) -> HealthStatus {
        if self.is_active() {
            let mut slot = self.shared.session.lock().await;
            if let Some(session) = slot.as_mut()
                && session.process.producer_exited()
            {
                return HealthStatus::Degraded(format!(
                    "{} log producer has exited",
                    session.platform
                ));
            }
        }

        let faults = self.shared.store.snapshot().diagnostics().len();
        if faults > 0 {
            HealthStatus::Degraded(format!(
                "{faults} behavior definition fault(s) isolated"
            ))
        } else {
            HealthStatus::Healthy
        }
    }

    /// 재조립된 엔트리 하나를 전달합니다.
    ///
    /// 모든 스트림 워커가 쓰는 단일 전달 경로입니다:
    /// 원본 엔트리 알림 -> 행동 매칭 -> 시간 제약 추적.
    pub fn dispatch_entry(&self, entry: LogEntry) {
        self.shared.dispatch_entry(entry);
    }
}

impl Drop for LogPipeline {
    fn drop(&mut self) {
        // 자식 프로세스는 kill_on_drop으로 정리되고, 워커는 취소로 Arc를 놓습니다.
        if let Ok(mut slot) = self.shared.session.try_lock()
            && let Some(session) = slot.take()
        {
            session.cancel.cancel();
        }
    }
}

/// 도구 탐색부터 워커 생성까지 세션 하나를 준비합니다.
async fn launch(
    shared: &Arc<Shared>,
    platform_id: &str,
    tag: Option<&str>,
) -> Result<RunningSession, LogPipelineError> {
    let config = &shared.config;
    let spec = PlatformSpec::lookup(platform_id)?;
    let tool = resolve_executable(spec, &config.tools_dir, config.probe_timeout()).await?;
    let start_pattern = spec
        .entry_start_regex()
        .map_err(|e| LogPipelineError::PatternCompile {
            owner: format!("platform \"{}\"", spec.platform),
            pattern: spec.entry_start.to_owned(),
            reason: e.to_string(),
        })?;

    let tag = tag.map(str::trim).filter(|t| !t.is_empty());
    let (process, streams) = ProcessSession::spawn(
        spec,
        &tool,
        tag,
        &config.tag_filter_command,
        config.stop_timeout(),
    )
    .await?;

    let run_id = Uuid::new_v4();
    info!(%run_id, platform = %spec.platform, ?tag, tool = %tool.path.display(), "log collection started");

    shared.diagnose(format!("Starting {} log collection...", spec.platform));
    if let Some(tag) = tag {
        shared.diagnose(format!("Applying tag filter: \"{tag}\""));
    }

    shared.active.store(true, Ordering::SeqCst);
    shared.emit(Notification::run_status(true));

    for message in shared.store.snapshot().diagnostics() {
        shared.diagnose(message.clone());
    }

    let cancel = CancellationToken::new();
    let workers = spawn_workers(shared, run_id, spec.platform, start_pattern, streams, &cancel);

    Ok(RunningSession {
        run_id,
        platform: spec.platform,
        process,
        cancel,
        workers,
    })
}

fn spawn_workers(
    shared: &Arc<Shared>,
    run_id: Uuid,
    platform: Platform,
    start_pattern: regex::Regex,
    streams: SessionStreams,
    cancel: &CancellationToken,
) -> Vec<JoinHandle<WorkerReport>> {
    let config = &shared.config;
    let mut workers = Vec::with_capacity(1 + streams.diagnostics.len());

    let (kind, stdout) = streams.entries;
    let worker = StreamWorker {
        stream: kind,
        read_poll: config.read_poll(),
        max_line_bytes: config.max_entry_bytes,
    };
    let reassembler = Reassembler::new(start_pattern, config.idle_flush(), config.max_entry_bytes);
    let token = cancel.clone();
    let task_shared = Arc::clone(shared);
    let span = tracing::info_span!("stream", %run_id, stream = %kind);
    workers.push(tokio::spawn(
        async move {
            let report = worker
                .run(stdout, reassembler, token.clone(), |text| {
                    task_shared.dispatch_entry(LogEntry::new(text, platform));
                })
                .await;

            if let StreamEnd::Failed(reason) = &report.end {
                task_shared.diagnose(format!("Error reading log stream: {reason}"));
            }
            if !token.is_cancelled() {
                tokio::spawn(Arc::clone(&task_shared).end_of_stream(run_id));
            }
            report
        }
        .instrument(span),
    ));

    for (kind, stderr) in streams.diagnostics {
        let worker = StreamWorker {
            stream: kind,
            read_poll: config.read_poll(),
            max_line_bytes: config.max_entry_bytes,
        };
        let token = cancel.clone();
        let task_shared = Arc::clone(shared);
        let span = tracing::info_span!("stream", %run_id, stream = %kind);
        workers.push(tokio::spawn(
            async move {
                let prefix = kind.diagnostic_prefix();
                worker
                    .run(stderr, Reassembler::passthrough(), token, |line| {
                        task_shared.diagnose(format!("{prefix}{}", line.trim()));
                    })
                    .await
            }
            .instrument(span),
        ));
    }

    workers
}

async fn apply_config(
    shared: &Shared,
    config: BehaviorConfig,
) -> Result<Vec<String>, LogPipelineError> {
    config.validate()?;
    if let Some(path) = shared.store.path() {
        BehaviorLoader::save_file(path, &config).await?;
    }
    shared.store.replace(config)
}

fn start_failure_message(error: &LogPipelineError) -> String {
    match error {
        LogPipelineError::Session(PipelineError::ToolUnavailable { command, guidance }) => {
            format!("Command \"{command}\" not found. {guidance}")
        }
        LogPipelineError::Session(PipelineError::UnsupportedPlatform(id)) => {
            format!("Invalid platform specified: '{id}'")
        }
        LogPipelineError::Process { reason, .. } => {
            format!("Failed to start log process: {reason}")
        }
        other => format!("Failed to start log process: {other}"),
    }
}

/// 로그 파이프라인 빌더
///
/// 이벤트 싱크를 지정하지 않으면 내부 채널을 만들고 수신기를 돌려줍니다.
pub struct LogPipelineBuilder {
    config: PipelineConfig,
    sink: Option<Arc<dyn EventSink>>,
    behaviors: Option<BehaviorConfig>,
}

impl LogPipelineBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
            sink: None,
            behaviors: None,
        }
    }

    /// 파이프라인 설정을 지정합니다.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// 알림을 받을 이벤트 싱크를 지정합니다.
    pub fn sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// 파일 대신 메모리의 행동 설정으로 시작합니다.
    ///
    /// 이 경우 `replace_config`는 파일에 저장하지 않고 `load_config`는 아무것도 하지 않습니다.
    pub fn behaviors(mut self, behaviors: BehaviorConfig) -> Self {
        self.behaviors = Some(behaviors);
        self
    }

    /// 파이프라인을 빌드합니다.
    ///
    /// # Returns
    /// - `LogPipeline`: 파이프라인 인스턴스
    /// - `Option<mpsc::UnboundedReceiver<Notification>>`: 알림 수신 채널
    ///   (외부 싱크를 지정한 경우 None)
    pub fn build(
        self,
    ) -> Result<(LogPipeline, Option<mpsc::UnboundedReceiver<Notification>>), LogPipelineError>
    {
        self.config.validate()?;

        let (sink, rx): (Arc<dyn EventSink>, _) = match self.sink {
            Some(sink) => (sink, None),
            None => {
                let (sink, rx) = ChannelSink::new();
                (Arc::new(sink), Some(rx))
            }
        };

        let store = ConfigStore::new(self.config.case_insensitive);
        let store = match self.behaviors {
            Some(behaviors) => {
                store.replace(behaviors)?;
                store
            }
            None => store.with_path(self.config.behaviors_path.clone()),
        };

        let shared = Arc::new(Shared {
            config: self.config,
            sink,
            store,
            tracker: TemporalTracker::new(),
            active: AtomicBool::new(false),
            session: Mutex::new(None),
        });

        Ok((LogPipeline { shared }, rx))
    }
}

impl Default for LogPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
