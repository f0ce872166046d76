//! 소스 프로세스 생성과 종료
//!
//! [`ProcessSession`]은 한 수집 실행 동안 생산자와 (선택적) 필터 프로세스를 소유합니다.
//! 두 자식 모두 `kill_on_drop`으로 생성되므로 세션이 버려져도 프로세스가 남지 않습니다.

use std::process::Stdio;
use std::time::Duration;

use metrics::counter;
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use logwarden_core::metrics as m;
use logwarden_core::types::Platform;

use super::StreamKind;
use super::platform::{PlatformSpec, ResolvedTool};
use crate::error::LogPipelineError;

/// 세션이 읽어야 할 스트림들
#[derive(Debug)]
pub struct SessionStreams {
    /// 최종 엔트리 스트림 (필터가 있으면 필터 stdout, 없으면 생산자 stdout)
    pub entries: (StreamKind, ChildStdout),
    /// 진단 스트림 (각 프로세스의 stderr)
    pub diagnostics: Vec<(StreamKind, ChildStderr)>,
}

/// 프로세스 종료 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Termination {
    /// 종료 코드 (시그널로 끝났거나 알 수 없으면 `None`)
    pub code: Option<i32>,
    /// graceful 종료 시간 초과로 강제 종료했는지 여부
    pub escalated: bool,
}

impl Termination {
    /// 진단 메시지용 종료 코드 표기
    pub fn code_display(&self) -> String {
        self.code
            .map_or_else(|| "unknown".to_owned(), |c| c.to_string())
    }
}

/// 실행 중인 수집 세션
#[derive(Debug)]
pub struct ProcessSession {
    platform: Platform,
    producer: Child,
    filter: Option<Child>,
}

impl ProcessSession {
    /// 생산자와 (태그가 있으면) 필터를 생성합니다.
    ///
    /// 필터 생성에 실패하면 이미 만든 생산자를 종료한 뒤 에러를 반환합니다.
    pub async fn spawn(
        spec: &PlatformSpec,
        tool: &ResolvedTool,
        tag: Option<&str>,
        filter_command: &str,
        stop_timeout: Duration,
    ) -> Result<(Self, SessionStreams), LogPipelineError> {
        let mut producer = Command::new(&tool.path)
            .args(spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| LogPipelineError::Process {
                command: tool.path.display().to_string(),
                reason: e.to_string(),
            })?;

        info!(
            platform = %spec.platform,
            command = %tool.path.display(),
            pid = ?producer.id(),
            "producer started"
        );

        let mut diagnostics = Vec::with_capacity(2);
        if let Some(stderr) = producer.stderr.take() {
            diagnostics.push((StreamKind::ProducerStderr, stderr));
        }

        let Some(producer_stdout) = producer.stdout.take() else {
            terminate(&mut producer, stop_timeout).await;
            return Err(LogPipelineError::Process {
                command: spec.program.to_owned(),
                reason: "producer stdout was not captured".to_owned(),
            });
        };

        let tag = tag.map(str::trim).filter(|t| !t.is_empty());
        let Some(tag) = tag else {
            let session = Self {
                platform: spec.platform,
                producer,
                filter: None,
            };
            let streams = SessionStreams {
                entries: (StreamKind::ProducerStdout, producer_stdout),
                diagnostics,
            };
            return Ok((session, streams));
        };

        let filter = spawn_filter(filter_command, tag, producer_stdout);
        let mut filter = match filter {
            Ok(child) => child,
            Err(e) => {
                terminate(&mut producer, stop_timeout).await;
                return Err(e);
            }
        };

        debug!(command = filter_command, tag, pid = ?filter.id(), "tag filter started");

        if let Some(stderr) = filter.stderr.take() {
            diagnostics.push((StreamKind::FilterStderr, stderr));
        }
        let Some(filter_stdout) = filter.stdout.take() else {
            terminate(&mut filter, stop_timeout).await;
            terminate(&mut producer, stop_timeout).await;
            return Err(LogPipelineError::Process {
                command: filter_command.to_owned(),
                reason: "filter stdout was not captured".to_owned(),
            });
        };

        let session = Self {
            platform: spec.platform,
            producer,
            filter: Some(filter),
        };
        let streams = SessionStreams {
            entries: (StreamKind::FilterStdout, filter_stdout),
            diagnostics,
        };
        Ok((session, streams))
    }

    /// 세션 플랫폼
    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// 필터 단계가 있는지 확인합니다.
    pub fn has_filter(&self) -> bool {
        self.filter.is_some()
    }

    /// 생산자 프로세스 ID
    pub fn producer_pid(&self) -> Option<u32> {
        self.producer.id()
    }

    /// 생산자가 이미 종료되었는지 확인합니다.
    pub fn producer_exited(&mut self) -> bool {
        matches!(self.producer.try_wait(), Ok(Some(_)))
    }

    /// 필터, 생산자 순으로 종료합니다.
    ///
    /// 생산자의 종료 결과를 반환합니다. 필터 종료 결과는 로그로만 남깁니다.
    pub async fn shutdown(mut self, grace: Duration) -> Termination {
        if let Some(mut filter) = self.filter.take() {
            let result = terminate(&mut filter, grace).await;
            debug!(code = ?result.code, escalated = result.escalated, "tag filter stopped");
        }
        terminate(&mut self.producer, grace).await
    }
}

fn spawn_filter(
    filter_command: &str,
    tag: &str,
    producer_stdout: ChildStdout,
) -> Result<Child, LogPipelineError> {
    let stdin: Stdio = producer_stdout
        .try_into()
        .map_err(|e: std::io::Error| LogPipelineError::Process {
            command: filter_command.to_owned(),
            reason: format!("cannot hand producer output to filter: {e}"),
        })?;

    Command::new(filter_command)
        // `-e`: '-'로 시작하는 태그도 옵션이 아닌 패턴으로 취급
        .args(["--line-buffered", "-i", "-e", tag])
        .stdin(stdin)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| LogPipelineError::Process {
            command: filter_command.to_owned(),
            reason: e.to_string(),
        })
}

/// 자식 프로세스를 graceful하게 종료하고, 시간 안에 끝나지 않으면 강제 종료합니다.
///
/// 이미 종료된 프로세스에는 신호를 보내지 않습니다.
pub async fn terminate(child: &mut Child, grace: Duration) -> Termination {
    if let Ok(Some(status)) = child.try_wait() {
        return Termination {
            code: status.code(),
            escalated: false,
        };
    }

    request_stop(child);

    match timeout(grace, child.wait()).await {
        Ok(Ok(status)) => Termination {
            code: status.code(),
            escalated: false,
        },
        Ok(Err(e)) => {
            warn!(error = %e, "waiting for child process failed");
            Termination {
                code: None,
                escalated: false,
            }
        }
        Err(_) => {
            warn!(pid = ?child.id(), grace_ms = grace.as_millis() as u64, "child ignored terminate, killing");
            counter!(m::PROCESS_KILL_ESCALATIONS_TOTAL).increment(1);
            if let Err(e) = child.start_kill() {
                warn!(error = %e, "forced kill failed");
            }
            let code = child.wait().await.ok().and_then(|s| s.code());
            Termination {
                code,
                escalated: true,
            }
        }
    }
}

#[cfg(unix)]
fn request_stop(child: &mut Child) {
    let Some(pid) = child.id().and_then(|p| libc::pid_t::try_from(p).ok()) else {
        return;
    };
    // SAFETY: pid는 아직 reap되지 않은 자식 프로세스이므로 재사용되지 않았습니다.
    let rc = unsafe { libc::kill(pid, libc::SIGTERM) };
    if rc != 0 {
        debug!(pid, error = %std::io::Error::last_os_error(), "SIGTERM failed");
    }
}

#[cfg(not(unix))]
fn request_stop(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        debug!(error = %e, "terminate request failed");
    }
}
