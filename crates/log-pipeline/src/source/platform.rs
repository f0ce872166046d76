//! 플랫폼별 로그 생산자 정의와 실행 파일 탐색
//!
//! 탐색 순서:
//! 1. 번들 도구 디렉토리 (`tools/<cmd>`, HarmonyOS는 `tools/toolchains/hdc`도)
//! 2. 알려진 고정 경로 (예: `/opt/homebrew/bin/idevicesyslog`)
//! 3. 시스템 `PATH`
//!
//! 찾은 후보는 `<cmd> --version`으로 존재를 확인합니다. 종료 코드는 보지 않습니다.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use regex::Regex;
use tokio::process::Command;
use tokio::time::timeout;

use logwarden_core::error::PipelineError;
use logwarden_core::types::Platform;

/// 타임스탬프로 시작하는 줄 (ISO 형식, 모든 플랫폼 공통)
const ISO_TIMESTAMP_START: &str = r"^\d{4}-\d{2}-\d{2}[ T]\d{2}:\d{2}:\d{2}";

/// logcat/hilog threadtime 형식: `09-09 10:00:00.123`
const MONTH_DAY_TIME_START: &str = r"^\d{2}-\d{2}\s+\d{2}:\d{2}:\d{2}\.\d{3}\s";

/// syslog 형식: `Sep  9 10:00:00`
const SYSLOG_TIME_START: &str = r"^[A-Z][a-z]{2}\s+\d{1,2}\s+\d{2}:\d{2}:\d{2}";

/// 플랫폼별 생산자 정의
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformSpec {
    /// 대상 플랫폼
    pub platform: Platform,
    /// 실행 파일 이름
    pub program: &'static str,
    /// 실행 인자
    pub args: &'static [&'static str],
    /// 번들 도구 디렉토리 기준 상대 경로 후보
    pub bundled: &'static [&'static str],
    /// 고정 절대 경로 후보
    pub well_known: &'static [&'static str],
    /// 엔트리 시작 패턴 (번들 ISO 패턴과 OR 결합)
    pub entry_start: &'static str,
    /// 도구가 없을 때 안내 문구
    pub guidance: &'static str,
}

const ANDROID: PlatformSpec = PlatformSpec {
    platform: Platform::Android,
    program: "adb",
    args: &["logcat"],
    bundled: &["adb"],
    well_known: &[],
    entry_start: r"^\d{2}-\d{2}\s+\d{2}:\d{2}:\d{2}\.\d{3}\s|^-{9} beginning of ",
    guidance: "Please install Android SDK Platform Tools and ensure adb is in your PATH, \
               or place adb in the tools/ directory.",
};

const IOS: PlatformSpec = PlatformSpec {
    platform: Platform::Ios,
    program: "idevicesyslog",
    args: &[],
    bundled: &["idevicesyslog"],
    well_known: &["/opt/homebrew/bin/idevicesyslog", "/usr/local/bin/idevicesyslog"],
    entry_start: SYSLOG_TIME_START,
    guidance: "Please install libimobiledevice: brew install libimobiledevice, \
               or place idevicesyslog in the tools/ directory.",
};

const HARMONY_OS: PlatformSpec = PlatformSpec {
    platform: Platform::HarmonyOs,
    program: "hdc",
    args: &["hilog"],
    bundled: &["hdc", "toolchains/hdc"],
    well_known: &[],
    entry_start: MONTH_DAY_TIME_START,
    guidance: "Please download HarmonyOS SDK and add hdc to your PATH, \
               or place hdc executable in the tools/ directory. \
               Download from: https://developer.harmonyos.com/cn/develop/deveco-studio",
};

impl PlatformSpec {
    /// 플랫폼의 생산자 정의를 반환합니다.
    pub fn for_platform(platform: Platform) -> &'static PlatformSpec {
        match platform {
            Platform::Android => &ANDROID,
            Platform::Ios => &IOS,
            Platform::HarmonyOs => &HARMONY_OS,
        }
    }

    /// 플랫폼 식별자 문자열로 정의를 찾습니다.
    pub fn lookup(platform_id: &str) -> Result<&'static PlatformSpec, PipelineError> {
        let platform: Platform = platform_id.parse()?;
        Ok(Self::for_platform(platform))
    }

    /// 엔트리 시작 정규식을 컴파일합니다.
    pub fn entry_start_regex(&self) -> Result<Regex, regex::Error> {
        Regex::new(&format!("{ISO_TIMESTAMP_START}|{}", self.entry_start))
    }

    /// 번들/고정 경로/PATH 순으로 후보 경로를 나열합니다.
    pub fn candidates(&self, tools_dir: &Path) -> Vec<(PathBuf, ToolOrigin)> {
        let mut out = Vec::new();

        for rel in self.bundled {
            out.push((with_exe_suffix(tools_dir.join(rel)), ToolOrigin::Bundled));
        }
        for abs in self.well_known {
            out.push((PathBuf::from(abs), ToolOrigin::WellKnown));
        }
        if let Some(paths) = std::env::var_os("PATH") {
            for dir in std::env::split_paths(&paths) {
                out.push((with_exe_suffix(dir.join(self.program)), ToolOrigin::SystemPath));
            }
        }

        out
    }
}

fn with_exe_suffix(path: PathBuf) -> PathBuf {
    let suffix = std::env::consts::EXE_SUFFIX;
    if suffix.is_empty() {
        return path;
    }
    let mut os = path.into_os_string();
    os.push(suffix);
    PathBuf::from(os)
}

/// 실행 파일을 찾은 위치
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolOrigin {
    /// 번들 도구 디렉토리
    Bundled,
    /// 알려진 고정 경로
    WellKnown,
    /// 시스템 PATH
    SystemPath,
}

/// 탐색된 실행 파일
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTool {
    /// 실행 파일 경로
    pub path: PathBuf,
    /// 찾은 위치
    pub origin: ToolOrigin,
}

/// `<path> --version`으로 실행 가능 여부를 확인합니다.
///
/// 종료 코드와 무관하게 프로세스가 시간 안에 끝나면 사용 가능으로 봅니다.
pub async fn probe(path: &Path, probe_timeout: Duration) -> bool {
    let child = Command::new(path)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn();

    let mut child = match child {
        Ok(c) => c,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "probe spawn failed");
            return false;
        }
    };

    match timeout(probe_timeout, child.wait()).await {
        Ok(Ok(_status)) => true,
        Ok(Err(e)) => {
            tracing::debug!(path = %path.display(), error = %e, "probe wait failed");
            false
        }
        Err(_) => {
            tracing::debug!(path = %path.display(), "probe timed out");
            false
        }
    }
}

/// 플랫폼 생산자의 실행 파일을 찾고 존재를 확인합니다.
///
/// # Errors
/// 어떤 후보도 확인되지 않으면 안내 문구를 담은 `ToolUnavailable`을 반환합니다.
pub async fn resolve_executable(
    spec: &PlatformSpec,
    tools_dir: &Path,
    probe_timeout: Duration,
) -> Result<ResolvedTool, PipelineError> {
    for (path, origin) in spec.candidates(tools_dir) {
        if !path.is_file() {
            continue;
        }
        if probe(&path, probe_timeout).await {
            tracing::debug!(program = spec.program, path = %path.display(), ?origin, "resolved tool");
            return Ok(ResolvedTool { path, origin });
        }
        tracing::warn!(program = spec.program, path = %path.display(), "tool candidate failed presence probe");
    }

    Err(PipelineError::ToolUnavailable {
        command: spec.program.to_owned(),
        guidance: spec.guidance.to_owned(),
    })
}
