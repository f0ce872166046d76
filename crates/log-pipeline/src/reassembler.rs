//! 스트림 재조립기: 원시 줄을 논리 로그 엔트리로 묶습니다.
//!
//! 엔트리 시작 패턴에 맞는 줄이 새 엔트리를 열고, 그렇지 않은 줄은
//! 열린 엔트리에 개행으로 이어 붙습니다. 열린 엔트리가 없으면 그 줄 자체가
//! 하나의 엔트리가 됩니다.
//!
//! # 보장
//! - 내용 손실 없음: 모든 비어 있지 않은 줄은 정확히 한 엔트리에 들어갑니다.
//! - 중복 없음: 버퍼는 한 번만 플러시됩니다.
//! - 지연 상한: 유휴 임계값 + 읽기 폴링 주기 안에 열린 버퍼가 플러시됩니다.

use std::time::Duration;

use bytes::Bytes;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::time::{Instant, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::source::{RawLine, StreamKind};

/// 순수 재조립 상태 기계
///
/// I/O와 무관하므로 시간을 직접 넘겨 결정적으로 테스트할 수 있습니다.
#[derive(Debug)]
pub struct Reassembler {
    start: Option<Regex>,
    buffer: Option<String>,
    last_activity: Instant,
    idle_flush: Duration,
    max_entry_bytes: usize,
}

impl Reassembler {
    /// 엔트리 시작 패턴으로 재조립기를 생성합니다.
    pub fn new(start: Regex, idle_flush: Duration, max_entry_bytes: usize) -> Self {
        Self {
            start: Some(start),
            buffer: None,
            last_activity: Instant::now(),
            idle_flush,
            max_entry_bytes,
        }
    }

    /// 시작 패턴 없이 모든 줄을 개별 엔트리로 내보내는 재조립기
    ///
    /// 진단 스트림처럼 다중 줄 병합이 필요 없는 곳에 씁니다.
    pub fn passthrough() -> Self {
        Self {
            start: None,
            buffer: None,
            last_activity: Instant::now(),
            idle_flush: Duration::MAX,
            max_entry_bytes: usize::MAX,
        }
    }

    /// 열린 버퍼가 있는지 확인합니다.
    pub fn has_open_entry(&self) -> bool {
        self.buffer.is_some()
    }

    fn is_start(&self, line: &str) -> bool {
        self.start.as_ref().is_some_and(|re| re.is_match(line))
    }

    /// 줄 하나를 넣고 완성된 엔트리를 반환합니다.
    pub fn push_line(&mut self, line: &str, now: Instant) -> Vec<String> {
        self.last_activity = now;
        let mut out = Vec::new();

        if self.is_start(line) {
            out.extend(self.buffer.take());
            self.buffer = Some(line.to_owned());
            return out;
        }

        match self.buffer.as_mut() {
            Some(buffer) if buffer.len() + 1 + line.len() <= self.max_entry_bytes => {
                buffer.push('\n');
                buffer.push_str(line);
            }
            Some(_) => {
                // 크기 초과: 지금까지를 내보내고 이 줄로 새 버퍼를 연다
                out.extend(self.buffer.take());
                self.buffer = Some(line.to_owned());
            }
            None if line.trim().is_empty() => {}
            None => out.push(line.to_owned()),
        }

        out
    }

    /// 원시 줄을 손실 허용 디코딩하여 넣습니다.
    pub fn push_raw(&mut self, raw: &RawLine) -> Vec<String> {
        self.push_line(&raw.decode(), raw.received_at)
    }

    /// 열린 버퍼가 유휴 임계값을 넘겼으면 플러시합니다.
    pub fn poll_idle(&mut self, now: Instant) -> Option<String> {
        if self.buffer.is_some() && now.saturating_duration_since(self.last_activity) >= self.idle_flush
        {
            return self.buffer.take();
        }
        None
    }

    /// 남은 버퍼를 꺼냅니다. 두 번째 호출부터는 `None`입니다.
    pub fn finish(&mut self) -> Option<String> {
        self.buffer.take()
    }
}

/// 스트림 워커 종료 사유
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEnd {
    /// 스트림 끝 도달 (프로세스 종료 등)
    Eof,
    /// 취소 신호 수신
    Cancelled,
    /// 읽기 오류
    Failed(String),
}

/// 스트림 워커 실행 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    /// 읽은 스트림
    pub stream: StreamKind,
    /// 종료 사유
    pub end: StreamEnd,
    /// 내보낸 엔트리 수
    pub entries: u64,
}

/// 스트림 워커 설정
#[derive(Debug, Clone)]
pub struct StreamWorker {
    /// 읽을 스트림 종류
    pub stream: StreamKind,
    /// 읽기 폴링 주기 (유휴 검사 간격)
    pub read_poll: Duration,
    /// 미완성 줄의 최대 크기
    pub max_line_bytes: usize,
}

impl StreamWorker {
    /// 스트림을 끝까지(또는 취소될 때까지) 읽으며 엔트리를 `on_entry`로 넘깁니다.
    ///
    /// 모든 읽기는 `read_poll`로 시간 제한되고, 매 반복마다 취소 신호를 확인합니다.
    /// 종료 시 남은 버퍼를 정확히 한 번 플러시합니다.
    pub async fn run<R, F>(
        self,
        reader: R,
        mut reassembler: Reassembler,
        cancel: CancellationToken,
        mut on_entry: F,
    ) -> WorkerReport
    where
        R: AsyncRead + Unpin,
        F: FnMut(String),
    {
        let mut reader = BufReader::new(reader);
        let mut buf: Vec<u8> = Vec::new();
        let mut entries = 0u64;

        let mut emit = |entry: String, entries: &mut u64| {
            *entries += 1;
            on_entry(entry);
        };

        let end = loop {
            if cancel.is_cancelled() {
                break StreamEnd::Cancelled;
            }

            // 한 번의 읽기가 max_line_bytes를 넘겨 buf를 키우지 않도록 제한
            let limit = self.max_line_bytes.saturating_sub(buf.len()).max(1) as u64;
            let mut bounded = (&mut reader).take(limit);

            tokio::select! {
                _ = cancel.cancelled() => break StreamEnd::Cancelled,
                result = timeout(self.read_poll, bounded.read_until(b'\n', &mut buf)) => {
                    match result {
                        Ok(Ok(0)) => break StreamEnd::Eof,
                        Ok(Ok(_)) => {
                            // 줄바꿈 없이 끝난 꼬리는 다음 읽기의 EOF 뒤에 플러시
                            if buf.ends_with(b"\n") || buf.len() >= self.max_line_bytes {
                                let raw = RawLine::new(Bytes::from(std::mem::take(&mut buf)), self.stream);
                                for entry in reassembler.push_raw(&raw) {
                                    emit(entry, &mut entries);
                                }
                            }
                        }
                        Ok(Err(e)) => {
                            warn!(stream = %self.stream, error = %e, "stream read failed");
                            break StreamEnd::Failed(e.to_string());
                        }
                        Err(_) => {
                            // 부분적으로 읽은 바이트는 buf에 남아 다음 읽기에서 이어집니다
                            if let Some(entry) = reassembler.poll_idle(Instant::now()) {
                                emit(entry, &mut entries);
                            }
                        }
                    }
                }
            }
        };

        // 줄바꿈 없이 끝난 꼬리 바이트
        if !buf.is_empty() {
            let raw = RawLine::new(Bytes::from(buf), self.stream);
            for entry in reassembler.push_raw(&raw) {
                emit(entry, &mut entries);
            }
        }
        if let Some(entry) = reassembler.finish() {
            emit(entry, &mut entries);
        }

        debug!(stream = %self.stream, ?end, entries, "stream worker finished");
        WorkerReport {
            stream: self.stream,
            end,
            entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn start_pattern() -> Regex {
        Regex::new(r"^\d{2}-\d{2} ").unwrap()
    }

    fn reassembler() -> Reassembler {
        Reassembler::new(start_pattern(), Duration::from_millis(500), 1024 * 1024)
    }

    fn feed(r: &mut Reassembler, lines: &[&str]) -> Vec<String> {
        let now = Instant::now();
        let mut out: Vec<String> = lines.iter().flat_map(|l| r.push_line(l, now)).collect();
        out.extend(r.finish());
        out
    }

    #[test]
    fn continuation_lines_are_merged() {
        let mut r = reassembler();
        let out = feed(
            &mut r,
            &[
                "01-01 first",
                "  at frame 1",
                "  at frame 2",
                "01-01 second",
            ],
        );
        assert_eq!(
            out,
            vec!["01-01 first\n  at frame 1\n  at frame 2", "01-01 second"]
        );
    }

    #[test]
    fn orphan_lines_are_standalone() {
        let mut r = reassembler();
        let out = feed(&mut r, &["orphan one", "orphan two", "01-01 start", "tail"]);
        assert_eq!(out, vec!["orphan one", "orphan two", "01-01 start\ntail"]);
    }

    #[test]
    fn blank_standalone_lines_are_skipped() {
        let mut r = reassembler();
        let out = feed(&mut r, &["", "   ", "text"]);
        assert_eq!(out, vec!["text"]);
    }

    #[test]
    fn idle_buffer_flushes_exactly_once() {
        let mut r = reassembler();
        let t0 = Instant::now();
        assert!(r.push_line("01-01 open", t0).is_empty());

        assert!(r.poll_idle(t0 + Duration::from_millis(100)).is_none());
        assert_eq!(
            r.poll_idle(t0 + Duration::from_millis(600)).as_deref(),
            Some("01-01 open")
        );
        assert!(r.poll_idle(t0 + Duration::from_millis(1200)).is_none());
        assert!(r.finish().is_none());
    }

    #[test]
    fn continuation_refreshes_activity() {
        let mut r = reassembler();
        let t0 = Instant::now();
        r.push_line("01-01 open", t0);
        r.push_line("more", t0 + Duration::from_millis(400));
        assert!(r.poll_idle(t0 + Duration::from_millis(600)).is_none());
        assert!(r.poll_idle(t0 + Duration::from_millis(900)).is_some());
    }

    #[test]
    fn oversized_entry_is_split_without_loss() {
        let mut r = Reassembler::new(start_pattern(), Duration::from_millis(500), 16);
        let out = feed(&mut r, &["01-01 0123456789", "abcdefgh"]);
        assert_eq!(out, vec!["01-01 0123456789", "abcdefgh"]);
    }

    #[test]
    fn passthrough_never_merges() {
        let mut r = Reassembler::passthrough();
        let out = feed(&mut r, &["a", "b"]);
        assert_eq!(out, vec!["a", "b"]);
        assert!(!r.has_open_entry());
    }

    proptest! {
        #[test]
        fn no_start_lines_reproduce_input(lines in proptest::collection::vec("[a-z][a-z ]{0,20}", 0..40)) {
            let mut r = reassembler();
            let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
            let out = feed(&mut r, &refs);
            prop_assert_eq!(out, lines);
        }

        #[test]
        fn reassembly_preserves_content(lines in proptest::collection::vec(
            prop_oneof!["01-01 [a-z]{1,8}", "[a-z]{1,8}"], 0..40)) {
            let mut r = reassembler();
            let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
            let out = feed(&mut r, &refs);
            let rejoined: Vec<String> = out.iter().flat_map(|e| e.split('\n').map(str::to_owned)).collect();
            prop_assert_eq!(rejoined, lines);
        }
    }

    fn worker() -> StreamWorker {
        StreamWorker {
            stream: StreamKind::ProducerStdout,
            read_poll: Duration::from_millis(100),
            max_line_bytes: 1024,
        }
    }

    #[tokio::test]
    async fn worker_flushes_on_eof() {
        let input: &[u8] = b"01-01 a\ncont\n01-01 b";
        let mut got = Vec::new();
        let report = worker()
            .run(input, reassembler(), CancellationToken::new(), |e| got.push(e))
            .await;
        assert_eq!(report.end, StreamEnd::Eof);
        assert_eq!(report.entries, 2);
        assert_eq!(got, vec!["01-01 a\ncont", "01-01 b"]);
    }

    #[tokio::test]
    async fn worker_splits_unterminated_line_at_limit() {
        // 줄바꿈 없이 한 번에 도착한 10 KiB
        let input = vec![b'x'; 10 * 1024];
        let mut got = Vec::new();
        let report = worker()
            .run(input.as_slice(), reassembler(), CancellationToken::new(), |e| got.push(e))
            .await;

        assert_eq!(report.end, StreamEnd::Eof);
        assert_eq!(got.len(), 10);
        assert!(got.iter().all(|e| e.len() == 1024));
        assert_eq!(got.concat().len(), input.len());
    }

    #[tokio::test]
    async fn worker_stops_on_cancel_with_single_flush() {
        let (client, mut server) = tokio::io::duplex(64);
        let cancel = CancellationToken::new();

        use tokio::io::AsyncWriteExt;
        server.write_all(b"01-01 open\n").await.unwrap();

        let handle = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                let mut got = Vec::new();
                let report = worker()
                    .run(client, reassembler(), cancel, |e| got.push(e))
                    .await;
                (report, got)
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        let (report, got) = handle.await.unwrap();
        assert_eq!(report.end, StreamEnd::Cancelled);
        assert_eq!(got, vec!["01-01 open"]);
        drop(server);
    }

    #[tokio::test(start_paused = true)]
    async fn worker_flushes_idle_buffer() {
        let (client, mut server) = tokio::io::duplex(64);
        let cancel = CancellationToken::new();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        use tokio::io::AsyncWriteExt;
        server.write_all(b"01-01 lonely\n").await.unwrap();

        let task = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                worker()
                    .run(client, reassembler(), cancel, move |e| {
                        let _ = tx.send(e);
                    })
                    .await
            })
        };

        // 유휴 임계값(500ms) + 폴링 주기(100ms) 안에 플러시
        let entry = tokio::time::timeout(Duration::from_millis(700), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry, "01-01 lonely");

        cancel.cancel();
        let report = task.await.unwrap();
        assert_eq!(report.entries, 1);
        assert!(rx.try_recv().is_err());
        drop(server);
    }
}
