#![no_main]

use std::time::Duration;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use regex::Regex;
use tokio::time::Instant;

use logwarden_log_pipeline::Reassembler;

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    lines: Vec<String>,
    /// 줄 사이 경과 시간 (ms)
    gaps: Vec<u16>,
    max_entry_bytes: u16,
}

fuzz_target!(|input: FuzzInput| {
    let Ok(start) = Regex::new(r"^\d{2}-\d{2}\s+\d{2}:\d{2}:\d{2}\.\d{3}\s") else {
        return;
    };
    let max = usize::from(input.max_entry_bytes).max(1);
    let mut reassembler = Reassembler::new(start, Duration::from_millis(500), max);

    let base = Instant::now();
    let mut elapsed = Duration::ZERO;
    let mut emitted: Vec<String> = Vec::new();

    for (i, line) in input.lines.iter().take(256).enumerate() {
        let gap = input.gaps.get(i).copied().unwrap_or(0);
        elapsed += Duration::from_millis(u64::from(gap));
        let now = base + elapsed;

        if let Some(entry) = reassembler.poll_idle(now) {
            emitted.push(entry);
        }
        emitted.extend(reassembler.push_line(line, now));
    }
    emitted.extend(reassembler.finish());

    // 엔트리마다 그것을 연 줄이 하나씩 있음
    assert!(emitted.len() <= input.lines.len().min(256));
    assert!(!reassembler.has_open_entry());
    assert!(reassembler.finish().is_none());
});
