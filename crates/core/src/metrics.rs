//! 메트릭 상수
//!
//! 모든 메트릭의 이름을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()` 매크로를 호출합니다.
//! 레코더가 설치되지 않은 경우 모든 호출은 no-op입니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `logwarden_`
//! - 접미어: `_total` (counter)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(logwarden_core::metrics::ENTRIES_REASSEMBLED_TOTAL).increment(1);
//! ```

/// 플랫폼 레이블 키 (android, ios, harmonyos)
pub const LABEL_PLATFORM: &str = "platform";

/// 행동 이름 레이블 키
pub const LABEL_BEHAVIOR: &str = "behavior";

/// 재조립된 논리 엔트리 수 (counter, label: platform)
pub const ENTRIES_REASSEMBLED_TOTAL: &str = "logwarden_entries_reassembled_total";

/// 행동 매칭 수 (counter, label: behavior)
pub const BEHAVIORS_TRIGGERED_TOTAL: &str = "logwarden_behaviors_triggered_total";

/// 타입 변환/제약 검증 실패 수 (counter)
pub const EXTRACTION_FAILURES_TOTAL: &str = "logwarden_extraction_failures_total";

/// 순서 그룹 위반 수 (counter)
pub const ORDER_VIOLATIONS_TOTAL: &str = "logwarden_order_violations_total";

/// 완료된 이벤트 그룹 수 (counter)
pub const GROUPS_COMPLETED_TOTAL: &str = "logwarden_groups_completed_total";

/// 발행된 진단 메시지 수 (counter)
pub const DIAGNOSTICS_TOTAL: &str = "logwarden_diagnostics_total";

/// 강제 종료로 이어진 프로세스 종료 타임아웃 수 (counter)
pub const PROCESS_KILL_ESCALATIONS_TOTAL: &str = "logwarden_process_kill_escalations_total";

/// 모든 메트릭의 설명을 등록합니다.
///
/// 레코더 설치 직후 한 번 호출합니다.
pub fn describe_all() {
    use metrics::describe_counter;

    describe_counter!(
        ENTRIES_REASSEMBLED_TOTAL,
        "Logical log entries produced by stream reassembly"
    );
    describe_counter!(
        BEHAVIORS_TRIGGERED_TOTAL,
        "Behavior definitions matched, per behavior"
    );
    describe_counter!(
        EXTRACTION_FAILURES_TOTAL,
        "Field extractions that failed coercion or validation"
    );
    describe_counter!(
        ORDER_VIOLATIONS_TOTAL,
        "Order group violations reported"
    );
    describe_counter!(GROUPS_COMPLETED_TOTAL, "Event groups completed");
    describe_counter!(DIAGNOSTICS_TOTAL, "System diagnostics emitted");
    describe_counter!(
        PROCESS_KILL_ESCALATIONS_TOTAL,
        "Source processes force-killed after graceful termination timed out"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_names_share_prefix() {
        for name in [
            ENTRIES_REASSEMBLED_TOTAL,
            BEHAVIORS_TRIGGERED_TOTAL,
            EXTRACTION_FAILURES_TOTAL,
            ORDER_VIOLATIONS_TOTAL,
            GROUPS_COMPLETED_TOTAL,
            DIAGNOSTICS_TOTAL,
            PROCESS_KILL_ESCALATIONS_TOTAL,
        ] {
            assert!(name.starts_with("logwarden_"));
            assert!(name.ends_with("_total"));
        }
    }

    #[test]
    fn describe_all_without_recorder_is_noop() {
        describe_all();
    }
}
