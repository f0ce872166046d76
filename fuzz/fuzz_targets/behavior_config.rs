#![no_main]

use libfuzzer_sys::fuzz_target;
use logwarden_log_pipeline::rule::BehaviorLoader;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        // 파싱에 성공한 설정은 검증과 그룹 정규화도 크래시 없이 통과해야 함
        for parsed in [
            BehaviorLoader::parse_yaml(text, "fuzz-input.yml"),
            BehaviorLoader::parse_json(text, "fuzz-input.json"),
        ] {
            if let Ok(config) = parsed {
                let _ = config.validate();
                let _ = config.order_groups();
                let _ = config.event_group_specs();
            }
        }
    }
});
