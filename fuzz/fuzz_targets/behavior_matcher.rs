#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use logwarden_core::types::{BehaviorDefinition, DataType, ExtractorDefinition};
use logwarden_log_pipeline::BehaviorMatcher;

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    /// (이름, 패턴, 추출기 패턴)
    behaviors: Vec<(String, String, Option<String>)>,
    entry: String,
    case_insensitive: bool,
}

fuzz_target!(|input: FuzzInput| {
    let definitions: Vec<BehaviorDefinition> = input
        .behaviors
        .into_iter()
        .take(8)
        .map(|(name, pattern, extractor)| {
            let definition = BehaviorDefinition::new(name, pattern);
            match extractor {
                Some(pattern) => definition.with_extractor(ExtractorDefinition {
                    name: "field".to_owned(),
                    pattern,
                    data_type: DataType::Text,
                    validation: None,
                }),
                None => definition,
            }
        })
        .collect();

    // 잘못된 패턴은 진단으로 격리되고 나머지 행동은 계속 평가되어야 함
    let (matcher, _diagnostics) = BehaviorMatcher::compile(&definitions, input.case_insensitive);
    for matched in matcher.evaluate(&input.entry) {
        assert!(matcher.behaviors().iter().any(|b| b.name() == matched.behavior.name));
    }
});
