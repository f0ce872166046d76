//! 행동 매칭 벤치마크
//!
//! 행동 수에 따른 매칭 비용과 추출기/검증 비용, 재조립 처리량을 측정합니다.

use std::time::Duration;

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use logwarden_core::types::{
    BehaviorDefinition, DataType, ExtractorDefinition, ValidationRules,
};
use logwarden_log_pipeline::{BehaviorMatcher, Reassembler};
use regex::Regex;
use tokio::time::Instant;

const SAMPLE: &str = r#"09-09 10:00:00.123  1234  5678 I Checkout: order_placed {"order_id": 42, "amount": 19.99, "currency": "EUR"}"#;

fn plain_behaviors(count: usize) -> Vec<BehaviorDefinition> {
    (0..count)
        .map(|i| BehaviorDefinition::new(format!("behavior_{i}"), format!("event_{i}\\b")))
        .collect()
}

fn extracting_behavior() -> BehaviorDefinition {
    let mut behavior = BehaviorDefinition::new("order", r"order_placed (\{.*\})")
        .with_extractor(ExtractorDefinition {
            name: "amount".to_owned(),
            pattern: r#""amount":\s*([0-9.]+)"#.to_owned(),
            data_type: DataType::Number,
            validation: Some(ValidationRules {
                min: Some(0.0),
                max: Some(10_000.0),
                ..Default::default()
            }),
        })
        .with_extractor(ExtractorDefinition {
            name: "currency".to_owned(),
            pattern: r#""currency":\s*"([A-Z]{3})""#.to_owned(),
            data_type: DataType::Text,
            validation: Some(ValidationRules {
                min_length: Some(3),
                max_length: Some(3),
                ..Default::default()
            }),
        });
    behavior.data_type = Some(DataType::Json);
    behavior.validation = Some(ValidationRules {
        schema: Some(serde_json::json!({
            "type": "object",
            "required": ["order_id", "amount"]
        })),
        ..Default::default()
    });
    behavior
}

fn bench_behavior_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("behavior_scaling");

    for count in [1usize, 10, 50, 200] {
        let (matcher, diagnostics) = BehaviorMatcher::compile(&plain_behaviors(count), true);
        assert!(diagnostics.is_empty());

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &matcher, |b, matcher| {
            b.iter(|| matcher.evaluate(black_box(SAMPLE)))
        });
    }

    group.finish();
}

fn bench_extraction(c: &mut Criterion) {
    let (matcher, diagnostics) = BehaviorMatcher::compile(&[extracting_behavior()], true);
    assert!(diagnostics.is_empty());

    c.bench_function("extract_json_number_text", |b| {
        b.iter(|| {
            let matches = matcher.evaluate(black_box(SAMPLE));
            assert_eq!(matches.len(), 1);
            matches
        })
    });
}

fn bench_reassembly(c: &mut Criterion) {
    let start = Regex::new(r"^\d{2}-\d{2}\s+\d{2}:\d{2}:\d{2}\.\d{3}\s").unwrap();
    let lines: Vec<String> = (0..1000)
        .map(|i| {
            if i % 5 == 0 {
                format!("09-09 10:00:00.{:03}  1  1 E App: failure {i}", i % 1000)
            } else {
                format!("\tat com.example.Frame{i}.call(Frame.java:{i})")
            }
        })
        .collect();

    let mut group = c.benchmark_group("reassembly");
    group.throughput(Throughput::Elements(lines.len() as u64));
    group.bench_function("stack_traces_1000_lines", |b| {
        b.iter(|| {
            let mut r = Reassembler::new(start.clone(), Duration::from_millis(500), 1 << 20);
            let now = Instant::now();
            let mut entries = 0usize;
            for line in &lines {
                entries += r.push_line(black_box(line), now).len();
            }
            entries + usize::from(r.finish().is_some())
        })
    });
    group.finish();
}

criterion_group!(benches, bench_behavior_scaling, bench_extraction, bench_reassembly);
criterion_main!(benches);
