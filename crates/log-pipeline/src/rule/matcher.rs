//! 행동 매칭 로직: 정규식 캐싱과 필드 추출
//!
//! [`BehaviorMatcher`]는 행동 정의 목록을 로드 시점에 한 번 컴파일하고,
//! 이후 모든 엔트리를 같은 컴파일 결과로 평가합니다.
//! 컴파일 실패는 해당 행동(또는 추출기)만 격리하고 나머지는 정상 동작합니다.

use std::collections::BTreeMap;

use regex::{Regex, RegexBuilder};

use logwarden_core::types::{BehaviorDefinition, DataType, ExtractionResult, ExtractorDefinition};

use super::extractor::{CompiledRules, extract_field};
use crate::error::LogPipelineError;

/// 행동 자체 매치 값의 추출 결과가 저장되는 키
pub const MATCH_KEY: &str = "_match";

/// 정규식 크기 제한 (ReDoS 완화)
const REGEX_SIZE_LIMIT: usize = 1 << 20;

fn compile_pattern(
    pattern: &str,
    owner: &str,
    case_insensitive: bool,
) -> Result<Regex, LogPipelineError> {
    RegexBuilder::new(pattern)
        .case_insensitive(case_insensitive)
        .size_limit(REGEX_SIZE_LIMIT)
        .build()
        .map_err(|e| LogPipelineError::PatternCompile {
            owner: owner.to_owned(),
            pattern: pattern.to_owned(),
            reason: e.to_string(),
        })
}

/// 첫 번째 캡처 그룹이 있으면 그 값을, 없으면 전체 매치를 반환합니다.
fn capture_raw<'t>(regex: &Regex, text: &'t str) -> Option<&'t str> {
    let caps = regex.captures(text)?;
    caps.get(1)
        .or_else(|| caps.get(0))
        .map(|m| m.as_str())
}

/// 컴파일된 추출기
///
/// 컴파일에 실패한 추출기는 `fault`를 가지며, 매칭 때마다
/// 그 사유가 담긴 실패 결과를 냅니다.
#[derive(Debug)]
pub struct CompiledExtractor {
    definition: ExtractorDefinition,
    regex: Option<Regex>,
    rules: Option<CompiledRules>,
    fault: Option<String>,
}

impl CompiledExtractor {
    fn compile(
        behavior: &str,
        definition: &ExtractorDefinition,
        case_insensitive: bool,
    ) -> (Self, Option<String>) {
        let owner = format!("extractor \"{behavior}.{}\"", definition.name);

        let compiled = compile_pattern(&definition.pattern, &owner, case_insensitive).and_then(
            |regex| {
                let rules = definition
                    .validation
                    .as_ref()
                    .map(|r| CompiledRules::compile(r, &owner))
                    .transpose()?;
                Ok((regex, rules))
            },
        );

        match compiled {
            Ok((regex, rules)) => (
                Self {
                    definition: definition.clone(),
                    regex: Some(regex),
                    rules,
                    fault: None,
                },
                None,
            ),
            Err(e) => {
                let message = e.to_string();
                (
                    Self {
                        definition: definition.clone(),
                        regex: None,
                        rules: None,
                        fault: Some(message.clone()),
                    },
                    Some(message),
                )
            }
        }
    }

    /// 추출기 이름
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    /// 엔트리에서 필드를 추출합니다.
    pub fn extract(&self, text: &str) -> ExtractionResult {
        let data_type = self.definition.data_type;
        if let Some(fault) = &self.fault {
            return ExtractionResult::failed(data_type, "", fault.clone());
        }
        let Some(regex) = &self.regex else {
            return ExtractionResult::failed(data_type, "", "extractor is not compiled");
        };

        match capture_raw(regex, text) {
            Some(raw) => extract_field(raw, data_type, self.rules.as_ref()),
            None => ExtractionResult::failed(
                data_type,
                "",
                format!("pattern did not match: {}", self.definition.pattern),
            ),
        }
    }
}

/// 컴파일된 행동 정의
#[derive(Debug)]
pub struct CompiledBehavior {
    definition: BehaviorDefinition,
    regex: Regex,
    extractors: Vec<CompiledExtractor>,
    match_rules: Option<CompiledRules>,
    match_fault: Option<String>,
}

impl CompiledBehavior {
    /// 행동 정의를 컴파일합니다.
    ///
    /// 행동 패턴 자체가 잘못되면 에러를 반환합니다.
    /// 추출기나 스키마 문제는 격리되어 진단 메시지 목록으로 함께 반환됩니다.
    pub fn compile(
        definition: &BehaviorDefinition,
        case_insensitive: bool,
    ) -> Result<(Self, Vec<String>), LogPipelineError> {
        let owner = format!("behavior \"{}\"", definition.name);
        let regex = compile_pattern(&definition.pattern, &owner, case_insensitive)?;

        let mut diagnostics = Vec::new();

        let mut extractors = Vec::with_capacity(definition.extractors.len());
        for ext in &definition.extractors {
            let (compiled, fault) =
                CompiledExtractor::compile(&definition.name, ext, case_insensitive);
            diagnostics.extend(fault);
            extractors.push(compiled);
        }

        let (match_rules, match_fault) = match definition
            .validation
            .as_ref()
            .map(|r| CompiledRules::compile(r, &owner))
            .transpose()
        {
            Ok(rules) => (rules, None),
            Err(e) => {
                let message = e.to_string();
                diagnostics.push(message.clone());
                (None, Some(message))
            }
        };

        Ok((
            Self {
                definition: definition.clone(),
                regex,
                extractors,
                match_rules,
                match_fault,
            },
            diagnostics,
        ))
    }

    /// 원본 정의
    pub fn definition(&self) -> &BehaviorDefinition {
        &self.definition
    }

    /// 행동 이름
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    /// 활성 상태 여부
    pub fn is_enabled(&self) -> bool {
        self.definition.enabled
    }

    /// 컴파일된 추출기 목록
    pub fn extractors(&self) -> &[CompiledExtractor] {
        &self.extractors
    }

    /// 엔트리를 평가합니다. 비활성 행동은 항상 `None`입니다.
    pub fn evaluate(&self, text: &str) -> Option<BehaviorMatch> {
        if !self.definition.enabled {
            return None;
        }
        let raw_match = capture_raw(&self.regex, text)?;

        let mut extractions = BTreeMap::new();
        for extractor in &self.extractors {
            extractions.insert(extractor.name().to_owned(), extractor.extract(text));
        }

        if self.definition.extracts_match() {
            let data_type = self.definition.data_type.unwrap_or(DataType::Text);
            let result = match &self.match_fault {
                Some(fault) => ExtractionResult::failed(data_type, raw_match, fault.clone()),
                None => extract_field(raw_match, data_type, self.match_rules.as_ref()),
            };
            extractions.insert(MATCH_KEY.to_owned(), result);
        }

        Some(BehaviorMatch {
            behavior: self.definition.clone(),
            extractions,
        })
    }
}

/// 행동 매칭 결과
#[derive(Debug, Clone, PartialEq)]
pub struct BehaviorMatch {
    /// 매칭된 행동 정의
    pub behavior: BehaviorDefinition,
    /// 추출기 이름별 결과 (행동 자체 값은 [`MATCH_KEY`])
    pub extractions: BTreeMap<String, ExtractionResult>,
}

impl BehaviorMatch {
    /// 실패한 추출 결과 수
    pub fn failed_extractions(&self) -> usize {
        self.extractions.values().filter(|r| !r.is_valid()).count()
    }
}

/// 행동 매처: 컴파일된 행동 목록
#[derive(Debug, Default)]
pub struct BehaviorMatcher {
    behaviors: Vec<CompiledBehavior>,
}

impl BehaviorMatcher {
    /// 정의 목록을 컴파일합니다.
    ///
    /// 컴파일에 실패한 행동은 건너뛰고, 모든 격리된 실패는 진단 메시지로 반환됩니다.
    pub fn compile(definitions: &[BehaviorDefinition], case_insensitive: bool) -> (Self, Vec<String>) {
        let mut behaviors = Vec::with_capacity(definitions.len());
        let mut diagnostics = Vec::new();

        for definition in definitions {
            match CompiledBehavior::compile(definition, case_insensitive) {
                Ok((compiled, faults)) => {
                    for fault in &faults {
                        tracing::warn!(behavior = %definition.name, error = %fault, "isolated extractor fault");
                    }
                    diagnostics.extend(faults);
                    behaviors.push(compiled);
                }
                Err(e) => {
                    tracing::warn!(behavior = %definition.name, error = %e, "skipping behavior");
                    diagnostics.push(e.to_string());
                }
            }
        }

        (Self { behaviors }, diagnostics)
    }

    /// 컴파일된 행동 수 (비활성 포함)
    pub fn len(&self) -> usize {
        self.behaviors.len()
    }

    /// 컴파일된 행동이 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.behaviors.is_empty()
    }

    /// 활성 행동 수
    pub fn enabled_count(&self) -> usize {
        self.behaviors.iter().filter(|b| b.is_enabled()).count()
    }

    /// 컴파일된 행동 목록
    pub fn behaviors(&self) -> &[CompiledBehavior] {
        &self.behaviors
    }

    /// 엔트리를 모든 활성 행동에 대해 설정 순서대로 평가합니다.
    ///
    /// 하나가 매칭되어도 멈추지 않습니다.
    pub fn evaluate(&self, text: &str) -> Vec<BehaviorMatch> {
        self.behaviors
            .iter()
            .filter_map(|b| b.evaluate(text))
            .collect()
    }
}
