//! 필드 추출기: 타입 변환과 제약 검증
//!
//! 추출은 절대 패닉하거나 에러를 전파하지 않습니다. 변환 실패와 제약 위반은
//! 모두 [`ExtractionResult`]의 `error`로 기록되고, 나머지 추출기는 계속 실행됩니다.
//!
//! # 변환 규칙
//! - `json`: JSON 파싱
//! - `number`: 64비트 부동소수점 (유한값만)
//! - `boolean`: 대소문자 무시 `true`/`1`/`yes`/`on`이면 참, 그 외 거짓
//! - `text`: 그대로

use serde_json::Value;

use logwarden_core::types::{DataType, ExtractionResult, ValidationRules};

use crate::error::LogPipelineError;

/// 로드 시점에 준비된 제약 조건
///
/// JSON Schema는 여기서 한 번만 컴파일됩니다.
pub struct CompiledRules {
    rules: ValidationRules,
    schema: Option<jsonschema::Validator>,
}

impl CompiledRules {
    /// 제약 조건을 컴파일합니다.
    ///
    /// `owner`는 에러 메시지에 쓰일 소유자 이름입니다.
    pub fn compile(rules: &ValidationRules, owner: &str) -> Result<Self, LogPipelineError> {
        let schema = match &rules.schema {
            Some(doc) => Some(jsonschema::validator_for(doc).map_err(|e| {
                LogPipelineError::SchemaCompile {
                    owner: owner.to_owned(),
                    reason: e.to_string(),
                }
            })?),
            None => None,
        };

        Ok(Self {
            rules: rules.clone(),
            schema,
        })
    }

    /// 원본 제약 조건
    pub fn rules(&self) -> &ValidationRules {
        &self.rules
    }

    /// 값이 모든 제약을 만족하는지 검사합니다.
    ///
    /// 실패 시 위반된 경계를 명시한 메시지를 반환합니다.
    pub fn check(&self, value: &Value) -> Result<(), String> {
        if let Some(validator) = &self.schema
            && !validator.is_valid(value)
        {
            let messages: Vec<String> = validator
                .iter_errors(value)
                .map(|e| {
                    let path = e.instance_path.to_string();
                    if path.is_empty() {
                        e.to_string()
                    } else {
                        format!("{path}: {e}")
                    }
                })
                .collect();
            return Err(format!(
                "JSON schema validation failed: {}",
                messages.join("; ")
            ));
        }

        if let Some(n) = value.as_f64() {
            if let Some(min) = self.rules.min
                && n < min
            {
                return Err(format!("value {n} is less than minimum {min}"));
            }
            if let Some(max) = self.rules.max
                && n > max
            {
                return Err(format!("value {n} is greater than maximum {max}"));
            }
        }

        if let Some(s) = value.as_str() {
            let len = s.chars().count();
            if let Some(min) = self.rules.min_length
                && len < min
            {
                return Err(format!("length {len} is less than minimum length {min}"));
            }
            if let Some(max) = self.rules.max_length
                && len > max
            {
                return Err(format!("length {len} is greater than maximum length {max}"));
            }
        }

        Ok(())
    }
}

impl std::fmt::Debug for CompiledRules {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledRules")
            .field("rules", &self.rules)
            .field("has_schema", &self.schema.is_some())
            .finish()
    }
}

/// 원문을 선언 타입으로 변환합니다.
pub fn coerce(raw: &str, data_type: DataType) -> Result<Value, String> {
    match data_type {
        DataType::Json => serde_json::from_str::<Value>(raw.trim())
            .map_err(|e| format!("JSON parse failed: {e}")),
        DataType::Number => {
            let trimmed = raw.trim();
            let n = trimmed
                .parse::<f64>()
                .map_err(|_| format!("cannot convert \"{trimmed}\" to number"))?;
            serde_json::Number::from_f64(n)
                .map(Value::Number)
                .ok_or_else(|| format!("cannot convert \"{trimmed}\" to a finite number"))
        }
        DataType::Boolean => {
            let lowered = raw.trim().to_ascii_lowercase();
            Ok(Value::Bool(matches!(
                lowered.as_str(),
                "true" | "1" | "yes" | "on"
            )))
        }
        DataType::Text => Ok(Value::String(raw.to_owned())),
    }
}

/// 캡처된 원문 하나를 변환하고 검증하여 결과를 만듭니다.
pub fn extract_field(
    raw: &str,
    data_type: DataType,
    rules: Option<&CompiledRules>,
) -> ExtractionResult {
    let value = match coerce(raw, data_type) {
        Ok(v) => v,
        Err(e) => return ExtractionResult::failed(data_type, raw, e),
    };

    if let Some(rules) = rules
        && let Err(e) = rules.check(&value)
    {
        return ExtractionResult::failed(data_type, raw, e);
    }

    ExtractionResult::ok(value, data_type, raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rules(r: ValidationRules) -> CompiledRules {
        CompiledRules::compile(&r, "test").unwrap()
    }

    #[test]
    fn number_coercion_failure_is_recorded() {
        let result = extract_field("not-a-number", DataType::Number, None);
        assert!(!result.is_valid());
        assert!(result.value.is_none());
        assert_eq!(result.raw, "not-a-number");
        assert!(result.error.unwrap().contains("not-a-number"));
    }

    #[test]
    fn number_coercion_accepts_float() {
        let result = extract_field(" 3.5 ", DataType::Number, None);
        assert_eq!(result.value, Some(json!(3.5)));
    }

    #[test]
    fn infinite_number_is_rejected() {
        assert!(coerce("inf", DataType::Number).is_err());
        assert!(coerce("NaN", DataType::Number).is_err());
    }

    #[test]
    fn boolean_membership_is_case_insensitive() {
        for raw in ["true", "TRUE", "1", "Yes", "on"] {
            assert_eq!(coerce(raw, DataType::Boolean).unwrap(), json!(true), "{raw}");
        }
        for raw in ["false", "0", "off", "maybe"] {
            assert_eq!(coerce(raw, DataType::Boolean).unwrap(), json!(false), "{raw}");
        }
    }

    #[test]
    fn json_coercion() {
        let value = coerce(r#"{"userId":"u1","n":2}"#, DataType::Json).unwrap();
        assert_eq!(value["userId"], "u1");
        assert!(coerce("{userId: broken", DataType::Json).is_err());
    }

    #[test]
    fn text_is_unchanged() {
        assert_eq!(coerce(" a b ", DataType::Text).unwrap(), json!(" a b "));
    }

    #[test]
    fn numeric_range_is_inclusive() {
        let r = rules(ValidationRules {
            min: Some(1.0),
            max: Some(10.0),
            ..Default::default()
        });
        assert!(extract_field("1", DataType::Number, Some(&r)).is_valid());
        assert!(extract_field("10", DataType::Number, Some(&r)).is_valid());

        let low = extract_field("0.5", DataType::Number, Some(&r));
        assert!(low.error.unwrap().contains("minimum 1"));
        let high = extract_field("11", DataType::Number, Some(&r));
        assert!(high.error.unwrap().contains("maximum 10"));
    }

    #[test]
    fn string_length_is_inclusive() {
        let r = rules(ValidationRules {
            min_length: Some(2),
            max_length: Some(3),
            ..Default::default()
        });
        assert!(extract_field("ab", DataType::Text, Some(&r)).is_valid());
        assert!(extract_field("한글자", DataType::Text, Some(&r)).is_valid());
        assert!(!extract_field("a", DataType::Text, Some(&r)).is_valid());
        let long = extract_field("abcd", DataType::Text, Some(&r));
        assert!(long.error.unwrap().contains("maximum length 3"));
    }

    #[test]
    fn json_schema_violation_is_recorded() {
        let r = rules(ValidationRules {
            schema: Some(json!({
                "type": "object",
                "required": ["userId"],
                "properties": { "module": { "type": "integer" } }
            })),
            ..Default::default()
        });

        let ok = extract_field(r#"{"userId":"u1","module":43}"#, DataType::Json, Some(&r));
        assert!(ok.is_valid());

        let bad = extract_field(r#"{"module":"x"}"#, DataType::Json, Some(&r));
        assert!(!bad.is_valid());
        assert!(bad.error.unwrap().starts_with("JSON schema validation failed"));
    }

    #[test]
    fn invalid_schema_fails_to_compile() {
        let result = CompiledRules::compile(
            &ValidationRules {
                schema: Some(json!({ "type": "string", "pattern": "([" })),
                ..Default::default()
            },
            "extractor \"x\"",
        );
        assert!(matches!(
            result,
            Err(LogPipelineError::SchemaCompile { .. })
        ));
    }
}
