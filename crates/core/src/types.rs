//! 도메인 타입: 시스템 전역에서 사용되는 공통 타입
//!
//! 모든 크레이트가 공유하는 데이터 구조를 정의합니다.
//! 행동(behavior) 정의는 설정 저장소에서 이미 파싱된 형태로 공급되며,
//! 로드 이후에는 불변이고 리로드 시 통째로 교체됩니다.

use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, PipelineError};

/// 로그 생산자 플랫폼
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Android (`adb logcat`)
    Android,
    /// iOS (`idevicesyslog`)
    Ios,
    /// HarmonyOS (`hdc hilog`)
    HarmonyOs,
}

impl Platform {
    /// 지원하는 모든 플랫폼
    pub const ALL: [Platform; 3] = [Platform::Android, Platform::Ios, Platform::HarmonyOs];

    /// 플랫폼 식별자 문자열
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Android => "android",
            Self::Ios => "ios",
            Self::HarmonyOs => "harmonyos",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = s.trim();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(id))
            .ok_or_else(|| PipelineError::UnsupportedPlatform(id.to_owned()))
    }
}

/// 논리 로그 엔트리
///
/// 재조립기가 만든 (여러 줄일 수 있는) 하나의 로그 레코드입니다.
/// 생성 후 매처와 추적기로 전달되고 버려집니다. 저장되지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// 병합된 원문 (연속 줄은 개행으로 연결)
    pub text: String,
    /// 소스 플랫폼
    pub platform: Platform,
    /// 도착 시각
    pub received_at: SystemTime,
}

impl LogEntry {
    /// 현재 시각으로 새 엔트리를 생성합니다.
    pub fn new(text: impl Into<String>, platform: Platform) -> Self {
        Self {
            text: text.into(),
            platform,
            received_at: SystemTime::now(),
        }
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.platform, self.text)
    }
}

/// 추출 필드의 선언 타입
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// JSON 값 (객체/배열/리터럴)
    Json,
    /// 부동소수점 숫자
    Number,
    /// 불리언 ("true", "1", "yes", "on" → true)
    Boolean,
    /// 원문 그대로 (기본값)
    #[default]
    Text,
}

impl DataType {
    /// 타입 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Text => "text",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 값 제약 조건
///
/// 선언된 항목만 적용됩니다. 범위는 모두 양 끝을 포함합니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationRules {
    /// JSON 값에 적용할 JSON Schema 문서
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<serde_json::Value>,
    /// 숫자 최솟값
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// 숫자 최댓값
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// 문자열 최소 길이 (문자 수)
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "minLength")]
    pub min_length: Option<usize>,
    /// 문자열 최대 길이 (문자 수)
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "maxLength")]
    pub max_length: Option<usize>,
}

impl ValidationRules {
    /// 선언된 제약이 하나도 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.schema.is_none()
            && self.min.is_none()
            && self.max.is_none()
            && self.min_length.is_none()
            && self.max_length.is_none()
    }
}

/// 필드 추출기 정의
///
/// 매칭된 엔트리에서 하나의 필드를 캡처합니다.
/// 첫 번째 캡처 그룹이 있으면 그 값을, 없으면 전체 매치를 사용합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractorDefinition {
    /// 추출 필드명
    pub name: String,
    /// 캡처 정규식
    pub pattern: String,
    /// 선언 타입
    #[serde(default, alias = "type", alias = "dataType")]
    pub data_type: DataType,
    /// 값 제약 조건
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationRules>,
}

/// 행동 정의: 관심 대상 로그 패턴에 대한 이름 붙은 규칙
///
/// # 스키마 (YAML)
/// ```yaml
/// name: user_login
/// description: 사용자 로그인 이벤트
/// pattern: "user_behavior: (\\{.*\\})"
/// enabled: true
/// data_type: json
/// validation:
///   schema: { type: object, required: [userId] }
/// extractors:
///   - name: user_id
///     pattern: '"userId":"([^"]+)"'
///     data_type: text
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorDefinition {
    /// 행동 이름 (순서/완료 그룹에서 참조)
    pub name: String,
    /// 설명
    #[serde(default)]
    pub description: String,
    /// 엔트리 매칭 정규식 (대소문자 무시)
    pub pattern: String,
    /// 활성화 여부 (기본값: true)
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// 필드 추출기 목록 (선언 순서대로 실행)
    #[serde(default)]
    pub extractors: Vec<ExtractorDefinition>,
    /// 행동 자체 매치 값에 적용할 제약 조건
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationRules>,
    /// 행동 자체 매치 값의 선언 타입
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        alias = "type",
        alias = "dataType"
    )]
    pub data_type: Option<DataType>,
}

fn default_enabled() -> bool {
    true
}

impl BehaviorDefinition {
    /// 최소 구성의 활성 행동 정의를 만듭니다.
    pub fn new(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            pattern: pattern.into(),
            enabled: true,
            extractors: Vec::new(),
            validation: None,
            data_type: None,
        }
    }

    /// 추출기를 추가합니다.
    pub fn with_extractor(mut self, extractor: ExtractorDefinition) -> Self {
        self.extractors.push(extractor);
        self
    }

    /// 행동 매치 값 자체를 추출 대상으로 삼는지 확인합니다.
    pub fn extracts_match(&self) -> bool {
        self.data_type.is_some() || self.validation.is_some()
    }

    /// 정의의 구조적 유효성을 검증합니다.
    ///
    /// 정규식 컴파일은 여기서 하지 않습니다. 컴파일 실패는 해당 규칙만
    /// 격리하여 건너뛰어야 하므로 매처가 로드 시점에 처리합니다.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "behaviors.name".to_owned(),
                reason: "behavior name must not be empty".to_owned(),
            });
        }

        if self.pattern.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: format!("behaviors[{}].pattern", self.name),
                reason: "pattern must not be empty".to_owned(),
            });
        }

        for extractor in &self.extractors {
            if extractor.name.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: format!("behaviors[{}].extractors.name", self.name),
                    reason: "extractor name must not be empty".to_owned(),
                });
            }
        }

        Ok(())
    }
}

/// 필드 추출 결과
///
/// 추출기는 예외를 던지지 않고 항상 결과를 반환합니다.
/// 실패한 경우 `value`는 `None`이고 `error`에 사유가 담깁니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// 변환된 값 (실패 시 null)
    pub value: Option<serde_json::Value>,
    /// 선언 타입
    pub data_type: DataType,
    /// 캡처된 원문
    pub raw: String,
    /// 실패 사유
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExtractionResult {
    /// 성공 결과를 생성합니다.
    pub fn ok(value: serde_json::Value, data_type: DataType, raw: impl Into<String>) -> Self {
        Self {
            value: Some(value),
            data_type,
            raw: raw.into(),
            error: None,
        }
    }

    /// 실패 결과를 생성합니다.
    pub fn failed(data_type: DataType, raw: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            value: None,
            data_type,
            raw: raw.into(),
            error: Some(error.into()),
        }
    }

    /// 변환과 검증을 모두 통과했는지 확인합니다.
    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_parses_case_insensitively() {
        assert_eq!("android".parse::<Platform>().unwrap(), Platform::Android);
        assert_eq!("iOS".parse::<Platform>().unwrap(), Platform::Ios);
        assert_eq!(
            " HarmonyOS ".parse::<Platform>().unwrap(),
            Platform::HarmonyOs
        );
    }

    #[test]
    fn unknown_platform_is_rejected() {
        let err = "windows".parse::<Platform>().unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedPlatform(ref id) if id == "windows"));
    }

    #[test]
    fn platform_serde_matches_as_str() {
        for platform in Platform::ALL {
            let json = serde_json::to_string(&platform).unwrap();
            assert_eq!(json, format!("\"{}\"", platform.as_str()));
        }
    }

    #[test]
    fn data_type_default_is_text() {
        assert_eq!(DataType::default(), DataType::Text);
    }

    #[test]
    fn behavior_defaults_from_json() {
        let json = r#"{"name":"login","pattern":"login ok"}"#;
        let def: BehaviorDefinition = serde_json::from_str(json).unwrap();
        assert!(def.enabled);
        assert!(def.extractors.is_empty());
        assert!(!def.extracts_match());
        def.validate().unwrap();
    }

    #[test]
    fn extractor_accepts_type_alias() {
        let json = r#"{"name":"uid","pattern":"uid=(\\d+)","type":"number"}"#;
        let ext: ExtractorDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(ext.data_type, DataType::Number);
    }

    #[test]
    fn empty_name_fails_validation() {
        let def = BehaviorDefinition::new("  ", "x");
        assert!(def.validate().is_err());
    }

    #[test]
    fn empty_extractor_name_fails_validation() {
        let def = BehaviorDefinition::new("a", "x").with_extractor(ExtractorDefinition {
            name: String::new(),
            pattern: "y".to_owned(),
            data_type: DataType::Text,
            validation: None,
        });
        assert!(def.validate().is_err());
    }

    #[test]
    fn extraction_result_constructors() {
        let ok = ExtractionResult::ok(serde_json::json!(42.0), DataType::Number, "42");
        assert!(ok.is_valid());
        let failed = ExtractionResult::failed(DataType::Number, "x", "not a number");
        assert!(!failed.is_valid());
        assert!(failed.value.is_none());
    }

    #[test]
    fn validation_rules_emptiness() {
        assert!(ValidationRules::default().is_empty());
        let rules = ValidationRules {
            min: Some(1.0),
            ..Default::default()
        };
        assert!(!rules.is_empty());
    }
}
