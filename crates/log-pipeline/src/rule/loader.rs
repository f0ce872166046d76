//! 행동 정의 파일 로더: YAML/JSON 파일을 디스크에서 읽고 씁니다.
//!
//! 확장자로 형식을 결정합니다 (`.yml`/`.yaml`은 YAML, 그 외는 JSON).
//! 로딩 실패는 에러로 반환되며, 빈 설정으로 대체할지는 호출자(설정 저장소)가 결정합니다.

use std::path::Path;

use crate::error::LogPipelineError;

use super::types::BehaviorConfig;

const MAX_CONFIG_FILE_SIZE: u64 = 10 * 1024 * 1024; // 10MB
const MAX_BEHAVIORS_COUNT: usize = 10_000;

/// 행동 정의 파일 형식
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML
    Yaml,
    /// JSON
    Json,
}

impl ConfigFormat {
    /// 파일 확장자로 형식을 결정합니다.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yml") || ext.eq_ignore_ascii_case("yaml") => {
                Self::Yaml
            }
            _ => Self::Json,
        }
    }
}

/// 행동 정의 파일 로더
pub struct BehaviorLoader;

impl BehaviorLoader {
    /// 파일에서 행동 설정을 로드합니다.
    ///
    /// # Errors
    /// - 파일이 없거나 읽을 수 없는 경우
    /// - 파일 크기가 제한을 넘는 경우
    /// - 파싱 또는 검증에 실패한 경우
    pub async fn load_file(path: impl AsRef<Path>) -> Result<BehaviorConfig, LogPipelineError> {
        let path = path.as_ref();
        let source = path.display().to_string();

        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| LogPipelineError::BehaviorLoad {
                path: source.clone(),
                reason: format!("failed to read file metadata: {e}"),
            })?;

        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(LogPipelineError::BehaviorLoad {
                path: source,
                reason: format!(
                    "file too large: {} bytes (max: {MAX_CONFIG_FILE_SIZE})",
                    metadata.len()
                ),
            });
        }

        let content =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|e| LogPipelineError::BehaviorLoad {
                    path: source.clone(),
                    reason: format!("failed to read file: {e}"),
                })?;

        let config = Self::parse(&content, ConfigFormat::from_path(path), &source)?;

        tracing::info!(
            path = %source,
            behaviors = config.behaviors.len(),
            order_groups = config.order_groups().len(),
            event_groups = config.event_groups.len(),
            "loaded behavior config"
        );

        Ok(config)
    }

    /// 지정한 형식으로 문자열을 파싱합니다.
    pub fn parse(
        content: &str,
        format: ConfigFormat,
        source: &str,
    ) -> Result<BehaviorConfig, LogPipelineError> {
        match format {
            ConfigFormat::Yaml => Self::parse_yaml(content, source),
            ConfigFormat::Json => Self::parse_json(content, source),
        }
    }

    /// YAML 문자열을 파싱하여 행동 설정을 생성합니다.
    pub fn parse_yaml(yaml_str: &str, source: &str) -> Result<BehaviorConfig, LogPipelineError> {
        let config: BehaviorConfig =
            serde_yaml::from_str(yaml_str).map_err(|e| LogPipelineError::BehaviorLoad {
                path: source.to_owned(),
                reason: format!("YAML parse error: {e}"),
            })?;
        Self::check(config, source)
    }

    /// JSON 문자열을 파싱하여 행동 설정을 생성합니다.
    pub fn parse_json(json_str: &str, source: &str) -> Result<BehaviorConfig, LogPipelineError> {
        let config: BehaviorConfig =
            serde_json::from_str(json_str).map_err(|e| LogPipelineError::BehaviorLoad {
                path: source.to_owned(),
                reason: format!("JSON parse error: {e}"),
            })?;
        Self::check(config, source)
    }

    fn check(config: BehaviorConfig, source: &str) -> Result<BehaviorConfig, LogPipelineError> {
        if config.behaviors.len() > MAX_BEHAVIORS_COUNT {
            return Err(LogPipelineError::BehaviorLoad {
                path: source.to_owned(),
                reason: format!("too many behaviors: max {MAX_BEHAVIORS_COUNT}"),
            });
        }
        config.validate()?;
        Ok(config)
    }

    /// 행동 설정을 파일에 저장합니다.
    ///
    /// 임시 파일에 쓴 뒤 이름을 바꾸므로 읽는 쪽이 반쯤 쓰인 파일을 보지 않습니다.
    pub async fn save_file(
        path: impl AsRef<Path>,
        config: &BehaviorConfig,
    ) -> Result<(), LogPipelineError> {
        let path = path.as_ref();
        let source = path.display().to_string();

        let content = match ConfigFormat::from_path(path) {
            ConfigFormat::Yaml => {
                serde_yaml::to_string(config).map_err(|e| LogPipelineError::BehaviorLoad {
                    path: source.clone(),
                    reason: format!("YAML serialize error: {e}"),
                })?
            }
            ConfigFormat::Json => {
                serde_json::to_string_pretty(config).map_err(|e| {
                    LogPipelineError::BehaviorLoad {
                        path: source.clone(),
                        reason: format!("JSON serialize error: {e}"),
                    }
                })?
            }
        };

        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, path).await?;

        tracing::info!(path = %source, "saved behavior config");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logwarden_core::types::DataType;

    #[test]
    fn format_from_extension() {
        assert_eq!(ConfigFormat::from_path(Path::new("a.yml")), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("a.YAML")), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("config.json")), ConfigFormat::Json);
        assert_eq!(ConfigFormat::from_path(Path::new("noext")), ConfigFormat::Json);
    }

    #[test]
    fn parse_valid_yaml() {
        let yaml = r#"
behaviors:
  - name: login
    pattern: "user_behavior: (\\{.*\\})"
    data_type: json
    extractors:
      - name: user_id
        pattern: '"userId":"([^"]+)"'
event_order:
  - [login, logout]
"#;
        let config = BehaviorLoader::parse_yaml(yaml, "test.yml").unwrap();
        assert_eq!(config.behaviors.len(), 1);
        assert_eq!(config.behaviors[0].data_type, Some(DataType::Json));
        assert_eq!(config.behaviors[0].extractors[0].name, "user_id");
        assert_eq!(config.order_groups().len(), 1);
    }

    #[test]
    fn parse_valid_json() {
        let json = r#"{"behaviors":[{"name":"a","pattern":"x","enabled":false}]}"#;
        let config = BehaviorLoader::parse_json(json, "config.json").unwrap();
        assert!(!config.behaviors[0].enabled);
    }

    #[test]
    fn behaviors_must_be_a_list() {
        let json = r#"{"behaviors":{"name":"a"}}"#;
        let result = BehaviorLoader::parse_json(json, "config.json");
        assert!(matches!(result, Err(LogPipelineError::BehaviorLoad { .. })));
    }

    #[test]
    fn parse_invalid_yaml_returns_error() {
        let result = BehaviorLoader::parse_yaml("not: [valid: yaml: {{{", "bad.yml");
        assert!(result.is_err());
    }

    #[test]
    fn parse_yaml_with_empty_name_fails_validation() {
        let yaml = "behaviors:\n  - name: \"\"\n    pattern: x\n";
        let result = BehaviorLoader::parse_yaml(yaml, "empty.yml");
        assert!(matches!(
            result,
            Err(LogPipelineError::BehaviorValidation { .. })
        ));
    }

    #[tokio::test]
    async fn load_nonexistent_file_returns_error() {
        let result = BehaviorLoader::load_file("/nonexistent/path/behaviors.yml").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn save_then_load_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = BehaviorLoader::parse_json(
            r#"{"behaviors":[{"name":"a","pattern":"x"}],"event_groups":[["a"]]}"#,
            "inline",
        )
        .unwrap();

        BehaviorLoader::save_file(&path, &config).await.unwrap();
        let loaded = BehaviorLoader::load_file(&path).await.unwrap();
        assert_eq!(loaded, config);
    }
}
