//! Runtime configuration. Every section has defaults matching the hosted
//! deployment; credentials come from the CLI flags or their env variables.

use crate::{ConfigError, RetrievalOptions};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

pub const DEFAULT_SOURCE: &str = "knowledge_base/nabh_standards_guide.pdf";
pub const DEFAULT_GREETING: &str =
    "Hello! I'm your Medi-Chat assistant. How can I help you with your medical questions today?";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub openai: OpenAiConfig,
    pub supabase: SupabaseConfig,
    pub retrieval: RetrievalOptions,
    pub ingestion: IngestionConfig,
    pub pipeline: PipelineConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub base_url: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub temperature: f32,
    pub request_timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            chat_model: "gpt-3.5-turbo".to_string(),
            embedding_model: "text-embedding-ada-002".to_string(),
            temperature: 1.0,
            request_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupabaseConfig {
    pub url: Option<String>,
    #[serde(skip_serializing)]
    pub key: Option<String>,
    pub table_name: String,
    pub query_name: String,
    pub request_timeout_secs: u64,
}

impl Default for SupabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            key: None,
            table_name: "documents".to_string(),
            query_name: "match_documents".to_string(),
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    pub source: String,
    pub min_chunk_chars: usize,
    /// Per-request limit when the source is fetched over HTTP.
    pub fetch_timeout_secs: u64,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            source: DEFAULT_SOURCE.to_string(),
            min_chunk_chars: 20,
            fetch_timeout_secs: 60,
        }
    }
}

impl IngestionConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// `0` disables the per-stage timeout.
    pub stage_timeout_secs: u64,
    pub standalone_template: Option<String>,
    pub answer_template: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stage_timeout_secs: 60,
            standalone_template: None,
            answer_template: None,
        }
    }
}

impl PipelineConfig {
    pub fn stage_timeout(&self) -> Option<Duration> {
        (self.stage_timeout_secs > 0).then(|| Duration::from_secs(self.stage_timeout_secs))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub greeting: Option<String>,
    pub max_input_chars: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            greeting: Some(DEFAULT_GREETING.to_string()),
            max_input_chars: 500,
        }
    }
}

impl AppConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Checks configured values. Outside offline mode the hosted embedding
    /// service and vector table credentials must be present.
    pub fn validate(&self, offline: bool) -> Result<(), ConfigError> {
        if self.retrieval.top_k == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retrieval.top_k",
                details: "must be at least 1".to_string(),
            });
        }
        if let Some(threshold) = self.retrieval.score_threshold {
            if !(-1.0..=1.0).contains(&threshold) {
                return Err(ConfigError::InvalidValue {
                    field: "retrieval.score_threshold",
                    details: format!("{threshold} is outside [-1, 1]"),
                });
            }
        }
        if self.ingestion.source.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "ingestion.source",
                details: "must not be empty".to_string(),
            });
        }
        if self.ingestion.fetch_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "ingestion.fetch_timeout_secs",
                details: "must be at least 1".to_string(),
            });
        }
        parse_url("openai.base_url", &self.openai.base_url)?;
        if offline {
            return Ok(());
        }
        if is_blank(&self.openai.api_key) {
            return Err(ConfigError::MissingCredential("OPENAI_API_KEY"));
        }
        match &self.supabase.url {
            Some(url) => {
                parse_url("supabase.url", url)?;
            }
            None => return Err(ConfigError::MissingCredential("SUPABASE_URL")),
        }
        if is_blank(&self.supabase.key) {
            return Err(ConfigError::MissingCredential("SUPABASE_ANON_KEY"));
        }
        Ok(())
    }
}

pub fn parse_url(field: &'static str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw.trim()).map_err(|source| ConfigError::InvalidUrl { field, source })
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |value| value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn credentialed() -> AppConfig {
        let mut config = AppConfig::default();
        config.openai.api_key = Some("sk-test".to_string());
        config.supabase.url = Some("https://demo.supabase.co".to_string());
        config.supabase.key = Some("anon".to_string());
        config
    }

    #[test]
    fn defaults_match_hosted_deployment() {
        let config = AppConfig::default();
        assert_eq!(config.supabase.table_name, "documents");
        assert_eq!(config.supabase.query_name, "match_documents");
        assert_eq!(config.retrieval.top_k, 4);
        assert_eq!(config.ingestion.min_chunk_chars, 20);
        assert_eq!(config.ingestion.fetch_timeout(), Duration::from_secs(60));
        assert_eq!(config.session.max_input_chars, 500);
        assert_eq!(config.pipeline.stage_timeout(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn zero_fetch_timeout_is_rejected() {
        let mut config = credentialed();
        config.ingestion.fetch_timeout_secs = 0;
        assert!(matches!(
            config.validate(true),
            Err(ConfigError::InvalidValue {
                field: "ingestion.fetch_timeout_secs",
                ..
            })
        ));
    }

    #[test]
    fn missing_openai_key_is_rejected() {
        let mut config = credentialed();
        config.openai.api_key = Some("  ".to_string());
        assert!(matches!(
            config.validate(false),
            Err(ConfigError::MissingCredential("OPENAI_API_KEY"))
        ));
    }

    #[test]
    fn offline_mode_does_not_need_credentials() {
        let mut config = credentialed();
        config.openai.api_key = None;
        config.supabase.url = None;
        config.supabase.key = None;
        assert!(config.validate(true).is_ok());
        assert!(config.validate(false).is_err());
    }

    #[test]
    fn zero_top_k_is_rejected() {
        let mut config = credentialed();
        config.retrieval.top_k = 0;
        assert!(matches!(
            config.validate(false),
            Err(ConfigError::InvalidValue { field: "retrieval.top_k", .. })
        ));
    }

    #[test]
    fn malformed_supabase_url_fails_validation() {
        let mut config = credentialed();
        config.supabase.url = Some("demo.supabase.co".to_string());
        assert!(matches!(
            config.validate(false),
            Err(ConfigError::InvalidUrl { field: "supabase.url", .. })
        ));
    }

    #[test]
    fn bad_url_reports_field() {
        let result = parse_url("SUPABASE_URL", "not a url");
        assert!(matches!(result, Err(ConfigError::InvalidUrl { field: "SUPABASE_URL", .. })));
    }

    #[test]
    fn partial_json_file_keeps_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let mut file = tempfile::NamedTempFile::new()?;
        write!(
            file,
            r#"{{ "retrieval": {{ "top_k": 6, "score_threshold": 0.75 }}, "pipeline": {{ "stage_timeout_secs": 0 }} }}"#
        )?;

        let config = AppConfig::from_json_file(file.path())?;

        assert_eq!(config.retrieval.top_k, 6);
        assert_eq!(config.retrieval.score_threshold, Some(0.75));
        assert_eq!(config.pipeline.stage_timeout(), None);
        assert_eq!(config.supabase.table_name, "documents");
        assert_eq!(config.openai.chat_model, "gpt-3.5-turbo");
        Ok(())
    }
}
