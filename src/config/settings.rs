use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub llm: LLMConfig,
    pub summarizer: SummarizerConfig,
    pub upload: UploadConfig,
    pub storage: StorageConfig,
    pub sql: SqlConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    pub model: String,
    pub api_base: String,
    pub max_tokens: Option<u32>,
    pub temperature: f32,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizerConfig {
    pub max_summarize_chars: usize,
    pub max_chars_per_request: usize,
    pub summary_chars_length: usize,
    /// Chunk size below which a context-length failure is no longer retried.
    pub min_chars_per_request: usize,
    pub shrink_factor: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub database_path: String,
    pub table: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqlConfig {
    pub dialect: String,
    pub sample_rows: usize,
    pub max_result_rows: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            llm: LLMConfig {
                model: "gpt-3.5-turbo".to_string(),
                api_base: "https://api.openai.com/v1".to_string(),
                max_tokens: None,
                temperature: 1.0,
                timeout_secs: 120,
            },
            summarizer: SummarizerConfig::default(),
            upload: UploadConfig {
                endpoint: "http://localhost:8001/upload_pdf/".to_string(),
                timeout_secs: 300,
            },
            storage: StorageConfig {
                database_path: "database.db".to_string(),
                table: "books".to_string(),
            },
            sql: SqlConfig {
                dialect: "sqlite".to_string(),
                sample_rows: 3,
                max_result_rows: 50,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            max_summarize_chars: 9000,
            max_chars_per_request: 3000,
            summary_chars_length: 1000,
            min_chars_per_request: 2000,
            shrink_factor: 0.8,
        }
    }
}

impl Settings {
    /// Layer built-in defaults, `config/{CONFIG_ENV}.toml` and `APP__*` env vars.
    pub fn new() -> Result<Self, ConfigError> {
        let config_env = env::var("CONFIG_ENV").unwrap_or_else(|_| "default".to_string());

        let defaults = Config::try_from(&Settings::default())?;

        let config = Config::builder()
            .add_source(defaults)
            .add_source(File::with_name(&format!("config/{}", config_env)).required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?;

        config.try_deserialize()
    }

    /// Read once at startup. A missing key is tolerated here and only
    /// surfaces when a completion request is attempted.
    pub fn api_key() -> Option<String> {
        match env::var("OPENAI_API_KEY") {
            Ok(key) if !key.trim().is_empty() => Some(key),
            _ => {
                tracing::warn!("OPENAI_API_KEY environment variable not set");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let settings = Settings::default();
        assert_eq!(settings.summarizer.max_summarize_chars, 9000);
        assert_eq!(settings.summarizer.max_chars_per_request, 3000);
        assert_eq!(settings.summarizer.summary_chars_length, 1000);
        assert_eq!(settings.summarizer.min_chars_per_request, 2000);
        assert_eq!(settings.storage.table, "books");
        assert_eq!(settings.upload.endpoint, "http://localhost:8001/upload_pdf/");
    }

    #[test]
    fn test_new_falls_back_to_defaults() {
        let settings = Settings::new().unwrap();
        assert_eq!(settings.llm.model, "gpt-3.5-turbo");
        assert_eq!(settings.sql.dialect, "sqlite");
    }
}
