//! Settings for every pipeline component.
//!
//! Each struct carries its documented defaults in `Default`; the binary
//! overrides them from flags and environment variables and hands the parts to
//! the component constructors.

use std::path::PathBuf;
use std::time::Duration;

use crate::{Error, Result};

pub const DEFAULT_SEARCH_QUERY: &str =
    "ai AND (death OR incident OR accident OR failure OR malfunction OR crash OR error OR kill OR injury)";

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierConfig {
    /// Total attempts per article before falling back to `N/A`.
    pub max_retries: u32,
    /// Pause between articles, and the unit of the linear retry backoff.
    pub rate_limit_delay: Duration,
    pub model_name: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Characters of article content included in the prompt.
    pub max_content_length: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            rate_limit_delay: Duration::from_millis(200),
            model_name: "gpt-4o-mini".to_string(),
            max_tokens: 200,
            temperature: 0.0,
            max_content_length: 1000,
        }
    }
}

#[derive(Clone, PartialEq)]
pub struct InferenceConfig {
    /// Backend name understood by the model factory (`openai` or `dummy`).
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: String,
    pub request_timeout: Duration,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            model: "openai".to_string(),
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl std::fmt::Debug for InferenceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceConfig")
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_deref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

#[derive(Clone, PartialEq)]
pub struct SourceConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub query: String,
    pub language: String,
    pub request_timeout: Duration,
    /// Upper bound on pages followed within one window.
    pub max_pages: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://newsdata.io/api/1/archive".to_string(),
            query: DEFAULT_SEARCH_QUERY.to_string(),
            language: "en".to_string(),
            request_timeout: Duration::from_secs(60),
            max_pages: 100,
        }
    }
}

impl std::fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceConfig")
            .field("api_key", &self.api_key.as_deref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("query", &self.query)
            .field("language", &self.language)
            .field("request_timeout", &self.request_timeout)
            .field("max_pages", &self.max_pages)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StorageConfig {
    pub database_path: PathBuf,
    pub run_log_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("incidents.db"),
            run_log_path: PathBuf::from("cron_log.txt"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoopConfig {
    /// Classified rows written per bulk category update.
    pub batch_size: usize,
    /// Rows loaded per re-classification step.
    pub db_fetch_limit: usize,
    pub batch_pause: Duration,
    pub idle_wait: Duration,
    pub error_backoff: Duration,
    /// How far behind now the default fetch window ends.
    pub window_lag: chrono::Duration,
    pub window_span: chrono::Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            db_fetch_limit: 50,
            batch_pause: Duration::from_secs(2),
            idle_wait: Duration::from_secs(30),
            error_backoff: Duration::from_secs(60),
            window_lag: chrono::Duration::hours(1),
            window_span: chrono::Duration::hours(1),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineConfig {
    pub classifier: ClassifierConfig,
    pub inference: InferenceConfig,
    pub source: SourceConfig,
    pub storage: StorageConfig,
    pub run: LoopConfig,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.classifier.max_retries == 0 {
            return Err(Error::Config("max_retries must be at least 1".to_string()));
        }
        if !(0.0..=2.0).contains(&self.classifier.temperature) {
            return Err(Error::Config(format!(
                "temperature {} is outside 0..=2",
                self.classifier.temperature
            )));
        }
        if self.run.batch_size == 0 || self.run.db_fetch_limit == 0 {
            return Err(Error::Config(
                "batch_size and db_fetch_limit must be positive".to_string(),
            ));
        }
        if self.source.max_pages == 0 {
            return Err(Error::Config("max_pages must be positive".to_string()));
        }
        Ok(())
    }
}
