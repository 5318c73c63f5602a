//! Pipeline settings from flags and the environment.

use clap::Args;
use iw_core::config::{
    ClassifierConfig, InferenceConfig, LoopConfig, PipelineConfig, SourceConfig, StorageConfig,
    DEFAULT_SEARCH_QUERY,
};
use iw_core::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

use crate::duration::HumanDuration;

#[derive(Args, Debug, Clone)]
pub struct Settings {
    /// Classified rows written per bulk update
    #[arg(long, env = "BATCH_SIZE", default_value_t = 10)]
    pub batch_size: usize,

    /// Model attempts per article before falling back to N/A
    #[arg(long, env = "MAX_RETRIES", default_value_t = 3)]
    pub max_retries: u32,

    /// Seconds between model calls; also the retry backoff unit
    #[arg(long, env = "RATE_LIMIT_DELAY", default_value_t = 0.2)]
    pub rate_limit_delay: f64,

    #[arg(long, env = "OPENAI_MODEL_NAME", default_value = "gpt-4o-mini")]
    pub model_name: String,

    #[arg(long, env = "OPENAI_MAX_TOKENS", default_value_t = 200)]
    pub max_tokens: u32,

    #[arg(long, env = "OPENAI_TEMPERATURE", default_value_t = 0.0)]
    pub temperature: f32,

    /// Uncategorized rows loaded per classification step
    #[arg(long, env = "DB_FETCH_LIMIT", default_value_t = 50)]
    pub db_fetch_limit: usize,

    /// Characters of article content sent to the model
    #[arg(long, env = "MAX_CONTENT_LENGTH", default_value_t = 1000)]
    pub max_content_length: usize,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1")]
    pub openai_base_url: String,

    #[arg(long, env = "NEWSDATA_API_KEY", hide_env_values = true)]
    pub newsdata_api_key: Option<String>,

    #[arg(long, env = "NEWSDATA_QUERY", default_value = DEFAULT_SEARCH_QUERY)]
    pub query: String,

    /// Upper bound on result pages followed per window
    #[arg(long, env = "IW_MAX_PAGES", default_value_t = 100)]
    pub max_pages: usize,

    #[arg(long, env = "IW_DATABASE", default_value = "incidents.db")]
    pub database: PathBuf,

    #[arg(long, env = "IW_RUN_LOG", default_value = "cron_log.txt")]
    pub run_log: PathBuf,

    /// HTTP timeout for the news source and the model (e.g. 60s, 2m)
    #[arg(long, env = "IW_REQUEST_TIMEOUT", default_value = "60s")]
    pub request_timeout: HumanDuration,
}

impl Settings {
    /// Build and validate the pipeline configuration for inference backend `model`.
    pub fn to_config(&self, model: &str) -> Result<PipelineConfig> {
        let rate_limit_delay = Duration::try_from_secs_f64(self.rate_limit_delay).map_err(|_| {
            Error::Config(format!("Invalid RATE_LIMIT_DELAY: {}", self.rate_limit_delay))
        })?;
        let timeout = self.request_timeout.0;

        let config = PipelineConfig {
            classifier: ClassifierConfig {
                max_retries: self.max_retries,
                rate_limit_delay,
                model_name: self.model_name.clone(),
                max_tokens: self.max_tokens,
                temperature: self.temperature,
                max_content_length: self.max_content_length,
            },
            inference: InferenceConfig {
                model: model.to_string(),
                api_key: self.openai_api_key.clone(),
                base_url: self.openai_base_url.clone(),
                request_timeout: timeout,
            },
            source: SourceConfig {
                api_key: self.newsdata_api_key.clone(),
                query: self.query.clone(),
                request_timeout: timeout,
                max_pages: self.max_pages,
                ..Default::default()
            },
            storage: StorageConfig {
                database_path: self.database.clone(),
                run_log_path: self.run_log.clone(),
            },
            run: LoopConfig {
                batch_size: self.batch_size,
                db_fetch_limit: self.db_fetch_limit,
                ..Default::default()
            },
        };
        config.validate()?;
        Ok(config)
    }
}
