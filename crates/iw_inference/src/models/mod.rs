use iw_core::config::InferenceConfig;
use iw_core::{CompletionModel, Error, Result};
use std::sync::Arc;

pub mod dummy;
pub mod openai;

pub use dummy::DummyModel;
pub use openai::OpenAiModel;

/// Build the completion backend named by `config.model`.
pub fn create_model(config: &InferenceConfig) -> Result<Arc<dyn CompletionModel>> {
    match config.model.to_lowercase().as_str() {
        "openai" => {
            let model = OpenAiModel::new(config)?;
            tracing::info!(base_url = %config.base_url, "using OpenAI-compatible model");
            Ok(Arc::new(model))
        }
        "dummy" => {
            tracing::warn!("using dummy model, every gated article will be N/A");
            Ok(Arc::new(DummyModel::default()))
        }
        other => Err(Error::Config(format!(
            "Unknown model backend: {}. Available: openai, dummy",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_model_by_name() {
        let config = InferenceConfig {
            model: "dummy".to_string(),
            ..Default::default()
        };
        assert_eq!(create_model(&config).unwrap().name(), "Dummy");

        let config = InferenceConfig {
            model: "OpenAI".to_string(),
            api_key: Some("test-key".to_string()),
            ..Default::default()
        };
        assert_eq!(create_model(&config).unwrap().name(), "OpenAI");

        let config = InferenceConfig {
            model: "ollama".to_string(),
            ..Default::default()
        };
        assert!(create_model(&config).is_err());
    }
}
