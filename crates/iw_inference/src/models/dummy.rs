use async_trait::async_trait;
use iw_core::types::NOT_APPLICABLE;
use iw_core::{CompletionModel, CompletionRequest, Result};
use std::fmt;

/// Offline model that answers every prompt with the same text.
pub struct DummyModel {
    reply: String,
}

impl DummyModel {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
        }
    }
}

impl Default for DummyModel {
    fn default() -> Self {
        Self::new(NOT_APPLICABLE)
    }
}

impl fmt::Debug for DummyModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DummyModel").field("reply", &self.reply).finish()
    }
}

#[async_trait]
impl CompletionModel for DummyModel {
    fn name(&self) -> &str {
        "Dummy"
    }

    async fn complete(&self, _request: &CompletionRequest) -> Result<String> {
        Ok(self.reply.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dummy_model() {
        let request = CompletionRequest {
            model: "any".to_string(),
            system_prompt: "Classify this".to_string(),
            max_tokens: 10,
            temperature: 0.0,
        };

        let model = DummyModel::default();
        assert_eq!(model.complete(&request).await.unwrap(), "N/A");

        let model = DummyModel::new("Autonomous Mobility/Accident");
        assert_eq!(
            model.complete(&request).await.unwrap(),
            "Autonomous Mobility/Accident"
        );
    }
}
