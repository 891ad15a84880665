//! Inference domain: chat completions, embeddings and servable models.
//!
//! Execution is delegated to an [`InferenceProvider`]; without one every
//! unit fails with `PROVIDER_NOT_SET`.

mod commands;
mod provider;
mod queries;
mod types;

pub use commands::{ChatCommand, EmbedCommand};
pub use provider::InferenceProvider;
pub use queries::ModelsQuery;
pub use types::{
    ChatOptions, ChatResponse, EmbeddingResponse, InferenceModel, Message, Role, Usage,
};

use crate::error::{AimaError, Result};
use crate::schema::Schema;
use std::sync::Arc;

pub(crate) const DOMAIN: &str = "inference";

fn require_provider(
    provider: &Option<Arc<dyn InferenceProvider>>,
) -> Result<&Arc<dyn InferenceProvider>> {
    provider.as_ref().ok_or_else(|| AimaError::ProviderNotSet {
        domain: DOMAIN.to_string(),
    })
}

fn usage_schema() -> Schema {
    Schema::object()
        .property("prompt_tokens", Schema::number())
        .property("completion_tokens", Schema::number())
        .property("total_tokens", Schema::number())
}

#[cfg(test)]
pub(crate) mod testing {
    //! Echoing provider for unit tests.

    use super::*;
    use crate::cancel::CancellationToken;
    use crate::model::ModelType;
    use async_trait::async_trait;

    #[derive(Default)]
    pub struct MockInferenceProvider;

    #[async_trait]
    impl InferenceProvider for MockInferenceProvider {
        async fn chat(
            &self,
            model: &str,
            messages: &[Message],
            _options: &ChatOptions,
            cancel: &CancellationToken,
        ) -> Result<ChatResponse> {
            cancel.check()?;
            let last = messages.last().map(|m| m.content.as_str()).unwrap_or("");
            let prompt_tokens: u64 = messages.iter().map(|m| m.content.len() as u64 / 4).sum();
            Ok(ChatResponse {
                content: format!("echo: {}", last),
                finish_reason: "stop".into(),
                usage: Usage::new(prompt_tokens, 3),
                model: model.into(),
                id: "chatcmpl-00000000".into(),
            })
        }

        async fn embed(
            &self,
            _model: &str,
            input: &[String],
            _cancel: &CancellationToken,
        ) -> Result<EmbeddingResponse> {
            Ok(EmbeddingResponse {
                embeddings: input.iter().map(|_| vec![0.1, 0.2]).collect(),
                usage: Usage::new(input.len() as u64, 0),
            })
        }

        async fn list_models(&self, model_type: Option<ModelType>) -> Result<Vec<InferenceModel>> {
            let models = vec![
                InferenceModel {
                    id: "llama3".into(),
                    name: "llama3".into(),
                    model_type: ModelType::Llm,
                    provider: "mock".into(),
                },
                InferenceModel {
                    id: "nomic-embed-text".into(),
                    name: "nomic-embed-text".into(),
                    model_type: ModelType::Embedding,
                    provider: "mock".into(),
                },
            ];
            Ok(models
                .into_iter()
                .filter(|m| model_type.is_none_or(|t| m.model_type == t))
                .collect())
        }
    }
}
