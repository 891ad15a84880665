//! External-effects contract for the inference domain.

use super::types::{ChatOptions, ChatResponse, EmbeddingResponse, InferenceModel, Message};
use crate::cancel::CancellationToken;
use crate::error::Result;
use crate::model::ModelType;
use async_trait::async_trait;

/// Runs inference against a serving backend.
#[async_trait]
pub trait InferenceProvider: Send + Sync {
    async fn chat(
        &self,
        model: &str,
        messages: &[Message],
        options: &ChatOptions,
        cancel: &CancellationToken,
    ) -> Result<ChatResponse>;

    async fn embed(
        &self,
        model: &str,
        input: &[String],
        cancel: &CancellationToken,
    ) -> Result<EmbeddingResponse>;

    /// Models available for inference, optionally restricted to one type.
    async fn list_models(&self, model_type: Option<ModelType>) -> Result<Vec<InferenceModel>>;
}
