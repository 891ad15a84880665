//! Routes model operations to the provider responsible for a source.

use super::huggingface::is_huggingface_source;
use crate::cancel::CancellationToken;
use crate::error::{AimaError, Result};
use crate::model::{
    Model, ModelProvider, ModelRequirements, ModelSearchResult, ModelType, ProgressReporter,
    PullRequest, VerificationResult,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    HuggingFace,
    Ollama,
}

/// A [`ModelProvider`] that dispatches on `source`.
///
/// - `""`, `huggingface`, `hf` go to the HuggingFace provider
/// - `ollama` goes to the Ollama provider when one is configured
///
/// Local imports go to the HuggingFace provider. Verification and estimation
/// follow the provider that produced the model id.
pub struct SourceRouter {
    huggingface: Arc<dyn ModelProvider>,
    ollama: Option<Arc<dyn ModelProvider>>,
    origins: RwLock<HashMap<String, Origin>>,
}

impl SourceRouter {
    pub fn new(huggingface: Arc<dyn ModelProvider>) -> Self {
        Self {
            huggingface,
            ollama: None,
            origins: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_ollama(mut self, ollama: Arc<dyn ModelProvider>) -> Self {
        self.ollama = Some(ollama);
        self
    }

    fn route(&self, source: &str) -> Result<(Origin, &Arc<dyn ModelProvider>)> {
        if is_huggingface_source(source) {
            return Ok((Origin::HuggingFace, &self.huggingface));
        }
        match (source, &self.ollama) {
            ("ollama", Some(ollama)) => Ok((Origin::Ollama, ollama)),
            ("ollama", None) => Err(AimaError::invalid_input(
                "model",
                "ollama source is not configured",
            )),
            _ => Err(AimaError::invalid_input(
                "model",
                format!("unsupported source: {}", source),
            )),
        }
    }

    async fn provider_for(&self, model_id: &str) -> &Arc<dyn ModelProvider> {
        match self.origins.read().await.get(model_id) {
            Some(Origin::Ollama) => self.ollama.as_ref().unwrap_or(&self.huggingface),
            _ => &self.huggingface,
        }
    }

    async fn remember(&self, model: &Model, origin: Origin) {
        self.origins.write().await.insert(model.id.clone(), origin);
    }
}

#[async_trait]
impl ModelProvider for SourceRouter {
    async fn pull(
        &self,
        request: &PullRequest,
        progress: ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<Model> {
        let (origin, provider) = self.route(&request.source)?;
        debug!("Routing pull of {} to {:?}", request.repo, origin);
        let model = provider.pull(request, progress, cancel).await?;
        self.remember(&model, origin).await;
        Ok(model)
    }

    async fn search(
        &self,
        query: &str,
        source: &str,
        model_type: Option<ModelType>,
        limit: usize,
    ) -> Result<Vec<ModelSearchResult>> {
        let (_, provider) = self.route(source)?;
        provider.search(query, source, model_type, limit).await
    }

    async fn import_local(&self, path: &Path, auto_detect: bool) -> Result<Model> {
        let model = self.huggingface.import_local(path, auto_detect).await?;
        self.remember(&model, Origin::HuggingFace).await;
        Ok(model)
    }

    async fn verify(&self, model_id: &str, checksum: Option<&str>) -> Result<VerificationResult> {
        self.provider_for(model_id)
            .await
            .verify(model_id, checksum)
            .await
    }

    async fn estimate_resources(&self, model_id: &str) -> Result<ModelRequirements> {
        self.provider_for(model_id)
            .await
            .estimate_resources(model_id)
            .await
    }

    async fn forget(&self, model_id: &str) {
        self.provider_for(model_id).await.forget(model_id).await;
        self.origins.write().await.remove(model_id);
    }
}
