//! [`ModelProvider`] and [`InferenceProvider`] backed by a local Ollama daemon.

use super::client::{OllamaClient, OllamaModel, PullStatus};
use crate::cancel::CancellationToken;
use crate::config::ListConfig;
use crate::error::{AimaError, Result};
use crate::ids::generate_id;
use crate::inference::{
    ChatOptions, ChatResponse, EmbeddingResponse, InferenceModel, InferenceProvider, Message,
    Usage,
};
use crate::model::{
    Model, ModelFormat, ModelProvider, ModelRequirements, ModelSearchResult, ModelStatus,
    ModelType, ProgressReporter, PullProgress, PullRequest, VerificationResult,
};
use async_trait::async_trait;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

pub const SOURCE: &str = "ollama";

const GIB: u64 = 1024 * 1024 * 1024;

/// `8B`, `70.6B`, `137M`.
static PARAMETER_SIZE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?i)\s*(\d+(?:\.\d+)?)\s*([bm])?\s*$").expect("parameter size regex must compile")
});

struct CatalogueEntry {
    name: &'static str,
    description: &'static str,
    model_type: ModelType,
    downloads: u64,
}

/// Well-known library models offered by `model.search`; Ollama has no search API.
const CATALOGUE: &[CatalogueEntry] = &[
    CatalogueEntry { name: "llama3", description: "Meta Llama 3 - latest generation of Llama models", model_type: ModelType::Llm, downloads: 1_000_000 },
    CatalogueEntry { name: "llama3.1", description: "Meta Llama 3.1 - improved version with longer context", model_type: ModelType::Llm, downloads: 800_000 },
    CatalogueEntry { name: "mistral", description: "Mistral 7B - efficient and powerful language model", model_type: ModelType::Llm, downloads: 600_000 },
    CatalogueEntry { name: "mixtral", description: "Mixtral 8x7B - mixture of experts model", model_type: ModelType::Llm, downloads: 400_000 },
    CatalogueEntry { name: "codellama", description: "Code Llama - specialized for code generation", model_type: ModelType::Llm, downloads: 300_000 },
    CatalogueEntry { name: "phi3", description: "Microsoft Phi-3 - small but capable model", model_type: ModelType::Llm, downloads: 200_000 },
    CatalogueEntry { name: "gemma", description: "Google Gemma - open model from Google", model_type: ModelType::Llm, downloads: 250_000 },
    CatalogueEntry { name: "qwen2", description: "Alibaba Qwen2 - multilingual model", model_type: ModelType::Llm, downloads: 180_000 },
    CatalogueEntry { name: "llava", description: "LLaVA - vision-language model", model_type: ModelType::Vlm, downloads: 150_000 },
    CatalogueEntry { name: "nomic-embed-text", description: "Nomic embedding model", model_type: ModelType::Embedding, downloads: 100_000 },
    CatalogueEntry { name: "mxbai-embed-large", description: "Large embedding model", model_type: ModelType::Embedding, downloads: 80_000 },
    CatalogueEntry { name: "whisper", description: "OpenAI Whisper - speech recognition", model_type: ModelType::Asr, downloads: 200_000 },
];

/// Ollama model name for a pull: `repo:tag`, `latest` when no tag is given.
pub fn model_name(repo: &str, tag: &str) -> String {
    if !tag.is_empty() && tag != "latest" {
        format!("{}:{}", repo, tag)
    } else if repo.contains(':') {
        repo.to_string()
    } else {
        format!("{}:latest", repo)
    }
}

/// Billions of parameters from Ollama's `parameter_size` detail.
pub fn parse_parameter_size(size: &str) -> Option<f64> {
    let caps = PARAMETER_SIZE.captures(size)?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    match caps.get(2).map(|m| m.as_str().to_ascii_lowercase()) {
        Some(unit) if unit == "m" => Some(value / 1000.0),
        _ => Some(value),
    }
}

/// Memory tiers by parameter count, divided by three for quantized weights.
pub fn estimate_from_details(parameter_size: &str, quantization: &str) -> ModelRequirements {
    let params = parse_parameter_size(parameter_size).unwrap_or(0.0);
    let (mut min, mut recommended) = if params >= 70.0 {
        (40 * GIB, 80 * GIB)
    } else if params >= 30.0 {
        (20 * GIB, 48 * GIB)
    } else if params >= 13.0 {
        (8 * GIB, 16 * GIB)
    } else if params >= 7.0 {
        (4 * GIB, 8 * GIB)
    } else {
        (2 * GIB, 4 * GIB)
    };

    let quantized = !quantization.is_empty()
        && !quantization.eq_ignore_ascii_case("F16")
        && !quantization.eq_ignore_ascii_case("F32");
    if quantized {
        min /= 3;
        recommended /= 3;
    }

    ModelRequirements {
        memory_min: min,
        memory_recommended: recommended,
        gpu_memory: min,
        total_params: (params > 0.0).then(|| (params * 1e9) as u64),
        ..Default::default()
    }
}

/// Model type guessed from an Ollama model name.
fn type_from_name(name: &str) -> ModelType {
    if name.contains("embed") {
        ModelType::Embedding
    } else if name.contains("whisper") {
        ModelType::Asr
    } else if name.contains("llava") {
        ModelType::Vlm
    } else {
        ModelType::Llm
    }
}

/// Pulls through `/api/pull`, inference through `/api/chat` and `/api/embed`.
pub struct OllamaProvider {
    client: OllamaClient,
    /// Pulled models keyed by Ollama name.
    cache: RwLock<HashMap<String, Model>>,
}

impl OllamaProvider {
    pub fn new(client: OllamaClient) -> Self {
        Self {
            client,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn client(&self) -> &OllamaClient {
        &self.client
    }

    /// Ollama name for a model id this provider pulled; anything else is
    /// taken to be a name already.
    async fn resolve_name(&self, model_id: &str) -> String {
        let cache = self.cache.read().await;
        cache
            .iter()
            .find(|(_, m)| m.id == model_id)
            .map(|(name, _)| name.clone())
            .unwrap_or_else(|| model_id.to_string())
    }

    async fn find_tag(&self, name: &str) -> Result<Option<OllamaModel>> {
        let models = self.client.list_models().await?;
        Ok(models
            .into_iter()
            .find(|m| m.name == name || m.name == model_name(name, "")))
    }
}

#[async_trait]
impl ModelProvider for OllamaProvider {
    async fn pull(
        &self,
        request: &PullRequest,
        progress: ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<Model> {
        if !request.source.is_empty() && request.source != SOURCE {
            return Err(AimaError::invalid_input(
                "model",
                format!("unsupported source: {}", request.source),
            ));
        }
        cancel.check()?;

        let name = model_name(&request.repo, &request.tag);
        let mut model = Model::new(&name, type_from_name(&name), ModelFormat::Gguf);
        model.status = ModelStatus::Pulling;
        model.source = SOURCE.to_string();
        info!("Pulling {} from Ollama", name);

        // Layer sizes by digest; the final size is their sum.
        let mut layers: HashMap<String, u64> = HashMap::new();
        let model_id = model.id.clone();
        let result = self
            .client
            .pull(&name, cancel, |status: &PullStatus| {
                if !status.digest.is_empty() && status.total > 0 {
                    layers.insert(status.digest.clone(), status.total);
                }
                let percent = if status.total > 0 {
                    (status.completed as f64 / status.total as f64 * 100.0).min(100.0)
                } else {
                    0.0
                };
                progress.update(PullProgress {
                    model_id: model_id.clone(),
                    status: status.status.clone(),
                    progress: percent,
                    bytes_total: status.total,
                    bytes_done: status.completed,
                    ..Default::default()
                });
            })
            .await;

        let last = match result {
            Ok(last) if last.is_success() => last,
            Ok(last) => {
                let err = AimaError::PullFailed {
                    repo: name.clone(),
                    message: format!("pull ended without success (last status: {})", last.status),
                };
                progress
                    .finish(PullProgress::failed(&model.id, err.to_string()))
                    .await;
                return Err(err);
            }
            Err(e) => {
                warn!("Ollama pull of {} failed: {}", name, e);
                progress
                    .finish(PullProgress::failed(&model.id, e.to_string()))
                    .await;
                return Err(e.context(format!("pull model {}", name)));
            }
        };
        debug!("Ollama pull of {} finished with {}", name, last.status);

        model.status = ModelStatus::Ready;
        model.size = layers.values().sum();
        model.path = format!("ollama://{}", name);
        model.touch();

        self.cache.write().await.insert(name, model.clone());
        progress.finish(PullProgress::completed(&model.id)).await;
        Ok(model)
    }

    async fn search(
        &self,
        query: &str,
        _source: &str,
        model_type: Option<ModelType>,
        limit: usize,
    ) -> Result<Vec<ModelSearchResult>> {
        let limit = if limit == 0 {
            ListConfig::SEARCH_DEFAULT_LIMIT
        } else {
            limit
        };
        let query = query.to_lowercase();

        Ok(CATALOGUE
            .iter()
            .filter(|entry| {
                query.is_empty()
                    || entry.name.to_lowercase().contains(&query)
                    || entry.description.to_lowercase().contains(&query)
            })
            .filter(|entry| model_type.is_none_or(|t| entry.model_type == t))
            .take(limit)
            .map(|entry| ModelSearchResult {
                id: entry.name.to_string(),
                name: entry.name.to_string(),
                model_type: entry.model_type,
                source: SOURCE.to_string(),
                description: entry.description.to_string(),
                downloads: entry.downloads,
                tags: Vec::new(),
            })
            .collect())
    }

    async fn import_local(&self, path: &Path, _auto_detect: bool) -> Result<Model> {
        Err(AimaError::invalid_input(
            "model",
            format!("ollama does not support importing local files: {}", path.display()),
        ))
    }

    async fn verify(&self, model_id: &str, _checksum: Option<&str>) -> Result<VerificationResult> {
        let name = self.resolve_name(model_id).await;
        match self.find_tag(&name).await {
            Ok(Some(_)) => Ok(VerificationResult::valid()),
            Ok(None) => Ok(VerificationResult::invalid(format!(
                "model not found: {}",
                name
            ))),
            Err(e) => Ok(VerificationResult::invalid(format!(
                "ollama not reachable: {}",
                e
            ))),
        }
    }

    async fn estimate_resources(&self, model_id: &str) -> Result<ModelRequirements> {
        let name = self.resolve_name(model_id).await;
        let tag = self
            .find_tag(&name)
            .await
            .map_err(|e| e.context(format!("estimate resources of {}", name)))?
            .ok_or_else(|| AimaError::ModelNotFound {
                model_id: model_id.to_string(),
            })?;

        let mut requirements =
            estimate_from_details(&tag.details.parameter_size, &tag.details.quantization_level);
        if tag.size > 0 {
            requirements.total_bytes = Some(tag.size);
        }
        Ok(requirements)
    }

    async fn forget(&self, model_id: &str) {
        self.cache.write().await.retain(|_, m| m.id != model_id);
    }
}

#[async_trait]
impl InferenceProvider for OllamaProvider {
    async fn chat(
        &self,
        model: &str,
        messages: &[Message],
        options: &ChatOptions,
        cancel: &CancellationToken,
    ) -> Result<ChatResponse> {
        let reply = tokio::select! {
            _ = cancel.cancelled() => return Err(AimaError::Cancelled),
            reply = self.client.chat(model, messages, options) => reply?,
        };

        Ok(ChatResponse {
            content: reply.message.map(|m| m.content).unwrap_or_default(),
            finish_reason: reply
                .done_reason
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| "stop".to_string()),
            usage: Usage::new(reply.prompt_eval_count, reply.eval_count),
            model: if reply.model.is_empty() {
                model.to_string()
            } else {
                reply.model
            },
            id: generate_id("chatcmpl"),
        })
    }

    async fn embed(
        &self,
        model: &str,
        input: &[String],
        cancel: &CancellationToken,
    ) -> Result<EmbeddingResponse> {
        let reply = tokio::select! {
            _ = cancel.cancelled() => return Err(AimaError::Cancelled),
            reply = self.client.embed(model, input) => reply?,
        };

        // Rough four-characters-per-token estimate when the daemon omits counts.
        let prompt_tokens = reply
            .prompt_eval_count
            .unwrap_or_else(|| input.iter().map(|s| s.len() as u64 / 4).sum());
        Ok(EmbeddingResponse {
            embeddings: reply.embeddings,
            usage: Usage::new(prompt_tokens, 0),
        })
    }

    async fn list_models(&self, model_type: Option<ModelType>) -> Result<Vec<InferenceModel>> {
        let models = self
            .client
            .list_models()
            .await
            .map_err(|e| e.context("list ollama models"))?;

        Ok(models
            .into_iter()
            .map(|m| InferenceModel {
                model_type: type_from_name(&m.name),
                id: m.name.clone(),
                name: m.name,
                provider: SOURCE.to_string(),
            })
            .filter(|m| model_type.is_none_or(|t| m.model_type == t))
            .collect())
    }
}
