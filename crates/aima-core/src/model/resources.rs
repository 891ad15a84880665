//! Model domain resources.

use super::store::ModelStore;
use super::types::{ModelFormat, ModelType};
use super::{model_schema, DOMAIN};
use crate::error::{AimaError, Result};
use crate::schema::Schema;
use crate::unit::{to_output, Resource, ResourceFactory, UnitContext};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;

const MODEL_URI_PREFIX: &str = "asms://model/";
pub const COMPATIBILITY_URI: &str = "asms://models/compatibility";

/// Extract the model id from `asms://model/<id>`.
pub fn parse_model_uri(uri: &str) -> Result<&str> {
    match uri.strip_prefix(MODEL_URI_PREFIX) {
        Some(id) if !id.is_empty() && !id.contains('/') => Ok(id),
        _ => Err(AimaError::ResourceNotFound {
            uri: uri.to_string(),
        }),
    }
}

/// A single model record, watchable for status changes.
pub struct ModelResource {
    model_id: String,
    store: Arc<dyn ModelStore>,
}

impl ModelResource {
    pub fn new(model_id: impl Into<String>, store: Arc<dyn ModelStore>) -> Self {
        Self {
            model_id: model_id.into(),
            store,
        }
    }
}

#[async_trait]
impl Resource for ModelResource {
    fn uri(&self) -> String {
        format!("{}{}", MODEL_URI_PREFIX, self.model_id)
    }

    fn domain(&self) -> &str {
        DOMAIN
    }

    fn schema(&self) -> Schema {
        model_schema()
    }

    async fn get(&self, _ctx: &UnitContext) -> Result<Value> {
        let model = self.store.get(&self.model_id).await?;
        to_output(&model)
    }

    fn watchable(&self) -> bool {
        true
    }
}

/// Builds [`ModelResource`]s for `asms://model/*`.
pub struct ModelResourceFactory {
    store: Arc<dyn ModelStore>,
}

impl ModelResourceFactory {
    pub fn new(store: Arc<dyn ModelStore>) -> Self {
        Self { store }
    }
}

impl ResourceFactory for ModelResourceFactory {
    fn pattern(&self) -> &str {
        "asms://model/*"
    }

    fn can_create(&self, uri: &str) -> bool {
        parse_model_uri(uri).is_ok()
    }

    fn create(&self, uri: &str) -> Result<Arc<dyn Resource>> {
        let id = parse_model_uri(uri)?;
        Ok(Arc::new(ModelResource::new(id, self.store.clone())))
    }
}

/// Engine types able to serve each format and model type.
pub fn compatibility_table() -> Value {
    let formats: Map<String, Value> = ModelFormat::ALL
        .iter()
        .map(|f| {
            let engines: &[&str] = match f {
                ModelFormat::Gguf => &["llama.cpp", "ollama"],
                ModelFormat::Safetensors => &["vllm", "transformers"],
                ModelFormat::Onnx => &["onnxruntime"],
                ModelFormat::Tensorrt => &["tensorrt-llm"],
                ModelFormat::Pytorch => &["transformers"],
            };
            (f.as_str().to_string(), json!(engines))
        })
        .collect();

    let types: Map<String, Value> = ModelType::ALL
        .iter()
        .map(|t| {
            let engines: &[&str] = match t {
                ModelType::Llm => &["vllm", "llama.cpp", "ollama", "tensorrt-llm"],
                ModelType::Vlm => &["vllm", "transformers"],
                ModelType::Asr => &["whisper", "transformers"],
                ModelType::Tts => &["transformers"],
                ModelType::Embedding => &["vllm", "ollama", "transformers"],
                ModelType::Diffusion => &["diffusers"],
                ModelType::VideoGen => &["diffusers"],
                ModelType::Detection => &["onnxruntime", "transformers"],
                ModelType::Rerank => &["vllm", "transformers"],
            };
            (t.as_str().to_string(), json!(engines))
        })
        .collect();

    json!({ "formats": formats, "types": types })
}

/// Static `asms://models/compatibility` table.
#[derive(Default)]
pub struct CompatibilityResource;

impl CompatibilityResource {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Resource for CompatibilityResource {
    fn uri(&self) -> String {
        COMPATIBILITY_URI.to_string()
    }

    fn domain(&self) -> &str {
        DOMAIN
    }

    fn schema(&self) -> Schema {
        Schema::object()
            .describe("Engine compatibility by model format and type")
            .property("formats", Schema::object())
            .property("types", Schema::object())
    }

    async fn get(&self, _ctx: &UnitContext) -> Result<Value> {
        Ok(compatibility_table())
    }
}
