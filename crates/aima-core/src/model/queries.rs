//! Model domain queries.

use super::provider::ModelProvider;
use super::store::ModelStore;
use super::types::{ModelFilter, ModelFormat, ModelStatus, ModelType};
use super::{
    model_id_schema, model_schema, require_model_id, require_provider, requirements_schema,
    DOMAIN,
};
use crate::config::ListConfig;
use crate::error::{AimaError, Result};
use crate::schema::Schema;
use crate::unit::{
    decode_input, lenient_int, require_non_empty, to_output, Example, Query, UnitContext,
    UnitDescriptor,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

// ========================================
// model.get
// ========================================

#[derive(Debug, Deserialize)]
struct GetInput {
    #[serde(default)]
    model_id: String,
}

/// Fetch one model record.
pub struct GetQuery {
    store: Arc<dyn ModelStore>,
}

impl GetQuery {
    pub fn new(store: Arc<dyn ModelStore>) -> Self {
        Self { store }
    }
}

impl UnitDescriptor for GetQuery {
    fn name(&self) -> &str {
        "model.get"
    }

    fn domain(&self) -> &str {
        DOMAIN
    }

    fn description(&self) -> &str {
        "Get model details"
    }

    fn input_schema(&self) -> Schema {
        Schema::object()
            .property("model_id", model_id_schema())
            .required(&["model_id"])
    }

    fn output_schema(&self) -> Schema {
        model_schema()
    }

    fn examples(&self) -> Vec<Example> {
        vec![Example::new(
            "Get model details",
            json!({"model_id": "model-1a2b3c4d"}),
            json!({"id": "model-1a2b3c4d", "name": "llama3", "type": "llm", "format": "gguf", "status": "ready"}),
        )]
    }
}

#[async_trait]
impl Query for GetQuery {
    async fn execute(&self, _ctx: &UnitContext, input: Value) -> Result<Value> {
        let input: GetInput = decode_input(DOMAIN, input)?;
        require_model_id(&input.model_id)?;

        let model = self
            .store
            .get(&input.model_id)
            .await
            .map_err(|e| e.context(format!("get model {}", input.model_id)))?;
        to_output(&model)
    }
}

// ========================================
// model.list
// ========================================

#[derive(Debug, Deserialize)]
struct ListInput {
    #[serde(rename = "type", default)]
    model_type: Option<ModelType>,
    #[serde(default)]
    status: Option<ModelStatus>,
    #[serde(default)]
    format: Option<ModelFormat>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default, deserialize_with = "lenient_int")]
    limit: Option<usize>,
    #[serde(default, deserialize_with = "lenient_int")]
    offset: Option<usize>,
}

/// List model records with filters and pagination.
pub struct ListQuery {
    store: Arc<dyn ModelStore>,
}

impl ListQuery {
    pub fn new(store: Arc<dyn ModelStore>) -> Self {
        Self { store }
    }
}

impl UnitDescriptor for ListQuery {
    fn name(&self) -> &str {
        "model.list"
    }

    fn domain(&self) -> &str {
        DOMAIN
    }

    fn description(&self) -> &str {
        "List models"
    }

    fn input_schema(&self) -> Schema {
        Schema::object()
            .property(
                "type",
                Schema::string_enum(ModelType::names()).describe("Filter by model type"),
            )
            .property(
                "status",
                Schema::string_enum(["pending", "pulling", "ready", "error", "verifying"])
                    .describe("Filter by status"),
            )
            .property(
                "format",
                Schema::string_enum(ModelFormat::names()).describe("Filter by format"),
            )
            .property("source", Schema::string().describe("Filter by source"))
            .property(
                "limit",
                Schema::number()
                    .describe("Maximum number of results")
                    .min(1.0)
                    .max(ListConfig::LIST_DEFAULT_LIMIT as f64),
            )
            .property(
                "offset",
                Schema::number().describe("Offset for pagination").min(0.0),
            )
    }

    fn output_schema(&self) -> Schema {
        Schema::object()
            .property("items", Schema::array(model_schema()))
            .property("total", Schema::number())
    }

    fn examples(&self) -> Vec<Example> {
        vec![
            Example::new(
                "List all models",
                json!({}),
                json!({"items": [{"id": "model-1a2b3c4d", "name": "llama3", "type": "llm", "status": "ready"}], "total": 1}),
            ),
            Example::new(
                "List LLM models with limit",
                json!({"type": "llm", "limit": 10}),
                json!({"items": [{"id": "model-1a2b3c4d", "name": "llama3", "type": "llm", "status": "ready"}], "total": 1}),
            ),
        ]
    }
}

#[async_trait]
impl Query for ListQuery {
    async fn execute(&self, _ctx: &UnitContext, input: Value) -> Result<Value> {
        let input: ListInput = decode_input(DOMAIN, input)?;
        let filter = ModelFilter {
            model_type: input.model_type,
            status: input.status,
            format: input.format,
            source: input.source.filter(|s| !s.is_empty()),
            limit: input
                .limit
                .filter(|l| *l > 0)
                .unwrap_or(ListConfig::LIST_DEFAULT_LIMIT),
            offset: input.offset.unwrap_or(0),
        };

        let (items, total) = self
            .store
            .list(&filter)
            .await
            .map_err(|e| e.context("list models"))?;
        Ok(json!({ "items": items, "total": total }))
    }
}

// ========================================
// model.search
// ========================================

#[derive(Debug, Deserialize)]
struct SearchInput {
    #[serde(default)]
    query: String,
    #[serde(default)]
    source: String,
    #[serde(rename = "type", default)]
    model_type: Option<ModelType>,
    #[serde(default, deserialize_with = "lenient_int")]
    limit: Option<usize>,
}

/// Search remote model sources.
pub struct SearchQuery {
    provider: Option<Arc<dyn ModelProvider>>,
}

impl SearchQuery {
    pub fn new(provider: Option<Arc<dyn ModelProvider>>) -> Self {
        Self { provider }
    }
}

impl UnitDescriptor for SearchQuery {
    fn name(&self) -> &str {
        "model.search"
    }

    fn domain(&self) -> &str {
        DOMAIN
    }

    fn description(&self) -> &str {
        "Search models on remote sources"
    }

    fn input_schema(&self) -> Schema {
        Schema::object()
            .property("query", Schema::string().describe("Search query").min_length(1))
            .property(
                "source",
                Schema::string().describe("Source to search (huggingface, ollama)"),
            )
            .property(
                "type",
                Schema::string_enum(ModelType::names()).describe("Filter by model type"),
            )
            .property(
                "limit",
                Schema::number()
                    .describe("Maximum number of results")
                    .min(1.0)
                    .max(ListConfig::LIST_DEFAULT_LIMIT as f64)
                    .default_value(json!(ListConfig::SEARCH_DEFAULT_LIMIT)),
            )
            .required(&["query"])
    }

    fn output_schema(&self) -> Schema {
        Schema::object().property(
            "results",
            Schema::array(
                Schema::object()
                    .property("id", Schema::string())
                    .property("name", Schema::string())
                    .property("type", Schema::string())
                    .property("source", Schema::string())
                    .property("description", Schema::string())
                    .property("downloads", Schema::number())
                    .property("tags", Schema::array(Schema::string())),
            ),
        )
    }

    fn examples(&self) -> Vec<Example> {
        vec![Example::new(
            "Search for llama models",
            json!({"query": "llama", "source": "huggingface", "limit": 5}),
            json!({"results": [{"id": "meta-llama/Llama-3-8B", "name": "meta-llama/Llama-3-8B", "type": "llm", "source": "huggingface", "downloads": 100000}]}),
        )]
    }
}

#[async_trait]
impl Query for SearchQuery {
    async fn execute(&self, _ctx: &UnitContext, input: Value) -> Result<Value> {
        let input: SearchInput = decode_input(DOMAIN, input)?;
        require_non_empty(DOMAIN, "query", &input.query)?;
        let provider = require_provider(&self.provider)?;

        let limit = input
            .limit
            .filter(|l| *l > 0)
            .unwrap_or(ListConfig::SEARCH_DEFAULT_LIMIT);
        let results = provider
            .search(&input.query, &input.source, input.model_type, limit)
            .await
            .map_err(|e| e.context("search models"))?;
        Ok(json!({ "results": results }))
    }
}

// ========================================
// model.estimate_resources
// ========================================

/// Estimate memory/GPU requirements for a model.
///
/// Requirements stored on the record win; otherwise the provider estimates.
pub struct EstimateResourcesQuery {
    store: Arc<dyn ModelStore>,
    provider: Option<Arc<dyn ModelProvider>>,
}

impl EstimateResourcesQuery {
    pub fn new(store: Arc<dyn ModelStore>, provider: Option<Arc<dyn ModelProvider>>) -> Self {
        Self { store, provider }
    }
}

impl UnitDescriptor for EstimateResourcesQuery {
    fn name(&self) -> &str {
        "model.estimate_resources"
    }

    fn domain(&self) -> &str {
        DOMAIN
    }

    fn description(&self) -> &str {
        "Estimate resource requirements for a model"
    }

    fn input_schema(&self) -> Schema {
        Schema::object()
            .property("model_id", model_id_schema())
            .required(&["model_id"])
    }

    fn output_schema(&self) -> Schema {
        requirements_schema()
    }

    fn examples(&self) -> Vec<Example> {
        vec![Example::new(
            "Estimate resources for a model",
            json!({"model_id": "model-1a2b3c4d"}),
            json!({"memory_min": 8000000000u64, "memory_recommended": 16000000000u64, "gpu_type": "NVIDIA RTX 4090"}),
        )]
    }
}

#[async_trait]
impl Query for EstimateResourcesQuery {
    async fn execute(&self, _ctx: &UnitContext, input: Value) -> Result<Value> {
        let input: GetInput = decode_input(DOMAIN, input)?;
        require_model_id(&input.model_id)?;

        let model = self
            .store
            .get(&input.model_id)
            .await
            .map_err(|e| e.context(format!("get model {}", input.model_id)))?;
        if let Some(requirements) = &model.requirements {
            return to_output(requirements);
        }

        let provider = require_provider(&self.provider)?;
        let requirements = provider
            .estimate_resources(&input.model_id)
            .await
            .map_err(|e: AimaError| {
                e.context(format!("estimate resources for model {}", input.model_id))
            })?;
        to_output(&requirements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::testing::MockModelProvider;
    use crate::model::{Model, ModelRequirements, ModelSearchResult};
    use crate::stores::MemoryModelStore;

    async fn seeded_store(n: usize) -> Arc<dyn ModelStore> {
        let store = Arc::new(MemoryModelStore::new());
        for i in 0..n {
            let model_type = if i % 2 == 0 {
                ModelType::Llm
            } else {
                ModelType::Embedding
            };
            let model = Model::new(format!("m{}", i), model_type, ModelFormat::Gguf);
            store.create(&model).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_get_roundtrips_all_fields() {
        let store = seeded_store(0).await;
        let mut model = Model::new("llama3", ModelType::Llm, ModelFormat::Safetensors);
        model.tags = vec!["chat".into()];
        model.checksum = Some("safetensors:7".into());
        store.create(&model).await.unwrap();

        let out = Query::execute(
            &GetQuery::new(store),
            &UnitContext::detached(),
            json!({"model_id": model.id}),
        )
        .await
        .unwrap();
        let back: Model = serde_json::from_value(out).unwrap();
        assert_eq!(back, model);
    }

    #[tokio::test]
    async fn test_get_missing_model() {
        let err = Query::execute(
            &GetQuery::new(seeded_store(0).await),
            &UnitContext::detached(),
            json!({"model_id": "model-deadbeef"}),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), "MODEL_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_list_limit_and_total() {
        let query = ListQuery::new(seeded_store(7).await);
        let ctx = UnitContext::detached();

        let out = Query::execute(&query, &ctx, json!({"limit": 3})).await.unwrap();
        assert_eq!(out["items"].as_array().unwrap().len(), 3);
        assert_eq!(out["total"], 7);

        let out = Query::execute(&query, &ctx, json!({"limit": 3, "offset": 6}))
            .await
            .unwrap();
        assert_eq!(out["items"].as_array().unwrap().len(), 1);
        assert_eq!(out["total"], 7);

        let out = Query::execute(&query, &ctx, json!({"type": "embedding"}))
            .await
            .unwrap();
        assert_eq!(out["total"], 3);
    }

    #[tokio::test]
    async fn test_search_requires_query_and_passes_limit() {
        let provider = MockModelProvider {
            search_results: (0..30)
                .map(|i| ModelSearchResult {
                    id: format!("org/m{}", i),
                    name: format!("org/m{}", i),
                    model_type: ModelType::Llm,
                    source: "huggingface".into(),
                    description: String::new(),
                    downloads: 0,
                    tags: vec![],
                })
                .collect(),
            ..Default::default()
        };
        let query = SearchQuery::new(Some(Arc::new(provider)));
        let ctx = UnitContext::detached();

        let err = Query::execute(&query, &ctx, json!({})).await.unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT");

        let out = Query::execute(&query, &ctx, json!({"query": "m"})).await.unwrap();
        assert_eq!(out["results"].as_array().unwrap().len(), 20);
    }

    #[tokio::test]
    async fn test_estimate_prefers_stored_requirements() {
        let store = seeded_store(0).await;
        let mut model = Model::new("m", ModelType::Llm, ModelFormat::Gguf);
        model.requirements = Some(ModelRequirements {
            memory_min: 1,
            memory_recommended: 2,
            ..Default::default()
        });
        store.create(&model).await.unwrap();

        let provider = MockModelProvider {
            estimate: Some(ModelRequirements {
                memory_min: 100,
                memory_recommended: 200,
                ..Default::default()
            }),
            ..Default::default()
        };
        let query = EstimateResourcesQuery::new(store.clone(), Some(Arc::new(provider)));
        let out = Query::execute(&query, &UnitContext::detached(), json!({"model_id": model.id}))
            .await
            .unwrap();
        assert_eq!(out["memory_min"], 1);

        let bare = Model::new("bare", ModelType::Llm, ModelFormat::Gguf);
        store.create(&bare).await.unwrap();
        let out = Query::execute(&query, &UnitContext::detached(), json!({"model_id": bare.id}))
            .await
            .unwrap();
        assert_eq!(out["memory_min"], 100);
    }
}
