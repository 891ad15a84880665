//! Catalog domain queries.

use super::events;
use super::store::RecipeStore;
use super::types::{score_recipe, HardwareProfile, MatchResult, ModelReadiness, RecipeFilter};
use super::{recipe_id_schema, recipe_schema, require_recipe_id, EngineAssets, DOMAIN};
use crate::config::ListConfig;
use crate::error::Result;
use crate::events::{noop_publisher, EventPublisher};
use crate::model::{ModelFilter, ModelStatus, ModelStore};
use crate::schema::Schema;
use crate::unit::{decode_input, lenient_int, to_output, Example, Query, UnitContext, UnitDescriptor};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

// ========================================
// catalog.match
// ========================================

#[derive(Debug, Deserialize)]
struct MatchInput {
    #[serde(default)]
    gpu_vendor: String,
    #[serde(default)]
    gpu_model: String,
    #[serde(default)]
    gpu_arch: String,
    #[serde(default, deserialize_with = "lenient_int")]
    vram_gb: Option<u32>,
    #[serde(default, deserialize_with = "lenient_int")]
    vram_min_gb: Option<u32>,
    #[serde(default)]
    os: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default, deserialize_with = "lenient_int")]
    limit: Option<usize>,
}

/// Rank stored recipes against the caller's hardware.
pub struct MatchQuery {
    store: Arc<dyn RecipeStore>,
    events: Arc<dyn EventPublisher>,
}

impl MatchQuery {
    pub fn new(store: Arc<dyn RecipeStore>) -> Self {
        Self {
            store,
            events: noop_publisher(),
        }
    }

    pub fn with_events(mut self, events: Arc<dyn EventPublisher>) -> Self {
        self.events = events;
        self
    }

    /// Score, drop zero scores, sort descending (stable) and truncate.
    pub async fn find(
        &self,
        profile: &HardwareProfile,
        tags: Vec<String>,
        limit: usize,
    ) -> Result<Vec<MatchResult>> {
        let filter = RecipeFilter {
            tags,
            ..Default::default()
        };
        let (recipes, _) = self.store.list(&filter).await?;

        let mut results: Vec<MatchResult> = recipes
            .into_iter()
            .filter_map(|recipe| {
                let score = score_recipe(&recipe, profile);
                (score > 0).then_some(MatchResult { recipe, score })
            })
            .collect();
        results.sort_by(|a, b| b.score.cmp(&a.score));
        results.truncate(limit);
        Ok(results)
    }
}

impl UnitDescriptor for MatchQuery {
    fn name(&self) -> &str {
        "catalog.match"
    }

    fn domain(&self) -> &str {
        DOMAIN
    }

    fn description(&self) -> &str {
        "Match recipes to a hardware profile"
    }

    fn input_schema(&self) -> Schema {
        Schema::object()
            .property("gpu_vendor", Schema::string().describe("GPU vendor (NVIDIA, AMD, Apple)"))
            .property("gpu_model", Schema::string().describe("GPU model, e.g. RTX 4090"))
            .property("gpu_arch", Schema::string().describe("GPU architecture"))
            .property("vram_gb", Schema::number().describe("Available VRAM in GB").min(0.0))
            .property("vram_min_gb", Schema::number().describe("Alias of vram_gb").min(0.0))
            .property("os", Schema::string().describe("Operating system"))
            .property("tags", Schema::array(Schema::string()).describe("Only recipes with any of these tags"))
            .property(
                "limit",
                Schema::number()
                    .describe("Maximum results; values above 50 are clamped")
                    .min(1.0)
                    .default_value(json!(ListConfig::MATCH_DEFAULT_LIMIT)),
            )
    }

    fn output_schema(&self) -> Schema {
        Schema::object().property(
            "recipes",
            Schema::array(
                Schema::object()
                    .property("recipe", recipe_schema())
                    .property("score", Schema::number()),
            ),
        )
    }

    fn examples(&self) -> Vec<Example> {
        vec![Example::new(
            "Match an RTX 4090 workstation",
            json!({"gpu_vendor": "NVIDIA", "gpu_model": "RTX 4090", "vram_gb": 24, "os": "linux"}),
            json!({"recipes": [{"recipe": {"id": "recipe-1a2b3c4d", "name": "llama3-8b-rtx4090"}, "score": 85}]}),
        )]
    }
}

#[async_trait]
impl Query for MatchQuery {
    async fn execute(&self, ctx: &UnitContext, input: Value) -> Result<Value> {
        let input: MatchInput = decode_input(DOMAIN, input)?;
        let profile = HardwareProfile {
            gpu_vendor: input.gpu_vendor,
            gpu_model: input.gpu_model,
            gpu_arch: input.gpu_arch,
            vram_min_gb: input.vram_gb.or(input.vram_min_gb).unwrap_or(0),
            os: input.os,
            ..Default::default()
        };
        let limit = input
            .limit
            .filter(|l| *l > 0)
            .unwrap_or(ListConfig::MATCH_DEFAULT_LIMIT)
            .min(ListConfig::MATCH_MAX_LIMIT);

        let results = self
            .find(&profile, input.tags, limit)
            .await
            .map_err(|e| e.context("match recipes"))?;
        debug!("Matched {} recipes for {:?}", results.len(), profile.gpu_model);

        for result in &results {
            self.events.emit(events::recipe_matched(
                &result.recipe.id,
                &profile,
                result.score,
                &ctx.request_id,
            ));
        }
        Ok(json!({ "recipes": results }))
    }
}

// ========================================
// catalog.get
// ========================================

#[derive(Debug, Deserialize)]
struct GetInput {
    #[serde(default)]
    recipe_id: String,
}

/// Fetch one recipe.
pub struct GetQuery {
    store: Arc<dyn RecipeStore>,
}

impl GetQuery {
    pub fn new(store: Arc<dyn RecipeStore>) -> Self {
        Self { store }
    }
}

impl UnitDescriptor for GetQuery {
    fn name(&self) -> &str {
        "catalog.get"
    }

    fn domain(&self) -> &str {
        DOMAIN
    }

    fn description(&self) -> &str {
        "Get recipe details"
    }

    fn input_schema(&self) -> Schema {
        Schema::object()
            .property("recipe_id", recipe_id_schema())
            .required(&["recipe_id"])
    }

    fn output_schema(&self) -> Schema {
        recipe_schema()
    }
}

#[async_trait]
impl Query for GetQuery {
    async fn execute(&self, _ctx: &UnitContext, input: Value) -> Result<Value> {
        let input: GetInput = decode_input(DOMAIN, input)?;
        require_recipe_id(&input.recipe_id)?;

        let recipe = self
            .store
            .get(&input.recipe_id)
            .await
            .map_err(|e| e.context(format!("get recipe {}", input.recipe_id)))?;
        to_output(&recipe)
    }
}

// ========================================
// catalog.list
// ========================================

#[derive(Debug, Deserialize)]
struct ListInput {
    #[serde(default)]
    gpu_vendor: Option<String>,
    #[serde(default)]
    verified_only: bool,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default, deserialize_with = "lenient_int")]
    limit: Option<usize>,
    #[serde(default, deserialize_with = "lenient_int")]
    offset: Option<usize>,
}

/// List recipes with filters and pagination.
pub struct ListQuery {
    store: Arc<dyn RecipeStore>,
}

impl ListQuery {
    pub fn new(store: Arc<dyn RecipeStore>) -> Self {
        Self { store }
    }
}

impl UnitDescriptor for ListQuery {
    fn name(&self) -> &str {
        "catalog.list"
    }

    fn domain(&self) -> &str {
        DOMAIN
    }

    fn description(&self) -> &str {
        "List recipes"
    }

    fn input_schema(&self) -> Schema {
        Schema::object()
            .property("gpu_vendor", Schema::string().describe("Filter by GPU vendor"))
            .property("verified_only", Schema::boolean())
            .property("tags", Schema::array(Schema::string()))
            .property(
                "limit",
                Schema::number()
                    .min(1.0)
                    .max(ListConfig::LIST_DEFAULT_LIMIT as f64),
            )
            .property("offset", Schema::number().min(0.0))
    }

    fn output_schema(&self) -> Schema {
        Schema::object()
            .property("recipes", Schema::array(recipe_schema()))
            .property("total", Schema::number())
    }

    fn examples(&self) -> Vec<Example> {
        vec![Example::new(
            "List verified NVIDIA recipes",
            json!({"gpu_vendor": "NVIDIA", "verified_only": true}),
            json!({"recipes": [{"id": "recipe-1a2b3c4d", "name": "llama3-8b-rtx4090"}], "total": 1}),
        )]
    }
}

#[async_trait]
impl Query for ListQuery {
    async fn execute(&self, _ctx: &UnitContext, input: Value) -> Result<Value> {
        let input: ListInput = decode_input(DOMAIN, input)?;
        let filter = RecipeFilter {
            tags: input.tags,
            gpu_vendor: input.gpu_vendor.filter(|v| !v.is_empty()),
            verified_only: input.verified_only,
            limit: input
                .limit
                .filter(|l| *l > 0)
                .unwrap_or(ListConfig::LIST_DEFAULT_LIMIT),
            offset: input.offset.unwrap_or(0),
        };

        let (recipes, total) = self
            .store
            .list(&filter)
            .await
            .map_err(|e| e.context("list recipes"))?;
        Ok(json!({ "recipes": recipes, "total": total }))
    }
}

// ========================================
// catalog.check_status
// ========================================

#[derive(Debug, Deserialize)]
struct CheckStatusInput {
    #[serde(default)]
    recipe_id: String,
}

/// Readiness of a recipe's engine and models on this host.
///
/// Engines are never reported ready since no engine runtime is managed.
/// A model counts as ready when a `ready` model record carries its name or
/// repository.
pub struct CheckStatusQuery {
    store: Arc<dyn RecipeStore>,
    models: Option<Arc<dyn ModelStore>>,
}

impl CheckStatusQuery {
    pub fn new(store: Arc<dyn RecipeStore>) -> Self {
        Self {
            store,
            models: None,
        }
    }

    pub fn with_model_store(mut self, models: Arc<dyn ModelStore>) -> Self {
        self.models = Some(models);
        self
    }

    async fn ready_names(&self) -> Result<HashSet<String>> {
        let Some(models) = &self.models else {
            return Ok(HashSet::new());
        };
        let filter = ModelFilter {
            status: Some(ModelStatus::Ready),
            ..Default::default()
        };
        let (ready, _) = models.list(&filter).await?;
        Ok(ready.into_iter().map(|m| m.name).collect())
    }
}

impl UnitDescriptor for CheckStatusQuery {
    fn name(&self) -> &str {
        "catalog.check_status"
    }

    fn domain(&self) -> &str {
        DOMAIN
    }

    fn description(&self) -> &str {
        "Check whether a recipe's engine and models are ready"
    }

    fn input_schema(&self) -> Schema {
        Schema::object()
            .property("recipe_id", recipe_id_schema())
            .required(&["recipe_id"])
    }

    fn output_schema(&self) -> Schema {
        Schema::object()
            .property("recipe_id", Schema::string())
            .property("engine_ready", Schema::boolean())
            .property(
                "models_ready",
                Schema::array(
                    Schema::object()
                        .property("name", Schema::string())
                        .property("ready", Schema::boolean()),
                ),
            )
    }
}

#[async_trait]
impl Query for CheckStatusQuery {
    async fn execute(&self, _ctx: &UnitContext, input: Value) -> Result<Value> {
        let input: CheckStatusInput = decode_input(DOMAIN, input)?;
        require_recipe_id(&input.recipe_id)?;

        let recipe = self
            .store
            .get(&input.recipe_id)
            .await
            .map_err(|e| e.context(format!("check recipe {}", input.recipe_id)))?;
        let ready = self
            .ready_names()
            .await
            .map_err(|e| e.context("list ready models"))?;

        let models_ready: Vec<ModelReadiness> = recipe
            .models
            .iter()
            .map(|m| ModelReadiness {
                name: m.name.clone(),
                ready: ready.contains(&m.name) || (!m.repo.is_empty() && ready.contains(&m.repo)),
            })
            .collect();

        Ok(json!({
            "recipe_id": recipe.id,
            "engine_ready": false,
            "models_ready": models_ready,
        }))
    }
}

// ========================================
// catalog.engines
// ========================================

/// Engine assets loaded at startup.
pub struct EnginesQuery {
    assets: EngineAssets,
}

impl EnginesQuery {
    pub fn new(assets: EngineAssets) -> Self {
        Self { assets }
    }
}

impl UnitDescriptor for EnginesQuery {
    fn name(&self) -> &str {
        "catalog.engines"
    }

    fn domain(&self) -> &str {
        DOMAIN
    }

    fn description(&self) -> &str {
        "List known engine assets"
    }

    fn input_schema(&self) -> Schema {
        Schema::object()
    }

    fn output_schema(&self) -> Schema {
        Schema::object()
            .property(
                "engines",
                Schema::array(
                    Schema::object()
                        .property("name", Schema::string())
                        .property("type", Schema::string())
                        .property("image", Schema::string())
                        .property("default_port", Schema::number())
                        .property("gpu_required", Schema::boolean()),
                ),
            )
            .property("total", Schema::number())
    }
}

#[async_trait]
impl Query for EnginesQuery {
    async fn execute(&self, _ctx: &UnitContext, _input: Value) -> Result<Value> {
        let engines: Vec<_> = self.assets.values().collect();
        Ok(json!({ "engines": engines, "total": engines.len() }))
    }
}
