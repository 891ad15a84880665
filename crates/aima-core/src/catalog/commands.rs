//! Catalog domain commands.

use super::events;
use super::store::RecipeStore;
use super::types::{
    generate_recipe_id, HardwareProfile, ModelReadiness, Recipe, RecipeEngine, RecipeModel,
    ResourceLimits,
};
use super::{engine_schema, profile_schema, recipe_id_schema, require_recipe_id, EngineAssets, DOMAIN};
use crate::error::{AimaError, Result};
use crate::events::{noop_publisher, EventPublisher};
use crate::schema::Schema;
use crate::unit::{decode_input, require_non_empty, Command, Example, UnitContext, UnitDescriptor};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

/// Problems that make `recipe` unusable, in a stable order.
///
/// Works on the raw JSON so that a missing section can be told apart from
/// an empty one. Unknown engine types are only reported when `assets` is
/// given and non-empty.
pub fn recipe_issues(recipe: &Value, assets: Option<&EngineAssets>) -> Vec<String> {
    let mut issues = Vec::new();
    let str_field = |v: &Value, key: &str| {
        v.get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or("")
            .to_string()
    };

    if str_field(recipe, "name").is_empty() {
        issues.push("name is required".to_string());
    }

    match recipe.get("engine").filter(|e| e.is_object()) {
        None => issues.push("engine is required".to_string()),
        Some(engine) => {
            let engine_type = str_field(engine, "type");
            if engine_type.is_empty() {
                issues.push("engine.type is required".to_string());
            }
            if str_field(engine, "image").is_empty() {
                issues.push("engine.image is required".to_string());
            }
            if let Some(assets) = assets.filter(|a| !a.is_empty()) {
                if !engine_type.is_empty() && !assets.contains_key(&engine_type) {
                    issues.push(format!("unknown engine type: {}", engine_type));
                }
            }
        }
    }

    if !recipe.get("profile").is_some_and(Value::is_object) {
        issues.push("profile is required".to_string());
    }

    let version = str_field(recipe, "version");
    if !version.is_empty() && semver::Version::parse(&version).is_err() {
        issues.push(format!("invalid version: {}", version));
    }

    issues
}

fn validate_version(version: &str) -> Result<()> {
    semver::Version::parse(version).map_err(|e| {
        AimaError::invalid_input(DOMAIN, format!("invalid version {}: {}", version, e))
    })?;
    Ok(())
}

// ========================================
// catalog.create_recipe
// ========================================

#[derive(Debug, Deserialize)]
struct CreateRecipeInput {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    version: String,
    #[serde(default)]
    author: String,
    #[serde(default)]
    verified: bool,
    #[serde(default)]
    profile: HardwareProfile,
    #[serde(default)]
    engine: RecipeEngine,
    #[serde(default)]
    models: Vec<RecipeModel>,
    #[serde(default)]
    resource_limits: ResourceLimits,
    #[serde(default)]
    tags: Vec<String>,
}

/// Store a new recipe.
pub struct CreateRecipeCommand {
    store: Arc<dyn RecipeStore>,
    events: Arc<dyn EventPublisher>,
}

impl CreateRecipeCommand {
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
}

impl UnitDescriptor for CreateRecipeCommand {
    fn name(&self) -> &str {
        "catalog.create_recipe"
    }

    fn domain(&self) -> &str {
        DOMAIN
    }

    fn description(&self) -> &str {
        "Create a new recipe"
    }

    fn input_schema(&self) -> Schema {
        Schema::object()
            .property("id", Schema::string().describe("Recipe id; generated when empty"))
            .property("name", Schema::string().describe("Recipe name").min_length(1))
            .property("description", Schema::string())
            .property(
                "version",
                Schema::string()
                    .describe("Semantic version")
                    .default_value(json!(Recipe::DEFAULT_VERSION)),
            )
            .property("author", Schema::string())
            .property("verified", Schema::boolean())
            .property("profile", profile_schema())
            .property("engine", engine_schema())
            .property("models", Schema::array(Schema::object()))
            .property("resource_limits", Schema::object())
            .property("tags", Schema::array(Schema::string()))
            .required(&["name"])
    }

    fn output_schema(&self) -> Schema {
        Schema::object().property("recipe_id", Schema::string())
    }

    fn examples(&self) -> Vec<Example> {
        vec![Example::new(
            "Create a vLLM recipe for an RTX 4090",
            json!({
                "name": "llama3-8b-rtx4090",
                "profile": {"gpu_vendor": "NVIDIA", "gpu_model": "RTX 4090", "vram_min_gb": 24, "os": "linux"},
                "engine": {"type": "vllm", "image": "vllm/vllm-openai:latest"},
                "models": [{"name": "llama3-8b", "source": "huggingface", "repo": "meta-llama/Meta-Llama-3-8B", "type": "llm"}],
            }),
            json!({"recipe_id": "recipe-1a2b3c4d"}),
        )]
    }
}

#[async_trait]
impl Command for CreateRecipeCommand {
    async fn execute(&self, ctx: &UnitContext, input: Value) -> Result<Value> {
        let input: CreateRecipeInput = decode_input(DOMAIN, input)?;
        require_non_empty(DOMAIN, "name", &input.name)?;

        let version = if input.version.is_empty() {
            Recipe::DEFAULT_VERSION.to_string()
        } else {
            input.version
        };
        validate_version(&version)?;

        let recipe = Recipe {
            id: if input.id.is_empty() {
                generate_recipe_id()
            } else {
                input.id
            },
            name: input.name,
            description: input.description,
            version,
            author: input.author,
            profile: input.profile,
            engine: input.engine,
            models: input.models,
            resource_limits: input.resource_limits,
            verified: input.verified,
            tags: input.tags,
        };

        self.store
            .create(&recipe)
            .await
            .map_err(|e| e.context("create recipe"))?;
        debug!("Created recipe {} ({})", recipe.id, recipe.name);

        self.events.emit(events::recipe_created(&recipe, &ctx.request_id));
        Ok(json!({ "recipe_id": recipe.id }))
    }
}

// ========================================
// catalog.validate_recipe
// ========================================

#[derive(Debug, Deserialize)]
struct ValidateRecipeInput {
    #[serde(default)]
    recipe: Value,
}

/// Check a recipe document without storing it.
#[derive(Default)]
pub struct ValidateRecipeCommand {
    assets: Option<EngineAssets>,
}

impl ValidateRecipeCommand {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also reject engine types that no loaded asset declares.
    pub fn with_assets(mut self, assets: EngineAssets) -> Self {
        self.assets = Some(assets);
        self
    }
}

impl UnitDescriptor for ValidateRecipeCommand {
    fn name(&self) -> &str {
        "catalog.validate_recipe"
    }

    fn domain(&self) -> &str {
        DOMAIN
    }

    fn description(&self) -> &str {
        "Validate a recipe configuration"
    }

    fn input_schema(&self) -> Schema {
        Schema::object()
            .property("recipe", Schema::object().describe("Recipe document to validate"))
            .required(&["recipe"])
    }

    fn output_schema(&self) -> Schema {
        Schema::object()
            .property("valid", Schema::boolean())
            .property("issues", Schema::array(Schema::string()))
    }

    fn examples(&self) -> Vec<Example> {
        vec![Example::new(
            "Recipe without a name",
            json!({"recipe": {"profile": {"gpu_vendor": "NVIDIA"}, "engine": {"type": "vllm", "image": "vllm/vllm-openai:latest"}}}),
            json!({"valid": false, "issues": ["name is required"]}),
        )]
    }
}

#[async_trait]
impl Command for ValidateRecipeCommand {
    async fn execute(&self, _ctx: &UnitContext, input: Value) -> Result<Value> {
        let input: ValidateRecipeInput = decode_input(DOMAIN, input)?;
        if !input.recipe.is_object() {
            return Err(AimaError::invalid_input(DOMAIN, "recipe is required"));
        }

        let issues = recipe_issues(&input.recipe, self.assets.as_ref());
        Ok(json!({ "valid": issues.is_empty(), "issues": issues }))
    }
}

// ========================================
// catalog.apply_recipe
// ========================================

#[derive(Debug, Deserialize)]
struct ApplyRecipeInput {
    #[serde(default)]
    recipe_id: String,
    #[serde(default)]
    skip_engine: bool,
    #[serde(default)]
    skip_models: bool,
}

/// Produce the deployment plan of a stored recipe.
///
/// Nothing is deployed; the plan lists the engine and the models still to
/// be fetched.
pub struct ApplyRecipeCommand {
    store: Arc<dyn RecipeStore>,
    events: Arc<dyn EventPublisher>,
}

impl ApplyRecipeCommand {
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
}

impl UnitDescriptor for ApplyRecipeCommand {
    fn name(&self) -> &str {
        "catalog.apply_recipe"
    }

    fn domain(&self) -> &str {
        DOMAIN
    }

    fn description(&self) -> &str {
        "Apply a recipe (plan engine and model setup)"
    }

    fn input_schema(&self) -> Schema {
        Schema::object()
            .property("recipe_id", recipe_id_schema())
            .property(
                "skip_engine",
                Schema::boolean().describe("Treat the engine as already available"),
            )
            .property("skip_models", Schema::boolean().describe("Leave models out of the plan"))
            .required(&["recipe_id"])
    }

    fn output_schema(&self) -> Schema {
        Schema::object()
            .property("recipe_id", Schema::string())
            .property("engine_ready", Schema::boolean())
            .property(
                "models",
                Schema::array(
                    Schema::object()
                        .property("name", Schema::string())
                        .property("status", Schema::string()),
                ),
            )
    }

    fn examples(&self) -> Vec<Example> {
        vec![Example::new(
            "Plan a recipe",
            json!({"recipe_id": "recipe-1a2b3c4d"}),
            json!({"recipe_id": "recipe-1a2b3c4d", "engine_ready": false, "models": [{"name": "llama3-8b", "status": "pending"}]}),
        )]
    }
}

#[async_trait]
impl Command for ApplyRecipeCommand {
    async fn execute(&self, ctx: &UnitContext, input: Value) -> Result<Value> {
        let input: ApplyRecipeInput = decode_input(DOMAIN, input)?;
        require_recipe_id(&input.recipe_id)?;

        let recipe = self
            .store
            .get(&input.recipe_id)
            .await
            .map_err(|e| e.context(format!("apply recipe {}", input.recipe_id)))?;

        if !input.skip_engine
            && (recipe.engine.engine_type.is_empty() || recipe.engine.image.is_empty())
        {
            return Err(AimaError::RecipeApplyFailed {
                recipe_id: recipe.id,
                message: "engine type and image are required".to_string(),
            });
        }

        let engine_ready = input.skip_engine;
        let models: Vec<Value> = if input.skip_models {
            Vec::new()
        } else {
            recipe
                .models
                .iter()
                .map(|m| json!({ "name": m.name, "status": "pending" }))
                .collect()
        };
        let readiness: Vec<ModelReadiness> = recipe
            .models
            .iter()
            .filter(|_| !input.skip_models)
            .map(|m| ModelReadiness {
                name: m.name.clone(),
                ready: false,
            })
            .collect();

        info!(
            "Planned recipe {}: engine {} ({} models)",
            recipe.id,
            recipe.engine.engine_type,
            models.len()
        );
        self.events.emit(events::recipe_applied(
            &recipe.id,
            engine_ready,
            &readiness,
            &ctx.request_id,
        ));

        Ok(json!({
            "recipe_id": recipe.id,
            "engine_ready": engine_ready,
            "models": models,
        }))
    }
}
