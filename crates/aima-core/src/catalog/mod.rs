//! Catalog domain: recipes, hardware matching and engine assets.
//!
//! Units registered by this module:
//!
//! | Name | Kind |
//! |---|---|
//! | `catalog.create_recipe`, `catalog.validate_recipe`, `catalog.apply_recipe` | command |
//! | `catalog.match`, `catalog.get`, `catalog.list`, `catalog.check_status`, `catalog.engines` | query |
//! | `asms://catalog/recipes`, `asms://catalog/recipe/<id>` | resource |

mod commands;
pub mod engine_asset;
pub mod events;
mod queries;
mod resources;
mod store;
mod types;

pub use commands::{recipe_issues, ApplyRecipeCommand, CreateRecipeCommand, ValidateRecipeCommand};
pub use engine_asset::{load_engine_assets, EngineAsset};
pub use queries::{CheckStatusQuery, EnginesQuery, GetQuery, ListQuery, MatchQuery};
pub use resources::{parse_recipe_uri, RecipeResource, RecipeResourceFactory, RecipesResource};
pub use store::RecipeStore;
pub use types::{
    generate_recipe_id, score_recipe, HardwareProfile, MatchResult, MatchScore, ModelReadiness,
    Recipe, RecipeEngine, RecipeFilter, RecipeModel, ResourceLimits,
};

use crate::error::{AimaError, Result};
use crate::schema::Schema;
use std::collections::BTreeMap;
use std::sync::Arc;

pub(crate) const DOMAIN: &str = "catalog";

/// Engine assets keyed by engine type.
pub type EngineAssets = Arc<BTreeMap<String, EngineAsset>>;

fn require_recipe_id(recipe_id: &str) -> Result<()> {
    if recipe_id.trim().is_empty() {
        return Err(AimaError::invalid_input(DOMAIN, "recipe_id is required"));
    }
    Ok(())
}

fn recipe_id_schema() -> Schema {
    Schema::string()
        .describe("Recipe identifier")
        .example(serde_json::json!("recipe-1a2b3c4d"))
}

pub(crate) fn profile_schema() -> Schema {
    Schema::object()
        .describe("Target hardware profile")
        .property("gpu_vendor", Schema::string().example(serde_json::json!("NVIDIA")))
        .property("gpu_model", Schema::string())
        .property("gpu_arch", Schema::string())
        .property("vram_min_gb", Schema::number().min(0.0))
        .property("cpu_arch", Schema::string())
        .property("os", Schema::string())
        .property("unified_memory", Schema::boolean())
        .property("tags", Schema::array(Schema::string()))
}

pub(crate) fn engine_schema() -> Schema {
    Schema::object()
        .describe("Engine image configuration")
        .property("type", Schema::string())
        .property("image", Schema::string())
        .property("fallback_images", Schema::array(Schema::string()))
        .property("config", Schema::object())
}

/// Schema of a serialized [`Recipe`].
pub(crate) fn recipe_schema() -> Schema {
    Schema::object()
        .describe("Recipe")
        .property("id", Schema::string())
        .property("name", Schema::string())
        .property("description", Schema::string())
        .property("version", Schema::string())
        .property("author", Schema::string())
        .property("profile", profile_schema())
        .property("engine", engine_schema())
        .property(
            "models",
            Schema::array(
                Schema::object()
                    .property("name", Schema::string())
                    .property("source", Schema::string())
                    .property("repo", Schema::string())
                    .property("tag", Schema::string())
                    .property("type", Schema::string())
                    .property("format", Schema::string())
                    .property("memory_required", Schema::number()),
            ),
        )
        .property(
            "resource_limits",
            Schema::object()
                .property("gpu_memory_utilization", Schema::number())
                .property("max_model_len", Schema::number())
                .property("tensor_parallel", Schema::number()),
        )
        .property("verified", Schema::boolean())
        .property("tags", Schema::array(Schema::string()))
}
