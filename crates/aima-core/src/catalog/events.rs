//! Catalog domain events.

use super::types::{HardwareProfile, ModelReadiness, Recipe};
use crate::events::Event;
use serde_json::json;

pub const RECIPE_CREATED: &str = "catalog.recipe_created";
pub const RECIPE_MATCHED: &str = "catalog.recipe_matched";
pub const RECIPE_APPLIED: &str = "catalog.recipe_applied";

const DOMAIN: &str = "catalog";

pub fn recipe_created(recipe: &Recipe, correlation_id: &str) -> Event {
    Event::new(
        RECIPE_CREATED,
        DOMAIN,
        json!({ "recipe_id": recipe.id, "name": recipe.name }),
    )
    .with_correlation_id(correlation_id)
}

pub fn recipe_matched(
    recipe_id: &str,
    profile: &HardwareProfile,
    score: u32,
    correlation_id: &str,
) -> Event {
    Event::new(
        RECIPE_MATCHED,
        DOMAIN,
        json!({ "recipe_id": recipe_id, "profile": profile, "score": score }),
    )
    .with_correlation_id(correlation_id)
}

pub fn recipe_applied(
    recipe_id: &str,
    engine_ready: bool,
    models_ready: &[ModelReadiness],
    correlation_id: &str,
) -> Event {
    Event::new(
        RECIPE_APPLIED,
        DOMAIN,
        json!({
            "recipe_id": recipe_id,
            "engine_ready": engine_ready,
            "models_ready": models_ready,
        }),
    )
    .with_correlation_id(correlation_id)
}
