//! Catalog domain resources.

use super::store::RecipeStore;
use super::types::RecipeFilter;
use super::{recipe_schema, DOMAIN};
use crate::error::{AimaError, Result};
use crate::schema::Schema;
use crate::unit::{to_output, Resource, ResourceFactory, UnitContext};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

pub const RECIPES_URI: &str = "asms://catalog/recipes";
const RECIPE_URI_PREFIX: &str = "asms://catalog/recipe/";

/// Extract the recipe id from `asms://catalog/recipe/<id>`.
pub fn parse_recipe_uri(uri: &str) -> Result<&str> {
    match uri.strip_prefix(RECIPE_URI_PREFIX) {
        Some(id) if !id.is_empty() && !id.contains('/') => Ok(id),
        _ => Err(AimaError::ResourceNotFound {
            uri: uri.to_string(),
        }),
    }
}

/// Every stored recipe.
pub struct RecipesResource {
    store: Arc<dyn RecipeStore>,
}

impl RecipesResource {
    pub fn new(store: Arc<dyn RecipeStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Resource for RecipesResource {
    fn uri(&self) -> String {
        RECIPES_URI.to_string()
    }

    fn domain(&self) -> &str {
        DOMAIN
    }

    fn schema(&self) -> Schema {
        Schema::object()
            .describe("All recipes")
            .property("recipes", Schema::array(recipe_schema()))
            .property("total", Schema::number())
    }

    async fn get(&self, _ctx: &UnitContext) -> Result<Value> {
        let (recipes, total) = self.store.list(&RecipeFilter::default()).await?;
        Ok(json!({ "recipes": recipes, "total": total }))
    }
}

/// A single recipe.
pub struct RecipeResource {
    recipe_id: String,
    store: Arc<dyn RecipeStore>,
}

impl RecipeResource {
    pub fn new(recipe_id: impl Into<String>, store: Arc<dyn RecipeStore>) -> Self {
        Self {
            recipe_id: recipe_id.into(),
            store,
        }
    }
}

#[async_trait]
impl Resource for RecipeResource {
    fn uri(&self) -> String {
        format!("{}{}", RECIPE_URI_PREFIX, self.recipe_id)
    }

    fn domain(&self) -> &str {
        DOMAIN
    }

    fn schema(&self) -> Schema {
        recipe_schema()
    }

    async fn get(&self, _ctx: &UnitContext) -> Result<Value> {
        to_output(&self.store.get(&self.recipe_id).await?)
    }
}

/// Builds [`RecipeResource`]s for `asms://catalog/recipe/*`.
pub struct RecipeResourceFactory {
    store: Arc<dyn RecipeStore>,
}

impl RecipeResourceFactory {
    pub fn new(store: Arc<dyn RecipeStore>) -> Self {
        Self { store }
    }
}

impl ResourceFactory for RecipeResourceFactory {
    fn pattern(&self) -> &str {
        "asms://catalog/recipe/*"
    }

    fn can_create(&self, uri: &str) -> bool {
        parse_recipe_uri(uri).is_ok()
    }

    fn create(&self, uri: &str) -> Result<Arc<dyn Resource>> {
        let id = parse_recipe_uri(uri)?;
        Ok(Arc::new(RecipeResource::new(id, self.store.clone())))
    }
}
