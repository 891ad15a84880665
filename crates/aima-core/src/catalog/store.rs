//! Persistence contract for recipes.

use super::types::{Recipe, RecipeFilter};
use crate::error::Result;
use async_trait::async_trait;

/// CRUD over recipes.
///
/// `list` preserves store order (insertion order for in-memory stores), which
/// the matcher relies on to break score ties.
#[async_trait]
pub trait RecipeStore: Send + Sync {
    /// Fails with `RECIPE_ALREADY_EXISTS` when the id is taken.
    async fn create(&self, recipe: &Recipe) -> Result<()>;

    /// Fails with `RECIPE_NOT_FOUND`.
    async fn get(&self, id: &str) -> Result<Recipe>;

    async fn list(&self, filter: &RecipeFilter) -> Result<(Vec<Recipe>, usize)>;

    async fn delete(&self, id: &str) -> Result<()>;

    async fn update(&self, recipe: &Recipe) -> Result<()>;
}
