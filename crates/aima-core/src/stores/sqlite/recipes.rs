//! `catalog_recipes` table.
//!
//! The full recipe is kept as JSON in `data`; vendor and verified flag get
//! their own indexed columns. Tag filtering happens in process, so pagination
//! is applied after it.

use super::{decode_err, where_clause, SqliteDatabase};
use crate::catalog::{Recipe, RecipeFilter, RecipeStore};
use crate::error::{AimaError, Result};
use crate::stores::paginate;
use async_trait::async_trait;
use rusqlite::{params, params_from_iter, ErrorCode, OptionalExtension, Row};

pub struct SqliteRecipeStore {
    db: SqliteDatabase,
}

impl SqliteRecipeStore {
    pub fn new(db: SqliteDatabase) -> Self {
        Self { db }
    }

    fn row_to_recipe(row: &Row<'_>) -> rusqlite::Result<Recipe> {
        let data: String = row.get(0)?;
        serde_json::from_str(&data).map_err(|e| decode_err(0, format!("invalid recipe data: {}", e)))
    }
}

#[async_trait]
impl RecipeStore for SqliteRecipeStore {
    async fn create(&self, recipe: &Recipe) -> Result<()> {
        let data = serde_json::to_string(recipe)?;
        let conn = self.db.lock_conn()?;
        conn.execute(
            "INSERT INTO catalog_recipes (id, name, gpu_vendor, verified, data)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                recipe.id,
                recipe.name,
                recipe.profile.gpu_vendor,
                recipe.verified,
                data
            ],
        )
        .map_err(|e| match e.sqlite_error_code() {
            Some(ErrorCode::ConstraintViolation) => AimaError::RecipeAlreadyExists {
                recipe_id: recipe.id.clone(),
            },
            _ => e.into(),
        })?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Recipe> {
        let conn = self.db.lock_conn()?;
        conn.query_row(
            "SELECT data FROM catalog_recipes WHERE id = ?1",
            params![id],
            Self::row_to_recipe,
        )
        .optional()?
        .ok_or_else(|| AimaError::RecipeNotFound {
            recipe_id: id.to_string(),
        })
    }

    async fn list(&self, filter: &RecipeFilter) -> Result<(Vec<Recipe>, usize)> {
        let mut conditions: Vec<(&str, String)> = Vec::new();
        if let Some(vendor) = &filter.gpu_vendor {
            conditions.push(("gpu_vendor", vendor.clone()));
        }
        if filter.verified_only {
            conditions.push(("verified", "1".to_string()));
        }
        let where_sql = where_clause(&conditions);
        let values: Vec<&String> = conditions.iter().map(|(_, v)| v).collect();

        let conn = self.db.lock_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT data FROM catalog_recipes{} ORDER BY rowid",
            where_sql
        ))?;
        let rows = stmt.query_map(params_from_iter(values.iter()), Self::row_to_recipe)?;

        let mut recipes = Vec::new();
        for row in rows {
            let recipe = row?;
            if filter.tags.is_empty() || recipe.has_any_tag(&filter.tags) {
                recipes.push(recipe);
            }
        }
        Ok(paginate(recipes, filter.limit, filter.offset))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let conn = self.db.lock_conn()?;
        let rows = conn.execute("DELETE FROM catalog_recipes WHERE id = ?1", params![id])?;
        if rows == 0 {
            return Err(AimaError::RecipeNotFound {
                recipe_id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn update(&self, recipe: &Recipe) -> Result<()> {
        let data = serde_json::to_string(recipe)?;
        let conn = self.db.lock_conn()?;
        let rows = conn.execute(
            "UPDATE catalog_recipes SET name = ?2, gpu_vendor = ?3, verified = ?4, data = ?5
             WHERE id = ?1",
            params![
                recipe.id,
                recipe.name,
                recipe.profile.gpu_vendor,
                recipe.verified,
                data
            ],
        )?;
        if rows == 0 {
            return Err(AimaError::RecipeNotFound {
                recipe_id: recipe.id.clone(),
            });
        }
        Ok(())
    }
}
