//! `models` table.

use super::{decode_err, sql_limit, where_clause, SqliteDatabase};
use crate::error::{AimaError, Result};
use crate::model::{
    Model, ModelFilter, ModelFormat, ModelRequirements, ModelStatus, ModelStore, ModelType,
};
use async_trait::async_trait;
use rusqlite::{params, params_from_iter, ErrorCode, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

const COLUMNS: &str =
    "id, name, type, format, status, source, path, size, checksum, metadata, created_at, updated_at";

/// Fields without a dedicated column.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Metadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    requirements: Option<ModelRequirements>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tags: Vec<String>,
}

pub struct SqliteModelStore {
    db: SqliteDatabase,
}

impl SqliteModelStore {
    pub fn new(db: SqliteDatabase) -> Self {
        Self { db }
    }

    fn row_to_model(row: &Row<'_>) -> rusqlite::Result<Model> {
        let type_str: String = row.get(2)?;
        let format_str: String = row.get(3)?;
        let status_str: String = row.get(4)?;
        let metadata_str: String = row.get(9)?;
        let metadata: Metadata = serde_json::from_str(&metadata_str)
            .map_err(|e| decode_err(9, format!("invalid metadata: {}", e)))?;

        Ok(Model {
            id: row.get(0)?,
            name: row.get(1)?,
            model_type: ModelType::parse(&type_str)
                .ok_or_else(|| decode_err(2, format!("unknown model type: {}", type_str)))?,
            format: ModelFormat::parse(&format_str)
                .ok_or_else(|| decode_err(3, format!("unknown model format: {}", format_str)))?,
            status: ModelStatus::parse(&status_str)
                .ok_or_else(|| decode_err(4, format!("unknown model status: {}", status_str)))?,
            source: row.get(5)?,
            path: row.get(6)?,
            size: row.get::<_, i64>(7)?.max(0) as u64,
            checksum: row.get(8)?,
            requirements: metadata.requirements,
            tags: metadata.tags,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }

    fn metadata_json(model: &Model) -> Result<String> {
        Ok(serde_json::to_string(&Metadata {
            requirements: model.requirements.clone(),
            tags: model.tags.clone(),
        })?)
    }
}

#[async_trait]
impl ModelStore for SqliteModelStore {
    async fn create(&self, model: &Model) -> Result<()> {
        let metadata = Self::metadata_json(model)?;
        let conn = self.db.lock_conn()?;
        conn.execute(
            &format!(
                "INSERT INTO models ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                COLUMNS
            ),
            params![
                model.id,
                model.name,
                model.model_type.as_str(),
                model.format.as_str(),
                model.status.as_str(),
                model.source,
                model.path,
                model.size as i64,
                model.checksum,
                metadata,
                model.created_at,
                model.updated_at,
            ],
        )
        .map_err(|e| match e.sqlite_error_code() {
            Some(ErrorCode::ConstraintViolation) => AimaError::ModelAlreadyExists {
                model_id: model.id.clone(),
            },
            _ => e.into(),
        })?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Model> {
        let conn = self.db.lock_conn()?;
        conn.query_row(
            &format!("SELECT {} FROM models WHERE id = ?1", COLUMNS),
            params![id],
            Self::row_to_model,
        )
        .optional()?
        .ok_or_else(|| AimaError::ModelNotFound {
            model_id: id.to_string(),
        })
    }

    async fn list(&self, filter: &ModelFilter) -> Result<(Vec<Model>, usize)> {
        let mut conditions: Vec<(&str, String)> = Vec::new();
        if let Some(t) = filter.model_type {
            conditions.push(("type", t.as_str().to_string()));
        }
        if let Some(s) = filter.status {
            conditions.push(("status", s.as_str().to_string()));
        }
        if let Some(f) = filter.format {
            conditions.push(("format", f.as_str().to_string()));
        }
        if let Some(src) = &filter.source {
            conditions.push(("source", src.clone()));
        }
        let where_sql = where_clause(&conditions);
        let values: Vec<&String> = conditions.iter().map(|(_, v)| v).collect();

        let conn = self.db.lock_conn()?;
        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM models{}", where_sql),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM models{} ORDER BY created_at, rowid LIMIT {} OFFSET {}",
            COLUMNS,
            where_sql,
            sql_limit(filter.limit),
            filter.offset
        ))?;
        let rows = stmt.query_map(params_from_iter(values.iter()), Self::row_to_model)?;

        let mut models = Vec::new();
        for row in rows {
            models.push(row?);
        }
        Ok((models, total as usize))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let conn = self.db.lock_conn()?;
        let rows = conn.execute("DELETE FROM models WHERE id = ?1", params![id])?;
        if rows == 0 {
            return Err(AimaError::ModelNotFound {
                model_id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn update(&self, model: &Model) -> Result<()> {
        let metadata = Self::metadata_json(model)?;
        let conn = self.db.lock_conn()?;
        let rows = conn.execute(
            "UPDATE models SET name = ?2, type = ?3, format = ?4, status = ?5, source = ?6,
                path = ?7, size = ?8, checksum = ?9, metadata = ?10, created_at = ?11,
                updated_at = ?12
             WHERE id = ?1",
            params![
                model.id,
                model.name,
                model.model_type.as_str(),
                model.format.as_str(),
                model.status.as_str(),
                model.source,
                model.path,
                model.size as i64,
                model.checksum,
                metadata,
                model.created_at,
                model.updated_at,
            ],
        )?;
        if rows == 0 {
            return Err(AimaError::ModelNotFound {
                model_id: model.id.clone(),
            });
        }
        Ok(())
    }
}
