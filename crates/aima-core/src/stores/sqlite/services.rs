//! `services` table.

use super::{decode_err, sql_limit, where_clause, SqliteDatabase};
use crate::error::{AimaError, Result};
use crate::service::{ModelService, ResourceClass, ServiceFilter, ServiceStatus, ServiceStore};
use async_trait::async_trait;
use rusqlite::{params, params_from_iter, ErrorCode, OptionalExtension, Row};

const COLUMNS: &str = "id, name, model_id, status, replicas, resource_class, endpoints, \
                       active_replicas, config, created_at, updated_at";

pub struct SqliteServiceStore {
    db: SqliteDatabase,
}

impl SqliteServiceStore {
    pub fn new(db: SqliteDatabase) -> Self {
        Self { db }
    }

    fn row_to_service(row: &Row<'_>) -> rusqlite::Result<ModelService> {
        let status: String = row.get(3)?;
        let class: String = row.get(5)?;
        let endpoints: String = row.get(6)?;
        let config: String = row.get(8)?;

        Ok(ModelService {
            id: row.get(0)?,
            name: row.get(1)?,
            model_id: row.get(2)?,
            status: ServiceStatus::parse(&status)
                .ok_or_else(|| decode_err(3, format!("unknown service status: {}", status)))?,
            replicas: row.get(4)?,
            resource_class: ResourceClass::parse(&class)
                .ok_or_else(|| decode_err(5, format!("unknown resource class: {}", class)))?,
            endpoints: serde_json::from_str(&endpoints)
                .map_err(|e| decode_err(6, format!("invalid endpoints: {}", e)))?,
            active_replicas: row.get(7)?,
            config: serde_json::from_str(&config)
                .map_err(|e| decode_err(8, format!("invalid config: {}", e)))?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }

    fn find_one(&self, column: &str, value: &str) -> Result<Option<ModelService>> {
        let conn = self.db.lock_conn()?;
        Ok(conn
            .query_row(
                &format!("SELECT {} FROM services WHERE {} = ?1 LIMIT 1", COLUMNS, column),
                params![value],
                Self::row_to_service,
            )
            .optional()?)
    }
}

#[async_trait]
impl ServiceStore for SqliteServiceStore {
    async fn create(&self, service: &ModelService) -> Result<()> {
        let endpoints = serde_json::to_string(&service.endpoints)?;
        let config = serde_json::to_string(&service.config)?;
        let conn = self.db.lock_conn()?;
        conn.execute(
            &format!(
                "INSERT INTO services ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                COLUMNS
            ),
            params![
                service.id,
                service.name,
                service.model_id,
                service.status.as_str(),
                service.replicas,
                service.resource_class.as_str(),
                endpoints,
                service.active_replicas,
                config,
                service.created_at,
                service.updated_at,
            ],
        )
        .map_err(|e| match e.sqlite_error_code() {
            Some(ErrorCode::ConstraintViolation) => AimaError::ServiceAlreadyExists {
                service_id: service.id.clone(),
            },
            _ => e.into(),
        })?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<ModelService> {
        self.find_one("id", id)?
            .ok_or_else(|| AimaError::ServiceNotFound {
                service_id: id.to_string(),
            })
    }

    async fn get_by_name(&self, name: &str) -> Result<ModelService> {
        self.find_one("name", name)?
            .ok_or_else(|| AimaError::ServiceNotFound {
                service_id: name.to_string(),
            })
    }

    async fn list(&self, filter: &ServiceFilter) -> Result<(Vec<ModelService>, usize)> {
        let mut conditions: Vec<(&str, String)> = Vec::new();
        if let Some(status) = filter.status {
            conditions.push(("status", status.as_str().to_string()));
        }
        if let Some(model_id) = &filter.model_id {
            conditions.push(("model_id", model_id.clone()));
        }
        let where_sql = where_clause(&conditions);
        let values: Vec<&String> = conditions.iter().map(|(_, v)| v).collect();

        let conn = self.db.lock_conn()?;
        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM services{}", where_sql),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM services{} ORDER BY created_at, rowid LIMIT {} OFFSET {}",
            COLUMNS,
            where_sql,
            sql_limit(filter.limit),
            filter.offset
        ))?;
        let rows = stmt.query_map(params_from_iter(values.iter()), Self::row_to_service)?;

        let mut services = Vec::new();
        for row in rows {
            services.push(row?);
        }
        Ok((services, total as usize))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let conn = self.db.lock_conn()?;
        let rows = conn.execute("DELETE FROM services WHERE id = ?1", params![id])?;
        if rows == 0 {
            return Err(AimaError::ServiceNotFound {
                service_id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn update(&self, service: &ModelService) -> Result<()> {
        let endpoints = serde_json::to_string(&service.endpoints)?;
        let config = serde_json::to_string(&service.config)?;
        let conn = self.db.lock_conn()?;
        let rows = conn.execute(
            "UPDATE services SET name = ?2, model_id = ?3, status = ?4, replicas = ?5,
                resource_class = ?6, endpoints = ?7, active_replicas = ?8, config = ?9,
                created_at = ?10, updated_at = ?11
             WHERE id = ?1",
            params![
                service.id,
                service.name,
                service.model_id,
                service.status.as_str(),
                service.replicas,
                service.resource_class.as_str(),
                endpoints,
                service.active_replicas,
                config,
                service.created_at,
                service.updated_at,
            ],
        )?;
        if rows == 0 {
            return Err(AimaError::ServiceNotFound {
                service_id: service.id.clone(),
            });
        }
        Ok(())
    }
}
