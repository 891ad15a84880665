//! SQLite-backed stores.
//!
//! One database file holds the `models`, `catalog_recipes` and `services`
//! tables. WAL mode is enabled; the connection sits behind
//! `Arc<Mutex<Connection>>` and is shared by the three stores.

mod models;
mod recipes;
mod services;

pub use models::SqliteModelStore;
pub use recipes::SqliteRecipeStore;
pub use services::SqliteServiceStore;

use crate::config::SqliteConfig;
use crate::error::{AimaError, Result};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Shared handle to the AIMA database.
#[derive(Clone)]
pub struct SqliteDatabase {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDatabase {
    /// Open (or create) the database at `db_path`.
    ///
    /// Creates parent directories if they don't exist.
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| AimaError::Io {
                    message: format!("Failed to create database directory: {}", parent.display()),
                    path: Some(parent.to_path_buf()),
                    source: Some(e),
                })?;
            }
        }

        let conn = Connection::open(db_path)?;
        Self::configure_connection(&conn)?;
        Self::ensure_schema(&conn)?;
        debug!("Opened SQLite database at {}", db_path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::ensure_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch(&format!(
            "PRAGMA journal_mode=WAL;\n\
             PRAGMA busy_timeout={};\n\
             PRAGMA synchronous=NORMAL;",
            SqliteConfig::BUSY_TIMEOUT_MS,
        ))?;
        Ok(())
    }

    fn ensure_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS models (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                type TEXT NOT NULL,
                format TEXT NOT NULL,
                status TEXT NOT NULL,
                source TEXT NOT NULL DEFAULT '',
                path TEXT NOT NULL DEFAULT '',
                size INTEGER NOT NULL DEFAULT 0,
                checksum TEXT,
                metadata TEXT NOT NULL DEFAULT '{}',
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_models_type ON models(type);
            CREATE INDEX IF NOT EXISTS idx_models_status ON models(status);
            CREATE INDEX IF NOT EXISTS idx_models_name ON models(name);

            CREATE TABLE IF NOT EXISTS catalog_recipes (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                gpu_vendor TEXT NOT NULL DEFAULT '',
                verified INTEGER NOT NULL DEFAULT 0,
                data TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_recipes_gpu_vendor ON catalog_recipes(gpu_vendor);
            CREATE INDEX IF NOT EXISTS idx_recipes_verified ON catalog_recipes(verified);

            CREATE TABLE IF NOT EXISTS services (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                model_id TEXT NOT NULL,
                status TEXT NOT NULL,
                replicas INTEGER NOT NULL DEFAULT 1,
                resource_class TEXT NOT NULL,
                endpoints TEXT NOT NULL DEFAULT '[]',
                active_replicas INTEGER NOT NULL DEFAULT 0,
                config TEXT NOT NULL DEFAULT '{}',
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_services_model_id ON services(model_id);
            CREATE INDEX IF NOT EXISTS idx_services_status ON services(status);",
        )?;
        Ok(())
    }

    fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| AimaError::Database {
            message: "Failed to acquire database connection lock".to_string(),
            source: None,
        })
    }
}

/// SQLite `LIMIT` value; `-1` means no limit.
fn sql_limit(limit: usize) -> i64 {
    if limit == 0 {
        -1
    } else {
        limit as i64
    }
}

/// Build ` WHERE a = ?1 AND b = ?2` from column/value pairs.
fn where_clause(conditions: &[(&str, String)]) -> String {
    if conditions.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = conditions
        .iter()
        .enumerate()
        .map(|(i, (col, _))| format!("{} = ?{}", col, i + 1))
        .collect();
    format!(" WHERE {}", parts.join(" AND "))
}

/// Map a column decoding failure into a rusqlite error.
fn decode_err(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        message.into(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_where_clause() {
        assert_eq!(where_clause(&[]), "");
        assert_eq!(
            where_clause(&[("type", "llm".into()), ("status", "ready".into())]),
            " WHERE type = ?1 AND status = ?2"
        );
    }

    #[test]
    fn test_open_creates_parent_and_wal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("aima.db");
        let db = SqliteDatabase::open(&path).unwrap();
        assert!(path.exists());

        let conn = db.lock_conn().unwrap();
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }
}
