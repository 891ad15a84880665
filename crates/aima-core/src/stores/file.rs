//! JSON-file model store.
//!
//! The whole store is a single `id -> Model` object at `<data_dir>/models.json`.
//! It is loaded once on open and rewritten after every mutation under the
//! write lock: serialize to a temp file in the same directory, then rename
//! over the target.

use super::paginate;
use crate::config::AppConfig;
use crate::error::{AimaError, Result};
use crate::model::{Model, ModelFilter, ModelStore};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::sync::RwLock;
use tracing::debug;

pub struct FileModelStore {
    path: PathBuf,
    models: RwLock<BTreeMap<String, Model>>,
}

impl FileModelStore {
    /// Open `<data_dir>/models.json`, creating the directory if needed.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        fs::create_dir_all(data_dir).map_err(|e| AimaError::io_with_path(e, data_dir))?;
        Self::open_file(data_dir.join(AppConfig::MODELS_FILE_NAME))
    }

    /// Open a store backed by an explicit file path.
    pub fn open_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let models = if path.exists() {
            let contents =
                fs::read_to_string(&path).map_err(|e| AimaError::io_with_path(e, &path))?;
            if contents.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&contents).map_err(|e| AimaError::Json {
                    message: format!("Failed to parse {}: {}", path.display(), e),
                    source: Some(e),
                })?
            }
        } else {
            BTreeMap::new()
        };
        debug!("Loaded {} models from {}", models.len(), path.display());

        Ok(Self {
            path,
            models: RwLock::new(models),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, models: &BTreeMap<String, Model>) -> Result<()> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let serialized = serde_json::to_vec_pretty(models)?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| AimaError::io_with_path(e, dir))?;
        tmp.write_all(&serialized)
            .map_err(|e| AimaError::io_with_path(e, tmp.path()))?;
        tmp.persist(&self.path)
            .map_err(|e| AimaError::io_with_path(e.error, &self.path))?;
        Ok(())
    }
}

#[async_trait]
impl ModelStore for FileModelStore {
    async fn create(&self, model: &Model) -> Result<()> {
        let mut models = self.models.write().await;
        if models.contains_key(&model.id) {
            return Err(AimaError::ModelAlreadyExists {
                model_id: model.id.clone(),
            });
        }
        models.insert(model.id.clone(), model.clone());
        if let Err(e) = self.persist(&models) {
            models.remove(&model.id);
            return Err(e);
        }
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Model> {
        self.models
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| AimaError::ModelNotFound {
                model_id: id.to_string(),
            })
    }

    async fn list(&self, filter: &ModelFilter) -> Result<(Vec<Model>, usize)> {
        let mut matched: Vec<Model> = self
            .models
            .read()
            .await
            .values()
            .filter(|m| filter.matches(m))
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(paginate(matched, filter.limit, filter.offset))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut models = self.models.write().await;
        let removed = models.remove(id).ok_or_else(|| AimaError::ModelNotFound {
            model_id: id.to_string(),
        })?;
        if let Err(e) = self.persist(&models) {
            models.insert(removed.id.clone(), removed);
            return Err(e);
        }
        Ok(())
    }

    async fn update(&self, model: &Model) -> Result<()> {
        let mut models = self.models.write().await;
        let previous = match models.get_mut(&model.id) {
            Some(slot) => std::mem::replace(slot, model.clone()),
            None => {
                return Err(AimaError::ModelNotFound {
                    model_id: model.id.clone(),
                })
            }
        };
        if let Err(e) = self.persist(&models) {
            models.insert(previous.id.clone(), previous);
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelFormat, ModelType};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let model = Model::new("llama3", ModelType::Llm, ModelFormat::Gguf);
        {
            let store = FileModelStore::open(dir.path()).unwrap();
            store.create(&model).await.unwrap();
        }

        let store = FileModelStore::open(dir.path()).unwrap();
        assert_eq!(store.get(&model.id).await.unwrap(), model);
        assert!(dir.path().join("models.json").exists());

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw[&model.id]["name"], "llama3");
    }

    #[tokio::test]
    async fn test_delete_and_update_persist() {
        let dir = TempDir::new().unwrap();
        let store = FileModelStore::open(dir.path()).unwrap();
        let mut a = Model::new("a", ModelType::Llm, ModelFormat::Gguf);
        let b = Model::new("b", ModelType::Asr, ModelFormat::Onnx);
        store.create(&a).await.unwrap();
        store.create(&b).await.unwrap();

        a.size = 42;
        store.update(&a).await.unwrap();
        store.delete(&b.id).await.unwrap();

        let reopened = FileModelStore::open(dir.path()).unwrap();
        assert_eq!(reopened.get(&a.id).await.unwrap().size, 42);
        assert_eq!(
            reopened.get(&b.id).await.unwrap_err().code(),
            "MODEL_NOT_FOUND"
        );
        let (_, total) = reopened.list(&ModelFilter::default()).await.unwrap();
        assert_eq!(total, 1);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("models.json");
        fs::write(&path, "{not json").unwrap();
        assert!(FileModelStore::open_file(&path).is_err());
    }
}
