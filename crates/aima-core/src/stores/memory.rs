//! In-memory stores.
//!
//! Records live in insertion order so listings are stable, which the catalog
//! matcher relies on for tie-breaking. Every read returns clones.

use super::paginate;
use crate::catalog::{Recipe, RecipeFilter, RecipeStore};
use crate::error::{AimaError, Result};
use crate::model::{Model, ModelFilter, ModelStore};
use crate::service::{ModelService, ServiceFilter, ServiceStore};
use async_trait::async_trait;
use tokio::sync::RwLock;

// ========================================
// Models
// ========================================

#[derive(Default)]
pub struct MemoryModelStore {
    models: RwLock<Vec<Model>>,
}

impl MemoryModelStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ModelStore for MemoryModelStore {
    async fn create(&self, model: &Model) -> Result<()> {
        let mut models = self.models.write().await;
        if models.iter().any(|m| m.id == model.id) {
            return Err(AimaError::ModelAlreadyExists {
                model_id: model.id.clone(),
            });
        }
        models.push(model.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Model> {
        self.models
            .read()
            .await
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or_else(|| AimaError::ModelNotFound {
                model_id: id.to_string(),
            })
    }

    async fn list(&self, filter: &ModelFilter) -> Result<(Vec<Model>, usize)> {
        let matched: Vec<Model> = self
            .models
            .read()
            .await
            .iter()
            .filter(|m| filter.matches(m))
            .cloned()
            .collect();
        Ok(paginate(matched, filter.limit, filter.offset))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut models = self.models.write().await;
        let idx = models
            .iter()
            .position(|m| m.id == id)
            .ok_or_else(|| AimaError::ModelNotFound {
                model_id: id.to_string(),
            })?;
        models.remove(idx);
        Ok(())
    }

    async fn update(&self, model: &Model) -> Result<()> {
        let mut models = self.models.write().await;
        let slot = models
            .iter_mut()
            .find(|m| m.id == model.id)
            .ok_or_else(|| AimaError::ModelNotFound {
                model_id: model.id.clone(),
            })?;
        *slot = model.clone();
        Ok(())
    }
}

// ========================================
// Recipes
// ========================================

#[derive(Default)]
pub struct MemoryRecipeStore {
    recipes: RwLock<Vec<Recipe>>,
}

impl MemoryRecipeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecipeStore for MemoryRecipeStore {
    async fn create(&self, recipe: &Recipe) -> Result<()> {
        let mut recipes = self.recipes.write().await;
        if recipes.iter().any(|r| r.id == recipe.id) {
            return Err(AimaError::RecipeAlreadyExists {
                recipe_id: recipe.id.clone(),
            });
        }
        recipes.push(recipe.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Recipe> {
        self.recipes
            .read()
            .await
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| AimaError::RecipeNotFound {
                recipe_id: id.to_string(),
            })
    }

    async fn list(&self, filter: &RecipeFilter) -> Result<(Vec<Recipe>, usize)> {
        let matched: Vec<Recipe> = self
            .recipes
            .read()
            .await
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        Ok(paginate(matched, filter.limit, filter.offset))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut recipes = self.recipes.write().await;
        let before = recipes.len();
        recipes.retain(|r| r.id != id);
        if recipes.len() == before {
            return Err(AimaError::RecipeNotFound {
                recipe_id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn update(&self, recipe: &Recipe) -> Result<()> {
        let mut recipes = self.recipes.write().await;
        let slot = recipes
            .iter_mut()
            .find(|r| r.id == recipe.id)
            .ok_or_else(|| AimaError::RecipeNotFound {
                recipe_id: recipe.id.clone(),
            })?;
        *slot = recipe.clone();
        Ok(())
    }
}

// ========================================
// Services
// ========================================

#[derive(Default)]
pub struct MemoryServiceStore {
    services: RwLock<Vec<ModelService>>,
}

impl MemoryServiceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ServiceStore for MemoryServiceStore {
    async fn create(&self, service: &ModelService) -> Result<()> {
        let mut services = self.services.write().await;
        if services.iter().any(|s| s.id == service.id) {
            return Err(AimaError::ServiceAlreadyExists {
                service_id: service.id.clone(),
            });
        }
        services.push(service.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<ModelService> {
        self.services
            .read()
            .await
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| AimaError::ServiceNotFound {
                service_id: id.to_string(),
            })
    }

    async fn get_by_name(&self, name: &str) -> Result<ModelService> {
        self.services
            .read()
            .await
            .iter()
            .find(|s| s.name == name)
            .cloned()
            .ok_or_else(|| AimaError::ServiceNotFound {
                service_id: name.to_string(),
            })
    }

    async fn list(&self, filter: &ServiceFilter) -> Result<(Vec<ModelService>, usize)> {
        let matched: Vec<ModelService> = self
            .services
            .read()
            .await
            .iter()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        Ok(paginate(matched, filter.limit, filter.offset))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut services = self.services.write().await;
        let before = services.len();
        services.retain(|s| s.id != id);
        if services.len() == before {
            return Err(AimaError::ServiceNotFound {
                service_id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn update(&self, service: &ModelService) -> Result<()> {
        let mut services = self.services.write().await;
        let slot = services
            .iter_mut()
            .find(|s| s.id == service.id)
            .ok_or_else(|| AimaError::ServiceNotFound {
                service_id: service.id.clone(),
            })?;
        *slot = service.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelFormat, ModelStatus, ModelType};
    use crate::service::{ResourceClass, ServiceStatus};

    #[tokio::test]
    async fn test_model_crud() {
        let store = MemoryModelStore::new();
        let mut model = Model::new("m", ModelType::Llm, ModelFormat::Gguf);
        store.create(&model).await.unwrap();
        assert_eq!(
            store.create(&model).await.unwrap_err().code(),
            "MODEL_ALREADY_EXISTS"
        );
        assert_eq!(store.get(&model.id).await.unwrap(), model);

        model.status = ModelStatus::Ready;
        store.update(&model).await.unwrap();
        assert_eq!(store.get(&model.id).await.unwrap().status, ModelStatus::Ready);

        store.delete(&model.id).await.unwrap();
        assert_eq!(
            store.delete(&model.id).await.unwrap_err().code(),
            "MODEL_NOT_FOUND"
        );
        assert_eq!(
            store.update(&model).await.unwrap_err().code(),
            "MODEL_NOT_FOUND"
        );
    }

    #[tokio::test]
    async fn test_returned_copies_are_detached() {
        let store = MemoryModelStore::new();
        let model = Model::new("m", ModelType::Llm, ModelFormat::Gguf);
        store.create(&model).await.unwrap();

        let mut copy = store.get(&model.id).await.unwrap();
        copy.name = "changed".into();
        assert_eq!(store.get(&model.id).await.unwrap().name, "m");
    }

    #[tokio::test]
    async fn test_recipe_list_keeps_insertion_order() {
        let store = MemoryRecipeStore::new();
        for i in 0..5 {
            let recipe = Recipe {
                id: format!("recipe-{}", i),
                name: format!("r{}", i),
                ..Default::default()
            };
            store.create(&recipe).await.unwrap();
        }
        let (page, total) = store
            .list(&RecipeFilter {
                limit: 2,
                offset: 1,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(total, 5);
        assert_eq!(
            page.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
            ["recipe-1", "recipe-2"]
        );
    }

    #[tokio::test]
    async fn test_service_lookup_by_name_and_filter() {
        let store = MemoryServiceStore::new();
        let mut a = ModelService::new("svc-a", "model-1", ResourceClass::Small, 1);
        a.status = ServiceStatus::Running;
        let b = ModelService::new("svc-b", "model-2", ResourceClass::Small, 1);
        store.create(&a).await.unwrap();
        store.create(&b).await.unwrap();

        assert_eq!(store.get_by_name("service-svc-b").await.unwrap().id, "svc-b");
        let (running, total) = store
            .list(&ServiceFilter {
                status: Some(ServiceStatus::Running),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(running[0].id, "svc-a");
        assert_eq!(
            store.get("svc-x").await.unwrap_err().code(),
            "SERVICE_NOT_FOUND"
        );
    }
}
