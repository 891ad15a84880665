//! Persistence contract for services.

use super::types::{ModelService, ServiceFilter};
use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait ServiceStore: Send + Sync {
    /// Fails with `SERVICE_ALREADY_EXISTS` when the id is taken.
    async fn create(&self, service: &ModelService) -> Result<()>;

    /// Fails with `SERVICE_NOT_FOUND`.
    async fn get(&self, id: &str) -> Result<ModelService>;

    /// Fails with `SERVICE_NOT_FOUND`.
    async fn get_by_name(&self, name: &str) -> Result<ModelService>;

    async fn list(&self, filter: &ServiceFilter) -> Result<(Vec<ModelService>, usize)>;

    async fn delete(&self, id: &str) -> Result<()>;

    async fn update(&self, service: &ModelService) -> Result<()>;
}
