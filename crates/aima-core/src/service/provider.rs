//! Service runtime contract.

use super::types::{ModelService, ResourceClass};
use crate::error::Result;
use async_trait::async_trait;

/// Runs model-serving services.
///
/// Calls receive the stored record so a runtime that lost its own state
/// (for example after a restart) can still act on it.
#[async_trait]
pub trait ServiceProvider: Send + Sync {
    /// Prepare a service for `model_id`. The returned record is persisted by
    /// the caller with status `creating`.
    async fn create(
        &self,
        model_id: &str,
        resource_class: ResourceClass,
        replicas: u32,
    ) -> Result<ModelService>;

    /// Start serving. Returns the endpoint when the runtime exposes one.
    async fn start(&self, service: &ModelService) -> Result<Option<String>>;

    async fn stop(&self, service: &ModelService, force: bool) -> Result<()>;

    async fn scale(&self, service: &ModelService, replicas: u32) -> Result<()>;

    /// Whether the runtime really has the service running.
    async fn is_running(&self, service_id: &str) -> bool;
}
