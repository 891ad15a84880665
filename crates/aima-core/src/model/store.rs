//! Persistence contract for model records.

use super::types::{Model, ModelFilter};
use crate::error::Result;
use async_trait::async_trait;

/// CRUD over model records.
///
/// Implementations return owned copies; callers never hold references into
/// store state. `list` returns the page plus the total number of matches
/// before pagination.
#[async_trait]
pub trait ModelStore: Send + Sync {
    /// Fails with `MODEL_ALREADY_EXISTS` when the id is taken.
    async fn create(&self, model: &Model) -> Result<()>;

    /// Fails with `MODEL_NOT_FOUND`.
    async fn get(&self, id: &str) -> Result<Model>;

    async fn list(&self, filter: &ModelFilter) -> Result<(Vec<Model>, usize)>;

    /// Fails with `MODEL_NOT_FOUND`.
    async fn delete(&self, id: &str) -> Result<()>;

    /// Fails with `MODEL_NOT_FOUND`.
    async fn update(&self, model: &Model) -> Result<()>;
}
