//! AIMA Core - unit-dispatch control plane for AI model infrastructure.
//!
//! Every capability is a named *unit* (`model.pull`, `catalog.match`,
//! `service.start`, `inference.chat`, ...) registered in a [`Registry`] and
//! reached through a single [`Gateway`] entry point that validates requests,
//! enforces timeouts and cancellation, and answers with a uniform
//! [`Response`] envelope. Long-running operations report on an [`EventBus`].
//!
//! # Example
//!
//! ```rust,ignore
//! use aima_core::{AimaApi, Request};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> aima_core::Result<()> {
//!     let api = AimaApi::builder().build().await?;
//!
//!     let resp = api
//!         .handle(Some(Request::command(
//!             "model.pull",
//!             json!({"source": "ollama", "repo": "llama3"}),
//!         )))
//!         .await;
//!     println!("{}", serde_json::to_string_pretty(&resp)?);
//!
//!     api.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod cancel;
pub mod catalog;
pub mod config;
pub mod error;
pub mod events;
pub mod gateway;
pub mod hashing;
pub mod ids;
pub mod inference;
pub mod model;
pub mod providers;
pub mod registry;
pub mod schema;
pub mod service;
pub mod stores;
pub mod unit;

mod api;

// Re-export commonly used types
pub use cancel::CancellationToken;
pub use error::{http_status_for_code, AimaError, Result, ResultExt};
pub use events::{Event, EventBus, EventFilter, EventPublisher};
pub use gateway::{Gateway, Request, RequestType, Response};
pub use registry::Registry;
pub use schema::Schema;
pub use unit::{Command, Query, Resource, ResourceFactory, UnitContext, UnitDescriptor};

pub use api::{AimaApiBuilder, StoreBackend};

use catalog::RecipeStore;
use model::ModelStore;
use service::ServiceStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Assembled control plane: stores, providers, registry and gateway.
///
/// Transports (the RPC server, tests, embedders) hold one of these and feed
/// requests to [`AimaApi::handle`].
pub struct AimaApi {
    gateway: Arc<Gateway>,
    registry: Arc<Registry>,
    bus: Arc<EventBus>,
    models: Arc<dyn ModelStore>,
    recipes: Arc<dyn RecipeStore>,
    services: Arc<dyn ServiceStore>,
    data_dir: PathBuf,
}

impl AimaApi {
    /// Create a builder for AimaApi.
    pub fn builder() -> AimaApiBuilder {
        AimaApiBuilder::new()
    }

    pub fn gateway(&self) -> &Arc<Gateway> {
        &self.gateway
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// The shared event bus; subscribe here to follow pulls and service changes.
    pub fn events(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn model_store(&self) -> &Arc<dyn ModelStore> {
        &self.models
    }

    pub fn recipe_store(&self) -> &Arc<dyn RecipeStore> {
        &self.recipes
    }

    pub fn service_store(&self) -> &Arc<dyn ServiceStore> {
        &self.services
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Dispatch a request through the gateway.
    pub async fn handle(&self, request: Option<Request>) -> Response {
        self.gateway.handle(request).await
    }

    /// Close the event bus, draining events already queued.
    pub async fn shutdown(&self) {
        info!("Shutting down AIMA");
        self.bus.close().await;
    }
}
