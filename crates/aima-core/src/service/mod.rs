//! Service domain: model-serving services and their lifecycle.
//!
//! Units registered by this module:
//!
//! | Name | Kind |
//! |---|---|
//! | `service.create`, `service.start`, `service.stop`, `service.scale`, `service.delete` | command |
//! | `service.get`, `service.list` | query |
//! | `asms://services`, `asms://service/<id>` (watchable) | resource |

mod commands;
pub mod events;
mod provider;
mod queries;
mod resources;
mod store;
mod types;

pub use commands::{CreateCommand, DeleteCommand, ScaleCommand, StartCommand, StopCommand};
pub use provider::ServiceProvider;
pub use queries::{GetQuery, ListQuery};
pub use resources::{parse_service_uri, ServiceResource, ServiceResourceFactory, ServicesResource};
pub use store::ServiceStore;
pub use types::{
    generate_service_id, ModelService, ResourceClass, ServiceFilter, ServiceStatus,
};

use crate::error::{AimaError, Result};
use crate::schema::Schema;
use std::sync::Arc;

pub(crate) const DOMAIN: &str = "service";

fn require_provider(
    provider: &Option<Arc<dyn ServiceProvider>>,
) -> Result<&Arc<dyn ServiceProvider>> {
    provider.as_ref().ok_or_else(|| AimaError::ProviderNotSet {
        domain: DOMAIN.to_string(),
    })
}

fn require_service_id(service_id: &str) -> Result<()> {
    if service_id.trim().is_empty() {
        return Err(AimaError::invalid_input(DOMAIN, "service_id is required"));
    }
    Ok(())
}

fn service_id_schema() -> Schema {
    Schema::string()
        .describe("Service identifier")
        .example(serde_json::json!("svc-1a2b3c4d"))
}

/// Schema of a serialized [`ModelService`].
pub(crate) fn service_schema() -> Schema {
    Schema::object()
        .describe("Model service")
        .property("id", Schema::string())
        .property("name", Schema::string())
        .property("model_id", Schema::string())
        .property("status", Schema::string_enum(ServiceStatus::names()))
        .property("replicas", Schema::number())
        .property("resource_class", Schema::string_enum(ResourceClass::names()))
        .property("endpoints", Schema::array(Schema::string()))
        .property("active_replicas", Schema::number())
        .property("config", Schema::object())
        .property("created_at", Schema::number())
        .property("updated_at", Schema::number())
}
