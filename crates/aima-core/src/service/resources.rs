//! Service domain resources.

use super::store::ServiceStore;
use super::types::ServiceFilter;
use super::{service_schema, DOMAIN};
use crate::error::{AimaError, Result};
use crate::schema::Schema;
use crate::unit::{to_output, Resource, ResourceFactory, UnitContext};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

pub const SERVICES_URI: &str = "asms://services";
const SERVICE_URI_PREFIX: &str = "asms://service/";

/// Extract the service id from `asms://service/<id>`.
pub fn parse_service_uri(uri: &str) -> Result<&str> {
    match uri.strip_prefix(SERVICE_URI_PREFIX) {
        Some(id) if !id.is_empty() && !id.contains('/') => Ok(id),
        _ => Err(AimaError::ResourceNotFound {
            uri: uri.to_string(),
        }),
    }
}

/// A single service, watchable for status changes.
pub struct ServiceResource {
    service_id: String,
    store: Arc<dyn ServiceStore>,
}

impl ServiceResource {
    pub fn new(service_id: impl Into<String>, store: Arc<dyn ServiceStore>) -> Self {
        Self {
            service_id: service_id.into(),
            store,
        }
    }
}

#[async_trait]
impl Resource for ServiceResource {
    fn uri(&self) -> String {
        format!("{}{}", SERVICE_URI_PREFIX, self.service_id)
    }

    fn domain(&self) -> &str {
        DOMAIN
    }

    fn schema(&self) -> Schema {
        service_schema()
    }

    async fn get(&self, _ctx: &UnitContext) -> Result<Value> {
        to_output(&self.store.get(&self.service_id).await?)
    }

    fn watchable(&self) -> bool {
        true
    }
}

/// Every service.
pub struct ServicesResource {
    store: Arc<dyn ServiceStore>,
}

impl ServicesResource {
    pub fn new(store: Arc<dyn ServiceStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Resource for ServicesResource {
    fn uri(&self) -> String {
        SERVICES_URI.to_string()
    }

    fn domain(&self) -> &str {
        DOMAIN
    }

    fn schema(&self) -> Schema {
        Schema::object()
            .property("services", Schema::array(service_schema()))
            .property("total", Schema::number())
    }

    async fn get(&self, _ctx: &UnitContext) -> Result<Value> {
        let (services, total) = self.store.list(&ServiceFilter::default()).await?;
        Ok(json!({ "services": services, "total": total }))
    }
}

/// Builds [`ServiceResource`]s for `asms://service/*`.
pub struct ServiceResourceFactory {
    store: Arc<dyn ServiceStore>,
}

impl ServiceResourceFactory {
    pub fn new(store: Arc<dyn ServiceStore>) -> Self {
        Self { store }
    }
}

impl ResourceFactory for ServiceResourceFactory {
    fn pattern(&self) -> &str {
        "asms://service/*"
    }

    fn can_create(&self, uri: &str) -> bool {
        parse_service_uri(uri).is_ok()
    }

    fn create(&self, uri: &str) -> Result<Arc<dyn Resource>> {
        let id = parse_service_uri(uri)?;
        Ok(Arc::new(ServiceResource::new(id, self.store.clone())))
    }
}
