//! Service domain queries.

use super::store::ServiceStore;
use super::types::{ServiceFilter, ServiceStatus};
use super::{require_service_id, service_id_schema, service_schema, DOMAIN};
use crate::config::ListConfig;
use crate::error::Result;
use crate::schema::Schema;
use crate::unit::{decode_input, lenient_int, to_output, Example, Query, UnitContext, UnitDescriptor};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

// ========================================
// service.get
// ========================================

#[derive(Debug, Deserialize)]
struct GetInput {
    #[serde(default)]
    service_id: String,
}

/// Fetch a service by id, or by name when no id matches.
pub struct GetQuery {
    store: Arc<dyn ServiceStore>,
}

impl GetQuery {
    pub fn new(store: Arc<dyn ServiceStore>) -> Self {
        Self { store }
    }
}

impl UnitDescriptor for GetQuery {
    fn name(&self) -> &str {
        "service.get"
    }

    fn domain(&self) -> &str {
        DOMAIN
    }

    fn description(&self) -> &str {
        "Get service details"
    }

    fn input_schema(&self) -> Schema {
        Schema::object()
            .property("service_id", service_id_schema())
            .required(&["service_id"])
    }

    fn output_schema(&self) -> Schema {
        service_schema()
    }

    fn examples(&self) -> Vec<Example> {
        vec![Example::new(
            "Get service details",
            json!({"service_id": "svc-1a2b3c4d"}),
            json!({"id": "svc-1a2b3c4d", "model_id": "model-1a2b3c4d", "status": "running", "replicas": 2, "endpoints": ["http://127.0.0.1:8000"]}),
        )]
    }
}

#[async_trait]
impl Query for GetQuery {
    async fn execute(&self, _ctx: &UnitContext, input: Value) -> Result<Value> {
        let input: GetInput = decode_input(DOMAIN, input)?;
        require_service_id(&input.service_id)?;

        let service = match self.store.get(&input.service_id).await {
            Ok(service) => service,
            Err(e) if e.code() == "SERVICE_NOT_FOUND" => self
                .store
                .get_by_name(&input.service_id)
                .await
                .map_err(|e| e.context(format!("get service {}", input.service_id)))?,
            Err(e) => return Err(e.context(format!("get service {}", input.service_id))),
        };
        to_output(&service)
    }
}

// ========================================
// service.list
// ========================================

#[derive(Debug, Deserialize)]
struct ListInput {
    #[serde(default)]
    status: Option<ServiceStatus>,
    #[serde(default)]
    model_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_int")]
    limit: Option<usize>,
    #[serde(default, deserialize_with = "lenient_int")]
    offset: Option<usize>,
}

/// List services with filters and pagination.
pub struct ListQuery {
    store: Arc<dyn ServiceStore>,
}

impl ListQuery {
    pub fn new(store: Arc<dyn ServiceStore>) -> Self {
        Self { store }
    }
}

impl UnitDescriptor for ListQuery {
    fn name(&self) -> &str {
        "service.list"
    }

    fn domain(&self) -> &str {
        DOMAIN
    }

    fn description(&self) -> &str {
        "List services"
    }

    fn input_schema(&self) -> Schema {
        Schema::object()
            .property(
                "status",
                Schema::string_enum(ServiceStatus::names()).describe("Filter by status"),
            )
            .property("model_id", Schema::string().describe("Filter by model"))
            .property(
                "limit",
                Schema::number()
                    .min(1.0)
                    .max(ListConfig::LIST_DEFAULT_LIMIT as f64),
            )
            .property("offset", Schema::number().min(0.0))
    }

    fn output_schema(&self) -> Schema {
        Schema::object()
            .property("services", Schema::array(service_schema()))
            .property("total", Schema::number())
    }

    fn examples(&self) -> Vec<Example> {
        vec![Example::new(
            "List running services",
            json!({"status": "running"}),
            json!({"services": [{"id": "svc-1a2b3c4d", "model_id": "model-1a2b3c4d", "status": "running", "replicas": 2}], "total": 1}),
        )]
    }
}

#[async_trait]
impl Query for ListQuery {
    async fn execute(&self, _ctx: &UnitContext, input: Value) -> Result<Value> {
        let input: ListInput = decode_input(DOMAIN, input)?;
        let filter = ServiceFilter {
            status: input.status,
            model_id: input.model_id.filter(|m| !m.is_empty()),
            limit: input
                .limit
                .filter(|l| *l > 0)
                .unwrap_or(ListConfig::LIST_DEFAULT_LIMIT),
            offset: input.offset.unwrap_or(0),
        };

        let (services, total) = self
            .store
            .list(&filter)
            .await
            .map_err(|e| e.context("list services"))?;
        Ok(json!({ "services": services, "total": total }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{ModelService, ResourceClass};
    use crate::stores::MemoryServiceStore;

    async fn seeded() -> Arc<MemoryServiceStore> {
        let store = Arc::new(MemoryServiceStore::new());
        let mut a = ModelService::new("svc-00000001", "model-a", ResourceClass::Small, 1);
        a.status = ServiceStatus::Running;
        store.create(&a).await.unwrap();
        store
            .create(&ModelService::new("svc-00000002", "model-b", ResourceClass::Large, 2))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_get_by_id_or_name() {
        let query = GetQuery::new(seeded().await);
        let ctx = UnitContext::detached();

        let out = Query::execute(&query, &ctx, json!({"service_id": "svc-00000002"}))
            .await
            .unwrap();
        assert_eq!(out["resource_class"], "large");

        let out = Query::execute(&query, &ctx, json!({"service_id": "service-svc-00000001"}))
            .await
            .unwrap();
        assert_eq!(out["id"], "svc-00000001");

        let err = Query::execute(&query, &ctx, json!({"service_id": "svc-none"}))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "SERVICE_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_list_filters() {
        let query = ListQuery::new(seeded().await);
        let ctx = UnitContext::detached();

        let out = Query::execute(&query, &ctx, json!({})).await.unwrap();
        assert_eq!(out["total"], 2);

        let out = Query::execute(&query, &ctx, json!({"status": "running"}))
            .await
            .unwrap();
        assert_eq!(out["total"], 1);
        assert_eq!(out["services"][0]["model_id"], "model-a");

        let out = Query::execute(&query, &ctx, json!({"model_id": "model-b", "offset": 1}))
            .await
            .unwrap();
        assert_eq!(out["total"], 1);
        assert_eq!(out["services"], json!([]));
    }
}
