//! Service domain commands.

use super::events;
use super::provider::ServiceProvider;
use super::store::ServiceStore;
use super::types::{ModelService, ResourceClass, ServiceStatus};
use super::{require_provider, require_service_id, service_id_schema, DOMAIN};
use crate::error::{AimaError, Result};
use crate::events::{noop_publisher, EventPublisher};
use crate::model::ModelStore;
use crate::schema::Schema;
use crate::unit::{decode_input, lenient_int, require_non_empty, Command, Example, UnitContext, UnitDescriptor};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

fn success_schema() -> Schema {
    Schema::object().property("success", Schema::boolean())
}

// ========================================
// service.create
// ========================================

#[derive(Debug, Deserialize)]
struct CreateInput {
    #[serde(default)]
    model_id: String,
    #[serde(default)]
    resource_class: Option<ResourceClass>,
    #[serde(default, deserialize_with = "lenient_int")]
    replicas: Option<u32>,
}

/// Create a service record for a model.
pub struct CreateCommand {
    store: Arc<dyn ServiceStore>,
    provider: Option<Arc<dyn ServiceProvider>>,
    models: Option<Arc<dyn ModelStore>>,
    events: Arc<dyn EventPublisher>,
}

impl CreateCommand {
    pub fn new(store: Arc<dyn ServiceStore>, provider: Option<Arc<dyn ServiceProvider>>) -> Self {
        Self {
            store,
            provider,
            models: None,
            events: noop_publisher(),
        }
    }

    /// Reject model ids that this store does not know.
    pub fn with_model_store(mut self, models: Arc<dyn ModelStore>) -> Self {
        self.models = Some(models);
        self
    }

    pub fn with_events(mut self, events: Arc<dyn EventPublisher>) -> Self {
        self.events = events;
        self
    }
}

impl UnitDescriptor for CreateCommand {
    fn name(&self) -> &str {
        "service.create"
    }

    fn domain(&self) -> &str {
        DOMAIN
    }

    fn description(&self) -> &str {
        "Create a new model service"
    }

    fn input_schema(&self) -> Schema {
        Schema::object()
            .property("model_id", Schema::string().describe("Model to serve").min_length(1))
            .property(
                "resource_class",
                Schema::string_enum(ResourceClass::names())
                    .describe("Resource class")
                    .default_value(json!("medium")),
            )
            .property(
                "replicas",
                Schema::number()
                    .describe("Number of replicas")
                    .min(1.0)
                    .default_value(json!(1)),
            )
            .required(&["model_id"])
    }

    fn output_schema(&self) -> Schema {
        Schema::object().property("service_id", Schema::string())
    }

    fn examples(&self) -> Vec<Example> {
        vec![
            Example::new(
                "Create a service with defaults",
                json!({"model_id": "model-1a2b3c4d"}),
                json!({"service_id": "svc-1a2b3c4d"}),
            ),
            Example::new(
                "Create a large service with 3 replicas",
                json!({"model_id": "model-1a2b3c4d", "resource_class": "large", "replicas": 3}),
                json!({"service_id": "svc-1a2b3c4d"}),
            ),
        ]
    }
}

#[async_trait]
impl Command for CreateCommand {
    async fn execute(&self, ctx: &UnitContext, input: Value) -> Result<Value> {
        let provider = require_provider(&self.provider)?;
        let input: CreateInput = decode_input(DOMAIN, input)?;
        require_non_empty(DOMAIN, "model_id", &input.model_id)?;

        if let Some(models) = &self.models {
            models
                .get(&input.model_id)
                .await
                .map_err(|e| e.context(format!("create service for {}", input.model_id)))?;
        }

        let replicas = input.replicas.filter(|r| *r > 0).unwrap_or(1);
        let mut service = provider
            .create(
                &input.model_id,
                input.resource_class.unwrap_or_default(),
                replicas,
            )
            .await
            .map_err(|e| e.context("create service"))?;
        service.status = ServiceStatus::Creating;

        self.store
            .create(&service)
            .await
            .map_err(|e| e.context("save service"))?;
        debug!("Created service {} for model {}", service.id, service.model_id);

        self.events.emit(events::created(&service, &ctx.request_id));
        Ok(json!({ "service_id": service.id }))
    }
}

// ========================================
// service.start
// ========================================

#[derive(Debug, Deserialize)]
struct ServiceIdInput {
    #[serde(default)]
    service_id: String,
}

/// Start a service.
pub struct StartCommand {
    store: Arc<dyn ServiceStore>,
    provider: Option<Arc<dyn ServiceProvider>>,
    events: Arc<dyn EventPublisher>,
}

impl StartCommand {
    pub fn new(store: Arc<dyn ServiceStore>, provider: Option<Arc<dyn ServiceProvider>>) -> Self {
        Self {
            store,
            provider,
            events: noop_publisher(),
        }
    }

    pub fn with_events(mut self, events: Arc<dyn EventPublisher>) -> Self {
        self.events = events;
        self
    }

    async fn mark_failed(&self, service: &mut ModelService) {
        service.status = ServiceStatus::Failed;
        service.active_replicas = 0;
        service.touch();
        if let Err(e) = self.store.update(service).await {
            warn!("Failed to mark service {} as failed: {}", service.id, e);
        }
    }
}

impl UnitDescriptor for StartCommand {
    fn name(&self) -> &str {
        "service.start"
    }

    fn domain(&self) -> &str {
        DOMAIN
    }

    fn description(&self) -> &str {
        "Start a model service"
    }

    fn input_schema(&self) -> Schema {
        Schema::object()
            .property("service_id", service_id_schema())
            .required(&["service_id"])
    }

    fn output_schema(&self) -> Schema {
        success_schema().property("endpoint", Schema::string())
    }

    fn examples(&self) -> Vec<Example> {
        vec![Example::new(
            "Start a service",
            json!({"service_id": "svc-1a2b3c4d"}),
            json!({"success": true, "endpoint": "http://127.0.0.1:8000"}),
        )]
    }
}

#[async_trait]
impl Command for StartCommand {
    async fn execute(&self, ctx: &UnitContext, input: Value) -> Result<Value> {
        let provider = require_provider(&self.provider)?;
        let input: ServiceIdInput = decode_input(DOMAIN, input)?;
        require_service_id(&input.service_id)?;

        let mut service = self
            .store
            .get(&input.service_id)
            .await
            .map_err(|e| e.context(format!("get service {}", input.service_id)))?;

        if service.status == ServiceStatus::Running {
            if provider.is_running(&service.id).await {
                return Err(AimaError::ServiceAlreadyRunning {
                    service_id: service.id,
                });
            }
            debug!("Service {} is marked running but is not; restarting", service.id);
        }

        let endpoint = match provider.start(&service).await {
            Ok(endpoint) => endpoint,
            Err(e) => {
                self.mark_failed(&mut service).await;
                return Err(e.context(format!("start service {}", service.id)));
            }
        };

        service.status = ServiceStatus::Running;
        service.active_replicas = service.replicas;
        service.endpoints = endpoint.iter().cloned().collect();
        service.touch();
        self.store
            .update(&service)
            .await
            .map_err(|e| e.context(format!("update service {}", service.id)))?;
        info!("Started service {}", service.id);

        self.events.emit(events::started(&service, &ctx.request_id));
        let mut output = json!({ "success": true });
        if let Some(endpoint) = endpoint {
            output["endpoint"] = json!(endpoint);
        }
        Ok(output)
    }
}

// ========================================
// service.stop
// ========================================

#[derive(Debug, Deserialize)]
struct StopInput {
    #[serde(default)]
    service_id: String,
    #[serde(default)]
    force: bool,
}

/// Stop a service.
pub struct StopCommand {
    store: Arc<dyn ServiceStore>,
    provider: Option<Arc<dyn ServiceProvider>>,
    events: Arc<dyn EventPublisher>,
}

impl StopCommand {
    pub fn new(store: Arc<dyn ServiceStore>, provider: Option<Arc<dyn ServiceProvider>>) -> Self {
        Self {
            store,
            provider,
            events: noop_publisher(),
        }
    }

    pub fn with_events(mut self, events: Arc<dyn EventPublisher>) -> Self {
        self.events = events;
        self
    }
}

impl UnitDescriptor for StopCommand {
    fn name(&self) -> &str {
        "service.stop"
    }

    fn domain(&self) -> &str {
        DOMAIN
    }

    fn description(&self) -> &str {
        "Stop a model service"
    }

    fn input_schema(&self) -> Schema {
        Schema::object()
            .property("service_id", service_id_schema())
            .property("force", Schema::boolean().describe("Stop without draining"))
            .required(&["service_id"])
    }

    fn output_schema(&self) -> Schema {
        success_schema()
    }

    fn examples(&self) -> Vec<Example> {
        vec![Example::new(
            "Force-stop a service",
            json!({"service_id": "svc-1a2b3c4d", "force": true}),
            json!({"success": true}),
        )]
    }
}

#[async_trait]
impl Command for StopCommand {
    async fn execute(&self, ctx: &UnitContext, input: Value) -> Result<Value> {
        let provider = require_provider(&self.provider)?;
        let input: StopInput = decode_input(DOMAIN, input)?;
        require_service_id(&input.service_id)?;

        let mut service = self
            .store
            .get(&input.service_id)
            .await
            .map_err(|e| e.context(format!("get service {}", input.service_id)))?;

        provider
            .stop(&service, input.force)
            .await
            .map_err(|e| e.context(format!("stop service {}", service.id)))?;

        service.status = ServiceStatus::Stopped;
        service.active_replicas = 0;
        service.endpoints.clear();
        service.touch();
        self.store
            .update(&service)
            .await
            .map_err(|e| e.context(format!("update service {}", service.id)))?;
        info!("Stopped service {} (force: {})", service.id, input.force);

        self.events
            .emit(events::stopped(&service, input.force, &ctx.request_id));
        Ok(json!({ "success": true }))
    }
}

// ========================================
// service.scale
// ========================================

#[derive(Debug, Deserialize)]
struct ScaleInput {
    #[serde(default)]
    service_id: String,
    #[serde(default, deserialize_with = "lenient_int")]
    replicas: Option<i64>,
}

/// Change a service's replica count.
pub struct ScaleCommand {
    store: Arc<dyn ServiceStore>,
    provider: Option<Arc<dyn ServiceProvider>>,
    events: Arc<dyn EventPublisher>,
}

impl ScaleCommand {
    pub fn new(store: Arc<dyn ServiceStore>, provider: Option<Arc<dyn ServiceProvider>>) -> Self {
        Self {
            store,
            provider,
            events: noop_publisher(),
        }
    }

    pub fn with_events(mut self, events: Arc<dyn EventPublisher>) -> Self {
        self.events = events;
        self
    }
}

impl UnitDescriptor for ScaleCommand {
    fn name(&self) -> &str {
        "service.scale"
    }

    fn domain(&self) -> &str {
        DOMAIN
    }

    fn description(&self) -> &str {
        "Scale service replicas up or down"
    }

    fn input_schema(&self) -> Schema {
        Schema::object()
            .property("service_id", service_id_schema())
            .property(
                "replicas",
                Schema::number().describe("Target number of replicas").min(0.0),
            )
            .required(&["service_id", "replicas"])
    }

    fn output_schema(&self) -> Schema {
        success_schema()
    }

    fn examples(&self) -> Vec<Example> {
        vec![Example::new(
            "Scale service to 5 replicas",
            json!({"service_id": "svc-1a2b3c4d", "replicas": 5}),
            json!({"success": true}),
        )]
    }
}

#[async_trait]
impl Command for ScaleCommand {
    async fn execute(&self, ctx: &UnitContext, input: Value) -> Result<Value> {
        let provider = require_provider(&self.provider)?;
        let input: ScaleInput = decode_input(DOMAIN, input)?;
        require_service_id(&input.service_id)?;
        let replicas = input
            .replicas
            .and_then(|r| u32::try_from(r).ok())
            .ok_or_else(|| {
                AimaError::invalid_input(DOMAIN, "replicas must be a non-negative integer")
            })?;

        let mut service = self
            .store
            .get(&input.service_id)
            .await
            .map_err(|e| e.context(format!("get service {}", input.service_id)))?;

        provider
            .scale(&service, replicas)
            .await
            .map_err(|e| e.context(format!("scale service {}", service.id)))?;

        let old_replicas = service.replicas;
        service.replicas = replicas;
        if service.status == ServiceStatus::Running {
            service.active_replicas = replicas;
        }
        service.touch();
        self.store
            .update(&service)
            .await
            .map_err(|e| e.context(format!("update service {}", service.id)))?;
        debug!("Scaled service {}: {} -> {}", service.id, old_replicas, replicas);

        self.events.emit(events::scaled(
            &service,
            old_replicas,
            replicas,
            &ctx.request_id,
        ));
        Ok(json!({ "success": true }))
    }
}

// ========================================
// service.delete
// ========================================

/// Delete a service, stopping it first when it runs.
pub struct DeleteCommand {
    store: Arc<dyn ServiceStore>,
    provider: Option<Arc<dyn ServiceProvider>>,
    events: Arc<dyn EventPublisher>,
}

impl DeleteCommand {
    pub fn new(store: Arc<dyn ServiceStore>, provider: Option<Arc<dyn ServiceProvider>>) -> Self {
        Self {
            store,
            provider,
            events: noop_publisher(),
        }
    }

    pub fn with_events(mut self, events: Arc<dyn EventPublisher>) -> Self {
        self.events = events;
        self
    }
}

impl UnitDescriptor for DeleteCommand {
    fn name(&self) -> &str {
        "service.delete"
    }

    fn domain(&self) -> &str {
        DOMAIN
    }

    fn description(&self) -> &str {
        "Delete a model service"
    }

    fn input_schema(&self) -> Schema {
        Schema::object()
            .property("service_id", service_id_schema())
            .required(&["service_id"])
    }

    fn output_schema(&self) -> Schema {
        success_schema()
    }

    fn examples(&self) -> Vec<Example> {
        vec![Example::new(
            "Delete a service",
            json!({"service_id": "svc-1a2b3c4d"}),
            json!({"success": true}),
        )]
    }
}

#[async_trait]
impl Command for DeleteCommand {
    async fn execute(&self, ctx: &UnitContext, input: Value) -> Result<Value> {
        let input: ServiceIdInput = decode_input(DOMAIN, input)?;
        require_service_id(&input.service_id)?;

        let service = self
            .store
            .get(&input.service_id)
            .await
            .map_err(|e| e.context(format!("delete service {}", input.service_id)))?;

        if let Some(provider) = &self.provider {
            if provider.is_running(&service.id).await {
                if let Err(e) = provider.stop(&service, true).await {
                    warn!("Failed to stop service {} before delete: {}", service.id, e);
                }
            }
        }

        self.store
            .delete(&service.id)
            .await
            .map_err(|e| e.context(format!("delete service {}", service.id)))?;
        debug!("Deleted service {}", service.id);

        self.events.emit(events::deleted(&service.id, &ctx.request_id));
        Ok(json!({ "success": true }))
    }
}
