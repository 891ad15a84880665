//! Service domain events.

use super::types::ModelService;
use crate::events::Event;
use serde_json::json;

pub const SERVICE_CREATED: &str = "service.created";
pub const SERVICE_STARTED: &str = "service.started";
pub const SERVICE_STOPPED: &str = "service.stopped";
pub const SERVICE_SCALED: &str = "service.scaled";
pub const SERVICE_DELETED: &str = "service.deleted";

const DOMAIN: &str = "service";

pub fn created(service: &ModelService, correlation_id: &str) -> Event {
    Event::new(
        SERVICE_CREATED,
        DOMAIN,
        json!({
            "service_id": service.id,
            "model_id": service.model_id,
            "status": service.status,
            "replicas": service.replicas,
            "resource_class": service.resource_class,
        }),
    )
    .with_correlation_id(correlation_id)
}

pub fn started(service: &ModelService, correlation_id: &str) -> Event {
    Event::new(
        SERVICE_STARTED,
        DOMAIN,
        json!({
            "service_id": service.id,
            "model_id": service.model_id,
            "endpoints": service.endpoints,
        }),
    )
    .with_correlation_id(correlation_id)
}

pub fn stopped(service: &ModelService, force: bool, correlation_id: &str) -> Event {
    Event::new(
        SERVICE_STOPPED,
        DOMAIN,
        json!({ "service_id": service.id, "model_id": service.model_id, "force": force }),
    )
    .with_correlation_id(correlation_id)
}

pub fn scaled(
    service: &ModelService,
    old_replicas: u32,
    new_replicas: u32,
    correlation_id: &str,
) -> Event {
    Event::new(
        SERVICE_SCALED,
        DOMAIN,
        json!({
            "service_id": service.id,
            "model_id": service.model_id,
            "old_replicas": old_replicas,
            "new_replicas": new_replicas,
        }),
    )
    .with_correlation_id(correlation_id)
}

pub fn deleted(service_id: &str, correlation_id: &str) -> Event {
    Event::new(SERVICE_DELETED, DOMAIN, json!({ "service_id": service_id }))
        .with_correlation_id(correlation_id)
}
