//! Model domain events.

use super::types::{Model, PullProgress, VerificationResult};
use crate::events::Event;
use serde_json::json;

pub const MODEL_CREATED: &str = "model.created";
pub const MODEL_DELETED: &str = "model.deleted";
pub const MODEL_PULL_PROGRESS: &str = "model.pull_progress";
pub const MODEL_VERIFIED: &str = "model.verified";

const DOMAIN: &str = "model";

pub fn created(model: &Model, correlation_id: &str) -> Event {
    Event::new(
        MODEL_CREATED,
        DOMAIN,
        json!({
            "model_id": model.id,
            "name": model.name,
            "type": model.model_type,
            "format": model.format,
            "source": model.source,
            "created_at": model.created_at,
        }),
    )
    .with_correlation_id(correlation_id)
}

pub fn deleted(model_id: &str, name: &str, correlation_id: &str) -> Event {
    Event::new(
        MODEL_DELETED,
        DOMAIN,
        json!({ "model_id": model_id, "name": name }),
    )
    .with_correlation_id(correlation_id)
}

pub fn pull_progress(progress: &PullProgress, correlation_id: &str) -> Event {
    Event::new(
        MODEL_PULL_PROGRESS,
        DOMAIN,
        json!({
            "model_id": progress.model_id,
            "status": progress.status,
            "progress": progress.progress,
            "bytes_total": progress.bytes_total,
            "bytes_done": progress.bytes_done,
            "speed": progress.speed,
            "error": progress.error,
        }),
    )
    .with_correlation_id(correlation_id)
}

pub fn verified(model_id: &str, result: &VerificationResult, correlation_id: &str) -> Event {
    Event::new(
        MODEL_VERIFIED,
        DOMAIN,
        json!({
            "model_id": model_id,
            "valid": result.valid,
            "issues": result.issues,
        }),
    )
    .with_correlation_id(correlation_id)
}
