//! Domain events and the publisher seam.
//!
//! Units publish typed events (`model.created`, `catalog.recipe_matched`, ...)
//! through an [`EventPublisher`]. Publication is best-effort: failures are
//! logged and never surfaced to the caller.

mod bus;
mod execution;

pub use bus::{filters, EventBus, EventFilter, EventHandler, SubscriptionId};
pub use execution::ExecutionContext;

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tracing::warn;

/// A published domain event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: String,
    pub domain: String,
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl Event {
    pub fn new(event_type: impl Into<String>, domain: impl Into<String>, payload: Value) -> Self {
        Self {
            event_type: event_type.into(),
            domain: domain.into(),
            payload,
            timestamp: Utc::now(),
            correlation_id: None,
        }
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }
}

/// Sink for domain events.
pub trait EventPublisher: Send + Sync {
    /// Publish an event. Implementations must not block.
    fn publish(&self, event: Event) -> Result<()>;

    /// Publish and log any failure instead of returning it.
    fn emit(&self, event: Event) {
        let event_type = event.event_type.clone();
        if let Err(e) = self.publish(event) {
            warn!("Failed to publish event {}: {}", event_type, e);
        }
    }
}

/// Publisher that drops every event. Injected when no bus is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPublisher;

impl EventPublisher for NoopPublisher {
    fn publish(&self, _event: Event) -> Result<()> {
        Ok(())
    }
}

/// Shared no-op publisher.
pub fn noop_publisher() -> Arc<dyn EventPublisher> {
    Arc::new(NoopPublisher)
}

/// Publisher that keeps every event in memory, in publication order.
#[derive(Debug, Default)]
pub struct MemoryPublisher {
    events: Mutex<Vec<Event>>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all events published so far.
    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Event types published so far, in order.
    pub fn event_types(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .map(|e| e.event_type)
            .collect()
    }

    /// Events of one type.
    pub fn events_of(&self, event_type: &str) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| e.event_type == event_type)
            .collect()
    }
}

impl EventPublisher for MemoryPublisher {
    fn publish(&self, event: Event) -> Result<()> {
        self.events
            .lock()
            .map_err(|e| crate::error::AimaError::internal(format!("event log poisoned: {}", e)))?
            .push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AimaError;
    use serde_json::json;

    struct FailingPublisher;

    impl EventPublisher for FailingPublisher {
        fn publish(&self, _event: Event) -> Result<()> {
            Err(AimaError::internal("bus down"))
        }
    }

    #[test]
    fn test_event_serialization() {
        let event = Event::new("model.created", "model", json!({"model_id": "model-1"}))
            .with_correlation_id("req_1");
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "model.created");
        assert_eq!(value["domain"], "model");
        assert_eq!(value["correlation_id"], "req_1");
    }

    #[test]
    fn test_emit_swallows_errors() {
        FailingPublisher.emit(Event::new("x.y", "x", Value::Null));
    }

    #[test]
    fn test_memory_publisher_records_in_order() {
        let publisher = MemoryPublisher::new();
        publisher.emit(Event::new("a.one", "a", Value::Null));
        publisher.emit(Event::new("a.two", "a", Value::Null));
        assert_eq!(publisher.event_types(), vec!["a.one", "a.two"]);
        assert_eq!(publisher.events_of("a.two").len(), 1);
    }
}
