//! Start/complete/fail event emission around a unit execution.

use super::{Event, EventPublisher};
use crate::error::AimaError;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;

/// Execution scope for one unit invocation.
///
/// Emits `<unit>.started` on open and exactly one of `<unit>.completed` or
/// `<unit>.failed` on close. All events carry the request id as correlation id.
pub struct ExecutionContext {
    events: Arc<dyn EventPublisher>,
    domain: String,
    unit: String,
    correlation_id: String,
    started: Instant,
}

impl ExecutionContext {
    /// Open a context and publish the `started` event with the unit input.
    pub fn start(
        events: Arc<dyn EventPublisher>,
        domain: &str,
        unit: &str,
        correlation_id: &str,
        input: &Value,
    ) -> Self {
        let ctx = Self {
            events,
            domain: domain.to_string(),
            unit: unit.to_string(),
            correlation_id: correlation_id.to_string(),
            started: Instant::now(),
        };
        ctx.emit("started", json!({ "input": input }));
        ctx
    }

    /// Milliseconds elapsed since the context was opened.
    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    pub fn complete(self, output: &Value) {
        let duration_ms = self.elapsed_ms();
        self.emit(
            "completed",
            json!({ "output": output, "duration_ms": duration_ms }),
        );
    }

    pub fn fail(self, error: &AimaError) {
        let duration_ms = self.elapsed_ms();
        self.emit(
            "failed",
            json!({
                "code": error.code(),
                "message": error.to_string(),
                "duration_ms": duration_ms,
            }),
        );
    }

    fn emit(&self, phase: &str, payload: Value) {
        self.events.emit(
            Event::new(format!("{}.{}", self.unit, phase), &self.domain, payload)
                .with_correlation_id(&self.correlation_id),
        );
    }
}
