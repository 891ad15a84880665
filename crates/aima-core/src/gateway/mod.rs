//! Single entry point for every request.
//!
//! The gateway validates the envelope, resolves the target unit in the
//! registry, runs it on its own task under a timeout and the caller's
//! cancellation token, and always answers with a [`Response`] envelope.
//! Panics, timeouts and cancellation surface as `INTERNAL_ERROR`, `TIMEOUT`
//! and `CANCELLED` responses; nothing escapes to the transport.

mod auth;
mod types;

pub use auth::{Authenticator, StaticTokenAuthenticator};
pub use types::{ErrorInfo, Request, RequestType, Response};

use crate::cancel::CancellationToken;
use crate::config::{GatewayConfig, ResourceConfig};
use crate::error::{AimaError, Result};
use crate::events::{noop_publisher, EventPublisher, ExecutionContext};
use crate::registry::Registry;
use crate::schema::Schema;
use crate::unit::{watch_resource, Command, Query, Resource, ResourceUpdate, UnitContext};
use serde_json::Value;
use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Generate a request id: `req_` followed by 32 hex characters.
pub fn generate_request_id() -> String {
    let bytes: [u8; 16] = rand::random();
    format!("{}{}", GatewayConfig::REQUEST_ID_PREFIX, hex::encode(bytes))
}

enum Target {
    Command(Arc<dyn Command>),
    Query(Arc<dyn Query>),
    Resource(Arc<dyn Resource>),
}

impl Target {
    fn domain(&self) -> String {
        match self {
            Target::Command(c) => c.domain().to_string(),
            Target::Query(q) => q.domain().to_string(),
            Target::Resource(r) => r.domain().to_string(),
        }
    }

    fn input_schema(&self) -> Option<Schema> {
        match self {
            Target::Command(c) => Some(c.input_schema()),
            Target::Query(q) => Some(q.input_schema()),
            Target::Resource(_) => None,
        }
    }
}

/// Request router in front of the registry.
pub struct Gateway {
    registry: Arc<Registry>,
    events: Arc<dyn EventPublisher>,
    authenticator: Option<Arc<dyn Authenticator>>,
    timeout: Duration,
    watch_interval: Duration,
    validate_input: bool,
}

impl Gateway {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            events: noop_publisher(),
            authenticator: None,
            timeout: GatewayConfig::DEFAULT_TIMEOUT,
            watch_interval: ResourceConfig::WATCH_INTERVAL,
            validate_input: true,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_events(mut self, events: Arc<dyn EventPublisher>) -> Self {
        self.events = events;
        self
    }

    pub fn with_authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    pub fn with_watch_interval(mut self, interval: Duration) -> Self {
        self.watch_interval = interval;
        self
    }

    /// Enable or disable schema validation of command and query inputs.
    pub fn with_input_validation(mut self, enabled: bool) -> Self {
        self.validate_input = enabled;
        self
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    // ========================================
    // Request handling
    // ========================================

    /// Handle a request with no caller-side cancellation.
    pub async fn handle(&self, request: Option<Request>) -> Response {
        self.handle_with_cancel(request, CancellationToken::new())
            .await
    }

    /// Handle a request; firing `cancel` aborts the unit with `CANCELLED`.
    pub async fn handle_with_cancel(
        &self,
        request: Option<Request>,
        cancel: CancellationToken,
    ) -> Response {
        let started = Instant::now();
        let request_id = request
            .as_ref()
            .and_then(|r| r.request_id.clone())
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(generate_request_id);

        let result = match request {
            Some(req) => self.dispatch(req, &request_id, cancel).await,
            None => Err(AimaError::InvalidRequest {
                message: "request is required".to_string(),
            }),
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        match result {
            Ok(data) => Response::success(request_id, data, duration_ms),
            Err(e) => {
                if e.http_status() >= 500 {
                    warn!("Request {} failed: {}", request_id, e);
                } else {
                    debug!("Request {} rejected: {}", request_id, e);
                }
                Response::failure(request_id, &e, duration_ms)
            }
        }
    }

    /// Watch a resource by URI.
    pub fn watch(
        &self,
        uri: &str,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<ResourceUpdate>> {
        let resource = self
            .registry
            .get_resource(uri)?
            .ok_or_else(|| AimaError::ResourceNotFound {
                uri: uri.to_string(),
            })?;
        watch_resource(resource, self.watch_interval, cancel)
    }

    async fn dispatch(
        &self,
        req: Request,
        request_id: &str,
        cancel: CancellationToken,
    ) -> Result<Value> {
        let request_type = RequestType::parse(&req.request_type)?;
        if req.unit.trim().is_empty() {
            return Err(AimaError::InvalidRequest {
                message: "unit is required".to_string(),
            });
        }
        if let Some(auth) = &self.authenticator {
            auth.authenticate(&req)?;
        }

        let target = self.resolve(request_type, &req.unit)?;
        let domain = target.domain();
        debug!(
            "Dispatching {} {} ({})",
            request_type, req.unit, request_id
        );

        let input = match req.input {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };
        if self.validate_input {
            if let Some(schema) = target.input_schema() {
                schema.validate(&domain, &input)?;
            }
        }

        // Resource reads are not wrapped in execution events.
        let execution = match target {
            Target::Resource(_) => None,
            _ => Some(ExecutionContext::start(
                self.events.clone(),
                &domain,
                &req.unit,
                request_id,
                &input,
            )),
        };

        let result = self.run(target, &req.unit, request_id, input, cancel).await;

        if let Some(execution) = execution {
            match &result {
                Ok(output) => execution.complete(output),
                Err(e) => execution.fail(e),
            }
        }
        result
    }

    fn resolve(&self, request_type: RequestType, unit: &str) -> Result<Target> {
        match request_type {
            RequestType::Command => self
                .registry
                .get_command(unit)
                .map(Target::Command)
                .ok_or_else(|| AimaError::UnitNotFound {
                    kind: "command".to_string(),
                    name: unit.to_string(),
                }),
            RequestType::Query => self
                .registry
                .get_query(unit)
                .map(Target::Query)
                .ok_or_else(|| AimaError::UnitNotFound {
                    kind: "query".to_string(),
                    name: unit.to_string(),
                }),
            RequestType::ResourceGet => self
                .registry
                .get_resource(unit)?
                .map(Target::Resource)
                .ok_or_else(|| AimaError::ResourceNotFound {
                    uri: unit.to_string(),
                }),
        }
    }

    /// Run the unit on its own task so a panic cannot take the caller down.
    async fn run(
        &self,
        target: Target,
        unit: &str,
        request_id: &str,
        input: Value,
        cancel: CancellationToken,
    ) -> Result<Value> {
        cancel.check()?;

        let unit_cancel = CancellationToken::new();
        let ctx = UnitContext::new(request_id, unit_cancel.clone());
        let mut task: JoinHandle<Result<Value>> = match target {
            Target::Command(c) => tokio::spawn(async move { c.execute(&ctx, input).await }),
            Target::Query(q) => tokio::spawn(async move { q.execute(&ctx, input).await }),
            Target::Resource(r) => tokio::spawn(async move { r.get(&ctx).await }),
        };

        tokio::select! {
            biased;
            joined = &mut task => match joined {
                Ok(result) => result,
                Err(e) if e.is_panic() => {
                    let message = panic_message(e.into_panic());
                    error!("Unit {} panicked: {}", unit, message);
                    Err(AimaError::internal(format!("unit {} panicked: {}", unit, message)))
                }
                Err(e) => Err(AimaError::internal(format!("unit {} aborted: {}", unit, e))),
            },
            _ = cancel.cancelled() => {
                unit_cancel.cancel();
                task.abort();
                Err(AimaError::Cancelled)
            }
            _ = tokio::time::sleep(self.timeout) => {
                warn!("Unit {} timed out after {:?}", unit, self.timeout);
                unit_cancel.cancel();
                task.abort();
                Err(AimaError::Timeout(self.timeout))
            }
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MemoryPublisher;
    use crate::unit::UnitDescriptor;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    enum Behavior {
        Echo,
        Panic,
        Sleep(Duration),
        Fail,
    }

    struct TestUnit {
        name: &'static str,
        behavior: Behavior,
        seen_token: Mutex<Option<CancellationToken>>,
    }

    impl TestUnit {
        fn new(name: &'static str, behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                name,
                behavior,
                seen_token: Mutex::new(None),
            })
        }
    }

    impl UnitDescriptor for TestUnit {
        fn name(&self) -> &str {
            self.name
        }
        fn domain(&self) -> &str {
            "test"
        }
        fn description(&self) -> &str {
            "test unit"
        }
        fn input_schema(&self) -> Schema {
            Schema::object().property("count", Schema::number().min(0.0))
        }
        fn output_schema(&self) -> Schema {
            Schema::object()
        }
    }

    #[async_trait]
    impl Command for TestUnit {
        async fn execute(&self, ctx: &UnitContext, input: Value) -> Result<Value> {
            *self.seen_token.lock().unwrap() = Some(ctx.cancel.clone());
            match &self.behavior {
                Behavior::Echo => Ok(input),
                Behavior::Panic => panic!("boom"),
                Behavior::Sleep(d) => {
                    tokio::time::sleep(*d).await;
                    Ok(json!({"slept": true}))
                }
                Behavior::Fail => Err(AimaError::ModelNotFound {
                    model_id: "model-missing".into(),
                }),
            }
        }
    }

    #[async_trait]
    impl Query for TestUnit {
        async fn execute(&self, _ctx: &UnitContext, input: Value) -> Result<Value> {
            Ok(input)
        }
    }

    fn gateway_with(units: Vec<Arc<TestUnit>>) -> Gateway {
        let registry = Arc::new(Registry::new());
        for unit in units {
            registry.register_command(unit).unwrap();
        }
        Gateway::new(registry)
    }

    #[test]
    fn test_generate_request_id_format() {
        let id = generate_request_id();
        assert!(id.starts_with("req_"));
        assert_eq!(id.len(), 4 + 32);
        assert!(id[4..].chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, generate_request_id());
    }

    #[tokio::test]
    async fn test_missing_request() {
        let gateway = gateway_with(vec![]);
        let resp = gateway.handle(None).await;
        assert!(!resp.success);
        assert_eq!(resp.error_code(), Some("INVALID_REQUEST"));
        assert!(resp.request_id.starts_with("req_"));
    }

    #[tokio::test]
    async fn test_empty_unit_and_bad_type() {
        let gateway = gateway_with(vec![]);

        let resp = gateway.handle(Some(Request::command("", json!({})))).await;
        assert_eq!(resp.error_code(), Some("INVALID_REQUEST"));

        let mut req = Request::command("test.echo", json!({}));
        req.request_type = "subscribe".into();
        let resp = gateway.handle(Some(req)).await;
        assert_eq!(resp.error_code(), Some("INVALID_REQUEST"));
    }

    #[tokio::test]
    async fn test_unknown_unit_and_resource() {
        let gateway = gateway_with(vec![]);

        let resp = gateway
            .handle(Some(Request::command("nope.run", json!({}))))
            .await;
        assert_eq!(resp.error_code(), Some("UNIT_NOT_FOUND"));

        let resp = gateway
            .handle(Some(Request::resource_get("asms://nope/x")))
            .await;
        assert_eq!(resp.error_code(), Some("RESOURCE_NOT_FOUND"));
    }

    #[tokio::test]
    async fn test_success_echoes_request_id_and_emits_events() {
        let events = Arc::new(MemoryPublisher::new());
        let gateway =
            gateway_with(vec![TestUnit::new("test.echo", Behavior::Echo)]).with_events(events.clone());

        let resp = gateway
            .handle(Some(
                Request::command("test.echo", json!({"count": 2})).with_request_id("req_fixed"),
            ))
            .await;

        assert!(resp.success);
        assert_eq!(resp.request_id, "req_fixed");
        assert_eq!(resp.data.unwrap()["count"], 2);
        assert_eq!(
            events.event_types(),
            vec!["test.echo.started", "test.echo.completed"]
        );
        assert!(events
            .events()
            .iter()
            .all(|e| e.correlation_id.as_deref() == Some("req_fixed")));
    }

    #[tokio::test]
    async fn test_unit_error_is_enveloped_with_failed_event() {
        let events = Arc::new(MemoryPublisher::new());
        let gateway =
            gateway_with(vec![TestUnit::new("test.fail", Behavior::Fail)]).with_events(events.clone());

        let resp = gateway
            .handle(Some(Request::command("test.fail", json!({}))))
            .await;

        assert_eq!(resp.error_code(), Some("MODEL_NOT_FOUND"));
        assert_eq!(resp.error.unwrap().domain.as_deref(), Some("model"));
        let failed = events.events_of("test.fail.failed");
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].payload["code"], "MODEL_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_schema_validation_rejects_bad_input() {
        let gateway = gateway_with(vec![TestUnit::new("test.echo", Behavior::Echo)]);

        let resp = gateway
            .handle(Some(Request::command("test.echo", json!({"count": -1}))))
            .await;
        assert_eq!(resp.error_code(), Some("INVALID_INPUT"));

        let lenient = gateway_with(vec![TestUnit::new("test.echo", Behavior::Echo)])
            .with_input_validation(false);
        let resp = lenient
            .handle(Some(Request::command("test.echo", json!({"count": -1}))))
            .await;
        assert!(resp.success);
    }

    #[tokio::test]
    async fn test_null_input_becomes_empty_object() {
        let gateway = gateway_with(vec![TestUnit::new("test.echo", Behavior::Echo)]);
        let resp = gateway
            .handle(Some(Request::command("test.echo", Value::Null)))
            .await;
        assert_eq!(resp.data.unwrap(), json!({}));
    }

    #[tokio::test]
    async fn test_panic_becomes_internal_error() {
        let gateway = gateway_with(vec![TestUnit::new("test.panic", Behavior::Panic)]);
        let resp = gateway
            .handle(Some(Request::command("test.panic", json!({}))))
            .await;

        assert!(!resp.success);
        assert_eq!(resp.error_code(), Some("INTERNAL_ERROR"));
        assert!(resp.error.unwrap().message.contains("boom"));
    }

    #[tokio::test]
    async fn test_timeout_cancels_unit_context() {
        let unit = TestUnit::new("test.slow", Behavior::Sleep(Duration::from_secs(30)));
        let gateway =
            gateway_with(vec![unit.clone()]).with_timeout(Duration::from_millis(50));

        let resp = gateway
            .handle(Some(Request::command("test.slow", json!({}))))
            .await;

        assert_eq!(resp.error_code(), Some("TIMEOUT"));
        assert!(resp.duration_ms >= 50);
        let token = unit.seen_token.lock().unwrap().clone().unwrap();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_caller_cancellation() {
        let gateway = gateway_with(vec![TestUnit::new(
            "test.slow",
            Behavior::Sleep(Duration::from_secs(30)),
        )]);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let resp = gateway
            .handle_with_cancel(Some(Request::command("test.slow", json!({}))), cancel)
            .await;
        assert_eq!(resp.error_code(), Some("CANCELLED"));
    }

    #[tokio::test]
    async fn test_duration_reflects_execution_time() {
        let gateway = gateway_with(vec![TestUnit::new(
            "test.nap",
            Behavior::Sleep(Duration::from_millis(30)),
        )]);
        let resp = gateway
            .handle(Some(Request::command("test.nap", json!({}))))
            .await;
        assert!(resp.success);
        assert!(resp.duration_ms >= 30);
    }

    #[tokio::test]
    async fn test_authenticator_gate() {
        let gateway = gateway_with(vec![TestUnit::new("test.echo", Behavior::Echo)])
            .with_authenticator(Arc::new(StaticTokenAuthenticator::new("tok")));

        let resp = gateway
            .handle(Some(Request::command("test.echo", json!({}))))
            .await;
        assert_eq!(resp.error_code(), Some("UNAUTHORIZED"));

        let resp = gateway
            .handle(Some(
                Request::command("test.echo", json!({})).with_credentials("tok"),
            ))
            .await;
        assert!(resp.success);
    }
}
