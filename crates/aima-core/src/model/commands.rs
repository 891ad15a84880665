//! Model domain commands.

use super::events;
use super::provider::{ModelProvider, ProgressReporter};
use super::store::ModelStore;
use super::types::{Model, ModelFormat, ModelType, PullRequest};
use super::{model_id_schema, require_model_id, require_provider, DOMAIN};
use crate::config::PullConfig;
use crate::error::{AimaError, Result};
use crate::events::{noop_publisher, EventPublisher};
use crate::schema::Schema;
use crate::unit::{
    decode_input, require_non_empty, to_output, Command, Example, UnitContext, UnitDescriptor,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, info};

// ========================================
// model.create
// ========================================

#[derive(Debug, Deserialize)]
struct CreateInput {
    #[serde(default)]
    name: String,
    #[serde(rename = "type", default)]
    model_type: Option<ModelType>,
    #[serde(default)]
    format: Option<ModelFormat>,
    #[serde(default)]
    source: String,
    #[serde(default)]
    path: String,
    #[serde(default)]
    tags: Vec<String>,
}

/// Create a model record (`status = pending`).
pub struct CreateCommand {
    store: Arc<dyn ModelStore>,
    events: Arc<dyn EventPublisher>,
}

impl CreateCommand {
    pub fn new(store: Arc<dyn ModelStore>) -> Self {
        Self {
            store,
            events: noop_publisher(),
        }
    }

    pub fn with_events(mut self, events: Arc<dyn EventPublisher>) -> Self {
        self.events = events;
        self
    }
}

impl UnitDescriptor for CreateCommand {
    fn name(&self) -> &str {
        "model.create"
    }

    fn domain(&self) -> &str {
        DOMAIN
    }

    fn description(&self) -> &str {
        "Create a new model record"
    }

    fn input_schema(&self) -> Schema {
        Schema::object()
            .property("name", Schema::string().describe("Model name").min_length(1))
            .property(
                "type",
                Schema::string_enum(ModelType::names()).describe("Model type"),
            )
            .property(
                "format",
                Schema::string_enum(ModelFormat::names()).describe("Model format"),
            )
            .property(
                "source",
                Schema::string().describe("Model source (ollama, huggingface, local)"),
            )
            .property("path", Schema::string().describe("Local path to model files"))
            .property("tags", Schema::array(Schema::string()))
            .required(&["name"])
    }

    fn output_schema(&self) -> Schema {
        Schema::object().property("model_id", Schema::string())
    }

    fn examples(&self) -> Vec<Example> {
        vec![Example::new(
            "Create a new LLM model record",
            json!({"name": "llama3", "type": "llm", "format": "gguf"}),
            json!({"model_id": "model-1a2b3c4d"}),
        )]
    }
}

#[async_trait]
impl Command for CreateCommand {
    async fn execute(&self, ctx: &UnitContext, input: Value) -> Result<Value> {
        let input: CreateInput = decode_input(DOMAIN, input)?;
        require_non_empty(DOMAIN, "name", &input.name)?;

        let mut model = Model::new(
            input.name,
            input.model_type.unwrap_or_default(),
            input.format.unwrap_or_default(),
        );
        model.source = input.source;
        model.path = input.path;
        model.tags = input.tags;

        self.store
            .create(&model)
            .await
            .map_err(|e| e.context("create model"))?;
        debug!("Created model {} ({})", model.id, model.name);

        self.events.emit(events::created(&model, &ctx.request_id));
        Ok(json!({ "model_id": model.id }))
    }
}

// ========================================
// model.delete
// ========================================

#[derive(Debug, Deserialize)]
struct DeleteInput {
    #[serde(default)]
    model_id: String,
    /// In-use checks are not enforced here, so this only changes logging.
    #[serde(default)]
    force: bool,
}

/// Delete a model record.
pub struct DeleteCommand {
    store: Arc<dyn ModelStore>,
    provider: Option<Arc<dyn ModelProvider>>,
    events: Arc<dyn EventPublisher>,
}

impl DeleteCommand {
    pub fn new(store: Arc<dyn ModelStore>) -> Self {
        Self {
            store,
            provider: None,
            events: noop_publisher(),
        }
    }

    /// Provider whose per-model caches are evicted on delete.
    pub fn with_provider(mut self, provider: Option<Arc<dyn ModelProvider>>) -> Self {
        self.provider = provider;
        self
    }

    pub fn with_events(mut self, events: Arc<dyn EventPublisher>) -> Self {
        self.events = events;
        self
    }
}

impl UnitDescriptor for DeleteCommand {
    fn name(&self) -> &str {
        "model.delete"
    }

    fn domain(&self) -> &str {
        DOMAIN
    }

    fn description(&self) -> &str {
        "Delete a model"
    }

    fn input_schema(&self) -> Schema {
        Schema::object()
            .property("model_id", model_id_schema())
            .property(
                "force",
                Schema::boolean().describe("Force delete even if model is in use"),
            )
            .required(&["model_id"])
    }

    fn output_schema(&self) -> Schema {
        Schema::object().property("success", Schema::boolean())
    }

    fn examples(&self) -> Vec<Example> {
        vec![
            Example::new(
                "Delete a model",
                json!({"model_id": "model-1a2b3c4d"}),
                json!({"success": true}),
            ),
            Example::new(
                "Force delete a model",
                json!({"model_id": "model-1a2b3c4d", "force": true}),
                json!({"success": true}),
            ),
        ]
    }
}

#[async_trait]
impl Command for DeleteCommand {
    async fn execute(&self, ctx: &UnitContext, input: Value) -> Result<Value> {
        let input: DeleteInput = decode_input(DOMAIN, input)?;
        require_model_id(&input.model_id)?;
        if input.force {
            debug!("Force delete requested for {}", input.model_id);
        }

        let model = self
            .store
            .get(&input.model_id)
            .await
            .map_err(|e| e.context(format!("get model {}", input.model_id)))?;
        self.store
            .delete(&input.model_id)
            .await
            .map_err(|e| e.context(format!("delete model {}", input.model_id)))?;
        if let Some(provider) = &self.provider {
            provider.forget(&input.model_id).await;
        }
        debug!("Deleted model {}", input.model_id);

        self.events
            .emit(events::deleted(&model.id, &model.name, &ctx.request_id));
        Ok(json!({ "success": true }))
    }
}

// ========================================
// model.pull
// ========================================

#[derive(Debug, Deserialize)]
struct PullInput {
    #[serde(default)]
    source: String,
    #[serde(default)]
    repo: String,
    #[serde(default)]
    tag: String,
    #[serde(default)]
    mirror: Option<String>,
}

/// Releases an in-flight pull key on drop, including when the pull future is
/// aborted by a gateway timeout.
struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<String>>,
    key: String,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(set: &'a Mutex<HashSet<String>>, key: String) -> Result<Self> {
        let mut in_flight = set.lock().unwrap_or_else(|e| e.into_inner());
        if !in_flight.insert(key.clone()) {
            return Err(AimaError::PullInProgress { key });
        }
        Ok(Self { set, key })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.key);
    }
}

/// Pull a model from a remote source and register it.
///
/// Concurrent pulls of the same `source/repo/tag` key are rejected with
/// `PULL_IN_PROGRESS`. Progress records from the provider are republished as
/// `model.pull_progress` events.
pub struct PullCommand {
    store: Arc<dyn ModelStore>,
    provider: Option<Arc<dyn ModelProvider>>,
    events: Arc<dyn EventPublisher>,
    in_flight: Mutex<HashSet<String>>,
}

impl PullCommand {
    pub fn new(store: Arc<dyn ModelStore>, provider: Option<Arc<dyn ModelProvider>>) -> Self {
        Self {
            store,
            provider,
            events: noop_publisher(),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_events(mut self, events: Arc<dyn EventPublisher>) -> Self {
        self.events = events;
        self
    }

    /// Keys of pulls currently running.
    pub fn in_flight(&self) -> Vec<String> {
        let set = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        let mut keys: Vec<String> = set.iter().cloned().collect();
        keys.sort();
        keys
    }
}

impl UnitDescriptor for PullCommand {
    fn name(&self) -> &str {
        "model.pull"
    }

    fn domain(&self) -> &str {
        DOMAIN
    }

    fn description(&self) -> &str {
        "Pull a model from a remote source"
    }

    fn input_schema(&self) -> Schema {
        Schema::object()
            .property(
                "source",
                Schema::string()
                    .describe("Model source (huggingface, hf, ollama); defaults to huggingface"),
            )
            .property(
                "repo",
                Schema::string()
                    .describe("Repository name (e.g., llama3, meta-llama/Llama-3-8B)")
                    .min_length(1),
            )
            .property(
                "tag",
                Schema::string().describe("Model tag or revision (e.g., latest, main)"),
            )
            .property("mirror", Schema::string().describe("Mirror URL"))
            .required(&["repo"])
    }

    fn output_schema(&self) -> Schema {
        Schema::object()
            .property("model_id", Schema::string())
            .property("status", Schema::string())
    }

    fn examples(&self) -> Vec<Example> {
        vec![
            Example::new(
                "Pull llama3 from Ollama",
                json!({"source": "ollama", "repo": "llama3"}),
                json!({"model_id": "model-1a2b3c4d", "status": "ready"}),
            ),
            Example::new(
                "Pull Llama-3-8B from HuggingFace",
                json!({"source": "huggingface", "repo": "meta-llama/Llama-3-8B", "tag": "main"}),
                json!({"model_id": "model-5e6f7a8b", "status": "ready"}),
            ),
        ]
    }
}

#[async_trait]
impl Command for PullCommand {
    async fn execute(&self, ctx: &UnitContext, input: Value) -> Result<Value> {
        let input: PullInput = decode_input(DOMAIN, input)?;
        require_non_empty(DOMAIN, "repo", &input.repo)?;
        let provider = require_provider(&self.provider)?;

        if let Some(mirror) = input.mirror.as_deref().filter(|m| !m.is_empty()) {
            debug!("Mirror {} requested; providers use their configured endpoint", mirror);
        }
        let request = PullRequest::new(input.source, input.repo, input.tag);
        let _guard = InFlightGuard::acquire(&self.in_flight, request.key())?;
        info!("Pulling model {} (key {})", request.repo, request.key());

        let (tx, mut rx) = mpsc::channel(PullConfig::PROGRESS_BUFFER);
        let pull = provider.pull(&request, ProgressReporter::new(tx), &ctx.cancel);
        let drain = async {
            while let Some(progress) = rx.recv().await {
                self.events
                    .emit(events::pull_progress(&progress, &ctx.request_id));
            }
        };
        let (result, ()) = tokio::join!(pull, drain);

        let model = result.map_err(|e| e.context(format!("pull model {}", request.repo)))?;
        save_or_replace(self.store.as_ref(), &model)
            .await
            .map_err(|e| e.context("save pulled model"))?;
        info!("Pulled model {} as {}", request.repo, model.id);

        Ok(json!({
            "model_id": model.id,
            "status": model.status,
        }))
    }
}

/// Insert a model, or replace it when the provider handed back a cached record.
async fn save_or_replace(store: &dyn ModelStore, model: &Model) -> Result<()> {
    match store.get(&model.id).await {
        Ok(_) => store.update(model).await,
        Err(e) if matches!(e.root(), AimaError::ModelNotFound { .. }) => store.create(model).await,
        Err(e) => Err(e),
    }
}

// ========================================
// model.import
// ========================================

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct ImportInput {
    #[serde(default)]
    path: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "type", default)]
    model_type: Option<ModelType>,
    #[serde(default = "default_true")]
    auto_detect: bool,
}

/// Import a model from a local file or directory.
pub struct ImportCommand {
    store: Arc<dyn ModelStore>,
    provider: Option<Arc<dyn ModelProvider>>,
    events: Arc<dyn EventPublisher>,
}

impl ImportCommand {
    pub fn new(store: Arc<dyn ModelStore>, provider: Option<Arc<dyn ModelProvider>>) -> Self {
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

impl UnitDescriptor for ImportCommand {
    fn name(&self) -> &str {
        "model.import"
    }

    fn domain(&self) -> &str {
        DOMAIN
    }

    fn description(&self) -> &str {
        "Import a model from local path"
    }

    fn input_schema(&self) -> Schema {
        Schema::object()
            .property(
                "path",
                Schema::string()
                    .describe("Local path to model files")
                    .min_length(1),
            )
            .property(
                "name",
                Schema::string().describe("Model name (auto-detected if not specified)"),
            )
            .property(
                "type",
                Schema::string_enum(ModelType::names())
                    .describe("Model type (auto-detected if not specified)"),
            )
            .property(
                "auto_detect",
                Schema::boolean()
                    .describe("Auto-detect model type and format")
                    .default_value(json!(true)),
            )
            .required(&["path"])
    }

    fn output_schema(&self) -> Schema {
        Schema::object().property("model_id", Schema::string())
    }

    fn examples(&self) -> Vec<Example> {
        vec![
            Example::new(
                "Import model with auto-detection",
                json!({"path": "/models/llama3", "auto_detect": true}),
                json!({"model_id": "model-1a2b3c4d"}),
            ),
            Example::new(
                "Import model with explicit settings",
                json!({"path": "/models/custom", "name": "my-model", "type": "llm"}),
                json!({"model_id": "model-5e6f7a8b"}),
            ),
        ]
    }
}

#[async_trait]
impl Command for ImportCommand {
    async fn execute(&self, ctx: &UnitContext, input: Value) -> Result<Value> {
        let input: ImportInput = decode_input(DOMAIN, input)?;
        require_non_empty(DOMAIN, "path", &input.path)?;
        let provider = require_provider(&self.provider)?;

        let path = PathBuf::from(&input.path);
        let mut model = provider
            .import_local(&path, input.auto_detect)
            .await
            .map_err(|e| e.context(format!("import model from {}", input.path)))?;

        if let Some(name) = input.name.filter(|n| !n.is_empty()) {
            model.name = name;
        }
        if let Some(model_type) = input.model_type {
            model.model_type = model_type;
        }

        self.store
            .create(&model)
            .await
            .map_err(|e| e.context("save imported model"))?;
        info!("Imported {} as {}", input.path, model.id);

        self.events.emit(events::created(&model, &ctx.request_id));
        Ok(json!({ "model_id": model.id }))
    }
}

// ========================================
// model.verify
// ========================================

#[derive(Debug, Deserialize)]
struct VerifyInput {
    #[serde(default)]
    model_id: String,
    #[serde(default)]
    checksum: Option<String>,
}

/// Verify a model's files against an optional checksum.
pub struct VerifyCommand {
    store: Arc<dyn ModelStore>,
    provider: Option<Arc<dyn ModelProvider>>,
    events: Arc<dyn EventPublisher>,
}

impl VerifyCommand {
    pub fn new(store: Arc<dyn ModelStore>, provider: Option<Arc<dyn ModelProvider>>) -> Self {
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

impl UnitDescriptor for VerifyCommand {
    fn name(&self) -> &str {
        "model.verify"
    }

    fn domain(&self) -> &str {
        DOMAIN
    }

    fn description(&self) -> &str {
        "Verify model integrity"
    }

    fn input_schema(&self) -> Schema {
        Schema::object()
            .property("model_id", model_id_schema())
            .property(
                "checksum",
                Schema::string()
                    .describe("Expected checksum: sha256:<hex>, size:<bytes> or safetensors:<n>"),
            )
            .required(&["model_id"])
    }

    fn output_schema(&self) -> Schema {
        Schema::object()
            .property("valid", Schema::boolean())
            .property("issues", Schema::array(Schema::string()))
    }

    fn examples(&self) -> Vec<Example> {
        vec![
            Example::new(
                "Verify model integrity",
                json!({"model_id": "model-1a2b3c4d"}),
                json!({"valid": true, "issues": []}),
            ),
            Example::new(
                "Verify model with expected checksum",
                json!({"model_id": "model-1a2b3c4d", "checksum": "sha256:abc123"}),
                json!({"valid": false, "issues": ["checksum mismatch"]}),
            ),
        ]
    }
}

#[async_trait]
impl Command for VerifyCommand {
    async fn execute(&self, ctx: &UnitContext, input: Value) -> Result<Value> {
        let input: VerifyInput = decode_input(DOMAIN, input)?;
        require_model_id(&input.model_id)?;
        let provider = require_provider(&self.provider)?;

        self.store
            .get(&input.model_id)
            .await
            .map_err(|e| e.context(format!("get model {}", input.model_id)))?;

        let checksum = input.checksum.as_deref().filter(|c| !c.is_empty());
        let result = provider
            .verify(&input.model_id, checksum)
            .await
            .map_err(|e| AimaError::VerifyFailed {
                model_id: input.model_id.clone(),
                message: e.to_string(),
            })?;
        debug!(
            "Verified model {}: valid={} issues={}",
            input.model_id,
            result.valid,
            result.issues.len()
        );

        self.events
            .emit(events::verified(&input.model_id, &result, &ctx.request_id));
        to_output(&result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MemoryPublisher;
    use crate::model::testing::MockModelProvider;
    use crate::model::{ModelStatus, VerificationResult};
    use crate::stores::MemoryModelStore;
    use std::time::Duration;

    fn store() -> Arc<dyn ModelStore> {
        Arc::new(MemoryModelStore::new())
    }

    #[tokio::test]
    async fn test_create_defaults_and_event() {
        let store = store();
        let events = Arc::new(MemoryPublisher::new());
        let cmd = CreateCommand::new(store.clone()).with_events(events.clone());

        let out = Command::execute(&cmd, &UnitContext::detached(), json!({"name": "llama3"}))
            .await
            .unwrap();
        let id = out["model_id"].as_str().unwrap();

        let model = store.get(id).await.unwrap();
        assert_eq!(model.model_type, ModelType::Llm);
        assert_eq!(model.format, ModelFormat::Gguf);
        assert_eq!(model.status, ModelStatus::Pending);
        assert_eq!(events.event_types(), vec!["model.created"]);
    }

    #[tokio::test]
    async fn test_create_requires_name() {
        let cmd = CreateCommand::new(store());
        let err = Command::execute(&cmd, &UnitContext::detached(), json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT");
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_type() {
        let cmd = CreateCommand::new(store());
        let err = Command::execute(
            &cmd,
            &UnitContext::detached(),
            json!({"name": "x", "type": "spaceship"}),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT");
    }

    #[tokio::test]
    async fn test_delete_twice_fails_not_found() {
        let store = store();
        let provider = Arc::new(MockModelProvider::default());
        let create = CreateCommand::new(store.clone());
        let delete = DeleteCommand::new(store.clone()).with_provider(Some(provider.clone()));
        let ctx = UnitContext::detached();

        let out = Command::execute(&create, &ctx, json!({"name": "m"})).await.unwrap();
        let input = json!({"model_id": out["model_id"]});

        let first = Command::execute(&delete, &ctx, input.clone()).await.unwrap();
        assert_eq!(first["success"], true);
        let err = Command::execute(&delete, &ctx, input).await.unwrap_err();
        assert_eq!(err.code(), "MODEL_NOT_FOUND");
        // Provider caches are evicted once, for the delete that succeeded.
        assert_eq!(provider.forgotten.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_requires_model_id() {
        let delete = DeleteCommand::new(store());
        let err = Command::execute(&delete, &UnitContext::detached(), json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_MODEL_ID");
    }

    #[tokio::test]
    async fn test_pull_without_provider() {
        let cmd = PullCommand::new(store(), None);
        let err = Command::execute(&cmd, &UnitContext::detached(), json!({"repo": "org/x"}))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "PROVIDER_NOT_SET");
    }

    #[tokio::test]
    async fn test_pull_saves_model_and_publishes_progress() {
        let store = store();
        let events = Arc::new(MemoryPublisher::new());
        let cmd = PullCommand::new(store.clone(), Some(Arc::new(MockModelProvider::default())))
            .with_events(events.clone());

        let out = Command::execute(
            &cmd,
            &UnitContext::detached(),
            json!({"source": "huggingface", "repo": "org/x"}),
        )
        .await
        .unwrap();

        assert_eq!(out["status"], "ready");
        let model = store.get(out["model_id"].as_str().unwrap()).await.unwrap();
        assert_eq!(model.status, ModelStatus::Ready);
        assert!(!model.path.is_empty());

        let progress = events.events_of("model.pull_progress");
        assert_eq!(progress.len(), 2);
        assert_eq!(progress.last().unwrap().payload["status"], "completed");
        assert!(cmd.in_flight().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_pull_same_key_rejected() {
        let provider = MockModelProvider {
            pull_delay: Some(Duration::from_millis(200)),
            ..Default::default()
        };
        let cmd = Arc::new(PullCommand::new(store(), Some(Arc::new(provider))));

        let first = {
            let cmd = cmd.clone();
            tokio::spawn(async move {
                Command::execute(cmd.as_ref(), &UnitContext::detached(), json!({"repo": "org/x"}))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        // Same repository spelled with the short alias and explicit revision.
        let second = Command::execute(
            cmd.as_ref(),
            &UnitContext::detached(),
            json!({"source": "hf", "repo": "org/x", "tag": "main"}),
        )
        .await;

        assert_eq!(second.unwrap_err().code(), "PULL_IN_PROGRESS");
        assert!(first.await.unwrap().is_ok());
        assert!(cmd.in_flight().is_empty());
    }

    #[tokio::test]
    async fn test_pull_failure_releases_key() {
        let provider = MockModelProvider::default();
        *provider.pull_error.lock().unwrap() = Some(AimaError::Network {
            message: "hub unreachable".into(),
            status: Some(503),
        });
        let models = store();
        let cmd = PullCommand::new(models.clone(), Some(Arc::new(provider)));

        let err = Command::execute(&cmd, &UnitContext::detached(), json!({"repo": "org/x"}))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NETWORK_ERROR");
        assert!(err.to_string().starts_with("pull model org/x"));
        assert!(cmd.in_flight().is_empty());
        let (_, total) = models.list(&crate::model::ModelFilter::default()).await.unwrap();
        assert_eq!(total, 0);

        // Key is free again.
        assert!(
            Command::execute(&cmd, &UnitContext::detached(), json!({"repo": "org/x"}))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_import_overrides_name_and_type() {
        let store = store();
        let cmd = ImportCommand::new(store.clone(), Some(Arc::new(MockModelProvider::default())));

        let out = Command::execute(
            &cmd,
            &UnitContext::detached(),
            json!({"path": "/models/custom", "name": "my-model", "type": "embedding"}),
        )
        .await
        .unwrap();

        let model = store.get(out["model_id"].as_str().unwrap()).await.unwrap();
        assert_eq!(model.name, "my-model");
        assert_eq!(model.model_type, ModelType::Embedding);
        assert_eq!(model.path, "/models/custom");
    }

    #[tokio::test]
    async fn test_verify_emits_event() {
        let store = store();
        let mut model = Model::new("m", ModelType::Llm, ModelFormat::Gguf);
        model.status = ModelStatus::Ready;
        store.create(&model).await.unwrap();

        let provider = MockModelProvider {
            verify_result: Some(VerificationResult::invalid("checksum mismatch")),
            ..Default::default()
        };
        let events = Arc::new(MemoryPublisher::new());
        let cmd = VerifyCommand::new(store, Some(Arc::new(provider))).with_events(events.clone());

        let out = Command::execute(
            &cmd,
            &UnitContext::detached(),
            json!({"model_id": model.id, "checksum": "sha256:00"}),
        )
        .await
        .unwrap();

        assert_eq!(out["valid"], false);
        assert_eq!(out["issues"][0], "checksum mismatch");
        assert_eq!(events.event_types(), vec!["model.verified"]);
    }

    #[tokio::test]
    async fn test_verify_unknown_model() {
        let cmd = VerifyCommand::new(store(), Some(Arc::new(MockModelProvider::default())));
        let err = Command::execute(
            &cmd,
            &UnitContext::detached(),
            json!({"model_id": "model-00000000"}),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), "MODEL_NOT_FOUND");
    }
}
