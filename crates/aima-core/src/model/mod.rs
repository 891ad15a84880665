//! Model domain: records, pulls, imports, verification and sizing.
//!
//! Units registered by this module:
//!
//! | Name | Kind |
//! |---|---|
//! | `model.create`, `model.delete`, `model.pull`, `model.import`, `model.verify` | command |
//! | `model.get`, `model.list`, `model.search`, `model.estimate_resources` | query |
//! | `asms://model/<id>` (watchable), `asms://models/compatibility` | resource |

mod commands;
pub mod events;
mod provider;
mod queries;
mod resources;
mod store;
mod types;

pub use commands::{CreateCommand, DeleteCommand, ImportCommand, PullCommand, VerifyCommand};
pub use provider::{ModelProvider, ProgressReporter};
pub use queries::{EstimateResourcesQuery, GetQuery, ListQuery, SearchQuery};
pub use resources::{
    compatibility_table, parse_model_uri, CompatibilityResource, ModelResource,
    ModelResourceFactory,
};
pub use store::ModelStore;
pub use types::{
    generate_model_id, Model, ModelFilter, ModelFormat, ModelRequirements, ModelSearchResult,
    ModelStatus, ModelType, PullProgress, PullRequest, VerificationResult,
};

use crate::error::{AimaError, Result};
use crate::schema::Schema;
use std::sync::Arc;

pub(crate) const DOMAIN: &str = "model";

fn require_provider(provider: &Option<Arc<dyn ModelProvider>>) -> Result<&Arc<dyn ModelProvider>> {
    provider.as_ref().ok_or_else(|| AimaError::ProviderNotSet {
        domain: DOMAIN.to_string(),
    })
}

fn require_model_id(model_id: &str) -> Result<()> {
    if model_id.trim().is_empty() {
        return Err(AimaError::InvalidModelId {
            model_id: model_id.to_string(),
        });
    }
    Ok(())
}

fn model_id_schema() -> Schema {
    Schema::string()
        .describe("Model identifier")
        .example(serde_json::json!("model-1a2b3c4d"))
}

/// Schema of a serialized [`Model`].
pub(crate) fn model_schema() -> Schema {
    Schema::object()
        .describe("Model record")
        .property("id", Schema::string())
        .property("name", Schema::string())
        .property("type", Schema::string_enum(ModelType::names()))
        .property("format", Schema::string_enum(ModelFormat::names()))
        .property(
            "status",
            Schema::string_enum(["pending", "pulling", "ready", "error", "verifying"]),
        )
        .property("source", Schema::string())
        .property("path", Schema::string())
        .property("size", Schema::number())
        .property("checksum", Schema::string())
        .property("requirements", requirements_schema())
        .property("tags", Schema::array(Schema::string()))
        .property("created_at", Schema::number())
        .property("updated_at", Schema::number())
}

pub(crate) fn requirements_schema() -> Schema {
    Schema::object()
        .property("memory_min", Schema::number().describe("Minimum memory in bytes"))
        .property(
            "memory_recommended",
            Schema::number().describe("Recommended memory in bytes"),
        )
        .property("gpu_type", Schema::string())
        .property("gpu_memory", Schema::number())
        .property("total_params", Schema::number())
        .property("total_bytes", Schema::number())
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scriptable provider for unit tests.

    use super::*;
    use crate::cancel::CancellationToken;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    pub struct MockModelProvider {
        pub pull_delay: Option<Duration>,
        pub pull_error: Mutex<Option<AimaError>>,
        pub search_results: Vec<ModelSearchResult>,
        pub verify_result: Option<VerificationResult>,
        pub estimate: Option<ModelRequirements>,
        pub pulls: Mutex<Vec<PullRequest>>,
        pub forgotten: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ModelProvider for MockModelProvider {
        async fn pull(
            &self,
            request: &PullRequest,
            progress: ProgressReporter,
            cancel: &CancellationToken,
        ) -> Result<Model> {
            self.pulls.lock().unwrap().push(request.clone());
            if let Some(delay) = self.pull_delay {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => return Err(AimaError::Cancelled),
                }
            }
            if let Some(err) = self.pull_error.lock().unwrap().take() {
                return Err(err);
            }

            let mut model = Model::new(&request.repo, ModelType::Llm, ModelFormat::Gguf);
            model.source = request.source.clone();
            model.status = ModelStatus::Ready;
            model.path = format!("/tmp/models/{}", request.repo.replace('/', "_"));
            model.size = 18;
            progress.update(PullProgress {
                model_id: model.id.clone(),
                status: "downloading model.gguf".into(),
                progress: 50.0,
                bytes_total: 18,
                bytes_done: 9,
                ..Default::default()
            });
            progress.finish(PullProgress::completed(&model.id)).await;
            Ok(model)
        }

        async fn search(
            &self,
            _query: &str,
            _source: &str,
            _model_type: Option<ModelType>,
            limit: usize,
        ) -> Result<Vec<ModelSearchResult>> {
            Ok(self.search_results.iter().take(limit).cloned().collect())
        }

        async fn import_local(&self, path: &Path, _auto_detect: bool) -> Result<Model> {
            let mut model = Model::new("imported-model", ModelType::Llm, ModelFormat::Gguf);
            model.status = ModelStatus::Ready;
            model.source = "local".into();
            model.path = path.display().to_string();
            Ok(model)
        }

        async fn verify(
            &self,
            _model_id: &str,
            _checksum: Option<&str>,
        ) -> Result<VerificationResult> {
            Ok(self
                .verify_result
                .clone()
                .unwrap_or_else(VerificationResult::valid))
        }

        async fn estimate_resources(&self, model_id: &str) -> Result<ModelRequirements> {
            self.estimate
                .clone()
                .ok_or_else(|| AimaError::ModelNotFound {
                    model_id: model_id.to_string(),
                })
        }

        async fn forget(&self, model_id: &str) {
            self.forgotten.lock().unwrap().push(model_id.to_string());
        }
    }
}
