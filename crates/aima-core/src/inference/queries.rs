//! Inference domain queries.

use super::provider::InferenceProvider;
use super::{require_provider, DOMAIN};
use crate::error::Result;
use crate::model::ModelType;
use crate::schema::Schema;
use crate::unit::{decode_input, Example, Query, UnitContext, UnitDescriptor};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct ModelsInput {
    #[serde(rename = "type", default)]
    model_type: Option<ModelType>,
}

/// List models the inference provider can serve.
pub struct ModelsQuery {
    provider: Option<Arc<dyn InferenceProvider>>,
}

impl ModelsQuery {
    pub fn new(provider: Option<Arc<dyn InferenceProvider>>) -> Self {
        Self { provider }
    }
}

impl UnitDescriptor for ModelsQuery {
    fn name(&self) -> &str {
        "inference.models"
    }

    fn domain(&self) -> &str {
        DOMAIN
    }

    fn description(&self) -> &str {
        "List models available for inference"
    }

    fn input_schema(&self) -> Schema {
        Schema::object().property(
            "type",
            Schema::string_enum(ModelType::names()).describe("Filter by model type"),
        )
    }

    fn output_schema(&self) -> Schema {
        Schema::object().property(
            "models",
            Schema::array(
                Schema::object()
                    .property("id", Schema::string())
                    .property("name", Schema::string())
                    .property("type", Schema::string())
                    .property("provider", Schema::string()),
            ),
        )
    }

    fn examples(&self) -> Vec<Example> {
        vec![Example::new(
            "List chat models",
            json!({"type": "llm"}),
            json!({"models": [{"id": "llama3:latest", "name": "llama3:latest", "type": "llm", "provider": "ollama"}]}),
        )]
    }
}

#[async_trait]
impl Query for ModelsQuery {
    async fn execute(&self, _ctx: &UnitContext, input: Value) -> Result<Value> {
        let input: ModelsInput = decode_input(DOMAIN, input)?;
        let provider = require_provider(&self.provider)?;
        let models = provider
            .list_models(input.model_type)
            .await
            .map_err(|e| e.context("list inference models"))?;
        Ok(json!({ "models": models }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::testing::MockInferenceProvider;

    #[tokio::test]
    async fn test_models_filters_by_type() {
        let query = ModelsQuery::new(Some(Arc::new(MockInferenceProvider::default())));
        let all = Query::execute(&query, &UnitContext::detached(), Value::Null)
            .await
            .unwrap();
        assert_eq!(all["models"].as_array().unwrap().len(), 2);

        let embed = Query::execute(&query, &UnitContext::detached(), json!({"type": "embedding"}))
            .await
            .unwrap();
        assert_eq!(embed["models"][0]["id"], "nomic-embed-text");
    }
}
