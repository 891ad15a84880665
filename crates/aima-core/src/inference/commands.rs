//! Inference domain commands.

use super::provider::InferenceProvider;
use super::types::{ChatOptions, Message};
use super::{require_provider, usage_schema, DOMAIN};
use crate::error::{AimaError, Result};
use crate::schema::Schema;
use crate::unit::{
    decode_input, require_non_empty, to_output, Command, Example, UnitContext, UnitDescriptor,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

// ========================================
// inference.chat
// ========================================

#[derive(Debug, Deserialize)]
struct ChatInput {
    #[serde(default)]
    model: String,
    #[serde(default)]
    messages: Vec<Message>,
    #[serde(flatten)]
    options: ChatOptions,
}

/// Chat completion through the configured inference provider.
pub struct ChatCommand {
    provider: Option<Arc<dyn InferenceProvider>>,
}

impl ChatCommand {
    pub fn new(provider: Option<Arc<dyn InferenceProvider>>) -> Self {
        Self { provider }
    }
}

impl UnitDescriptor for ChatCommand {
    fn name(&self) -> &str {
        "inference.chat"
    }

    fn domain(&self) -> &str {
        DOMAIN
    }

    fn description(&self) -> &str {
        "Perform a chat completion with an AI model"
    }

    fn input_schema(&self) -> Schema {
        Schema::object()
            .property(
                "model",
                Schema::string()
                    .describe("Model identifier (e.g., llama3)")
                    .min_length(1),
            )
            .property(
                "messages",
                Schema::array(
                    Schema::object()
                        .property(
                            "role",
                            Schema::string_enum(["system", "user", "assistant"]),
                        )
                        .property("content", Schema::string())
                        .required(&["role", "content"]),
                )
                .describe("List of chat messages"),
            )
            .property(
                "temperature",
                Schema::number()
                    .describe("Sampling temperature (0-2)")
                    .min(0.0)
                    .max(2.0),
            )
            .property(
                "max_tokens",
                Schema::number().describe("Maximum tokens to generate").min(1.0),
            )
            .property(
                "top_p",
                Schema::number()
                    .describe("Nucleus sampling parameter")
                    .min(0.0)
                    .max(1.0),
            )
            .property(
                "stop",
                Schema::array(Schema::string()).describe("Stop sequences"),
            )
            .required(&["model", "messages"])
    }

    fn output_schema(&self) -> Schema {
        Schema::object()
            .property("content", Schema::string())
            .property("finish_reason", Schema::string())
            .property("usage", usage_schema())
            .property("model", Schema::string())
            .property("id", Schema::string())
    }

    fn examples(&self) -> Vec<Example> {
        vec![Example::new(
            "Simple chat completion",
            json!({
                "model": "llama3",
                "messages": [
                    {"role": "system", "content": "You are a helpful assistant."},
                    {"role": "user", "content": "Hello, how are you?"}
                ]
            }),
            json!({
                "content": "Hello! I'm doing well, thank you for asking.",
                "finish_reason": "stop",
                "usage": {"prompt_tokens": 20, "completion_tokens": 15, "total_tokens": 35}
            }),
        )]
    }
}

#[async_trait]
impl Command for ChatCommand {
    async fn execute(&self, ctx: &UnitContext, input: Value) -> Result<Value> {
        let input: ChatInput = decode_input(DOMAIN, input)?;
        require_non_empty(DOMAIN, "model", &input.model)?;
        if input.messages.is_empty() {
            return Err(AimaError::invalid_input(DOMAIN, "messages are required"));
        }
        let provider = require_provider(&self.provider)?;

        debug!(
            "Chat with {} ({} messages)",
            input.model,
            input.messages.len()
        );
        let response = provider
            .chat(&input.model, &input.messages, &input.options, &ctx.cancel)
            .await
            .map_err(|e| e.context("chat completion failed"))?;
        to_output(&response)
    }
}

// ========================================
// inference.embed
// ========================================

#[derive(Debug, Deserialize)]
struct EmbedInput {
    #[serde(default)]
    model: String,
    #[serde(default)]
    input: Vec<String>,
}

/// Text embeddings through the configured inference provider.
pub struct EmbedCommand {
    provider: Option<Arc<dyn InferenceProvider>>,
}

impl EmbedCommand {
    pub fn new(provider: Option<Arc<dyn InferenceProvider>>) -> Self {
        Self { provider }
    }
}

impl UnitDescriptor for EmbedCommand {
    fn name(&self) -> &str {
        "inference.embed"
    }

    fn domain(&self) -> &str {
        DOMAIN
    }

    fn description(&self) -> &str {
        "Generate embeddings for input texts"
    }

    fn input_schema(&self) -> Schema {
        Schema::object()
            .property("model", Schema::string().describe("Embedding model").min_length(1))
            .property(
                "input",
                Schema::array(Schema::string()).describe("Texts to embed"),
            )
            .required(&["model", "input"])
    }

    fn output_schema(&self) -> Schema {
        Schema::object()
            .property(
                "embeddings",
                Schema::array(Schema::array(Schema::number())),
            )
            .property("usage", usage_schema())
    }

    fn examples(&self) -> Vec<Example> {
        vec![Example::new(
            "Embed two sentences",
            json!({"model": "nomic-embed-text", "input": ["hello", "world"]}),
            json!({"embeddings": [[0.1, 0.2], [0.3, 0.4]], "usage": {"prompt_tokens": 2, "completion_tokens": 0, "total_tokens": 2}}),
        )]
    }
}

#[async_trait]
impl Command for EmbedCommand {
    async fn execute(&self, ctx: &UnitContext, input: Value) -> Result<Value> {
        let input: EmbedInput = decode_input(DOMAIN, input)?;
        require_non_empty(DOMAIN, "model", &input.model)?;
        if input.input.is_empty() {
            return Err(AimaError::invalid_input(DOMAIN, "input is required"));
        }
        let provider = require_provider(&self.provider)?;

        let response = provider
            .embed(&input.model, &input.input, &ctx.cancel)
            .await
            .map_err(|e| e.context("embedding failed"))?;
        to_output(&response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::testing::MockInferenceProvider;

    fn chat() -> ChatCommand {
        ChatCommand::new(Some(Arc::new(MockInferenceProvider::default())))
    }

    #[tokio::test]
    async fn test_chat_returns_completion() {
        let out = Command::execute(
            &chat(),
            &UnitContext::detached(),
            json!({
                "model": "llama3",
                "messages": [{"role": "user", "content": "What is AIMA?"}],
                "temperature": 0.2,
                "stop": ["\n"]
            }),
        )
        .await
        .unwrap();

        assert_eq!(out["model"], "llama3");
        assert_eq!(out["finish_reason"], "stop");
        assert_eq!(out["content"], "echo: What is AIMA?");
        assert_eq!(
            out["usage"]["total_tokens"],
            out["usage"]["prompt_tokens"].as_u64().unwrap()
                + out["usage"]["completion_tokens"].as_u64().unwrap()
        );
    }

    #[tokio::test]
    async fn test_chat_validation() {
        let ctx = UnitContext::detached();
        let err = Command::execute(&chat(), &ctx, json!({"model": "llama3", "messages": []}))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT");

        let err = Command::execute(
            &chat(),
            &ctx,
            json!({"model": "llama3", "messages": [{"role": "robot", "content": "x"}]}),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT");
    }

    #[tokio::test]
    async fn test_chat_without_provider() {
        let err = Command::execute(
            &ChatCommand::new(None),
            &UnitContext::detached(),
            json!({"model": "llama3", "messages": [{"role": "user", "content": "hi"}]}),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), "PROVIDER_NOT_SET");
        assert_eq!(err.domain(), Some("inference"));
    }

    #[tokio::test]
    async fn test_embed() {
        let cmd = EmbedCommand::new(Some(Arc::new(MockInferenceProvider::default())));
        let out = Command::execute(
            &cmd,
            &UnitContext::detached(),
            json!({"model": "nomic-embed-text", "input": ["a", "b"]}),
        )
        .await
        .unwrap();
        assert_eq!(out["embeddings"].as_array().unwrap().len(), 2);

        let err = Command::execute(
            &cmd,
            &UnitContext::detached(),
            json!({"model": "nomic-embed-text", "input": []}),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT");
    }
}
