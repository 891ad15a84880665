//! HTTP client for a running Ollama daemon.
//!
//! `POST /api/pull` streams NDJSON status lines; the other endpoints are
//! plain JSON request/response.

use crate::cancel::CancellationToken;
use crate::config::OllamaConfig;
use crate::error::{AimaError, Result};
use crate::inference::{ChatOptions, Message};
use bytes::Bytes;
use futures::StreamExt;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, trace};

/// One NDJSON line of a streamed pull.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PullStatus {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub digest: String,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub completed: u64,
    #[serde(default)]
    pub error: Option<String>,
}

impl PullStatus {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagDetails {
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub family: String,
    #[serde(default)]
    pub parameter_size: String,
    #[serde(default)]
    pub quantization_level: String,
}

/// A model known to the daemon, as returned by `GET /api/tags`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OllamaModel {
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub digest: String,
    #[serde(default)]
    pub modified_at: String,
    #[serde(default)]
    pub details: TagDetails,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Option<Vec<OllamaModel>>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
    #[serde(skip_serializing_if = "Map::is_empty")]
    options: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub content: String,
}

/// Non-streamed `POST /api/chat` response.
#[derive(Debug, Deserialize)]
pub struct ChatReply {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub message: Option<ChatMessage>,
    #[serde(default)]
    pub done_reason: Option<String>,
    #[serde(default)]
    pub prompt_eval_count: u64,
    #[serde(default)]
    pub eval_count: u64,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

/// `POST /api/embed` response.
#[derive(Debug, Deserialize)]
pub struct EmbedReply {
    #[serde(default)]
    pub embeddings: Vec<Vec<f32>>,
    #[serde(default)]
    pub prompt_eval_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: String,
}

/// HTTP client for a running Ollama instance.
pub struct OllamaClient {
    base_url: String,
    /// Client for short API calls (has total timeout)
    client: Client,
    /// Client for pulls (connect timeout only; layers can be many GB)
    pull_client: Client,
}

impl std::fmt::Debug for OllamaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl OllamaClient {
    /// Create a client for `base_url`, defaulting to the local daemon.
    pub fn new(base_url: Option<&str>) -> Result<Self> {
        let base_url = base_url
            .filter(|u| !u.trim().is_empty())
            .unwrap_or(OllamaConfig::DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();

        let client = Client::builder()
            .timeout(OllamaConfig::API_TIMEOUT)
            .user_agent(OllamaConfig::USER_AGENT)
            .build()
            .map_err(|e| net_err(format!("Failed to create HTTP client: {}", e)))?;

        let pull_client = Client::builder()
            .connect_timeout(OllamaConfig::CONNECT_TIMEOUT)
            .user_agent(OllamaConfig::USER_AGENT)
            .build()
            .map_err(|e| net_err(format!("Failed to create pull HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            client,
            pull_client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /api/tags`.
    pub async fn list_models(&self) -> Result<Vec<OllamaModel>> {
        let url = format!("{}/api/tags", self.base_url);
        debug!("Listing Ollama models from {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| net_err(format!("Failed to connect to Ollama at {}: {}", url, e)))?;
        let response = check_response(response).await?;
        let tags: TagsResponse = response.json().await?;
        Ok(tags.models.unwrap_or_default())
    }

    /// `POST /api/pull`, calling `on_status` for every streamed line.
    ///
    /// Returns the last line received. A line carrying `error` ends the pull
    /// with `NETWORK_ERROR`.
    pub async fn pull(
        &self,
        name: &str,
        cancel: &CancellationToken,
        mut on_status: impl FnMut(&PullStatus) + Send,
    ) -> Result<PullStatus> {
        let url = format!("{}/api/pull", self.base_url);
        debug!("Pulling {} via {}", name, url);

        let response = self
            .pull_client
            .post(&url)
            .json(&serde_json::json!({ "name": name, "stream": true }))
            .send()
            .await
            .map_err(|e| net_err(format!("Failed to connect to Ollama at {}: {}", url, e)))?;
        let response = check_response(response).await?;

        let mut stream = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();
        let mut last = PullStatus::default();

        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => return Err(AimaError::Cancelled),
                next = stream.next() => next,
            };
            let Some(chunk) = next else { break };
            let chunk: Bytes = chunk.map_err(|e| net_err(format!("Pull stream error: {}", e)))?;
            buffer.extend_from_slice(&chunk);

            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                if let Some(status) = parse_line(&line)? {
                    on_status(&status);
                    last = status;
                }
            }
        }
        if let Some(status) = parse_line(&buffer)? {
            on_status(&status);
            last = status;
        }
        Ok(last)
    }

    /// Non-streamed `POST /api/chat`.
    pub async fn chat(
        &self,
        model: &str,
        messages: &[Message],
        options: &ChatOptions,
    ) -> Result<ChatReply> {
        let url = format!("{}/api/chat", self.base_url);
        let request = ChatRequest {
            model,
            messages,
            stream: false,
            options: chat_options(options),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| net_err(format!("Failed to connect to Ollama at {}: {}", url, e)))?;
        let response = check_response(response).await?;
        Ok(response.json().await?)
    }

    /// `POST /api/embed`.
    pub async fn embed(&self, model: &str, input: &[String]) -> Result<EmbedReply> {
        let url = format!("{}/api/embed", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&EmbedRequest { model, input })
            .send()
            .await
            .map_err(|e| net_err(format!("Failed to connect to Ollama at {}: {}", url, e)))?;
        let response = check_response(response).await?;
        Ok(response.json().await?)
    }
}

fn net_err(message: String) -> AimaError {
    AimaError::Network {
        message,
        status: None,
    }
}

/// Parse one NDJSON line; blank lines yield `None`.
fn parse_line(line: &[u8]) -> Result<Option<PullStatus>> {
    let trimmed = String::from_utf8_lossy(line);
    let trimmed = trimmed.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let status: PullStatus = serde_json::from_str(trimmed)?;
    if let Some(err) = &status.error {
        return Err(net_err(format!("ollama error: {}", err)));
    }
    trace!("Ollama pull status: {}", status.status);
    Ok(Some(status))
}

/// Map chat options onto Ollama's `options` object.
fn chat_options(options: &ChatOptions) -> Map<String, Value> {
    let mut map = Map::new();
    if let Some(t) = options.temperature {
        map.insert("temperature".into(), t.into());
    }
    if let Some(n) = options.max_tokens {
        map.insert("num_predict".into(), n.into());
    }
    if let Some(p) = options.top_p {
        map.insert("top_p".into(), p.into());
    }
    if !options.stop.is_empty() {
        map.insert("stop".into(), options.stop.clone().into());
    }
    map
}

async fn check_response(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorBody>(&body) {
        Ok(err) if !err.error.is_empty() => format!("ollama error: {}", err.error),
        _ => format!("ollama error: status {}, body: {}", status.as_u16(), body),
    };
    Err(AimaError::Network {
        message,
        status: Some(status.as_u16()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::json;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_pull_parses_split_ndjson() {
        // Lines deliberately split across chunks.
        let router = Router::new().route(
            "/api/pull",
            post(|| async {
                let chunks: Vec<std::result::Result<&'static str, std::io::Error>> = vec![
                    Ok("{\"status\":\"pulling manifest\"}\n{\"status\":\"pulling a1\",\"digest\":\"a1\","),
                    Ok("\"total\":100,\"completed\":40}\n\n{\"status\":\"pulling a1\",\"digest\":\"a1\",\"total\":100,\"completed\":100}\n"),
                    Ok("{\"status\":\"success\"}"),
                ];
                Body::from_stream(futures::stream::iter(chunks))
            }),
        );
        let base = serve(router).await;
        let client = OllamaClient::new(Some(&base)).unwrap();

        let mut seen = Vec::new();
        let last = client
            .pull("llama3:latest", &CancellationToken::new(), |s| {
                seen.push((s.status.clone(), s.completed))
            })
            .await
            .unwrap();

        assert!(last.is_success());
        assert_eq!(seen.len(), 4);
        assert_eq!(seen[1], ("pulling a1".to_string(), 40));
        assert_eq!(seen[2].1, 100);
    }

    #[tokio::test]
    async fn test_pull_error_line_fails() {
        let router = Router::new().route(
            "/api/pull",
            post(|| async { "{\"status\":\"pulling manifest\"}\n{\"error\":\"pull model manifest: file does not exist\"}\n" }),
        );
        let base = serve(router).await;
        let client = OllamaClient::new(Some(&base)).unwrap();

        let err = client
            .pull("nope:latest", &CancellationToken::new(), |_| {})
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NETWORK_ERROR");
        assert!(err.to_string().contains("file does not exist"));
    }

    #[tokio::test]
    async fn test_error_status_and_tags() {
        let router = Router::new()
            .route(
                "/api/tags",
                get(|| async {
                    Json(json!({"models": [{
                        "name": "llama3:latest",
                        "size": 4661224676u64,
                        "digest": "365c0bd3c000",
                        "details": {"parameter_size": "8.0B", "quantization_level": "Q4_0"}
                    }]}))
                }),
            )
            .route(
                "/api/chat",
                post(|| async {
                    (StatusCode::NOT_FOUND, Json(json!({"error": "model \"x\" not found"})))
                }),
            );
        let base = serve(router).await;
        let client = OllamaClient::new(Some(&format!("{}/", base))).unwrap();
        assert_eq!(client.base_url(), base);

        let models = client.list_models().await.unwrap();
        assert_eq!(models[0].details.parameter_size, "8.0B");

        let err = client
            .chat("x", &[Message::user("hi")], &ChatOptions::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("ollama error: model \"x\" not found"));
    }

    #[test]
    fn test_chat_options_mapping() {
        let options = ChatOptions {
            temperature: Some(0.5),
            max_tokens: Some(64),
            top_p: None,
            stop: vec!["\n".into()],
        };
        let map = chat_options(&options);
        assert_eq!(map["num_predict"], 64);
        assert_eq!(map["stop"], json!(["\n"]));
        assert!(!map.contains_key("top_p"));
        assert!(chat_options(&ChatOptions::default()).is_empty());
    }
}
