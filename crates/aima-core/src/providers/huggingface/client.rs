//! HTTP client for the HuggingFace Hub.

use super::types::{ErrorBody, ModelInfo, SearchResponse};
use crate::config::HuggingFaceConfig;
use crate::error::{AimaError, Result};
use reqwest::{Client, RequestBuilder, Response};
use tracing::debug;
use url::Url;

/// Client for HuggingFace Hub API operations.
pub struct HuggingFaceClient {
    /// HTTP client for API requests (has total timeout)
    client: Client,
    /// HTTP client for downloads (connect timeout only, no total timeout)
    download_client: Client,
    base_url: String,
    token: Option<String>,
}

impl std::fmt::Debug for HuggingFaceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HuggingFaceClient")
            .field("base_url", &self.base_url)
            .field("has_token", &self.token.is_some())
            .finish()
    }
}

impl HuggingFaceClient {
    /// Create a client for `base_url` (trailing slashes are ignored).
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(HuggingFaceConfig::API_TIMEOUT)
            .user_agent(HuggingFaceConfig::USER_AGENT)
            .build()
            .map_err(|e| AimaError::Network {
                message: format!("Failed to create HTTP client: {}", e),
                status: None,
            })?;

        // Large weight files outlive any total timeout; the stream loop
        // handles cancellation instead.
        let download_client = Client::builder()
            .connect_timeout(HuggingFaceConfig::CONNECT_TIMEOUT)
            .user_agent(HuggingFaceConfig::USER_AGENT)
            .build()
            .map_err(|e| AimaError::Network {
                message: format!("Failed to create download HTTP client: {}", e),
                status: None,
            })?;

        Ok(Self {
            client,
            download_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// `GET /api/models/<repo>`.
    pub async fn get_model_info(&self, repo: &str) -> Result<ModelInfo> {
        let url = format!("{}/api/models/{}", self.base_url, repo);
        debug!("Fetching model info: {}", url);

        let response = self.authorize(self.client.get(&url)).send().await?;
        let response = check_response(response).await?;
        Ok(response.json::<ModelInfo>().await?)
    }

    /// `GET /api/models` with `search`, `limit`, `offset` and one repeated
    /// `filter=key:value` parameter per filter entry.
    pub async fn search_models(
        &self,
        query: &str,
        filters: &[(String, String)],
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ModelInfo>> {
        let mut url = Url::parse(&format!("{}/api/models", self.base_url)).map_err(|e| {
            AimaError::Network {
                message: format!("Invalid HuggingFace base URL {}: {}", self.base_url, e),
                status: None,
            }
        })?;
        {
            let mut pairs = url.query_pairs_mut();
            if !query.is_empty() {
                pairs.append_pair("search", query);
            }
            if limit > 0 {
                pairs.append_pair("limit", &limit.to_string());
            }
            if offset > 0 {
                pairs.append_pair("offset", &offset.to_string());
            }
            for (key, value) in filters {
                pairs.append_pair("filter", &format!("{}:{}", key, value));
            }
        }
        debug!("Searching HuggingFace: {}", url);

        let response = self.authorize(self.client.get(url)).send().await?;
        let response = check_response(response).await?;
        Ok(response.json::<SearchResponse>().await?.into_items())
    }

    /// `<base>/<repo>/resolve/<revision>/<filename>`.
    pub fn resolve_url(&self, repo: &str, filename: &str, revision: &str) -> String {
        let revision = if revision.is_empty() { "main" } else { revision };
        let encoded: Vec<String> = filename
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!(
            "{}/{}/resolve/{}/{}",
            self.base_url,
            repo,
            revision,
            encoded.join("/")
        )
    }

    /// Open a streaming download of one repository file.
    pub async fn download_file(
        &self,
        repo: &str,
        filename: &str,
        revision: &str,
    ) -> Result<Response> {
        let url = self.resolve_url(repo, filename, revision);
        debug!("Downloading {}", url);

        let response = self
            .authorize(self.download_client.get(&url))
            .send()
            .await
            .map_err(|e| AimaError::Network {
                message: format!("Download request failed: {}", e),
                status: None,
            })?;
        check_response(response).await
    }
}

/// Turn a non-2xx response into `NETWORK_ERROR` carrying the hub's message.
async fn check_response(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorBody>(&body) {
        Ok(err) if !err.error.is_empty() => format!("huggingface error: {}", err.error),
        Ok(err) if !err.message.is_empty() => format!("huggingface error: {}", err.message),
        _ => format!(
            "huggingface error: status {}, body: {}",
            status.as_u16(),
            body
        ),
    };
    Err(AimaError::Network {
        message,
        status: Some(status.as_u16()),
    })
}
