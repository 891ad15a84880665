//! HuggingFace Hub API response types.

use serde::Deserialize;
use serde_json::{Map, Value};

/// Repository metadata from `GET /api/models/<repo>`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelInfo {
    /// Hub-internal object id.
    #[serde(rename = "_id", default)]
    pub id: String,
    /// Repository id, e.g. `meta-llama/Llama-3-8B`.
    #[serde(rename = "id", default)]
    pub model_id: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub pipeline_tag: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub downloads: u64,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub gated: Value,
    #[serde(default)]
    pub siblings: Vec<Sibling>,
    #[serde(rename = "cardData", default)]
    pub card_data: Option<Map<String, Value>>,
    #[serde(default)]
    pub safetensors: Option<SafetensorsInfo>,
}

impl ModelInfo {
    /// Sum of LFS sizes over all siblings.
    pub fn total_lfs_size(&self) -> u64 {
        self.siblings
            .iter()
            .filter_map(|s| s.lfs.as_ref())
            .map(|lfs| lfs.size)
            .sum()
    }

    /// `safetensors.total` when the hub reports a positive value.
    pub fn safetensors_total(&self) -> Option<u64> {
        self.safetensors.as_ref().map(|s| s.total).filter(|t| *t > 0)
    }

    /// Card `description`, falling back to `summary`.
    pub fn description(&self) -> String {
        let Some(card) = &self.card_data else {
            return String::new();
        };
        ["description", "summary"]
            .iter()
            .find_map(|key| card.get(*key).and_then(Value::as_str))
            .unwrap_or_default()
            .to_string()
    }
}

/// One file of a repository.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Sibling {
    pub rfilename: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub lfs: Option<LfsInfo>,
}

impl Sibling {
    /// Size used for progress accounting.
    pub fn lfs_size(&self) -> u64 {
        self.lfs.as_ref().map(|l| l.size).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LfsInfo {
    #[serde(default)]
    pub sha256: String,
    #[serde(default)]
    pub size: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SafetensorsInfo {
    #[serde(default)]
    pub total: u64,
}

/// `GET /api/models` answers with a bare array; some mirrors wrap it.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(super) enum SearchResponse {
    List(Vec<ModelInfo>),
    Paged { items: Vec<ModelInfo> },
}

impl SearchResponse {
    pub(super) fn into_items(self) -> Vec<ModelInfo> {
        match self {
            SearchResponse::List(items) | SearchResponse::Paged { items } => items,
        }
    }
}

/// Error body returned by the hub.
#[derive(Debug, Default, Deserialize)]
pub(super) struct ErrorBody {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_model_info_field_names() {
        let info: ModelInfo = serde_json::from_value(json!({
            "_id": "abc123",
            "id": "test-org/test-model",
            "pipeline_tag": "text-generation",
            "tags": ["gguf"],
            "siblings": [
                {"rfilename": "config.json"},
                {"rfilename": "model.gguf", "lfs": {"sha256": "00", "size": 100}}
            ],
            "cardData": {"summary": "tiny"},
            "safetensors": {"total": 8000}
        }))
        .unwrap();

        assert_eq!(info.id, "abc123");
        assert_eq!(info.model_id, "test-org/test-model");
        assert_eq!(info.total_lfs_size(), 100);
        assert_eq!(info.safetensors_total(), Some(8000));
        assert_eq!(info.description(), "tiny");
    }

    #[test]
    fn test_search_response_shapes() {
        let bare: SearchResponse = serde_json::from_value(json!([{"id": "a/b"}])).unwrap();
        assert_eq!(bare.into_items()[0].model_id, "a/b");
        let paged: SearchResponse =
            serde_json::from_value(json!({"items": [{"id": "c/d"}], "totalItems": 1})).unwrap();
        assert_eq!(paged.into_items()[0].model_id, "c/d");
    }
}
