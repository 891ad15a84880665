//! Model domain types.

use crate::ids::{generate_id, unix_now};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of AI model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    #[default]
    Llm,
    Vlm,
    Asr,
    Tts,
    Embedding,
    Diffusion,
    VideoGen,
    Detection,
    Rerank,
}

impl ModelType {
    pub const ALL: [ModelType; 9] = [
        ModelType::Llm,
        ModelType::Vlm,
        ModelType::Asr,
        ModelType::Tts,
        ModelType::Embedding,
        ModelType::Diffusion,
        ModelType::VideoGen,
        ModelType::Detection,
        ModelType::Rerank,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::Llm => "llm",
            ModelType::Vlm => "vlm",
            ModelType::Asr => "asr",
            ModelType::Tts => "tts",
            ModelType::Embedding => "embedding",
            ModelType::Diffusion => "diffusion",
            ModelType::VideoGen => "video_gen",
            ModelType::Detection => "detection",
            ModelType::Rerank => "rerank",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|t| t.as_str()).collect()
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// On-disk weight format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFormat {
    #[default]
    Gguf,
    Safetensors,
    Onnx,
    Tensorrt,
    Pytorch,
}

impl ModelFormat {
    pub const ALL: [ModelFormat; 5] = [
        ModelFormat::Gguf,
        ModelFormat::Safetensors,
        ModelFormat::Onnx,
        ModelFormat::Tensorrt,
        ModelFormat::Pytorch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelFormat::Gguf => "gguf",
            ModelFormat::Safetensors => "safetensors",
            ModelFormat::Onnx => "onnx",
            ModelFormat::Tensorrt => "tensorrt",
            ModelFormat::Pytorch => "pytorch",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == s)
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|f| f.as_str()).collect()
    }

    /// Derive the format from a weight file name.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let lower = filename.to_ascii_lowercase();
        if lower.ends_with(".gguf") {
            Some(ModelFormat::Gguf)
        } else if lower.ends_with(".safetensors") {
            Some(ModelFormat::Safetensors)
        } else if lower.ends_with(".onnx") {
            Some(ModelFormat::Onnx)
        } else if lower.ends_with(".engine") || lower.ends_with(".plan") {
            Some(ModelFormat::Tensorrt)
        } else if lower.ends_with(".bin") || lower.ends_with(".pt") || lower.ends_with(".pth") {
            Some(ModelFormat::Pytorch)
        } else {
            None
        }
    }
}

impl fmt::Display for ModelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a model record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelStatus {
    #[default]
    Pending,
    Pulling,
    Ready,
    Error,
    Verifying,
}

impl ModelStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelStatus::Pending => "pending",
            ModelStatus::Pulling => "pulling",
            ModelStatus::Ready => "ready",
            ModelStatus::Error => "error",
            ModelStatus::Verifying => "verifying",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        [
            ModelStatus::Pending,
            ModelStatus::Pulling,
            ModelStatus::Ready,
            ModelStatus::Error,
            ModelStatus::Verifying,
        ]
        .into_iter()
        .find(|st| st.as_str() == s)
    }
}

impl fmt::Display for ModelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_zero(v: &u64) -> bool {
    *v == 0
}

/// Memory and GPU requirements of a model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelRequirements {
    #[serde(default)]
    pub memory_min: u64,
    #[serde(default)]
    pub memory_recommended: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu_type: Option<String>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub gpu_memory: u64,
    /// Parameter count as reported by the hub's safetensors metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_params: Option<u64>,
    /// Summed size of the repository's LFS files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_bytes: Option<u64>,
}

/// An AI model artefact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub model_type: ModelType,
    pub format: ModelFormat,
    pub status: ModelStatus,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements: Option<ModelRequirements>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Model {
    /// New record with a fresh `model-xxxxxxxx` id and current timestamps.
    pub fn new(name: impl Into<String>, model_type: ModelType, format: ModelFormat) -> Self {
        let now = unix_now();
        Self {
            id: generate_model_id(),
            name: name.into(),
            model_type,
            format,
            status: ModelStatus::Pending,
            source: String::new(),
            path: String::new(),
            size: 0,
            checksum: None,
            requirements: None,
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Bump `updated_at`, never moving it before `created_at`.
    pub fn touch(&mut self) {
        self.updated_at = unix_now().max(self.created_at);
    }
}

pub fn generate_model_id() -> String {
    generate_id("model")
}

/// One progress record of a pull.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PullProgress {
    pub model_id: String,
    pub status: String,
    /// Percentage in `[0, 100]`.
    pub progress: f64,
    #[serde(default)]
    pub bytes_total: u64,
    #[serde(default)]
    pub bytes_done: u64,
    /// Bytes per second.
    #[serde(default)]
    pub speed: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PullProgress {
    pub const COMPLETED: &'static str = "completed";
    pub const ERROR: &'static str = "error";

    pub fn completed(model_id: &str) -> Self {
        Self {
            model_id: model_id.to_string(),
            status: Self::COMPLETED.to_string(),
            progress: 100.0,
            ..Default::default()
        }
    }

    pub fn failed(model_id: &str, error: impl Into<String>) -> Self {
        Self {
            model_id: model_id.to_string(),
            status: Self::ERROR.to_string(),
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status == Self::COMPLETED || self.status == Self::ERROR
    }
}

/// Outcome of `model.verify`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub valid: bool,
    #[serde(default)]
    pub issues: Vec<String>,
}

impl VerificationResult {
    pub fn valid() -> Self {
        Self {
            valid: true,
            issues: Vec::new(),
        }
    }

    pub fn invalid(issue: impl Into<String>) -> Self {
        Self {
            valid: false,
            issues: vec![issue.into()],
        }
    }

    pub fn from_issues(issues: Vec<String>) -> Self {
        Self {
            valid: issues.is_empty(),
            issues,
        }
    }
}

/// One entry of `model.search`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSearchResult {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub model_type: ModelType,
    pub source: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub downloads: u64,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Filter and pagination for model listings. `limit == 0` means unlimited.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelFilter {
    pub model_type: Option<ModelType>,
    pub status: Option<ModelStatus>,
    pub format: Option<ModelFormat>,
    pub source: Option<String>,
    pub limit: usize,
    pub offset: usize,
}

impl ModelFilter {
    pub fn matches(&self, model: &Model) -> bool {
        self.model_type.is_none_or(|t| model.model_type == t)
            && self.status.is_none_or(|s| model.status == s)
            && self.format.is_none_or(|f| model.format == f)
            && self
                .source
                .as_deref()
                .is_none_or(|s| model.source == s)
    }
}

/// Parameters of a pull.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PullRequest {
    pub source: String,
    pub repo: String,
    pub tag: String,
}

impl PullRequest {
    pub fn new(source: impl Into<String>, repo: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            repo: repo.into(),
            tag: tag.into(),
        }
    }

    /// Key of the in-flight guard: `source/repo/tag`.
    ///
    /// HuggingFace aliases and its default revision are folded so that
    /// pulls writing into the same download directory share one key.
    pub fn key(&self) -> String {
        match self.source.as_str() {
            "" | "hf" | "huggingface" => {
                let tag = if self.tag.is_empty() { "main" } else { &self.tag };
                format!("huggingface/{}/{}", self.repo, tag)
            }
            source => format!("{}/{}/{}", source, self.repo, self.tag),
        }
    }
}
