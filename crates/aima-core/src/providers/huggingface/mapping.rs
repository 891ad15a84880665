//! Hub metadata to model-domain mappings: file selection, type detection
//! and resource estimation.

use super::types::{ModelInfo, Sibling};
use crate::config::EstimateConfig;
use crate::model::{ModelRequirements, ModelType};

/// Extensions treated as model weights on the primary selection pass.
const WEIGHT_EXTENSIONS: [&str; 6] = [".gguf", ".safetensors", ".onnx", ".bin", ".pt", ".pth"];

/// Substrings that make a file eligible on the fallback pass.
const FALLBACK_MARKERS: [&str; 3] = ["config", ".json", "tokenizer"];

const QUANTIZATION_MARKERS: [&str; 6] = ["quantized", "4bit", "8bit", "gptq", "awq", "gguf"];

/// Files a pull downloads, in repository order, plus their summed LFS size.
#[derive(Debug, Clone, Default)]
pub struct FileSelection {
    pub files: Vec<Sibling>,
    pub total_size: u64,
}

/// Pick downloadable files: weights first, config/tokenizer files only when
/// the repository has no weights at all.
pub fn select_files(siblings: &[Sibling]) -> FileSelection {
    let mut selection = FileSelection::default();
    for sibling in siblings {
        if is_weight_file(&sibling.rfilename) {
            selection.total_size += sibling.lfs_size();
            selection.files.push(sibling.clone());
        }
    }

    if selection.files.is_empty() {
        selection.files = siblings
            .iter()
            .filter(|s| FALLBACK_MARKERS.iter().any(|m| s.rfilename.contains(m)))
            .cloned()
            .collect();
    }
    selection
}

fn is_weight_file(filename: &str) -> bool {
    let ext = match filename.rfind('.') {
        Some(idx) if idx > filename.rfind('/').map(|i| i + 1).unwrap_or(0) => &filename[idx..],
        _ => return false,
    };
    WEIGHT_EXTENSIONS.contains(&ext)
}

/// Detect the model type from the pipeline tag, then tag hints; `llm` otherwise.
pub fn detect_model_type(info: &ModelInfo) -> ModelType {
    if let Some(t) = info.pipeline_tag.as_deref().and_then(type_from_pipeline_tag) {
        return t;
    }
    info.tags
        .iter()
        .find_map(|tag| type_from_tag(tag))
        .unwrap_or(ModelType::Llm)
}

fn type_from_pipeline_tag(tag: &str) -> Option<ModelType> {
    let t = match tag {
        "text-generation" | "text2text-generation" => ModelType::Llm,
        "image-text-to-text" | "visual-question-answering" => ModelType::Vlm,
        "automatic-speech-recognition" => ModelType::Asr,
        "text-to-speech" => ModelType::Tts,
        "feature-extraction" | "sentence-similarity" => ModelType::Embedding,
        "text-to-image" | "image-to-image" => ModelType::Diffusion,
        "text-to-video" | "image-to-video" => ModelType::VideoGen,
        "object-detection" | "image-segmentation" => ModelType::Detection,
        "text-ranking" | "reranking" => ModelType::Rerank,
        _ => return None,
    };
    Some(t)
}

fn type_from_tag(tag: &str) -> Option<ModelType> {
    // Short hints must match exactly; "tts" would otherwise match inside "watts".
    let t = match tag {
        "vlm" => ModelType::Vlm,
        "asr" => ModelType::Asr,
        "tts" => ModelType::Tts,
        _ if contains_any(tag, &["text-generation", "causal-lm", "causal-language-model"]) => {
            ModelType::Llm
        }
        _ if contains_any(tag, &["vision-language", "visual-language"]) => ModelType::Vlm,
        _ if tag.contains("speech-recognition") => ModelType::Asr,
        _ if tag.contains("speech-synthesis") => ModelType::Tts,
        _ if contains_any(tag, &["sentence-embeddings", "embeddings"]) => ModelType::Embedding,
        _ if tag.contains("diffusion") => ModelType::Diffusion,
        _ => return None,
    };
    Some(t)
}

fn contains_any(tag: &str, hints: &[&str]) -> bool {
    hints.iter().any(|h| tag.contains(h))
}

/// Hub `task` filter for a model type.
pub fn pipeline_tag_for(model_type: ModelType) -> &'static str {
    match model_type {
        ModelType::Llm => "text-generation",
        ModelType::Vlm => "image-text-to-text",
        ModelType::Asr => "automatic-speech-recognition",
        ModelType::Tts => "text-to-speech",
        ModelType::Embedding => "feature-extraction",
        ModelType::Diffusion => "text-to-image",
        ModelType::VideoGen => "text-to-video",
        ModelType::Detection => "object-detection",
        ModelType::Rerank => "text-ranking",
    }
}

pub fn has_quantization_tag(tags: &[String]) -> bool {
    tags.iter()
        .any(|tag| QUANTIZATION_MARKERS.iter().any(|m| tag.contains(m)))
}

/// Memory requirements from repository metadata.
///
/// LFS bytes win over parameter counts; with neither, the 4/8 GiB fallback.
pub fn estimate_requirements(info: &ModelInfo) -> ModelRequirements {
    let total_params = info.safetensors_total();
    let total_size = info.total_lfs_size();

    let (memory_min, memory_recommended) = if total_size > 0 {
        (
            (total_size as f64 * 1.2) as u64,
            (total_size as f64 * 1.5) as u64,
        )
    } else if let Some(params) = total_params {
        let bytes_per_param = if has_quantization_tag(&info.tags) { 1 } else { 2 };
        let min = params.saturating_mul(bytes_per_param);
        (min, (min as f64 * 1.3) as u64)
    } else {
        (
            EstimateConfig::FALLBACK_MEMORY_MIN,
            EstimateConfig::FALLBACK_MEMORY_RECOMMENDED,
        )
    };

    ModelRequirements {
        memory_min,
        memory_recommended,
        gpu_type: None,
        gpu_memory: memory_min,
        total_params,
        total_bytes: (total_size > 0).then_some(total_size),
    }
}
