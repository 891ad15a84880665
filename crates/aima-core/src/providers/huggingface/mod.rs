//! HuggingFace Hub integration.
//!
//! - [`client`] - HTTP client for model info, search and file downloads
//! - [`mapping`] - File selection, type detection and resource estimation
//! - [`provider`] - The pull pipeline and local import behind [`ModelProvider`](crate::model::ModelProvider)
//! - [`types`] - API response structs

mod client;
mod mapping;
mod provider;
mod types;

pub use client::HuggingFaceClient;
pub use mapping::{detect_model_type, estimate_requirements, select_files, FileSelection};
pub use provider::{is_huggingface_source, HuggingFaceProvider};
pub use types::{LfsInfo, ModelInfo, SafetensorsInfo, Sibling};

use crate::config::{AppConfig, HuggingFaceConfig};
use tracing::debug;

/// Resolve a HuggingFace token.
///
/// Checks in order:
/// 1. `HF_TOKEN` environment variable
/// 2. AIMA config file (`~/.config/aima/hf_token`)
/// 3. HuggingFace CLI cache (`~/.cache/huggingface/token`)
pub fn resolve_token() -> Option<String> {
    if let Ok(token) = std::env::var(HuggingFaceConfig::TOKEN_ENV_VAR) {
        let token = token.trim().to_string();
        if !token.is_empty() {
            debug!("HuggingFace token found in environment");
            return Some(token);
        }
    }

    let candidates = [
        dirs::config_dir().map(|d| d.join(AppConfig::DATA_DIR_NAME).join("hf_token")),
        dirs::home_dir().map(|h| h.join(".cache").join("huggingface").join("token")),
    ];
    for path in candidates.into_iter().flatten() {
        if let Ok(token) = std::fs::read_to_string(&path) {
            let token = token.trim().to_string();
            if !token.is_empty() {
                debug!("HuggingFace token found at {}", path.display());
                return Some(token);
            }
        }
    }
    None
}
