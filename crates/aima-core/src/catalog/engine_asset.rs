//! Engine asset descriptors loaded from YAML.
//!
//! Asset files may carry markdown-style `#` header lines above the YAML body;
//! every line whose first non-blank character is `#` is dropped before
//! parsing.

use super::types::RecipeEngine;
use crate::error::{AimaError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// A parsed engine asset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineAsset {
    pub name: String,
    #[serde(rename = "type")]
    pub engine_type: String,
    pub image: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallback_images: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub default_args: Vec<String>,
    /// From `--port <N>` in the default args; 0 when absent.
    pub default_port: u16,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub health_check_path: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub health_check_timeout: String,
    pub gpu_required: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub memory_min: String,
    pub cpu_cores_min: u32,
}

impl EngineAsset {
    pub fn to_recipe_engine(&self) -> RecipeEngine {
        RecipeEngine {
            engine_type: self.engine_type.clone(),
            image: self.image.clone(),
            fallback_images: self.fallback_images.clone(),
            ..Default::default()
        }
    }
}

// On-disk layout.

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AssetFile {
    name: String,
    #[serde(rename = "type")]
    engine_type: String,
    image: ImageSection,
    requirements: RequirementsSection,
    startup: StartupSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ImageSection {
    full_name: String,
    alternative_names: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RequirementsSection {
    gpu: GpuRequirements,
    cpu: CpuRequirements,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GpuRequirements {
    required: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CpuRequirements {
    cores_min: u32,
    memory_min: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StartupSection {
    command: Vec<String>,
    default_args: Vec<String>,
    health_check: HealthCheck,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HealthCheck {
    path: String,
    timeout: String,
}

fn strip_comment_lines(content: &str) -> String {
    content
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Port from `--port <N>` or `--port=<N>`.
pub fn parse_default_port(args: &[String]) -> u16 {
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--port" {
            if let Some(port) = iter.next().and_then(|p| p.parse().ok()) {
                return port;
            }
        } else if let Some(port) = arg.strip_prefix("--port=").and_then(|p| p.parse().ok()) {
            return port;
        }
    }
    0
}

/// Parse one asset document.
pub fn parse_engine_asset(content: &str) -> Result<EngineAsset> {
    let cleaned = strip_comment_lines(content);
    let file: AssetFile = serde_yaml::from_str(&cleaned)?;

    Ok(EngineAsset {
        default_port: parse_default_port(&file.startup.default_args),
        name: file.name,
        engine_type: file.engine_type,
        image: file.image.full_name,
        fallback_images: file.image.alternative_names,
        command: file.startup.command,
        default_args: file.startup.default_args,
        health_check_path: file.startup.health_check.path,
        health_check_timeout: file.startup.health_check.timeout,
        gpu_required: file.requirements.gpu.required,
        memory_min: file.requirements.cpu.memory_min,
        cpu_cores_min: file.requirements.cpu.cores_min,
    })
}

pub fn load_engine_asset(path: &Path) -> Result<EngineAsset> {
    let content = std::fs::read_to_string(path).map_err(|e| AimaError::io_with_path(e, path))?;
    parse_engine_asset(&content)
}

/// Load every `*.yaml`/`*.yml` below `dir`, keyed by engine type.
///
/// Unparsable files and files without a type are skipped. When two files
/// declare the same type the one visited last wins.
pub fn load_engine_assets(dir: &Path) -> Result<BTreeMap<String, EngineAsset>> {
    if !dir.is_dir() {
        return Err(AimaError::invalid_input(
            "catalog",
            format!("engine asset directory not found: {}", dir.display()),
        ));
    }

    let mut assets = BTreeMap::new();
    for entry in WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == "yaml" || e == "yml");
        if !entry.file_type().is_file() || !is_yaml {
            continue;
        }

        match load_engine_asset(path) {
            Ok(asset) if !asset.engine_type.is_empty() => {
                debug!("Loaded engine asset {} ({})", asset.name, asset.engine_type);
                assets.insert(asset.engine_type.clone(), asset);
            }
            Ok(_) => debug!("Skipping engine asset without type: {}", path.display()),
            Err(e) => warn!("Skipping unparsable engine asset {}: {}", path.display(), e),
        }
    }
    Ok(assets)
}
