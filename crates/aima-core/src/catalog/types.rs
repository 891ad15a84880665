//! Catalog domain types: recipes, hardware profiles and match results.

use crate::ids::generate_id;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Score bonuses of the hardware matcher.
pub struct MatchScore;

impl MatchScore {
    pub const GPU_VENDOR: u32 = 40;
    pub const GPU_MODEL: u32 = 30;
    pub const GPU_ARCH: u32 = 15;
    pub const VRAM: u32 = 10;
    pub const OS: u32 = 5;
}

/// A target hardware configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareProfile {
    pub gpu_vendor: String,
    pub gpu_model: String,
    pub gpu_arch: String,
    pub vram_min_gb: u32,
    pub cpu_arch: String,
    pub os: String,
    pub unified_memory: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// Engine image configuration of a recipe.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecipeEngine {
    #[serde(rename = "type")]
    pub engine_type: String,
    pub image: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fallback_images: Vec<String>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub config: Map<String, Value>,
}

/// A model a recipe needs, described by name and repository.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecipeModel {
    pub name: String,
    pub source: String,
    pub repo: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub tag: String,
    #[serde(rename = "type")]
    pub model_type: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub format: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub mirror: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub memory_required: u64,
}

fn is_zero(v: &u64) -> bool {
    *v == 0
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceLimits {
    pub gpu_memory_utilization: f64,
    pub max_model_len: u32,
    pub tensor_parallel: u32,
}

/// A validated hardware/engine/model/limits combination.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Recipe {
    pub id: String,
    pub name: String,
    pub description: String,
    pub version: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub author: String,
    pub profile: HardwareProfile,
    pub engine: RecipeEngine,
    pub models: Vec<RecipeModel>,
    pub resource_limits: ResourceLimits,
    pub verified: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl Recipe {
    pub const DEFAULT_VERSION: &'static str = "1.0.0";

    pub fn has_any_tag(&self, tags: &[String]) -> bool {
        tags.iter().any(|t| self.tags.contains(t))
    }
}

pub fn generate_recipe_id() -> String {
    generate_id("recipe")
}

/// A recipe paired with its hardware match score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub recipe: Recipe,
    pub score: u32,
}

/// Readiness of one recipe model on this host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelReadiness {
    pub name: String,
    pub ready: bool,
}

/// Filter and pagination for recipe listings. `limit == 0` means unlimited.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeFilter {
    /// Match recipes carrying at least one of these tags.
    pub tags: Vec<String>,
    pub gpu_vendor: Option<String>,
    pub verified_only: bool,
    pub limit: usize,
    pub offset: usize,
}

impl RecipeFilter {
    pub fn matches(&self, recipe: &Recipe) -> bool {
        self.gpu_vendor
            .as_deref()
            .is_none_or(|v| recipe.profile.gpu_vendor == v)
            && (!self.verified_only || recipe.verified)
            && (self.tags.is_empty() || recipe.has_any_tag(&self.tags))
    }
}

/// Hardware match score of `recipe` for the caller's `hw`.
///
/// Each non-empty caller field that equals the recipe's adds its bonus; VRAM
/// counts when the caller has at least what the recipe needs.
pub fn score_recipe(recipe: &Recipe, hw: &HardwareProfile) -> u32 {
    let p = &recipe.profile;
    let mut score = 0;
    if !hw.gpu_vendor.is_empty() && p.gpu_vendor == hw.gpu_vendor {
        score += MatchScore::GPU_VENDOR;
    }
    if !hw.gpu_model.is_empty() && p.gpu_model == hw.gpu_model {
        score += MatchScore::GPU_MODEL;
    }
    if !hw.gpu_arch.is_empty() && p.gpu_arch == hw.gpu_arch {
        score += MatchScore::GPU_ARCH;
    }
    if hw.vram_min_gb > 0 && hw.vram_min_gb >= p.vram_min_gb {
        score += MatchScore::VRAM;
    }
    if !hw.os.is_empty() && p.os == hw.os {
        score += MatchScore::OS;
    }
    score
}
