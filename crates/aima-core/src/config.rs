//! Centralized configuration for the AIMA control plane.
//!
//! Compile-time defaults grouped by concern. Runtime overrides go through
//! [`AimaApiBuilder`](crate::AimaApiBuilder).

use std::time::Duration;

/// Application-level configuration.
pub struct AppConfig;

impl AppConfig {
    pub const APP_NAME: &'static str = "aima";
    pub const DATA_DIR_NAME: &'static str = "aima";
    pub const MODELS_FILE_NAME: &'static str = "models.json";
    pub const DATABASE_FILE_NAME: &'static str = "aima.db";
}

/// Gateway request handling.
pub struct GatewayConfig;

impl GatewayConfig {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);
    pub const REQUEST_ID_PREFIX: &'static str = "req_";
}

/// HuggingFace Hub access.
pub struct HuggingFaceConfig;

impl HuggingFaceConfig {
    pub const BASE_URL: &'static str = "https://huggingface.co";
    pub const DEFAULT_DOWNLOAD_DIR: &'static str = "/tmp/aima-models";
    pub const API_TIMEOUT: Duration = Duration::from_secs(30);
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
    pub const USER_AGENT: &'static str = "aima/1.0";
    pub const TOKEN_ENV_VAR: &'static str = "HF_TOKEN";
    pub const SEARCH_CACHE_TTL: Duration = Duration::from_secs(300);
    pub const SEARCH_CACHE_CAPACITY: u64 = 256;
}

/// Local Ollama daemon access.
pub struct OllamaConfig;

impl OllamaConfig {
    pub const DEFAULT_BASE_URL: &'static str = "http://localhost:11434";
    pub const API_TIMEOUT: Duration = Duration::from_secs(120);
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
    pub const USER_AGENT: &'static str = "aima/1.0";
}

/// Model pull pipeline.
pub struct PullConfig;

impl PullConfig {
    /// Capacity of the progress channel between provider and command.
    pub const PROGRESS_BUFFER: usize = 10;
}

/// In-process event bus.
pub struct EventBusConfig;

impl EventBusConfig {
    pub const BUFFER_SIZE: usize = 1000;
}

/// Resource watching.
pub struct ResourceConfig;

impl ResourceConfig {
    pub const WATCH_INTERVAL: Duration = Duration::from_secs(30);
    pub const WATCH_BUFFER: usize = 10;
}

/// Pagination defaults for list, search and match units.
pub struct ListConfig;

impl ListConfig {
    pub const LIST_DEFAULT_LIMIT: usize = 100;
    pub const SEARCH_DEFAULT_LIMIT: usize = 20;
    pub const MATCH_DEFAULT_LIMIT: usize = 10;
    pub const MATCH_MAX_LIMIT: usize = 50;
}

/// Resource estimation fallbacks.
pub struct EstimateConfig;

impl EstimateConfig {
    pub const FALLBACK_MEMORY_MIN: u64 = 4 * 1024 * 1024 * 1024;
    pub const FALLBACK_MEMORY_RECOMMENDED: u64 = 8 * 1024 * 1024 * 1024;
}

/// SQLite store settings.
pub struct SqliteConfig;

impl SqliteConfig {
    /// Busy timeout for database locks (milliseconds).
    pub const BUSY_TIMEOUT_MS: u32 = 5000;
}

/// In-memory service runtime settings.
pub struct ServiceConfig;

impl ServiceConfig {
    pub const ENDPOINT_HOST: &'static str = "127.0.0.1";
    /// First port handed out to a started service.
    pub const BASE_PORT: u16 = 8000;
}
