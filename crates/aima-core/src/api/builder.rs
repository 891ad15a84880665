//! Builder for [`AimaApi`].

use super::units::{register_units, Wiring};
use crate::catalog::{load_engine_assets, EngineAssets, RecipeStore};
use crate::config::{AppConfig, GatewayConfig, HuggingFaceConfig, ResourceConfig};
use crate::error::{AimaError, Result};
use crate::events::{EventBus, EventPublisher};
use crate::gateway::{Authenticator, Gateway, StaticTokenAuthenticator};
use crate::inference::InferenceProvider;
use crate::model::{ModelProvider, ModelStore};
use crate::providers::{
    huggingface, HuggingFaceClient, HuggingFaceProvider, LocalServiceProvider, OllamaClient,
    OllamaProvider, SourceRouter,
};
use crate::registry::Registry;
use crate::service::{ServiceProvider, ServiceStore};
use crate::stores::{
    FileModelStore, MemoryModelStore, MemoryRecipeStore, MemoryServiceStore, SqliteDatabase,
    SqliteModelStore, SqliteRecipeStore, SqliteServiceStore,
};
use crate::AimaApi;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Where model, recipe and service records are kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StoreBackend {
    /// Process-local maps; nothing survives a restart.
    #[default]
    Memory,
    /// Models in `models.json` under the data dir; recipes and services in memory.
    File,
    /// All three tables in `aima.db` under the data dir.
    Sqlite,
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackend::Memory => "memory",
            StoreBackend::File => "file",
            StoreBackend::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreBackend {
    type Err = AimaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "file" => Ok(StoreBackend::File),
            "sqlite" => Ok(StoreBackend::Sqlite),
            other => Err(AimaError::InvalidInput {
                domain: None,
                message: format!("unknown store backend: {} (expected memory, file or sqlite)", other),
            }),
        }
    }
}

/// Builder for constructing an [`AimaApi`] instance.
///
/// # Example
///
/// ```rust,no_run
/// use aima_core::{AimaApi, StoreBackend};
///
/// # async fn example() -> aima_core::Result<()> {
/// let api = AimaApi::builder()
///     .data_dir("/var/lib/aima")
///     .store_backend(StoreBackend::Sqlite)
///     .with_ollama(false)
///     .build()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct AimaApiBuilder {
    data_dir: Option<PathBuf>,
    backend: StoreBackend,
    hf_token: Option<String>,
    hf_base_url: String,
    download_dir: Option<PathBuf>,
    ollama_url: Option<String>,
    enable_ollama: bool,
    engine_asset_dir: Option<PathBuf>,
    gateway_timeout: Duration,
    watch_interval: Duration,
    authenticator: Option<Arc<dyn Authenticator>>,
    service_provider: Option<Arc<dyn ServiceProvider>>,
}

impl Default for AimaApiBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AimaApiBuilder {
    pub fn new() -> Self {
        Self {
            data_dir: None,
            backend: StoreBackend::default(),
            hf_token: None,
            hf_base_url: HuggingFaceConfig::BASE_URL.to_string(),
            download_dir: None,
            ollama_url: None,
            enable_ollama: true,
            engine_asset_dir: None,
            gateway_timeout: GatewayConfig::DEFAULT_TIMEOUT,
            watch_interval: ResourceConfig::WATCH_INTERVAL,
            authenticator: None,
            service_provider: None,
        }
    }

    /// Directory for the file and SQLite backends. Defaults to the platform data dir.
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    pub fn store_backend(mut self, backend: StoreBackend) -> Self {
        self.backend = backend;
        self
    }

    /// HuggingFace token. Falls back to `HF_TOKEN` and the CLI token file.
    pub fn hf_token(mut self, token: impl Into<String>) -> Self {
        self.hf_token = Some(token.into());
        self
    }

    pub fn hf_base_url(mut self, url: impl Into<String>) -> Self {
        self.hf_base_url = url.into();
        self
    }

    pub fn download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = Some(dir.into());
        self
    }

    pub fn ollama_url(mut self, url: impl Into<String>) -> Self {
        self.ollama_url = Some(url.into());
        self
    }

    /// Disable to run without an Ollama provider; inference units then
    /// answer `PROVIDER_NOT_SET`.
    pub fn with_ollama(mut self, enable: bool) -> Self {
        self.enable_ollama = enable;
        self
    }

    /// Directory of engine asset YAML files used by `catalog.validate_recipe`
    /// and `catalog.engines`.
    pub fn engine_asset_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.engine_asset_dir = Some(dir.into());
        self
    }

    pub fn gateway_timeout(mut self, timeout: Duration) -> Self {
        self.gateway_timeout = timeout;
        self
    }

    pub fn watch_interval(mut self, interval: Duration) -> Self {
        self.watch_interval = interval;
        self
    }

    /// Require `token` as the request credential.
    pub fn api_token(self, token: impl Into<String>) -> Self {
        self.authenticator(Arc::new(StaticTokenAuthenticator::new(token)))
    }

    pub fn authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    /// Replace the in-process service runtime.
    pub fn service_provider(mut self, provider: Arc<dyn ServiceProvider>) -> Self {
        self.service_provider = Some(provider);
        self
    }

    /// Build the API. Must be called from within a tokio runtime, since the
    /// event bus spawns its dispatcher.
    pub async fn build(self) -> Result<AimaApi> {
        let data_dir = match &self.data_dir {
            Some(dir) => dir.clone(),
            None => dirs::data_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join(AppConfig::DATA_DIR_NAME),
        };

        let (models, recipes, services) = open_stores(self.backend, &data_dir)?;
        info!(
            "AIMA starting with {} store backend (data dir {})",
            self.backend,
            data_dir.display()
        );

        // Providers
        let token = self.hf_token.clone().or_else(huggingface::resolve_token);
        if token.is_some() {
            debug!("Using HuggingFace token");
        }
        let hf_client = HuggingFaceClient::new(self.hf_base_url.clone(), token)?;
        let mut hf = HuggingFaceProvider::new(hf_client);
        if let Some(dir) = &self.download_dir {
            hf = hf.with_download_dir(dir.clone());
        }
        let mut router = SourceRouter::new(Arc::new(hf));

        let mut inference: Option<Arc<dyn InferenceProvider>> = None;
        if self.enable_ollama {
            let ollama = Arc::new(OllamaProvider::new(OllamaClient::new(
                self.ollama_url.as_deref(),
            )?));
            router = router.with_ollama(ollama.clone());
            inference = Some(ollama);
        }
        let model_provider: Arc<dyn ModelProvider> = Arc::new(router);

        let service_provider = self
            .service_provider
            .clone()
            .unwrap_or_else(|| Arc::new(LocalServiceProvider::new()));

        let engine_assets = self.load_assets();

        let bus = Arc::new(EventBus::new());
        let events: Arc<dyn EventPublisher> = bus.clone();

        let registry = Arc::new(Registry::new());
        register_units(
            &registry,
            &Wiring {
                models: models.clone(),
                recipes: recipes.clone(),
                services: services.clone(),
                model_provider: Some(model_provider),
                inference_provider: inference,
                service_provider: Some(service_provider),
                engine_assets,
                events: events.clone(),
            },
        )?;

        let mut gateway = Gateway::new(registry.clone())
            .with_timeout(self.gateway_timeout)
            .with_watch_interval(self.watch_interval)
            .with_events(events);
        if let Some(auth) = self.authenticator {
            gateway = gateway.with_authenticator(auth);
        }

        Ok(AimaApi {
            gateway: Arc::new(gateway),
            registry,
            bus,
            models,
            recipes,
            services,
            data_dir,
        })
    }

    fn load_assets(&self) -> EngineAssets {
        let Some(dir) = &self.engine_asset_dir else {
            return Arc::new(BTreeMap::new());
        };
        match load_engine_assets(dir) {
            Ok(assets) => {
                info!("Loaded {} engine assets from {}", assets.len(), dir.display());
                Arc::new(assets)
            }
            Err(e) => {
                warn!("Failed to load engine assets from {}: {}", dir.display(), e);
                Arc::new(BTreeMap::new())
            }
        }
    }
}

type Stores = (
    Arc<dyn ModelStore>,
    Arc<dyn RecipeStore>,
    Arc<dyn ServiceStore>,
);

fn open_stores(backend: StoreBackend, data_dir: &Path) -> Result<Stores> {
    if backend != StoreBackend::Memory {
        std::fs::create_dir_all(data_dir).map_err(|e| AimaError::io_with_path(e, data_dir))?;
    }

    Ok(match backend {
        StoreBackend::Memory => (
            Arc::new(MemoryModelStore::new()),
            Arc::new(MemoryRecipeStore::new()),
            Arc::new(MemoryServiceStore::new()),
        ),
        StoreBackend::File => (
            Arc::new(FileModelStore::open(data_dir)?),
            Arc::new(MemoryRecipeStore::new()),
            Arc::new(MemoryServiceStore::new()),
        ),
        StoreBackend::Sqlite => {
            let db = SqliteDatabase::open(&data_dir.join(AppConfig::DATABASE_FILE_NAME))?;
            (
                Arc::new(SqliteModelStore::new(db.clone())),
                Arc::new(SqliteRecipeStore::new(db.clone())),
                Arc::new(SqliteServiceStore::new(db)),
            )
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::Request;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_store_backend_parse() {
        assert_eq!("SQLite".parse::<StoreBackend>().unwrap(), StoreBackend::Sqlite);
        assert_eq!("file".parse::<StoreBackend>().unwrap(), StoreBackend::File);
        assert_eq!(
            "redis".parse::<StoreBackend>().unwrap_err().code(),
            "INVALID_INPUT"
        );
    }

    #[tokio::test]
    async fn test_build_registers_every_domain() {
        let api = AimaApiBuilder::new().with_ollama(false).build().await.unwrap();
        let registry = api.registry();

        for name in [
            "model.pull",
            "model.import",
            "model.verify",
            "model.search",
            "model.estimate_resources",
            "catalog.match",
            "catalog.validate_recipe",
            "catalog.apply_recipe",
            "service.create",
            "service.scale",
            "inference.chat",
            "inference.models",
        ] {
            assert!(registry.describe(name).is_some(), "{} not registered", name);
        }
        assert!(registry
            .get_resource("asms://model/anything")
            .unwrap()
            .is_some());
        api.shutdown().await;
    }

    #[tokio::test]
    async fn test_sqlite_backend_persists_across_builds() {
        let dir = TempDir::new().unwrap();
        let build = || {
            AimaApiBuilder::new()
                .data_dir(dir.path())
                .store_backend(StoreBackend::Sqlite)
                .with_ollama(false)
                .build()
        };

        let api = build().await.unwrap();
        let resp = api
            .handle(Some(Request::command(
                "catalog.create_recipe",
                json!({"name": "persisted"}),
            )))
            .await;
        assert!(resp.success, "{:?}", resp.error);
        let id = resp.data.unwrap()["recipe_id"].as_str().unwrap().to_string();
        api.shutdown().await;
        assert!(dir.path().join("aima.db").exists());

        let api = build().await.unwrap();
        let resp = api
            .handle(Some(Request::query("catalog.get", json!({"recipe_id": id}))))
            .await;
        assert!(resp.success);
        assert_eq!(resp.data.unwrap()["name"], "persisted");
        api.shutdown().await;
    }

    #[tokio::test]
    async fn test_missing_asset_dir_is_not_fatal() {
        let api = AimaApiBuilder::new()
            .with_ollama(false)
            .engine_asset_dir("/nonexistent/aima-assets")
            .build()
            .await
            .unwrap();
        let resp = api
            .handle(Some(Request::query("catalog.engines", json!({}))))
            .await;
        assert_eq!(resp.data.unwrap()["total"], 0);
        api.shutdown().await;
    }

    #[tokio::test]
    async fn test_api_token_enforced() {
        let api = AimaApiBuilder::new()
            .with_ollama(false)
            .api_token("secret")
            .build()
            .await
            .unwrap();
        let resp = api
            .handle(Some(Request::query("model.list", json!({}))))
            .await;
        assert_eq!(resp.error_code(), Some("UNAUTHORIZED"));

        let resp = api
            .handle(Some(
                Request::query("model.list", json!({})).with_credentials("secret"),
            ))
            .await;
        assert!(resp.success);
        api.shutdown().await;
    }
}
