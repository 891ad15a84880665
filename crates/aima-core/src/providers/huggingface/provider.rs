//! [`ModelProvider`] backed by the HuggingFace Hub, plus local import.

use super::client::HuggingFaceClient;
use super::mapping::{detect_model_type, estimate_requirements, pipeline_tag_for, select_files};
use super::types::Sibling;
use crate::cancel::CancellationToken;
use crate::config::{HuggingFaceConfig, ListConfig};
use crate::error::{AimaError, Result};
use crate::hashing::{compute_sha256_async, path_size};
use crate::model::{
    Model, ModelFormat, ModelProvider, ModelRequirements, ModelSearchResult, ModelStatus,
    ModelType, ProgressReporter, PullProgress, PullRequest, VerificationResult,
};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use mini_moka::sync::Cache;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub const SOURCE: &str = "huggingface";

/// Sources this provider accepts for pulls.
pub fn is_huggingface_source(source: &str) -> bool {
    matches!(source, "" | "huggingface" | "hf")
}

/// Models this provider produced, for later verify/estimate calls.
#[derive(Default)]
struct ModelCache {
    /// Pulled models keyed by repository.
    by_repo: HashMap<String, Model>,
    /// Imported models keyed by id.
    imported: HashMap<String, Model>,
}

impl ModelCache {
    fn remove(&mut self, model_id: &str) {
        self.by_repo.retain(|_, m| m.id != model_id);
        self.imported.remove(model_id);
    }

    fn find(&self, model_id: &str) -> Option<(Option<String>, Model)> {
        if let Some((repo, model)) = self.by_repo.iter().find(|(_, m)| m.id == model_id) {
            return Some((Some(repo.clone()), model.clone()));
        }
        self.imported.get(model_id).map(|m| (None, m.clone()))
    }
}

/// HuggingFace pull pipeline, search, verification and local import.
pub struct HuggingFaceProvider {
    client: HuggingFaceClient,
    download_dir: PathBuf,
    cache: RwLock<ModelCache>,
    search_cache: Cache<String, Vec<ModelSearchResult>>,
}

impl HuggingFaceProvider {
    pub fn new(client: HuggingFaceClient) -> Self {
        Self {
            client,
            download_dir: PathBuf::from(HuggingFaceConfig::DEFAULT_DOWNLOAD_DIR),
            cache: RwLock::new(ModelCache::default()),
            search_cache: Cache::builder()
                .max_capacity(HuggingFaceConfig::SEARCH_CACHE_CAPACITY)
                .time_to_live(HuggingFaceConfig::SEARCH_CACHE_TTL)
                .build(),
        }
    }

    pub fn with_download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = dir.into();
        self
    }

    pub fn client(&self) -> &HuggingFaceClient {
        &self.client
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Whether `model_id` was pulled or imported by this provider.
    pub async fn knows(&self, model_id: &str) -> bool {
        self.cache.read().await.find(model_id).is_some()
    }

    async fn download_one(
        &self,
        ctx: &DownloadContext<'_>,
        file: &Sibling,
        dest: &Path,
        offset: u64,
    ) -> Result<u64> {
        let response = self
            .client
            .download_file(ctx.repo, &file.rfilename, ctx.revision)
            .await?;

        let mut out = tokio::fs::File::create(dest)
            .await
            .map_err(|e| AimaError::io_with_path(e, dest))?;
        let mut stream = response.bytes_stream();
        let status = format!("downloading {}", file.rfilename);
        let start_time = Instant::now();
        let mut written: u64 = 0;

        loop {
            let next = tokio::select! {
                _ = ctx.cancel.cancelled() => return Err(AimaError::Cancelled),
                next = stream.next() => next,
            };
            let Some(chunk) = next else { break };
            let chunk: Bytes = chunk.map_err(|e| AimaError::Network {
                message: format!("Download stream error: {}", e),
                status: None,
            })?;

            out.write_all(&chunk)
                .await
                .map_err(|e| AimaError::io_with_path(e, dest))?;
            written += chunk.len() as u64;

            let elapsed = start_time.elapsed().as_secs_f64();
            let speed = if elapsed > 0.0 {
                written as f64 / elapsed
            } else {
                0.0
            };
            ctx.progress.update(PullProgress {
                model_id: ctx.model_id.to_string(),
                status: status.clone(),
                progress: percent(offset + written, ctx.total_size),
                bytes_total: ctx.total_size,
                bytes_done: offset + written,
                speed,
                error: None,
            });
        }

        out.flush()
            .await
            .map_err(|e| AimaError::io_with_path(e, dest))?;
        Ok(written)
    }

    async fn verify_checksum(path: &Path, checksum: &str) -> Result<bool> {
        if let Some(expected) = checksum.strip_prefix("size:") {
            let expected: u64 = expected.trim().parse().map_err(|_| {
                AimaError::invalid_input("model", format!("invalid size checksum: {}", checksum))
            })?;
            return Ok(path_size(path)? == expected);
        }
        // Weak verifier: the hub only gives us a parameter total here.
        if checksum.starts_with("safetensors:") {
            return Ok(true);
        }
        if let Some(expected) = checksum.strip_prefix("sha256:") {
            let actual = compute_sha256_async(path).await?;
            return Ok(actual == expected.to_lowercase());
        }
        Ok(true)
    }
}

/// Per-pull state shared by the file loop.
struct DownloadContext<'a> {
    repo: &'a str,
    revision: &'a str,
    model_id: &'a str,
    total_size: u64,
    progress: &'a ProgressReporter,
    cancel: &'a CancellationToken,
}

fn percent(done: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        (done as f64 / total as f64 * 100.0).min(100.0)
    }
}

fn create_download_dir(dir: &Path) -> Result<()> {
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o755);
    }
    builder
        .create(dir)
        .map_err(|e| AimaError::io_with_path(e, dir))
}

fn file_basename(filename: &str) -> &str {
    filename.rsplit('/').next().unwrap_or(filename)
}

#[async_trait]
impl ModelProvider for HuggingFaceProvider {
    async fn pull(
        &self,
        request: &PullRequest,
        progress: ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<Model> {
        if !is_huggingface_source(&request.source) {
            return Err(AimaError::invalid_input(
                "model",
                format!("unsupported source: {}", request.source),
            ));
        }
        let repo = request.repo.as_str();
        let revision = if request.tag.is_empty() {
            "main"
        } else {
            request.tag.as_str()
        };

        let cached = self.cache.read().await.by_repo.get(repo).cloned();
        if let Some(model) = cached {
            if !model.path.is_empty() && Path::new(&model.path).exists() {
                debug!("Returning cached pull of {} ({})", repo, model.id);
                progress.finish(PullProgress::completed(&model.id)).await;
                return Ok(model);
            }
        }

        cancel.check()?;
        let info = self
            .client
            .get_model_info(repo)
            .await
            .map_err(|e| e.context(format!("get model info for {}", repo)))?;

        let name = if info.model_id.is_empty() {
            repo.to_string()
        } else {
            info.model_id.clone()
        };
        let mut model = Model::new(name, detect_model_type(&info), ModelFormat::Safetensors);
        model.source = SOURCE.to_string();
        model.status = ModelStatus::Pulling;

        let selection = select_files(&info.siblings);
        if selection.files.is_empty() {
            return Err(AimaError::PullFailed {
                repo: repo.to_string(),
                message: "no downloadable model files found in repository".to_string(),
            });
        }

        let download_dir = self.download_dir.join(repo.replace('/', "_"));
        create_download_dir(&download_dir)?;
        info!(
            "Pulling {} files ({} bytes) from {}@{} into {}",
            selection.files.len(),
            selection.total_size,
            repo,
            revision,
            download_dir.display()
        );

        let ctx = DownloadContext {
            repo,
            revision,
            model_id: &model.id,
            total_size: selection.total_size,
            progress: &progress,
            cancel,
        };
        let mut downloaded: u64 = 0;

        for file in &selection.files {
            progress.update(PullProgress {
                model_id: model.id.clone(),
                status: format!("downloading {}", file.rfilename),
                progress: percent(downloaded, selection.total_size),
                bytes_total: selection.total_size,
                bytes_done: downloaded,
                ..Default::default()
            });

            let dest = download_dir.join(file_basename(&file.rfilename));
            match self.download_one(&ctx, file, &dest, downloaded).await {
                Ok(written) => downloaded += written,
                Err(e) => {
                    // Failed pulls are never persisted, so the record is simply dropped.
                    warn!("Pull of {} failed on {}: {}", repo, file.rfilename, e);
                    progress
                        .finish(PullProgress::failed(&model.id, e.to_string()))
                        .await;
                    return Err(e.context(format!("download file {}", file.rfilename)));
                }
            }
        }

        model.format = selection
            .files
            .first()
            .and_then(|f| ModelFormat::from_filename(&f.rfilename))
            .unwrap_or(ModelFormat::Safetensors);
        model.path = download_dir.display().to_string();
        model.size = downloaded;
        model.status = ModelStatus::Ready;
        model.checksum = info.safetensors_total().map(|t| format!("safetensors:{}", t));
        model.touch();

        self.cache
            .write()
            .await
            .by_repo
            .insert(repo.to_string(), model.clone());
        progress.finish(PullProgress::completed(&model.id)).await;
        info!("Pulled {} ({} bytes) as {}", repo, downloaded, model.id);

        Ok(model)
    }

    async fn search(
        &self,
        query: &str,
        _source: &str,
        model_type: Option<ModelType>,
        limit: usize,
    ) -> Result<Vec<ModelSearchResult>> {
        let limit = if limit == 0 {
            ListConfig::SEARCH_DEFAULT_LIMIT
        } else {
            limit
        };
        let cache_key = format!(
            "{}|{}|{}",
            query,
            model_type.map(|t| t.as_str()).unwrap_or_default(),
            limit
        );
        if let Some(hit) = self.search_cache.get(&cache_key) {
            debug!("Cache hit for search '{}'", query);
            return Ok(hit);
        }

        let filters: Vec<(String, String)> = model_type
            .map(|t| vec![("task".to_string(), pipeline_tag_for(t).to_string())])
            .unwrap_or_default();
        let items = self
            .client
            .search_models(query, &filters, limit, 0)
            .await
            .map_err(|e| e.context("search models"))?;

        let results: Vec<ModelSearchResult> = items
            .into_iter()
            .filter_map(|item| {
                let detected = detect_model_type(&item);
                if model_type.is_some_and(|t| t != detected) {
                    return None;
                }
                Some(ModelSearchResult {
                    id: item.model_id.clone(),
                    name: item.model_id.clone(),
                    model_type: detected,
                    source: SOURCE.to_string(),
                    description: item.description(),
                    downloads: item.downloads,
                    tags: item.tags,
                })
            })
            .collect();

        self.search_cache.insert(cache_key, results.clone());
        Ok(results)
    }

    async fn import_local(&self, path: &Path, auto_detect: bool) -> Result<Model> {
        let path_str = path.display().to_string();
        let metadata = std::fs::metadata(path).map_err(|_| AimaError::ImportFailed {
            path: path_str.clone(),
            message: "path does not exist".to_string(),
        })?;
        let basename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path_str.clone());

        let mut name: Option<String> = None;
        let mut format: Option<ModelFormat> = None;

        if auto_detect {
            if metadata.is_dir() {
                // Sorted scan; the last matching file wins.
                for entry in WalkDir::new(path)
                    .min_depth(1)
                    .max_depth(1)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_type().is_file())
                {
                    let file_name = entry.file_name().to_string_lossy().into_owned();
                    for (ext, fmt) in [
                        (".safetensors", ModelFormat::Safetensors),
                        (".gguf", ModelFormat::Gguf),
                        (".onnx", ModelFormat::Onnx),
                    ] {
                        if let Some(stem) = file_name.strip_suffix(ext) {
                            name = Some(stem.to_string());
                            format = Some(fmt);
                        }
                    }
                }
            } else {
                name = Some(
                    path.file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_else(|| basename.clone()),
                );
                format = ModelFormat::from_filename(&basename);
            }
        }

        let mut model = Model::new(
            name.unwrap_or(basename),
            ModelType::Llm,
            format.unwrap_or(ModelFormat::Safetensors),
        );
        model.status = ModelStatus::Ready;
        model.source = "local".to_string();
        model.path = path_str;
        model.size = path_size(path)?;

        self.cache
            .write()
            .await
            .imported
            .insert(model.id.clone(), model.clone());
        debug!("Imported {} as {} ({})", model.path, model.id, model.format);
        Ok(model)
    }

    async fn verify(&self, model_id: &str, checksum: Option<&str>) -> Result<VerificationResult> {
        let Some((repo, model)) = self.cache.read().await.find(model_id) else {
            return Ok(VerificationResult::invalid(format!(
                "model not found: {}",
                model_id
            )));
        };

        if model.path.is_empty() {
            return Ok(VerificationResult::invalid("model has no local path"));
        }
        let path = PathBuf::from(&model.path);
        if !path.exists() {
            return Ok(VerificationResult::invalid(format!(
                "model path does not exist: {}",
                model.path
            )));
        }

        let mut issues = Vec::new();
        if let Some(checksum) = checksum.filter(|c| !c.is_empty()) {
            match Self::verify_checksum(&path, checksum).await {
                Ok(true) => {}
                Ok(false) => issues.push("checksum mismatch".to_string()),
                Err(e) => issues.push(format!("checksum verification failed: {}", e)),
            }
        }

        if let Some(repo) = repo {
            if let Err(e) = self.client.get_model_info(&repo).await {
                debug!("Repository {} not accessible: {}", repo, e);
                issues.push("repository not accessible on HuggingFace Hub".to_string());
            }
        }

        Ok(VerificationResult::from_issues(issues))
    }

    async fn estimate_resources(&self, model_id: &str) -> Result<ModelRequirements> {
        let (repo, model) =
            self.cache
                .read()
                .await
                .find(model_id)
                .ok_or_else(|| AimaError::ModelNotFound {
                    model_id: model_id.to_string(),
                })?;

        match repo {
            Some(repo) => {
                let info = self
                    .client
                    .get_model_info(&repo)
                    .await
                    .map_err(|e| e.context("get model info"))?;
                Ok(estimate_requirements(&info))
            }
            None => {
                let size = model.size;
                let memory_min = (size as f64 * 1.2) as u64;
                Ok(ModelRequirements {
                    memory_min,
                    memory_recommended: (size as f64 * 1.5) as u64,
                    gpu_memory: memory_min,
                    total_bytes: Some(size),
                    ..Default::default()
                })
            }
        }
    }

    async fn forget(&self, model_id: &str) {
        self.cache.write().await.remove(model_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    const GGUF_BODY: &[u8] = b"GGUF-test-content!";
    const SLOW_CHUNK: usize = 64;
    const SLOW_CHUNKS: usize = 10;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn hub_router(info_hits: Arc<AtomicUsize>) -> Router {
        Router::new()
            .route(
                "/api/models/test-org/test-model",
                get(move || {
                    let hits = info_hits.clone();
                    async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        Json(json!({
                            "_id": "abc",
                            "id": "test-org/test-model",
                            "pipeline_tag": "text-generation",
                            "siblings": [
                                {"rfilename": "config.json"},
                                {"rfilename": "model.gguf", "lfs": {"sha256": "00", "size": 100}}
                            ],
                            "safetensors": {"total": 8000}
                        }))
                    }
                }),
            )
            .route(
                "/test-org/test-model/resolve/main/model.gguf",
                get(|| async { GGUF_BODY.to_vec() }),
            )
            .route(
                "/api/models/test-org/no-weights",
                get(|| async { Json(json!({"id": "test-org/no-weights", "siblings": [{"rfilename": "README.md"}]})) }),
            )
            .route(
                "/api/models/test-org/broken",
                get(|| async {
                    Json(json!({"id": "test-org/broken", "siblings": [{"rfilename": "model.safetensors"}]}))
                }),
            )
            .route(
                "/test-org/broken/resolve/main/model.safetensors",
                get(|| async { (StatusCode::FORBIDDEN, Json(json!({"error": "gated repo"}))) }),
            )
            .route(
                "/api/models/test-org/slow",
                get(|| async {
                    Json(json!({
                        "id": "test-org/slow",
                        "siblings": [
                            {"rfilename": "model.gguf", "lfs": {"size": SLOW_CHUNK * SLOW_CHUNKS}}
                        ]
                    }))
                }),
            )
            .route(
                "/test-org/slow/resolve/main/model.gguf",
                get(|| async {
                    let chunks = futures::stream::iter(0..SLOW_CHUNKS).then(|i| async move {
                        if i > 0 {
                            tokio::time::sleep(Duration::from_millis(200)).await;
                        }
                        Ok::<_, std::io::Error>(Bytes::from(vec![b'x'; SLOW_CHUNK]))
                    });
                    Body::from_stream(chunks)
                }),
            )
    }

    async fn provider(dir: &TempDir) -> (HuggingFaceProvider, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let base = serve(hub_router(hits.clone())).await;
        let client = HuggingFaceClient::new(base, None).unwrap();
        (
            HuggingFaceProvider::new(client).with_download_dir(dir.path()),
            hits,
        )
    }

    async fn pull_collecting(
        provider: &HuggingFaceProvider,
        repo: &str,
    ) -> (Result<Model>, Vec<PullProgress>) {
        let (tx, mut rx) = mpsc::channel(64);
        let result = provider
            .pull(
                &PullRequest::new("huggingface", repo, ""),
                ProgressReporter::new(tx),
                &CancellationToken::new(),
            )
            .await;
        let mut records = Vec::new();
        while let Some(p) = rx.recv().await {
            records.push(p);
        }
        (result, records)
    }

    #[tokio::test]
    async fn test_pull_gguf_repository() {
        let dir = TempDir::new().unwrap();
        let (provider, _) = provider(&dir).await;

        let (result, records) = pull_collecting(&provider, "test-org/test-model").await;
        let model = result.unwrap();

        assert_eq!(model.status, ModelStatus::Ready);
        assert_eq!(model.format, ModelFormat::Gguf);
        assert_eq!(model.size, 18);
        assert_eq!(model.model_type, ModelType::Llm);
        assert_eq!(model.name, "test-org/test-model");
        assert_eq!(model.source, "huggingface");
        assert_eq!(model.checksum.as_deref(), Some("safetensors:8000"));
        let file = dir.path().join("test-org_test-model").join("model.gguf");
        assert_eq!(std::fs::read(file).unwrap(), GGUF_BODY);
        assert!(!dir.path().join("test-org_test-model").join("config.json").exists());

        let last = records.last().unwrap();
        assert_eq!(last.status, "completed");
        assert_eq!(last.progress, 100.0);
        let done: Vec<u64> = records.iter().filter(|p| !p.is_terminal()).map(|p| p.bytes_done).collect();
        assert!(done.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn test_second_pull_returns_cached_model() {
        let dir = TempDir::new().unwrap();
        let (provider, hits) = provider(&dir).await;

        let (first, _) = pull_collecting(&provider, "test-org/test-model").await;
        let (second, records) = pull_collecting(&provider, "test-org/test-model").await;
        let (first, second) = (first.unwrap(), second.unwrap());

        assert_eq!(first.id, second.id);
        assert_eq!(first.path, second.path);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, "completed");
    }

    #[tokio::test]
    async fn test_pull_rejects_foreign_source() {
        let dir = TempDir::new().unwrap();
        let (provider, _) = provider(&dir).await;
        let err = provider
            .pull(
                &PullRequest::new("modelscope", "org/x", ""),
                ProgressReporter::disabled(),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT");
    }

    #[tokio::test]
    async fn test_pull_without_files_fails() {
        let dir = TempDir::new().unwrap();
        let (provider, _) = provider(&dir).await;
        let (result, _) = pull_collecting(&provider, "test-org/no-weights").await;
        let err = result.unwrap_err();
        assert_eq!(err.code(), "MODEL_PULL_FAILED");
        assert!(err.to_string().contains("no downloadable model files found"));
    }

    #[tokio::test]
    async fn test_download_error_emits_terminal_error() {
        let dir = TempDir::new().unwrap();
        let (provider, _) = provider(&dir).await;
        let (result, records) = pull_collecting(&provider, "test-org/broken").await;

        let err = result.unwrap_err();
        assert_eq!(err.code(), "NETWORK_ERROR");
        assert!(err.to_string().contains("gated repo"));
        let last = records.last().unwrap();
        assert_eq!(last.status, "error");
        assert!(last.error.as_deref().unwrap().contains("gated repo"));
    }

    #[tokio::test]
    async fn test_pull_cancelled_before_start() {
        let dir = TempDir::new().unwrap();
        let (provider, _) = provider(&dir).await;
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = provider
            .pull(
                &PullRequest::new("hf", "test-org/test-model", ""),
                ProgressReporter::disabled(),
                &cancel,
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "CANCELLED");
    }

    #[tokio::test]
    async fn test_cancel_mid_download_stops_writing() {
        let dir = TempDir::new().unwrap();
        let (provider, _) = provider(&dir).await;
        let cancel = CancellationToken::new();
        let (tx, mut rx) = mpsc::channel(64);

        let request = PullRequest::new("huggingface", "test-org/slow", "");
        let pull = provider.pull(
            &request,
            ProgressReporter::new(tx),
            &cancel,
        );
        let collect = async {
            let mut records = Vec::new();
            while let Some(p) = rx.recv().await {
                if p.bytes_done > 0 {
                    cancel.cancel();
                }
                records.push(p);
            }
            records
        };
        let (result, records) = tokio::join!(pull, collect);

        assert_eq!(result.unwrap_err().code(), "CANCELLED");
        let last = records.last().unwrap();
        assert_eq!(last.status, "error");
        assert!(last.is_terminal());
        assert!(provider.cache.read().await.by_repo.get("test-org/slow").is_none());

        let written = std::fs::metadata(dir.path().join("test-org_slow").join("model.gguf"))
            .unwrap()
            .len();
        assert!(written < (SLOW_CHUNK * SLOW_CHUNKS) as u64);
    }

    #[tokio::test]
    async fn test_verify_and_estimate_pulled_model() {
        let dir = TempDir::new().unwrap();
        let (provider, _) = provider(&dir).await;
        let (model, _) = pull_collecting(&provider, "test-org/test-model").await;
        let model = model.unwrap();

        let ok = provider.verify(&model.id, Some("safetensors:1")).await.unwrap();
        assert!(ok.valid);
        let size = provider.verify(&model.id, Some("size:18")).await.unwrap();
        assert!(size.valid);
        let wrong = provider.verify(&model.id, Some("size:3")).await.unwrap();
        assert_eq!(wrong.issues, vec!["checksum mismatch"]);
        let dir_hash = provider.verify(&model.id, Some("sha256:00")).await.unwrap();
        assert!(dir_hash.issues[0].starts_with("checksum verification failed:"));

        let unknown = provider.verify("model-00000000", None).await.unwrap();
        assert_eq!(unknown.issues, vec!["model not found: model-00000000"]);

        let req = provider.estimate_resources(&model.id).await.unwrap();
        assert_eq!(req.memory_min, 120);
        assert_eq!(req.memory_recommended, 150);
        assert_eq!(req.total_params, Some(8000));
        assert_eq!(
            provider.estimate_resources("model-00000000").await.unwrap_err().code(),
            "MODEL_NOT_FOUND"
        );
    }

    #[tokio::test]
    async fn test_import_directory_last_match_wins() {
        let dir = TempDir::new().unwrap();
        let (provider, _) = provider(&dir).await;
        let model_dir = dir.path().join("local-model");
        std::fs::create_dir(&model_dir).unwrap();
        std::fs::write(model_dir.join("a-weights.gguf"), b"1234").unwrap();
        std::fs::write(model_dir.join("b-weights.onnx"), b"12").unwrap();
        std::fs::write(model_dir.join("config.json"), b"{}").unwrap();

        let model = provider.import_local(&model_dir, true).await.unwrap();
        assert_eq!(model.name, "b-weights");
        assert_eq!(model.format, ModelFormat::Onnx);
        assert_eq!(model.status, ModelStatus::Ready);
        assert_eq!(model.source, "local");
        assert_eq!(model.size, 8);
        assert!(provider.knows(&model.id).await);

        provider.forget(&model.id).await;
        assert!(!provider.knows(&model.id).await);
    }

    #[tokio::test]
    async fn test_import_file_and_missing_path() {
        let dir = TempDir::new().unwrap();
        let (provider, _) = provider(&dir).await;
        let file = dir.path().join("tiny.gguf");
        std::fs::write(&file, b"abc").unwrap();

        let model = provider.import_local(&file, true).await.unwrap();
        assert_eq!(model.name, "tiny");
        assert_eq!(model.format, ModelFormat::Gguf);

        let hash = crate::hashing::compute_sha256(&file).unwrap();
        let verified = provider
            .verify(&model.id, Some(&format!("sha256:{}", hash)))
            .await
            .unwrap();
        assert!(verified.valid);

        let err = provider
            .import_local(&dir.path().join("missing"), true)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "MODEL_IMPORT_FAILED");
    }

    #[tokio::test]
    async fn test_search_maps_and_caches() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let router = Router::new().route(
            "/api/models",
            get(move || {
                let hits = counter.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    Json(json!([
                        {"id": "org/chat", "pipeline_tag": "text-generation", "downloads": 7,
                         "cardData": {"description": "chat model"}},
                        {"id": "org/whisper", "pipeline_tag": "automatic-speech-recognition"}
                    ]))
                }
            }),
        );
        let base = serve(router).await;
        let provider = HuggingFaceProvider::new(HuggingFaceClient::new(base, None).unwrap());

        let results = provider.search("chat", "", Some(ModelType::Llm), 5).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "org/chat");
        assert_eq!(results[0].description, "chat model");
        assert_eq!(results[0].downloads, 7);

        provider.search("chat", "", Some(ModelType::Llm), 5).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
