//! End-to-end scenarios driven through the gateway.
//!
//! HuggingFace and Ollama are replaced by in-process axum servers bound to
//! an ephemeral port; everything else is the real stack built by
//! `AimaApi::builder()`.

use aima_core::catalog::{HardwareProfile, Recipe};
use aima_core::events::{filters, Event, EventHandler};
use aima_core::{AimaApi, Request};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

const GGUF_BODY: &[u8] = b"GGUF-test-content!";

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

fn mock_ollama() -> Router {
    Router::new()
        .route(
            "/api/pull",
            post(|| async {
                [
                    r#"{"status":"pulling manifest"}"#,
                    r#"{"status":"downloading","digest":"sha256:aaa","total":4000,"completed":2000}"#,
                    r#"{"status":"downloading","digest":"sha256:aaa","total":4000,"completed":4000}"#,
                    r#"{"status":"success"}"#,
                ]
                .join("\n")
            }),
        )
        .route(
            "/api/tags",
            get(|| async {
                Json(json!({"models": [{
                    "name": "llama3:latest",
                    "size": 4000,
                    "details": {"parameter_size": "8B", "quantization_level": "Q4_0"}
                }]}))
            }),
        )
        .route(
            "/api/chat",
            post(|Json(body): Json<Value>| async move {
                Json(json!({
                    "model": body["model"],
                    "message": {"role": "assistant", "content": "AIMA manages AI infrastructure."},
                    "done_reason": "stop",
                    "prompt_eval_count": 12,
                    "eval_count": 6
                }))
            }),
        )
}

/// Hub serving one GGUF repository; `info_delay` holds the metadata call open.
fn mock_hub(repo: &'static str, info_delay: Duration) -> Router {
    Router::new()
        .route(
            &format!("/api/models/{}", repo),
            get(move || async move {
                tokio::time::sleep(info_delay).await;
                Json(json!({
                    "id": repo,
                    "pipeline_tag": "text-generation",
                    "siblings": [
                        {"rfilename": "config.json"},
                        {"rfilename": "model.gguf", "size": 100, "lfs": {"size": 100}}
                    ]
                }))
            }),
        )
        .route(
            &format!("/{}/resolve/main/model.gguf", repo),
            get(|| async { GGUF_BODY }),
        )
}

async fn hub_api(hub: Router, downloads: &TempDir) -> AimaApi {
    let base = serve(hub).await;
    AimaApi::builder()
        .hf_base_url(base)
        .download_dir(downloads.path())
        .with_ollama(false)
        .build()
        .await
        .unwrap()
}

fn data(resp: aima_core::Response) -> Value {
    assert!(resp.success, "request failed: {:?}", resp.error);
    resp.data.unwrap()
}

#[tokio::test]
async fn test_pull_and_infer() {
    let ollama = serve(mock_ollama()).await;
    let api = AimaApi::builder().ollama_url(ollama).build().await.unwrap();

    let pulled = data(
        api.handle(Some(Request::command(
            "model.pull",
            json!({"source": "ollama", "repo": "llama3", "tag": "latest"}),
        )))
        .await,
    );
    assert_eq!(pulled["status"], "ready");
    let model_id = pulled["model_id"].as_str().unwrap().to_string();
    assert!(model_id.starts_with("model-"));

    let model = data(
        api.handle(Some(Request::query("model.get", json!({"model_id": model_id}))))
            .await,
    );
    assert_eq!(model["status"], "ready");
    assert_eq!(model["path"], "ollama://llama3:latest");
    assert_eq!(model["size"], 4000);

    let created = data(
        api.handle(Some(Request::command(
            "service.create",
            json!({"model_id": model_id}),
        )))
        .await,
    );
    assert!(created["service_id"].as_str().unwrap().starts_with("svc-"));

    let reply = data(
        api.handle(Some(Request::command(
            "inference.chat",
            json!({"model": "llama3", "messages": [{"role": "user", "content": "What is AIMA?"}]}),
        )))
        .await,
    );
    assert_eq!(reply["content"], "AIMA manages AI infrastructure.");
    assert_eq!(reply["usage"]["total_tokens"], 18);

    api.shutdown().await;
}

#[tokio::test]
async fn test_service_lifecycle_through_gateway() {
    let api = AimaApi::builder().with_ollama(false).build().await.unwrap();
    let model = data(
        api.handle(Some(Request::command(
            "model.create",
            json!({"name": "whisper", "type": "asr", "format": "gguf"}),
        )))
        .await,
    );

    let created = data(
        api.handle(Some(Request::command(
            "service.create",
            json!({"model_id": model["model_id"], "resource_class": "small"}),
        )))
        .await,
    );
    let service_id = created["service_id"].as_str().unwrap().to_string();

    let started = data(
        api.handle(Some(Request::command(
            "service.start",
            json!({"service_id": service_id}),
        )))
        .await,
    );
    assert_eq!(started["success"], true);
    assert!(started["endpoint"].as_str().unwrap().starts_with("http://127.0.0.1:"));

    let again = api
        .handle(Some(Request::command(
            "service.start",
            json!({"service_id": service_id}),
        )))
        .await;
    assert_eq!(again.error_code(), Some("SERVICE_ALREADY_RUNNING"));

    let resource = data(
        api.handle(Some(Request::resource_get(format!(
            "asms://service/{}",
            service_id
        ))))
        .await,
    );
    assert_eq!(resource["status"], "running");

    data(
        api.handle(Some(Request::command(
            "service.delete",
            json!({"service_id": service_id}),
        )))
        .await,
    );
    let gone = api
        .handle(Some(Request::query("service.get", json!({"service_id": service_id}))))
        .await;
    assert_eq!(gone.error_code(), Some("SERVICE_NOT_FOUND"));

    api.shutdown().await;
}

#[tokio::test]
async fn test_huggingface_gguf_pull() {
    let downloads = TempDir::new().unwrap();
    let api = hub_api(mock_hub("test-org/test-model", Duration::ZERO), &downloads).await;

    let progress: Arc<Mutex<Vec<Event>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = progress.clone();
    let handler: EventHandler = Arc::new(move |e: &Event| {
        sink.lock().unwrap().push(e.clone());
        Ok(())
    });
    api.events()
        .subscribe(handler, Some(filters::by_type("model.pull_progress")))
        .unwrap();

    let pulled = data(
        api.handle(Some(Request::command(
            "model.pull",
            json!({"source": "huggingface", "repo": "test-org/test-model"}),
        )))
        .await,
    );
    let model = data(
        api.handle(Some(Request::query(
            "model.get",
            json!({"model_id": pulled["model_id"]}),
        )))
        .await,
    );
    assert_eq!(model["status"], "ready");
    assert_eq!(model["format"], "gguf");
    assert_eq!(model["size"], 18);
    assert_eq!(model["type"], "llm");

    let on_disk = downloads
        .path()
        .join("test-org_test-model")
        .join("model.gguf");
    assert_eq!(std::fs::read(&on_disk).unwrap(), GGUF_BODY);
    assert!(!downloads
        .path()
        .join("test-org_test-model")
        .join("config.json")
        .exists());

    let verified = data(
        api.handle(Some(Request::command(
            "model.verify",
            json!({"model_id": pulled["model_id"], "checksum": "size:18"}),
        )))
        .await,
    );
    assert_eq!(verified["valid"], true);

    api.shutdown().await;
    let events = progress.lock().unwrap();
    let last = events.last().unwrap();
    assert_eq!(last.payload["status"], "completed");
    assert_eq!(last.payload["progress"], 100.0);
}

#[tokio::test]
async fn test_catalog_match() {
    let api = AimaApi::builder().with_ollama(false).build().await.unwrap();
    let store = api.recipe_store();
    for (id, vendor, model, vram) in [
        ("r1", "NVIDIA", "RTX 4090", 24),
        ("r2", "AMD", "MI300", 192),
        ("r3", "NVIDIA", "RTX 3090", 12),
    ] {
        store
            .create(&Recipe {
                id: id.into(),
                name: id.into(),
                version: "1.0.0".into(),
                profile: HardwareProfile {
                    gpu_vendor: vendor.into(),
                    gpu_model: model.into(),
                    vram_min_gb: vram,
                    os: "linux".into(),
                    ..Default::default()
                },
                ..Default::default()
            })
            .await
            .unwrap();
    }

    let out = data(
        api.handle(Some(Request::query(
            "catalog.match",
            json!({"gpu_vendor": "NVIDIA", "gpu_model": "RTX 4090", "vram_gb": 24, "os": "linux"}),
        )))
        .await,
    );
    let recipes = out["recipes"].as_array().unwrap();
    assert_eq!(recipes[0]["recipe"]["id"], "r1");
    assert_eq!(recipes[0]["score"], 85);

    api.shutdown().await;
}

#[tokio::test]
async fn test_numeric_inputs_accept_json_floats() {
    let api = AimaApi::builder().with_ollama(false).build().await.unwrap();
    for i in 0..3 {
        api.recipe_store()
            .create(&Recipe {
                id: format!("r{}", i),
                name: format!("r{}", i),
                version: "1.0.0".into(),
                profile: HardwareProfile {
                    gpu_vendor: "NVIDIA".into(),
                    vram_min_gb: 24,
                    ..Default::default()
                },
                ..Default::default()
            })
            .await
            .unwrap();
    }

    let out = data(
        api.handle(Some(Request::query(
            "catalog.match",
            json!({"gpu_vendor": "NVIDIA", "vram_gb": 24.0, "limit": 2.0}),
        )))
        .await,
    );
    assert_eq!(out["recipes"].as_array().unwrap().len(), 2);

    // Oversized limits are clamped rather than rejected.
    let out = data(
        api.handle(Some(Request::query(
            "catalog.match",
            json!({"gpu_vendor": "NVIDIA", "limit": 100}),
        )))
        .await,
    );
    assert_eq!(out["recipes"].as_array().unwrap().len(), 3);

    let out = data(
        api.handle(Some(Request::query(
            "model.list",
            json!({"limit": 10.0, "offset": 0.0}),
        )))
        .await,
    );
    assert_eq!(out["total"], 0);

    api.shutdown().await;
}

#[tokio::test]
async fn test_duplicate_pull_guard() {
    let downloads = TempDir::new().unwrap();
    let api = hub_api(mock_hub("org/x", Duration::from_millis(300)), &downloads).await;
    let pull = || {
        api.handle(Some(Request::command(
            "model.pull",
            json!({"source": "huggingface", "repo": "org/x"}),
        )))
    };

    let (a, b) = tokio::join!(pull(), pull());
    let codes: Vec<Option<&str>> = vec![a.error_code(), b.error_code()];
    assert_eq!(codes.iter().filter(|c| c.is_none()).count(), 1);
    assert!(codes.contains(&Some("PULL_IN_PROGRESS")));

    // The guard is released once the winner finishes.
    let third = pull().await;
    assert!(third.success, "{:?}", third.error);

    api.shutdown().await;
}

#[tokio::test]
async fn test_invalid_envelopes() {
    let api = AimaApi::builder().with_ollama(false).build().await.unwrap();

    let resp = api.handle(None).await;
    assert!(!resp.success);
    assert_eq!(resp.error_code(), Some("INVALID_REQUEST"));

    let resp = api
        .handle(Some(Request {
            request_type: String::new(),
            unit: "model.list".into(),
            ..Default::default()
        }))
        .await;
    assert_eq!(resp.error_code(), Some("INVALID_REQUEST"));

    let resp = api
        .handle(Some(Request::query("does.not.exist", json!({}))))
        .await;
    assert_eq!(resp.error_code(), Some("UNIT_NOT_FOUND"));

    api.shutdown().await;
}

#[tokio::test]
async fn test_validate_recipe_reports_missing_name() {
    let api = AimaApi::builder().with_ollama(false).build().await.unwrap();

    let out = data(
        api.handle(Some(Request::command(
            "catalog.validate_recipe",
            json!({"recipe": {
                "profile": {"gpu_vendor": "NVIDIA"},
                "engine": {"type": "vllm", "image": "v:l"}
            }}),
        )))
        .await,
    );
    assert_eq!(out["valid"], false);
    assert_eq!(out["issues"], json!(["name is required"]));

    api.shutdown().await;
}
