//! AIMA RPC Server - HTTP front end for the unit gateway.
//!
//! Builds an [`AimaApi`] from command-line flags (each with an environment
//! fallback), serves it over HTTP and prints `RPC_PORT=<n>` on stdout once
//! the listener is bound so a parent process can discover the port.

mod handler;
mod server;

use aima_core::{AimaApi, CancellationToken, StoreBackend};
use anyhow::{Context, Result};
use clap::Parser;
use server::ServerOptions;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "aima-rpc", version)]
#[command(about = "HTTP gateway for the AIMA control plane")]
struct Args {
    /// Port to listen on (0 = auto-assign)
    #[arg(short, long, default_value = "0", env = "AIMA_PORT")]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1", env = "AIMA_HOST")]
    host: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    /// Data directory for the file and sqlite store backends
    #[arg(long, env = "AIMA_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Store backend: memory, file or sqlite
    #[arg(long, default_value = "memory", env = "AIMA_STORE")]
    store: String,

    /// HuggingFace token (falls back to HF_TOKEN and the CLI token file)
    #[arg(long, env = "AIMA_HF_TOKEN")]
    hf_token: Option<String>,

    /// HuggingFace endpoint
    #[arg(long, env = "AIMA_HF_ENDPOINT")]
    hf_endpoint: Option<String>,

    /// Directory pulled HuggingFace models are written to
    #[arg(long, env = "AIMA_DOWNLOAD_DIR")]
    download_dir: Option<PathBuf>,

    /// Ollama base URL
    #[arg(long, env = "AIMA_OLLAMA_URL")]
    ollama_url: Option<String>,

    /// Run without the Ollama provider
    #[arg(long)]
    no_ollama: bool,

    /// Directory of engine asset YAML files
    #[arg(long, env = "AIMA_ENGINE_ASSETS")]
    engine_assets: Option<PathBuf>,

    /// Bearer token required on every request
    #[arg(long, env = "AIMA_API_TOKEN")]
    api_token: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, default_value = "300", env = "AIMA_TIMEOUT_SECS")]
    timeout_secs: u64,

    /// Requests per second across all clients (0 = unlimited)
    #[arg(long, default_value = "0", env = "AIMA_RATE_LIMIT")]
    rate_limit: u32,

    /// Maximum requests handled at once
    #[arg(long, default_value = "256")]
    max_concurrency: usize,
}

fn init_logging(args: &Args) {
    let default_level = if args.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // stdout carries the RPC_PORT handshake; logs go to stderr.
    if args.log_json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args);

    info!("Starting AIMA RPC Server");

    let backend: StoreBackend = args.store.parse().context("invalid --store")?;
    let mut builder = AimaApi::builder()
        .store_backend(backend)
        .gateway_timeout(Duration::from_secs(args.timeout_secs))
        .with_ollama(!args.no_ollama);
    if let Some(dir) = &args.data_dir {
        builder = builder.data_dir(dir);
    }
    if let Some(token) = &args.hf_token {
        builder = builder.hf_token(token);
    }
    if let Some(url) = &args.hf_endpoint {
        builder = builder.hf_base_url(url);
    }
    if let Some(dir) = &args.download_dir {
        builder = builder.download_dir(dir);
    }
    if let Some(url) = &args.ollama_url {
        builder = builder.ollama_url(url);
    }
    if let Some(dir) = &args.engine_assets {
        builder = builder.engine_asset_dir(dir);
    }
    if let Some(token) = &args.api_token {
        builder = builder.api_token(token);
    }

    let api = Arc::new(builder.build().await.context("failed to build AIMA API")?);
    info!(
        "Registered {} units; data dir {}",
        api.registry().describe_all().len(),
        api.data_dir().display()
    );

    let shutdown = CancellationToken::new();
    let options = ServerOptions {
        host: args.host.clone(),
        port: args.port,
        rate_limit: args.rate_limit,
        max_concurrency: args.max_concurrency,
    };
    let (addr, server) = server::start_server(api.clone(), &options, shutdown.clone()).await?;

    // Port handshake for the parent process (intentional stdout)
    println!("RPC_PORT={}", addr.port());

    info!("RPC server running on {}", addr);

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, draining connections");
    shutdown.cancel();
    if let Err(e) = server.await {
        tracing::warn!("Server task ended abnormally: {}", e);
    }
    api.shutdown().await;

    Ok(())
}
