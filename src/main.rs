use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gline_service::{
    AppConfig, EntityMode, McpServer, ModelRegistry, Transport, build_router,
};

/// Serves GLiNER entity extraction over MCP (stdio) or HTTP.
#[derive(Debug, Parser)]
#[command(name = "gline-mcp", version)]
struct Cli {
    /// Hugging Face model ID
    #[arg(long)]
    model: Option<String>,

    /// Inference mode: span or token
    #[arg(long)]
    mode: Option<EntityMode>,

    /// Transport: stdio or http
    #[arg(long)]
    transport: Option<Transport>,

    /// Directory for downloaded model files
    #[arg(long)]
    cache_dir: Option<PathBuf>,
}

impl Cli {
    /// The flag value standing in for environment variable `key`.
    fn value_for(&self, key: &str) -> Option<String> {
        match key {
            "GLINE_MODEL_ID" => self.model.clone(),
            "GLINE_MODE" => self.mode.map(|mode| mode.as_str().to_string()),
            "GLINE_TRANSPORT" => self.transport.map(|t| t.as_str().to_string()),
            "GLINE_CACHE_DIR" => self
                .cache_dir
                .as_ref()
                .map(|dir| dir.to_string_lossy().into_owned()),
            _ => None,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = Arc::new(AppConfig::from_env_with(|key| cli.value_for(key))?);
    tracing::info!(model = %config.model_id, mode = ?config.mode, "loading model");

    let init = config.clone();
    let registry = tokio::task::spawn_blocking(move || ModelRegistry::initialize(&init))
        .await?
        .map_err(|err| anyhow::anyhow!("failed to load model {}: {err}", config.model_id))?;
    let registry = Arc::new(registry);
    tracing::info!("model loaded");

    let served = match config.transport {
        Transport::Stdio => Arc::new(McpServer::new(registry.clone())).run_stdio().await,
        Transport::Http => serve_http(config.clone(), registry.clone()).await,
    };

    registry.shutdown();
    served
}

async fn serve_http(config: Arc<AppConfig>, registry: Arc<ModelRegistry>) -> anyhow::Result<()> {
    let router = build_router(config.clone(), registry);
    let listener = TcpListener::bind(config.listen_addr).await?;
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "HTTP server ready");

    axum::serve(listener, router).await?;
    Ok(())
}

fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,hyper=warn,hf_hub=warn".into());
    // stdout carries the MCP stream.
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
