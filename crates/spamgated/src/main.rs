//! spamgated — the spam-detection inference gateway daemon.
//!
//! Single binary that assembles the gateway subsystems:
//! - Metrics registry + system resource sampler
//! - Backend client for the model-serving endpoint
//! - HTTP surface (`/`, `/health`, `/predict`, `/metrics`)
//!
//! # Usage
//!
//! ```text
//! spamgated --port 8000 --backend-url http://localhost:5001
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use clap::Parser;
use tracing::{info, warn};

use spamgate_backend::BackendClient;
use spamgate_gateway::AppState;
use spamgate_metrics::{MetricsRegistry, SystemSampler};

#[derive(Parser)]
#[command(name = "spamgated", about = "Spam-detection inference gateway")]
struct Cli {
    /// Port to listen on.
    #[arg(long, default_value = "8000")]
    port: u16,

    /// Base URL of the model-serving backend.
    #[arg(long, env = "SERVING_URL", default_value = "http://localhost:5001")]
    backend_url: String,

    /// Model accuracy from the training run, exported as a gauge.
    #[arg(long, default_value = "0.9631")]
    model_accuracy: f64,

    /// Mount path whose utilization feeds the disk gauge.
    #[arg(long, default_value = "/")]
    disk_path: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,spamgated=debug,spamgate=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    info!(backend_url = %cli.backend_url, "spamgate daemon starting");

    // ── Initialize subsystems ──────────────────────────────────

    let registry = Arc::new(MetricsRegistry::new(cli.model_accuracy));
    info!(model_accuracy = cli.model_accuracy, "metrics registry initialized");

    let sampler: Box<dyn spamgate_metrics::ResourceSampler> =
        Box::new(SystemSampler::new(cli.disk_path));

    let backend = Arc::new(BackendClient::new(&cli.backend_url)?);

    // Startup probe is informational only; the backend is re-checked on
    // every /health call.
    if backend.check_health().await {
        info!("serving endpoint is healthy and ready");
    } else {
        warn!(backend_url = %cli.backend_url, "serving endpoint is not reporting healthy");
    }

    // ── Start HTTP server ──────────────────────────────────────

    let router = spamgate_gateway::build_router(AppState {
        registry,
        backend,
        backend_url: cli.backend_url,
        sampler: Arc::new(Mutex::new(sampler)),
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    info!(%addr, "gateway listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C.
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to install CTRL+C handler");
            info!("shutdown signal received");
        })
        .await?;

    info!("spamgate daemon stopped");
    Ok(())
}
