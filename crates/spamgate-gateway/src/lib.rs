//! spamgate-gateway — the gateway's HTTP surface.
//!
//! Orchestrates each prediction request (validate → invoke backend →
//! update metrics → respond) and serves the operational endpoints.
//!
//! # Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/` | Service descriptor |
//! | GET | `/health` | Composite gateway + backend health |
//! | POST | `/predict` | Classify a text as spam or ham |
//! | GET | `/metrics` | Prometheus exposition |

pub mod handlers;
pub mod health;

use std::sync::{Arc, Mutex};

use axum::Router;
use axum::routing::{get, post};
use spamgate_backend::BackendClient;
use spamgate_metrics::{MetricsRegistry, ResourceSampler};

/// Shared state for all handlers. The registry is the only mutable
/// shared resource; handlers themselves are stateless.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<MetricsRegistry>,
    pub backend: Arc<BackendClient>,
    /// Displayed in `/health` responses.
    pub backend_url: String,
    pub sampler: Arc<Mutex<Box<dyn ResourceSampler>>>,
}

/// Build the complete gateway router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::home))
        .route("/health", get(handlers::health))
        .route("/predict", post(handlers::predict))
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
}
