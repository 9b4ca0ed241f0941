//! Gateway HTTP handlers.
//!
//! `/predict` is the orchestration core: it validates input, invokes the
//! backend, and drives every metrics update for the request. The metric
//! sequence within one request is fixed (validate → invoke → latency →
//! result counter → derived rates → response time) so a request never
//! contributes both a success and an error signal.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures_util::FutureExt;
use serde_json::{Value, json};
use tracing::warn;

use spamgate_backend::Label;
use spamgate_metrics::{MetricsRegistry, PredictionLabel};

use crate::AppState;
use crate::health::CompositeHealth;

/// Increments `active_connections` on creation and decrements on drop,
/// so every exit path — validation failure, backend failure, success, or
/// a panic unwinding through the handler — balances the gauge exactly
/// once.
struct ConnectionGuard(Arc<MetricsRegistry>);

impl ConnectionGuard {
    fn new(registry: Arc<MetricsRegistry>) -> Self {
        registry.inc_active_connections();
        Self(registry)
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.0.dec_active_connections();
    }
}

fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({
            "error": message,
            "timestamp": timestamp(),
        })),
    )
        .into_response()
}

/// Pull the `text` field out of a request body.
///
/// The body is parsed by hand rather than through an extractor so a
/// malformed body still flows through the error-counting path.
fn extract_text(body: &[u8]) -> Result<String, &'static str> {
    let value: Value = serde_json::from_slice(body).map_err(|_| "Missing text field")?;
    let Some(text) = value.get("text") else {
        return Err("Missing text field");
    };
    match text.as_str() {
        Some(s) if !s.is_empty() => Ok(s.to_string()),
        _ => Err("Invalid text input"),
    }
}

/// Run `fut` with a panic boundary: an unexpected fault unwinding out of
/// the orchestration is counted as an error and answered with a
/// sanitized 500, like any other request-serving failure.
async fn catch_internal_faults<F>(registry: &MetricsRegistry, fut: F) -> Response
where
    F: Future<Output = Response>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(response) => response,
        Err(_) => {
            warn!("prediction handler panicked");
            registry.inc_errors();
            registry.refresh_derived(Instant::now());
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal gateway error")
        }
    }
}

/// POST /predict
pub async fn predict(State(state): State<AppState>, body: Bytes) -> Response {
    let start = Instant::now();
    let registry = state.registry.clone();

    let _guard = ConnectionGuard::new(registry.clone());
    registry.inc_requests();
    registry.record_request(start);

    catch_internal_faults(&registry, run_predict(&state, &body, start)).await
}

/// The fallible part of `/predict`: validate → invoke → record metrics.
async fn run_predict(state: &AppState, body: &[u8], start: Instant) -> Response {
    let registry = &state.registry;

    let text = match extract_text(body) {
        Ok(text) => text,
        Err(message) => {
            registry.inc_errors();
            registry.refresh_derived(Instant::now());
            return error_response(StatusCode::BAD_REQUEST, message);
        }
    };

    let inference_start = Instant::now();
    let invoked = state.backend.invoke(&text).await;
    let inference_secs = inference_start.elapsed().as_secs_f64();

    let result = match invoked {
        Ok(result) => result,
        Err(err) => {
            warn!(error = %err, "backend invocation failed");
            registry.inc_errors();
            registry.refresh_derived(Instant::now());
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string());
        }
    };

    registry.observe_inference_latency(inference_secs);
    registry.inc_prediction(match result.label {
        Label::Spam => PredictionLabel::Spam,
        Label::Ham => PredictionLabel::Ham,
    });
    registry.refresh_derived(Instant::now());
    registry.observe_response_time(start.elapsed().as_secs_f64());

    (
        StatusCode::OK,
        Json(json!({
            "prediction": result.label.as_str(),
            "confidence": result.confidence,
            "inference_time_ms": (inference_secs * 100_000.0).round() / 100.0,
            "timestamp": timestamp(),
        })),
    )
        .into_response()
}

/// GET /health
///
/// Always 200; degradation is reflected in the body. The backend is
/// probed fresh on every call.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let backend_ok = state.backend.check_health().await;
    let composite = CompositeHealth::from_backend(backend_ok);

    Json(json!({
        "status": composite.status().as_str(),
        "gateway": "running",
        "backend": if backend_ok { "healthy" } else { "unhealthy" },
        "backend_url": state.backend_url,
        "timestamp": timestamp(),
    }))
}

/// GET /metrics
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    {
        let mut sampler = state.sampler.lock().unwrap_or_else(|e| e.into_inner());
        state.registry.refresh_system(sampler.as_mut());
    }
    state.registry.refresh_derived(Instant::now());

    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        state.registry.render(),
    )
}

/// GET /
pub async fn home() -> Json<Value> {
    Json(json!({
        "service": "Spamgate",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "/predict": "POST - Classify a text as spam or ham",
            "/metrics": "GET - Prometheus metrics",
            "/health": "GET - Composite health check",
        },
        "metrics_tracked": [
            "requests_total",
            "predictions_total",
            "errors_total",
            "response_time_seconds",
            "inference_latency_seconds",
            "error_rate_percent",
            "cpu_usage_percent",
            "memory_usage_percent",
            "disk_usage_percent",
            "request_rate_per_minute",
            "active_connections",
            "model_accuracy",
        ],
    }))
}
