//! Prometheus text exposition format.
//!
//! Renders a registry snapshot into the Prometheus text format for
//! scraping by a Prometheus server or compatible agent.

use std::fmt::Write;

use crate::registry::{HistogramSnapshot, RegistrySnapshot};

/// Render a registry snapshot into Prometheus text format.
pub fn render_prometheus(snap: &RegistrySnapshot) -> String {
    let mut out = String::new();

    counter(&mut out, "requests_total", "Total number of prediction requests.", snap.requests_total);

    out.push_str("# HELP predictions_total Total number of predictions by result.\n");
    out.push_str("# TYPE predictions_total counter\n");
    let _ = writeln!(out, "predictions_total{{result=\"spam\"}} {}", snap.predictions_spam);
    let _ = writeln!(out, "predictions_total{{result=\"ham\"}} {}", snap.predictions_ham);

    counter(&mut out, "errors_total", "Total number of errors.", snap.errors_total);

    histogram(
        &mut out,
        "response_time_seconds",
        "Response time in seconds.",
        &snap.response_time,
    );
    histogram(
        &mut out,
        "inference_latency_seconds",
        "Model inference latency in seconds.",
        &snap.inference_latency,
    );

    gauge(&mut out, "error_rate_percent", "Current error rate percentage.", snap.error_rate_percent);
    gauge(&mut out, "cpu_usage_percent", "Current CPU usage percentage.", snap.cpu_usage_percent);
    gauge(&mut out, "memory_usage_percent", "Current memory usage percentage.", snap.memory_usage_percent);
    gauge(&mut out, "disk_usage_percent", "Current disk usage percentage.", snap.disk_usage_percent);
    gauge(
        &mut out,
        "request_rate_per_minute",
        "Requests observed in the last 60 seconds.",
        snap.request_rate_per_minute,
    );
    gauge(
        &mut out,
        "active_connections",
        "Number of in-flight prediction requests.",
        snap.active_connections as f64,
    );
    gauge(&mut out, "model_accuracy", "Model accuracy from training.", snap.model_accuracy);

    out
}

fn counter(out: &mut String, name: &str, help: &str, value: u64) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} counter");
    let _ = writeln!(out, "{name} {value}");
}

fn gauge(out: &mut String, name: &str, help: &str, value: f64) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} gauge");
    let _ = writeln!(out, "{name} {value}");
}

fn histogram(out: &mut String, name: &str, help: &str, snap: &HistogramSnapshot) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} histogram");
    for (bound, count) in snap.bounds.iter().zip(&snap.cumulative) {
        let _ = writeln!(out, "{name}_bucket{{le=\"{bound}\"}} {count}");
    }
    // The overflow bucket is the last cumulative entry.
    let _ = writeln!(out, "{name}_bucket{{le=\"+Inf\"}} {}", snap.count);
    let _ = writeln!(out, "{name}_sum {}", snap.sum_seconds);
    let _ = writeln!(out, "{name}_count {}", snap.count);
}
