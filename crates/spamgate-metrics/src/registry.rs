//! Metrics registry — the single owner of all operational signals.
//!
//! Counters and histogram buckets are lock-free atomics; gauges store
//! `f64` bit patterns in atomics; the request-rate window sits behind its
//! own mutex. Every metric is created once at construction and lives for
//! the process lifetime.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Instant;

use tracing::warn;

use crate::sampler::ResourceSampler;
use crate::window::RateWindow;

/// `response_time_seconds` bucket boundaries.
const RESPONSE_TIME_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0];

/// `inference_latency_seconds` bucket boundaries.
const INFERENCE_LATENCY_BUCKETS: &[f64] = &[0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0];

/// Label value for the `predictions_total` counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictionLabel {
    Spam,
    Ham,
}

impl PredictionLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            PredictionLabel::Spam => "spam",
            PredictionLabel::Ham => "ham",
        }
    }
}

/// Monotonic counter.
struct Counter(AtomicU64);

impl Counter {
    fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Last-write-wins gauge storing an `f64` bit pattern.
struct Gauge(AtomicU64);

impl Gauge {
    fn new(initial: f64) -> Self {
        Self(AtomicU64::new(initial.to_bits()))
    }

    fn set(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }

    fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }
}

/// Fixed-bucket histogram with cumulative exposition.
///
/// Buckets hold per-range counts internally; the snapshot accumulates
/// them into the cumulative form Prometheus expects. The running sum is
/// kept in whole microseconds so it fits an atomic.
struct Histogram {
    bounds: &'static [f64],
    buckets: Vec<AtomicU64>,
    sum_micros: AtomicU64,
}

impl Histogram {
    fn new(bounds: &'static [f64]) -> Self {
        let buckets = (0..=bounds.len()).map(|_| AtomicU64::new(0)).collect();
        Self {
            bounds,
            buckets,
            sum_micros: AtomicU64::new(0),
        }
    }

    /// Record an observation in seconds. Negative and NaN values are
    /// dropped to keep the distribution sane.
    fn observe(&self, seconds: f64) {
        if seconds.is_nan() || seconds < 0.0 {
            warn!(value = seconds, "rejected invalid histogram observation");
            return;
        }
        self.sum_micros
            .fetch_add((seconds * 1_000_000.0).round() as u64, Ordering::Relaxed);

        let idx = self
            .bounds
            .iter()
            .position(|&bound| seconds <= bound)
            .unwrap_or(self.bounds.len());
        self.buckets[idx].fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> HistogramSnapshot {
        let mut cumulative = Vec::with_capacity(self.buckets.len());
        let mut running = 0u64;
        for bucket in &self.buckets {
            running += bucket.load(Ordering::Relaxed);
            cumulative.push(running);
        }
        HistogramSnapshot {
            bounds: self.bounds.to_vec(),
            cumulative,
            sum_seconds: self.sum_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0,
            count: running,
        }
    }
}

/// Cumulative histogram state at a point in time.
///
/// `cumulative` has one entry per bound plus the trailing `+Inf` bucket;
/// the last entry equals `count`.
#[derive(Debug, Clone)]
pub struct HistogramSnapshot {
    pub bounds: Vec<f64>,
    pub cumulative: Vec<u64>,
    pub sum_seconds: f64,
    pub count: u64,
}

/// Point-in-time view of every metric, consumed by the exposition
/// renderer and by tests. Individual values are read independently, so
/// the snapshot is eventually-consistent across metrics rather than
/// transactional.
#[derive(Debug, Clone)]
pub struct RegistrySnapshot {
    pub requests_total: u64,
    pub predictions_spam: u64,
    pub predictions_ham: u64,
    pub errors_total: u64,
    pub response_time: HistogramSnapshot,
    pub inference_latency: HistogramSnapshot,
    pub error_rate_percent: f64,
    pub cpu_usage_percent: f64,
    pub memory_usage_percent: f64,
    pub disk_usage_percent: f64,
    pub request_rate_per_minute: f64,
    pub active_connections: i64,
    pub model_accuracy: f64,
}

/// Authoritative store for all operational signals.
pub struct MetricsRegistry {
    requests: Counter,
    predictions_spam: Counter,
    predictions_ham: Counter,
    errors: Counter,
    response_time: Histogram,
    inference_latency: Histogram,
    error_rate: Gauge,
    cpu_usage: Gauge,
    memory_usage: Gauge,
    disk_usage: Gauge,
    request_rate: Gauge,
    active_connections: AtomicI64,
    model_accuracy: Gauge,
    window: RateWindow,
}

impl MetricsRegistry {
    /// Create the registry, seeding `model_accuracy` from the training
    /// constant supplied by configuration (clamped to [0, 1]).
    pub fn new(model_accuracy: f64) -> Self {
        let accuracy = if model_accuracy.is_nan() {
            warn!("model accuracy is NaN, defaulting to 0");
            0.0
        } else {
            model_accuracy.clamp(0.0, 1.0)
        };

        Self {
            requests: Counter::new(),
            predictions_spam: Counter::new(),
            predictions_ham: Counter::new(),
            errors: Counter::new(),
            response_time: Histogram::new(RESPONSE_TIME_BUCKETS),
            inference_latency: Histogram::new(INFERENCE_LATENCY_BUCKETS),
            error_rate: Gauge::new(0.0),
            cpu_usage: Gauge::new(0.0),
            memory_usage: Gauge::new(0.0),
            disk_usage: Gauge::new(0.0),
            request_rate: Gauge::new(0.0),
            active_connections: AtomicI64::new(0),
            model_accuracy: Gauge::new(accuracy),
            window: RateWindow::new(),
        }
    }

    // ── Counters ───────────────────────────────────────────────

    pub fn inc_requests(&self) {
        self.requests.inc();
    }

    pub fn inc_errors(&self) {
        self.errors.inc();
    }

    pub fn inc_prediction(&self, label: PredictionLabel) {
        match label {
            PredictionLabel::Spam => self.predictions_spam.inc(),
            PredictionLabel::Ham => self.predictions_ham.inc(),
        }
    }

    // ── Histograms ─────────────────────────────────────────────

    pub fn observe_response_time(&self, seconds: f64) {
        self.response_time.observe(seconds);
    }

    pub fn observe_inference_latency(&self, seconds: f64) {
        self.inference_latency.observe(seconds);
    }

    // ── Active connections ─────────────────────────────────────

    pub fn inc_active_connections(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec_active_connections(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    // ── Request window ─────────────────────────────────────────

    /// Record a request arrival for the per-minute rate.
    pub fn record_request(&self, now: Instant) {
        self.window.record(now);
    }

    // ── Derived + system gauges ────────────────────────────────

    /// Recompute `error_rate_percent` and `request_rate_per_minute` from
    /// current counter and window state. Counter reads are atomic loads;
    /// the window purge runs under its own lock. A zero request count
    /// yields an error rate of 0, never NaN.
    pub fn refresh_derived(&self, now: Instant) {
        let requests = self.requests.get();
        let errors = self.errors.get();
        let rate = if requests > 0 {
            errors as f64 / requests as f64 * 100.0
        } else {
            0.0
        };
        self.error_rate.set(rate.clamp(0.0, 100.0));
        self.request_rate.set(self.window.rate(now) as f64);
    }

    /// Best-effort refresh of the CPU/memory/disk gauges. Readings the
    /// sampler could not take leave the corresponding gauge untouched.
    pub fn refresh_system(&self, sampler: &mut dyn ResourceSampler) {
        let usage = sampler.sample();
        if let Some(cpu) = clamp_percent(usage.cpu_percent) {
            self.cpu_usage.set(cpu);
        }
        if let Some(mem) = clamp_percent(usage.memory_percent) {
            self.memory_usage.set(mem);
        }
        if let Some(disk) = clamp_percent(usage.disk_percent) {
            self.disk_usage.set(disk);
        }
    }

    // ── Export ─────────────────────────────────────────────────

    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            requests_total: self.requests.get(),
            predictions_spam: self.predictions_spam.get(),
            predictions_ham: self.predictions_ham.get(),
            errors_total: self.errors.get(),
            response_time: self.response_time.snapshot(),
            inference_latency: self.inference_latency.snapshot(),
            error_rate_percent: self.error_rate.get(),
            cpu_usage_percent: self.cpu_usage.get(),
            memory_usage_percent: self.memory_usage.get(),
            disk_usage_percent: self.disk_usage.get(),
            request_rate_per_minute: self.request_rate.get(),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            model_accuracy: self.model_accuracy.get(),
        }
    }

    /// Render the current state in Prometheus text format. Restartable:
    /// each call re-reads live values.
    pub fn render(&self) -> String {
        crate::prometheus::render_prometheus(&self.snapshot())
    }
}

/// Clamp a percentage reading to [0, 100]; NaN readings are dropped.
fn clamp_percent(value: Option<f64>) -> Option<f64> {
    match value {
        Some(v) if v.is_nan() => {
            warn!("rejected NaN gauge value");
            None
        }
        Some(v) => Some(v.clamp(0.0, 100.0)),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::ResourceUsage;

    struct StubSampler(ResourceUsage);

    impl ResourceSampler for StubSampler {
        fn sample(&mut self) -> ResourceUsage {
            self.0
        }
    }

    #[test]
    fn counters_are_monotonic() {
        let reg = MetricsRegistry::new(0.9631);

        let mut last = 0;
        for _ in 0..10 {
            reg.inc_requests();
            let snap = reg.snapshot();
            assert!(snap.requests_total > last);
            last = snap.requests_total;
        }
    }

    #[test]
    fn prediction_counter_tracks_labels_separately() {
        let reg = MetricsRegistry::new(0.9631);

        reg.inc_prediction(PredictionLabel::Spam);
        reg.inc_prediction(PredictionLabel::Spam);
        reg.inc_prediction(PredictionLabel::Ham);

        let snap = reg.snapshot();
        assert_eq!(snap.predictions_spam, 2);
        assert_eq!(snap.predictions_ham, 1);
    }

    #[test]
    fn error_rate_zero_without_requests() {
        let reg = MetricsRegistry::new(0.9631);
        reg.refresh_derived(Instant::now());
        assert_eq!(reg.snapshot().error_rate_percent, 0.0);
    }

    #[test]
    fn error_rate_is_errors_over_requests() {
        let reg = MetricsRegistry::new(0.9631);

        for _ in 0..4 {
            reg.inc_requests();
        }
        reg.inc_errors();
        reg.refresh_derived(Instant::now());

        assert_eq!(reg.snapshot().error_rate_percent, 25.0);
    }

    #[test]
    fn request_rate_reflects_window() {
        let reg = MetricsRegistry::new(0.9631);
        let start = Instant::now();

        for _ in 0..5 {
            reg.record_request(start);
        }
        reg.refresh_derived(start + std::time::Duration::from_secs(1));
        assert_eq!(reg.snapshot().request_rate_per_minute, 5.0);

        // Well past the window everything has aged out.
        reg.refresh_derived(start + std::time::Duration::from_secs(120));
        assert_eq!(reg.snapshot().request_rate_per_minute, 0.0);
    }

    #[test]
    fn histogram_buckets_are_cumulative() {
        let reg = MetricsRegistry::new(0.9631);

        reg.observe_response_time(0.005); // ≤ 0.01
        reg.observe_response_time(0.3); // ≤ 0.5
        reg.observe_response_time(10.0); // overflow

        let snap = reg.snapshot().response_time;
        assert_eq!(snap.count, 3);
        // Bounds: 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, +Inf
        assert_eq!(snap.cumulative, vec![1, 1, 1, 2, 2, 2, 2, 3]);
        assert!((snap.sum_seconds - 10.305).abs() < 1e-6);
    }

    #[test]
    fn negative_observation_is_dropped() {
        let reg = MetricsRegistry::new(0.9631);

        reg.observe_inference_latency(-1.0);
        reg.observe_inference_latency(f64::NAN);

        assert_eq!(reg.snapshot().inference_latency.count, 0);
    }

    #[test]
    fn active_connections_balance() {
        let reg = MetricsRegistry::new(0.9631);

        reg.inc_active_connections();
        reg.inc_active_connections();
        assert_eq!(reg.snapshot().active_connections, 2);

        reg.dec_active_connections();
        reg.dec_active_connections();
        assert_eq!(reg.snapshot().active_connections, 0);
    }

    #[test]
    fn system_refresh_keeps_previous_value_on_missing_reading() {
        let reg = MetricsRegistry::new(0.9631);

        let mut full = StubSampler(ResourceUsage {
            cpu_percent: Some(40.0),
            memory_percent: Some(55.0),
            disk_percent: Some(70.0),
        });
        reg.refresh_system(&mut full);

        // A sampler that only produced a CPU reading leaves the rest.
        let mut partial = StubSampler(ResourceUsage {
            cpu_percent: Some(10.0),
            memory_percent: None,
            disk_percent: None,
        });
        reg.refresh_system(&mut partial);

        let snap = reg.snapshot();
        assert_eq!(snap.cpu_usage_percent, 10.0);
        assert_eq!(snap.memory_usage_percent, 55.0);
        assert_eq!(snap.disk_usage_percent, 70.0);
    }

    #[test]
    fn system_refresh_clamps_out_of_range_readings() {
        let reg = MetricsRegistry::new(0.9631);

        let mut sampler = StubSampler(ResourceUsage {
            cpu_percent: Some(150.0),
            memory_percent: Some(-5.0),
            disk_percent: Some(f64::NAN),
        });
        reg.refresh_system(&mut sampler);

        let snap = reg.snapshot();
        assert_eq!(snap.cpu_usage_percent, 100.0);
        assert_eq!(snap.memory_usage_percent, 0.0);
        assert_eq!(snap.disk_usage_percent, 0.0);
    }

    #[test]
    fn model_accuracy_is_clamped_at_init() {
        assert_eq!(MetricsRegistry::new(0.9631).snapshot().model_accuracy, 0.9631);
        assert_eq!(MetricsRegistry::new(1.7).snapshot().model_accuracy, 1.0);
        assert_eq!(MetricsRegistry::new(-0.2).snapshot().model_accuracy, 0.0);
        assert_eq!(MetricsRegistry::new(f64::NAN).snapshot().model_accuracy, 0.0);
    }

    #[test]
    fn snapshot_is_idempotent_without_mutation() {
        let reg = MetricsRegistry::new(0.9631);
        reg.inc_requests();
        reg.inc_errors();
        reg.observe_response_time(0.2);

        let a = reg.snapshot();
        let b = reg.snapshot();
        assert_eq!(a.requests_total, b.requests_total);
        assert_eq!(a.errors_total, b.errors_total);
        assert_eq!(a.response_time.cumulative, b.response_time.cumulative);
        assert_eq!(a.response_time.sum_seconds, b.response_time.sum_seconds);
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let reg = std::sync::Arc::new(MetricsRegistry::new(0.9631));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let reg = reg.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        reg.inc_requests();
                        reg.observe_response_time(0.02);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let snap = reg.snapshot();
        assert_eq!(snap.requests_total, 8000);
        assert_eq!(snap.response_time.count, 8000);
    }
}
