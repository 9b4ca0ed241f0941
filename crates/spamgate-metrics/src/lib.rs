//! spamgate-metrics — operational metrics for the spam-detection gateway.
//!
//! Owns every counter, histogram, and gauge the gateway exports, plus the
//! rolling request-rate window and the best-effort system resource sampler.
//!
//! # Architecture
//!
//! ```text
//! MetricsRegistry
//!   ├── inc_*() / observe_*()   ← called per HTTP request
//!   ├── refresh_derived()       → error rate + requests-per-minute gauges
//!   ├── refresh_system()        → CPU/memory/disk gauges via ResourceSampler
//!   └── render()                → Prometheus text for /metrics
//!
//! RateWindow
//!   └── bounded 60s event log, purge-on-read
//! ```

pub mod prometheus;
pub mod registry;
pub mod sampler;
pub mod window;

pub use prometheus::render_prometheus;
pub use registry::{MetricsRegistry, PredictionLabel, RegistrySnapshot};
pub use sampler::{ResourceSampler, ResourceUsage, SystemSampler};
pub use window::RateWindow;
