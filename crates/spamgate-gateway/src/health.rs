//! Composite health aggregation.
//!
//! Combines gateway self-health with the backend's reported health into
//! one status. There is no externally visible "unhealthy gateway" state:
//! a gateway that cannot run this code cannot respond at all, and that
//! failure mode is a process crash rather than a reported status.

/// Composite service status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Gateway up and backend reporting healthy.
    Healthy,
    /// Gateway up but the backend is unreachable or unhealthy.
    Degraded,
}

impl HealthStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
        }
    }
}

/// Gateway self-health plus the backend probe outcome. Stateless,
/// computed fresh per call.
#[derive(Debug, Clone, Copy)]
pub struct CompositeHealth {
    pub gateway_ok: bool,
    pub backend_ok: bool,
}

impl CompositeHealth {
    /// Aggregate from a backend probe. Gateway self-health is true by
    /// construction: this code is running.
    pub fn from_backend(backend_ok: bool) -> Self {
        Self {
            gateway_ok: true,
            backend_ok,
        }
    }

    /// `Healthy` iff both sides are up.
    pub fn status(self) -> HealthStatus {
        if self.gateway_ok && self.backend_ok {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        }
    }
}
