//! Host resource sampling.
//!
//! Feeds the `cpu_usage_percent`, `memory_usage_percent`, and
//! `disk_usage_percent` gauges. Sampling is best-effort: a reading that
//! cannot be taken is simply absent from the sample, and the registry
//! keeps the gauge at its previous value.

use std::path::PathBuf;

use sysinfo::{Disks, System};
use tracing::debug;

/// One point-in-time resource sample. Each field is independently
/// optional so a single failed reading does not discard the others.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceUsage {
    pub cpu_percent: Option<f64>,
    pub memory_percent: Option<f64>,
    pub disk_percent: Option<f64>,
}

/// Capability interface for resource sampling.
///
/// The contract is fallible-but-non-propagating: implementations never
/// error out, they just omit readings they could not take. Tests
/// substitute a stub.
pub trait ResourceSampler: Send {
    fn sample(&mut self) -> ResourceUsage;
}

/// Samples the host via `sysinfo`.
///
/// Keeps a persistent [`System`] so successive CPU refreshes measure
/// usage over the interval between calls rather than since boot.
pub struct SystemSampler {
    sys: System,
    disk_path: PathBuf,
}

impl SystemSampler {
    /// `disk_path` is the mount whose utilization feeds the disk gauge.
    pub fn new(disk_path: impl Into<PathBuf>) -> Self {
        Self {
            sys: System::new(),
            disk_path: disk_path.into(),
        }
    }

    fn cpu_percent(&mut self) -> Option<f64> {
        self.sys.refresh_cpu_usage();
        let usage = self.sys.global_cpu_usage() as f64;
        usage.is_finite().then_some(usage)
    }

    fn memory_percent(&mut self) -> Option<f64> {
        self.sys.refresh_memory();
        let total = self.sys.total_memory();
        if total == 0 {
            debug!("total memory reported as zero, skipping memory sample");
            return None;
        }
        Some(self.sys.used_memory() as f64 / total as f64 * 100.0)
    }

    fn disk_percent(&self) -> Option<f64> {
        let disks = Disks::new_with_refreshed_list();

        // Longest mount-point prefix of the configured path wins, so
        // e.g. "/var/lib" resolves to "/var" when that is its own mount.
        let disk = disks
            .iter()
            .filter(|d| self.disk_path.starts_with(d.mount_point()))
            .max_by_key(|d| d.mount_point().as_os_str().len())?;

        let total = disk.total_space();
        if total == 0 {
            debug!(path = ?self.disk_path, "disk reports zero capacity, skipping disk sample");
            return None;
        }
        let used = total.saturating_sub(disk.available_space());
        Some(used as f64 / total as f64 * 100.0)
    }
}

impl ResourceSampler for SystemSampler {
    fn sample(&mut self) -> ResourceUsage {
        ResourceUsage {
            cpu_percent: self.cpu_percent(),
            memory_percent: self.memory_percent(),
            disk_percent: self.disk_percent(),
        }
    }
}
