//! Host resource probing
//!
//! A probe never fails: any sub-query the platform can't answer comes back as
//! zero (or one, for the CPU count) and the snapshot is still produced.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Point-in-time view of host resources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    /// Logical CPUs, always at least 1
    pub cpu_count: u32,
    /// Available memory in bytes
    pub available_memory_bytes: u64,
    /// Total memory in bytes (0 when unknown)
    pub total_memory_bytes: u64,
    /// Instantaneous CPU utilization, 0.0 - 100.0
    pub cpu_percent: f64,
    /// Current CPU frequency in MHz (0 when unknown)
    pub cpu_freq_mhz: f64,
    /// Platform identifier, e.g. `linux-x86_64`
    pub platform: String,
}

impl ResourceSnapshot {
    pub fn new(cpu_count: u32, available_memory_bytes: u64, cpu_percent: f64, platform: impl Into<String>) -> Self {
        Self {
            cpu_count: cpu_count.max(1),
            available_memory_bytes,
            total_memory_bytes: 0,
            cpu_percent: clamp_percent(cpu_percent),
            cpu_freq_mhz: 0.0,
            platform: platform.into(),
        }
    }

    pub fn available_memory_gib(&self) -> f64 {
        self.available_memory_bytes as f64 / GIB
    }

    /// Used memory as a percentage of total, 0.0 when total is unknown
    pub fn memory_percent(&self) -> f64 {
        if self.total_memory_bytes == 0 {
            return 0.0;
        }
        let used = self.total_memory_bytes.saturating_sub(self.available_memory_bytes);
        clamp_percent(used as f64 / self.total_memory_bytes as f64 * 100.0)
    }
}

/// Source of resource snapshots
pub trait ResourceProbe: Send + Sync {
    fn snapshot(&self) -> ResourceSnapshot;
}

/// Probe returning the same snapshot every time
#[derive(Debug, Clone)]
pub struct FixedProbe(pub ResourceSnapshot);

impl ResourceProbe for FixedProbe {
    fn snapshot(&self) -> ResourceSnapshot {
        self.0.clone()
    }
}

/// Probe reading live values from the host
#[derive(Debug, Clone)]
pub struct HostProbe {
    /// Window used to measure CPU utilization
    pub cpu_sample_window: Duration,
}

impl Default for HostProbe {
    fn default() -> Self {
        Self {
            cpu_sample_window: Duration::from_millis(100),
        }
    }
}

impl ResourceProbe for HostProbe {
    fn snapshot(&self) -> ResourceSnapshot {
        let cpu_count = std::thread::available_parallelism()
            .map(|n| n.get() as u32)
            .unwrap_or(1);
        let (total, available) = system_memory();
        let cpu_percent = cpu_utilization(self.cpu_sample_window);

        let snapshot = ResourceSnapshot {
            cpu_count: cpu_count.max(1),
            available_memory_bytes: available,
            total_memory_bytes: total,
            cpu_percent: clamp_percent(cpu_percent),
            cpu_freq_mhz: cpu_frequency_mhz(),
            platform: format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH),
        };
        debug!(?snapshot, "resource snapshot");
        snapshot
    }
}

fn clamp_percent(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

/// (total_bytes, available_bytes)
#[cfg(target_os = "linux")]
fn system_memory() -> (u64, u64) {
    std::fs::read_to_string("/proc/meminfo")
        .map(|content| parse_meminfo(&content))
        .unwrap_or((0, 0))
}

#[cfg(target_os = "macos")]
fn system_memory() -> (u64, u64) {
    use std::process::Command;

    let total = Command::new("sysctl")
        .args(["-n", "hw.memsize"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| String::from_utf8_lossy(&o.stdout).trim().parse::<u64>().ok())
        .unwrap_or(0);

    let page_size = Command::new("sysctl")
        .args(["-n", "hw.pagesize"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| String::from_utf8_lossy(&o.stdout).trim().parse::<u64>().ok())
        .unwrap_or(16384);

    let available = Command::new("vm_stat")
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| {
            let text = String::from_utf8_lossy(&o.stdout);
            let pages: u64 = text
                .lines()
                .filter(|l| l.starts_with("Pages free:") || l.starts_with("Pages inactive:"))
                .filter_map(|l| l.split(':').nth(1))
                .filter_map(|v| v.trim().trim_end_matches('.').parse::<u64>().ok())
                .sum();
            pages * page_size
        })
        .unwrap_or(0);

    (total, available)
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn system_memory() -> (u64, u64) {
    (0, 0)
}

fn parse_meminfo(content: &str) -> (u64, u64) {
    let mut total = 0u64;
    let mut available = 0u64;

    for line in content.lines() {
        if let Some(val) = line.strip_prefix("MemTotal:") {
            total = parse_kb(val).unwrap_or(0) * 1024;
        } else if let Some(val) = line.strip_prefix("MemAvailable:") {
            available = parse_kb(val).unwrap_or(0) * 1024;
        }
    }
    (total, available)
}

fn parse_kb(val: &str) -> Option<u64> {
    val.split_whitespace().next()?.parse().ok()
}

/// (busy, total) jiffies from the aggregate `cpu` line of /proc/stat
fn parse_proc_stat(content: &str) -> Option<(u64, u64)> {
    let line = content.lines().find(|l| l.starts_with("cpu "))?;
    let fields: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .filter_map(|f| f.parse().ok())
        .collect();
    if fields.len() < 4 {
        return None;
    }
    let total: u64 = fields.iter().sum();
    // idle + iowait
    let idle = fields[3] + fields.get(4).copied().unwrap_or(0);
    Some((total - idle, total))
}

#[cfg(target_os = "linux")]
fn cpu_utilization(window: Duration) -> f64 {
    let read = || {
        std::fs::read_to_string("/proc/stat")
            .ok()
            .and_then(|c| parse_proc_stat(&c))
    };

    let Some((busy0, total0)) = read() else {
        return 0.0;
    };
    std::thread::sleep(window);
    let Some((busy1, total1)) = read() else {
        return 0.0;
    };

    let total = total1.saturating_sub(total0);
    if total == 0 {
        return 0.0;
    }
    busy1.saturating_sub(busy0) as f64 / total as f64 * 100.0
}

#[cfg(not(target_os = "linux"))]
fn cpu_utilization(_window: Duration) -> f64 {
    0.0
}

#[cfg(target_os = "linux")]
fn cpu_frequency_mhz() -> f64 {
    std::fs::read_to_string("/proc/cpuinfo")
        .ok()
        .and_then(|c| {
            c.lines()
                .find(|l| l.starts_with("cpu MHz"))
                .and_then(|l| l.split(':').nth(1))
                .and_then(|v| v.trim().parse::<f64>().ok())
        })
        .unwrap_or(0.0)
}

#[cfg(not(target_os = "linux"))]
fn cpu_frequency_mhz() -> f64 {
    0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_meminfo() {
        let content = "MemTotal:       16318412 kB\nMemFree:         1234567 kB\nMemAvailable:    8159206 kB\n";
        let (total, available) = parse_meminfo(content);
        assert_eq!(total, 16318412 * 1024);
        assert_eq!(available, 8159206 * 1024);
    }

    #[test]
    fn test_parse_meminfo_garbage() {
        assert_eq!(parse_meminfo("nothing useful here"), (0, 0));
    }

    #[test]
    fn test_parse_proc_stat() {
        let content = "cpu  100 0 100 700 100 0 0 0 0 0\ncpu0 50 0 50 350 50 0 0 0 0 0\n";
        let (busy, total) = parse_proc_stat(content).unwrap();
        assert_eq!(total, 1000);
        assert_eq!(busy, 200);
    }

    #[test]
    fn test_snapshot_clamps() {
        let snap = ResourceSnapshot::new(0, 1024, 250.0, "test");
        assert_eq!(snap.cpu_count, 1);
        assert_eq!(snap.cpu_percent, 100.0);
        assert_eq!(ResourceSnapshot::new(4, 0, f64::NAN, "t").cpu_percent, 0.0);
    }

    #[test]
    fn test_memory_percent() {
        let mut snap = ResourceSnapshot::new(4, 4 * 1024, 0.0, "test");
        assert_eq!(snap.memory_percent(), 0.0);
        snap.total_memory_bytes = 16 * 1024;
        assert_eq!(snap.memory_percent(), 75.0);
    }

    #[test]
    fn test_host_probe_never_panics() {
        let probe = HostProbe {
            cpu_sample_window: Duration::from_millis(1),
        };
        let snap = probe.snapshot();
        assert!(snap.cpu_count >= 1);
        assert!((0.0..=100.0).contains(&snap.cpu_percent));
        assert!(!snap.platform.is_empty());
    }
}
