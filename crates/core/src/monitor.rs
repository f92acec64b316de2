//! Background resource sampling during a run
//!
//! Samples are advisory: they feed the post-run performance report and are
//! never used to change an allocation mid-run.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::probe::{ResourceProbe, ResourceSnapshot};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSample {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub elapsed_secs: f64,
}

/// Handle to a running sampler thread
pub struct PerformanceMonitor {
    samples: Arc<Mutex<Vec<PerformanceSample>>>,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl PerformanceMonitor {
    /// Sample every `interval` until `duration` has elapsed
    pub fn start(probe: Arc<dyn ResourceProbe>, interval: Duration, duration: Duration) -> Self {
        let samples = Arc::new(Mutex::new(Vec::new()));
        let stop = Arc::new(AtomicBool::new(false));

        let thread_samples = samples.clone();
        let thread_stop = stop.clone();
        let spawned = std::thread::Builder::new()
            .name("perf-monitor".into())
            .spawn(move || {
                let start = Instant::now();
                while start.elapsed() < duration && !thread_stop.load(Ordering::Relaxed) {
                    let snap = probe.snapshot();
                    let sample = PerformanceSample {
                        cpu_percent: snap.cpu_percent,
                        memory_percent: snap.memory_percent(),
                        elapsed_secs: start.elapsed().as_secs_f64(),
                    };
                    debug!(?sample, "performance sample");
                    thread_samples.lock().push(sample);
                    sleep_unless_stopped(interval, &thread_stop);
                }
            });

        let thread = match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Performance monitor not started: {}", e);
                None
            }
        };

        Self { samples, stop, thread }
    }

    /// Copy of everything collected so far
    pub fn samples(&self) -> Vec<PerformanceSample> {
        self.samples.lock().clone()
    }

    /// Stop sampling early and wait for the thread
    pub fn stop(mut self) -> Vec<PerformanceSample> {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        self.samples()
    }
}

fn sleep_unless_stopped(interval: Duration, stop: &AtomicBool) {
    let step = Duration::from_millis(50).min(interval);
    let deadline = Instant::now() + interval;
    while Instant::now() < deadline && !stop.load(Ordering::Relaxed) {
        std::thread::sleep(step);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub sample_count: usize,
    pub avg_cpu_percent: f64,
    pub avg_memory_percent: f64,
    pub peak_cpu_percent: f64,
    pub current_cpu_percent: f64,
    pub current_memory_percent: f64,
    pub recommendations: Vec<String>,
}

impl PerformanceReport {
    /// Summarize samples; with no samples the current snapshot stands in
    pub fn from_samples(samples: &[PerformanceSample], current: &ResourceSnapshot) -> Self {
        let (avg_cpu, avg_mem, peak) = if samples.is_empty() {
            (current.cpu_percent, current.memory_percent(), current.cpu_percent)
        } else {
            let n = samples.len() as f64;
            (
                samples.iter().map(|s| s.cpu_percent).sum::<f64>() / n,
                samples.iter().map(|s| s.memory_percent).sum::<f64>() / n,
                samples.iter().map(|s| s.cpu_percent).fold(0.0, f64::max),
            )
        };

        Self {
            sample_count: samples.len(),
            avg_cpu_percent: avg_cpu,
            avg_memory_percent: avg_mem,
            peak_cpu_percent: peak,
            current_cpu_percent: current.cpu_percent,
            current_memory_percent: current.memory_percent(),
            recommendations: recommendations(avg_cpu, avg_mem),
        }
    }
}

pub fn recommendations(avg_cpu: f64, avg_memory: f64) -> Vec<String> {
    let mut out = Vec::new();

    if avg_cpu > 80.0 {
        out.push("Consider reducing parallel workers to lower CPU usage".to_string());
    }
    if avg_memory > 80.0 {
        out.push("Consider reducing browser instances or increasing memory".to_string());
    }
    if avg_cpu < 50.0 && avg_memory < 60.0 {
        out.push("Consider increasing parallel workers for better resource utilization".to_string());
    }
    if out.is_empty() {
        out.push("Current resource usage is optimal".to_string());
    }
    out
}
