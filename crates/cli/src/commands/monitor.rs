//! Monitor Command

use anyhow::Result;
use clap::Args;
use std::sync::Arc;
use std::time::Duration;

use testfleet_core::monitor::PerformanceSample;
use testfleet_core::{HostProbe, PerformanceMonitor, PerformanceReport, ResourceProbe};

use crate::output::{print_details, print_info, OutputFormat};

#[derive(Args)]
pub struct MonitorArgs {
    /// How long to sample, in seconds
    #[arg(short, long, default_value = "60")]
    pub duration: u64,

    /// Seconds between samples
    #[arg(short, long, default_value = "5")]
    pub interval: u64,
}

pub async fn execute(args: MonitorArgs, format: OutputFormat) -> Result<()> {
    let probe: Arc<dyn ResourceProbe> = Arc::new(HostProbe::default());
    let duration = Duration::from_secs(args.duration);
    let interval = Duration::from_secs(args.interval.max(1));

    print_info(&format!("Sampling for {}s every {}s", duration.as_secs(), interval.as_secs()));
    let monitor = PerformanceMonitor::start(probe.clone(), interval, duration);
    tokio::time::sleep(duration).await;
    let samples: Vec<PerformanceSample> = monitor.stop();

    let report = PerformanceReport::from_samples(&samples, &probe.snapshot());
    let mut rows = vec![
        ("Samples", report.sample_count.to_string()),
        ("Avg CPU %", format!("{:.1}", report.avg_cpu_percent)),
        ("Peak CPU %", format!("{:.1}", report.peak_cpu_percent)),
        ("Avg Memory %", format!("{:.1}", report.avg_memory_percent)),
        ("Current CPU %", format!("{:.1}", report.current_cpu_percent)),
        ("Current Memory %", format!("{:.1}", report.current_memory_percent)),
    ];
    for rec in &report.recommendations {
        rows.push(("Recommendation", rec.clone()));
    }
    print_details("Performance", &rows, &report, format);
    Ok(())
}
