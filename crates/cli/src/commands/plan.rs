//! Plan Command

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

use testfleet_core::distributor::WorkerSlice;
use testfleet_core::{AllocationRequest, ExecutionPlan, ExecutionPlanBuilder, HarnessConfig, HostProbe};
use testfleet_e2e::runner::discover_tests;

use crate::output::{print_details, print_list, OutputFormat, TableDisplay};

#[derive(Args)]
pub struct PlanArgs {
    /// Number of tests to plan for
    #[arg(short, long, default_value = "100")]
    pub count: usize,

    /// Upper bound on workers
    #[arg(short, long)]
    pub workers: Option<u32>,

    /// Test tree to distribute (defaults to the configured tests dir)
    #[arg(long)]
    pub tests_dir: Option<PathBuf>,
}

#[derive(Serialize)]
pub struct SliceDisplay {
    pub worker: String,
    pub category: String,
    pub tests: usize,
    pub estimated_secs: u64,
}

impl From<&WorkerSlice> for SliceDisplay {
    fn from(slice: &WorkerSlice) -> Self {
        Self {
            worker: slice.worker.to_string(),
            category: slice.category.as_str().to_string(),
            tests: slice.identifiers.len(),
            estimated_secs: slice.estimated_secs,
        }
    }
}

impl TableDisplay for SliceDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Worker", "Category", "Tests", "Est. Seconds"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.worker.clone(),
            self.category.clone(),
            self.tests.to_string(),
            self.estimated_secs.to_string(),
        ]
    }
}

/// Summary rows for an execution plan
pub fn plan_rows(plan: &ExecutionPlan) -> Vec<(&'static str, String)> {
    let browsers = plan
        .browser_config
        .iter()
        .map(|(engine, quota)| format!("{}={} ({}MB)", engine, quota.instances, quota.memory_limit_mb))
        .collect::<Vec<_>>()
        .join(", ");

    vec![
        ("Tests", plan.test_count.to_string()),
        ("Workers", plan.workers.to_string()),
        (
            "Bounds (cpu/mem/tests/max)",
            format!(
                "{}/{}/{}/{}",
                plan.allocation.cpu_bound,
                plan.allocation.memory_bound,
                plan.allocation.test_bound,
                plan.allocation.configured_max
            ),
        ),
        ("Browsers", browsers),
        ("Estimated Duration", format!("{:.0}s", plan.estimated_duration_secs)),
        ("Resources", plan.resource_requirements.describe()),
        ("Headless", plan.optimization.headless.to_string()),
    ]
}

pub async fn execute(args: PlanArgs, config: HarnessConfig, format: OutputFormat) -> Result<()> {
    let tests_dir = args.tests_dir.unwrap_or_else(|| config.paths.tests_dir.clone());
    let identifiers = discover_tests(&tests_dir).unwrap_or_else(|e| {
        warn!("Could not scan {}: {}", tests_dir.display(), e);
        Vec::new()
    });

    let mut request = AllocationRequest::new(args.count).with_ceiling(args.workers);
    request.memory_per_worker = config.planner.memory_per_worker;
    let plan = ExecutionPlanBuilder::new(Arc::new(HostProbe::default()), &config).build_with(&request, &identifiers);

    print_plan(&plan, format);
    Ok(())
}

pub fn print_plan(plan: &ExecutionPlan, format: OutputFormat) {
    print_details("Execution Plan", &plan_rows(plan), plan, format);
    if matches!(format, OutputFormat::Table | OutputFormat::Plain) {
        let slices: Vec<SliceDisplay> = plan.distribution.slices.iter().map(SliceDisplay::from).collect();
        if !slices.is_empty() {
            println!();
            print_list(&slices, format);
        }
    }
}
