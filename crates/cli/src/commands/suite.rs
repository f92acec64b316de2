//! Suite Commands

use anyhow::{bail, Result};
use clap::Subcommand;
use serde::Serialize;

use testfleet_core::{HarnessConfig, SuiteRegistry, TestSuite};

use crate::output::{print_details, print_item, print_list, print_success, OutputFormat, TableDisplay};

#[derive(Subcommand)]
pub enum SuiteCommands {
    /// Create (or replace) a suite record
    Create {
        /// Suite name
        name: String,

        /// Number of tests in the suite
        #[arg(short, long)]
        count: usize,

        /// Free-form description
        #[arg(short, long, default_value = "")]
        description: String,
    },

    /// List suite records
    List,

    /// Show metrics for a suite
    Show {
        /// Suite name
        name: String,
    },

    /// Show the grouping template for a suite
    Plan {
        /// Suite name
        name: String,
    },
}

#[derive(Serialize)]
pub struct SuiteDisplay {
    pub name: String,
    pub status: String,
    pub test_count: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub execution_time: f64,
    pub last_run: String,
}

impl From<&TestSuite> for SuiteDisplay {
    fn from(suite: &TestSuite) -> Self {
        Self {
            name: suite.name.clone(),
            status: suite.status.to_string(),
            test_count: suite.test_count,
            passed: suite.passed,
            failed: suite.failed,
            skipped: suite.skipped,
            execution_time: suite.execution_time,
            last_run: suite.last_run.clone(),
        }
    }
}

impl TableDisplay for SuiteDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Name", "Status", "Tests", "Passed", "Failed", "Skipped", "Duration", "Last Run"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.status.clone(),
            self.test_count.to_string(),
            self.passed.to_string(),
            self.failed.to_string(),
            self.skipped.to_string(),
            format!("{:.1}s", self.execution_time),
            if self.last_run.is_empty() { "-".to_string() } else { self.last_run.clone() },
        ]
    }
}

pub async fn execute(cmd: SuiteCommands, config: HarnessConfig, format: OutputFormat) -> Result<()> {
    let mut registry = SuiteRegistry::open(&config.paths.suites_dir)?;

    match cmd {
        SuiteCommands::Create { name, count, description } => {
            let description = if description.is_empty() {
                format!("Mass test suite with {} tests", count)
            } else {
                description
            };
            let suite = registry.create_suite(&name, &description, count);
            print_success(&format!("Suite {} created", name));
            print_item(&SuiteDisplay::from(&suite), format);
        }

        SuiteCommands::List => {
            let displays: Vec<SuiteDisplay> = registry.list_suites().into_iter().map(SuiteDisplay::from).collect();
            print_list(&displays, format);
        }

        SuiteCommands::Show { name } => {
            let Some(metrics) = registry.suite_metrics(&name) else {
                bail!("Suite not found: {}", name);
            };
            let rows = vec![
                ("Suite", metrics.suite_name.clone()),
                ("Total Tests", metrics.total_tests.to_string()),
                ("Avg Time / Test", format!("{:.2}s", metrics.avg_execution_time)),
                ("Success Rate", format!("{:.1}%", metrics.success_rate)),
                ("Created", metrics.created_at.clone()),
                ("Last Run", metrics.last_run.clone()),
            ];
            print_details("Suite Metrics", &rows, &metrics, format);
        }

        SuiteCommands::Plan { name } => {
            let Some(plan) = registry.suite_execution_plan(&name) else {
                bail!("Suite not found: {}", name);
            };
            let mut rows = vec![
                ("Suite", plan.suite_name.clone()),
                ("Total Tests", plan.total_tests.to_string()),
                ("Estimated Duration", format!("{}s", plan.estimated_duration)),
                ("Browsers", plan.browsers.join(", ")),
                ("Workers", plan.workers.to_string()),
                ("Memory", plan.memory.clone()),
                ("CPU", plan.cpu.clone()),
            ];
            for (name, group) in &plan.execution_groups {
                rows.push(("Group", format!("{} (parallel {})", name, group.parallel)));
            }
            print_details("Suite Plan", &rows, &plan, format);
        }
    }

    Ok(())
}
