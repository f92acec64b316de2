//! Run Command

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use testfleet_core::HarnessConfig;
use testfleet_e2e::{MassTestRunner, RunOptions, RunOutcome};

use crate::output::{print_details, print_error, print_warning, OutputFormat};

#[derive(Args)]
pub struct RunArgs {
    /// Suite name, also used as the executor marker
    #[arg(short, long, default_value = "mass")]
    pub suite: String,

    /// Number of tests in the run
    #[arg(short, long, default_value = "100")]
    pub count: usize,

    /// Upper bound on workers
    #[arg(short, long)]
    pub workers: Option<u32>,

    /// Force headless browsers
    #[arg(long)]
    pub headless: bool,
}

fn outcome_rows(outcome: &RunOutcome) -> Vec<(&'static str, String)> {
    let mut rows = vec![
        ("Suite", outcome.suite.name.clone()),
        ("Status", outcome.suite.status.to_string()),
        ("Workers", outcome.plan.workers.to_string()),
        ("Passed", outcome.passed.to_string().green().to_string()),
        ("Failed", outcome.failed.to_string().red().to_string()),
        ("Skipped", outcome.skipped.to_string()),
        ("Duration", format!("{:.1}s", outcome.duration_secs)),
        ("Report Generated", outcome.report_generated.to_string()),
        ("Files Reclaimed", outcome.files_reclaimed.to_string()),
    ];
    if let Some(path) = &outcome.run_report {
        rows.push(("Run Report", path.display().to_string()));
    }
    rows
}

pub async fn execute(args: RunArgs, config: HarnessConfig, format: OutputFormat) -> Result<()> {
    let options = RunOptions {
        worker_ceiling: args.workers,
        headless: args.headless || config.optimization.headless,
    };

    let mut runner = MassTestRunner::new(config)?;
    let outcome = runner.run_mass_test(&args.suite, args.count, &options).await?;

    print_details("Run", &outcome_rows(&outcome), &outcome, format);

    if !outcome.report_generated {
        print_warning("Allure report was not generated");
    }
    if !outcome.success() || !outcome.report_generated {
        print_error(&format!("Suite {} did not pass", args.suite));
        std::process::exit(1);
    }

    println!("{} Suite {} passed", "✓".green(), args.suite);
    Ok(())
}
