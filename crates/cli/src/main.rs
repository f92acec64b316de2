//! Testfleet CLI - Main Entry Point
//!
//! Plans, runs and cleans up after large browser/API test suites.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod output;

use commands::{monitor, plan, reclaim, report, resources, run, suite};
use testfleet_core::config::is_ci;
use testfleet_core::HarnessConfig;

/// Testfleet - resource-aware planner for mass test runs
#[derive(Parser)]
#[command(name = "testfleet")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = "testfleet.toml", env = "TESTFLEET_CONFIG", global = true)]
    config: PathBuf,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the execution plan for a test count
    Plan(plan::PlanArgs),

    /// Run a mass test suite
    Run(run::RunArgs),

    /// Show the host resources the planner sees
    Resources,

    /// Sample CPU and memory for a while and print recommendations
    Monitor(monitor::MonitorArgs),

    /// Manage suite records
    #[command(subcommand)]
    Suite(suite::SuiteCommands),

    /// Install and drive the report tool
    #[command(subcommand)]
    Report(report::ReportCommands),

    /// Kill leftover browsers and purge stale artifacts
    Reclaim(reclaim::ReclaimArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    let mut config = HarnessConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    config.apply_env();
    if is_ci() {
        config.optimization.headless = true;
    }

    match cli.command {
        Commands::Plan(args) => plan::execute(args, config, cli.format).await?,
        Commands::Run(args) => run::execute(args, config, cli.format).await?,
        Commands::Resources => resources::execute(cli.format).await?,
        Commands::Monitor(args) => monitor::execute(args, cli.format).await?,
        Commands::Suite(cmd) => suite::execute(cmd, config, cli.format).await?,
        Commands::Report(cmd) => report::execute(cmd, config).await?,
        Commands::Reclaim(args) => reclaim::execute(args, config).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_flags_parse() {
        let cli = Cli::try_parse_from([
            "testfleet", "run", "--suite", "smoke", "--count", "250", "--workers", "4", "--headless",
        ])
        .unwrap();
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.suite, "smoke");
                assert_eq!(args.count, 250);
                assert_eq!(args.workers, Some(4));
                assert!(args.headless);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn report_subcommands_parse() {
        for sub in ["install", "generate", "open", "serve"] {
            let cli = Cli::try_parse_from(["testfleet", "report", sub]).unwrap();
            assert!(matches!(cli.command, Commands::Report(_)));
        }
    }
}
