//! Reclaim Command

use anyhow::Result;
use clap::Args;

use testfleet_core::config::retention_for_days;
use testfleet_core::{HarnessConfig, ResourceReclaimer};

use crate::output::print_success;

#[derive(Args)]
pub struct ReclaimArgs {
    /// Keep files younger than this many days (defaults to the configured retention)
    #[arg(long)]
    pub days: Option<u64>,

    /// Leave browser processes running
    #[arg(long)]
    pub keep_browsers: bool,
}

pub async fn execute(args: ReclaimArgs, mut config: HarnessConfig) -> Result<()> {
    if args.keep_browsers {
        config.reclaim.terminate_browsers = false;
    }
    let days = args.days.unwrap_or(config.reclaim.retention_days);

    let reclaimer = ResourceReclaimer::new(&config.reclaim);
    let removed = reclaimer.reclaim(retention_for_days(days));

    print_success(&format!("Removed {} file(s) older than {} day(s)", removed, days));
    Ok(())
}
