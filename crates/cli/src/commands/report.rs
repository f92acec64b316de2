//! Report Commands

use anyhow::Result;
use clap::Subcommand;

use testfleet_core::HarnessConfig;
use testfleet_e2e::ReportTool;

use crate::output::{print_error, print_info, print_success};

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Download and unpack the report tool
    Install,

    /// Serve the raw results in a browser
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Generate the HTML report from raw results
    Generate,

    /// Open the generated report
    Open,
}

pub async fn execute(cmd: ReportCommands, config: HarnessConfig) -> Result<()> {
    let tool = ReportTool::new(&config.report, &config.paths);

    match cmd {
        ReportCommands::Install => {
            print_info(&format!("Downloading {}", tool.download_url()));
            let installed = tool.install().await?;
            print_success(&format!("Installed to {}", installed.display()));
        }

        ReportCommands::Serve { port } => {
            tool.serve(port).await?;
        }

        ReportCommands::Generate => match tool.generate().await {
            Ok(()) => print_success(&format!("Report written to {}", tool.report_dir().display())),
            Err(e) => {
                print_error(&format!("Report generation failed: {}", e));
                std::process::exit(1);
            }
        },

        ReportCommands::Open => {
            tool.open().await?;
        }
    }

    Ok(())
}
