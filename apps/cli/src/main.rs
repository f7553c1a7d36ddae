//! MetricCli: collect engineering metrics and push them to a dashboard.
//!
//! Queries an issue tracker and a requirements tool through their CLIs, lets
//! an adapter turn the results into a flat metrics record, and uploads that
//! record to a BI backend. The exit code is the run status.

mod commands;

use std::process::ExitCode;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    let status = commands::run(cli).await?;
    Ok(status.into())
}
