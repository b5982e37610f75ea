//! ATS Launcher
//!
//! Installs the ActionTestScript tools a project needs, then generates,
//! compiles and runs its test suites.

mod cli;

use std::process::ExitCode;

use anyhow::Context;
use atslaunch_core::{LaunchError, PipelineDriver, RunOutcome};
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let args = cli::Args::parse();
    init_logging(args.verbose);

    tracing::info!("Starting ATS launcher v{}", atslaunch_core::VERSION);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("Failed to create tokio runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(args)) {
        Ok(outcome) => exit_code(outcome.exit_code()),
        Err(e) => {
            tracing::error!("{e:#}");
            let code = e
                .downcast_ref::<LaunchError>()
                .map(LaunchError::exit_code)
                .unwrap_or(1);
            exit_code(code)
        }
    }
}

async fn run(args: cli::Args) -> anyhow::Result<RunOutcome> {
    let config = args.into_config().context("Invalid launcher configuration")?;
    let mut driver = PipelineDriver::new(&config);
    let outcome = driver.run().await?;

    if let RunOutcome::ToolsInstalled = outcome {
        tracing::info!("ATS tools are ready in {}", config.tools_root.display());
    }
    Ok(outcome)
}

/// Installs the fmt subscriber; `RUST_LOG` directives are honoured.
fn init_logging(verbose: bool) {
    let mut filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());
    if verbose {
        if let Ok(directive) = "atslaunch_core=debug".parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from((code & 0xff) as u8)
}
