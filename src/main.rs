//! verisctl entry point
//!
//! Wires logging, resolves the deployment layout and dispatches either a
//! subcommand or the interactive menu.

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use verisctl::engine::cli::{Cli, Commands};
use verisctl::engine::component::{CONSENSUS, EXECUTION};
use verisctl::engine::lifecycle::Orchestrator;
use verisctl::engine::menu;
use verisctl::engine::nodeops::{self, DASHBOARD_URL, FAUCET_URL, LOCAL_RPC};
use verisctl::engine::probe::{RpcStatusProbe, StatusProbe};
use verisctl::engine::state::DeploymentState;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let state = DeploymentState::system().context("could not determine home directory")?;
    let orchestrator = Orchestrator::system(state);

    let Some(command) = cli.command else {
        return menu::run(&orchestrator);
    };

    match command {
        Commands::Requirements => {
            let report = nodeops::probe_host();
            println!(
                "cpu cores: {} (need {})",
                report.cpu_cores,
                nodeops::MIN_CPU_CORES
            );
            println!(
                "memory:    {} GB (need {} GB)",
                report.memory_gb,
                nodeops::MIN_MEMORY_GB
            );
            if report.meets_minimums() {
                println!("{}", "host meets validator requirements".green());
            } else {
                anyhow::bail!("host is below validator requirements");
            }
        }
        Commands::Install { previous } => {
            let choice = if previous { 1 } else { 0 };
            orchestrator.fresh_install(choice)?;
        }
        Commands::UpdateConsensus => orchestrator.update(&CONSENSUS, CONSENSUS.name)?,
        Commands::UpdateExecution => orchestrator.update(&EXECUTION, EXECUTION.name)?,
        Commands::CreateValidator { stake } => {
            let output = orchestrator.create_validator(&stake)?;
            if !output.trim().is_empty() {
                println!("{}", output.trim());
            }
        }
        Commands::BlockHeight => {
            let height = RpcStatusProbe::new().latest_block_height(LOCAL_RPC)?;
            println!("{height}");
        }
        Commands::Status => {
            for (name, status) in orchestrator.service_status() {
                match status {
                    Ok(true) => println!("{name}\trunning"),
                    Ok(false) => println!("{name}\tstopped"),
                    Err(err) => println!("{name}\t{err}"),
                }
            }
        }
        Commands::ExportKeys => {
            println!("{}", orchestrator.validator_address()?);
        }
        Commands::Dashboard => println!("{DASHBOARD_URL}"),
        Commands::Faucet => println!("{FAUCET_URL}"),
    }

    Ok(())
}
