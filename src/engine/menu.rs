//! Interactive Menu
//!
//! Numbered selection loop over the node operations. Any single
//! operation's failure is printed and the menu stays usable; only an
//! explicit quit leaves the loop.

use std::io::{self, BufRead, Write};

use colored::Colorize;

use crate::engine::component::{CONSENSUS, EXECUTION};
use crate::engine::error::LifecycleError;
use crate::engine::lifecycle::Orchestrator;
use crate::engine::nodeops::{self, DASHBOARD_URL, FAUCET_URL, LOCAL_RPC};
use crate::engine::probe::{RpcStatusProbe, StatusProbe};

pub fn run(orchestrator: &Orchestrator) -> anyhow::Result<()> {
    println!("{}", "verisctl - Veris validator node manager".bold());

    loop {
        print_menu();
        let choice = read_choice()?;

        match choice.as_str() {
            "1" | "requirements" => requirements(),
            "2" | "install" => report(install(orchestrator)),
            "3" | "update-consensus" => {
                report(orchestrator.update(&CONSENSUS, CONSENSUS.name));
            }
            "4" | "update-execution" => {
                report(orchestrator.update(&EXECUTION, EXECUTION.name));
            }
            "5" | "create-validator" => report(create_validator(orchestrator)),
            "6" | "block-height" => report(block_height()),
            "7" | "dashboard" => println!("Dashboard: {}", DASHBOARD_URL.cyan()),
            "8" | "export-keys" => report(export_keys(orchestrator)),
            "9" | "faucet" => println!("Faucet: {}", FAUCET_URL.cyan()),
            "s" | "status" => status(orchestrator),
            "q" | "0" | "quit" | "exit" => {
                println!("bye");
                return Ok(());
            }
            other => println!("unrecognized selection: {}", other),
        }
    }
}

fn print_menu() {
    println!();
    println!("  1) check requirements");
    println!("  2) install node");
    println!("  3) update consensus engine");
    println!("  4) update execution engine");
    println!("  5) create validator");
    println!("  6) block height");
    println!("  7) dashboard link");
    println!("  8) export keys");
    println!("  9) faucet link");
    println!("  s) service status");
    println!("  q) quit");
    print!("> ");
    let _ = io::stdout().flush();
}

fn read_choice() -> anyhow::Result<String> {
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_lowercase())
}

/// Failures are surfaced and swallowed here; a declined confirmation is a
/// notice, not an error.
fn report(result: Result<(), LifecycleError>) {
    match result {
        Ok(()) => println!("{}", "done".green()),
        Err(LifecycleError::ConfirmationDeclined) => {
            println!("{}", "aborted, nothing changed".yellow());
        }
        Err(err) => println!("{} {}", "error:".red().bold(), err),
    }
}

fn requirements() {
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
    println!(
        "systemd:   {}",
        if report.supervisor_available { "found" } else { "missing" }
    );
    if report.meets_minimums() {
        println!("{}", "host meets validator requirements".green());
    } else {
        println!("{}", "host is below validator requirements".yellow());
    }
}

fn install(orchestrator: &Orchestrator) -> Result<(), LifecycleError> {
    orchestrator.fresh_install(ask_release_choice())
}

/// 0 installs the latest consensus release, 1 the immediately prior one.
fn ask_release_choice() -> usize {
    print!("Install [l]atest or [p]revious consensus release? [L/p]: ");
    let _ = io::stdout().flush();

    let mut answer = String::new();
    let _ = io::stdin().lock().read_line(&mut answer);
    match answer.trim().to_lowercase().as_str() {
        "p" | "previous" => 1,
        _ => 0,
    }
}

fn create_validator(orchestrator: &Orchestrator) -> Result<(), LifecycleError> {
    let output = orchestrator.create_validator("1024000000000000000000")?;
    if !output.trim().is_empty() {
        println!("{}", output.trim());
    }
    Ok(())
}

fn block_height() -> Result<(), LifecycleError> {
    let height = RpcStatusProbe::new().latest_block_height(LOCAL_RPC)?;
    println!("latest block height: {}", height.to_string().bold());
    Ok(())
}

fn export_keys(orchestrator: &Orchestrator) -> Result<(), LifecycleError> {
    let address = orchestrator.validator_address()?;
    println!("validator address: {}", address.bold());
    println!(
        "identity file: {}",
        orchestrator.state().validator_key_file().display()
    );
    Ok(())
}

fn status(orchestrator: &Orchestrator) {
    for (name, state) in orchestrator.service_status() {
        match state {
            Ok(true) => println!("{:12} {}", name, "running".green()),
            Ok(false) => println!("{:12} {}", name, "stopped".yellow()),
            Err(err) => println!("{:12} {}", name, err),
        }
    }
}
