//! Command-Line Surface
//!
//! Every menu entry is also addressable as a subcommand for scripting;
//! invoking the binary bare drops into the interactive menu.

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "verisctl")]
#[command(author = "Veris Labs")]
#[command(version)]
#[command(about = "Veris network validator node manager", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check host hardware against validator requirements
    Requirements,

    /// First-time node installation (both engines)
    Install {
        /// Install the previous published consensus release instead of the latest
        #[arg(long)]
        previous: bool,
    },

    /// Upgrade the consensus engine in place
    UpdateConsensus,

    /// Upgrade the execution engine in place
    UpdateExecution,

    /// Submit the validator creation transaction
    CreateValidator {
        /// Stake amount in base units
        #[arg(long, default_value = "1024000000000000000000")]
        stake: String,
    },

    /// Show the node's latest block height
    BlockHeight,

    /// Show supervised service state
    Status,

    /// Show the validator identity (public address)
    ExportKeys,

    /// Print the network dashboard link
    Dashboard,

    /// Print the faucet link
    Faucet,
}
