//! verisctl - Veris network validator node manager
//!
//! Installs, peers, supervises and upgrades the consensus and execution
//! engines of a Veris validator node.

pub mod engine;
