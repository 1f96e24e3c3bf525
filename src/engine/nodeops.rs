//! One-Shot Node Operations
//!
//! Read-only lookups surfaced by the menu. None of these hold state; the
//! heavier delegated calls live on the orchestrator.

use std::fs;

pub const DASHBOARD_URL: &str = "https://explorer.veris.network";
pub const FAUCET_URL: &str = "https://faucet.veris.network";

/// The local node's own RPC endpoint.
pub const LOCAL_RPC: &str = "http://localhost:26657";

pub const MIN_CPU_CORES: usize = 4;
pub const MIN_MEMORY_GB: u64 = 16;

/// Snapshot of the host against the recommended validator hardware.
#[derive(Debug, Clone)]
pub struct HostReport {
    pub cpu_cores: usize,
    pub memory_gb: u64,
    pub supervisor_available: bool,
}

impl HostReport {
    pub fn meets_minimums(&self) -> bool {
        self.cpu_cores >= MIN_CPU_CORES
            && self.memory_gb >= MIN_MEMORY_GB
            && self.supervisor_available
    }
}

/// Pure read-only host inspection; probe failures read as zero resources.
pub fn probe_host() -> HostReport {
    HostReport {
        cpu_cores: cpu_core_count(),
        memory_gb: total_memory_gb(),
        supervisor_available: which::which("systemctl").is_ok(),
    }
}

fn cpu_core_count() -> usize {
    fs::read_to_string("/proc/cpuinfo")
        .map(|content| {
            content
                .lines()
                .filter(|line| line.starts_with("processor"))
                .count()
        })
        .unwrap_or(0)
}

fn total_memory_gb() -> u64 {
    fs::read_to_string("/proc/meminfo")
        .ok()
        .and_then(|content| {
            content.lines().find_map(|line| {
                let rest = line.strip_prefix("MemTotal:")?;
                let kb: u64 = rest.trim().trim_end_matches(" kB").trim().parse().ok()?;
                Some(kb / 1024 / 1024)
            })
        })
        .unwrap_or(0)
}
