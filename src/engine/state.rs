//! Deployment State
//!
//! The filesystem layout every orchestrator call operates against, and the
//! linear phase machine an in-place upgrade moves through.

use std::io;
use std::path::{Path, PathBuf};

/// Filesystem layout of a deployment. Production points at the system
/// paths; tests root everything under a temp directory.
#[derive(Debug, Clone)]
pub struct DeploymentState {
    /// Directory installed binaries land in.
    pub bin_dir: PathBuf,
    /// Directory supervisor unit files are written to.
    pub unit_dir: PathBuf,
    /// Consensus engine home (chain state and configuration).
    pub node_home: PathBuf,
    /// Staging area for downloaded archives.
    pub workdir: PathBuf,
}

impl DeploymentState {
    /// The live system layout. `None` if no home directory can be resolved.
    pub fn system() -> Option<Self> {
        let home = dirs::home_dir()?;
        Some(Self {
            bin_dir: PathBuf::from("/usr/local/bin"),
            unit_dir: PathBuf::from("/etc/systemd/system"),
            node_home: home.join(".verisd"),
            workdir: home.join(".verisctl/staging"),
        })
    }

    /// Layout rooted under an arbitrary directory (for testing).
    pub fn rooted_at(root: &Path) -> Self {
        Self {
            bin_dir: root.join("bin"),
            unit_dir: root.join("system"),
            node_home: root.join(".verisd"),
            workdir: root.join("staging"),
        }
    }

    /// Create the directories the orchestrator writes into.
    pub fn init(&self) -> io::Result<()> {
        std::fs::create_dir_all(&self.bin_dir)?;
        std::fs::create_dir_all(&self.unit_dir)?;
        std::fs::create_dir_all(&self.workdir)?;
        Ok(())
    }

    /// The consensus engine's main configuration file.
    pub fn config_file(&self) -> PathBuf {
        self.node_home.join("config/config.toml")
    }

    /// The validator identity file. Read for display only.
    pub fn validator_key_file(&self) -> PathBuf {
        self.node_home.join("config/priv_validator_key.json")
    }
}

/// Phases of an in-place engine upgrade.
///
/// The machine is strictly linear. Once `Uninstalled` is entered the
/// previous binary is gone and there is no edge back to `Running` except
/// through a completed reinstall: that risk window is a named state here,
/// not an implicit ordering of calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradePhase {
    Running,
    Stopped,
    Uninstalled,
    Installing,
    Started,
}

impl UpgradePhase {
    /// The only legal successor; `Started` is terminal.
    pub fn next(self) -> Option<UpgradePhase> {
        match self {
            UpgradePhase::Running => Some(UpgradePhase::Stopped),
            UpgradePhase::Stopped => Some(UpgradePhase::Uninstalled),
            UpgradePhase::Uninstalled => Some(UpgradePhase::Installing),
            UpgradePhase::Installing => Some(UpgradePhase::Started),
            UpgradePhase::Started => None,
        }
    }

    /// Move to the only legal successor. Terminal phases stay put.
    pub fn step(&mut self) {
        if let Some(next) = self.next() {
            tracing::debug!(from = self.label(), to = next.label(), "upgrade phase");
            *self = next;
        }
    }

    /// Whether an abort in this phase leaves the node without a runnable
    /// binary.
    pub fn in_risk_window(self) -> bool {
        matches!(self, UpgradePhase::Uninstalled | UpgradePhase::Installing)
    }

    pub fn label(self) -> &'static str {
        match self {
            UpgradePhase::Running => "running",
            UpgradePhase::Stopped => "stopped",
            UpgradePhase::Uninstalled => "uninstalled",
            UpgradePhase::Installing => "installing",
            UpgradePhase::Started => "started",
        }
    }
}
